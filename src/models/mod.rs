//! Wire types mirroring the MedCart backend resources.

pub mod cart;
pub mod medication;
pub mod notification;
pub mod order;
pub mod user;

pub use cart::{AddToCartRequest, Cart, CartItem, CartStatus, MedicationLine, NewCart};
pub use medication::{InventoryRecord, Medication, MedicationOption};
pub use notification::NotificationEvent;
pub use order::{NewOrder, Order, OrderLine, OrderType};
pub use user::{Preferences, PreferencesPatch, Theme, User};
