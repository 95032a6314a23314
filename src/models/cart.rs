use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CartStatus {
    #[default]
    #[serde(rename = "Prepared", alias = "unused")]
    Prepared,
    #[serde(rename = "In-Use", alias = "in-use")]
    InUse,
    #[serde(rename = "Closed", alias = "used")]
    Closed,
}

impl std::fmt::Display for CartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CartStatus::Prepared => "Prepared",
            CartStatus::InUse => "In-Use",
            CartStatus::Closed => "Closed",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for CartStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prepared" | "unused" => Ok(CartStatus::Prepared),
            "in-use" | "in_use" | "inuse" => Ok(CartStatus::InUse),
            "closed" | "used" => Ok(CartStatus::Closed),
            other => Err(format!("unknown cart status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: i64,
    pub status: CartStatus,
    pub patient_id: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub operation_date: Option<NaiveDate>,
    #[serde(default)]
    pub anaesthesia_type: String,
    #[serde(default)]
    pub room_number: String,
    /// Assembled client-side from the flat cart-item list.
    #[serde(default)]
    pub items: Vec<CartItem>,
}

/// Create payload for `POST /api/carts`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCart {
    pub status: CartStatus,
    pub patient_id: String,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_date: Option<NaiveDate>,
    pub anaesthesia_type: String,
    pub room_number: String,
}

impl NewCart {
    /// Bare payload for `patient_id`. The backend rejects a cart without an
    /// operation date (422), so set one with [`NewCart::on`] before sending.
    pub fn for_patient(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            ..Self::default()
        }
    }

    pub fn on(mut self, operation_date: NaiveDate) -> Self {
        self.operation_date = Some(operation_date);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub inventory_id: i64,
    pub medication_id: String,
    #[serde(default)]
    pub time_sensitive: bool,
    pub amount: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
}

/// Payload for `POST /api/cart-items/add`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddToCartRequest {
    pub cart_id: i64,
    pub inventory_id: Option<i64>,
    pub medication_id: String,
    pub amount: f64,
    pub time_sensitive: bool,
}

/// One medication requested while creating a cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicationLine {
    pub medication_id: Option<String>,
    pub inventory_id: Option<i64>,
    pub amount: f64,
    #[serde(default)]
    pub time_sensitive: bool,
}

impl MedicationLine {
    pub fn new(medication_id: impl Into<String>, amount: f64) -> Self {
        Self {
            medication_id: Some(medication_id.into()),
            amount,
            ..Self::default()
        }
    }

    /// The attach request for `cart_id`, or `None` when no medication was picked.
    pub fn to_request(&self, cart_id: i64) -> Option<AddToCartRequest> {
        let medication_id = self.medication_id.clone()?;
        Some(AddToCartRequest {
            cart_id,
            inventory_id: self.inventory_id,
            medication_id,
            amount: self.amount,
            time_sensitive: self.time_sensitive,
        })
    }
}

/// Attach each cart's items by matching `cart_id`; orphaned items are dropped.
pub fn assemble(carts: Vec<Cart>, items: &[CartItem]) -> Vec<Cart> {
    carts
        .into_iter()
        .map(|mut cart| {
            cart.items = items.iter().filter(|item| item.cart_id == cart.id).cloned().collect();
            cart
        })
        .collect()
}
