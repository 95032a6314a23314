//! Application bootstrap.
//!
//! Builds every store once around a shared [`ApiClient`] and runs their
//! initial loads as one explicit step, so callers can see whether start-up
//! succeeded instead of relying on load-time side effects.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::api::ApiClient;
use crate::config::Settings;
use crate::error::Result;
use crate::models::{Cart, MedicationLine, NewCart, NotificationEvent};
use crate::prefs::ThemePreference;
use crate::stores::{CartsStore, MedicationsStore, OrdersStore, UserSessionStore};
use crate::websocket::NotificationChannel;

pub struct App {
    settings: Settings,
    api: ApiClient,
    pub carts: Arc<CartsStore>,
    pub medications: Arc<MedicationsStore>,
    pub orders: Arc<OrdersStore>,
    pub session: Arc<UserSessionStore>,
}

/// Outcome of the initial loads, one entry per store that recorded an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub failures: Vec<(&'static str, String)>,
}

impl InitReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

impl App {
    pub fn new(settings: Settings) -> Result<Self> {
        let api = ApiClient::new(&settings.api)?;
        Ok(Self {
            carts: Arc::new(CartsStore::new(api.clone())),
            medications: Arc::new(MedicationsStore::new(api.clone())),
            orders: Arc::new(OrdersStore::new(api.clone())),
            session: Arc::new(UserSessionStore::with_default_registry()),
            settings,
            api,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run every store's first load concurrently.
    #[instrument(skip(self))]
    pub async fn init(&self) -> InitReport {
        tokio::join!(
            self.carts.fetch_carts(),
            self.medications.refresh(),
            self.orders.fetch_orders(),
        );

        let failures: Vec<(&'static str, String)> = [
            ("carts", self.carts.error()),
            ("medications", self.medications.error()),
            ("orders", self.orders.error()),
        ]
        .into_iter()
        .filter_map(|(store, error)| error.map(|e| (store, e)))
        .collect();

        for (store, error) in &failures {
            warn!(store, error = %error, "initial load failed");
        }
        info!(
            carts = self.carts.count(),
            medications = self.medications.medications().len(),
            orders = self.orders.count(),
            "stores initialized"
        );
        InitReport { failures }
    }

    /// Open the persisted theme and write back its normalized value.
    pub fn theme(&self) -> Result<ThemePreference> {
        let mut prefs = ThemePreference::open(&self.settings.prefs.path)?;
        let current = prefs.current();
        prefs.apply(current)?;
        Ok(prefs)
    }

    /// Notification channel for the configured origin; not yet connected.
    pub fn notifications<F>(&self, handler: F) -> Result<NotificationChannel>
    where
        F: Fn(NotificationEvent) + Send + Sync + 'static,
    {
        let url = self.api.endpoints().notifications(&self.settings.notifications.path)?;
        let delay = Duration::from_millis(self.settings.notifications.reconnect_delay_ms);
        Ok(NotificationChannel::new(url, delay, handler))
    }

    /// Create a cart with medications, picking stock for lines without an
    /// inventory reference from the first matching inventory record.
    pub async fn add_cart_with_medications(
        &self,
        cart: NewCart,
        mut lines: Vec<MedicationLine>,
    ) -> Result<Cart> {
        for line in &mut lines {
            if line.inventory_id.is_none() {
                if let Some(medication_id) = &line.medication_id {
                    line.inventory_id = self.medications.first_inventory_id(medication_id);
                }
            }
        }
        self.carts.add_cart_with_medications(cart, &lines).await
    }
}
