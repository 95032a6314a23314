//! Orders store: replenishment orders, tagged internal or external.

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::models::order::generate_order_id;
use crate::models::{NewOrder, Order, OrderType};
use crate::stores::{BusyFlag, Observable};

pub struct OrdersStore {
    api: ApiClient,
    orders: Observable<Vec<Order>>,
    loading: BusyFlag,
    error: Observable<Option<String>>,
}

impl OrdersStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            orders: Observable::default(),
            loading: BusyFlag::default(),
            error: Observable::default(),
        }
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.get()
    }

    pub fn count(&self) -> usize {
        self.orders.with(Vec::len)
    }

    pub fn loading(&self) -> bool {
        self.loading.is_busy()
    }

    pub fn error(&self) -> Option<String> {
        self.error.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Order>> {
        self.orders.subscribe()
    }

    pub fn subscribe_error(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }

    #[instrument(skip(self))]
    pub async fn fetch_orders(&self) -> Vec<Order> {
        let _busy = self.loading.begin();
        self.error.set(None);

        let orders = match self.api.get_list::<Order>("/orders", "orders").await {
            Ok(orders) => {
                info!(count = orders.len(), "orders loaded");
                orders
            }
            Err(e) => {
                error!(error = %e, "failed to load orders");
                self.error.set(Some(e.to_string()));
                Vec::new()
            }
        };

        self.orders.set(orders.clone());
        orders
    }

    /// Submit an order under a provisional client id; the server's copy is cached.
    #[instrument(skip(self, order), fields(order_type = ?order.order_type, rush = order.is_rush))]
    pub async fn add_order(&self, order: NewOrder) -> Result<Order> {
        let _busy = self.loading.begin();

        let now = Utc::now();
        let draft = order.into_order(generate_order_id(now), now);

        let created: Order = self
            .api
            .post("/orders", &draft, "submit order")
            .await
            .map_err(|e| self.write_failed("submit order", e))?;

        info!(order_id = %created.id, provisional_id = %draft.id, "order submitted");
        self.orders.update(|orders| orders.push(created.clone()));
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn remove_order(&self, id: &str) -> Result<()> {
        let _busy = self.loading.begin();

        self.api
            .delete(&format!("/orders/{}", id), "delete order")
            .await
            .map_err(|e| self.write_failed("delete order", e))?;

        self.orders.update(|orders| orders.retain(|o| o.id != id));
        Ok(())
    }

    pub fn get_order(&self, id: &str) -> Option<Order> {
        self.orders.with(|orders| orders.iter().find(|o| o.id == id).cloned())
    }

    pub fn get_orders_by_type(&self, order_type: OrderType) -> Vec<Order> {
        self.orders.with(|orders| {
            orders
                .iter()
                .filter(|o| o.order_type == order_type)
                .cloned()
                .collect()
        })
    }

    fn write_failed(&self, action: &str, err: ClientError) -> ClientError {
        error!(action, error = %err, "write rejected");
        self.error.set(Some(err.to_string()));
        err
    }
}
