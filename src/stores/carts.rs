//! Carts store: carts and cart items, joined client-side.

use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::models::cart::assemble;
use crate::models::{AddToCartRequest, Cart, CartItem, CartStatus, MedicationLine, NewCart};
use crate::stores::{BusyFlag, Observable};

pub struct CartsStore {
    api: ApiClient,
    carts: Observable<Vec<Cart>>,
    cart_items: Observable<Vec<CartItem>>,
    loading: BusyFlag,
    error: Observable<Option<String>>,
}

impl CartsStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            carts: Observable::default(),
            cart_items: Observable::default(),
            loading: BusyFlag::default(),
            error: Observable::default(),
        }
    }

    pub fn carts(&self) -> Vec<Cart> {
        self.carts.get()
    }

    pub fn cart_items(&self) -> Vec<CartItem> {
        self.cart_items.get()
    }

    pub fn count(&self) -> usize {
        self.carts.with(Vec::len)
    }

    pub fn get_cart(&self, id: i64) -> Option<Cart> {
        self.carts.with(|carts| carts.iter().find(|c| c.id == id).cloned())
    }

    pub fn loading(&self) -> bool {
        self.loading.is_busy()
    }

    /// Last failure message. `None` with an empty list means "loaded empty".
    /// Only a read clears it; a successful write keeps a failed load visible.
    pub fn error(&self) -> Option<String> {
        self.error.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Cart>> {
        self.carts.subscribe()
    }

    pub fn subscribe_error(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<usize> {
        self.loading.subscribe()
    }

    // ===== Reads =====

    /// Load carts and cart items together and attach items to their carts.
    ///
    /// A failure in either request resets both lists and records the error;
    /// it is not returned.
    #[instrument(skip(self))]
    pub async fn fetch_carts(&self) -> Vec<Cart> {
        let _busy = self.loading.begin();
        self.error.set(None);

        let (carts, items) = tokio::join!(
            self.api.get_list::<Cart>("/carts", "carts"),
            self.api.get_list::<CartItem>("/cart-items", "cart items"),
        );

        match (carts, items) {
            (Ok(carts), Ok(items)) => {
                let assembled = assemble(carts, &items);
                info!(carts = assembled.len(), items = items.len(), "carts loaded");
                self.cart_items.set(items);
                self.carts.set(assembled.clone());
                assembled
            }
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "failed to load carts");
                self.error.set(Some(e.to_string()));
                self.cart_items.set(Vec::new());
                self.carts.set(Vec::new());
                Vec::new()
            }
        }
    }

    /// Reload only the flat item list and re-attach it to the cached carts.
    #[instrument(skip(self))]
    pub async fn fetch_cart_items(&self) -> Vec<CartItem> {
        let _busy = self.loading.begin();
        self.error.set(None);

        let items = match self.api.get_list::<CartItem>("/cart-items", "cart items").await {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "failed to load cart items");
                self.error.set(Some(e.to_string()));
                Vec::new()
            }
        };

        self.cart_items.set(items.clone());
        self.rejoin();
        items
    }

    // ===== Writes =====

    #[instrument(skip(self, cart), fields(patient_id = %cart.patient_id))]
    pub async fn add_cart(&self, cart: NewCart) -> Result<Cart> {
        let _busy = self.loading.begin();

        let mut created: Cart = self
            .api
            .post("/carts", &cart, "create cart")
            .await
            .map_err(|e| self.write_failed("create cart", e))?;

        created.items = self.items_for(created.id);
        info!(cart_id = created.id, "cart created");
        self.carts.update(|carts| carts.push(created.clone()));
        Ok(created)
    }

    #[instrument(skip_all, fields(cart_id = id, status = %status))]
    pub async fn update_cart_status(&self, id: i64, status: CartStatus) -> Result<Cart> {
        let _busy = self.loading.begin();

        let body = serde_json::json!({ "new_status": status });
        let mut updated: Cart = self
            .api
            .patch(&format!("/carts/{}/status", id), &body, "update cart status")
            .await
            .map_err(|e| self.write_failed("update cart status", e))?;

        updated.items = self.items_for(updated.id);
        self.carts.update(|carts| {
            if let Some(slot) = carts.iter_mut().find(|c| c.id == updated.id) {
                *slot = updated.clone();
            } else {
                warn!(cart_id = updated.id, "updated cart was not cached");
            }
        });
        Ok(updated)
    }

    #[instrument(skip_all, fields(cart_id = id))]
    pub async fn delete_cart(&self, id: i64) -> Result<()> {
        let _busy = self.loading.begin();

        self.api
            .delete(&format!("/carts/{}", id), "delete cart")
            .await
            .map_err(|e| self.write_failed("delete cart", e))?;

        self.carts.update(|carts| carts.retain(|c| c.id != id));
        Ok(())
    }

    #[instrument(skip(self, request), fields(cart_id = %request.cart_id, medication_id = %request.medication_id))]
    pub async fn add_cart_item(&self, request: AddToCartRequest) -> Result<CartItem> {
        let _busy = self.loading.begin();

        let item = self.attach(&request).await?;
        self.cart_items.update(|items| items.push(item.clone()));
        self.rejoin();
        Ok(item)
    }

    #[instrument(skip_all, fields(cart_item_id = id))]
    pub async fn delete_cart_item(&self, id: i64) -> Result<()> {
        let _busy = self.loading.begin();

        self.api
            .delete(&format!("/cart-items/{}", id), "remove cart item")
            .await
            .map_err(|e| self.write_failed("remove cart item", e))?;

        self.cart_items.update(|items| items.retain(|i| i.id != id));
        self.rejoin();
        Ok(())
    }

    /// Create a cart, then attach each line that names a medication, in order.
    ///
    /// The first failed attachment stops the sequence and is returned; the
    /// cart itself stays created. After all attachments succeed the carts are
    /// reloaded, since the new item ids are only known to the server.
    #[instrument(skip(self, cart, lines), fields(patient_id = %cart.patient_id, lines = lines.len()))]
    pub async fn add_cart_with_medications(
        &self,
        cart: NewCart,
        lines: &[MedicationLine],
    ) -> Result<Cart> {
        let created = self.add_cart(cart).await?;

        for request in lines.iter().filter_map(|line| line.to_request(created.id)) {
            let _busy = self.loading.begin();
            self.attach(&request).await?;
        }

        self.fetch_carts().await;
        Ok(self.get_cart(created.id).unwrap_or(created))
    }

    async fn attach(&self, request: &AddToCartRequest) -> Result<CartItem> {
        self.api
            .post("/cart-items/add", request, "add medication to cart")
            .await
            .map_err(|e| self.write_failed("add medication to cart", e))
    }

    fn write_failed(&self, action: &str, err: ClientError) -> ClientError {
        error!(action, error = %err, "write rejected");
        self.error.set(Some(err.to_string()));
        err
    }

    fn items_for(&self, cart_id: i64) -> Vec<CartItem> {
        self.cart_items
            .with(|items| items.iter().filter(|i| i.cart_id == cart_id).cloned().collect())
    }

    fn rejoin(&self) {
        let items = self.cart_items.get();
        self.carts.update(|carts| {
            let current = std::mem::take(carts);
            *carts = assemble(current, &items);
        });
    }
}
