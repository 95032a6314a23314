//! Medications store: the medication catalog and inventory stock records.

use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::api::ApiClient;
use crate::models::{InventoryRecord, Medication, MedicationOption};
use crate::stores::{BusyFlag, Observable};

pub struct MedicationsStore {
    api: ApiClient,
    medications: Observable<Vec<Medication>>,
    inventory: Observable<Vec<InventoryRecord>>,
    loading: BusyFlag,
    error: Observable<Option<String>>,
}

impl MedicationsStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            medications: Observable::default(),
            inventory: Observable::default(),
            loading: BusyFlag::default(),
            error: Observable::default(),
        }
    }

    pub fn medications(&self) -> Vec<Medication> {
        self.medications.get()
    }

    pub fn inventory(&self) -> Vec<InventoryRecord> {
        self.inventory.get()
    }

    pub fn loading(&self) -> bool {
        self.loading.is_busy()
    }

    pub fn error(&self) -> Option<String> {
        self.error.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Medication>> {
        self.medications.subscribe()
    }

    pub fn subscribe_inventory(&self) -> watch::Receiver<Vec<InventoryRecord>> {
        self.inventory.subscribe()
    }

    pub fn subscribe_error(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }

    #[instrument(skip(self))]
    pub async fn fetch_medications(&self) -> Vec<Medication> {
        let _busy = self.loading.begin();
        self.error.set(None);

        let medications = match self.api.get_list::<Medication>("/medications", "medications").await {
            Ok(medications) => {
                info!(count = medications.len(), "medications loaded");
                medications
            }
            Err(e) => {
                error!(error = %e, "failed to load medications");
                self.error.set(Some(e.to_string()));
                Vec::new()
            }
        };

        self.medications.set(medications.clone());
        medications
    }

    #[instrument(skip(self))]
    pub async fn fetch_inventory(&self) -> Vec<InventoryRecord> {
        let _busy = self.loading.begin();
        self.error.set(None);

        let inventory = match self.api.get_list::<InventoryRecord>("/inventory", "inventory").await {
            Ok(inventory) => {
                info!(count = inventory.len(), "inventory loaded");
                inventory
            }
            Err(e) => {
                error!(error = %e, "failed to load inventory");
                self.error.set(Some(e.to_string()));
                Vec::new()
            }
        };

        self.inventory.set(inventory.clone());
        inventory
    }

    /// Reload catalog and stock concurrently.
    pub async fn refresh(&self) {
        tokio::join!(self.fetch_medications(), self.fetch_inventory());
    }

    /// One dropdown entry per medication, with summed stock.
    pub fn options(&self) -> Vec<MedicationOption> {
        let inventory = self.inventory.get();
        self.medications.with(|medications| {
            medications
                .iter()
                .map(|m| MedicationOption {
                    label: m.label(),
                    value: m.medication_id.clone(),
                    meta: m.clone(),
                    available_amount: sum_amounts(&inventory, &m.medication_id),
                    unit: inventory
                        .iter()
                        .find(|inv| inv.medication_id == m.medication_id)
                        .map(|inv| inv.unit.clone())
                        .unwrap_or_default(),
                })
                .collect()
        })
    }

    pub fn by_id(&self, medication_id: &str) -> Option<Medication> {
        self.medications
            .with(|medications| medications.iter().find(|m| m.medication_id == medication_id).cloned())
    }

    pub fn inventory_for_medication(&self, medication_id: &str) -> Vec<InventoryRecord> {
        self.inventory.with(|inventory| {
            inventory
                .iter()
                .filter(|inv| inv.medication_id == medication_id)
                .cloned()
                .collect()
        })
    }

    pub fn total_available(&self, medication_id: &str) -> f64 {
        self.inventory.with(|inventory| sum_amounts(inventory, medication_id))
    }

    pub fn first_inventory_id(&self, medication_id: &str) -> Option<i64> {
        self.inventory.with(|inventory| {
            inventory
                .iter()
                .find(|inv| inv.medication_id == medication_id)
                .map(|inv| inv.id)
        })
    }
}

fn sum_amounts(inventory: &[InventoryRecord], medication_id: &str) -> f64 {
    inventory
        .iter()
        .filter(|inv| inv.medication_id == medication_id)
        .map(|inv| inv.amount)
        .sum()
}
