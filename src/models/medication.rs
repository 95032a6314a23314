use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub medication_id: String,
    pub name: String,
    #[serde(default)]
    pub formula: String,
    #[serde(default)]
    pub producer: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub base_unit: String,
    #[serde(default)]
    pub restriction_level: i32,
    #[serde(default)]
    pub chemical_stability_hours: i32,
}

impl Medication {
    /// Name plus dosage, or plus quantity when no dosage is recorded.
    pub fn label(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if !self.dosage.is_empty() {
            parts.push(&self.dosage);
        } else if let Some(quantity) = self.quantity.as_deref().filter(|q| !q.is_empty()) {
            parts.push(quantity);
        }
        parts.join(" — ")
    }
}

/// One stock entry. Availability is summed across records on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: i64,
    #[serde(rename = "medicationId")]
    pub medication_id: String,
    #[serde(rename = "batchNumber", default)]
    pub batch_number: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "expirationDate", default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub min_stock: Option<f64>,
}

/// Dropdown-friendly projection of a medication with its stock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicationOption {
    pub label: String,
    pub value: String,
    pub meta: Medication,
    pub available_amount: f64,
    pub unit: String,
}
