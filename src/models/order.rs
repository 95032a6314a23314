use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Internal,
    External,
}

impl std::str::FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "internal" => Ok(OrderType::Internal),
            "external" => Ok(OrderType::External),
            other => Err(format!("unknown order type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    #[serde(default)]
    pub medication_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub needed_by: Option<String>,
    #[serde(default)]
    pub ordered_by: Option<String>,
    #[serde(default)]
    pub is_rush: bool,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    pub order_type: OrderType,
}

/// What the caller fills in; id and creation time are assigned on submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub needed_by: Option<String>,
    pub ordered_by: Option<String>,
    pub is_rush: bool,
    pub comment: Option<String>,
    pub items: Vec<OrderLine>,
    pub order_type: OrderType,
}

impl NewOrder {
    pub fn into_order(self, id: String, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            created_at: Some(created_at),
            needed_by: self.needed_by,
            ordered_by: self.ordered_by,
            is_rush: self.is_rush,
            comment: self.comment,
            items: self.items,
            order_type: self.order_type,
        }
    }
}

/// `ord-{epoch millis}-{4 base36 chars}`; provisional until the server answers.
pub fn generate_order_id(now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("ord-{}-{}", now.timestamp_millis(), suffix)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}
