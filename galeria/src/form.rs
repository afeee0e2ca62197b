//! Parameter form rules: three weights summing to 100 and three filled fields
//! for each of the seven gallery slots.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::coerce::{js_string, parse_int};

/// Gallery slots on the form: six existing galleries plus the new one.
pub const SLOT_COUNT: usize = 7;
pub const REQUIRED_WEIGHT_TOTAL: i64 = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("La suma de los pesos debe ser igual a 100%")]
    WeightSum { total: Option<i64> },
    #[error("Por favor complete todos los campos de la Galería {}", slot_name(.0))]
    IncompleteSlot(usize),
}

fn slot_name(slot: &usize) -> String {
    if *slot < SLOT_COUNT {
        slot.to_string()
    } else {
        "Nueva".to_string()
    }
}

/// Raw weight inputs, kept as typed text.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WeightFields {
    #[serde(default, deserialize_with = "field_text")]
    pub social: String,
    #[serde(default, deserialize_with = "field_text")]
    pub economic: String,
    #[serde(default, deserialize_with = "field_text")]
    pub municipal: String,
}

impl WeightFields {
    /// Integer sum of the three weights, `None` if any of them is not a number
    /// or the sum does not fit in an `i64`.
    pub fn total(&self) -> Option<i64> {
        let social = parse_int(&self.social)?;
        let economic = parse_int(&self.economic)?;
        let municipal = parse_int(&self.municipal)?;
        social.checked_add(economic)?.checked_add(municipal)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SlotFields {
    #[serde(default, deserialize_with = "field_text")]
    pub lot_size: String,
    #[serde(default, deserialize_with = "field_text")]
    pub primary_count: String,
    #[serde(default, deserialize_with = "field_text")]
    pub secondary_count: String,
}

impl SlotFields {
    pub fn is_complete(&self) -> bool {
        !self.lot_size.is_empty() && !self.primary_count.is_empty() && !self.secondary_count.is_empty()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParamForm {
    #[serde(default)]
    pub weights: WeightFields,
    #[serde(default)]
    pub slots: Vec<SlotFields>,
}

impl ParamForm {
    /// Check the form; the first violated rule is reported.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let total = self.weights.total();
        if total != Some(REQUIRED_WEIGHT_TOTAL) {
            return Err(ValidationError::WeightSum { total });
        }
        for slot in 1..=SLOT_COUNT {
            let complete = self
                .slots
                .get(slot - 1)
                .map(SlotFields::is_complete)
                .unwrap_or(false);
            if !complete {
                return Err(ValidationError::IncompleteSlot(slot));
            }
        }
        Ok(())
    }

    /// Field names the server's parameter endpoint reads.
    pub fn to_form_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("peso_bs".to_string(), self.weights.social.clone()),
            ("peso_be".to_string(), self.weights.economic.clone()),
            ("peso_mun".to_string(), self.weights.municipal.clone()),
        ];
        for (idx, slot) in self.slots.iter().take(SLOT_COUNT).enumerate() {
            let n = idx + 1;
            pairs.push((format!("tam_lote_{n}"), slot.lot_size.clone()));
            pairs.push((format!("can_pri_{n}"), slot.primary_count.clone()));
            pairs.push((format!("can_sec_{n}"), slot.secondary_count.clone()));
        }
        pairs
    }
}

/// DOM ids of the weight inputs: social, economic, municipal.
pub const WEIGHT_FIELD_IDS: [&str; 3] = ["pesoBS", "pesoBE", "pesoMUN"];

/// DOM ids of the three inputs belonging to `slot` (1-based).
pub fn slot_field_ids(slot: usize) -> [String; 3] {
    [
        format!("tamLote{slot}"),
        format!("canPri{slot}"),
        format!("canSec{slot}"),
    ]
}

fn field_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        other => js_string(&other),
    })
}
