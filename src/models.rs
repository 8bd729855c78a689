use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Width of the feature vector the fitted artifacts were trained on.
pub const FEATURE_DIM: usize = 7;

/// One observation of sleep-related lifestyle metrics. All seven fields are
/// required; numeric strings are accepted the way the upstream clients send
/// them, and integer fields truncate fractional values toward zero.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    #[serde(deserialize_with = "as_int")]
    pub age: i64,
    #[serde(deserialize_with = "as_real")]
    pub sleep_duration: f32,
    #[serde(deserialize_with = "as_int")]
    pub awakenings: i64,
    #[serde(deserialize_with = "as_real")]
    pub caffeine: f32,
    #[serde(deserialize_with = "as_real")]
    pub alcohol: f32,
    #[serde(deserialize_with = "as_real")]
    pub smoking: f32,
    #[serde(deserialize_with = "as_real")]
    pub exercise: f32,
}

impl FeatureRecord {
    /// Assemble the feature vector in the order the scaler and classifier
    /// were fitted on. This order must never change.
    pub fn to_features(&self) -> [f32; FEATURE_DIM] {
        [
            self.age as f32,
            self.sleep_duration,
            self.awakenings as f32,
            self.caffeine,
            self.alcohol,
            self.smoking,
            self.exercise,
        ]
    }
}

fn as_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64() {
                // fractional input truncates toward zero
                Ok(f as i64)
            } else {
                Err(de::Error::custom("integer value out of range"))
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| de::Error::custom(format!("expected an integer, got \"{}\"", s))),
        other => Err(de::Error::custom(format!(
            "expected an integer, got {}",
            other
        ))),
    }
}

fn as_real<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| de::Error::custom("numeric value out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f32>()
            .map_err(|_| de::Error::custom(format!("expected a number, got \"{}\"", s))),
        other => Err(de::Error::custom(format!("expected a number, got {}", other))),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
}
