//! Backend payload types and error definitions.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors surfaced by data service calls that have no fallback value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// User lookup failed or the backend reported no such user.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Registration was rejected or could not be sent.
    #[error("Failed to create user: {0}")]
    CreateUser(String),
}

/// Result type for data service operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Document identifier; the backend sends either `{"$oid": ".."}` or a bare value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    Oid {
        #[serde(rename = "$oid")]
        oid: String,
    },
    Plain(String),
    Number(i64),
}

impl DocumentId {
    /// Comparable key regardless of wire form.
    pub fn key(&self) -> String {
        match self {
            DocumentId::Oid { oid } => oid.clone(),
            DocumentId::Plain(id) => id.clone(),
            DocumentId::Number(id) => id.to_string(),
        }
    }
}

/// One cross-exchange arbitrage opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitragePair {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub coin_pair: String,
    pub buy_exchange: String,
    pub sell_exchange: String,
    #[serde(default)]
    pub buy_price: Option<f64>,
    #[serde(default)]
    pub sell_price: Option<f64>,
    /// Spread in percent.
    #[serde(default)]
    pub spread: f64,
    #[serde(default)]
    pub available_volume_usd: Option<f64>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub commission: Option<f64>,
    #[serde(default)]
    pub buy_url: Option<String>,
    #[serde(default)]
    pub sell_url: Option<String>,
    /// When the opportunity first appeared (`{"$date": ..}` or a bare timestamp).
    #[serde(default)]
    pub alive_time: Option<Value>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArbitragePair {
    /// `BTC` for `BTC/USDT`.
    pub fn base_coin(&self) -> &str {
        self.coin_pair.split('/').next().unwrap_or(&self.coin_pair)
    }

    /// Expected profit in USD if the whole available volume is traded.
    pub fn profit_usd(&self) -> f64 {
        self.available_volume_usd.unwrap_or(0.0) * self.spread / 100.0
    }

    /// When the opportunity appeared, if `alive_time` is readable.
    pub fn alive_since(&self) -> Option<DateTime<Utc>> {
        self.alive_time.as_ref().and_then(parse_timestamp)
    }
}

/// Extended-JSON `{"$date": ..}`, RFC 3339 / naive ISO strings, or epoch millis.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Object(map) => map
            .get("$date")
            .or_else(|| map.get("$numberLong"))
            .and_then(parse_timestamp),
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
            .or_else(|| text.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// A pin a user placed on a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedPair {
    pub pair_id: DocumentId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `GET /pairs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairsSnapshot {
    #[serde(default)]
    pub active_pairs: Vec<ArbitragePair>,
    #[serde(default)]
    pub pinned_pairs: Vec<PinnedPair>,
}

impl PairsSnapshot {
    /// Set `is_pinned` on every active pair the user has pinned.
    pub fn mark_pinned(&mut self) {
        let pinned: std::collections::HashSet<String> =
            self.pinned_pairs.iter().map(|p| p.pair_id.key()).collect();
        for pair in &mut self.active_pairs {
            pair.is_pinned = pinned.contains(&pair.id.key());
        }
    }
}

/// A user's license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(rename = "type", default)]
    pub license_type: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub expires_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl License {
    pub fn is_free(&self) -> bool {
        self.license_type == "Free"
    }

    /// Paid and active.
    pub fn grants_access(&self) -> bool {
        self.is_active && !self.is_free()
    }

    /// Type or activity differs from `previous`.
    pub fn changed_from(&self, previous: &License) -> bool {
        self.license_type != previous.license_type || self.is_active != previous.is_active
    }
}

/// Response of `GET /users/{id}/license`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseEnvelope {
    pub success: bool,
    pub license: Option<License>,
}

impl LicenseEnvelope {
    /// Fallback when the license could not be fetched.
    pub fn unavailable() -> Self {
        Self {
            success: false,
            license: None,
        }
    }

    /// Accept both `{"license": {..}}` and a bare license object.
    ///
    /// Any license object counts, even one missing `type` or `is_active`;
    /// such a license simply grants no access.
    pub fn from_value(value: Value) -> Self {
        let success = value
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let license = match value.get("license") {
            Some(inner) => serde_json::from_value(inner.clone()).ok(),
            None if value.get("type").is_some() || value.get("is_active").is_some() => {
                serde_json::from_value(value).ok()
            }
            None => None,
        };
        Self { success, license }
    }
}
