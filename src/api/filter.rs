//! Client-side filtering and sorting of arbitrage pairs.
//!
//! # Responsibilities
//! - Keep pairs inside spread, volume and age ranges
//! - Restrict to chosen base coins and buy/sell exchanges
//! - Order by coin, network, spread or expected profit
//!
//! # Design Decisions
//! - Unset bounds and empty sets do not filter
//! - A pair without volume or a readable `alive_time` is not rejected by
//!   the corresponding range
//! - A view can be read from stored user settings

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::types::{ArbitragePair, PairsSnapshot};

/// Which pairs to keep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairFilter {
    /// Spread bounds, in percent.
    pub spread_min: Option<f64>,
    pub spread_max: Option<f64>,

    /// Available volume bounds, in USD.
    pub volume_min: Option<f64>,
    pub volume_max: Option<f64>,

    /// Age bounds of the opportunity, in minutes.
    pub time_min: Option<f64>,
    pub time_max: Option<f64>,

    /// Base coins to keep (`BTC` for `BTC/USDT`).
    pub coins: Vec<String>,
    pub buy_exchanges: Vec<String>,
    pub sell_exchanges: Vec<String>,
}

fn outside(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.is_some_and(|min| value < min) || max.is_some_and(|max| value > max)
}

fn excluded(allowed: &[String], value: &str) -> bool {
    !allowed.is_empty() && !allowed.iter().any(|a| a == value)
}

impl PairFilter {
    pub fn matches(&self, pair: &ArbitragePair, now: DateTime<Utc>) -> bool {
        if outside(pair.spread, self.spread_min, self.spread_max) {
            return false;
        }
        if let Some(volume) = pair.available_volume_usd {
            if outside(volume, self.volume_min, self.volume_max) {
                return false;
            }
        }
        if let Some(since) = pair.alive_since() {
            let age_secs = (now - since).num_seconds() as f64;
            let min = self.time_min.map(|m| m * 60.0);
            let max = self.time_max.map(|m| m * 60.0);
            if outside(age_secs, min, max) {
                return false;
            }
        }

        !excluded(&self.coins, pair.base_coin())
            && !excluded(&self.buy_exchanges, &pair.buy_exchange)
            && !excluded(&self.sell_exchanges, &pair.sell_exchange)
    }

    pub fn apply(&self, pairs: Vec<ArbitragePair>, now: DateTime<Utc>) -> Vec<ArbitragePair> {
        pairs
            .into_iter()
            .filter(|pair| self.matches(pair, now))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Coin,
    Network,
    #[default]
    Spread,
    /// `available_volume_usd * spread / 100`.
    Profit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coin" => Ok(SortField::Coin),
            "network" => Ok(SortField::Network),
            "spread" => Ok(SortField::Spread),
            "profit" => Ok(SortField::Profit),
            other => Err(format!(
                "unknown sort field '{}' (expected coin, network, spread or profit)",
                other
            )),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{}' (expected asc or desc)", other)),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortField::Coin => "coin",
            SortField::Network => "network",
            SortField::Spread => "spread",
            SortField::Profit => "profit",
        };
        f.write_str(name)
    }
}

/// Sort in place; equal keys keep their backend order.
pub fn sort_pairs(pairs: &mut [ArbitragePair], field: SortField, order: SortOrder) {
    pairs.sort_by(|a, b| {
        let ordering = match field {
            SortField::Coin => a.base_coin().cmp(b.base_coin()),
            SortField::Network => a
                .network
                .as_deref()
                .unwrap_or_default()
                .cmp(b.network.as_deref().unwrap_or_default()),
            SortField::Spread => a.spread.total_cmp(&b.spread),
            SortField::Profit => a.profit_usd().total_cmp(&b.profit_usd()),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// Filter plus ordering, as the pairs screen shows them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairView {
    pub filter: PairFilter,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

impl PairView {
    /// Build a view from a user's stored settings.
    ///
    /// Ranges are read only when both ends are present, and the ordering only
    /// when both field and order are. Numbers may be plain or extended JSON
    /// (`{"$numberDouble": "0.5"}`).
    pub fn from_settings(settings: &Value) -> Self {
        let mut view = PairView::default();
        let filter = &mut view.filter;

        if let Some((min, max)) = range(settings, "spread_min", "spread_max") {
            filter.spread_min = Some(min);
            filter.spread_max = Some(max);
        }
        if let Some((min, max)) = range(settings, "volume_min", "volume_max") {
            filter.volume_min = Some(min);
            filter.volume_max = Some(max);
        }
        if let Some((min, max)) = range(settings, "time_min", "time_max") {
            filter.time_min = Some(min);
            filter.time_max = Some(max);
        }
        filter.coins = strings(settings, "selected_coins");
        filter.buy_exchanges = strings(settings, "selected_buy_exchanges");
        filter.sell_exchanges = strings(settings, "selected_sell_exchanges");

        let field = settings.get("sort_field").and_then(Value::as_str);
        let order = settings.get("sort_order").and_then(Value::as_str);
        if let (Some(field), Some(order)) = (field, order) {
            match (field.parse::<SortField>(), order.parse::<SortOrder>()) {
                (Ok(field), Ok(order)) => {
                    view.sort_field = field;
                    view.sort_order = order;
                }
                _ => tracing::debug!(field, order, "Ignoring stored sort settings"),
            }
        }
        view
    }

    /// Filter and order the active pairs; pins are left untouched.
    pub fn apply(&self, snapshot: &mut PairsSnapshot, now: DateTime<Utc>) {
        let active = std::mem::take(&mut snapshot.active_pairs);
        snapshot.active_pairs = self.filter.apply(active, now);
        sort_pairs(&mut snapshot.active_pairs, self.sort_field, self.sort_order);
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => ["$numberDouble", "$numberInt", "$numberLong"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(number),
        _ => None,
    }
}

fn range(settings: &Value, min_key: &str, max_key: &str) -> Option<(f64, f64)> {
    let min = settings.get(min_key).and_then(number)?;
    let max = settings.get(max_key).and_then(number)?;
    Some((min, max))
}

fn strings(settings: &Value, key: &str) -> Vec<String> {
    settings
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
