//! Typed access to the arbitrage backend.
//!
//! Every call goes through the shared [`ResilientClient`]. Apart from user
//! lookup and registration, failures resolve to the fallback value the UI
//! expects (empty lists, `{"success": false}`, local-only settings).

use std::sync::Arc;

use serde_json::{json, Value};
use url::Url;

use crate::api::filter::PairView;
use crate::api::license::LicenseThrottle;
use crate::api::types::{ApiError, ApiResult, License, LicenseEnvelope, PairsSnapshot};
use crate::config::ClientConfig;
use crate::http::{FetchOutcome, RequestOptions, ResilientClient};
use crate::resilience::CircuitOpen;

/// Data service shared by the CLI and the connectivity monitor.
#[derive(Debug, Clone)]
pub struct DataService {
    client: ResilientClient,
    license: Arc<LicenseThrottle>,
}

impl DataService {
    pub fn new(client: ResilientClient, config: &ClientConfig) -> Self {
        Self {
            client,
            license: Arc::new(LicenseThrottle::new(config.license.clone())),
        }
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    pub fn license_throttle(&self) -> &LicenseThrottle {
        &self.license
    }

    async fn call(&self, url: &str, options: RequestOptions) -> Result<FetchOutcome, CircuitOpen> {
        self.client.fetch(url, &options).await
    }

    fn url_with_query(&self, path: &str, query: &[(&str, String)]) -> String {
        let raw = self.client.url(path);
        match Url::parse(&raw) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
                url.into()
            }
            // Left as-is; the client reports it as an invalid request.
            Err(_) => raw,
        }
    }

    // --- Users ---

    pub async fn get_user(&self, telegram_id: i64) -> ApiResult<Value> {
        let url = self.client.url(&format!("/users/{}", telegram_id));
        let outcome = self.call(&url, RequestOptions::get()).await.map_err(|e| {
            tracing::error!(telegram_id, error = %e, "Failed to get user");
            ApiError::UserNotFound(e.to_string())
        })?;

        let value = outcome.into_value();
        match reported_failure(&value) {
            Some(message) => {
                tracing::error!(telegram_id, error = %message, "Failed to get user");
                Err(ApiError::UserNotFound(message))
            }
            None => Ok(value),
        }
    }

    pub async fn create_user(&self, telegram_id: i64, username: Option<&str>) -> ApiResult<Value> {
        let url = self.url_with_query(
            &format!("/users/{}", telegram_id),
            &[("username", username.unwrap_or("unknown").to_string())],
        );
        let outcome = self.call(&url, RequestOptions::post()).await.map_err(|e| {
            tracing::error!(telegram_id, error = %e, "Failed to create user");
            ApiError::CreateUser(e.to_string())
        })?;

        let value = outcome.into_value();
        match reported_failure(&value) {
            Some(message) => {
                tracing::error!(telegram_id, error = %message, "Failed to create user");
                Err(ApiError::CreateUser(message))
            }
            None => Ok(value),
        }
    }

    pub async fn update_last_active(&self, telegram_id: i64) -> Value {
        let url = self.client.url(&format!("/users/{}/last_active", telegram_id));
        self.call(&url, RequestOptions::put())
            .await
            .map_or_else(|_| json!({ "success": false }), FetchOutcome::into_value)
    }

    // --- Licenses ---

    pub async fn get_user_license(&self, telegram_id: i64) -> LicenseEnvelope {
        let url = self.client.url(&format!("/users/{}/license", telegram_id));
        match self.call(&url, RequestOptions::get()).await {
            Ok(FetchOutcome::Success(value)) => {
                if value.get("success").and_then(Value::as_bool) == Some(false) {
                    tracing::warn!(telegram_id, "Failed to get license data");
                    return LicenseEnvelope::unavailable();
                }
                LicenseEnvelope::from_value(value)
            }
            Ok(FetchOutcome::Failure(_)) => {
                tracing::warn!(telegram_id, "Failed to get license data");
                LicenseEnvelope::unavailable()
            }
            Err(_) => LicenseEnvelope::unavailable(),
        }
    }

    pub async fn update_user_license(&self, telegram_id: i64, license: &License) -> Value {
        let url = self.client.url(&format!("/users/{}/license", telegram_id));
        let body = match serde_json::to_value(license) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "License could not be serialized");
                return json!({ "success": false });
            }
        };
        self.call(&url, RequestOptions::put().json(body))
            .await
            .map_or_else(|_| json!({ "success": false }), FetchOutcome::into_value)
    }

    /// Fetch the license unless a check is running or one ran too recently.
    ///
    /// `None` means "no new information": throttled, failed, or no license
    /// in the response.
    pub async fn check_license_with_throttling(&self, telegram_id: i64) -> Option<LicenseEnvelope> {
        let guard = self.license.try_begin()?;

        let envelope = self.get_user_license(telegram_id).await;
        if envelope.license.is_some() {
            guard.succeed();
            Some(envelope)
        } else {
            let next_in = guard.fail();
            tracing::warn!(
                telegram_id,
                next_check_secs = next_in.as_secs(),
                "Invalid license data"
            );
            None
        }
    }

    // --- Exchanges, coins, pairs ---

    pub async fn get_exchanges(&self) -> Vec<Value> {
        let url = self.client.url("/exchanges");
        list_or_empty(self.call(&url, RequestOptions::get()).await, "exchanges")
    }

    pub async fn get_coins(&self) -> Vec<Value> {
        let url = self.client.url("/coins");
        list_or_empty(self.call(&url, RequestOptions::get()).await, "coins")
    }

    /// Current opportunities, with `is_pinned` set from the user's pins.
    pub async fn get_pairs(&self, user_id: Option<i64>) -> PairsSnapshot {
        let url = match user_id {
            Some(id) => self.url_with_query("/pairs", &[("user_id", id.to_string())]),
            None => self.client.url("/pairs"),
        };

        let value = match self.call(&url, RequestOptions::get()).await {
            Ok(FetchOutcome::Success(value)) => value,
            _ => {
                tracing::warn!("Failed to get pairs");
                return PairsSnapshot::default();
            }
        };

        match serde_json::from_value::<PairsSnapshot>(value) {
            Ok(mut snapshot) => {
                snapshot.mark_pinned();
                snapshot
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unexpected pairs payload");
                PairsSnapshot::default()
            }
        }
    }

    pub async fn pin_pair(&self, pair_id: &str, user_id: Option<i64>) -> Value {
        self.pin_request(pair_id, user_id, RequestOptions::post()).await
    }

    pub async fn unpin_pair(&self, pair_id: &str, user_id: Option<i64>) -> Value {
        self.pin_request(pair_id, user_id, RequestOptions::delete()).await
    }

    async fn pin_request(&self, pair_id: &str, user_id: Option<i64>, options: RequestOptions) -> Value {
        let Some(user_id) = user_id else {
            return json!({ "success": false, "message": "User ID required" });
        };
        let url = self.url_with_query(
            &format!("/pairs/{}/pin", pair_id),
            &[("user_id", user_id.to_string())],
        );
        match self.call(&url, options).await {
            Ok(outcome) => outcome.into_value(),
            Err(e) => json!({ "success": false, "message": e.to_string() }),
        }
    }

    // --- Settings and notifications ---

    pub async fn get_user_settings(&self, telegram_id: i64) -> Value {
        let url = self.client.url(&format!("/users/{}/settings", telegram_id));
        self.call(&url, RequestOptions::get())
            .await
            .map_or_else(
                |_| json!({ "success": false, "settings": {} }),
                FetchOutcome::into_value,
            )
    }

    /// Pair filter and ordering saved in the user's settings.
    ///
    /// Accepts `{"settings": {..}}` as well as a bare settings object; any
    /// failure yields the default view (spread, descending, no filter).
    pub async fn get_pair_view(&self, telegram_id: i64) -> PairView {
        let value = self.get_user_settings(telegram_id).await;
        let settings = value.get("settings").unwrap_or(&value);
        PairView::from_settings(settings)
    }

    /// Push settings; while the endpoint is disabled the change stays local.
    pub async fn update_user_settings(&self, telegram_id: i64, settings: &Value) -> Value {
        let url = self.client.url(&format!("/users/{}/settings", telegram_id));
        match self.call(&url, RequestOptions::put().json(settings.clone())).await {
            Ok(outcome) => outcome.into_value(),
            Err(_) => {
                tracing::warn!(telegram_id, "Settings update skipped: endpoint temporarily disabled");
                json!({ "success": true, "localOnly": true })
            }
        }
    }

    pub async fn get_user_notifications(&self, telegram_id: i64) -> Value {
        let url = self.client.url(&format!("/users/{}/notifications", telegram_id));
        self.call(&url, RequestOptions::get())
            .await
            .map_or_else(|_| json!({ "notifications": [] }), FetchOutcome::into_value)
    }

    pub async fn update_notification_settings(&self, telegram_id: i64, settings: &Value) -> Value {
        let url = self
            .client
            .url(&format!("/users/{}/notification_settings", telegram_id));
        self.call(&url, RequestOptions::put().json(settings.clone()))
            .await
            .map_or_else(|_| json!({ "success": false }), FetchOutcome::into_value)
    }

    /// Clear every endpoint's error state and the license backoff.
    pub fn reset_all_error_status(&self) {
        self.client.reset_all_error_status();
        self.license.reset();
    }
}

/// Error message of a `{"success": false, "error": ".."}` payload.
fn reported_failure(value: &Value) -> Option<String> {
    let succeeded = value.get("success").and_then(Value::as_bool).unwrap_or(false);
    if succeeded {
        return None;
    }
    value
        .get("error")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

fn list_or_empty(outcome: Result<FetchOutcome, CircuitOpen>, what: &str) -> Vec<Value> {
    match outcome {
        Ok(FetchOutcome::Success(Value::Array(items))) => items,
        _ => {
            tracing::warn!(resource = what, "Failed to get list, using empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_failure() {
        assert_eq!(
            reported_failure(&json!({ "success": false, "error": "no such user" })),
            Some("no such user".to_string())
        );
        assert_eq!(reported_failure(&json!({ "error": "missing flag" })), Some("missing flag".to_string()));
        assert_eq!(reported_failure(&json!({ "success": true, "error": "ignored" })), None);
        assert_eq!(reported_failure(&json!({ "success": false })), None);
        assert_eq!(reported_failure(&json!({ "telegram_id": 1 })), None);
    }

    #[test]
    fn test_url_with_query_encodes() {
        let mut config = ClientConfig::default();
        config.api.base_url = "http://localhost:9000".into();
        let client = ResilientClient::new(&config).unwrap();
        let service = DataService::new(client, &config);

        let url = service.url_with_query("/users/5", &[("username", "a b&c".to_string())]);
        assert_eq!(url, "http://localhost:9000/users/5?username=a+b%26c");
    }

    #[tokio::test]
    async fn test_pin_requires_user() {
        let config = ClientConfig::default();
        let service = DataService::new(ResilientClient::new(&config).unwrap(), &config);
        assert_eq!(
            service.pin_pair("a1", None).await,
            json!({ "success": false, "message": "User ID required" })
        );
        assert_eq!(
            service.unpin_pair("a1", None).await,
            json!({ "success": false, "message": "User ID required" })
        );
    }
}
