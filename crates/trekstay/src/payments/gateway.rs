//! Chapa gateway adapter.
//!
//! Two operations back the whole payment lifecycle: `initialize transaction`
//! (returns a hosted checkout URL) and `verify transaction`. Both speak JSON
//! over HTTPS with bearer-token auth. The trait keeps the service testable
//! with scripted outcomes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::config::ChapaConfig;

/// Payload for `POST /v1/transaction/initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializeRequest {
    pub amount: String,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub tx_ref: String,
    pub callback_url: String,
    pub return_url: String,
}

/// Successful initialization: hosted checkout plus the verbatim payload.
#[derive(Debug, Clone)]
pub struct InitializeOutcome {
    pub checkout_url: String,
    pub raw: Value,
}

/// Verification result. `confirmed` is true only when the provider reports
/// the transaction settled; anything else leaves local state untouched.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub confirmed: bool,
    pub raw: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(String),
    #[error("gateway rejected transaction: {0}")]
    Declined(String),
    #[error("gateway returned malformed payload: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(
        &self,
        request: InitializeRequest,
    ) -> Result<InitializeOutcome, GatewayError>;
    async fn verify(&self, tx_ref: &str) -> Result<VerifyOutcome, GatewayError>;
}

/// reqwest-backed client for the Chapa REST API.
pub struct ChapaClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl ChapaClient {
    pub fn new(config: &ChapaConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }
}

fn envelope_status(raw: &Value) -> Option<&str> {
    raw.get("status").and_then(Value::as_str)
}

fn envelope_message(raw: &Value) -> String {
    raw.get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message from gateway")
        .to_string()
}

/// The verify endpoint reports success both at the envelope level and inside
/// `data.status`; require agreement before confirming.
fn verification_confirmed(http_ok: bool, raw: &Value) -> bool {
    http_ok
        && envelope_status(raw) == Some("success")
        && raw
            .pointer("/data/status")
            .and_then(Value::as_str)
            .map(|status| status == "success")
            .unwrap_or(false)
}

#[async_trait]
impl PaymentGateway for ChapaClient {
    async fn initialize(
        &self,
        request: InitializeRequest,
    ) -> Result<InitializeOutcome, GatewayError> {
        let url = format!("{}/v1/transaction/initialize", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let http_ok = response.status().is_success();
        let raw: Value = response
            .json()
            .await
            .map_err(|err| GatewayError::Malformed(err.to_string()))?;

        if !http_ok || envelope_status(&raw) != Some("success") {
            return Err(GatewayError::Declined(envelope_message(&raw)));
        }

        let checkout_url = raw
            .pointer("/data/checkout_url")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::Malformed("initialize response missing checkout_url".to_string())
            })?
            .to_string();

        Ok(InitializeOutcome { checkout_url, raw })
    }

    async fn verify(&self, tx_ref: &str) -> Result<VerifyOutcome, GatewayError> {
        let url = format!("{}/v1/transaction/verify/{tx_ref}", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let http_ok = response.status().is_success();
        let raw: Value = response
            .json()
            .await
            .map_err(|err| GatewayError::Malformed(err.to_string()))?;

        Ok(VerifyOutcome {
            confirmed: verification_confirmed(http_ok, &raw),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn verification_requires_envelope_and_data_agreement() {
        let settled = json!({
            "status": "success",
            "data": { "status": "success", "tx_ref": "pay-000001" }
        });
        assert!(verification_confirmed(true, &settled));

        let pending = json!({
            "status": "success",
            "data": { "status": "pending" }
        });
        assert!(!verification_confirmed(true, &pending));

        let failed_envelope = json!({
            "status": "failed",
            "data": { "status": "success" }
        });
        assert!(!verification_confirmed(true, &failed_envelope));

        assert!(!verification_confirmed(false, &settled));
    }

    #[test]
    fn envelope_message_falls_back_when_absent() {
        assert_eq!(
            envelope_message(&json!({"status": "failed"})),
            "no message from gateway"
        );
        assert_eq!(
            envelope_message(&json!({"message": "Invalid API Key"})),
            "Invalid API Key"
        );
    }

    #[test]
    fn initialize_request_omits_missing_phone() {
        let request = InitializeRequest {
            amount: "400".to_string(),
            currency: "ETB".to_string(),
            email: "guest@example.com".to_string(),
            first_name: "Abel".to_string(),
            last_name: "Tesfaye".to_string(),
            phone_number: None,
            tx_ref: "pay-000001".to_string(),
            callback_url: "http://127.0.0.1:3000/api/chapa-webhook".to_string(),
            return_url: "http://127.0.0.1:3000/api/payments/pay-000001/complete".to_string(),
        };
        let value = serde_json::to_value(&request).expect("serializes");
        assert!(value.get("phone_number").is_none());
        assert_eq!(value["tx_ref"], "pay-000001");
    }
}
