use async_trait::async_trait;
use examshop_core::{Authorization, GatewayError, InitializeRequest, PaymentGateway, PaymentStatus, Verification};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::time::Duration;

use crate::app_config::PaystackConfig;

type HmacSha512 = Hmac<Sha512>;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Paystack transaction API over HTTPS.
#[derive(Debug, Clone)]
pub struct PaystackGateway {
    http: Client,
    base_url: String,
    secret_key: String,
}

impl PaystackGateway {
    pub fn new(config: &PaystackConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        let body: Envelope<T> = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        if !status.is_success() || !body.status {
            return Err(GatewayError::Rejected(format!("{} ({})", body.message, status)));
        }
        body.data
            .ok_or_else(|| GatewayError::Malformed("response carried no data".to_string()))
    }
}

fn transport(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    reference: &'a str,
    callback_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    reference: String,
    id: Option<serde_json::Value>,
    amount: Option<i64>,
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize(&self, request: &InitializeRequest) -> Result<Authorization, GatewayError> {
        let response = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&InitializeBody {
                email: &request.email,
                amount: request.amount_minor,
                reference: &request.reference,
                callback_url: &request.callback_url,
            })
            .send()
            .await
            .map_err(transport)?;

        let data: InitializeData = Self::parse(response).await?;
        Ok(Authorization {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
        })
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        let response = self
            .http
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(transport)?;

        let data: VerifyData = Self::parse(response).await?;
        let transaction_id = match data.id {
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        };

        Ok(Verification {
            reference: data.reference,
            status: PaymentStatus::from_gateway(&data.status),
            transaction_id,
            amount_minor: data.amount,
        })
    }
}

/// Checks the hex HMAC-SHA512 of the raw webhook body against the
/// signature header. Comparison is constant-time. An empty secret never
/// verifies.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_is_accepted() {
        let body = br#"{"event":"charge.success","data":{"reference":"ABC123DEF456"}}"#;
        let signature = sign("sk_test_secret", body);

        assert!(verify_signature("sk_test_secret", body, &signature));
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let body = br#"{"event":"charge.success","data":{"reference":"ABC123DEF456"}}"#;
        let signature = sign("sk_test_secret", body);
        let tampered = br#"{"event":"charge.success","data":{"reference":"ZZZ123DEF456"}}"#;

        assert!(!verify_signature("sk_test_secret", tampered, &signature));
        assert!(!verify_signature("other_secret", body, &signature));
        assert!(!verify_signature("sk_test_secret", body, "not-hex"));
    }

    #[test]
    fn test_empty_secret_never_verifies() {
        let body = br#"{"event":"charge.success","data":{"reference":"ABC123DEF456"}}"#;
        let signature = sign("", body);

        assert!(!verify_signature("", body, &signature));
    }

    #[test]
    fn test_verify_payload_decodes() {
        let raw = r#"{"status":true,"message":"Verification successful","data":{"status":"success","reference":"ABC123DEF456","id":4099260516,"amount":2500}}"#;
        let envelope: Envelope<VerifyData> = serde_json::from_str(raw).unwrap();
        let data = envelope.data.unwrap();

        assert_eq!(PaymentStatus::from_gateway(&data.status), PaymentStatus::Succeeded);
        assert_eq!(data.amount, Some(2500));
    }
}
