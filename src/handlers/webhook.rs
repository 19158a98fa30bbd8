use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::handlers::checkout::{settle_reference, Settlement};
use crate::services::payments::GatewayResult;
use crate::state::AppState;

fn validate_paystack_signature(secret_key: &str, signature: &str, body: &str) -> bool {
    let mut mac = match Hmac::<Sha512>::new_from_slice(secret_key.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    expected == signature.to_lowercase()
}

// POST /webhook/paystack — Paystack signs the raw body with the secret key
// (HMAC-SHA512, hex) in x-paystack-signature.
pub async fn paystack_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    // Skip signature validation when no secret is configured — dev mode.
    if !state.config.paystack_secret_key.is_empty() {
        let signature = headers
            .get("x-paystack-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty()
            || !validate_paystack_signature(&state.config.paystack_secret_key, signature, &body)
        {
            tracing::warn!("invalid Paystack webhook signature");
            return (StatusCode::FORBIDDEN, "Invalid signature").into_response();
        }
    }

    let event: serde_json::Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable webhook payload");
            return (StatusCode::BAD_REQUEST, "Bad payload").into_response();
        }
    };

    let event_type = event["event"].as_str().unwrap_or("");
    if event_type != "charge.success" {
        tracing::debug!(event = event_type, "ignoring webhook event");
        return StatusCode::OK.into_response();
    }

    let Some(reference) = event["data"]["reference"].as_str() else {
        tracing::warn!("charge.success event without reference");
        return (StatusCode::BAD_REQUEST, "Missing reference").into_response();
    };

    let outcome = GatewayResult::Success {
        reference: reference.to_string(),
    };

    // Always 200 once the signature checks out: the gateway retries on
    // non-2xx and a conflict here will not resolve itself.
    match settle_reference(&state, reference, &outcome) {
        Ok(Settlement::Confirmed(appointment)) => {
            tracing::info!(reference, id = %appointment.id, "webhook settled payment");
        }
        Ok(Settlement::Pending) => {}
        Err(e) => {
            tracing::warn!(reference, error = %e, "webhook settlement failed");
        }
    }
    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use super::validate_paystack_signature;
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    fn sign(secret: &str, body: &str) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let body = r#"{"event":"charge.success"}"#;
        let sig = sign("sk_test_secret", body);
        assert!(validate_paystack_signature("sk_test_secret", &sig, body));
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let body = r#"{"event":"charge.success"}"#;
        let sig = sign("sk_other", body);
        assert!(!validate_paystack_signature("sk_test_secret", &sig, body));
    }

    #[test]
    fn test_rejects_tampered_body() {
        let sig = sign("sk_test_secret", r#"{"event":"charge.success"}"#);
        assert!(!validate_paystack_signature(
            "sk_test_secret",
            &sig,
            r#"{"event":"charge.failed"}"#
        ));
    }
}
