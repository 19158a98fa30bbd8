use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Persisted payment attempt, keyed by the gateway reference. A pay-now
/// booking draft is parked in `intent_json` between initialize and verify;
/// `appointment_id` is filled in when the reference settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub appointment_id: Option<String>,
    pub provider: String,
    pub reference: String,
    pub amount_minor: i64,
    pub status: PaymentState,
    pub intent_json: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Initialized,
    Success,
    Failed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Initialized => "initialized",
            PaymentState::Success => "success",
            PaymentState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => PaymentState::Success,
            "failed" => PaymentState::Failed,
            _ => PaymentState::Initialized,
        }
    }
}
