pub mod paystack;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedPayment {
    pub authorization_url: String,
    pub reference: String,
}

/// Classified result of a verification call. `Pending` means the charge has
/// not settled yet and the same reference may be verified again later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResult {
    Success { reference: String },
    Failure { reason: String },
    Pending,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Starts a hosted checkout. `amount_minor` is in the currency's minor
    /// unit (pesewas/kobo).
    async fn initialize(
        &self,
        amount_minor: i64,
        email: &str,
        metadata: serde_json::Value,
    ) -> anyhow::Result<InitializedPayment>;

    async fn verify(&self, reference: &str) -> anyhow::Result<GatewayResult>;
}
