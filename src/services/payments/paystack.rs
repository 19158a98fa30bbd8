use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{GatewayResult, InitializedPayment, PaymentProvider};

pub struct PaystackProvider {
    secret_key: String,
    client: reqwest::Client,
}

impl PaystackProvider {
    pub fn new(secret_key: String) -> Self {
        Self {
            secret_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentProvider for PaystackProvider {
    async fn initialize(
        &self,
        amount_minor: i64,
        email: &str,
        metadata: serde_json::Value,
    ) -> anyhow::Result<InitializedPayment> {
        let body = json!({
            "amount": amount_minor,
            "email": email,
            "metadata": metadata,
        });

        let resp = self
            .client
            .post("https://api.paystack.co/transaction/initialize")
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .context("failed to call Paystack initialize")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Paystack initialize response")?;

        if !status.is_success() {
            anyhow::bail!("Paystack initialize error ({}): {}", status, data);
        }

        let authorization_url = data["data"]["authorization_url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing authorization_url in Paystack response"))?
            .to_string();
        let reference = data["data"]["reference"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing reference in Paystack response"))?
            .to_string();

        Ok(InitializedPayment {
            authorization_url,
            reference,
        })
    }

    async fn verify(&self, reference: &str) -> anyhow::Result<GatewayResult> {
        let url = format!("https://api.paystack.co/transaction/verify/{reference}");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("failed to call Paystack verify")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Paystack verify response")?;

        if !status.is_success() {
            anyhow::bail!("Paystack verify error ({}): {}", status, data);
        }

        let charge_status = data["data"]["status"].as_str().unwrap_or("");
        let result = match charge_status {
            "success" => GatewayResult::Success {
                reference: reference.to_string(),
            },
            // Charge exists but has not settled; caller may poll.
            "pending" | "ongoing" | "processing" | "queued" => GatewayResult::Pending,
            _ => {
                let reason = data["data"]["gateway_response"]
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .unwrap_or("transaction was not successful")
                    .to_string();
                GatewayResult::Failure { reason }
            }
        };
        Ok(result)
    }
}
