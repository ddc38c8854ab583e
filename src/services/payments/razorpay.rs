use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{GatewayOrder, GatewayPayment, PaymentProvider};

pub struct RazorpayProvider {
    key_id: String,
    key_secret: String,
    base_url: String,
    client: reqwest::Client,
}

impl RazorpayProvider {
    pub fn new(key_id: String, key_secret: String) -> Self {
        Self {
            key_id,
            key_secret,
            base_url: "https://api.razorpay.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: String,
    status: String,
    method: Option<String>,
    amount: i64,
}

#[async_trait]
impl PaymentProvider for RazorpayProvider {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> anyhow::Result<GatewayOrder> {
        let body = serde_json::json!({
            "amount": amount,
            "currency": currency,
            "receipt": receipt,
        });

        let order: OrderResponse = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .context("failed to reach payment gateway")?
            .error_for_status()
            .context("payment gateway rejected order creation")?
            .json()
            .await
            .context("invalid order response from payment gateway")?;

        Ok(GatewayOrder {
            id: order.id,
            amount: order.amount,
            currency: order.currency,
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> anyhow::Result<GatewayPayment> {
        let payment: PaymentResponse = self
            .client
            .get(format!("{}/payments/{payment_id}", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .context("failed to reach payment gateway")?
            .error_for_status()
            .context("payment gateway rejected payment lookup")?
            .json()
            .await
            .context("invalid payment response from payment gateway")?;

        Ok(GatewayPayment {
            id: payment.id,
            status: payment.status,
            method: payment.method,
            amount: payment.amount,
        })
    }
}
