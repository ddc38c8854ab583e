pub mod razorpay;
pub mod signature;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in the gateway's smallest currency unit.
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub status: String,
    pub method: Option<String>,
    pub amount: i64,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> anyhow::Result<GatewayOrder>;

    async fn fetch_payment(&self, payment_id: &str) -> anyhow::Result<GatewayPayment>;
}
