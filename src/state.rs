use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::mail::MailProvider;
use crate::services::payments::PaymentProvider;

/// The single configured party who receives booking payments.
#[derive(Clone, Debug)]
pub struct OwnerContact {
    pub name: String,
    pub phone: String,
    pub upi_id: String,
}

impl OwnerContact {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            name: config.owner_name.clone(),
            phone: config.owner_phone.clone(),
            upi_id: config.owner_upi_id.clone(),
        }
    }
}

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub payments: Box<dyn PaymentProvider>,
    pub mailer: Box<dyn MailProvider>,
    pub owner: OwnerContact,
}
