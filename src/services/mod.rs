pub mod availability;
pub mod booking;
pub mod mail;
pub mod notify;
pub mod payments;
