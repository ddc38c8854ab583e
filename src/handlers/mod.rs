pub mod admin;
pub mod auth;
pub mod bookings;
pub mod cars;
pub mod health;
pub mod payments;
