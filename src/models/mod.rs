pub mod booking;
pub mod car;
pub mod user;

pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use car::Car;
pub use user::{Role, User};
