use std::sync::Arc;

use crate::db::queries;
use crate::state::AppState;

/// Send the booking confirmation email at most once. Checked against the
/// sent flag right before sending; the flag is only written back after a
/// successful send, so a failed attempt can be retried by a later trigger.
/// Never propagates errors to the payment flow that spawned it.
pub async fn send_booking_confirmation(state: Arc<AppState>, booking_id: String) {
    let (booking, email, car_name) = {
        let db = state.db.lock().unwrap();

        let booking = match queries::get_booking(&db, &booking_id) {
            Ok(Some(b)) => b,
            Ok(None) => {
                tracing::warn!(booking_id = %booking_id, "confirmation email for unknown booking");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load booking for confirmation email");
                return;
            }
        };

        if booking.confirmation_email_sent {
            return;
        }

        let email = match queries::get_user_by_id(&db, &booking.user_id) {
            Ok(Some(u)) => u.email,
            _ => {
                tracing::warn!(booking_id = %booking_id, "no renter email for confirmation");
                return;
            }
        };
        let car_name = queries::get_car(&db, &booking.car_id)
            .ok()
            .flatten()
            .map(|c| format!("{} {}", c.brand, c.name))
            .unwrap_or_else(|| "your car".to_string());

        (booking, email, car_name)
    };

    let subject = "Booking confirmed";
    let body = format!(
        "Your booking for {car_name} is confirmed.\n\
         Dates: {} to {}\n\
         Pickup: {}\n\
         Dropoff: {}\n\
         Amount paid: {}\n\
         Booking reference: {}",
        booking.start_date,
        booking.end_date,
        booking.pickup_location,
        booking.dropoff_location,
        booking.total_amount,
        booking.id,
    );

    match state.mailer.send(&email, subject, &body).await {
        Ok(outcome) => {
            let db = state.db.lock().unwrap();
            if let Err(e) =
                queries::mark_confirmation_email_sent(&db, &booking.id, &outcome.message_id)
            {
                tracing::error!(error = %e, "failed to record confirmation email");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, booking_id = %booking.id, "failed to send confirmation email");
        }
    }
}

pub async fn send_otp_email(state: &AppState, to: &str, code: &str) -> anyhow::Result<()> {
    let body = format!(
        "Your one-time login code is {code}. It is valid for 5 minutes.\n\
         If you did not request this, you can ignore this email."
    );
    state.mailer.send(to, "Your login code", &body).await?;
    Ok(())
}
