use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, PaymentStatus, User};
use crate::services::availability;
use crate::services::payments::{signature, GatewayOrder};
use crate::state::{AppState, OwnerContact};

pub const CANCEL_CUTOFF_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct CreateBookingInput {
    pub car_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub pickup_location: String,
    pub dropoff_location: String,
}

#[derive(Debug, Clone)]
pub struct ConfirmPaymentInput {
    pub booking_id: String,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug)]
pub struct PollOutcome {
    pub booking: Booking,
    pub verified: bool,
    pub expired: bool,
}

/// Create a booking in its initial unpaid state. The car's rate and the
/// owner contact are snapshotted; later rate changes do not affect the
/// stored total.
pub fn create_booking(
    conn: &Connection,
    owner: &OwnerContact,
    grace_minutes: i64,
    user_id: &str,
    input: &CreateBookingInput,
) -> Result<Booking, AppError> {
    if input.pickup_location.trim().is_empty() || input.dropoff_location.trim().is_empty() {
        return Err(AppError::Validation(
            "pickup and dropoff locations are required".to_string(),
        ));
    }

    let today = Utc::now().date_naive();
    if input.start_date < today {
        return Err(AppError::Validation(
            "start date cannot be in the past".to_string(),
        ));
    }
    if input.end_date <= input.start_date {
        return Err(AppError::Validation(
            "end date must be after start date".to_string(),
        ));
    }

    let car = queries::get_car(conn, &input.car_id)?
        .ok_or_else(|| AppError::NotFound("car not found".to_string()))?;
    if !car.available {
        return Err(AppError::Validation("car is not available".to_string()));
    }

    if !availability::is_available(conn, &car.id, input.start_date, input.end_date)? {
        return Err(AppError::Conflict(
            "car is not available for the selected dates".to_string(),
        ));
    }

    let total_days = (input.end_date - input.start_date).num_days();
    let total_amount = total_days * car.rent_per_day;

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        car_id: car.id.clone(),
        start_date: input.start_date,
        end_date: input.end_date,
        total_days,
        total_amount,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_verified: false,
        payment_deadline: Some(now + Duration::minutes(grace_minutes)),
        order_id: None,
        payment_id: None,
        payment_signature: None,
        payment_attempts: 0,
        payment_error: None,
        confirmation_email_sent: false,
        confirmation_email_sent_at: None,
        confirmation_email_message_id: None,
        pickup_location: input.pickup_location.trim().to_string(),
        dropoff_location: input.dropoff_location.trim().to_string(),
        owner_phone: owner.phone.clone(),
        owner_upi_id: owner.upi_id.clone(),
        created_at: now,
        updated_at: now,
    };

    queries::create_booking(conn, &booking)?;
    tracing::info!(booking_id = %booking.id, car_id = %car.id, "booking created");
    Ok(booking)
}

/// Create a gateway order for the booking's total. Retryable; each call
/// bumps the attempt counter and replaces any previous order ref.
pub async fn initiate_payment(
    state: &AppState,
    booking_id: &str,
    requester: &User,
) -> Result<(Booking, GatewayOrder), AppError> {
    let booking = {
        let db = state.db.lock().unwrap();
        let booking = queries::get_booking(&db, booking_id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
        if booking.user_id != requester.id && !requester.role.is_admin() {
            return Err(AppError::Forbidden(
                "not authorized for this booking".to_string(),
            ));
        }
        if booking.payment_status == PaymentStatus::Paid {
            return Err(AppError::Conflict("booking is already paid".to_string()));
        }
        booking
    };

    // Gateway amounts are in the smallest currency unit.
    let amount = booking.total_amount * 100;
    let receipt = order_receipt(&booking.id);

    let order = state
        .payments
        .create_order(amount, "INR", &receipt)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    let updated = {
        let db = state.db.lock().unwrap();
        // The lock was released across the gateway call; the booking may have
        // been confirmed by a webhook or the owner in the meantime. Paid is
        // terminal, so that state must not be demoted to processing.
        if !queries::record_payment_order(&db, &booking.id, &order.id)? {
            return Err(AppError::Conflict("booking is already paid".to_string()));
        }
        queries::get_booking(&db, &booking.id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?
    };

    tracing::info!(booking_id = %updated.id, order_id = %order.id,
                   attempt = updated.payment_attempts, "payment order created");
    Ok((updated, order))
}

/// Gateway receipts are capped at 40 chars.
fn order_receipt(booking_id: &str) -> String {
    let tail: String = booking_id
        .chars()
        .rev()
        .take(8)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("bk_{tail}_{}", Utc::now().timestamp())
}

/// Signature-verified payment confirmation. Already-paid bookings are a
/// success no-op; the second element reports whether this call performed
/// the paid transition (and so should trigger the confirmation email).
pub fn confirm_payment(
    conn: &Connection,
    key_secret: &str,
    requester: &User,
    input: &ConfirmPaymentInput,
) -> Result<(Booking, bool), AppError> {
    let booking = queries::get_booking(conn, &input.booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    if booking.user_id != requester.id {
        return Err(AppError::Forbidden(
            "not authorized to verify this booking".to_string(),
        ));
    }

    if booking.payment_status == PaymentStatus::Paid {
        return Ok((booking, false));
    }

    match &booking.order_id {
        Some(stored) if *stored == input.order_id => {}
        _ => return Err(AppError::Validation("invalid order id".to_string())),
    }

    if !signature::verify_payment_signature(
        &input.order_id,
        &input.payment_id,
        &input.signature,
        key_secret,
    ) {
        queries::apply_payment_failure(conn, &booking.id, "invalid payment signature")?;
        tracing::warn!(booking_id = %booking.id, "payment signature mismatch");
        return Err(AppError::Signature("invalid payment signature".to_string()));
    }

    queries::apply_payment_success(conn, &booking.id, Some(&input.payment_id), Some(&input.signature))?;
    let updated = queries::get_booking(conn, &booking.id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    tracing::info!(booking_id = %updated.id, "payment confirmed");
    Ok((updated, true))
}

/// Out-of-band confirmation by the owner or an admin ("money received").
/// Same success path as `confirm_payment`, without a signature.
pub fn confirm_payment_manual(
    conn: &Connection,
    requester: &User,
    booking_id: &str,
) -> Result<(Booking, bool), AppError> {
    if !requester.is_owner && !requester.role.is_admin() {
        return Err(AppError::Forbidden(
            "not authorized to confirm payments".to_string(),
        ));
    }

    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    if booking.payment_status == PaymentStatus::Paid {
        return Ok((booking, false));
    }

    queries::apply_payment_success(conn, &booking.id, None, None)?;
    let updated = queries::get_booking(conn, &booking.id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    tracing::info!(booking_id = %updated.id, "payment confirmed manually");
    Ok((updated, true))
}

/// Renter-side polling of the manual payment flow. Enforces the payment
/// deadline; a booking whose deadline passed unpaid is reported expired
/// without being mutated in storage.
pub fn verify_payment_poll(
    conn: &Connection,
    requester: &User,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<PollOutcome, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    if booking.user_id != requester.id {
        return Err(AppError::Forbidden(
            "not authorized to verify this booking".to_string(),
        ));
    }

    if booking.is_expired(now) {
        return Ok(PollOutcome {
            booking,
            verified: false,
            expired: true,
        });
    }

    if booking.payment_status == PaymentStatus::Paid {
        return Ok(PollOutcome {
            booking,
            verified: true,
            expired: false,
        });
    }

    if booking.payment_verified {
        queries::apply_payment_success(conn, &booking.id, None, None)?;
        let updated = queries::get_booking(conn, &booking.id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
        return Ok(PollOutcome {
            booking: updated,
            verified: true,
            expired: false,
        });
    }

    Ok(PollOutcome {
        booking,
        verified: false,
        expired: false,
    })
}

/// Cancel a booking. Renters must be at least 24 hours out from the start
/// date; admins may cancel at any time. Payment status is left untouched.
pub fn cancel_booking(
    conn: &Connection,
    requester: &User,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    let is_admin = requester.role.is_admin();
    if booking.user_id != requester.id && !is_admin {
        return Err(AppError::Forbidden(
            "not authorized to cancel this booking".to_string(),
        ));
    }

    if !is_admin {
        let start = booking.start_date.and_hms_opt(0, 0, 0).unwrap_or(now);
        let hours_until_start = (start - now).num_hours();
        if hours_until_start < CANCEL_CUTOFF_HOURS {
            return Err(AppError::Validation(format!(
                "booking can only be cancelled at least {CANCEL_CUTOFF_HOURS} hours before the start date"
            )));
        }
    }

    queries::update_booking_status(conn, &booking.id, &BookingStatus::Cancelled)?;
    let updated = queries::get_booking(conn, &booking.id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    tracing::info!(booking_id = %updated.id, "booking cancelled");
    Ok(updated)
}

/// Apply a signature-verified gateway webhook. At-least-once delivery is
/// expected: an already-paid booking is left untouched. Returns the booking
/// when this call performed the paid transition.
pub fn handle_webhook_event(
    conn: &Connection,
    webhook_secret: &str,
    raw_body: &str,
    signature_header: &str,
) -> Result<Option<Booking>, AppError> {
    if webhook_secret.is_empty() {
        tracing::warn!("webhook secret not configured, acknowledging without processing");
        return Ok(None);
    }

    if !signature::verify_webhook_signature(raw_body, signature_header, webhook_secret) {
        tracing::warn!("invalid webhook signature");
        return Err(AppError::Signature("invalid webhook signature".to_string()));
    }

    let event: serde_json::Value = serde_json::from_str(raw_body)
        .map_err(|_| AppError::Validation("malformed webhook payload".to_string()))?;

    let event_name = event.get("event").and_then(|v| v.as_str()).unwrap_or("");
    if event_name != "payment.captured" {
        tracing::info!(event = %event_name, "ignoring webhook event");
        return Ok(None);
    }

    let entity = &event["payload"]["payment"]["entity"];
    let order_id = entity.get("order_id").and_then(|v| v.as_str());
    let payment_id = entity.get("id").and_then(|v| v.as_str());
    let (order_id, payment_id) = match (order_id, payment_id) {
        (Some(o), Some(p)) => (o, p),
        _ => return Err(AppError::Validation("malformed webhook payload".to_string())),
    };

    let booking = match queries::get_booking_by_order_id(conn, order_id)? {
        Some(b) => b,
        None => {
            tracing::warn!(order_id = %order_id, "webhook for unknown order");
            return Ok(None);
        }
    };

    if booking.payment_status == PaymentStatus::Paid {
        return Ok(None);
    }

    queries::apply_payment_success(conn, &booking.id, Some(payment_id), None)?;
    let updated = queries::get_booking(conn, &booking.id)?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    tracing::info!(booking_id = %updated.id, order_id = %order_id, "payment captured via webhook");
    Ok(Some(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::Role;

    fn setup() -> (Connection, User) {
        let conn = db::init_db(":memory:").unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, name, email, password_hash) VALUES ('u1', 'Renter', 'r@example.com', 'x');
             INSERT INTO cars (id, name, model, brand, car_type, seats, rent_per_day, created_at)
             VALUES ('car-x', 'Swift', '2022', 'Suzuki', 'Hatchback', 5, 50, datetime('now'));",
        )
        .unwrap();
        let renter = User {
            id: "u1".to_string(),
            name: "Renter".to_string(),
            email: "r@example.com".to_string(),
            password_hash: "x".to_string(),
            phone: String::new(),
            role: Role::User,
            is_owner: false,
            otp_code: None,
            otp_expires_at: None,
            created_at: Utc::now().naive_utc(),
        };
        (conn, renter)
    }

    fn owner_contact() -> OwnerContact {
        OwnerContact {
            name: "Owner".to_string(),
            phone: "+911234567890".to_string(),
            upi_id: "owner@upi".to_string(),
        }
    }

    fn future_input(days_out: i64, len_days: i64) -> CreateBookingInput {
        let start = Utc::now().date_naive() + Duration::days(days_out);
        CreateBookingInput {
            car_id: "car-x".to_string(),
            start_date: start,
            end_date: start + Duration::days(len_days),
            pickup_location: "Airport".to_string(),
            dropoff_location: "Downtown".to_string(),
        }
    }

    #[test]
    fn test_create_computes_totals_from_rate_snapshot() {
        let (conn, _) = setup();
        // rate 50/day, 3 days
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();
        assert_eq!(booking.total_days, 3);
        assert_eq!(booking.total_amount, 150);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert!(booking.payment_deadline.is_some());
        assert_eq!(booking.owner_upi_id, "owner@upi");
    }

    #[test]
    fn test_create_rejects_end_before_start() {
        let (conn, _) = setup();
        let mut input = future_input(10, 3);
        input.end_date = input.start_date;
        let err = create_booking(&conn, &owner_contact(), 15, "u1", &input).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Nothing persisted.
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_create_rejects_past_start() {
        let (conn, _) = setup();
        let input = CreateBookingInput {
            car_id: "car-x".to_string(),
            start_date: Utc::now().date_naive() - Duration::days(1),
            end_date: Utc::now().date_naive() + Duration::days(1),
            pickup_location: "Airport".to_string(),
            dropoff_location: "Downtown".to_string(),
        };
        assert!(matches!(
            create_booking(&conn, &owner_contact(), 15, "u1", &input),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_create_rejects_empty_locations() {
        let (conn, _) = setup();
        let mut input = future_input(10, 3);
        input.pickup_location = "  ".to_string();
        assert!(matches!(
            create_booking(&conn, &owner_contact(), 15, "u1", &input),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_create_rejects_unknown_car() {
        let (conn, _) = setup();
        let mut input = future_input(10, 3);
        input.car_id = "missing".to_string();
        assert!(matches!(
            create_booking(&conn, &owner_contact(), 15, "u1", &input),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_conflicts_with_paid_overlap() {
        let (conn, renter) = setup();
        let first =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 4)).unwrap();
        queries::record_payment_order(&conn, &first.id, "order_1").unwrap();
        let input = ConfirmPaymentInput {
            booking_id: first.id.clone(),
            order_id: "order_1".to_string(),
            payment_id: "pay_1".to_string(),
            signature: signature::payment_signature("order_1", "pay_1", "secret"),
        };
        confirm_payment(&conn, "secret", &renter, &input).unwrap();

        // Overlapping request on the same car now conflicts.
        let err = create_booking(&conn, &owner_contact(), 15, "u1", &future_input(12, 4))
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_order_ref_not_recorded_on_paid_booking() {
        let (conn, _) = setup();
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();
        queries::apply_payment_success(&conn, &booking.id, Some("pay_oob"), None).unwrap();

        // A late order attachment must not demote the terminal paid state.
        assert!(!queries::record_payment_order(&conn, &booking.id, "order_late").unwrap());

        let stored = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.order_id, None);
        assert_eq!(stored.payment_attempts, 0);
    }

    #[test]
    fn test_confirm_payment_success_and_idempotent_noop() {
        let (conn, renter) = setup();
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();
        queries::record_payment_order(&conn, &booking.id, "order_1").unwrap();

        let input = ConfirmPaymentInput {
            booking_id: booking.id.clone(),
            order_id: "order_1".to_string(),
            payment_id: "pay_1".to_string(),
            signature: signature::payment_signature("order_1", "pay_1", "secret"),
        };

        let (confirmed, newly_paid) = confirm_payment(&conn, "secret", &renter, &input).unwrap();
        assert!(newly_paid);
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert!(confirmed.payment_verified);
        assert_eq!(confirmed.payment_id.as_deref(), Some("pay_1"));

        // Second identical call: success, but no new transition.
        let (again, newly_paid) = confirm_payment(&conn, "secret", &renter, &input).unwrap();
        assert!(!newly_paid);
        assert_eq!(again.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_confirm_payment_tampered_signature_fails_closed() {
        let (conn, renter) = setup();
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();
        queries::record_payment_order(&conn, &booking.id, "order_1").unwrap();

        let input = ConfirmPaymentInput {
            booking_id: booking.id.clone(),
            order_id: "order_1".to_string(),
            payment_id: "pay_1".to_string(),
            signature: "deadbeef".to_string(),
        };

        let err = confirm_payment(&conn, "secret", &renter, &input).unwrap_err();
        assert!(matches!(err, AppError::Signature(_)));

        let stored = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
        assert_eq!(stored.payment_error.as_deref(), Some("invalid payment signature"));
        // Booking status untouched by the failed attempt.
        assert_eq!(stored.status, BookingStatus::Pending);
    }

    #[test]
    fn test_confirm_payment_order_mismatch() {
        let (conn, renter) = setup();
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();
        queries::record_payment_order(&conn, &booking.id, "order_1").unwrap();

        let input = ConfirmPaymentInput {
            booking_id: booking.id.clone(),
            order_id: "order_other".to_string(),
            payment_id: "pay_1".to_string(),
            signature: signature::payment_signature("order_other", "pay_1", "secret"),
        };
        assert!(matches!(
            confirm_payment(&conn, "secret", &renter, &input),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_manual_confirm_requires_owner_or_admin() {
        let (conn, renter) = setup();
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();

        assert!(matches!(
            confirm_payment_manual(&conn, &renter, &booking.id),
            Err(AppError::Forbidden(_))
        ));

        let mut owner = renter.clone();
        owner.is_owner = true;
        let (confirmed, newly_paid) = confirm_payment_manual(&conn, &owner, &booking.id).unwrap();
        assert!(newly_paid);
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);

        let (_, newly_paid) = confirm_payment_manual(&conn, &owner, &booking.id).unwrap();
        assert!(!newly_paid);
    }

    #[test]
    fn test_cancel_cutoff_for_renter() {
        let (conn, renter) = setup();
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();
        let now = Utc::now().naive_utc();

        // Within 24h of the start: rejected for the renter.
        let close = booking.start_date.and_hms_opt(0, 0, 0).unwrap() - Duration::hours(3);
        assert!(matches!(
            cancel_booking(&conn, &renter, &booking.id, close),
            Err(AppError::Validation(_))
        ));

        // Far enough out: allowed, payment status untouched.
        let cancelled = cancel_booking(&conn, &renter, &booking.id, now).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_admin_cancels_inside_cutoff() {
        let (conn, renter) = setup();
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();

        let mut admin = renter.clone();
        admin.id = "admin-1".to_string();
        admin.role = Role::Admin;

        let close = booking.start_date.and_hms_opt(0, 0, 0).unwrap() - Duration::hours(3);
        let cancelled = cancel_booking(&conn, &admin, &booking.id, close).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_poll_reports_expired_without_persisting() {
        let (conn, renter) = setup();
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();

        let after_deadline = booking.payment_deadline.unwrap() + Duration::minutes(1);
        let outcome = verify_payment_poll(&conn, &renter, &booking.id, after_deadline).unwrap();
        assert!(outcome.expired);
        assert!(!outcome.verified);

        // Stored payment status is still pending; expiry is derived.
        let stored = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert_eq!(stored.status, BookingStatus::Pending);
    }

    #[test]
    fn test_poll_promotes_after_owner_verification() {
        let (conn, renter) = setup();
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();

        conn.execute(
            "UPDATE bookings SET payment_verified = 1 WHERE id = ?1",
            [&booking.id],
        )
        .unwrap();

        let now = Utc::now().naive_utc();
        let outcome = verify_payment_poll(&conn, &renter, &booking.id, now).unwrap();
        assert!(outcome.verified);
        assert_eq!(outcome.booking.payment_status, PaymentStatus::Paid);
        assert_eq!(outcome.booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_webhook_applies_capture_once() {
        let (conn, _) = setup();
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();
        queries::record_payment_order(&conn, &booking.id, "order_w").unwrap();

        let body = serde_json::json!({
            "event": "payment.captured",
            "payload": { "payment": { "entity": { "id": "pay_w", "order_id": "order_w" } } },
        })
        .to_string();
        let sig = signature::webhook_signature(&body, "hook-secret");

        let applied = handle_webhook_event(&conn, "hook-secret", &body, &sig).unwrap();
        assert!(applied.is_some());
        assert_eq!(
            applied.unwrap().payment_status,
            PaymentStatus::Paid
        );

        // Duplicate delivery: verified but a no-op.
        let again = handle_webhook_event(&conn, "hook-secret", &body, &sig).unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn test_webhook_rejects_bad_signature_without_mutating() {
        let (conn, _) = setup();
        let booking =
            create_booking(&conn, &owner_contact(), 15, "u1", &future_input(10, 3)).unwrap();
        queries::record_payment_order(&conn, &booking.id, "order_w").unwrap();

        let body = serde_json::json!({
            "event": "payment.captured",
            "payload": { "payment": { "entity": { "id": "pay_w", "order_id": "order_w" } } },
        })
        .to_string();

        let err = handle_webhook_event(&conn, "hook-secret", &body, "bad-signature").unwrap_err();
        assert!(matches!(err, AppError::Signature(_)));

        let stored = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Processing);
    }
}
