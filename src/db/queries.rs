use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, Car, PaymentStatus, Role, User};

const DT_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(DT_FMT).to_string()
}

fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DT_FMT).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, DATE_FMT).unwrap_or_else(|_| Utc::now().date_naive())
}

// ── Users ──

const USER_COLS: &str =
    "id, name, email, password_hash, phone, role, is_owner, otp_code, otp_expires_at, created_at";

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let otp_expires_at: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        phone: row.get(4)?,
        role: Role::parse(&row.get::<_, String>(5)?),
        is_owner: row.get::<_, i64>(6)? != 0,
        otp_code: row.get(7)?,
        otp_expires_at: otp_expires_at.as_deref().map(parse_dt),
        created_at: parse_dt(&created_at),
    })
}

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, phone, role, is_owner, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id,
            user.name,
            user.email,
            user.password_hash,
            user.phone,
            user.role.as_str(),
            user.is_owner as i64,
            fmt_dt(&user.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
        params![id],
        |row| Ok(parse_user_row(row)),
    );
    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        &format!("SELECT {USER_COLS} FROM users WHERE email = ?1"),
        params![email],
        |row| Ok(parse_user_row(row)),
    );
    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_users(conn: &Connection) -> anyhow::Result<Vec<User>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {USER_COLS} FROM users ORDER BY created_at DESC"))?;
    let rows = stmt.query_map([], |row| Ok(parse_user_row(row)))?;

    let mut users = vec![];
    for row in rows {
        users.push(row??);
    }
    Ok(users)
}

pub fn update_user(conn: &Connection, user: &User) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET name = ?1, email = ?2, phone = ?3, role = ?4, is_owner = ?5 WHERE id = ?6",
        params![
            user.name,
            user.email,
            user.phone,
            user.role.as_str(),
            user.is_owner as i64,
            user.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_user(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn set_user_otp(
    conn: &Connection,
    id: &str,
    code: &str,
    expires_at: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE users SET otp_code = ?1, otp_expires_at = ?2 WHERE id = ?3",
        params![code, fmt_dt(expires_at), id],
    )?;
    Ok(())
}

pub fn clear_user_otp(conn: &Connection, id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE users SET otp_code = NULL, otp_expires_at = NULL WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

// ── Cars ──

const CAR_COLS: &str = "id, name, model, brand, car_type, seats, rent_per_day, fuel_type, \
                        transmission, available, images, description, features, created_at";

fn parse_car_row(row: &rusqlite::Row) -> anyhow::Result<Car> {
    let images_json: String = row.get(10)?;
    let features_json: String = row.get(12)?;
    let created_at: String = row.get(13)?;
    Ok(Car {
        id: row.get(0)?,
        name: row.get(1)?,
        model: row.get(2)?,
        brand: row.get(3)?,
        car_type: row.get(4)?,
        seats: row.get(5)?,
        rent_per_day: row.get(6)?,
        fuel_type: row.get(7)?,
        transmission: row.get(8)?,
        available: row.get::<_, i64>(9)? != 0,
        images: serde_json::from_str(&images_json).unwrap_or_default(),
        description: row.get(11)?,
        features: serde_json::from_str(&features_json).unwrap_or_default(),
        created_at: parse_dt(&created_at),
    })
}

pub fn create_car(conn: &Connection, car: &Car) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO cars (id, name, model, brand, car_type, seats, rent_per_day, fuel_type,
                           transmission, available, images, description, features, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            car.id,
            car.name,
            car.model,
            car.brand,
            car.car_type,
            car.seats,
            car.rent_per_day,
            car.fuel_type,
            car.transmission,
            car.available as i64,
            serde_json::to_string(&car.images)?,
            car.description,
            serde_json::to_string(&car.features)?,
            fmt_dt(&car.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_car(conn: &Connection, id: &str) -> anyhow::Result<Option<Car>> {
    let result = conn.query_row(
        &format!("SELECT {CAR_COLS} FROM cars WHERE id = ?1"),
        params![id],
        |row| Ok(parse_car_row(row)),
    );
    match result {
        Ok(car) => Ok(Some(car?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Default)]
pub struct CarFilters {
    pub car_type: Option<String>,
    pub brand: Option<String>,
    pub seats: Option<i64>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub search: Option<String>,
}

pub fn list_cars(conn: &Connection, filters: &CarFilters) -> anyhow::Result<Vec<Car>> {
    let mut sql = format!("SELECT {CAR_COLS} FROM cars WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(car_type) = &filters.car_type {
        sql.push_str(&format!(" AND car_type = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(car_type.clone()));
    }
    if let Some(brand) = &filters.brand {
        sql.push_str(&format!(" AND brand = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(brand.clone()));
    }
    if let Some(seats) = filters.seats {
        sql.push_str(&format!(" AND seats = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(seats));
    }
    if let Some(min) = filters.min_price {
        sql.push_str(&format!(" AND rent_per_day >= ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(min));
    }
    if let Some(max) = filters.max_price {
        sql.push_str(&format!(" AND rent_per_day <= ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(max));
    }
    if let Some(search) = &filters.search {
        let pattern = format!("%{search}%");
        let n = params_vec.len() + 1;
        sql.push_str(&format!(
            " AND (name LIKE ?{n} OR brand LIKE ?{n} OR model LIKE ?{n})"
        ));
        params_vec.push(Box::new(pattern));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_car_row(row)))?;

    let mut cars = vec![];
    for row in rows {
        cars.push(row??);
    }
    Ok(cars)
}

pub fn update_car(conn: &Connection, car: &Car) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE cars SET name = ?1, model = ?2, brand = ?3, car_type = ?4, seats = ?5,
                         rent_per_day = ?6, fuel_type = ?7, transmission = ?8, available = ?9,
                         images = ?10, description = ?11, features = ?12
         WHERE id = ?13",
        params![
            car.name,
            car.model,
            car.brand,
            car.car_type,
            car.seats,
            car.rent_per_day,
            car.fuel_type,
            car.transmission,
            car.available as i64,
            serde_json::to_string(&car.images)?,
            car.description,
            serde_json::to_string(&car.features)?,
            car.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_car(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM cars WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Bookings ──

const BOOKING_COLS: &str =
    "id, user_id, car_id, start_date, end_date, total_days, total_amount, status, \
     payment_status, payment_verified, payment_deadline, order_id, payment_id, \
     payment_signature, payment_attempts, payment_error, confirmation_email_sent, \
     confirmation_email_sent_at, confirmation_email_message_id, pickup_location, \
     dropoff_location, owner_phone, owner_upi_id, created_at, updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let start_date: String = row.get(3)?;
    let end_date: String = row.get(4)?;
    let status: String = row.get(7)?;
    let payment_status: String = row.get(8)?;
    let payment_deadline: Option<String> = row.get(10)?;
    let email_sent_at: Option<String> = row.get(17)?;
    let created_at: String = row.get(23)?;
    let updated_at: String = row.get(24)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        car_id: row.get(2)?,
        start_date: parse_date(&start_date),
        end_date: parse_date(&end_date),
        total_days: row.get(5)?,
        total_amount: row.get(6)?,
        status: BookingStatus::parse(&status),
        payment_status: PaymentStatus::parse(&payment_status),
        payment_verified: row.get::<_, i64>(9)? != 0,
        payment_deadline: payment_deadline.as_deref().map(parse_dt),
        order_id: row.get(11)?,
        payment_id: row.get(12)?,
        payment_signature: row.get(13)?,
        payment_attempts: row.get(14)?,
        payment_error: row.get(15)?,
        confirmation_email_sent: row.get::<_, i64>(16)? != 0,
        confirmation_email_sent_at: email_sent_at.as_deref().map(parse_dt),
        confirmation_email_message_id: row.get(18)?,
        pickup_location: row.get(19)?,
        dropoff_location: row.get(20)?,
        owner_phone: row.get(21)?,
        owner_upi_id: row.get(22)?,
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
    })
}

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, car_id, start_date, end_date, total_days,
                               total_amount, status, payment_status, payment_verified,
                               payment_deadline, payment_attempts, pickup_location,
                               dropoff_location, owner_phone, owner_upi_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            booking.id,
            booking.user_id,
            booking.car_id,
            booking.start_date.format(DATE_FMT).to_string(),
            booking.end_date.format(DATE_FMT).to_string(),
            booking.total_days,
            booking.total_amount,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.payment_verified as i64,
            booking.payment_deadline.as_ref().map(fmt_dt),
            booking.payment_attempts,
            booking.pickup_location,
            booking.dropoff_location,
            booking.owner_phone,
            booking.owner_upi_id,
            fmt_dt(&booking.created_at),
            fmt_dt(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );
    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_booking_by_order_id(conn: &Connection, order_id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLS} FROM bookings WHERE order_id = ?1"),
        params![order_id],
        |row| Ok(parse_booking_row(row)),
    );
    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_bookings_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLS} FROM bookings WHERE user_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLS} FROM bookings WHERE status = ?1 \
                 ORDER BY created_at DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!("SELECT {BOOKING_COLS} FROM bookings ORDER BY created_at DESC LIMIT ?1"),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Bookings that reserve the car's dates: paid and not cancelled. Unpaid
/// holds never block availability.
pub fn get_blocking_bookings(conn: &Connection, car_id: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLS} FROM bookings
         WHERE car_id = ?1 AND payment_status = 'paid' AND status != 'cancelled'"
    ))?;
    let rows = stmt.query_map(params![car_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: &BookingStatus,
) -> anyhow::Result<bool> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

/// Attach a freshly created gateway order to the booking. Each retry
/// overwrites the previous order ref and bumps the attempt counter.
/// Paid is terminal: a booking confirmed in the meantime is left untouched
/// and the update reports false.
pub fn record_payment_order(conn: &Connection, id: &str, order_id: &str) -> anyhow::Result<bool> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET order_id = ?1, payment_status = 'processing',
                             payment_attempts = payment_attempts + 1, updated_at = ?2
         WHERE id = ?3 AND payment_status != 'paid'",
        params![order_id, now, id],
    )?;
    Ok(count > 0)
}

pub fn apply_payment_success(
    conn: &Connection,
    id: &str,
    payment_id: Option<&str>,
    signature: Option<&str>,
) -> anyhow::Result<()> {
    let now = fmt_dt(&Utc::now().naive_utc());
    conn.execute(
        "UPDATE bookings SET payment_status = 'paid', status = 'confirmed',
                             payment_verified = 1, payment_error = NULL,
                             payment_id = COALESCE(?1, payment_id),
                             payment_signature = COALESCE(?2, payment_signature),
                             updated_at = ?3
         WHERE id = ?4",
        params![payment_id, signature, now, id],
    )?;
    Ok(())
}

pub fn apply_payment_failure(conn: &Connection, id: &str, error: &str) -> anyhow::Result<()> {
    let now = fmt_dt(&Utc::now().naive_utc());
    conn.execute(
        "UPDATE bookings SET payment_status = 'failed', payment_error = ?1, updated_at = ?2
         WHERE id = ?3",
        params![error, now, id],
    )?;
    Ok(())
}

pub fn mark_confirmation_email_sent(
    conn: &Connection,
    id: &str,
    message_id: &str,
) -> anyhow::Result<()> {
    let now = fmt_dt(&Utc::now().naive_utc());
    conn.execute(
        "UPDATE bookings SET confirmation_email_sent = 1, confirmation_email_sent_at = ?1,
                             confirmation_email_message_id = ?2, updated_at = ?1
         WHERE id = ?3",
        params![now, message_id, id],
    )?;
    Ok(())
}

pub fn delete_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}
