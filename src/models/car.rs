use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const CAR_TYPES: &[&str] = &[
    "SUV", "Sedan", "Hatchback", "Coupe", "Convertible", "Van", "Truck",
];
pub const FUEL_TYPES: &[&str] = &["Petrol", "Diesel", "Electric", "Hybrid"];
pub const TRANSMISSIONS: &[&str] = &["Manual", "Automatic"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Car {
    pub id: String,
    pub name: String,
    pub model: String,
    pub brand: String,
    pub car_type: String,
    pub seats: i64,
    pub rent_per_day: i64,
    pub fuel_type: String,
    pub transmission: String,
    pub available: bool,
    pub images: Vec<String>,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub created_at: NaiveDateTime,
}

pub fn validate_car_type(s: &str) -> anyhow::Result<()> {
    if CAR_TYPES.contains(&s) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("invalid car type: {s}"))
    }
}

pub fn validate_fuel_type(s: &str) -> anyhow::Result<()> {
    if FUEL_TYPES.contains(&s) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("invalid fuel type: {s}"))
    }
}

pub fn validate_transmission(s: &str) -> anyhow::Result<()> {
    if TRANSMISSIONS.contains(&s) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("invalid transmission: {s}"))
    }
}

pub fn validate_seats(seats: i64) -> anyhow::Result<()> {
    if (2..=15).contains(&seats) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("seats must be between 2 and 15"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_car_type() {
        assert!(validate_car_type("SUV").is_ok());
        assert!(validate_car_type("Sedan").is_ok());
    }

    #[test]
    fn test_invalid_car_type() {
        assert!(validate_car_type("Spaceship").is_err());
        assert!(validate_car_type("suv").is_err());
    }

    #[test]
    fn test_seat_bounds() {
        assert!(validate_seats(2).is_ok());
        assert!(validate_seats(15).is_ok());
        assert!(validate_seats(1).is_err());
        assert!(validate_seats(16).is_err());
    }
}
