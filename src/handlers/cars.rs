use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth;
use crate::db::queries::{self, CarFilters};
use crate::errors::AppError;
use crate::models::{car, Car};
use crate::services::availability;
use crate::state::AppState;

// GET /api/cars
#[derive(Deserialize)]
pub struct CarsQuery {
    #[serde(rename = "type")]
    pub car_type: Option<String>,
    pub brand: Option<String>,
    pub seats: Option<i64>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub search: Option<String>,
}

pub async fn list_cars(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CarsQuery>,
) -> Result<Json<Vec<Car>>, AppError> {
    let filters = CarFilters {
        car_type: query.car_type,
        brand: query.brand,
        seats: query.seats,
        min_price: query.min_price,
        max_price: query.max_price,
        search: query.search,
    };

    let db = state.db.lock().unwrap();
    let cars = queries::list_cars(&db, &filters)?;
    Ok(Json(cars))
}

// GET /api/cars/:id
pub async fn get_car(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Car>, AppError> {
    let db = state.db.lock().unwrap();
    let car = queries::get_car(&db, &id)?
        .ok_or_else(|| AppError::NotFound("car not found".to_string()))?;
    Ok(Json(car))
}

// POST /api/cars/:id/check-availability
#[derive(Deserialize)]
pub struct CheckAvailabilityRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<CheckAvailabilityRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.end_date <= body.start_date {
        return Err(AppError::Validation(
            "end date must be after start date".to_string(),
        ));
    }

    let db = state.db.lock().unwrap();
    if queries::get_car(&db, &id)?.is_none() {
        return Err(AppError::NotFound("car not found".to_string()));
    }

    let available = availability::is_available(&db, &id, body.start_date, body.end_date)?;
    Ok(Json(serde_json::json!({ "available": available })))
}

// POST /api/cars (admin)
#[derive(Deserialize)]
pub struct CreateCarRequest {
    pub name: String,
    pub model: String,
    pub brand: String,
    pub car_type: String,
    pub seats: i64,
    pub rent_per_day: i64,
    #[serde(default = "default_fuel_type")]
    pub fuel_type: String,
    #[serde(default = "default_transmission")]
    pub transmission: String,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub images: Vec<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

fn default_fuel_type() -> String {
    "Petrol".to_string()
}

fn default_transmission() -> String {
    "Manual".to_string()
}

fn default_available() -> bool {
    true
}

pub async fn create_car(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateCarRequest>,
) -> Result<(StatusCode, Json<Car>), AppError> {
    auth::require_admin(&state, &headers)?;

    if body.name.trim().is_empty() || body.model.trim().is_empty() || body.brand.trim().is_empty() {
        return Err(AppError::Validation(
            "name, model and brand are required".to_string(),
        ));
    }
    if body.rent_per_day <= 0 {
        return Err(AppError::Validation("rent per day must be positive".to_string()));
    }
    car::validate_car_type(&body.car_type).map_err(|e| AppError::Validation(e.to_string()))?;
    car::validate_fuel_type(&body.fuel_type).map_err(|e| AppError::Validation(e.to_string()))?;
    car::validate_transmission(&body.transmission)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    car::validate_seats(body.seats).map_err(|e| AppError::Validation(e.to_string()))?;

    let new_car = Car {
        id: Uuid::new_v4().to_string(),
        name: body.name.trim().to_string(),
        model: body.model.trim().to_string(),
        brand: body.brand.trim().to_string(),
        car_type: body.car_type,
        seats: body.seats,
        rent_per_day: body.rent_per_day,
        fuel_type: body.fuel_type,
        transmission: body.transmission,
        available: body.available,
        images: body.images,
        description: body.description,
        features: body.features,
        created_at: Utc::now().naive_utc(),
    };

    let db = state.db.lock().unwrap();
    queries::create_car(&db, &new_car)?;
    Ok((StatusCode::CREATED, Json(new_car)))
}

// PUT /api/cars/:id (admin)
#[derive(Deserialize)]
pub struct UpdateCarRequest {
    pub name: Option<String>,
    pub model: Option<String>,
    pub brand: Option<String>,
    pub car_type: Option<String>,
    pub seats: Option<i64>,
    pub rent_per_day: Option<i64>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub available: Option<bool>,
    pub images: Option<Vec<String>>,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
}

pub async fn update_car(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateCarRequest>,
) -> Result<Json<Car>, AppError> {
    auth::require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    let mut existing = queries::get_car(&db, &id)?
        .ok_or_else(|| AppError::NotFound("car not found".to_string()))?;

    if let Some(name) = body.name {
        existing.name = name;
    }
    if let Some(model) = body.model {
        existing.model = model;
    }
    if let Some(brand) = body.brand {
        existing.brand = brand;
    }
    if let Some(car_type) = body.car_type {
        car::validate_car_type(&car_type).map_err(|e| AppError::Validation(e.to_string()))?;
        existing.car_type = car_type;
    }
    if let Some(seats) = body.seats {
        car::validate_seats(seats).map_err(|e| AppError::Validation(e.to_string()))?;
        existing.seats = seats;
    }
    if let Some(rent) = body.rent_per_day {
        if rent <= 0 {
            return Err(AppError::Validation("rent per day must be positive".to_string()));
        }
        existing.rent_per_day = rent;
    }
    if let Some(fuel_type) = body.fuel_type {
        car::validate_fuel_type(&fuel_type).map_err(|e| AppError::Validation(e.to_string()))?;
        existing.fuel_type = fuel_type;
    }
    if let Some(transmission) = body.transmission {
        car::validate_transmission(&transmission)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        existing.transmission = transmission;
    }
    if let Some(available) = body.available {
        existing.available = available;
    }
    if let Some(images) = body.images {
        existing.images = images;
    }
    if let Some(description) = body.description {
        existing.description = Some(description);
    }
    if let Some(features) = body.features {
        existing.features = features;
    }

    queries::update_car(&db, &existing)?;
    Ok(Json(existing))
}

// DELETE /api/cars/:id (admin)
pub async fn delete_car(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth::require_admin(&state, &headers)?;

    let db = state.db.lock().unwrap();
    if !queries::delete_car(&db, &id)? {
        return Err(AppError::NotFound("car not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
