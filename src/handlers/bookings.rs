use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::db::queries::{InsertOutcome, StatusUpdate};
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus, PaymentStatus};
use crate::services::scheduling::{
    self, BookingRequest, PaymentPath, ValidationError,
};
use crate::state::AppState;

// GET /api/availability
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
    pub service_id: Option<String>,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub date: String,
    pub slots: Vec<String>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let date = scheduling::parse_booking_date(&query.date, state.clock.today())?;

    let reserved = {
        let db = state.db.lock().unwrap();
        queries::list_reserved_slots(&db, &date, query.service_id.as_deref())?
    };

    let slots = scheduling::compute_available_slots(
        state.config.shop_open_hour,
        state.config.shop_close_hour,
        state.config.slot_minutes,
        &reserved,
    );

    Ok(Json(AvailabilityResponse {
        date: query.date,
        slots,
    }))
}

/// Candidate slots for a raw request. When the fields needed to compute them
/// are absent or malformed the list is empty and the validator reports the
/// underlying problem first.
pub(crate) fn candidate_slots_for(
    state: &Arc<AppState>,
    req: &BookingRequest,
) -> Result<Vec<String>, AppError> {
    let (Some(date_str), Some(service_id)) = (
        req.date.as_deref().filter(|s| !s.is_empty()),
        req.service_id.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return Ok(Vec::new());
    };

    let Ok(date) = scheduling::parse_booking_date(date_str, state.clock.today()) else {
        return Ok(Vec::new());
    };

    let db = state.db.lock().unwrap();
    if queries::get_service(&db, service_id)?.is_none() {
        return Err(AppError::NotFound(format!("service {service_id}")));
    }

    let reserved = queries::list_reserved_slots(&db, &date, Some(service_id))?;
    Ok(scheduling::compute_available_slots(
        state.config.shop_open_hour,
        state.config.shop_close_hour,
        state.config.slot_minutes,
        &reserved,
    ))
}

// POST /api/bookings — pay-at-shop path: persisted immediately as
// pending/unpaid, settled in cash at the counter.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let candidates = candidate_slots_for(&state, &req)?;
    let intent = scheduling::validate_booking_request(
        &req,
        &candidates,
        state.clock.today(),
        PaymentPath::PayAtShop,
    )?;

    let now = Utc::now().naive_utc();
    let appointment = Appointment {
        id: Uuid::new_v4().to_string(),
        user_id: intent.user_id,
        service_id: intent.service_id,
        date: intent.date,
        time_slot: intent.time_slot,
        status: AppointmentStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        notes: intent.notes,
        created_at: now,
        updated_at: now,
    };

    let outcome = {
        let db = state.db.lock().unwrap();
        queries::insert_appointment(&db, &appointment)?
    };

    match outcome {
        InsertOutcome::Created => {
            tracing::info!(id = %appointment.id, slot = %appointment.time_slot, "booking created");
            Ok((StatusCode::CREATED, Json(appointment)))
        }
        // Lost the race between the availability read and our insert.
        InsertOutcome::SlotTaken => Err(AppError::Conflict(
            "slot is no longer available, please pick another time".to_string(),
        )),
    }
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub user_id: String,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    if query.user_id.is_empty() {
        return Err(ValidationError::MissingField("user_id").into());
    }
    let appointments = {
        let db = state.db.lock().unwrap();
        queries::list_appointments_for_user(&db, &query.user_id)?
    };
    Ok(Json(appointments))
}

// POST /api/bookings/:id/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    pub user_id: String,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();

    let appointment = queries::get_appointment(&db, &id)?
        .filter(|a| a.user_id == req.user_id)
        .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))?;

    match queries::update_appointment_status(&db, &appointment.id, AppointmentStatus::Cancelled)? {
        StatusUpdate::Updated => Ok(Json(serde_json::json!({ "ok": true }))),
        StatusUpdate::NotFound => Err(AppError::NotFound(format!("appointment {id}"))),
        StatusUpdate::InvalidTransition { from } => Err(AppError::Conflict(format!(
            "cannot cancel a {} appointment",
            from.as_str()
        ))),
    }
}
