use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::db::queries::StatusUpdate;
use crate::errors::AppError;
use crate::models::{AppointmentStatus, PaymentRecord, PaymentState, PaymentStatus, Service};
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/schedule
#[derive(Deserialize)]
pub struct ScheduleQuery {
    pub date: String,
}

#[derive(Serialize)]
pub struct ScheduleEntry {
    pub id: String,
    pub user_id: String,
    pub service_id: String,
    pub service_name: Option<String>,
    pub time_slot: String,
    pub status: String,
    pub payment_status: String,
    pub notes: Option<String>,
}

pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<ScheduleEntry>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date: {}", query.date)))?;

    let db = state.db.lock().unwrap();
    let appointments = queries::list_appointments_for_date(&db, &date)?;

    let mut entries = Vec::with_capacity(appointments.len());
    for appt in appointments {
        let service_name = queries::get_service(&db, &appt.service_id)?.map(|s| s.name);
        entries.push(ScheduleEntry {
            id: appt.id,
            user_id: appt.user_id,
            service_id: appt.service_id,
            service_name,
            time_slot: appt.time_slot,
            status: appt.status.as_str().to_string(),
            payment_status: appt.payment_status.as_str().to_string(),
            notes: appt.notes,
        });
    }
    Ok(Json(entries))
}

// POST /api/admin/services
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub price_minor: i64,
    pub duration_minutes: i32,
    pub description: Option<String>,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if req.name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    if req.price_minor < 0 || req.duration_minutes <= 0 {
        return Err(AppError::BadRequest(
            "price and duration must be positive".to_string(),
        ));
    }

    let service = Service {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        price_minor: req.price_minor,
        duration_minutes: req.duration_minutes,
        description: req.description,
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db.lock().unwrap();
        queries::create_service(&db, &service)?;
    }

    tracing::info!(id = %service.id, name = %service.name, "service created");
    Ok((StatusCode::CREATED, Json(service)))
}

// POST /api/admin/appointments/:id/status — mark completed / no-show /
// cancelled, within the status lifecycle.
#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

pub async fn set_appointment_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let next = AppointmentStatus::try_parse(&req.status)
        .ok_or_else(|| AppError::BadRequest(format!("unknown status: {}", req.status)))?;

    let result = {
        let db = state.db.lock().unwrap();
        queries::update_appointment_status(&db, &id, next)?
    };

    match result {
        StatusUpdate::Updated => Ok(Json(serde_json::json!({ "ok": true }))),
        StatusUpdate::NotFound => Err(AppError::NotFound(format!("appointment {id}"))),
        StatusUpdate::InvalidTransition { from } => Err(AppError::Conflict(format!(
            "cannot transition from {} to {}",
            from.as_str(),
            next.as_str()
        ))),
    }
}

// POST /api/admin/appointments/:id/cash-payment — the pay-at-shop settle
// path: records a cash payment row and marks the appointment paid.
pub async fn record_cash_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();

    let appointment = queries::get_appointment(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))?;

    if appointment.payment_status == PaymentStatus::Paid {
        return Err(AppError::Conflict("appointment is already paid".to_string()));
    }

    let amount_minor = queries::get_service(&db, &appointment.service_id)?
        .map(|s| s.price_minor)
        .unwrap_or(0);

    let now = Utc::now().naive_utc();
    let payment = PaymentRecord {
        id: Uuid::new_v4().to_string(),
        appointment_id: Some(appointment.id.clone()),
        provider: "cash".to_string(),
        // One cash reference per appointment keeps re-submission harmless.
        reference: format!("cash-{}", appointment.id),
        amount_minor,
        status: PaymentState::Success,
        intent_json: None,
        created_at: now,
        updated_at: now,
    };
    queries::insert_payment(&db, &payment)?;
    queries::set_payment_status(&db, &appointment.id, PaymentStatus::Paid)?;

    tracing::info!(id = %appointment.id, amount_minor, "cash payment recorded");
    Ok(Json(serde_json::json!({ "ok": true, "reference": payment.reference })))
}
