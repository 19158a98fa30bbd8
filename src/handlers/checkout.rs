use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::db::queries::InsertOutcome;
use crate::errors::AppError;
use crate::models::{
    Appointment, AppointmentStatus, PaymentRecord, PaymentState, PaymentStatus,
};
use crate::services::payments::GatewayResult;
use crate::services::scheduling::{
    self, BookingIntent, BookingRequest, PaymentError, PaymentPath, ValidationError,
};
use crate::state::AppState;

// POST /api/checkout/init — pay-now path: nothing is persisted as an
// appointment yet; the validated intent is parked on the payment row and the
// caller is sent to the gateway's hosted page.
#[derive(Deserialize)]
pub struct CheckoutInitRequest {
    #[serde(flatten)]
    pub booking: BookingRequest,
    pub email: Option<String>,
}

pub async fn init_checkout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutInitRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = req
        .email
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField("email"))?;

    let candidates = super::bookings::candidate_slots_for(&state, &req.booking)?;
    let intent = scheduling::validate_booking_request(
        &req.booking,
        &candidates,
        state.clock.today(),
        PaymentPath::PayNow,
    )?;

    let amount_minor = {
        let db = state.db.lock().unwrap();
        queries::get_service(&db, &intent.service_id)?
            .ok_or_else(|| AppError::NotFound(format!("service {}", intent.service_id)))?
            .price_minor
    };

    let metadata = serde_json::json!({
        "user_id": &intent.user_id,
        "service_id": &intent.service_id,
        "date": intent.date,
        "time_slot": &intent.time_slot,
    });

    let initialized = state
        .payments
        .initialize(amount_minor, email, metadata)
        .await
        .map_err(|e| AppError::Gateway(e.to_string()))?;

    let now = Utc::now().naive_utc();
    let payment = PaymentRecord {
        id: Uuid::new_v4().to_string(),
        appointment_id: None,
        provider: "paystack".to_string(),
        reference: initialized.reference.clone(),
        amount_minor,
        status: PaymentState::Initialized,
        intent_json: Some(serde_json::to_string(&intent).map_err(|e| {
            AppError::Database(format!("failed to serialize booking intent: {e}"))
        })?),
        created_at: now,
        updated_at: now,
    };

    {
        let db = state.db.lock().unwrap();
        queries::insert_payment(&db, &payment)?;
    }

    tracing::info!(reference = %initialized.reference, "checkout initialized");

    Ok(Json(serde_json::json!({
        "authorization_url": initialized.authorization_url,
        "reference": initialized.reference,
    })))
}

// POST /api/checkout/verify
#[derive(Deserialize)]
pub struct VerifyRequest {
    pub reference: Option<String>,
}

pub async fn verify_checkout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Response, AppError> {
    let reference = req
        .reference
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField("reference"))?;

    // Short-circuit before touching the gateway when the reference has
    // already settled into an appointment.
    if let Some(appointment) = already_settled(&state, reference)? {
        return Ok(Json(appointment).into_response());
    }

    let outcome = state
        .payments
        .verify(reference)
        .await
        .map_err(|e| AppError::Gateway(e.to_string()))?;

    match settle_reference(&state, reference, &outcome)? {
        Settlement::Confirmed(appointment) => Ok(Json(appointment).into_response()),
        Settlement::Pending => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "pending", "reference": reference })),
        )
            .into_response()),
    }
}

fn already_settled(
    state: &Arc<AppState>,
    reference: &str,
) -> Result<Option<Appointment>, AppError> {
    let db = state.db.lock().unwrap();
    let Some(payment) = queries::get_payment_by_reference(&db, reference)? else {
        return Err(AppError::NotFound(format!("payment reference {reference}")));
    };
    if payment.status != PaymentState::Success {
        return Ok(None);
    }
    let appointment_id = payment.appointment_id.ok_or_else(|| {
        AppError::Database(format!("settled payment {reference} has no appointment"))
    })?;
    let appointment = queries::get_appointment(&db, &appointment_id)?.ok_or_else(|| {
        AppError::Database(format!("payment {reference} points at a missing appointment"))
    })?;
    Ok(Some(appointment))
}

pub(crate) enum Settlement {
    Confirmed(Appointment),
    Pending,
}

/// Applies a classified gateway outcome to the stored intent. Idempotent per
/// reference: a reference that already produced an appointment returns it
/// again instead of inserting a second one. Shared by manual verification and
/// the gateway webhook.
pub(crate) fn settle_reference(
    state: &Arc<AppState>,
    reference: &str,
    outcome: &GatewayResult,
) -> Result<Settlement, AppError> {
    let db = state.db.lock().unwrap();

    let payment = queries::get_payment_by_reference(&db, reference)?
        .ok_or_else(|| AppError::NotFound(format!("payment reference {reference}")))?;

    if payment.status == PaymentState::Success {
        if let Some(id) = &payment.appointment_id {
            let appointment = queries::get_appointment(&db, id)?.ok_or_else(|| {
                AppError::Database(format!("payment {reference} points at a missing appointment"))
            })?;
            return Ok(Settlement::Confirmed(appointment));
        }
    }

    let intent_json = payment.intent_json.as_deref().ok_or_else(|| {
        AppError::Database(format!("payment {reference} has no stored booking intent"))
    })?;
    let intent: BookingIntent = serde_json::from_str(intent_json)
        .map_err(|e| AppError::Database(format!("malformed booking intent: {e}")))?;

    match scheduling::reconcile_payment_outcome(intent, outcome) {
        Ok(confirmed) => {
            let now = Utc::now().naive_utc();
            let appointment = Appointment {
                id: Uuid::new_v4().to_string(),
                user_id: confirmed.intent.user_id,
                service_id: confirmed.intent.service_id,
                date: confirmed.intent.date,
                time_slot: confirmed.intent.time_slot,
                status: AppointmentStatus::Confirmed,
                payment_status: PaymentStatus::Paid,
                notes: confirmed.intent.notes,
                created_at: now,
                updated_at: now,
            };

            match queries::insert_appointment(&db, &appointment)? {
                InsertOutcome::Created => {
                    queries::settle_payment(&db, reference, &appointment.id)?;
                    tracing::info!(reference, id = %appointment.id, "payment settled");
                    Ok(Settlement::Confirmed(appointment))
                }
                InsertOutcome::SlotTaken => {
                    // Paid but the slot went to someone else between init and
                    // verify. Surface as slot-unavailable; refund handling is
                    // a manual follow-up on the gateway dashboard.
                    tracing::warn!(reference, "paid reference lost its slot");
                    Err(AppError::Conflict(
                        "slot is no longer available, please pick another time".to_string(),
                    ))
                }
            }
        }
        Err(PaymentError::Pending) => Ok(Settlement::Pending),
        Err(e) => {
            queries::mark_payment_failed(&db, reference)?;
            tracing::info!(reference, error = %e, "payment declined");
            Err(AppError::Payment(e))
        }
    }
}
