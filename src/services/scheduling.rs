use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::services::payments::GatewayResult;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("time slot {0} is not available")]
    SlotUnavailable(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment still pending, verify again later")]
    Pending,
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPath {
    PayAtShop,
    PayNow,
}

/// Raw booking request as it arrives off the wire. Everything optional;
/// `validate_booking_request` decides what is actually required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequest {
    pub user_id: Option<String>,
    pub service_id: Option<String>,
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub notes: Option<String>,
}

/// Validated booking choice, not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingIntent {
    pub user_id: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub notes: Option<String>,
    pub payment_path: PaymentPath,
}

/// Outcome of a successful payment reconciliation: everything the caller
/// needs to persist a confirmed, paid appointment.
#[derive(Debug, Clone)]
pub struct ConfirmedBooking {
    pub intent: BookingIntent,
    pub reference: String,
}

/// Generates every slot start time from `open_hour:00` inclusive up to
/// `close_hour:00` exclusive, stepping by `granularity_minutes`, and drops
/// the ones whose exact "HH:MM" start is already reserved.
///
/// Blocking is by start time only: a reservation at "10:00" does not block
/// "10:30" even when its service runs longer. Reserved values outside the
/// generated range are ignored.
pub fn compute_available_slots(
    open_hour: u32,
    close_hour: u32,
    granularity_minutes: u32,
    reserved: &HashSet<String>,
) -> Vec<String> {
    if granularity_minutes == 0 {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut minute = open_hour * 60;
    let end = close_hour * 60;
    while minute < end {
        let slot = format!("{:02}:{:02}", minute / 60, minute % 60);
        if !reserved.contains(&slot) {
            slots.push(slot);
        }
        minute += granularity_minutes;
    }
    slots
}

/// Parses a "YYYY-MM-DD" date and rejects anything before `today`.
pub fn parse_booking_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))?;
    if date < today {
        return Err(ValidationError::InvalidDate(format!(
            "{raw} is in the past"
        )));
    }
    Ok(date)
}

/// Pre-flight check of a booking choice against the currently open slots.
/// This is an optimization, not the authority: the unique index on active
/// (date, time_slot, service) in the store is what actually prevents
/// double-booking under concurrent writers.
pub fn validate_booking_request(
    req: &BookingRequest,
    candidate_slots: &[String],
    today: NaiveDate,
    payment_path: PaymentPath,
) -> Result<BookingIntent, ValidationError> {
    let user_id = req
        .user_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField("user_id"))?;
    let service_id = req
        .service_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField("service_id"))?;
    let raw_date = req
        .date
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField("date"))?;
    let time_slot = req
        .time_slot
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField("time_slot"))?;

    let date = parse_booking_date(raw_date, today)?;

    if !candidate_slots.iter().any(|s| s == time_slot) {
        return Err(ValidationError::SlotUnavailable(time_slot.to_string()));
    }

    Ok(BookingIntent {
        user_id: user_id.to_string(),
        service_id: service_id.to_string(),
        date,
        time_slot: time_slot.to_string(),
        notes: req.notes.clone(),
        payment_path,
    })
}

/// Classifies a gateway verification result. Pure: persistence (and its
/// idempotency, upsert-by-reference) stays with the caller. Not invoked on
/// the pay-at-shop path, which never touches the gateway.
pub fn reconcile_payment_outcome(
    intent: BookingIntent,
    outcome: &GatewayResult,
) -> Result<ConfirmedBooking, PaymentError> {
    match outcome {
        GatewayResult::Success { reference } => Ok(ConfirmedBooking {
            intent,
            reference: reference.clone(),
        }),
        GatewayResult::Failure { reason } => Err(PaymentError::Declined(reason.clone())),
        GatewayResult::Pending => Err(PaymentError::Pending),
    }
}
