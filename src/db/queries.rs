use std::collections::HashSet;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    Appointment, AppointmentStatus, PaymentRecord, PaymentState, PaymentStatus, Service,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn now_str() -> String {
    Utc::now().naive_utc().format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .with_context(|| format!("malformed timestamp in database: {s}"))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .with_context(|| format!("malformed date in database: {s}"))
}

// ── Services ──

pub fn create_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, price_minor, duration_minutes, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            service.id,
            service.name,
            service.price_minor,
            service.duration_minutes,
            service.description,
            service.created_at.format(TS_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn list_services(conn: &Connection) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, price_minor, duration_minutes, description, created_at
         FROM services ORDER BY name ASC",
    )?;

    let rows = stmt.query_map([], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        "SELECT id, name, price_minor, duration_minutes, description, created_at
         FROM services WHERE id = ?1",
        params![id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let created_at_str: String = row.get(5)?;
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        price_minor: row.get(2)?,
        duration_minutes: row.get(3)?,
        description: row.get(4)?,
        created_at: parse_ts(&created_at_str)?,
    })
}

// ── Appointments ──

/// Start times occupied on a date, filtered to the statuses that actually
/// hold a slot. Optionally narrowed to one service.
pub fn list_reserved_slots(
    conn: &Connection,
    date: &NaiveDate,
    service_id: Option<&str>,
) -> anyhow::Result<HashSet<String>> {
    let date_str = date.format(DATE_FORMAT).to_string();

    let mut slots = HashSet::new();
    match service_id {
        Some(service_id) => {
            let mut stmt = conn.prepare(
                "SELECT time_slot FROM appointments
                 WHERE date = ?1 AND service_id = ?2 AND status IN ('pending', 'confirmed')",
            )?;
            let rows = stmt.query_map(params![date_str, service_id], |row| {
                row.get::<_, String>(0)
            })?;
            for row in rows {
                slots.insert(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT time_slot FROM appointments
                 WHERE date = ?1 AND status IN ('pending', 'confirmed')",
            )?;
            let rows = stmt.query_map(params![date_str], |row| row.get::<_, String>(0))?;
            for row in rows {
                slots.insert(row?);
            }
        }
    }
    Ok(slots)
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// The partial unique index on active (date, time_slot, service_id)
    /// rejected the insert: another writer got the slot first.
    SlotTaken,
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> anyhow::Result<InsertOutcome> {
    let result = conn.execute(
        "INSERT INTO appointments (id, user_id, service_id, date, time_slot, status, payment_status, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            appt.id,
            appt.user_id,
            appt.service_id,
            appt.date.format(DATE_FORMAT).to_string(),
            appt.time_slot,
            appt.status.as_str(),
            appt.payment_status.as_str(),
            appt.notes,
            appt.created_at.format(TS_FORMAT).to_string(),
            appt.updated_at.format(TS_FORMAT).to_string(),
        ],
    );

    match result {
        Ok(_) => Ok(InsertOutcome::Created),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(InsertOutcome::SlotTaken)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        "SELECT id, user_id, service_id, date, time_slot, status, payment_status, notes, created_at, updated_at
         FROM appointments WHERE id = ?1",
        params![id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appt) => Ok(Some(appt?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_appointments_for_user(
    conn: &Connection,
    user_id: &str,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, service_id, date, time_slot, status, payment_status, notes, created_at, updated_at
         FROM appointments WHERE user_id = ?1 ORDER BY date DESC, time_slot ASC",
    )?;

    let rows = stmt.query_map(params![user_id], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn list_appointments_for_date(
    conn: &Connection,
    date: &NaiveDate,
) -> anyhow::Result<Vec<Appointment>> {
    let date_str = date.format(DATE_FORMAT).to_string();
    let mut stmt = conn.prepare(
        "SELECT id, user_id, service_id, date, time_slot, status, payment_status, notes, created_at, updated_at
         FROM appointments WHERE date = ?1 ORDER BY time_slot ASC",
    )?;

    let rows = stmt.query_map(params![date_str], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

#[derive(Debug, PartialEq, Eq)]
pub enum StatusUpdate {
    Updated,
    NotFound,
    InvalidTransition { from: AppointmentStatus },
}

/// Applies a status transition if the lifecycle allows it. The UPDATE keeps
/// the current status in its WHERE clause so a concurrent transition on the
/// same row cannot be overwritten.
pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    next: AppointmentStatus,
) -> anyhow::Result<StatusUpdate> {
    let Some(current) = get_appointment(conn, id)? else {
        return Ok(StatusUpdate::NotFound);
    };

    if !current.status.can_transition_to(next) {
        return Ok(StatusUpdate::InvalidTransition {
            from: current.status,
        });
    }

    let count = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![next.as_str(), now_str(), id, current.status.as_str()],
    )?;

    if count == 0 {
        // Row changed under us between the read and the update.
        return Ok(StatusUpdate::InvalidTransition {
            from: current.status,
        });
    }
    Ok(StatusUpdate::Updated)
}

pub fn set_payment_status(
    conn: &Connection,
    id: &str,
    payment_status: PaymentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET payment_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![payment_status.as_str(), now_str(), id],
    )?;
    Ok(count > 0)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(3)?;
    let status_str: String = row.get(5)?;
    let payment_status_str: String = row.get(6)?;
    let created_at_str: String = row.get(8)?;
    let updated_at_str: String = row.get(9)?;

    Ok(Appointment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        service_id: row.get(2)?,
        date: parse_date(&date_str)?,
        time_slot: row.get(4)?,
        status: AppointmentStatus::parse(&status_str),
        payment_status: PaymentStatus::parse(&payment_status_str),
        notes: row.get(7)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

// ── Payments ──

pub fn insert_payment(conn: &Connection, payment: &PaymentRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO payments (id, appointment_id, provider, reference, amount_minor, status, intent_json, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(reference) DO UPDATE SET
           status = excluded.status,
           updated_at = excluded.updated_at",
        params![
            payment.id,
            payment.appointment_id,
            payment.provider,
            payment.reference,
            payment.amount_minor,
            payment.status.as_str(),
            payment.intent_json,
            payment.created_at.format(TS_FORMAT).to_string(),
            payment.updated_at.format(TS_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_payment_by_reference(
    conn: &Connection,
    reference: &str,
) -> anyhow::Result<Option<PaymentRecord>> {
    let result = conn.query_row(
        "SELECT id, appointment_id, provider, reference, amount_minor, status, intent_json, created_at, updated_at
         FROM payments WHERE reference = ?1",
        params![reference],
        |row| Ok(parse_payment_row(row)),
    );

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Marks a reference settled and links it to the appointment it produced.
/// Keyed by reference, so re-verification is a no-op rather than a second row.
pub fn settle_payment(
    conn: &Connection,
    reference: &str,
    appointment_id: &str,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET status = 'success', appointment_id = ?1, updated_at = ?2
         WHERE reference = ?3",
        params![appointment_id, now_str(), reference],
    )?;
    Ok(count > 0)
}

pub fn mark_payment_failed(conn: &Connection, reference: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET status = 'failed', updated_at = ?1
         WHERE reference = ?2 AND status != 'success'",
        params![now_str(), reference],
    )?;
    Ok(count > 0)
}

pub fn count_payments_for_reference(conn: &Connection, reference: &str) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payments WHERE reference = ?1",
        params![reference],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_payment_row(row: &rusqlite::Row) -> anyhow::Result<PaymentRecord> {
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    Ok(PaymentRecord {
        id: row.get(0)?,
        appointment_id: row.get(1)?,
        provider: row.get(2)?,
        reference: row.get(3)?,
        amount_minor: row.get(4)?,
        status: PaymentState::parse(&status_str),
        intent_json: row.get(6)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn make_appointment(id: &str, slot: &str, status: AppointmentStatus) -> Appointment {
        let now = Utc::now().naive_utc();
        Appointment {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            service_id: "svc-1".to_string(),
            date: NaiveDate::parse_from_str("2025-01-10", "%Y-%m-%d").unwrap(),
            time_slot: slot.to_string(),
            status,
            payment_status: PaymentStatus::Unpaid,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn seed_service(conn: &Connection) {
        let service = Service {
            id: "svc-1".to_string(),
            name: "Haircut".to_string(),
            price_minor: 5000,
            duration_minutes: 30,
            description: None,
            created_at: Utc::now().naive_utc(),
        };
        create_service(conn, &service).unwrap();
    }

    #[test]
    fn test_second_insert_for_same_slot_is_rejected() {
        let conn = setup_db();
        seed_service(&conn);

        let first = make_appointment("a-1", "11:00", AppointmentStatus::Pending);
        let second = make_appointment("a-2", "11:00", AppointmentStatus::Confirmed);

        assert_eq!(
            insert_appointment(&conn, &first).unwrap(),
            InsertOutcome::Created
        );
        assert_eq!(
            insert_appointment(&conn, &second).unwrap(),
            InsertOutcome::SlotTaken
        );
    }

    #[test]
    fn test_cancelled_appointment_frees_the_slot() {
        let conn = setup_db();
        seed_service(&conn);

        let first = make_appointment("a-1", "11:00", AppointmentStatus::Pending);
        insert_appointment(&conn, &first).unwrap();
        assert_eq!(
            update_appointment_status(&conn, "a-1", AppointmentStatus::Cancelled).unwrap(),
            StatusUpdate::Updated
        );

        let second = make_appointment("a-2", "11:00", AppointmentStatus::Pending);
        assert_eq!(
            insert_appointment(&conn, &second).unwrap(),
            InsertOutcome::Created
        );
    }

    #[test]
    fn test_reserved_slots_ignore_inactive_statuses() {
        let conn = setup_db();
        seed_service(&conn);

        insert_appointment(&conn, &make_appointment("a-1", "09:00", AppointmentStatus::Pending))
            .unwrap();
        insert_appointment(&conn, &make_appointment("a-2", "10:00", AppointmentStatus::Confirmed))
            .unwrap();
        insert_appointment(&conn, &make_appointment("a-3", "12:00", AppointmentStatus::Cancelled))
            .unwrap();

        let date = NaiveDate::parse_from_str("2025-01-10", "%Y-%m-%d").unwrap();
        let slots = list_reserved_slots(&conn, &date, Some("svc-1")).unwrap();
        assert_eq!(slots.len(), 2);
        assert!(slots.contains("09:00"));
        assert!(slots.contains("10:00"));
        assert!(!slots.contains("12:00"));
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let conn = setup_db();
        seed_service(&conn);

        insert_appointment(&conn, &make_appointment("a-1", "09:00", AppointmentStatus::Pending))
            .unwrap();

        // pending → completed skips confirmation
        let result =
            update_appointment_status(&conn, "a-1", AppointmentStatus::Completed).unwrap();
        assert_eq!(
            result,
            StatusUpdate::InvalidTransition {
                from: AppointmentStatus::Pending
            }
        );

        let appt = get_appointment(&conn, "a-1").unwrap().unwrap();
        assert_eq!(appt.status, AppointmentStatus::Pending);
    }

    #[test]
    fn test_settle_payment_is_keyed_by_reference() {
        let conn = setup_db();
        seed_service(&conn);
        insert_appointment(&conn, &make_appointment("a-1", "09:00", AppointmentStatus::Confirmed))
            .unwrap();
        let now = Utc::now().naive_utc();
        let payment = PaymentRecord {
            id: "pay-1".to_string(),
            appointment_id: None,
            provider: "paystack".to_string(),
            reference: "ref-1".to_string(),
            amount_minor: 5000,
            status: PaymentState::Initialized,
            intent_json: None,
            created_at: now,
            updated_at: now,
        };
        insert_payment(&conn, &payment).unwrap();

        assert!(settle_payment(&conn, "ref-1", "a-1").unwrap());
        assert!(settle_payment(&conn, "ref-1", "a-1").unwrap());

        assert_eq!(count_payments_for_reference(&conn, "ref-1").unwrap(), 1);
        let stored = get_payment_by_reference(&conn, "ref-1").unwrap().unwrap();
        assert_eq!(stored.status, PaymentState::Success);
        assert_eq!(stored.appointment_id.as_deref(), Some("a-1"));
    }

    #[test]
    fn test_failed_mark_never_downgrades_success() {
        let conn = setup_db();
        seed_service(&conn);
        insert_appointment(&conn, &make_appointment("a-1", "09:00", AppointmentStatus::Confirmed))
            .unwrap();
        let now = Utc::now().naive_utc();
        let payment = PaymentRecord {
            id: "pay-1".to_string(),
            appointment_id: None,
            provider: "paystack".to_string(),
            reference: "ref-1".to_string(),
            amount_minor: 5000,
            status: PaymentState::Initialized,
            intent_json: None,
            created_at: now,
            updated_at: now,
        };
        insert_payment(&conn, &payment).unwrap();
        settle_payment(&conn, "ref-1", "a-1").unwrap();

        assert!(!mark_payment_failed(&conn, "ref-1").unwrap());
        let stored = get_payment_by_reference(&conn, "ref-1").unwrap().unwrap();
        assert_eq!(stored.status, PaymentState::Success);
    }
}
