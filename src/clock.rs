use chrono::{NaiveDate, Utc};

/// Calendar source for the "no booking in the past" check. Injected so tests
/// can pin the current date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}
