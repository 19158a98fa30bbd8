pub mod appointment;
pub mod payment;
pub mod service;

pub use appointment::{Appointment, AppointmentStatus, PaymentStatus};
pub use payment::{PaymentRecord, PaymentState};
pub use service::Service;
