// libs/billing-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentStatus, BillingError, CommissionStatus, InvoiceStatus};

/// Allowed next states of an appointment
pub fn appointment_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    match current {
        AppointmentStatus::Scheduled => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
        // Terminal states
        AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
    }
}

/// `cancelled` rows are read as they are stored. No operation moves an invoice there.
pub fn invoice_transitions(current: InvoiceStatus) -> &'static [InvoiceStatus] {
    match current {
        InvoiceStatus::Pending => &[InvoiceStatus::Paid],
        InvoiceStatus::Paid | InvoiceStatus::Cancelled => &[],
    }
}

pub fn commission_transitions(current: CommissionStatus) -> &'static [CommissionStatus] {
    match current {
        CommissionStatus::Pending => &[CommissionStatus::Paid],
        CommissionStatus::Paid => &[],
    }
}

fn check<S: PartialEq + std::fmt::Display + Copy>(
    entity: &str,
    current: S,
    next: S,
    allowed: &[S],
) -> Result<(), BillingError> {
    debug!("Validating {} transition {} -> {}", entity, current, next);
    if allowed.contains(&next) {
        return Ok(());
    }
    warn!("Rejected {} transition {} -> {}", entity, current, next);
    Err(BillingError::IllegalStateTransition(format!(
        "{} cannot move from {} to {}", entity, current, next
    )))
}

pub fn validate_appointment_transition(current: AppointmentStatus, next: AppointmentStatus) -> Result<(), BillingError> {
    check("appointment", current, next, appointment_transitions(current))
}

pub fn validate_invoice_transition(current: InvoiceStatus, next: InvoiceStatus) -> Result<(), BillingError> {
    check("invoice", current, next, invoice_transitions(current))
}

pub fn validate_commission_transition(current: CommissionStatus, next: CommissionStatus) -> Result<(), BillingError> {
    check("commission", current, next, commission_transitions(current))
}
