// libs/billing-cell/src/services/booking.rs
use chrono::{DateTime, FixedOffset};

use crate::models::BillingError;

/// Ambulance codes are exactly two uppercase ASCII letters, e.g. `AB`.
pub fn validate_ambulance_code(code: &str) -> Result<(), BillingError> {
    if code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(BillingError::ValidationError(format!(
            "Ambulance code must be two uppercase letters, got '{}'", code
        )))
    }
}

/// Patient number derived from the ambulance code and the slot's wall-clock time:
/// `AB-2030-01-07-0930`.
pub fn patient_number(ambulance_code: &str, appointment_date: &DateTime<FixedOffset>) -> String {
    format!("{}-{}", ambulance_code, appointment_date.format("%Y-%m-%d-%H%M"))
}

pub fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambulance_code_shape() {
        assert!(validate_ambulance_code("AB").is_ok());
        for bad in ["ab", "A", "ABC", "A1", "", "ÁB"] {
            assert!(validate_ambulance_code(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn patient_number_uses_local_wall_clock() {
        let date = DateTime::parse_from_rfc3339("2030-01-07T09:30:00+01:00").unwrap();
        assert_eq!(patient_number("AB", &date), "AB-2030-01-07-0930");
    }

    #[test]
    fn blank_notes_become_none() {
        assert_eq!(normalize_notes(Some("   ".into())), None);
        assert_eq!(normalize_notes(Some(" follow-up ".into())), Some("follow-up".into()));
        assert_eq!(normalize_notes(None), None);
    }
}
