// =====================================================================================
// INVOICE DATA VALIDATION
// =====================================================================================

use regex::Regex;
use tracing::debug;

use crate::models::{InvoiceData, ProfileError, UpdateInvoiceDataRequest};

const IBAN_PATTERN: &str = r"^[A-Z]{2}[0-9]{2}[A-Z0-9]{11,30}$";
const ICO_PATTERN: &str = r"^[0-9]{8}$";
const DIC_PATTERN: &str = r"^(?:[A-Z]{2})?[0-9]{10}$";
const AMBULANCE_CODE_PATTERN: &str = r"^[A-Z]{2}$";

pub struct InvoiceDataValidator {
    iban: Regex,
    ico: Regex,
    dic: Regex,
    ambulance_code: Regex,
}

impl InvoiceDataValidator {
    pub fn new() -> Result<Self, ProfileError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| ProfileError::Internal(format!("invalid pattern {}: {}", pattern, e)))
        };

        Ok(Self {
            iban: compile(IBAN_PATTERN)?,
            ico: compile(ICO_PATTERN)?,
            dic: compile(DIC_PATTERN)?,
            ambulance_code: compile(AMBULANCE_CODE_PATTERN)?,
        })
    }

    /// Normalizes the request: trims every field, turns blanks into `None`,
    /// strips spaces from identifiers and upper-cases them.
    pub fn normalize(&self, request: UpdateInvoiceDataRequest) -> Result<InvoiceData, ProfileError> {
        let data = InvoiceData {
            invoice_name: clean(request.invoice_name),
            invoice_address: clean(request.invoice_address),
            bank_account: clean(request.bank_account).map(|v| compact(&v)),
            invoice_ico: clean(request.invoice_ico).map(|v| compact(&v)),
            invoice_dic: clean(request.invoice_dic).map(|v| compact(&v)),
            signature_image: clean(request.signature_image),
        };

        if let Some(iban) = &data.bank_account {
            self.validate_iban(iban)?;
        }
        if let Some(ico) = &data.invoice_ico {
            if !self.ico.is_match(ico) {
                return Err(ProfileError::ValidationError("IČO must have exactly 8 digits".to_string()));
            }
        }
        if let Some(dic) = &data.invoice_dic {
            if !self.dic.is_match(dic) {
                return Err(ProfileError::ValidationError(
                    "DIČ must have 10 digits, optionally prefixed by a country code".to_string(),
                ));
            }
        }

        Ok(data)
    }

    pub fn validate_iban(&self, iban: &str) -> Result<(), ProfileError> {
        debug!("Validating IBAN of length {}", iban.len());
        if !self.iban.is_match(iban) {
            return Err(ProfileError::ValidationError("IBAN has an invalid format".to_string()));
        }
        if iban_remainder(iban) != 1 {
            return Err(ProfileError::ValidationError("IBAN checksum does not match".to_string()));
        }
        Ok(())
    }

    pub fn validate_ambulance_code(&self, code: &str) -> Result<(), ProfileError> {
        if self.ambulance_code.is_match(code) {
            Ok(())
        } else {
            Err(ProfileError::ValidationError("Ambulance code must be two letters".to_string()))
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn compact(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase()
}

/// ISO 13616 mod-97 over the rearranged IBAN, digit by digit.
fn iban_remainder(iban: &str) -> u32 {
    let (head, tail) = iban.split_at(4);
    tail.chars()
        .chain(head.chars())
        .filter_map(|c| c.to_digit(36))
        .fold(0, |acc, value| {
            if value < 10 {
                (acc * 10 + value) % 97
            } else {
                (acc * 100 + value) % 97
            }
        })
}
