use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_PATIENT_FEE_CENTS: i64 = 1400;
pub const DEFAULT_INVOICE_NUMBER_PREFIX: &str = "INV";
pub const DEFAULT_DATA_RETENTION_YEARS: u32 = 1;
pub const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Handling fee charged per examined patient, in cents.
    pub patient_fee_cents: i64,
    pub invoice_number_prefix: String,
    /// Rows older than this are hidden from listings.
    pub data_retention_years: u32,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            patient_fee_cents: parse_or_default("PATIENT_FEE_CENTS", DEFAULT_PATIENT_FEE_CENTS),
            invoice_number_prefix: env::var("INVOICE_NUMBER_PREFIX")
                .unwrap_or_else(|_| DEFAULT_INVOICE_NUMBER_PREFIX.to_string()),
            data_retention_years: parse_or_default("DATA_RETENTION_YEARS", DEFAULT_DATA_RETENTION_YEARS),
            server_port: parse_or_default("SERVER_PORT", DEFAULT_SERVER_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            patient_fee_cents: DEFAULT_PATIENT_FEE_CENTS,
            invoice_number_prefix: DEFAULT_INVOICE_NUMBER_PREFIX.to_string(),
            data_retention_years: DEFAULT_DATA_RETENTION_YEARS,
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
