// libs/billing-cell/src/services/invoice_number.rs
use chrono::NaiveDate;
use rand::Rng;

/// How many fresh numbers to try before giving up on a unique one.
pub const MAX_ATTEMPTS: u32 = 5;

/// `<prefix>-YYMMDD-NNNN` with a random four-digit suffix.
pub fn generate_invoice_number<R: Rng + ?Sized>(prefix: &str, issue_date: NaiveDate, rng: &mut R) -> String {
    let suffix: u16 = rng.gen_range(0..10_000);
    format!("{}-{}-{:04}", prefix, issue_date.format("%y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn number_has_prefix_date_and_padded_suffix() {
        let mut rng = StdRng::seed_from_u64(7);
        let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();

        for _ in 0..50 {
            let number = generate_invoice_number("INV", date, &mut rng);
            let parts: Vec<&str> = number.split('-').collect();
            assert_eq!(parts.len(), 3);
            assert_eq!(parts[0], "INV");
            assert_eq!(parts[1], "300107");
            assert_eq!(parts[2].len(), 4);
            assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
        }
    }
}
