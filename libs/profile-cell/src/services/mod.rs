pub mod profile;
pub mod validation;

pub use profile::ProfileService;
pub use validation::InvoiceDataValidator;
