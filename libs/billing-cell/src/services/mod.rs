pub mod booking;
pub mod consistency;
pub mod invoice_number;
pub mod lifecycle;
pub mod memory_store;
pub mod store;
pub mod supabase_store;

pub use consistency::BillingService;
pub use memory_store::InMemoryBillingStore;
pub use store::{AppointmentDeletion, BillingStore, StoreError, StoreResult};
pub use supabase_store::SupabaseBillingStore;
