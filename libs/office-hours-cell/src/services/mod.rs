pub mod office_hours;
pub mod slots;

pub use office_hours::OfficeHoursService;
pub use slots::{generate_slots, rule_slot_offsets};
