pub mod flag_check;

pub use flag_check::{consume_flag_checks, requeue_unchecked};
