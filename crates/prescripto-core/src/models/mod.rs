//! Domain models for prescripto.

mod people;
mod prescription;
mod record_id;
mod stats;
mod test_result;

pub use people::*;
pub use prescription::*;
pub use record_id::*;
pub use stats::*;
pub use test_result::*;
