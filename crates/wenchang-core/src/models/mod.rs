//! Data models for showcase entities.
//!
//! - `Record` (aliased as `Case` and `Policy`): canonical record mapped from
//!   any known source schema, with `Location` split into province and city
//! - `StatsRecord`: published or derived dataset summary

pub mod record;
pub mod stats;

pub use record::{Case, Location, Policy, Record};
pub use stats::StatsRecord;
