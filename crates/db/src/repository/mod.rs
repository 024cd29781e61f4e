//! Store trait implementations — one module per table.
//!
//! Every query goes through [`crate::PgStore`]'s pool and returns the
//! engine's domain types. No business logic, no query building — plain
//! SQL per operation.

pub mod accounts;
pub mod campaigns;
pub mod leads;
pub mod steps;
