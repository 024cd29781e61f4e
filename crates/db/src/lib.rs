//! `db` crate — Postgres persistence layer.
//!
//! Provides the connection pool, row structs mapping 1-to-1 onto the
//! four tables, and [`PgStore`], which implements every store trait from
//! the `engine` crate. No business logic lives here.

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;
pub mod store;

pub use error::DbError;
pub use pool::{create_pool, run_migrations, DbPool};
pub use store::PgStore;
