//! SQLite-backed [`StateDb`](ward_core::StateDb).

mod sqlite;
pub use sqlite::SqliteStateDb;
