pub mod db;
pub mod store;

pub use db::{create_db, seed_defaults, DbPool, SqliteStore};
pub use store::{Store, StoreError};
