//! SQLite persistence: pool/migrations, row models, and repositories.

pub mod converters;
pub mod db;
pub mod models;
pub mod repositories;

pub use db::{create_pool, DbError};
