mod article;
pub mod core;
mod schema;
mod verification;

// Re-export Database and essential traits
pub use self::core::Database;
pub use self::core::DbLockErrorExt;
pub use sqlx::Row;
