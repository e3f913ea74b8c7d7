//! Database layer
//!
//! SQLite is the default backend (development, small deployments) and MySQL
//! is supported for staging/production. The driver is selected from
//! configuration; repositories dispatch on `DatabasePool::driver()`.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
