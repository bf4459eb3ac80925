//! Service layer shared by the API server and the CLI.

mod database;

pub use database::DatabaseService;
