mod schema;
mod url;

pub mod db;
pub mod migrations;
pub mod models;
pub mod pool;

pub use migrations::run_migrations;
pub use url::postgres_url_from_environment;

pub use diesel::{Connection, PgConnection};
