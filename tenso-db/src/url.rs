use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use std::path::PathBuf;

/// Assembles the Postgres connection URL from `POSTGRES_*` environment
/// variables: `HOST` (default `db`), `PORT` (default 5432), `USER`, `DB`,
/// `PASSWORD` or `PASSWORD_FILE`, and `OPTIONS` for extra libpq parameters
/// appended as a query string.
pub fn postgres_url_from_environment() -> String {
    #[derive(Debug, PartialEq, Deserialize)]
    struct PostgresConfig {
        host: Option<String>,
        port: Option<u16>,
        user: String,
        password: Option<String>,
        password_file: Option<PathBuf>,
        db: String,
        options: Option<String>,
    }
    let provider = figment::providers::Env::prefixed("POSTGRES_");
    let postgres_config: PostgresConfig = figment::Figment::from(provider)
        .extract()
        .expect("Postgres configuration environment variable(s) missing or invalid");

    let password = if let Some(password) = postgres_config.password {
        password
    } else if let Some(password_file) = postgres_config.password_file {
        std::fs::read_to_string(password_file).expect("Failed to read postgres password file")
    } else {
        panic!("One of POSTGRES_PASSWORD or POSTGRES_PASSWORD_FILE must be provided");
    };

    // A password file conventionally ends in a newline that is not part of
    // the password; any other newline would be silently truncated further
    // down the Postgres pipeline, so refuse it outright.
    let password = password.strip_suffix("\n").unwrap_or(&password);
    if password.contains("\n") {
        panic!(
            "Postgres password contains a non-terminal newline, which Postgres would truncate. \
            Please use a password without embedded newlines."
        );
    }

    let password = utf8_percent_encode(password, NON_ALPHANUMERIC);

    let host = postgres_config.host.as_deref().unwrap_or("db");
    let port = postgres_config.port.unwrap_or(5432);
    let options = postgres_config
        .options
        .map(|options| format!("?{options}"))
        .unwrap_or_default();

    format!(
        "postgres://{}:{}@{}:{}/{}{}",
        postgres_config.user, password, host, port, postgres_config.db, options
    )
}
