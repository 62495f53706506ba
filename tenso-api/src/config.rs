use rocket::figment::Figment;
use rocket::figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Comma-separated `"SOURCE -> TARGET"` route specs, shared with the
    /// worker process. No default; an empty route list fails startup.
    pub routes: String,

    /// JSON principal table for the static token validator. Empty by
    /// default, which rejects every request.
    pub auth_tokens: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            routes: String::new(),
            auth_tokens: "[]".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed("TENSO_"))
    }

    pub fn config() -> rocket::figment::Result<Self> {
        Self::figment().extract()
    }
}
