use hashbrown::HashMap;
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

/// Identity of whoever is ingesting an event, as established by the token
/// validator. Ingestion upserts it into the `users` table.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub uuid: String,
    pub name: String,
    pub domain: String,
}

#[derive(Debug, Error, Diagnostic)]
pub enum AuthError {
    #[error("authentication token missing or unknown")]
    Unauthenticated,

    #[error("token does not grant {0}")]
    Forbidden(String),
}

/// Policy enforcement lives outside this service; the ingest path only hands
/// the presented token, the authorization rule for the endpoint, and the
/// target payload type to an implementation of this trait and consumes the
/// identity it returns.
pub trait TokenValidator: Send + Sync {
    fn check_token(
        &self,
        token: Option<&str>,
        rule: &str,
        target_payload_type: &str,
    ) -> Result<CallerIdentity, AuthError>;
}

#[derive(Debug, Deserialize)]
struct StaticPrincipal {
    token: String,
    uuid: String,
    name: String,
    domain: String,
    rules: Vec<String>,
}

#[derive(Debug, Error, Diagnostic)]
#[error("the principal table is not valid JSON")]
pub struct PrincipalTableError(#[source] serde_json::Error);

/// Token validator backed by a static principal table (`TENSO_AUTH_TOKENS`, a
/// JSON array of `{token, uuid, name, domain, rules}` objects). The default
/// table is empty, which rejects every request.
pub struct StaticTokenValidator {
    principals: HashMap<String, StaticPrincipal>,
}

impl StaticTokenValidator {
    pub fn from_json(json: &str) -> Result<Self, PrincipalTableError> {
        let principals: Vec<StaticPrincipal> =
            serde_json::from_str(json).map_err(PrincipalTableError)?;
        Ok(Self {
            principals: principals
                .into_iter()
                .map(|principal| (principal.token.clone(), principal))
                .collect(),
        })
    }
}

impl TokenValidator for StaticTokenValidator {
    fn check_token(
        &self,
        token: Option<&str>,
        rule: &str,
        _target_payload_type: &str,
    ) -> Result<CallerIdentity, AuthError> {
        let principal = token
            .and_then(|token| self.principals.get(token))
            .ok_or(AuthError::Unauthenticated)?;

        if !principal.rules.iter().any(|granted| granted == rule) {
            return Err(AuthError::Forbidden(rule.to_string()));
        }

        Ok(CallerIdentity {
            uuid: principal.uuid.clone(),
            name: principal.name.clone(),
            domain: principal.domain.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"[
        {
            "token": "producer-token",
            "uuid": "u-1",
            "name": "Deployment Pipeline",
            "domain": "infra",
            "rules": ["event:create"]
        }
    ]"#;

    #[test]
    fn known_token_with_the_right_rule_passes() {
        let validator = StaticTokenValidator::from_json(TABLE).unwrap();
        let identity = validator
            .check_token(Some("producer-token"), "event:create", "test-foo.v1")
            .unwrap();
        assert_eq!(identity.uuid, "u-1");
        assert_eq!(identity.domain, "infra");
    }

    #[test]
    fn missing_or_unknown_tokens_are_unauthenticated() {
        let validator = StaticTokenValidator::from_json(TABLE).unwrap();
        assert!(matches!(
            validator.check_token(None, "event:create", "test-foo.v1"),
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            validator.check_token(Some("wrong"), "event:create", "test-foo.v1"),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn missing_rule_is_forbidden() {
        let validator = StaticTokenValidator::from_json(TABLE).unwrap();
        assert!(matches!(
            validator.check_token(Some("producer-token"), "event:create_synthetic", "x.v1"),
            Err(AuthError::Forbidden(_))
        ));
    }

    #[test]
    fn an_empty_table_rejects_everyone() {
        let validator = StaticTokenValidator::from_json("[]").unwrap();
        assert!(matches!(
            validator.check_token(Some("anything"), "event:create", "x.v1"),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn garbage_tables_are_rejected() {
        assert!(StaticTokenValidator::from_json("not json").is_err());
    }
}
