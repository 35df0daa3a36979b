//! Identity provider admin API client.
//!
//! Used only by `POST /set-claims`: ID tokens are verified with the provider's
//! `accounts:lookup` endpoint and role claims are written with
//! `accounts:update`. Claims travel as a JSON-encoded string in the
//! `customAttributes` field.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use url::Url;

use bazaar_core::Role;

use crate::config::ClaimsConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum IdentityError {
    /// Project id, API key or admin token is missing.
    #[error("identity provider is not configured")]
    NotConfigured,

    /// The provider rejected the ID token.
    #[error("invalid or expired ID token")]
    InvalidToken,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Custom claims attached to an identity.
pub type Claims = Map<String, JsonValue>;

/// A verified identity returned by `accounts:lookup`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityUser {
    pub uid: String,
    pub email: Option<String>,
    pub claims: Claims,
}

impl IdentityUser {
    /// Whether the identity carries an admin claim.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.claims.get("role").and_then(JsonValue::as_str) == Some(Role::Admin.as_str())
            || self.claims.get("admin").and_then(JsonValue::as_bool) == Some(true)
    }
}

/// The claims written for `role`.
#[must_use]
pub fn claims_for_role(role: Role) -> Claims {
    let mut claims = Claims::new();
    claims.insert("role".to_owned(), JsonValue::from(role.as_str()));
    claims.insert("admin".to_owned(), JsonValue::from(role.is_admin()));
    claims
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    custom_attributes: Option<String>,
}

/// Resolve `path` below `base`, keeping any path prefix on the base (emulators
/// serve the API under one).
fn endpoint(base: &Url, path: &str) -> Result<Url, IdentityError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
        .map_err(|e| IdentityError::Parse(format!("endpoint url: {e}")))
}

fn user_from_lookup(response: LookupResponse) -> Result<IdentityUser, IdentityError> {
    let user = response
        .users
        .into_iter()
        .next()
        .ok_or(IdentityError::InvalidToken)?;

    let claims = match user.custom_attributes.as_deref() {
        None | Some("") => Claims::new(),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| IdentityError::Parse(format!("customAttributes: {e}")))?,
    };

    Ok(IdentityUser {
        uid: user.local_id,
        email: user.email,
        claims,
    })
}

/// Identity provider REST client.
#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    api_base: Url,
    project_id: Option<String>,
    api_key: Option<SecretString>,
    admin_token: Option<SecretString>,
}

impl IdentityClient {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ClaimsConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
            admin_token: config.admin_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        endpoint(&self.api_base, path)
    }

    /// Verify an ID token and return the identity it belongs to.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidToken` if the provider rejects the
    /// token, `IdentityError::NotConfigured` without an API key.
    pub async fn lookup_id_token(&self, id_token: &str) -> Result<IdentityUser, IdentityError> {
        let api_key = self.api_key.as_ref().ok_or(IdentityError::NotConfigured)?;
        let mut url = self.endpoint("v1/accounts:lookup")?;
        url.query_pairs_mut().append_pair("key", api_key.expose_secret());

        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "idToken": id_token }))
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::BAD_REQUEST {
            return Err(IdentityError::InvalidToken);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;

        user_from_lookup(body)
    }

    /// Replace the custom claims of `uid`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::NotConfigured` without a project id or admin
    /// token, `IdentityError::Api` if the provider refuses the write.
    pub async fn set_custom_claims(&self, uid: &str, claims: &Claims) -> Result<(), IdentityError> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or(IdentityError::NotConfigured)?;
        let token = self
            .admin_token
            .as_ref()
            .ok_or(IdentityError::NotConfigured)?;
        let url = self.endpoint(&format!("v1/projects/{project_id}/accounts:update"))?;

        let custom_attributes = serde_json::to_string(claims)
            .map_err(|e| IdentityError::Parse(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({
                "localId": uid,
                "customAttributes": custom_attributes,
            }))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<IdentityUser, IdentityError> {
        user_from_lookup(serde_json::from_str(raw).expect("valid json"))
    }

    #[test]
    fn test_lookup_parses_custom_attributes() {
        let user = parse(
            r#"{"users":[{"localId":"u-1","email":"ops@bazaar.test",
                "customAttributes":"{\"role\":\"admin\",\"admin\":true}"}]}"#,
        )
        .expect("parses");

        assert_eq!(user.uid, "u-1");
        assert_eq!(user.email.as_deref(), Some("ops@bazaar.test"));
        assert!(user.is_admin());
    }

    #[test]
    fn test_lookup_without_claims_is_not_admin() {
        let user = parse(r#"{"users":[{"localId":"u-2"}]}"#).expect("parses");
        assert!(user.claims.is_empty());
        assert!(!user.is_admin());
    }

    #[test]
    fn test_admin_flag_alone_grants_admin() {
        let user = parse(
            r#"{"users":[{"localId":"u-3","customAttributes":"{\"admin\":true}"}]}"#,
        )
        .expect("parses");
        assert!(user.is_admin());
    }

    #[test]
    fn test_empty_lookup_is_invalid_token() {
        assert!(matches!(parse(r#"{}"#), Err(IdentityError::InvalidToken)));
    }

    #[test]
    fn test_malformed_custom_attributes() {
        assert!(matches!(
            parse(r#"{"users":[{"localId":"u","customAttributes":"not json"}]}"#),
            Err(IdentityError::Parse(_))
        ));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let hosted = Url::parse("https://identitytoolkit.googleapis.com").expect("url");
        assert_eq!(
            endpoint(&hosted, "v1/accounts:lookup").expect("joins").as_str(),
            "https://identitytoolkit.googleapis.com/v1/accounts:lookup"
        );

        let emulator =
            Url::parse("http://localhost:9099/identitytoolkit.googleapis.com").expect("url");
        assert_eq!(
            endpoint(&emulator, "v1/projects/demo/accounts:update")
                .expect("joins")
                .as_str(),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/projects/demo/accounts:update"
        );
    }

    #[test]
    fn test_claims_for_role() {
        let admin = claims_for_role(Role::Admin);
        assert_eq!(admin["role"], "admin");
        assert_eq!(admin["admin"], true);

        let editor = claims_for_role(Role::Editor);
        assert_eq!(editor["role"], "editor");
        assert_eq!(editor["admin"], false);
    }
}
