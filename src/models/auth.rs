//! # Auth Strategies
//!
//! The closed set of ways a request can authenticate. Each variant validates
//! itself and knows how to attach its credentials to an outgoing
//! `reqwest::Request`. Persistence goes through [`AuthRecord`], a
//! `(kind, fields)` pair keyed by the variant's discriminator.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::utils::merge_query_pairs;

pub const KIND_NONE: &str = "none";
pub const KIND_BASIC: &str = "basic";
pub const KIND_BEARER: &str = "bearer";
pub const KIND_API_KEY: &str = "apikey";

/// Where an API key is placed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

impl ApiKeyLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeyLocation::Header => "header",
            ApiKeyLocation::Query => "query",
        }
    }
}

impl FromStr for ApiKeyLocation {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header" => Ok(ApiKeyLocation::Header),
            "query" => Ok(ApiKeyLocation::Query),
            _ => Err(AuthError::InvalidApiKeyLocation(s.to_string())),
        }
    }
}

impl fmt::Display for ApiKeyLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication attached to a request.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "AuthRecord", try_from = "AuthRecord")]
pub enum AuthStrategy {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
    ApiKey {
        key: String,
        value: String,
        location: ApiKeyLocation,
    },
}

impl AuthStrategy {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthStrategy::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        AuthStrategy::Bearer {
            token: token.into(),
        }
    }

    pub fn api_key(
        key: impl Into<String>,
        value: impl Into<String>,
        location: ApiKeyLocation,
    ) -> Self {
        AuthStrategy::ApiKey {
            key: key.into(),
            value: value.into(),
            location,
        }
    }

    /// Stable discriminator used for persistence and introspection.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthStrategy::None => KIND_NONE,
            AuthStrategy::Basic { .. } => KIND_BASIC,
            AuthStrategy::Bearer { .. } => KIND_BEARER,
            AuthStrategy::ApiKey { .. } => KIND_API_KEY,
        }
    }

    pub fn supported_kinds() -> &'static [&'static str] {
        &[KIND_NONE, KIND_BASIC, KIND_BEARER, KIND_API_KEY]
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AuthStrategy::None)
    }

    /// Check that every credential the variant needs is present.
    pub fn validate(&self) -> Result<(), AuthError> {
        match self {
            AuthStrategy::None => Ok(()),
            AuthStrategy::Basic { username, password } => {
                if is_blank(username) {
                    return Err(AuthError::MissingUsername);
                }
                if is_blank(password) {
                    return Err(AuthError::MissingPassword);
                }
                Ok(())
            }
            AuthStrategy::Bearer { token } => {
                if is_blank(token) {
                    return Err(AuthError::MissingToken);
                }
                Ok(())
            }
            AuthStrategy::ApiKey { key, value, .. } => {
                if is_blank(key) {
                    return Err(AuthError::MissingApiKeyName);
                }
                if is_blank(value) {
                    return Err(AuthError::MissingApiKey);
                }
                Ok(())
            }
        }
    }

    /// Attach credentials to a wire request.
    ///
    /// Validates first, and builds every header before touching `request`, so
    /// a failure leaves the request exactly as it was.
    pub fn apply(&self, request: &mut reqwest::Request) -> Result<(), AuthError> {
        self.validate()?;

        match self {
            AuthStrategy::None => {}
            AuthStrategy::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                let value = header_value(&format!("Basic {encoded}"))?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            AuthStrategy::Bearer { token } => {
                let value = header_value(&format!("Bearer {token}"))?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            AuthStrategy::ApiKey {
                key,
                value,
                location: ApiKeyLocation::Header,
            } => {
                let name = HeaderName::from_bytes(key.as_bytes())
                    .map_err(|e| AuthError::InvalidHeader(format!("{key:?}: {e}")))?;
                let value = header_value(value)?;
                request.headers_mut().insert(name, value);
            }
            AuthStrategy::ApiKey {
                key,
                value,
                location: ApiKeyLocation::Query,
            } => {
                merge_query_pairs(request.url_mut(), [(key.as_str(), value.as_str())]);
            }
        }

        tracing::debug!("Applied {} auth to {}", self.kind(), request.url().path());
        Ok(())
    }

    /// Build a strategy from user-supplied credentials.
    ///
    /// Unlike [`AuthRecord`] conversion this is strict: unknown kinds and
    /// missing credentials are errors, and the result must validate.
    pub fn from_credentials(
        kind: &str,
        credentials: &HashMap<String, String>,
    ) -> Result<Self, AuthError> {
        let kind = kind.trim().to_ascii_lowercase();
        tracing::debug!("Creating auth config of type '{}'", kind);

        let field = |kind: &'static str, field: &'static str| {
            credentials
                .get(field)
                .cloned()
                .ok_or(AuthError::MissingCredential { kind, field })
        };

        let auth = match kind.as_str() {
            "" | KIND_NONE => AuthStrategy::None,
            KIND_BASIC => AuthStrategy::Basic {
                username: field(KIND_BASIC, "username")?,
                password: field(KIND_BASIC, "password")?,
            },
            KIND_BEARER => AuthStrategy::Bearer {
                token: field(KIND_BEARER, "token")?,
            },
            KIND_API_KEY => {
                let key = field(KIND_API_KEY, "key")?;
                let value = field(KIND_API_KEY, "value")?;
                let location = field(KIND_API_KEY, "location")?.parse()?;
                AuthStrategy::ApiKey {
                    key,
                    value,
                    location,
                }
            }
            other => return Err(AuthError::UnsupportedKind(other.to_string())),
        };

        auth.validate()?;
        Ok(auth)
    }
}

// Credentials stay out of debug output and logs.
impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::None => f.write_str("None"),
            AuthStrategy::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            AuthStrategy::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
            AuthStrategy::ApiKey { key, location, .. } => f
                .debug_struct("ApiKey")
                .field("key", key)
                .field("value", &"***")
                .field("location", location)
                .finish(),
        }
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn header_value(value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value).map_err(|e| AuthError::InvalidHeader(e.to_string()))
}

/// Persisted form of an [`AuthStrategy`].
///
/// An empty or unrecognized `kind` converts back to [`AuthStrategy::None`].
/// Missing fields become empty strings and surface later as validation
/// errors rather than failing the load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl From<AuthStrategy> for AuthRecord {
    fn from(auth: AuthStrategy) -> Self {
        let kind = auth.kind().to_string();
        let fields: BTreeMap<String, String> = match auth {
            AuthStrategy::None => BTreeMap::new(),
            AuthStrategy::Basic { username, password } => {
                [("username", username), ("password", password)]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect()
            }
            AuthStrategy::Bearer { token } => [("token".to_string(), token)].into(),
            AuthStrategy::ApiKey {
                key,
                value,
                location,
            } => [
                ("key", key),
                ("value", value),
                ("location", location.as_str().to_string()),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        };
        AuthRecord { kind, fields }
    }
}

impl TryFrom<AuthRecord> for AuthStrategy {
    type Error = AuthError;

    fn try_from(mut record: AuthRecord) -> Result<Self, Self::Error> {
        let mut take = |name: &str| record.fields.remove(name).unwrap_or_default();

        let auth = match record.kind.as_str() {
            KIND_BASIC => AuthStrategy::Basic {
                username: take("username"),
                password: take("password"),
            },
            KIND_BEARER => AuthStrategy::Bearer {
                token: take("token"),
            },
            KIND_API_KEY => {
                let key = take("key");
                let value = take("value");
                let location = match take("location") {
                    l if l.is_empty() => ApiKeyLocation::default(),
                    l => l.parse()?,
                };
                AuthStrategy::ApiKey {
                    key,
                    value,
                    location,
                }
            }
            other => {
                if !other.is_empty() && other != KIND_NONE {
                    tracing::warn!("Unknown auth type '{}' in record, falling back to none", other);
                }
                AuthStrategy::None
            }
        };
        Ok(auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, Url};

    fn wire(url: &str) -> reqwest::Request {
        reqwest::Request::new(Method::GET, Url::parse(url).unwrap())
    }

    fn creds(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn no_auth_should_validate_and_leave_request_alone() {
        let mut req = wire("http://example.com/path");
        let auth = AuthStrategy::None;

        assert_eq!(auth.kind(), "none");
        assert!(auth.validate().is_ok());
        auth.apply(&mut req).unwrap();

        assert!(req.headers().is_empty());
        assert_eq!(req.url().as_str(), "http://example.com/path");
    }

    #[test]
    fn basic_auth_should_set_encoded_authorization_header() {
        let mut req = wire("http://example.com/");
        AuthStrategy::basic("testuser", "testpass")
            .apply(&mut req)
            .unwrap();

        assert_eq!(
            req.headers().get(AUTHORIZATION).unwrap(),
            "Basic dGVzdHVzZXI6dGVzdHBhc3M="
        );
    }

    #[test]
    fn basic_auth_should_reject_blank_fields() {
        assert_eq!(
            AuthStrategy::basic("  ", "pass").validate(),
            Err(AuthError::MissingUsername)
        );
        assert_eq!(
            AuthStrategy::basic("user", "").validate(),
            Err(AuthError::MissingPassword)
        );
        assert_eq!(
            AuthStrategy::basic("user", " \t").validate(),
            Err(AuthError::MissingPassword)
        );
    }

    #[test]
    fn bearer_auth_should_set_authorization_header() {
        let mut req = wire("http://example.com/");
        AuthStrategy::bearer("tok").apply(&mut req).unwrap();
        assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Bearer tok");
    }

    #[test]
    fn bearer_auth_should_overwrite_existing_authorization() {
        let mut req = wire("http://example.com/");
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Basic old"));
        AuthStrategy::bearer("new").apply(&mut req).unwrap();

        assert_eq!(req.headers().get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Bearer new");
    }

    #[test]
    fn invalid_auth_should_not_mutate_request() {
        let mut req = wire("http://example.com/path?existing=value");
        let before_url = req.url().clone();

        for auth in [
            AuthStrategy::basic("", "pass"),
            AuthStrategy::bearer("   "),
            AuthStrategy::api_key("api_key", "", ApiKeyLocation::Query),
            AuthStrategy::api_key("", "secret", ApiKeyLocation::Header),
        ] {
            assert!(auth.apply(&mut req).is_err());
            assert!(req.headers().is_empty());
            assert_eq!(req.url(), &before_url);
        }
    }

    #[test]
    fn api_key_in_header_should_set_named_header() {
        let mut req = wire("http://example.com/");
        AuthStrategy::api_key("X-API-Key", "secret", ApiKeyLocation::Header)
            .apply(&mut req)
            .unwrap();
        assert_eq!(req.headers().get("x-api-key").unwrap(), "secret");
    }

    #[test]
    fn api_key_with_unrepresentable_header_name_should_fail_cleanly() {
        let mut req = wire("http://example.com/");
        let err = AuthStrategy::api_key("bad key", "secret", ApiKeyLocation::Header)
            .apply(&mut req)
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidHeader(_)));
        assert!(req.headers().is_empty());
    }

    #[test]
    fn api_key_in_query_should_preserve_existing_params_and_path() {
        let mut req = wire("http://x/path?existing=value");
        AuthStrategy::api_key("api_key", "secret", ApiKeyLocation::Query)
            .apply(&mut req)
            .unwrap();

        let url = req.url();
        assert_eq!(url.path(), "/path");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("existing".to_string(), "value".to_string())));
        assert!(pairs.contains(&("api_key".to_string(), "secret".to_string())));
    }

    #[test]
    fn api_key_in_query_should_overwrite_same_named_param() {
        let mut req = wire("http://x/path?api_key=old&other=1#frag");
        AuthStrategy::api_key("api_key", "new", ApiKeyLocation::Query)
            .apply(&mut req)
            .unwrap();
        assert_eq!(req.url().query(), Some("other=1&api_key=new"));
        assert_eq!(req.url().fragment(), Some("frag"));
    }

    #[test]
    fn location_should_parse_case_insensitively() {
        assert_eq!("Header".parse::<ApiKeyLocation>(), Ok(ApiKeyLocation::Header));
        assert_eq!("QUERY".parse::<ApiKeyLocation>(), Ok(ApiKeyLocation::Query));
        assert_eq!(
            "cookie".parse::<ApiKeyLocation>(),
            Err(AuthError::InvalidApiKeyLocation("cookie".to_string()))
        );
    }

    #[test]
    fn kinds_should_match_discriminators() {
        assert_eq!(AuthStrategy::basic("u", "p").kind(), "basic");
        assert_eq!(AuthStrategy::bearer("t").kind(), "bearer");
        assert_eq!(
            AuthStrategy::api_key("k", "v", ApiKeyLocation::Query).kind(),
            "apikey"
        );
        assert_eq!(
            AuthStrategy::supported_kinds(),
            &["none", "basic", "bearer", "apikey"]
        );
    }

    #[test]
    fn from_credentials_should_build_each_kind() {
        let auth =
            AuthStrategy::from_credentials("Basic", &creds(&[("username", "u"), ("password", "p")]))
                .unwrap();
        assert_eq!(auth, AuthStrategy::basic("u", "p"));

        let auth = AuthStrategy::from_credentials(" bearer ", &creds(&[("token", "t")])).unwrap();
        assert_eq!(auth, AuthStrategy::bearer("t"));

        let auth = AuthStrategy::from_credentials(
            "apikey",
            &creds(&[("key", "k"), ("value", "v"), ("location", "query")]),
        )
        .unwrap();
        assert_eq!(auth, AuthStrategy::api_key("k", "v", ApiKeyLocation::Query));

        assert_eq!(
            AuthStrategy::from_credentials("", &HashMap::new()).unwrap(),
            AuthStrategy::None
        );
    }

    #[test]
    fn from_credentials_should_reject_missing_or_unknown() {
        assert_eq!(
            AuthStrategy::from_credentials("basic", &creds(&[("username", "u")])),
            Err(AuthError::MissingCredential {
                kind: "basic",
                field: "password"
            })
        );
        assert_eq!(
            AuthStrategy::from_credentials("oauth2", &HashMap::new()),
            Err(AuthError::UnsupportedKind("oauth2".to_string()))
        );
        assert_eq!(
            AuthStrategy::from_credentials("bearer", &creds(&[("token", " ")])),
            Err(AuthError::MissingToken)
        );
        assert!(matches!(
            AuthStrategy::from_credentials(
                "apikey",
                &creds(&[("key", "k"), ("value", "v"), ("location", "body")])
            ),
            Err(AuthError::InvalidApiKeyLocation(_))
        ));
    }

    #[test]
    fn record_should_carry_discriminator_and_fields() {
        let record = AuthRecord::from(AuthStrategy::api_key("k", "v", ApiKeyLocation::Query));
        assert_eq!(record.kind, "apikey");
        assert_eq!(record.fields.get("location").map(String::as_str), Some("query"));

        let record = AuthRecord::from(AuthStrategy::None);
        assert_eq!(record.kind, "none");
        assert!(record.fields.is_empty());
    }

    #[test]
    fn unknown_or_absent_kind_should_load_as_no_auth() {
        let auth: AuthStrategy = serde_json::from_str(r#"{"kind":"digest","fields":{}}"#).unwrap();
        assert_eq!(auth, AuthStrategy::None);

        let auth: AuthStrategy = serde_json::from_str("{}").unwrap();
        assert_eq!(auth, AuthStrategy::None);
    }

    #[test]
    fn serialized_strategy_should_load_back() {
        let original = AuthStrategy::basic("user", "pass");
        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains(r#""kind":"basic""#));

        let loaded: AuthStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn debug_output_should_mask_secrets() {
        let rendered = format!("{:?}", AuthStrategy::basic("alice", "hunter2"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));

        let rendered = format!("{:?}", AuthStrategy::bearer("sekrit"));
        assert!(!rendered.contains("sekrit"));
    }
}
