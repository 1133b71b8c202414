use serde::{Deserialize, Serialize};

pub const BREAKGLASS_CATEGORY: &str = "breakglass";

/// A structured reason for a privileged action, carried as the `justs`
/// custom claim (§3). `annotation` is populated by a validator that wants
/// to enrich the raw justification (e.g. resolving a `jira` key to a
/// ticket summary).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Justification {
    pub category: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub annotation: Option<std::collections::HashMap<String, String>>,
}

/// A caller-supplied justification before validation.
#[derive(Debug, Clone)]
pub struct RawJustification {
    pub category: String,
    pub value: String,
}

/// Standard + custom claims carried by both JVS tokens and breakglass
/// tokens (§3). `exp`/`iat`/`nbf` are Unix seconds, matching the JWT spec's
/// `NumericDate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
    pub justs: Vec<Justification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub alg: &'static str,
    pub kid: String,
    pub typ: &'static str,
}

impl Header {
    pub fn es256(kid: impl Into<String>) -> Self {
        Self {
            alg: "ES256",
            kid: kid.into(),
            typ: "JWT",
        }
    }
}
