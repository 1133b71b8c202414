use thiserror::Error;

/// Errors surfaced by the KMS Adapter, classified per the caller's retry
/// policy: `Transient` failures (network, rate limit, 5xx) are expected to
/// be retried by the outer schedule; `Permanent` failures (permission
/// denied, not found) are not.
#[derive(Error, Debug)]
pub enum KmsError {
    #[error("transient KMS error: {msg}")]
    Transient {
        msg: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("permanent KMS error: {msg}")]
    Permanent {
        msg: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("malformed version name: {name}")]
    MalformedVersionName { name: String },
}

impl KmsError {
    pub fn transient(msg: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        KmsError::Transient {
            msg: msg.into(),
            source: Some(source.into()),
        }
    }

    pub fn permanent(msg: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        KmsError::Permanent {
            msg: msg.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, KmsError::Transient { .. })
    }
}

/// Classifies an opaque GCP client error into `Transient`/`Permanent` by
/// inspecting its rendered message for well-known status substrings. The
/// client crate's status codes aren't consumed structurally here because
/// doing so would tie this adapter to a single provider's error shape;
/// default to `Permanent` when nothing matches, since a mistaken retry is
/// worse than a surfaced failure for KMS mutations.
pub fn classify<E>(context: &str, err: E) -> KmsError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let rendered = err.to_string().to_ascii_lowercase();
    let transient = [
        "unavailable",
        "deadline exceeded",
        "deadline_exceeded",
        "resource exhausted",
        "resource_exhausted",
        "rate limit",
        "internal error",
        "aborted",
        "503",
        "429",
        "500",
    ]
    .iter()
    .any(|needle| rendered.contains(needle));

    if transient {
        KmsError::transient(context, anyhow::Error::new(err))
    } else {
        KmsError::permanent(context, anyhow::Error::new(err))
    }
}
