use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use jvs_kms::KmsError;
use jvs_rotation::{PartialRotationFailure, RotationBatchFailure};

/// Umbrella error for the Signing/Verification pipeline and the HTTP
/// layer (§7). KMS failures are wrapped rather than re-derived so callers
/// can still distinguish transient from permanent via `KmsError::is_transient`.
#[derive(Error, Debug)]
pub enum JvsError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Kms(#[from] KmsError),

    #[error(transparent)]
    PartialRotationFailure(#[from] PartialRotationFailure),

    #[error(transparent)]
    RotationBatch(#[from] RotationBatchFailure),

    #[error("invalid token: {reason}")]
    InvalidToken { reason: String },

    #[error("breakglass token presented but the verifier has not opted in")]
    BreakglassForbidden,

    #[error("token subject does not match the expected subject")]
    SubjectMismatch,

    #[error("justification rejected for category '{category}': {reason}")]
    JustificationRejected { category: String, reason: String },

    #[error("unknown justification category '{category}'")]
    UnknownJustificationCategory { category: String },

    #[error("no primary key version is elected")]
    NoPrimary,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for JvsError {
    fn into_response(self) -> Response {
        let status = match &self {
            JvsError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            JvsError::Kms(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            JvsError::Kms(_) => StatusCode::BAD_GATEWAY,
            JvsError::PartialRotationFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            JvsError::RotationBatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            JvsError::InvalidToken { .. } => StatusCode::UNAUTHORIZED,
            JvsError::BreakglassForbidden => StatusCode::FORBIDDEN,
            JvsError::SubjectMismatch => StatusCode::UNAUTHORIZED,
            JvsError::JustificationRejected { .. } => StatusCode::BAD_REQUEST,
            JvsError::UnknownJustificationCategory { .. } => StatusCode::BAD_REQUEST,
            JvsError::NoPrimary => StatusCode::SERVICE_UNAVAILABLE,
        };

        let error = match &self {
            JvsError::Configuration(_) => "ConfigurationError",
            JvsError::Kms(e) if e.is_transient() => "KMSTransient",
            JvsError::Kms(_) => "KMSPermanent",
            JvsError::PartialRotationFailure(_) => "PartialRotationFailure",
            JvsError::RotationBatch(_) => "RotationBatchFailure",
            JvsError::InvalidToken { .. } => "InvalidToken",
            JvsError::BreakglassForbidden => "BreakglassForbidden",
            JvsError::SubjectMismatch => "SubjectMismatch",
            JvsError::JustificationRejected { .. } => "JustificationRejected",
            JvsError::UnknownJustificationCategory { .. } => "UnknownJustificationCategory",
            JvsError::NoPrimary => "NoPrimary",
        }
        .to_string();

        (
            status,
            Json(ErrorBody {
                error,
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}
