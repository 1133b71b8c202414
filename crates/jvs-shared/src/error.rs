use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Ambient error type for configuration loading, HTTP glue, and anything
/// else that isn't part of the KMS/rotation/signing domain taxonomy
/// (see `jvs_kms::KmsError` and `jvs_core::JvsError` for those).
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("invalid configuration: {msg}")]
    Configuration { msg: String },
    #[error("invalid request")]
    InvalidRequest {
        msg: String,
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("unknown error")]
    Unknown(#[from] anyhow::Error),
    #[error("io error")]
    IoError(#[from] std::io::Error),
    #[error("url parse error")]
    UrlParseError(#[from] url::ParseError),
    #[error("serde json error")]
    SerdeSerializationError(#[from] serde_json::Error),
    #[error("axum error")]
    AxumError(#[from] axum::Error),
    #[error("address parse error")]
    AddrParseError(#[from] std::net::AddrParseError),
    #[error("environment variable error")]
    VarError(#[from] std::env::VarError),
    #[error("reqwest error")]
    ReqwestError(#[from] reqwest::Error),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    name: String,
    message: String,
}

impl IntoResponse for CommonError {
    fn into_response(self) -> Response {
        let status = match self {
            CommonError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CommonError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            CommonError::Unknown(_)
            | CommonError::IoError(_)
            | CommonError::UrlParseError(_)
            | CommonError::SerdeSerializationError(_)
            | CommonError::AxumError(_)
            | CommonError::AddrParseError(_)
            | CommonError::VarError(_)
            | CommonError::ReqwestError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let name = match self {
            CommonError::Configuration { .. } => "Configuration",
            CommonError::InvalidRequest { .. } => "InvalidRequest",
            _ => "InternalServerError",
        }
        .to_string();

        let body = Json(ErrorResponse {
            name,
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
