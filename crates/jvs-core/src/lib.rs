pub mod claims;
pub mod config;
pub mod error;
pub mod jwks;
pub mod sig_format;
pub mod signing;
pub mod validator;
pub mod verify;

pub use claims::{Claims, Header, Justification, RawJustification};
pub use config::ServiceConfig;
pub use error::JvsError;
pub use jwks::{EcdsaJwk, JwksCache, JwksDocument};
pub use signing::{IssuanceRequest, SigningPipeline};
pub use validator::{AcceptAllValidator, ExplanationValidator, Validator, ValidatorSet};
pub use verify::{VerifyOptions, verify};
