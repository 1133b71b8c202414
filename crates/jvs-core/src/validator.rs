//! The Justification Validator capability (§4.E): a list of `(category,
//! validator)` pairs injected into the Signing Pipeline. Unknown
//! categories fail with `UnknownJustificationCategory` unless the set
//! carries a wildcard entry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::claims::{Justification, RawJustification};
use crate::error::JvsError;

const WILDCARD: &str = "*";

pub trait Validator: Send + Sync {
    /// Maps a raw justification to either a validated (possibly enriched)
    /// justification, or a rejection reason.
    fn validate(&self, raw: &RawJustification) -> Result<Justification, String>;
}

/// Accepts any non-empty free-text explanation, unchanged. This is the
/// default shipped with the core; real policy validators (e.g. one that
/// resolves a `jira` key against a ticket tracker) are consumed as this
/// same capability but live outside the core.
pub struct ExplanationValidator;

impl Validator for ExplanationValidator {
    fn validate(&self, raw: &RawJustification) -> Result<Justification, String> {
        if raw.value.trim().is_empty() {
            return Err("explanation must not be empty".to_string());
        }
        Ok(Justification {
            category: raw.category.clone(),
            value: raw.value.clone(),
            annotation: None,
        })
    }
}

/// Accepts anything; used only where a deployment wants to waive
/// validation entirely for a category (e.g. local development).
pub struct AcceptAllValidator;

impl Validator for AcceptAllValidator {
    fn validate(&self, raw: &RawJustification) -> Result<Justification, String> {
        Ok(Justification {
            category: raw.category.clone(),
            value: raw.value.clone(),
            annotation: None,
        })
    }
}

#[derive(Default)]
pub struct ValidatorSet {
    by_category: HashMap<String, Arc<dyn Validator>>,
    wildcard: Option<Arc<dyn Validator>>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, category: impl Into<String>, validator: Arc<dyn Validator>) -> Self {
        let category = category.into();
        if category == WILDCARD {
            self.wildcard = Some(validator);
        } else {
            self.by_category.insert(category, validator);
        }
        self
    }

    pub fn validate(&self, raw: &RawJustification) -> Result<Justification, JvsError> {
        let validator = self
            .by_category
            .get(&raw.category)
            .or(self.wildcard.as_ref())
            .ok_or_else(|| JvsError::UnknownJustificationCategory {
                category: raw.category.clone(),
            })?;

        validator
            .validate(raw)
            .map_err(|reason| JvsError::JustificationRejected {
                category: raw.category.clone(),
                reason,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_category_without_wildcard() {
        let set = ValidatorSet::new().register("explanation", Arc::new(ExplanationValidator));
        let raw = RawJustification {
            category: "jira".to_string(),
            value: "PROJ-123".to_string(),
        };
        let err = set.validate(&raw).unwrap_err();
        assert!(matches!(
            err,
            JvsError::UnknownJustificationCategory { .. }
        ));
    }

    #[test]
    fn wildcard_covers_unregistered_categories() {
        let set = ValidatorSet::new().register("*", Arc::new(AcceptAllValidator));
        let raw = RawJustification {
            category: "jira".to_string(),
            value: "PROJ-123".to_string(),
        };
        assert!(set.validate(&raw).is_ok());
    }

    #[test]
    fn rejects_empty_explanation() {
        let set = ValidatorSet::new().register("explanation", Arc::new(ExplanationValidator));
        let raw = RawJustification {
            category: "explanation".to_string(),
            value: "   ".to_string(),
        };
        let err = set.validate(&raw).unwrap_err();
        assert!(matches!(err, JvsError::JustificationRejected { .. }));
    }
}
