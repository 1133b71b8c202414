//! Encodes/decodes the primary-version election as a label on the KMS key
//! (§4.B). Storing the election on the key itself means any process
//! instance can recover rotation state by reading KMS; there is no
//! separate datastore and no single rotator is privileged.

use crate::adapter::KmsAdapter;
use crate::error::KmsError;

pub const PRIMARY_LABEL_KEY: &str = "primary";
const PRIMARY_LABEL_PREFIX: &str = "ver_";

/// Reads the `primary` label off `key_name` and reconstructs the full
/// version resource name, or `None` if no election has been made yet.
pub async fn get_primary(
    adapter: &dyn KmsAdapter,
    key_name: &str,
) -> Result<Option<String>, KmsError> {
    let key = adapter.get_key(key_name).await?;
    Ok(key
        .labels
        .get(PRIMARY_LABEL_KEY)
        .and_then(|label| decode_primary_label(key_name, label)))
}

/// Writes `version_name` as the new primary election. Last-writer-wins:
/// concurrent rotators may race here, and the loser's election is silently
/// overwritten. This is acceptable because the Planner converges (§4.C) —
/// the next planning pass on any instance observes the surviving label.
pub async fn set_primary(
    adapter: &dyn KmsAdapter,
    key_name: &str,
    version_name: &str,
) -> Result<(), KmsError> {
    let label_value = encode_primary_label(version_name)?;
    let mut key = adapter.get_key(key_name).await?;
    key.labels
        .insert(PRIMARY_LABEL_KEY.to_string(), label_value);
    adapter.update_key_labels(key_name, key.labels).await?;
    Ok(())
}

/// `projects/P/locations/L/keyRings/R/cryptoKeys/K/cryptoKeyVersions/V` —
/// ten slash-delimited segments, the last pair naming the version id.
fn canonical_version_segments(version_name: &str) -> Option<Vec<&str>> {
    let segments: Vec<&str> = version_name.split('/').collect();
    if segments.len() != 10 || segments[8] != "cryptoKeyVersions" {
        return None;
    }
    Some(segments)
}

fn encode_primary_label(version_name: &str) -> Result<String, KmsError> {
    let segments =
        canonical_version_segments(version_name).ok_or_else(|| KmsError::MalformedVersionName {
            name: version_name.to_string(),
        })?;
    Ok(format!("{PRIMARY_LABEL_PREFIX}{}", segments[9]))
}

fn decode_primary_label(key_name: &str, label_value: &str) -> Option<String> {
    let id = label_value.strip_prefix(PRIMARY_LABEL_PREFIX)?;
    Some(format!("{key_name}/cryptoKeyVersions/{id}"))
}
