//! Paths of the executor's HTTP surface.
//!
//! Paths double as Status Poller keys, so two call sites asking for the
//! same resource always build the same string.

use crate::error::CoreError;

pub const ANVILS: &str = "/anvil";
pub const ANVIL_BY_UUID: &str = "/anvil/{uuid}";
pub const ANVIL_CAPACITY: &str = "/anvil/{uuid}/capacity";
pub const HOSTS: &str = "/host";
pub const SERVERS: &str = "/server";
pub const JOBS: &str = "/job";
pub const JOB_BY_UUID: &str = "/job/{uuid}";

pub const LEGACY_JOBS: &str = "/status/jobs.json";
pub const LEGACY_NETWORK: &str = "/status/network.json";

/// Maximum length of a path segment substituted into a route.
const MAX_SEGMENT_LEN: usize = 128;

/// A uuid (or any id) is substituted verbatim, so only a conservative
/// character set is allowed to keep it a single path segment.
pub fn validate_segment(segment: &str) -> Result<(), CoreError> {
    if segment.is_empty() {
        return Err(CoreError::Validation(
            "Path segment must not be empty".to_string(),
        ));
    }
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(CoreError::Validation(format!(
            "Path segment must not exceed {MAX_SEGMENT_LEN} characters"
        )));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(CoreError::Validation(format!(
            "Path segment {segment:?} may only contain alphanumeric, hyphen, underscore, or dot characters"
        )));
    }
    if segment.chars().all(|c| c == '.') {
        return Err(CoreError::Validation(format!(
            "Path segment {segment:?} must not be a relative path"
        )));
    }
    Ok(())
}

fn with_uuid(template: &str, uuid: &str) -> Result<String, CoreError> {
    validate_segment(uuid)?;
    Ok(template.replace("{uuid}", uuid))
}

pub fn anvil(uuid: &str) -> Result<String, CoreError> {
    with_uuid(ANVIL_BY_UUID, uuid)
}

pub fn anvil_capacity(uuid: &str) -> Result<String, CoreError> {
    with_uuid(ANVIL_CAPACITY, uuid)
}

pub fn job(uuid: &str) -> Result<String, CoreError> {
    with_uuid(JOB_BY_UUID, uuid)
}
