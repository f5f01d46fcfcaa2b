//! Mapping between organization ids and unified-store namespaces.
//!
//! Organization 1 lives in `default`; every other organization lives in
//! `org-<id>`.

use crate::errors::{MigrationError, MigrationResult};

pub const DEFAULT_NAMESPACE: &str = "default";
const ORG_PREFIX: &str = "org-";

pub fn namespace_for_org(org_id: i64) -> String {
    if org_id == 1 {
        DEFAULT_NAMESPACE.to_string()
    } else {
        format!("{}{}", ORG_PREFIX, org_id)
    }
}

pub fn parse_namespace(namespace: &str) -> MigrationResult<i64> {
    if namespace == DEFAULT_NAMESPACE {
        return Ok(1);
    }

    namespace
        .strip_prefix(ORG_PREFIX)
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse::<i64>().ok())
        .filter(|org_id| *org_id > 0)
        .ok_or_else(|| MigrationError::InvalidNamespace(namespace.to_string()))
}
