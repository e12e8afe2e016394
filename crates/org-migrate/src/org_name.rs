//! Destination org naming.
//!
//! Each mapping row names the org its projects belong in as
//! `{asset id}_{asset name}`, capped at the Snyk org name limit.

/// Name used when a row is missing its asset ID or asset name.
pub const UNKNOWN_ORG_NAME: &str = "Unknown Asset ID";

/// Longest org name Snyk accepts, in characters.
pub const MAX_ORG_NAME_LEN: usize = 60;

/// Org name for a row, before any length cap.
pub fn full_org_name(asset_id: &str, asset_name: &str) -> String {
    if asset_id.is_empty() || asset_name.is_empty() {
        UNKNOWN_ORG_NAME.to_string()
    } else {
        format!("{}_{}", asset_id, asset_name)
    }
}

/// Derive the destination org name for a row.
///
/// Names longer than [`MAX_ORG_NAME_LEN`] characters are cut to that many
/// characters with no uniqueness check.
pub fn derive_org_name(asset_id: &str, asset_name: &str) -> String {
    let name = full_org_name(asset_id, asset_name);

    match name.char_indices().nth(MAX_ORG_NAME_LEN) {
        Some((cut, _)) => name[..cut].to_string(),
        None => name,
    }
}
