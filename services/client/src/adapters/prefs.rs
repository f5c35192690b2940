//! services/client/src/adapters/prefs.rs
//!
//! Local preference cache for the generation defaults. The cache is a
//! plain JSON blob with no schema enforcement beyond "parse as JSON, fall
//! back to defaults on any error"; a corrupt or missing file never
//! breaks the client.

use std::path::Path;

use imagene_core::domain::GenerationProfile;
use tracing::warn;

/// Loads the cached generation profile, falling back to the defaults on
/// any read or decode error.
pub fn load(path: &Path) -> GenerationProfile {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return GenerationProfile::default(),
    };
    match serde_json::from_str(&raw) {
        Ok(profile) => profile,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "undecodable prefs cache, using defaults");
            GenerationProfile::default()
        }
    }
}

/// Writes the generation profile back to the cache, creating parent
/// directories as needed.
pub fn save(path: &Path, profile: &GenerationProfile) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(profile).map_err(std::io::Error::other)?;
    std::fs::write(path, raw)
}
