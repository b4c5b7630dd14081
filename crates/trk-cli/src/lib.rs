//! TRK CLI - operator front end for the transition engine
//!
//! Runs the engine against fixture files: a manifest (`.json`, `.yaml`,
//! `.yml`) and a JSON array of artifact snapshots.

#![warn(unreachable_pub)]

pub mod commands;
pub mod workspace;

pub use commands::Report;
pub use workspace::{read_artifacts, Workspace};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "TRK_LOG";

/// Split a comma-separated id list, dropping blanks
#[must_use]
pub fn parse_ids(raw: &str) -> Vec<trk_manifest::ArtifactId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(trk_manifest::ArtifactId::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_trimmed() {
        let ids = parse_ids(" BUG-1, BUG-2 ,,T-3");
        let raw: Vec<&str> = ids.iter().map(trk_manifest::ArtifactId::as_str).collect();
        assert_eq!(raw, vec!["BUG-1", "BUG-2", "T-3"]);
    }
}
