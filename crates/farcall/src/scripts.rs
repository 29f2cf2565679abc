//! Script locations for `importScripts`.
//!
//! A location is either a filesystem path or a `file://` URL. Anything with
//! another scheme is rejected up front, since the remote context has no
//! network access.

use farcall_common::protocol::error::{FarcallError, Result};
use std::path::PathBuf;

const FILE_SCHEME: &str = "file://";

/// Resolves a script location to a filesystem path.
pub fn resolve_location(location: &str) -> Result<PathBuf> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(FarcallError::InvalidScriptLocation(
            "script location is empty".into(),
        ));
    }

    if let Some(path) = trimmed.strip_prefix(FILE_SCHEME) {
        // file://localhost/path and file:///path both name /path
        let path = match path.strip_prefix("localhost") {
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        };
        if !path.starts_with('/') {
            return Err(FarcallError::InvalidScriptLocation(format!(
                "'{}' must name an absolute path on localhost",
                location
            )));
        }
        return Ok(PathBuf::from(path));
    }

    if has_url_scheme(trimmed) {
        return Err(FarcallError::InvalidScriptLocation(format!(
            "unsupported scheme in '{}'",
            location
        )));
    }

    Ok(PathBuf::from(trimmed))
}

/// Reads the script source behind `location`.
pub fn load_script(location: &str) -> Result<String> {
    let path = resolve_location(location)?;
    tracing::debug!(path = %path.display(), "loading script");
    Ok(std::fs::read_to_string(&path)?)
}

fn has_url_scheme(location: &str) -> bool {
    match location.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
