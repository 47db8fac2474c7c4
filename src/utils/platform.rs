//! Platform-specific utilities for dlqueue
//!
//! Desktop shells differ in where user downloads live; this resolves the
//! default folder with a home-relative fallback.

use std::path::PathBuf;

/// Returns the default download directory
/// - All platforms: the user's Downloads folder, falling back to ~/Downloads
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("./downloads"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_download_dir_is_not_empty() {
        assert!(!default_download_dir().as_os_str().is_empty());
    }
}
