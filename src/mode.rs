//! Build mode and everything derived from it.

use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the content hash embedded in production artifact names
pub const CONTENT_HASH_LEN: usize = 20;

/// Development or production build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    /// Interpret the `NODE_ENV`-style signal.
    ///
    /// Absent or blank means development, `development` means development,
    /// any other value means production.
    pub fn from_signal(signal: Option<&str>) -> Self {
        match signal.map(str::trim) {
            None | Some("") => BuildMode::Development,
            Some(s) if s.eq_ignore_ascii_case("development") => BuildMode::Development,
            Some(_) => BuildMode::Production,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode-dependent policy. All artifact names go through [`ModePolicy::artifact_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePolicy {
    mode: BuildMode,
}

impl ModePolicy {
    pub fn new(mode: BuildMode) -> Self {
        Self { mode }
    }

    #[inline]
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    #[inline]
    pub fn is_development(&self) -> bool {
        self.mode == BuildMode::Development
    }

    #[inline]
    pub fn should_minify(&self) -> bool {
        !self.is_development()
    }

    #[inline]
    pub fn should_generate_source_maps(&self) -> bool {
        self.is_development()
    }

    #[inline]
    pub fn should_enable_live_reload(&self) -> bool {
        self.is_development()
    }

    /// `{name}.{ext}` in development, `{name}.{hash}.{ext}` in production.
    ///
    /// The hash depends only on `content`.
    pub fn artifact_name(&self, logical_name: &str, extension: &str, content: &[u8]) -> String {
        match self.mode {
            BuildMode::Development => format!("{logical_name}.{extension}"),
            BuildMode::Production => {
                format!("{logical_name}.{}.{extension}", content_hash(content))
            }
        }
    }
}

/// Truncated hex SHA-256 of `content`
pub fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let mut hash = hex::encode(digest);
    hash.truncate(CONTENT_HASH_LEN);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_signal() {
        assert_eq!(BuildMode::from_signal(None), BuildMode::Development);
        assert_eq!(BuildMode::from_signal(Some("")), BuildMode::Development);
        assert_eq!(BuildMode::from_signal(Some("development")), BuildMode::Development);
        assert_eq!(BuildMode::from_signal(Some("Development ")), BuildMode::Development);
        assert_eq!(BuildMode::from_signal(Some("production")), BuildMode::Production);
        assert_eq!(BuildMode::from_signal(Some("staging")), BuildMode::Production);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(BuildMode::Production.to_string(), "production");
        assert_eq!(BuildMode::default(), BuildMode::Development);
    }

    #[test]
    fn test_policy_development_flags() {
        let policy = ModePolicy::new(BuildMode::Development);
        assert!(policy.is_development());
        assert!(!policy.should_minify());
        assert!(policy.should_generate_source_maps());
        assert!(policy.should_enable_live_reload());
    }

    #[test]
    fn test_policy_production_flags() {
        let policy = ModePolicy::new(BuildMode::Production);
        assert!(!policy.is_development());
        assert!(policy.should_minify());
        assert!(!policy.should_generate_source_maps());
        assert!(!policy.should_enable_live_reload());
    }

    #[test]
    fn test_artifact_name_development() {
        let policy = ModePolicy::new(BuildMode::Development);
        assert_eq!(policy.artifact_name("app", "js", b"console.log(1)"), "app.js");
    }

    #[test]
    fn test_artifact_name_production() {
        let policy = ModePolicy::new(BuildMode::Production);
        let name = policy.artifact_name("app", "js", b"console.log(1)");
        let parts: Vec<&str> = name.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "app");
        assert_eq!(parts[1].len(), CONTENT_HASH_LEN);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[2], "js");
    }

    #[test]
    fn test_artifact_hash_tracks_content_only() {
        let policy = ModePolicy::new(BuildMode::Production);
        let a = policy.artifact_name("app", "js", b"one");
        let b = policy.artifact_name("app", "js", b"one");
        let c = policy.artifact_name("app", "js", b"two");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_content_hash_known_value() {
        // sha256("") = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        assert_eq!(content_hash(b""), "e3b0c44298fc1c149afb");
    }
}
