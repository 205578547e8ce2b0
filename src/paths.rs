//! Logical-to-absolute path resolution rooted at a fixed base directory.

use std::path::{Component, Path, PathBuf};

/// Resolves logical locations like `./src/js/app.js` against a base directory.
///
/// Resolution is purely lexical: nothing touches the filesystem, so the result
/// may not exist. Callers check existence themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    base: PathBuf,
}

impl PathResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: normalize(&base.into()),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve a logical path. Absolute inputs ignore the base.
    pub fn resolve(&self, logical: &str) -> PathBuf {
        let logical = Path::new(logical);
        if logical.is_absolute() {
            normalize(logical)
        } else {
            normalize(&self.base.join(logical))
        }
    }
}

/// Lexically collapse `.` and `..` components.
///
/// `..` never climbs above a root or prefix component.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative() {
        let resolver = PathResolver::new("/project");
        assert_eq!(
            resolver.resolve("./src/js/app.js"),
            PathBuf::from("/project/src/js/app.js")
        );
    }

    #[test]
    fn test_resolve_parent_components() {
        let resolver = PathResolver::new("/project/tools");
        assert_eq!(resolver.resolve("../app"), PathBuf::from("/project/app"));
        assert_eq!(resolver.resolve("a/./b/../c"), PathBuf::from("/project/tools/a/c"));
    }

    #[test]
    fn test_resolve_never_climbs_above_root() {
        let resolver = PathResolver::new("/");
        assert_eq!(resolver.resolve("../../etc"), PathBuf::from("/etc"));
    }

    #[test]
    fn test_resolve_absolute_ignores_base() {
        let resolver = PathResolver::new("/project");
        assert_eq!(resolver.resolve("/var/www/./site"), PathBuf::from("/var/www/site"));
    }

    #[test]
    fn test_resolve_empty_is_base() {
        let resolver = PathResolver::new("/project/./");
        assert_eq!(resolver.resolve(""), PathBuf::from("/project"));
        assert_eq!(resolver.base(), Path::new("/project"));
    }

    #[test]
    fn test_resolve_relative_base_keeps_leading_parents() {
        let resolver = PathResolver::new("..");
        assert_eq!(resolver.resolve("../x"), PathBuf::from("../../x"));
    }

    #[test]
    fn test_resolve_does_not_require_existence() {
        let resolver = PathResolver::new("/definitely/missing");
        assert_eq!(
            resolver.resolve("nope.html"),
            PathBuf::from("/definitely/missing/nope.html")
        );
    }
}
