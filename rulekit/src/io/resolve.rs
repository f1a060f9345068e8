//! Locates operator resources (scripts, executables) on disk.
//!
//! Lookup order for a resource string:
//!
//! 1. the string as given (absolute, or relative to the working directory);
//! 2. each configured search root joined with the string.
//!
//! Candidates containing glob metacharacters are expanded and the first
//! existing match (in lexical order) wins. Resolved paths are made absolute so
//! a bare file name can never be mistaken for a `PATH` lookup at spawn time.

use std::path::{self, Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceResolver {
    roots: Vec<PathBuf>,
}

impl ResourceResolver {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve `resource` to an existing path.
    ///
    /// Fails with [`ConfigError::ResourceNotFound`] listing every candidate
    /// that was tried.
    pub fn resolve(&self, resource: &str) -> Result<PathBuf, ConfigError> {
        let mut tried = Vec::new();
        for candidate in self.candidates(resource) {
            if let Some(found) = existing(&candidate) {
                let found = path::absolute(&found).unwrap_or(found);
                debug!(resource, path = %found.display(), "resource resolved");
                return Ok(found);
            }
            tried.push(candidate);
        }
        debug!(resource, tried = tried.len(), "resource not found");
        Err(ConfigError::ResourceNotFound {
            resource: resource.to_string(),
            tried,
        })
    }

    fn candidates(&self, resource: &str) -> Vec<PathBuf> {
        let given = PathBuf::from(resource);
        let mut candidates = vec![given.clone()];
        if given.is_relative() {
            candidates.extend(self.roots.iter().map(|root| root.join(&given)));
        }
        candidates
    }
}

fn existing(candidate: &Path) -> Option<PathBuf> {
    if candidate.exists() {
        return Some(candidate.to_path_buf());
    }
    let pattern = candidate.to_str()?;
    if !has_glob_meta(pattern) {
        return None;
    }
    glob::glob(pattern).ok()?.flatten().find(|p| p.exists())
}

fn has_glob_meta(raw: &str) -> bool {
    raw.contains(['*', '?', '['])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn absolute_path_resolves_without_roots() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("scan.sh");
        fs::write(&file, "").expect("write");

        let resolver = ResourceResolver::default();
        let resolved = resolver.resolve(file.to_str().expect("utf8")).expect("resolve");
        assert_eq!(resolved, file);
    }

    #[test]
    fn relative_path_resolves_against_roots_in_order() {
        let first = tempfile::tempdir().expect("tempdir");
        let second = tempfile::tempdir().expect("tempdir");
        fs::write(second.path().join("scan.sh"), "").expect("write");

        let resolver =
            ResourceResolver::new([first.path().to_path_buf(), second.path().to_path_buf()]);
        let resolved = resolver.resolve("scan.sh").expect("resolve");
        assert_eq!(resolved, second.path().join("scan.sh"));
    }

    #[test]
    fn glob_picks_first_lexical_match() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("b-scan.sh"), "").expect("write");
        fs::write(temp.path().join("a-scan.sh"), "").expect("write");

        let resolver = ResourceResolver::new([temp.path().to_path_buf()]);
        let resolved = resolver.resolve("*-scan.sh").expect("resolve");
        assert_eq!(resolved, temp.path().join("a-scan.sh"));
    }

    #[test]
    fn missing_resource_reports_all_candidates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let resolver = ResourceResolver::new([temp.path().to_path_buf()]);

        let err = resolver.resolve("does-not-exist.sh").unwrap_err();
        match err {
            ConfigError::ResourceNotFound { resource, tried } => {
                assert_eq!(resource, "does-not-exist.sh");
                assert_eq!(
                    tried,
                    vec![
                        PathBuf::from("does-not-exist.sh"),
                        temp.path().join("does-not-exist.sh"),
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
