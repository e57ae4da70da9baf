//! Basename-only glob exclusion.
//!
//! The source system matches exclude patterns against a changed path's
//! basename only, never the full relative path. That's under-specified and
//! surprising for path-style defaults like `.git/**` (which can never match
//! a basename, since it contains a `/`) — `SPEC_FULL.md` §4.6/§9 direct us
//! to preserve that behavior exactly rather than silently "fixing" it.

use glob::Pattern;
use std::path::Path;

use crate::error::{ErrorKind, Result};

/// Compiled exclude pattern set for one watch.
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let compiled = patterns
            .iter()
            .map(|p| Pattern::new(p).map_err(|_| exn::Exn::from(ErrorKind::InvalidPattern(p.clone()))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns: compiled })
    }

    /// `true` if `path`'s basename matches any compiled pattern.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(basename) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.patterns.iter().any(|pattern| pattern.matches(basename))
    }
}
