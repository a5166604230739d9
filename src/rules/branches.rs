//! Protected-branch glob lists (`unless.branches`).

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

/// A compiled list of branch globs.
///
/// `*` does not cross `/`, so `release/*` matches `release/2.0` but not
/// `release/2.0/hotfix`.
#[derive(Debug, Clone)]
pub struct BranchFilter {
    patterns: Vec<String>,
    set: GlobSet,
}

impl BranchFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            builder.add(branch_glob(pattern)?);
        }
        Ok(BranchFilter {
            set: builder.build()?,
            patterns,
        })
    }

    /// A filter that matches nothing.
    pub fn empty() -> Self {
        BranchFilter {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn matches(&self, branch: &str) -> bool {
        self.set.is_match(branch)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// A filter matching whatever either filter matches.
    pub fn union(&self, other: &BranchFilter) -> Result<Self, globset::Error> {
        if other.is_empty() {
            return Ok(self.clone());
        }
        BranchFilter::new(self.patterns.iter().chain(&other.patterns).cloned())
    }
}

impl Default for BranchFilter {
    fn default() -> Self {
        BranchFilter::empty()
    }
}

impl PartialEq for BranchFilter {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

impl Eq for BranchFilter {}

fn branch_glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_glob_matches_release_branches() {
        let filter = BranchFilter::new(["release/*"]).unwrap();
        assert!(filter.matches("release/2.0"));
        assert!(!filter.matches("release/2.0/hotfix"));
        assert!(!filter.matches("main"));
    }

    #[test]
    fn exact_names_match() {
        let filter = BranchFilter::new(["main", "develop"]).unwrap();
        assert!(filter.matches("main"));
        assert!(filter.matches("develop"));
        assert!(!filter.matches("main2"));
    }

    #[test]
    fn empty_matches_nothing() {
        assert!(!BranchFilter::empty().matches("main"));
        assert!(BranchFilter::empty().is_empty());
    }

    #[test]
    fn union_matches_either_side() {
        let release = BranchFilter::new(["release/*"]).unwrap();
        let main = BranchFilter::new(["main"]).unwrap();
        let both = release.union(&main).unwrap();
        assert!(both.matches("release/1.0"));
        assert!(both.matches("main"));
        assert!(!both.matches("feature"));
        assert_eq!(BranchFilter::empty().union(&main).unwrap(), main);
    }

    #[test]
    fn bad_glob_is_an_error() {
        assert!(BranchFilter::new(["release/["]).is_err());
    }

    #[test]
    fn equality_compares_patterns() {
        assert_eq!(
            BranchFilter::new(["a/*"]).unwrap(),
            BranchFilter::new(["a/*"]).unwrap()
        );
        assert_ne!(BranchFilter::new(["a/*"]).unwrap(), BranchFilter::empty());
    }
}
