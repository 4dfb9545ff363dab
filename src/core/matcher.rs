//! Recognizes the members of a rotation family.

use regex::Regex;

use crate::config::CompressFormat;
use crate::core::Result;

/// Decides whether a file name belongs to the rotation family of a base name.
pub trait Matcher: Send + Sync {
    fn matches(&self, name: &str) -> bool;
}

/// Matches `<base>` and `<base>.<digits>`, plus `<base>.<digits><ext>` when a
/// supported compression format is configured.
///
/// The pattern is anchored on both ends and compiled once; the base name of a
/// `Roll` never changes.
#[derive(Debug, Clone)]
pub struct FamilyMatcher {
    pattern: Regex,
}

impl FamilyMatcher {
    pub fn new(base: &str, format: &CompressFormat) -> Result<Self> {
        let ext = match (format.is_supported(), format.extension()) {
            (true, Some(ext)) => format!("(?:{})?", regex::escape(ext)),
            _ => String::new(),
        };
        let pattern = Regex::new(&format!(r"^{}(?:\.\d+{ext})?$", regex::escape(base)))?;
        Ok(Self { pattern })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Matcher for FamilyMatcher {
    fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_family() {
        let matcher = FamilyMatcher::new("app.log", &CompressFormat::None).unwrap();
        assert!(matcher.matches("app.log"));
        assert!(matcher.matches("app.log.3"));
        assert!(matcher.matches("app.log.120"));
        assert!(!matcher.matches("app.log.2.gz"));
        assert!(!matcher.matches("other.log"));
        assert!(!matcher.matches("app.log.x"));
        assert!(!matcher.matches("app.log."));
        assert!(!matcher.matches("_app.log"));
        assert!(!matcher.matches("xapp.log"));
    }

    #[test]
    fn dots_in_base_are_literal() {
        let matcher = FamilyMatcher::new("app.log", &CompressFormat::None).unwrap();
        assert!(!matcher.matches("appxlog"));
        assert!(!matcher.matches("app.log1"));
    }

    #[cfg(feature = "compress")]
    #[test]
    fn gzip_family() {
        let matcher = FamilyMatcher::new("app.log", &CompressFormat::Gzip).unwrap();
        assert!(matcher.matches("app.log"));
        assert!(matcher.matches("app.log.3"));
        assert!(matcher.matches("app.log.2.gz"));
        assert!(!matcher.matches("app.log.gz"));
        assert!(!matcher.matches("app.log.2.z"));
        assert!(!matcher.matches("app.log.x"));
    }

    #[cfg(feature = "compress")]
    #[test]
    fn zlib_family() {
        let matcher = FamilyMatcher::new("app.log", &CompressFormat::Zlib).unwrap();
        assert!(matcher.matches("app.log.4.z"));
        assert!(!matcher.matches("app.log.4.gz"));
    }

    #[test]
    fn unsupported_format_matches_plain_family() {
        let format = CompressFormat::Unsupported("lz4".to_string());
        let matcher = FamilyMatcher::new("app.log", &format).unwrap();
        assert!(matcher.matches("app.log.1"));
        assert!(!matcher.matches("app.log.1.lz4"));
    }
}
