use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, TagError};

/// Predicate over tag names.
///
/// Implemented for plain closures, so `|name: &str| name.ends_with("art")`
/// works wherever a filter is expected.
pub trait NameFilter {
    fn matches(&self, name: &str) -> bool;
}

impl<F> NameFilter for F
where
    F: Fn(&str) -> bool,
{
    fn matches(&self, name: &str) -> bool {
        self(name)
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    #[default]
    Exact,
    Prefix,
    Suffix,
    Contains,
    Glob,
    Regex,
}

/// Compiled tag-name pattern. Matching is case-sensitive.
#[derive(Clone, Debug)]
pub struct TagPattern {
    kind: MatchKind,
    needle: String,
    glob: Option<GlobMatcher>,
    regex: Option<Regex>,
}

impl TagPattern {
    pub fn new(kind: MatchKind, needle: &str) -> Result<Self> {
        let glob = if kind == MatchKind::Glob {
            Some(
                GlobBuilder::new(needle)
                    .build()
                    .map_err(|err| TagError::InvalidPattern(format!("glob '{needle}': {err}")))?
                    .compile_matcher(),
            )
        } else {
            None
        };
        let regex = if kind == MatchKind::Regex {
            Some(
                Regex::new(needle)
                    .map_err(|err| TagError::InvalidPattern(format!("regex '{needle}': {err}")))?,
            )
        } else {
            None
        };
        Ok(Self {
            kind,
            needle: needle.to_string(),
            glob,
            regex,
        })
    }

    pub fn exact(needle: &str) -> Self {
        Self::literal(MatchKind::Exact, needle)
    }

    pub fn prefix(needle: &str) -> Self {
        Self::literal(MatchKind::Prefix, needle)
    }

    pub fn suffix(needle: &str) -> Self {
        Self::literal(MatchKind::Suffix, needle)
    }

    pub fn contains(needle: &str) -> Self {
        Self::literal(MatchKind::Contains, needle)
    }

    pub fn glob(pattern: &str) -> Result<Self> {
        Self::new(MatchKind::Glob, pattern)
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Self::new(MatchKind::Regex, pattern)
    }

    fn literal(kind: MatchKind, needle: &str) -> Self {
        Self {
            kind,
            needle: needle.to_string(),
            glob: None,
            regex: None,
        }
    }

    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }
}

impl NameFilter for TagPattern {
    fn matches(&self, name: &str) -> bool {
        match self.kind {
            MatchKind::Exact => name == self.needle,
            MatchKind::Prefix => name.starts_with(&self.needle),
            MatchKind::Suffix => name.ends_with(&self.needle),
            MatchKind::Contains => name.contains(&self.needle),
            MatchKind::Glob => self.glob.as_ref().is_some_and(|g| g.is_match(name)),
            MatchKind::Regex => self.regex.as_ref().is_some_and(|r| r.is_match(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 3] = ["arts", "animals", "art"];

    fn kept(filter: &impl NameFilter) -> Vec<&'static str> {
        NAMES.into_iter().filter(|name| filter.matches(name)).collect()
    }

    #[test]
    fn suffix_is_not_substring() {
        assert_eq!(kept(&TagPattern::suffix("art")), vec!["art"]);
        assert_eq!(kept(&TagPattern::contains("art")), vec!["arts", "art"]);
        assert_eq!(kept(&TagPattern::prefix("an")), vec!["animals"]);
        assert_eq!(kept(&TagPattern::exact("arts")), vec!["arts"]);
    }

    #[test]
    fn glob_and_regex_patterns() {
        assert_eq!(kept(&TagPattern::glob("a*s").unwrap()), vec!["arts", "animals"]);
        assert_eq!(kept(&TagPattern::regex("^art$").unwrap()), vec!["art"]);
    }

    #[test]
    fn closures_are_filters() {
        assert_eq!(kept(&|name: &str| name.len() == 3), vec!["art"]);
    }

    #[test]
    fn bad_patterns_fail_construction() {
        assert!(matches!(TagPattern::regex("(art"), Err(TagError::InvalidPattern(_))));
        assert!(matches!(TagPattern::glob("a[rt"), Err(TagError::InvalidPattern(_))));
    }

    #[test]
    fn match_kind_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Rule {
            kind: MatchKind,
        }
        let rule: Rule = toml::from_str("kind = \"suffix\"").unwrap();
        assert_eq!(rule.kind, MatchKind::Suffix);
    }
}
