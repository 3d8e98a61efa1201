//! Rule matching implementation
//!
//! Evaluates candidate strings against watch rules. The three matching modes
//! are mutually exclusive branches on the rule flags, checked strictly in
//! this order with no fallthrough:
//!
//! 1. `regex_mode` - case-insensitive regular expression. Compiled patterns
//!    are cached; an invalid pattern caches as a permanent miss instead of
//!    raising. The `regex` crate's engine is linear-time, so pathological
//!    backtracking cannot occur, and a compile-time size limit bounds the
//!    automaton.
//! 2. `exact_match` - whole-string equality, case per `case_sensitive`.
//! 3. otherwise - substring containment, or an anchored wildcard match when
//!    the pattern contains `*`.
//!
//! A disabled rule, empty pattern, or empty candidate never matches.

use crate::config::WatchRule;
use crate::engine::snapshot::{MatchMode, ProcessIdentity, strip_extension};
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::warn;

/// Upper bound for a compiled regex automaton, in bytes
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Cache entries kept before the cache is dropped wholesale
const REGEX_CACHE_CAP: usize = 256;

/// Candidate strings built for one process, in the order they are tried
pub type Candidates = SmallVec<[String; 4]>;

/// Rule matcher with a keyed regex compilation cache
///
/// `is_match` is a pure function of `(candidate, rule)`; the cache only
/// avoids recompiling patterns and is not observable in results.
#[derive(Default)]
pub struct RuleMatcher {
    regex_cache: Mutex<HashMap<String, Option<Regex>>>,
}

impl RuleMatcher {
    /// Create a matcher with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one candidate string against one rule
    pub fn is_match(&self, candidate: &str, rule: &WatchRule) -> bool {
        if !rule.enabled || rule.pattern.is_empty() || candidate.is_empty() {
            return false;
        }

        if rule.regex_mode {
            return self.regex_match(candidate, &rule.pattern);
        }

        if rule.exact_match {
            return if rule.case_sensitive {
                candidate == rule.pattern
            } else {
                candidate.eq_ignore_ascii_case(&rule.pattern)
            };
        }

        let (candidate, pattern) = if rule.case_sensitive {
            (candidate.to_string(), rule.pattern.clone())
        } else {
            (
                candidate.to_ascii_lowercase(),
                rule.pattern.to_ascii_lowercase(),
            )
        };

        if pattern.contains('*') {
            wildcard_match(&pattern, &candidate)
        } else {
            candidate.contains(&pattern)
        }
    }

    /// The matching branch that would fire for this rule
    pub fn mode_of(rule: &WatchRule) -> MatchMode {
        if rule.regex_mode {
            MatchMode::Regex
        } else if rule.exact_match {
            MatchMode::Exact
        } else if rule.pattern.contains('*') {
            MatchMode::Wildcard
        } else {
            MatchMode::Contains
        }
    }

    fn regex_match(&self, candidate: &str, pattern: &str) -> bool {
        let mut cache = self.regex_cache.lock();
        if cache.len() > REGEX_CACHE_CAP {
            cache.clear();
        }
        let compiled = cache.entry(pattern.to_string()).or_insert_with(|| {
            match RegexBuilder::new(pattern)
                .case_insensitive(true)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()
            {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Invalid rule pattern '{pattern}': {e}");
                    None
                }
            }
        });
        compiled.as_ref().is_some_and(|re| re.is_match(candidate))
    }
}

/// Anchored wildcard match where `*` matches any sequence and everything
/// else is literal
///
/// Middle segments are matched greedily left-to-right; the first and last
/// segments are anchored to the start and end of the text.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        // No '*' in the pattern; anchored match degenerates to equality
        return pattern == text;
    }

    let first = segments[0];
    let last = segments[segments.len() - 1];

    if !text.starts_with(first) {
        return false;
    }
    let mut pos = first.len();

    for segment in &segments[1..segments.len() - 1] {
        if segment.is_empty() {
            continue;
        }
        match text[pos..].find(segment) {
            Some(offset) => pos += offset + segment.len(),
            None => return false,
        }
    }

    if last.is_empty() {
        return true;
    }
    text.len() >= pos + last.len() && text[pos..].ends_with(last)
}

/// Candidate strings for one process, in matching order: bare process name,
/// process name with extension, full executable path, executable file name
///
/// Duplicates (e.g. the path's file name equalling the process name) are
/// collapsed so each string is tried once.
pub fn candidate_strings(process: &ProcessIdentity) -> Candidates {
    let mut candidates = Candidates::new();
    push_unique(&mut candidates, strip_extension(&process.name).to_string());
    push_unique(&mut candidates, process.name.clone());
    if let Some(path) = &process.exe_path {
        push_unique(&mut candidates, path.to_string_lossy().into_owned());
        if let Some(file_name) = path.file_name() {
            push_unique(&mut candidates, file_name.to_string_lossy().into_owned());
        }
    }
    candidates
}

/// Candidate strings when only an event-supplied process name is known
pub fn candidate_strings_for_name(name: &str) -> SmallVec<[String; 2]> {
    let mut candidates = SmallVec::new();
    let bare = strip_extension(name).to_string();
    if bare != name {
        candidates.push(bare);
    }
    candidates.push(name.to_string());
    candidates
}

fn push_unique(candidates: &mut Candidates, value: String) {
    if !value.is_empty() && !candidates.iter().any(|c| *c == value) {
        candidates.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn rule(pattern: &str) -> WatchRule {
        WatchRule::new(pattern)
    }

    fn exact(pattern: &str, case_sensitive: bool) -> WatchRule {
        WatchRule {
            exact_match: true,
            case_sensitive,
            ..WatchRule::new(pattern)
        }
    }

    fn regex(pattern: &str) -> WatchRule {
        WatchRule {
            regex_mode: true,
            ..WatchRule::new(pattern)
        }
    }

    #[test]
    fn test_contains_match_is_case_insensitive_by_default() {
        let matcher = RuleMatcher::new();
        assert!(matcher.is_match("EldenRing.exe", &rule("eldenring")));
        assert!(matcher.is_match("eldenring", &rule("ELDEN")));
        assert!(!matcher.is_match("darksouls", &rule("eldenring")));
    }

    #[test]
    fn test_contains_match_case_sensitive() {
        let matcher = RuleMatcher::new();
        let mut r = rule("Elden");
        r.case_sensitive = true;
        assert!(matcher.is_match("EldenRing.exe", &r));
        assert!(!matcher.is_match("eldenring.exe", &r));
    }

    #[test]
    fn test_exact_match() {
        let matcher = RuleMatcher::new();
        assert!(matcher.is_match("eldenring", &exact("EldenRing", false)));
        assert!(!matcher.is_match("eldenring", &exact("EldenRing", true)));
        assert!(!matcher.is_match("eldenring2", &exact("eldenring", false)));
    }

    #[test]
    fn test_regex_match_case_insensitive() {
        let matcher = RuleMatcher::new();
        assert!(matcher.is_match("EldenRing.exe", &regex(r"^elden.*\.exe$")));
        assert!(!matcher.is_match("sekiro.exe", &regex(r"^elden.*\.exe$")));
    }

    #[test]
    fn test_invalid_regex_matches_nothing() {
        let matcher = RuleMatcher::new();
        let r = regex(r"[unclosed");
        assert!(!matcher.is_match("anything", &r));
        // Second evaluation hits the cached miss
        assert!(!matcher.is_match("anything", &r));
    }

    #[test]
    fn test_regex_priority_over_exact_flag() {
        // regex_mode wins even when exact_match is also set
        let matcher = RuleMatcher::new();
        let r = WatchRule {
            regex_mode: true,
            exact_match: true,
            ..WatchRule::new("elden.*")
        };
        assert!(matcher.is_match("eldenring", &r));
    }

    #[test]
    fn test_disabled_and_empty_never_match() {
        let matcher = RuleMatcher::new();
        let mut r = rule("elden");
        r.enabled = false;
        assert!(!matcher.is_match("eldenring", &r));
        assert!(!matcher.is_match("eldenring", &rule("")));
        assert!(!matcher.is_match("", &rule("elden")));
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("elden*", "eldenring"));
        assert!(wildcard_match("*ring", "eldenring"));
        assert!(wildcard_match("e*ring", "eldenring"));
        assert!(wildcard_match("e*d*g", "eldenring"));
        assert!(wildcard_match("*", "anything"));
        assert!(!wildcard_match("elden*", "ring"));
        assert!(!wildcard_match("e*ringx", "eldenring"));
        // Anchored: a wildcard pattern is not a containment check
        assert!(!wildcard_match("den*rin", "eldenring"));
    }

    #[test]
    fn test_wildcard_suffix_cannot_overlap_prefix() {
        // "ab" can't serve as both the prefix and the suffix
        assert!(!wildcard_match("ab*ab", "ab"));
        assert!(wildcard_match("ab*ab", "abab"));
    }

    #[test]
    fn test_wildcard_rule_goes_through_is_match() {
        let matcher = RuleMatcher::new();
        assert!(matcher.is_match("EldenRing.exe", &rule("elden*.exe")));
        assert!(!matcher.is_match("EldenRing.dll", &rule("elden*.exe")));
        assert_eq!(RuleMatcher::mode_of(&rule("elden*.exe")), MatchMode::Wildcard);
        assert_eq!(RuleMatcher::mode_of(&rule("elden")), MatchMode::Contains);
    }

    #[test]
    fn test_candidate_strings_order_and_dedup() {
        let process = ProcessIdentity {
            pid: 42,
            name: "EldenRing.exe".to_string(),
            exe_path: Some(PathBuf::from("C:\\Games\\ELDEN RING\\Game\\EldenRing.exe")),
        };
        let candidates = candidate_strings(&process);
        assert_eq!(
            candidates.as_slice(),
            [
                "EldenRing".to_string(),
                "EldenRing.exe".to_string(),
                "C:\\Games\\ELDEN RING\\Game\\EldenRing.exe".to_string(),
            ]
        );
    }

    #[test]
    fn test_candidate_strings_without_path() {
        let process = ProcessIdentity {
            pid: 42,
            name: "game.exe".to_string(),
            exe_path: None,
        };
        let candidates = candidate_strings(&process);
        assert_eq!(
            candidates.as_slice(),
            ["game".to_string(), "game.exe".to_string()]
        );
    }

    #[test]
    fn test_candidate_strings_for_name() {
        let candidates = candidate_strings_for_name("game.exe");
        assert_eq!(
            candidates.as_slice(),
            ["game".to_string(), "game.exe".to_string()]
        );

        let bare_only = candidate_strings_for_name("game");
        assert_eq!(bare_only.as_slice(), ["game".to_string()]);
    }

    // Property-based tests using proptest
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: matching is deterministic regardless of evaluation order
            #[test]
            fn match_is_deterministic(
                candidate in "[a-zA-Z0-9_. ]{0,40}",
                pattern in "[a-zA-Z0-9_.*]{0,20}",
            ) {
                let matcher = RuleMatcher::new();
                let r = WatchRule::new(pattern);
                let first = matcher.is_match(&candidate, &r);
                let second = matcher.is_match(&candidate, &r);
                prop_assert_eq!(first, second);
            }

            /// Property: a fresh matcher agrees with a warm one (cache population
            /// is not observable)
            #[test]
            fn cache_population_is_not_observable(
                candidate in "[a-zA-Z0-9]{1,20}",
                pattern in "[a-z.*()\\[\\]]{1,10}",
            ) {
                let warm = RuleMatcher::new();
                let r = WatchRule { regex_mode: true, ..WatchRule::new(pattern) };
                // Populate the cache with an unrelated candidate first
                let _ = warm.is_match("prime", &r);
                let fresh = RuleMatcher::new();
                prop_assert_eq!(warm.is_match(&candidate, &r), fresh.is_match(&candidate, &r));
            }

            /// Property: a pattern without '*' wildcard-matches only itself
            #[test]
            fn wildcard_without_star_is_equality(text in "[a-z]{0,15}", other in "[a-z]{0,15}") {
                prop_assert_eq!(wildcard_match(&text, &text), true);
                prop_assert_eq!(wildcard_match(&text, &other), text == other);
            }

            /// Property: "prefix*" matches exactly the strings starting with prefix
            #[test]
            fn wildcard_prefix(prefix in "[a-z]{1,8}", tail in "[a-z]{0,8}") {
                let pattern = format!("{prefix}*");
                let text = format!("{prefix}{tail}");
                prop_assert!(wildcard_match(&pattern, &text));
            }
        }
    }
}
