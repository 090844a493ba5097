//! Overpass-style tag filter compiler.
//!
//! Filter strings are sequences of bracketed clauses, e.g.
//! `way[highway=path][~"sac_scale|mtb:scale"~"."]`. Clauses within one
//! string AND together; multiple strings OR together. Filters compile
//! to an expression tree evaluated by a pure interpreter; filter text
//! is never executed as code.

use crate::source::TagMap;
use log::debug;
use regex::Regex;

/// One compiled clause.
///
/// Classification tries the grammars in declaration order; they are
/// mutually exclusive by construction. Unrecognized clause text
/// compiles to [`TagTest::Never`], which never matches and never
/// raises.
#[derive(Debug)]
enum TagTest {
    /// `[key]`
    Exists(String),
    /// `[!key]`
    NotExists(String),
    /// `[key=value]`
    Equals(String, String),
    /// `[key!=value]`
    NotEquals(String, String),
    /// `[key~value]`, optionally `,i`
    Matches(String, Regex),
    /// `[key!~value]`, optionally `,i`
    NotMatches(String, Regex),
    /// `[~keyRegex~valueRegex]`, optionally `,i`
    KeyValueMatches(Regex, Regex),
    /// Fail-closed sink for malformed clauses.
    Never,
}

impl TagTest {
    fn eval(&self, tags: &TagMap) -> bool {
        match self {
            Self::Exists(key) => tags.contains_key(key),
            Self::NotExists(key) => !tags.contains_key(key),
            Self::Equals(key, value) => tags.get(key).is_some_and(|v| v == value),
            Self::NotEquals(key, value) => tags.get(key).is_some_and(|v| v != value),
            Self::Matches(key, value) => tags.get(key).is_some_and(|v| value.is_match(v)),
            Self::NotMatches(key, value) => tags.get(key).is_some_and(|v| !value.is_match(v)),
            Self::KeyValueMatches(key, value) => tags
                .iter()
                .any(|(k, v)| key.is_match(k) && value.is_match(v)),
            Self::Never => false,
        }
    }
}

/// A compiled tag filter: an OR over per-filter-string AND clause
/// lists.
#[derive(Debug, Default)]
pub struct TagQuery {
    any_of: Vec<Vec<TagTest>>,
}

impl TagQuery {
    /// Compiles one or more filter strings.
    ///
    /// Compilation never fails: malformed clauses become always-false
    /// tests. An empty filter list matches everything.
    pub fn compile<S: AsRef<str>>(filters: &[S]) -> Self {
        let parser = ClauseParser::new();
        let any_of = filters
            .iter()
            .map(|filter| parser.parse_filter(filter.as_ref()))
            .collect();
        Self { any_of }
    }

    /// Evaluates the compiled filter against a way's tags.
    pub fn matches(&self, tags: &TagMap) -> bool {
        self.any_of.is_empty()
            || self
                .any_of
                .iter()
                .any(|all_of| all_of.iter().all(|test| test.eval(tags)))
    }
}

struct ClauseParser {
    clause: Regex,
    exists: Regex,
    not_exists: Regex,
    equals: Regex,
    not_equals: Regex,
    matches: Regex,
    not_matches: Regex,
    key_value: Regex,
}

impl ClauseParser {
    fn new() -> Self {
        let re = |pattern| Regex::new(pattern).expect("static clause grammar");
        Self {
            clause: re(r"\[([^\]]*)\]"),
            exists: re(r"^([^!=~]+)$"),
            not_exists: re(r"^!([^!=~]+)$"),
            equals: re(r"^([^!=~]+)=([^!=~]+)$"),
            not_equals: re(r"^([^!=~]+)!=([^!=~]+)$"),
            matches: re(r"^([^!=~]+)~([^!=~]+?)(,i)?$"),
            not_matches: re(r"^([^!=~]+)!~([^!=~]+?)(,i)?$"),
            key_value: re(r"^~([^!=~]+)~([^!=~]+?)(,i)?$"),
        }
    }

    /// Splits one filter string into its bracketed clauses. Text
    /// outside brackets (the Overpass element-type prefix, usually
    /// `way`) carries no tag constraint and is ignored.
    fn parse_filter(&self, filter: &str) -> Vec<TagTest> {
        self.clause
            .captures_iter(filter)
            .map(|cap| self.parse_clause(&cap[1]))
            .collect()
    }

    fn parse_clause(&self, clause: &str) -> TagTest {
        if let Some(cap) = self.exists.captures(clause) {
            TagTest::Exists(unquote(&cap[1]))
        } else if let Some(cap) = self.not_exists.captures(clause) {
            TagTest::NotExists(unquote(&cap[1]))
        } else if let Some(cap) = self.equals.captures(clause) {
            TagTest::Equals(unquote(&cap[1]), unquote(&cap[2]))
        } else if let Some(cap) = self.not_equals.captures(clause) {
            TagTest::NotEquals(unquote(&cap[1]), unquote(&cap[2]))
        } else if let Some(cap) = self.matches.captures(clause) {
            match value_regex(&cap[2], cap.get(3).is_some()) {
                Some(value) => TagTest::Matches(unquote(&cap[1]), value),
                None => TagTest::Never,
            }
        } else if let Some(cap) = self.not_matches.captures(clause) {
            match value_regex(&cap[2], cap.get(3).is_some()) {
                Some(value) => TagTest::NotMatches(unquote(&cap[1]), value),
                None => TagTest::Never,
            }
        } else if let Some(cap) = self.key_value.captures(clause) {
            let case_insensitive = cap.get(3).is_some();
            match (
                value_regex(&cap[1], case_insensitive),
                value_regex(&cap[2], case_insensitive),
            ) {
                (Some(key), Some(value)) => TagTest::KeyValueMatches(key, value),
                _ => TagTest::Never,
            }
        } else {
            debug!("unrecognized filter clause [{clause}]; it will never match");
            TagTest::Never
        }
    }
}

/// Strips one pair of surrounding double quotes, if present.
fn unquote(token: &str) -> String {
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token)
        .to_owned()
}

/// Builds the user-supplied value regex; unanchored, like an Overpass
/// `~` match. An invalid pattern yields `None` (the clause then
/// compiles fail-closed).
fn value_regex(token: &str, case_insensitive: bool) -> Option<Regex> {
    let pattern = unquote(token);
    let pattern = if case_insensitive {
        format!("(?i){pattern}")
    } else {
        pattern
    };
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            debug!("invalid filter regex {token:?}: {err}");
            None
        }
    }
}
