//! Effect selection: comma-separated ids and `*` wildcards.

use std::collections::BTreeSet;

use regex::Regex;

pub const DEFAULT_PATTERN: &str = "classicBasics/noise";

/// Split a `--effects` value on commas, dropping empties.
pub fn split_patterns(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn wildcard(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$")).ok()
}

/// Ids in `all` matching `pattern`: an exact id, or a `*` wildcard such as `ns/*`.
pub fn match_effects<'a>(all: &'a [String], pattern: &str) -> Vec<&'a str> {
    if !pattern.contains('*') {
        return all
            .iter()
            .filter(|id| id.as_str() == pattern)
            .map(String::as_str)
            .collect();
    }
    let Some(re) = wildcard(pattern) else {
        return Vec::new();
    };
    all.iter()
        .filter(|id| re.is_match(id))
        .map(String::as_str)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Deduplicated and sorted.
    pub matched: Vec<String>,
    /// Patterns that matched nothing, in the order given.
    pub unmatched: Vec<String>,
}

pub fn select(all: &[String], patterns: &[String]) -> Selection {
    let mut matched = BTreeSet::new();
    let mut unmatched = Vec::new();
    for p in patterns {
        let hits = match_effects(all, p);
        if hits.is_empty() {
            unmatched.push(p.clone());
        }
        matched.extend(hits.into_iter().map(str::to_string));
    }
    Selection {
        matched: matched.into_iter().collect(),
        unmatched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<String> {
        ["classicBasics/noise", "classicBasics/solid", "filter/blur", "filter/noiseWarp"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn wildcards_match_either_side() {
        let all = ids();
        assert_eq!(match_effects(&all, "filter/*"), vec!["filter/blur", "filter/noiseWarp"]);
        assert_eq!(match_effects(&all, "*/noise"), vec!["classicBasics/noise"]);
        assert_eq!(match_effects(&all, "*").len(), 4);
        // Regex metacharacters in ids are literal.
        assert!(match_effects(&all, "filter/b.ur").is_empty());
    }

    #[test]
    fn selection_dedups_sorts_and_reports_misses() {
        let all = ids();
        let sel = select(
            &all,
            &split_patterns("filter/blur, filter/*,,nope/*"),
        );
        assert_eq!(sel.matched, vec!["filter/blur", "filter/noiseWarp"]);
        assert_eq!(sel.unmatched, vec!["nope/*"]);
    }
}
