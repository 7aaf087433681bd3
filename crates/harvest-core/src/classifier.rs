//! Pure link classification against per-entry regex rules.
//!
//! No network or store access: given the same links and rules the output
//! is deterministic, which keeps classification testable independent of
//! fetch timing.

use regex::Regex;

use crate::error::AppError;
use crate::frontier::FrontierEntry;

/// An entry's regexes, compiled once and reused for every link on the
/// page. Patterns are anchored at the start of the URL; the end is
/// open unless the pattern closes it with `$`.
#[derive(Debug)]
pub struct CompiledRules {
    target_patterns: Vec<Regex>,
    seed_pattern: Option<Regex>,
}

impl CompiledRules {
    /// Compile an entry's patterns. A malformed regex is a
    /// [`AppError::PatternError`]; the entry fails, siblings are
    /// unaffected.
    pub fn compile(entry: &FrontierEntry) -> Result<Self, AppError> {
        let target_patterns = entry
            .target_patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>, _>>()?;

        let seed_pattern = entry
            .seed_pattern
            .as_deref()
            .map(compile_pattern)
            .transpose()?;

        Ok(Self {
            target_patterns,
            seed_pattern,
        })
    }

    /// Whether any target pattern matches `url`.
    pub fn is_target(&self, url: &str) -> bool {
        self.target_patterns.iter().any(|re| re.is_match(url))
    }

    pub fn is_seed(&self, url: &str) -> bool {
        self.seed_pattern
            .as_ref()
            .is_some_and(|re| re.is_match(url))
    }
}

/// Patterns match from the start of the URL. The wrap keeps a plan
/// pattern like `https://x/list/.*` from firing on a URL that merely
/// embeds it in a query string.
fn compile_pattern(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|e| AppError::PatternError {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Links split by classification. Non-matching links are discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub targets: Vec<String>,
    pub seeds: Vec<String>,
}

/// Classify links against the compiled rules.
///
/// A link matching both a target pattern and the seed pattern is a
/// target: a document link is never also a page to recurse into.
/// Self-referential links (equal to `self_url`) are dropped.
pub fn classify<I, S>(links: I, rules: &CompiledRules, self_url: &str) -> Classified
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out = Classified::default();
    for link in links {
        let link = link.into();
        if link == self_url {
            continue;
        }
        if rules.is_target(&link) {
            out.targets.push(link);
        } else if rules.is_seed(&link) {
            out.seeds.push(link);
        }
    }
    out
}
