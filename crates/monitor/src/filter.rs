//! Whitelist/blacklist filter engine.
//!
//! Rules are evaluated in two passes over the full message text with
//! starts-with anchoring: an event is admitted iff (no whitelist rules
//! exist OR at least one whitelist rule matches) AND no blacklist rule
//! matches. Rule order within a kind never affects the outcome.

use binlog::LogEvent;
use regex::Regex;
use thiserror::Error;
use tracing::trace;

/// A malformed filter pattern. Raised at startup so a bad rule fails the
/// run closed instead of admitting unfiltered events.
#[derive(Debug, Error)]
#[error("invalid filter pattern `{pattern}`: {source}")]
pub struct FilterError {
    pattern: String,
    #[source]
    source: regex::Error,
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    regex: Regex,
}

impl Rule {
    fn compile(pattern: &str) -> Result<Self, FilterError> {
        // Anchor at position 0: starts-with semantics, not full-string.
        let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|source| FilterError {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self {
            pattern: pattern.to_owned(),
            regex,
        })
    }

    fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Compiled whitelist and blacklist rule sets.
#[derive(Debug, Default)]
pub struct FilterSet {
    whitelist: Vec<Rule>,
    blacklist: Vec<Rule>,
}

impl FilterSet {
    pub fn compile(whitelist: &[String], blacklist: &[String]) -> Result<Self, FilterError> {
        Ok(Self {
            whitelist: whitelist
                .iter()
                .map(|p| Rule::compile(p))
                .collect::<Result<_, _>>()?,
            blacklist: blacklist
                .iter()
                .map(|p| Rule::compile(p))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.whitelist.is_empty() && self.blacklist.is_empty()
    }

    /// Classify one event as emit (`true`) or suppress (`false`).
    ///
    /// Every rule is evaluated and traced, which keeps unexpected
    /// suppression diagnosable from the logs.
    pub fn admit(&self, event: &LogEvent) -> bool {
        let mut whitelisted = self.whitelist.is_empty();
        for rule in &self.whitelist {
            let matched = rule.matches(&event.message);
            trace!(
                kind = "whitelist",
                pattern = %rule.pattern,
                matched,
                message = %event.message,
                "rule evaluated"
            );
            whitelisted |= matched;
        }

        let mut blacklisted = false;
        for rule in &self.blacklist {
            let matched = rule.matches(&event.message);
            trace!(
                kind = "blacklist",
                pattern = %rule.pattern,
                matched,
                message = %event.message,
                "rule evaluated"
            );
            blacklisted |= matched;
        }

        whitelisted && !blacklisted
    }
}
