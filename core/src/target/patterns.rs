//! # Special Target Patterns
//!
//! A fixed, ordered table of `(pattern, action)` rules that classifies
//! typed target tokens (`ORG:acme`, `USER:alice`, `REGEX:^evil-.*`)
//! before normal host classification runs. First match wins.
//!
//! The table is built explicitly per role; nothing is discovered by
//! introspection.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use perimeter_common::entry::{Entry, EntryKind};
use perimeter_common::error::{Result, ScopeError};

static ORG_STUB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:ORG|ORG_STUB):(.*)").expect("static pattern"));
static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:USER|USERNAME):(.*)").expect("static pattern"));
static BLACKLIST_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:RE|REGEX):(.*)").expect("static pattern"));

/// What a matched rule does with the captured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternAction {
    OrgStub,
    Username,
    BlacklistRegex,
}

struct PatternRule {
    pattern: &'static Regex,
    action: PatternAction,
}

/// Result of classifying a raw input against the registry.
#[derive(Debug)]
pub enum Special {
    /// A host-less typed entry (`ORG_STUB`, `USERNAME`).
    Entry(Entry),
    /// A compiled blacklist rule; produces no entry.
    Rule(Regex),
}

/// Ordered pattern dispatcher for one target-set role.
pub struct SpecialPatternRegistry {
    rules: Vec<PatternRule>,
}

impl SpecialPatternRegistry {
    /// Rules for the seed set: organization stubs and usernames.
    pub fn seeds() -> Self {
        SpecialPatternRegistry {
            rules: vec![
                PatternRule {
                    pattern: Lazy::force(&ORG_STUB),
                    action: PatternAction::OrgStub,
                },
                PatternRule {
                    pattern: Lazy::force(&USERNAME),
                    action: PatternAction::Username,
                },
            ],
        }
    }

    /// Rules for ACL-style sets (whitelist): none. Every input is a
    /// literal host/identifier.
    pub fn acl() -> Self {
        SpecialPatternRegistry { rules: Vec::new() }
    }

    /// Rules for the blacklist: user-supplied exclusion regexes.
    pub fn blacklist() -> Self {
        SpecialPatternRegistry {
            rules: vec![PatternRule {
                pattern: Lazy::force(&BLACKLIST_REGEX),
                action: PatternAction::BlacklistRegex,
            }],
        }
    }

    /// Tests `raw` against the rules in order.
    ///
    /// Returns `Ok(None)` when no rule matches, in which case the input
    /// is treated as a literal host. A user regex that fails to compile
    /// is fatal: a miscompiled exclusion rule must never be dropped
    /// silently.
    pub fn classify(&self, raw: &str, tags: &BTreeSet<String>) -> Result<Option<Special>> {
        for rule in &self.rules {
            let Some(caps) = rule.pattern.captures(raw) else {
                continue;
            };
            let value = caps.get(1).map_or("", |m| m.as_str());
            return match rule.action {
                PatternAction::OrgStub => {
                    Entry::hostless(EntryKind::OrgStub, value, tags).map(|e| Some(Special::Entry(e)))
                }
                PatternAction::Username => {
                    Entry::hostless(EntryKind::Username, value, tags)
                        .map(|e| Some(Special::Entry(e)))
                }
                PatternAction::BlacklistRegex => {
                    let compiled = RegexBuilder::new(value)
                        .case_insensitive(true)
                        .build()
                        .map_err(|source| ScopeError::InvalidRegex {
                            pattern: value.to_string(),
                            source,
                        })?;
                    Ok(Some(Special::Rule(compiled)))
                }
            };
        }
        Ok(None)
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
