//! # Entry Model
//!
//! Classified target identifiers and the factory that produces them.
//!
//! An [`Entry`] is immutable once created: external callers may hold
//! references to it from many threads without synchronization.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Result, ScopeError};
use crate::host::{self, Host, IdentifierShape};

/// What kind of identifier an [`Entry`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A DNS name.
    Host,
    /// A single IP address.
    Ip,
    /// A network block.
    Cidr,
    /// A host-less organization stub (`ORG:acme`).
    OrgStub,
    /// A host-less username (`USER:alice`).
    Username,
}

/// A classified, normalized target identifier.
///
/// Equality and hashing consider `(kind, host, data)` only; tags and the
/// filterable text are carried metadata.
#[derive(Debug, Clone)]
pub struct Entry {
    kind: EntryKind,
    host: Option<Host>,
    data: String,
    filterable: String,
    tags: BTreeSet<String>,
}

impl Entry {
    /// Classifies a raw identifier string into an entry.
    ///
    /// URLs and emails are reduced to their host for matching, but the
    /// full URL is retained as the filterable text so blacklist regexes
    /// can express path- or scheme-sensitive exclusions.
    pub fn from_raw(raw: &str, tags: &BTreeSet<String>) -> Result<Entry> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScopeError::validation(raw, "empty target"));
        }

        let (host_text, shape) = host::extract_host(trimmed);
        let host = Host::parse(host_text)?;

        let kind = match &host {
            Host::Dns(_) => EntryKind::Host,
            Host::Ip(_) if host.is_single_address() => EntryKind::Ip,
            Host::Ip(_) => EntryKind::Cidr,
        };

        let (data, filterable) = match shape {
            IdentifierShape::Url => (trimmed.to_string(), trimmed.to_string()),
            IdentifierShape::Email => {
                let email = trimmed.to_ascii_lowercase();
                (email, host.to_string())
            }
            IdentifierShape::Plain => (host.to_string(), host.to_string()),
        };

        Ok(Entry {
            kind,
            host: Some(host),
            data,
            filterable,
            tags: tags.clone(),
        })
    }

    /// Builds a host-less typed entry (`ORG_STUB`, `USERNAME`).
    pub fn hostless(kind: EntryKind, value: &str, tags: &BTreeSet<String>) -> Result<Entry> {
        debug_assert!(matches!(kind, EntryKind::OrgStub | EntryKind::Username));
        let value = value.trim();
        if value.is_empty() {
            return Err(ScopeError::validation(value, "empty typed target"));
        }
        Ok(Entry {
            kind,
            host: None,
            data: value.to_string(),
            filterable: value.to_string(),
            tags: tags.clone(),
        })
    }

    /// Single factory over the closed set of accepted input shapes.
    pub fn from_input(input: TargetInput, tags: &BTreeSet<String>) -> Result<Entry> {
        match input {
            TargetInput::Raw(raw) => Entry::from_raw(&raw, tags),
            TargetInput::Host(h) => {
                let kind = match &h {
                    Host::Dns(_) => EntryKind::Host,
                    Host::Ip(_) if h.is_single_address() => EntryKind::Ip,
                    Host::Ip(_) => EntryKind::Cidr,
                };
                let text = h.to_string();
                Ok(Entry {
                    kind,
                    host: Some(h),
                    data: text.clone(),
                    filterable: text,
                    tags: tags.clone(),
                })
            }
            TargetInput::Entry(e) => Ok(e),
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn host(&self) -> Option<&Host> {
        self.host.as_ref()
    }

    /// The normalized identifier text. Lossless with respect to what the
    /// operator supplied: URLs keep their full form.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// The representation blacklist regexes run against: the full URL for
    /// URL-shaped input, otherwise the host text.
    pub fn filterable(&self) -> &str {
        &self.filterable
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.host == other.host && self.data == other.data
    }
}

impl Eq for Entry {}

impl Hash for Entry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.host.hash(state);
        self.data.hash(state);
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data)
    }
}

/// The accepted input shapes for building an [`Entry`].
///
/// A closed sum type instead of an "anything goes" constructor: callers
/// either have a raw string, an already-normalized host, or a finished
/// entry from elsewhere.
#[derive(Debug, Clone)]
pub enum TargetInput {
    Raw(String),
    Host(Host),
    Entry(Entry),
}

impl From<&str> for TargetInput {
    fn from(s: &str) -> Self {
        TargetInput::Raw(s.to_string())
    }
}

impl From<String> for TargetInput {
    fn from(s: String) -> Self {
        TargetInput::Raw(s)
    }
}

impl From<Host> for TargetInput {
    fn from(h: Host) -> Self {
        TargetInput::Host(h)
    }
}

impl From<Entry> for TargetInput {
    fn from(e: Entry) -> Self {
        TargetInput::Entry(e)
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
