//! # Target Set
//!
//! One collection of scope targets: a [`HostIndex`] for host-bearing
//! entries, a bucket for host-less ones, the preserved raw inputs, and a
//! lazily memoized content hash.
//!
//! Built once at scan setup; immutable afterwards, so it can be shared
//! across any number of concurrent scope-check callers without locking.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::OnceCell;
use regex::Regex;
use sha1::{Digest, Sha1};
use tracing::debug;

use perimeter_common::entry::{Entry, TargetInput};
use perimeter_common::error::Result;
use perimeter_common::host::Host;

use crate::index::{EntrySet, HostIndex};
use crate::target::patterns::{Special, SpecialPatternRegistry};

/// Construction flags for a [`TargetSet`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Restrict DNS matching to exact names (no superdomain expansion).
    pub strict: bool,
    /// ACL mode: an entry already covered by a broader registered entry
    /// joins the covering node instead of establishing its own, keeping
    /// the trie minimal. Used by the whitelist.
    pub acl_mode: bool,
    /// Tags stamped onto every entry built by this set.
    pub tags: BTreeSet<String>,
}

pub struct TargetSet {
    index: HostIndex,
    bucket: HashSet<Entry>,
    /// Normalized raw inputs, deduplicated and ordered. Lossless with
    /// respect to the operator's configuration; the hash is computed
    /// over exactly this set.
    inputs: BTreeSet<String>,
    /// Side list of user exclusion regexes (blacklist role only).
    regexes: Vec<Regex>,
    strict: bool,
    acl_mode: bool,
    tags: BTreeSet<String>,
    hash: OnceCell<[u8; 20]>,
}

impl TargetSet {
    /// Classifies and indexes `targets`.
    ///
    /// Entries are inserted host-less first, then by descending
    /// address-space breadth, so that the most general of several inputs
    /// normalizing to the same node establishes it first and trie shape
    /// is independent of input order. Any malformed input aborts
    /// construction with a validation error.
    pub fn build(
        targets: impl IntoIterator<Item = TargetInput>,
        registry: &SpecialPatternRegistry,
        opts: SetOptions,
    ) -> Result<TargetSet> {
        let mut inputs: BTreeSet<String> = BTreeSet::new();
        let mut regexes: Vec<Regex> = Vec::new();
        let mut entries: Vec<Entry> = Vec::new();

        for target in targets {
            match target {
                TargetInput::Raw(raw) => {
                    let raw = raw.trim();
                    match registry.classify(raw, &opts.tags)? {
                        Some(Special::Entry(entry)) => {
                            inputs.insert(raw.to_string());
                            entries.push(entry);
                        }
                        Some(Special::Rule(regex)) => {
                            inputs.insert(raw.to_string());
                            regexes.push(regex);
                        }
                        None => {
                            let entry = Entry::from_raw(raw, &opts.tags)?;
                            inputs.insert(entry.data().to_string());
                            entries.push(entry);
                        }
                    }
                }
                other => {
                    let entry = Entry::from_input(other, &opts.tags)?;
                    inputs.insert(entry.data().to_string());
                    entries.push(entry);
                }
            }
        }

        entries.sort_by(|a, b| {
            let ka = a.host().map(Host::size_key);
            let kb = b.host().map(Host::size_key);
            ka.cmp(&kb)
        });

        let mut index = HostIndex::new();
        let mut bucket = HashSet::new();
        for entry in entries {
            match entry.host().cloned() {
                Some(host) => {
                    if opts.acl_mode {
                        // coverage must be judged with the same strictness
                        // queries use, or a strict whitelist would drop
                        // explicitly listed subdomains
                        let strict = opts.strict && host.is_dns();
                        if index.insert_covered(&host, entry, strict) {
                            debug!(host = %host, "attached to covering acl entry");
                        }
                    } else {
                        index.insert(&host, entry);
                    }
                }
                None => {
                    bucket.insert(entry);
                }
            }
        }

        debug!(
            inputs = inputs.len(),
            rules = regexes.len(),
            acl_mode = opts.acl_mode,
            "target set built"
        );

        Ok(TargetSet {
            index,
            bucket,
            inputs,
            regexes,
            strict: opts.strict,
            acl_mode: opts.acl_mode,
            tags: opts.tags,
            hash: OnceCell::new(),
        })
    }

    /// Convenience: builds from raw strings.
    pub fn from_raw<I, S>(targets: I, registry: &SpecialPatternRegistry, opts: SetOptions) -> Result<TargetSet>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TargetSet::build(
            targets.into_iter().map(|s| TargetInput::Raw(s.into())),
            registry,
            opts,
        )
    }

    /// Classifies `input` and returns one arbitrary member of the
    /// matching entry set, or `None` on a miss.
    pub fn get(&self, input: TargetInput) -> Result<Option<&Entry>> {
        let candidate = Entry::from_input(input, &self.tags)?;
        match candidate.host() {
            Some(host) => Ok(self.matching_entries(host).and_then(|set| set.iter().next())),
            None => Ok(self.bucket.get(&candidate)),
        }
    }

    /// Like [`get`](Self::get) but returns the whole matching set.
    /// Host-less candidates have no set to return.
    pub fn get_all(&self, input: TargetInput) -> Result<Option<&EntrySet>> {
        let candidate = Entry::from_input(input, &self.tags)?;
        match candidate.host() {
            Some(host) => Ok(self.matching_entries(host)),
            None => Ok(None),
        }
    }

    /// Membership check over a raw identifier. Unclassifiable input is
    /// simply not a member; it never errors here.
    pub fn contains(&self, raw: &str) -> bool {
        match Entry::from_raw(raw, &self.tags) {
            Ok(entry) => self.contains_entry(&entry),
            Err(_) => false,
        }
    }

    /// Non-strict membership (ancestor matching), including the side
    /// regexes when this set carries any.
    pub fn contains_entry(&self, entry: &Entry) -> bool {
        let indexed = match entry.host() {
            Some(host) => self.matching_entries(host).is_some(),
            None => self.bucket.contains(entry),
        };
        if indexed {
            return true;
        }
        self.regexes.iter().any(|re| re.is_match(entry.filterable()))
    }

    /// Exact membership: the entry's host is itself registered (no
    /// ancestor expansion, no regexes).
    pub fn contains_exact(&self, entry: &Entry) -> bool {
        match entry.host() {
            Some(host) => self.index.lookup(host, true).is_some(),
            None => self.bucket.contains(entry),
        }
    }

    fn matching_entries(&self, host: &Host) -> Option<&EntrySet> {
        // strict scope constrains DNS names only; a whitelisted CIDR
        // always covers its sub-addresses
        let strict = self.strict && host.is_dns();
        self.index.lookup(host, strict)
    }

    /// Every entry in this set: indexed and host-less alike.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.index.iter().chain(self.bucket.iter())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Distinct host strings of the host-bearing entries, ordered.
    pub fn hosts(&self) -> BTreeSet<String> {
        self.iter()
            .filter_map(|e| e.host().map(Host::to_string))
            .collect()
    }

    /// The preserved raw inputs, ordered and deduplicated.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(String::as_str)
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn acl_mode(&self) -> bool {
        self.acl_mode
    }

    /// Content digest over the sorted, deduplicated normalized inputs
    /// plus the construction flags. Identical logical inputs hash
    /// identically regardless of duplication or order.
    ///
    /// Memoized; the computation is a pure function of immutable state,
    /// so a racing double-compute is harmless.
    pub fn hash(&self) -> [u8; 20] {
        *self.hash.get_or_init(|| {
            let mut hasher = Sha1::new();
            for input in &self.inputs {
                hasher.update(input.as_bytes());
                hasher.update(b"\n");
            }
            hasher.update([u8::from(self.strict), u8::from(self.acl_mode)]);
            hasher.finalize().into()
        })
    }
}

impl<'a> IntoIterator for &'a TargetSet {
    type Item = &'a Entry;
    type IntoIter = Box<dyn Iterator<Item = &'a Entry> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
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
