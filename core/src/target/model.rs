//! # Scope Model
//!
//! The scan-facing composition of seeds, whitelist, and blacklist.
//!
//! Built once per scan from operator input, read-only afterwards. The
//! scanning engine calls [`ScopeModel::in_scope`] for every discovered
//! entity; an out-of-bounds false positive here means out-of-bounds
//! probing, so the blacklist always overrides the whitelist.

use std::collections::BTreeSet;

use once_cell::sync::OnceCell;
use serde::Serialize;
use sha1::{Digest, Sha1};
use tracing::debug;

use perimeter_common::entry::Entry;
use perimeter_common::error::Result;

use crate::target::patterns::SpecialPatternRegistry;
use crate::target::set::{SetOptions, TargetSet};

/// Tag stamped on every seed entry.
pub const SEED_TAG: &str = "target";

pub struct ScopeModel {
    seeds: TargetSet,
    whitelist: TargetSet,
    blacklist: TargetSet,
    strict_scope: bool,
    hash: OnceCell<[u8; 20]>,
    scope_hash: OnceCell<[u8; 20]>,
}

impl ScopeModel {
    /// Builds the three target sets from raw operator input.
    ///
    /// A `None` whitelist defaults to the hosts of the seed set; the
    /// blacklist defaults to empty. Construction is synchronous and
    /// fails fast on the first malformed input or invalid exclusion
    /// regex.
    pub fn new(
        seeds: Vec<String>,
        whitelist: Option<Vec<String>>,
        blacklist: Vec<String>,
        strict_scope: bool,
    ) -> Result<ScopeModel> {
        let seed_tags: BTreeSet<String> = [SEED_TAG.to_string()].into();
        let seeds = TargetSet::from_raw(
            seeds,
            &SpecialPatternRegistry::seeds(),
            SetOptions {
                strict: strict_scope,
                acl_mode: false,
                tags: seed_tags,
            },
        )?;

        let whitelist_inputs: Vec<String> = match whitelist {
            Some(inputs) => inputs,
            None => seeds.hosts().into_iter().collect(),
        };
        let whitelist = TargetSet::from_raw(
            whitelist_inputs,
            &SpecialPatternRegistry::acl(),
            SetOptions {
                strict: strict_scope,
                acl_mode: true,
                tags: BTreeSet::new(),
            },
        )?;

        let blacklist = TargetSet::from_raw(
            blacklist,
            &SpecialPatternRegistry::blacklist(),
            SetOptions::default(),
        )?;

        debug!(
            seeds = seeds.len(),
            whitelist = whitelist.len(),
            blacklist = blacklist.len(),
            strict_scope,
            "scope model built"
        );

        Ok(ScopeModel {
            seeds,
            whitelist,
            blacklist,
            strict_scope,
            hash: OnceCell::new(),
            scope_hash: OnceCell::new(),
        })
    }

    /// Whether a discovered entity may be examined.
    ///
    /// True iff the candidate is itself one of the original seeds or has
    /// a whitelist ancestor, and the blacklist matches neither its host
    /// nor its filterable text. Unparseable candidates are never in
    /// scope.
    pub fn in_scope(&self, candidate: &str) -> bool {
        let Ok(entry) = Entry::from_raw(candidate, &BTreeSet::new()) else {
            return false;
        };
        let included = self.seeds.contains_exact(&entry) || self.whitelist.contains_entry(&entry);
        included && !self.blacklist.contains_entry(&entry)
    }

    /// Whitelist membership, non-strict (ancestor expansion) unless the
    /// model was built with strict scope.
    pub fn whitelisted(&self, candidate: &str) -> bool {
        self.whitelist.contains(candidate)
    }

    /// Blacklist membership: host index plus exclusion regexes.
    pub fn blacklisted(&self, candidate: &str) -> bool {
        self.blacklist.contains(candidate)
    }

    pub fn seeds(&self) -> &TargetSet {
        &self.seeds
    }

    pub fn whitelist(&self) -> &TargetSet {
        &self.whitelist
    }

    pub fn blacklist(&self) -> &TargetSet {
        &self.blacklist
    }

    pub fn strict_scope(&self) -> bool {
        self.strict_scope
    }

    /// Digest identifying the whole scope configuration, seed set
    /// included.
    pub fn hash(&self) -> [u8; 20] {
        *self.hash.get_or_init(|| {
            combine_hashes(&[
                self.seeds.hash(),
                self.whitelist.hash(),
                self.blacklist.hash(),
            ])
        })
    }

    /// Digest identifying scope policy only: whitelist and blacklist,
    /// independent of seeds. Cached scope decisions from a prior run
    /// stay valid as long as this is unchanged.
    pub fn scope_hash(&self) -> [u8; 20] {
        *self.scope_hash.get_or_init(|| {
            combine_hashes(&[self.whitelist.hash(), self.blacklist.hash()])
        })
    }

    /// A stripped variant for transfer across a process/worker boundary:
    /// no seeds, whitelist and blacklist rebuilt from their raw inputs.
    ///
    /// The rebuild re-runs classification over inputs that already
    /// passed validation, so an error cannot occur in practice; the
    /// constructor stays the single validation path.
    pub fn minimal(&self) -> Result<ScopeModel> {
        ScopeModel::new(
            Vec::new(),
            Some(self.whitelist.inputs().map(str::to_string).collect()),
            self.blacklist.inputs().map(str::to_string).collect(),
            self.strict_scope,
        )
    }

    /// Serializable snapshot of this scope configuration.
    pub fn view(&self) -> ScopeView {
        ScopeView {
            seeds: sorted_data(&self.seeds),
            whitelist: sorted_data(&self.whitelist),
            blacklist: sorted_data(&self.blacklist),
            strict_scope: self.strict_scope,
            hash: hex(&self.hash()),
            seed_hash: hex(&self.seeds.hash()),
            whitelist_hash: hex(&self.whitelist.hash()),
            blacklist_hash: hex(&self.blacklist.hash()),
            scope_hash: hex(&self.scope_hash()),
        }
    }

}

/// Serializable view of a [`ScopeModel`].
#[derive(Debug, Clone, Serialize)]
pub struct ScopeView {
    pub seeds: Vec<String>,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
    pub strict_scope: bool,
    pub hash: String,
    pub seed_hash: String,
    pub whitelist_hash: String,
    pub blacklist_hash: String,
    pub scope_hash: String,
}

fn combine_hashes(hashes: &[[u8; 20]]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    for hash in hashes {
        hasher.update(hash);
    }
    hasher.finalize().into()
}

fn sorted_data(set: &TargetSet) -> Vec<String> {
    let mut data: Vec<String> = set.iter().map(|e| e.data().to_string()).collect();
    data.sort();
    data.dedup();
    data
}

pub(crate) fn hex(digest: &[u8; 20]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    fn model(seeds: &[&str], whitelist: Option<&[&str]>, blacklist: &[&str]) -> ScopeModel {
        ScopeModel::new(
            seeds.iter().map(|s| s.to_string()).collect(),
            whitelist.map(|w| w.iter().map(|s| s.to_string()).collect()),
            blacklist.iter().map(|s| s.to_string()).collect(),
            false,
        )
        .unwrap()
    }

    #[test]
    fn whitelist_defaults_to_seed_hosts() {
        let m = model(&["example.com", "ORG:acme"], None, &[]);

        assert!(m.whitelisted("sub.example.com"));
        // the org stub has no host and contributes nothing
        assert!(!m.whitelisted("acme"));
    }

    #[test]
    fn blacklist_overrides_whitelist() {
        let m = model(
            &["example.com"],
            Some(&["example.com"]),
            &["bad.example.com"],
        );

        assert!(m.in_scope("good.example.com"));
        assert!(!m.in_scope("bad.example.com"));
        assert!(!m.in_scope("deeper.bad.example.com"));
    }

    #[test]
    fn exact_seed_is_in_scope_without_whitelist_ancestor() {
        let m = model(&["standalone.net"], Some(&["unrelated.org"]), &[]);

        assert!(m.in_scope("standalone.net"));
        // not a seed itself and no whitelist ancestor
        assert!(!m.in_scope("sub.standalone.net"));
    }

    #[test]
    fn unparseable_candidates_are_out_of_scope() {
        let m = model(&["example.com"], None, &[]);
        assert!(!m.in_scope("not a host"));
        assert!(!m.whitelisted(""));
    }

    #[test]
    fn scope_hash_ignores_seeds() {
        let a = model(&["example.com"], Some(&["scope.net"]), &["REGEX:^evil-"]);
        let b = model(&["other.org"], Some(&["scope.net"]), &["REGEX:^evil-"]);
        let c = model(&["example.com"], Some(&["scope.net"]), &[]);

        assert_eq!(a.scope_hash(), b.scope_hash());
        assert_ne!(a.hash(), b.hash());
        assert_ne!(a.scope_hash(), c.scope_hash());
    }

    #[test]
    fn strict_scope_still_honors_explicit_whitelist_entries() {
        let m = ScopeModel::new(
            Vec::new(),
            Some(vec!["example.com".into(), "www.example.com".into()]),
            Vec::new(),
            true,
        )
        .unwrap();

        assert!(m.whitelisted("example.com"));
        assert!(m.whitelisted("www.example.com"));
        assert!(!m.whitelisted("other.example.com"));
    }

    #[test]
    fn view_keeps_whitelist_entries_covered_by_broader_ones() {
        let m = model(&[], Some(&["example.com", "www.example.com"]), &[]);

        let view = m.view();
        assert_eq!(
            view.whitelist,
            vec!["example.com".to_string(), "www.example.com".to_string()]
        );
    }

    #[test]
    fn view_serializes_with_hex_hashes() {
        let m = model(&["example.com"], None, &["10.0.0.0/8"]);
        let view = m.view();

        assert_eq!(view.seeds, vec!["example.com".to_string()]);
        assert_eq!(view.blacklist, vec!["10.0.0.0/8".to_string()]);
        assert_eq!(view.hash.len(), 40);
        assert_eq!(view.scope_hash.len(), 40);
        assert!(view.hash.bytes().all(|b| b.is_ascii_hexdigit()));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["strict_scope"], serde_json::Value::Bool(false));
        assert_eq!(json["whitelist"][0], "example.com");
    }

    #[test]
    fn seed_entries_carry_the_target_tag() {
        let m = model(&["example.com"], None, &[]);
        let seed = m.seeds().iter().next().unwrap();
        assert!(seed.has_tag(SEED_TAG));
    }
}
