#![cfg(test)]
use anyhow::Result;
use perimeter_common::entry::EntryKind;
use perimeter_core::ScopeModel;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn model(
    seeds: &[&str],
    whitelist: Option<&[&str]>,
    blacklist: &[&str],
    strict: bool,
) -> Result<ScopeModel> {
    Ok(ScopeModel::new(
        strings(seeds),
        whitelist.map(strings),
        strings(blacklist),
        strict,
    )?)
}

/// Building the same logical scope from permuted and duplicated inputs
/// must produce identical hashes and identical decisions for any
/// candidate: the scanning engine caches decisions keyed on these
/// hashes.
#[test]
fn order_and_duplication_independence() -> Result<()> {
    let a = model(
        &["example.com", "10.0.0.0/8", "test.example.com"],
        None,
        &["bad.example.com"],
        false,
    )?;
    let b = model(
        &[
            "test.example.com",
            "10.0.0.0/8",
            "example.com",
            "10.0.0.0/8",
            "example.com",
        ],
        None,
        &["bad.example.com"],
        false,
    )?;

    assert_eq!(a.hash(), b.hash());
    assert_eq!(a.scope_hash(), b.scope_hash());

    for candidate in [
        "example.com",
        "deep.sub.example.com",
        "10.1.2.3",
        "11.0.0.1",
        "bad.example.com",
        "unrelated.org",
    ] {
        assert_eq!(
            a.in_scope(candidate),
            b.in_scope(candidate),
            "decision diverged for {candidate}"
        );
    }
    Ok(())
}

#[test]
fn ancestor_matching_respects_label_boundaries() -> Result<()> {
    let m = model(&[], Some(&["example.com"]), &[], false)?;

    assert!(m.whitelisted("a.b.example.com"));
    assert!(m.whitelisted("example.com"));
    assert!(!m.whitelisted("example.com.evil.com"));
    assert!(!m.whitelisted("notexample.com"));
    Ok(())
}

#[test]
fn cidr_matching() -> Result<()> {
    let m = model(&[], Some(&["10.0.0.0/8"]), &[], false)?;

    assert!(m.whitelisted("10.1.2.3"));
    assert!(m.whitelisted("10.255.255.255"));
    assert!(!m.whitelisted("11.0.0.1"));
    Ok(())
}

#[test]
fn blacklist_always_overrides_whitelist() -> Result<()> {
    let m = model(
        &["overlap.example.com"],
        Some(&["overlap.example.com"]),
        &["overlap.example.com"],
        false,
    )?;

    assert!(m.whitelisted("overlap.example.com"));
    assert!(m.blacklisted("overlap.example.com"));
    assert!(!m.in_scope("overlap.example.com"));
    Ok(())
}

#[test]
fn regex_blacklist_matches_hosts_and_urls() -> Result<()> {
    let m = model(
        &["example.com"],
        None,
        &["REGEX:^evil-.*", r"RE:.*/logout"],
        false,
    )?;

    assert!(m.blacklisted("evil-test.com"));
    assert!(!m.blacklisted("good-test.com"));
    // path-sensitive exclusion the trie cannot express
    assert!(m.blacklisted("https://app.example.com/logout"));
    assert!(!m.blacklisted("https://app.example.com/login"));
    Ok(())
}

#[test]
fn strict_scope_disables_dns_ancestor_expansion() -> Result<()> {
    let m = model(&[], Some(&["example.com"]), &[], true)?;

    assert!(m.whitelisted("example.com"));
    assert!(!m.whitelisted("sub.example.com"));
    Ok(())
}

/// An operator listing both a domain and one of its subdomains gets
/// both honored under strict scope, and the subdomain stays visible in
/// the serialized view even though the broader entry covers it.
#[test]
fn overlapping_whitelist_entries_survive_in_both_modes() -> Result<()> {
    let strict = model(&[], Some(&["example.com", "www.example.com"]), &[], true)?;
    assert!(strict.whitelisted("example.com"));
    assert!(strict.whitelisted("www.example.com"));
    assert!(!strict.whitelisted("other.example.com"));

    let loose = model(&[], Some(&["example.com", "www.example.com"]), &[], false)?;
    assert!(loose.whitelisted("www.example.com"));
    assert_eq!(
        loose.view().whitelist,
        vec!["example.com".to_string(), "www.example.com".to_string()]
    );
    Ok(())
}

#[test]
fn typed_tokens_stay_out_of_the_host_index() -> Result<()> {
    let m = model(&["ORG:acme", "USER:alice", "example.com"], None, &[], false)?;

    let kinds: Vec<EntryKind> = m.seeds().iter().map(|e| e.kind()).collect();
    assert!(kinds.contains(&EntryKind::OrgStub));
    assert!(kinds.contains(&EntryKind::Username));

    // whitelist defaulted from seed hosts: only example.com qualifies
    assert!(m.whitelisted("sub.example.com"));
    assert!(!m.whitelisted("acme"));
    assert!(!m.whitelisted("alice"));
    Ok(())
}

/// `minimal()` drops seeds and materialized entries but must keep
/// whitelist/blacklist decisions bit-identical to the original.
#[test]
fn minimal_round_trip_preserves_policy() -> Result<()> {
    let original = model(
        &["example.com", "ORG:acme"],
        Some(&["example.com", "10.0.0.0/8"]),
        &["bad.example.com", "REGEX:^evil-.*"],
        false,
    )?;
    let minimal = original.minimal()?;

    assert!(minimal.seeds().is_empty());
    assert_eq!(original.scope_hash(), minimal.scope_hash());

    for candidate in [
        "example.com",
        "deep.sub.example.com",
        "10.1.2.3",
        "11.0.0.1",
        "bad.example.com",
        "sub.bad.example.com",
        "evil-test.com",
        "unrelated.org",
    ] {
        assert_eq!(
            original.whitelisted(candidate),
            minimal.whitelisted(candidate),
            "whitelist diverged for {candidate}"
        );
        assert_eq!(
            original.blacklisted(candidate),
            minimal.blacklisted(candidate),
            "blacklist diverged for {candidate}"
        );
    }
    Ok(())
}

/// `scope_hash` identifies policy independent of seeds; `hash` covers
/// the seed set too.
#[test]
fn scope_hash_tracks_policy_only() -> Result<()> {
    let base = model(&["seed-a.com"], Some(&["scope.net"]), &["bad.net"], false)?;
    let reseeded = model(&["seed-b.com"], Some(&["scope.net"]), &["bad.net"], false)?;
    let repoliced = model(&["seed-a.com"], Some(&["scope.net"]), &["worse.net"], false)?;

    assert_eq!(base.scope_hash(), reseeded.scope_hash());
    assert_ne!(base.hash(), reseeded.hash());
    assert_ne!(base.scope_hash(), repoliced.scope_hash());
    Ok(())
}

#[test]
fn candidates_reduce_to_their_hosts() -> Result<()> {
    let m = model(&[], Some(&["example.com", "10.0.0.0/8"]), &[], false)?;

    assert!(m.whitelisted("https://user@www.example.com:8443/login"));
    assert!(m.whitelisted("bob@mail.example.com"));
    assert!(m.whitelisted("10.1.2.3:8080"));
    assert!(!m.whitelisted("https://www.unrelated.org/"));
    Ok(())
}

#[test]
fn invalid_blacklist_regex_fails_construction() {
    let result = model(&["example.com"], None, &["REGEX:[unclosed"], false);
    assert!(result.is_err());
}

#[test]
fn view_round_trips_through_json() -> Result<()> {
    let m = model(
        &["example.com"],
        Some(&["example.com"]),
        &["10.0.0.0/8"],
        true,
    )?;
    let json = serde_json::to_value(m.view())?;

    assert_eq!(json["seeds"][0], "example.com");
    assert_eq!(json["blacklist"][0], "10.0.0.0/8");
    assert_eq!(json["strict_scope"], true);
    assert_eq!(json["hash"].as_str().unwrap().len(), 40);
    assert_eq!(json["seed_hash"].as_str().unwrap().len(), 40);
    assert_eq!(json["whitelist_hash"].as_str().unwrap().len(), 40);
    assert_eq!(json["blacklist_hash"].as_str().unwrap().len(), 40);
    assert_eq!(json["scope_hash"].as_str().unwrap().len(), 40);
    Ok(())
}

/// A built model is shared freely across scan workers.
#[test]
fn scope_model_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ScopeModel>();
}

#[test]
fn concurrent_lookups_and_hashing() -> Result<()> {
    use std::sync::Arc;
    use std::thread;

    let m = Arc::new(model(
        &["example.com", "10.0.0.0/8"],
        None,
        &["bad.example.com"],
        false,
    )?);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                for _ in 0..100 {
                    assert!(m.in_scope("sub.example.com"));
                    assert!(!m.in_scope("bad.example.com"));
                    // racing memoized hash computes are idempotent
                    let _ = m.hash();
                    let _ = m.scope_hash();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked");
    }
    Ok(())
}
