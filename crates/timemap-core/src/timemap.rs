//! Timemap entity and its assembler
//!
//! A [`Timemap`] is built once from a stream of [`LinkRecord`]s and is
//! read-only afterwards. Relative targets are resolved against the base URI
//! the caller supplies; nothing is fetched.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalizer::{self, CanonicalUri};
use crate::parser::link::LinkRecord;
use crate::{Error, Result};

/// Relation vocabulary recognized by the assembler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationProfile {
    /// `memento`, `original`, `timegate`, `timemap`, `self`
    #[default]
    Standard,
    /// Standard plus `first memento`, `last memento` and `timebundle`
    Extended,
}

/// Mementos of one instant
pub type MementoSet = BTreeSet<CanonicalUri>;

/// Parsed Timemap
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timemap {
    original_uri: Option<CanonicalUri>,
    timegate_uri: Option<CanonicalUri>,
    timemap_uri: Option<CanonicalUri>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timebundle_uri: Option<CanonicalUri>,
    mementos: BTreeMap<DateTime<Utc>, MementoSet>,
    from_datetime: Option<DateTime<Utc>>,
    until_datetime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_memento: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_memento: Option<DateTime<Utc>>,
}

impl Timemap {
    /// URI-R, the resource the mementos are snapshots of.
    pub fn original_uri(&self) -> Option<&CanonicalUri> {
        self.original_uri.as_ref()
    }

    pub fn timegate_uri(&self) -> Option<&CanonicalUri> {
        self.timegate_uri.as_ref()
    }

    /// URI-T, from the `timemap` or `self` relation.
    pub fn timemap_uri(&self) -> Option<&CanonicalUri> {
        self.timemap_uri.as_ref()
    }

    /// Only set under [`RelationProfile::Extended`].
    pub fn timebundle_uri(&self) -> Option<&CanonicalUri> {
        self.timebundle_uri.as_ref()
    }

    pub fn from_datetime(&self) -> Option<DateTime<Utc>> {
        self.from_datetime
    }

    pub fn until_datetime(&self) -> Option<DateTime<Utc>> {
        self.until_datetime
    }

    /// Only set under [`RelationProfile::Extended`].
    pub fn first_memento(&self) -> Option<DateTime<Utc>> {
        self.first_memento
    }

    /// Only set under [`RelationProfile::Extended`].
    pub fn last_memento(&self) -> Option<DateTime<Utc>> {
        self.last_memento
    }

    /// All mementos, ordered by instant.
    pub fn mementos(&self) -> &BTreeMap<DateTime<Utc>, MementoSet> {
        &self.mementos
    }

    pub fn get(&self, instant: &DateTime<Utc>) -> Option<&MementoSet> {
        self.mementos.get(instant)
    }

    /// Mementos for `instant`, or [`Error::NotFound`].
    pub fn lookup(&self, instant: &DateTime<Utc>) -> Result<&MementoSet> {
        self.get(instant).ok_or(Error::NotFound(*instant))
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.mementos.contains_key(instant)
    }

    /// Number of distinct memento instants.
    pub fn len(&self) -> usize {
        self.mementos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mementos.is_empty()
    }

    /// Number of URI-Ms across all instants.
    pub fn memento_count(&self) -> usize {
        self.mementos.values().map(BTreeSet::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &MementoSet)> {
        self.mementos.iter()
    }

    /// Earliest memento instant and its URI-Ms.
    pub fn earliest(&self) -> Option<(&DateTime<Utc>, &MementoSet)> {
        self.mementos.iter().next()
    }

    /// Latest memento instant and its URI-Ms.
    pub fn latest(&self) -> Option<(&DateTime<Utc>, &MementoSet)> {
        self.mementos.iter().next_back()
    }

    /// Structural sanity checks on a finished Timemap.
    fn debug_check_invariants(&self) {
        for (instant, uris) in &self.mementos {
            debug_assert!(!uris.is_empty(), "empty memento set for {}", instant);
        }
        if let (Some(from), Some(until)) = (self.from_datetime, self.until_datetime) {
            if from > until {
                tracing::warn!(%from, %until, "timemap from is after until");
            }
        }
    }
}

impl Index<&DateTime<Utc>> for Timemap {
    type Output = MementoSet;

    /// # Panics
    /// When the Timemap has no mementos for `instant`, like a map lookup.
    fn index(&self, instant: &DateTime<Utc>) -> &MementoSet {
        match self.mementos.get(instant) {
            Some(uris) => uris,
            None => panic!("no mementos for {}", instant),
        }
    }
}

impl<'a> IntoIterator for &'a Timemap {
    type Item = (&'a DateTime<Utc>, &'a MementoSet);
    type IntoIter = std::collections::btree_map::Iter<'a, DateTime<Utc>, MementoSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.mementos.iter()
    }
}

// ── Assembly ───────────────────────────────────────────────

/// Builds a Timemap from link records, one at a time
///
/// Classification is first match wins: `memento`, then `original`, then
/// `timegate`, then `timemap`/`self`, then (extended) `timebundle`.
/// Repeated relations overwrite earlier ones.
#[derive(Debug)]
pub struct TimemapAssembler {
    base_uri: Option<String>,
    profile: RelationProfile,
    timemap: Timemap,
    ignored: usize,
}

impl TimemapAssembler {
    pub fn new(base_uri: &str, profile: RelationProfile) -> Self {
        let base_uri = Some(base_uri.trim())
            .filter(|b| !b.is_empty())
            .map(str::to_string);
        TimemapAssembler {
            base_uri,
            profile,
            timemap: Timemap::default(),
            ignored: 0,
        }
    }

    fn resolve(&self, target: &str) -> CanonicalUri {
        normalizer::normalize(target, self.base_uri.as_deref())
    }

    /// Classify one record and fold it into the Timemap.
    pub fn add(&mut self, record: LinkRecord) {
        let extended = self.profile == RelationProfile::Extended;
        let rels = &record.relations;

        if rels.contains("memento") {
            let Some(instant) = record.memento_datetime else {
                tracing::warn!(uri = %record.target, "memento without datetime skipped");
                self.ignored += 1;
                return;
            };
            let uri = self.resolve(&record.target);
            self.timemap.mementos.entry(instant).or_default().insert(uri);
            if extended && rels.contains("first") {
                self.timemap.first_memento = Some(instant);
            }
            if extended && rels.contains("last") {
                self.timemap.last_memento = Some(instant);
            }
        } else if rels.contains("original") {
            self.timemap.original_uri = Some(self.resolve(&record.target));
        } else if rels.contains("timegate") {
            self.timemap.timegate_uri = Some(self.resolve(&record.target));
        } else if rels.contains("timemap") || rels.contains("self") {
            self.timemap.timemap_uri = Some(self.resolve(&record.target));
            self.timemap.from_datetime = record.from;
            self.timemap.until_datetime = record.until;
        } else if extended && rels.contains("timebundle") {
            self.timemap.timebundle_uri = Some(self.resolve(&record.target));
        } else {
            self.ignored += 1;
        }
    }

    /// Finish assembly and hand over the Timemap.
    pub fn finish(self) -> Timemap {
        self.timemap.debug_check_invariants();
        tracing::debug!(
            instants = self.timemap.len(),
            mementos = self.timemap.memento_count(),
            ignored = self.ignored,
            "assembled timemap"
        );
        self.timemap
    }
}

/// Assemble a Timemap from records using the standard relation profile.
pub fn assemble<I>(records: I, base_uri: &str) -> Timemap
where
    I: IntoIterator<Item = LinkRecord>,
{
    assemble_with(records, base_uri, RelationProfile::Standard)
}

pub fn assemble_with<I>(records: I, base_uri: &str, profile: RelationProfile) -> Timemap
where
    I: IntoIterator<Item = LinkRecord>,
{
    let mut assembler = TimemapAssembler::new(base_uri, profile);
    for record in records {
        assembler.add(record);
    }
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utc;

    const BASE: &str = "http://archive.example/tm/http://example.com/";

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        utc::from_parts(y, mo, d, h, mi, s).unwrap()
    }

    fn record(target: &str, rels: &str) -> LinkRecord {
        LinkRecord {
            relations: rels.split_whitespace().map(str::to_string).collect(),
            target: target.to_string(),
            memento_datetime: None,
            content_type: None,
            from: None,
            until: None,
        }
    }

    fn memento(target: &str, rels: &str, at: DateTime<Utc>) -> LinkRecord {
        LinkRecord {
            memento_datetime: Some(at),
            ..record(target, rels)
        }
    }

    #[test]
    fn test_classifies_relations() {
        let t = utc(2012, 1, 24, 15, 30, 45);
        let tm = assemble(
            vec![
                record("http://example.com/", "original"),
                record("http://archive.example/tg/http://example.com/", "timegate"),
                LinkRecord {
                    from: Some(utc(2010, 1, 1, 0, 0, 0)),
                    until: Some(utc(2013, 1, 1, 0, 0, 0)),
                    ..record("http://archive.example/tm/http://example.com/", "self")
                },
                memento("/web/20120124153045/http://example.com/", "memento", t),
            ],
            BASE,
        );
        assert_eq!(tm.original_uri().unwrap().as_str(), "http://example.com/");
        assert_eq!(
            tm.timegate_uri().unwrap().as_str(),
            "http://archive.example/tg/http://example.com/"
        );
        assert_eq!(
            tm.timemap_uri().unwrap().as_str(),
            "http://archive.example/tm/http://example.com/"
        );
        assert_eq!(tm.from_datetime(), Some(utc(2010, 1, 1, 0, 0, 0)));
        assert_eq!(tm.until_datetime(), Some(utc(2013, 1, 1, 0, 0, 0)));
        assert_eq!(tm.len(), 1);
        let uris = &tm[&t];
        assert_eq!(uris.len(), 1);
        assert_eq!(
            uris.iter().next().unwrap().as_str(),
            "http://archive.example/web/20120124153045/http://example.com/"
        );
    }

    #[test]
    fn test_same_instant_accumulates_and_dedupes() {
        let t = utc(2012, 1, 24, 15, 30, 45);
        let tm = assemble(
            vec![
                memento("http://a.example/1", "memento", t),
                memento("http://b.example/1", "memento", t),
                memento("HTTP://A.EXAMPLE/1#frag", "memento", t),
            ],
            BASE,
        );
        assert_eq!(tm.len(), 1);
        assert_eq!(tm.memento_count(), 2);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let tm = assemble(
            vec![
                record("http://one.example/", "original"),
                record("http://two.example/", "original"),
            ],
            BASE,
        );
        assert_eq!(tm.original_uri().unwrap().as_str(), "http://two.example/");
    }

    #[test]
    fn test_memento_takes_precedence() {
        let t = utc(2012, 1, 24, 15, 30, 45);
        let tm = assemble(vec![memento("http://a.example/", "memento original", t)], BASE);
        assert!(tm.original_uri().is_none());
        assert!(tm.contains(&t));
    }

    #[test]
    fn test_from_until_only_on_timemap_records() {
        let tm = assemble(
            vec![LinkRecord {
                from: Some(utc(2010, 1, 1, 0, 0, 0)),
                ..record("http://example.com/", "original")
            }],
            BASE,
        );
        assert_eq!(tm.from_datetime(), None);
    }

    #[test]
    fn test_unknown_and_empty_relations_ignored() {
        let tm = assemble(
            vec![record("http://x/", ""), record("http://y/", "describedby")],
            BASE,
        );
        assert_eq!(tm, Timemap::default());
    }

    #[test]
    fn test_memento_without_datetime_skipped() {
        let tm = assemble(vec![record("http://a.example/", "memento")], BASE);
        assert!(tm.is_empty());
    }

    #[test]
    fn test_extended_profile() {
        let first = utc(2001, 1, 1, 0, 0, 0);
        let last = utc(2012, 1, 1, 0, 0, 0);
        let records = vec![
            memento("http://a.example/1", "first memento", first),
            memento("http://a.example/2", "last memento", last),
            record("http://archive.example/tb/", "timebundle"),
        ];

        let standard = assemble(records.clone(), BASE);
        assert_eq!(standard.len(), 2);
        assert_eq!(standard.first_memento(), None);
        assert!(standard.timebundle_uri().is_none());

        let extended = assemble_with(records, BASE, RelationProfile::Extended);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.first_memento(), Some(first));
        assert_eq!(extended.last_memento(), Some(last));
        assert_eq!(
            extended.timebundle_uri().unwrap().as_str(),
            "http://archive.example/tb/"
        );
    }

    #[test]
    fn test_lookup_miss() {
        let tm = Timemap::default();
        let t = utc(2012, 1, 24, 0, 0, 0);
        assert!(tm.get(&t).is_none());
        assert!(matches!(tm.lookup(&t), Err(Error::NotFound(missing)) if missing == t));
    }

    #[test]
    #[should_panic(expected = "no mementos for")]
    fn test_index_miss_panics() {
        let tm = Timemap::default();
        let _ = &tm[&utc(2012, 1, 24, 0, 0, 0)];
    }

    #[test]
    fn test_earliest_and_latest() {
        let a = utc(2001, 1, 1, 0, 0, 0);
        let b = utc(2012, 1, 1, 0, 0, 0);
        let tm = assemble(
            vec![memento("http://x/2", "memento", b), memento("http://x/1", "memento", a)],
            BASE,
        );
        assert_eq!(tm.earliest().map(|(t, _)| *t), Some(a));
        assert_eq!(tm.latest().map(|(t, _)| *t), Some(b));
        assert_eq!((&tm).into_iter().count(), 2);
    }

    #[test]
    fn test_serializes_to_json() {
        let t = utc(2012, 1, 24, 15, 30, 45);
        let tm = assemble(vec![memento("http://x/", "memento", t)], BASE);
        let json = serde_json::to_value(&tm).unwrap();
        assert!(json["mementos"]["2012-01-24T15:30:45Z"].is_array());
        assert!(json.get("first_memento").is_none());
    }

    #[test]
    fn test_profile_deserializes_lowercase() {
        let profile: RelationProfile = serde_json::from_str("\"extended\"").unwrap();
        assert_eq!(profile, RelationProfile::Extended);
    }
}
