//! Working state of a compilation
//!
//! A [`ProtoSchema`] layers a working set of edited definitions over the
//! read-only [`Repository`]. Lookups hit the working set first and fall back
//! to the repository, so resolving a location twice without an intervening
//! write always yields the same definition.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::error::{CompileError, Result};
use crate::repository::{Definition, Location, LocationKind, Repository};

/// Repository plus accumulated edits
#[derive(Debug, Clone)]
pub struct ProtoSchema {
    repository: Arc<Repository>,
    working: BTreeMap<Location, Arc<Definition>>,
    /// Locations whose edits failed, with the first reason
    failed: BTreeMap<Location, String>,
    /// Copied or merged location -> the extension location it came from
    lineage: BTreeMap<Location, Location>,
}

impl ProtoSchema {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self {
            repository,
            working: BTreeMap::new(),
            failed: BTreeMap::new(),
            lineage: BTreeMap::new(),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Latest definition at a location
    pub fn resolve(&self, location: &Location) -> Result<Arc<Definition>> {
        self.get(location)
            .cloned()
            .ok_or_else(|| CompileError::NotFound {
                location: location.clone(),
            })
    }

    pub fn get(&self, location: &Location) -> Option<&Arc<Definition>> {
        self.working
            .get(location)
            .or_else(|| self.repository.get(location))
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.working.contains_key(location) || self.repository.contains(location)
    }

    /// Every known location, repository and working set, in location order
    pub fn locations(&self) -> impl Iterator<Item = &Location> + '_ {
        let mut all: BTreeSet<&Location> = self.repository.locations().collect();
        all.extend(self.working.keys());
        all.into_iter()
    }

    /// Core locations of the given kinds
    pub fn core_locations(&self, kinds: &[LocationKind]) -> Vec<Location> {
        self.locations()
            .filter(|l| l.is_core() && kinds.contains(&l.kind))
            .cloned()
            .collect()
    }

    /// Definitions edited so far
    pub fn edited(&self) -> impl Iterator<Item = (&Location, &Arc<Definition>)> + '_ {
        self.working.iter()
    }

    // ===== Writes (compile step only) =====

    pub(crate) fn write(&mut self, location: Location, definition: Arc<Definition>) {
        self.working.insert(location, definition);
    }

    pub(crate) fn record_lineage(&mut self, location: Location, origin: Location) {
        self.lineage.entry(location).or_insert(origin);
    }

    pub(crate) fn mark_failed(&mut self, location: Location, reason: String) {
        self.failed.entry(location).or_insert(reason);
    }

    // ===== Failures and provenance =====

    pub fn failure(&self, location: &Location) -> Option<&str> {
        self.failed.get(location).map(String::as_str)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Location, &str)> + '_ {
        self.failed.iter().map(|(l, r)| (l, r.as_str()))
    }

    /// Extension location a copied definition came from
    pub fn origin(&self, location: &Location) -> Option<&Location> {
        self.lineage.get(location)
    }

    /// Source file for a location, following copies back to their origin
    pub fn source_path(&self, location: &Location) -> Option<&Path> {
        self.repository.source_path(location).or_else(|| {
            self.origin(location)
                .and_then(|origin| self.repository.source_path(origin))
        })
    }

    // ===== Lookup by name =====

    /// Core location of one of `kinds` named `name`
    ///
    /// Matches the location name, the declared `name`, or the rendered key.
    /// When several match, a definition copied from `extension` wins, then a
    /// native core definition.
    pub fn find_by_name(
        &self,
        kinds: &[LocationKind],
        name: &str,
        extension: Option<&str>,
    ) -> Option<Location> {
        let mut candidates: Vec<(&Location, Option<&str>)> = Vec::new();
        for location in self.locations() {
            if !location.is_core() || !kinds.contains(&location.kind) {
                continue;
            }
            let Some(definition) = self.get(location) else {
                continue;
            };
            if location.name == name || definition.name() == Some(name) || definition.key() == Some(name) {
                candidates.push((location, definition.src_extension()));
            }
        }

        candidates
            .iter()
            .find(|(_, src)| extension.is_some() && *src == extension)
            .or_else(|| candidates.iter().find(|(_, src)| src.is_none()))
            .or_else(|| candidates.first())
            .map(|(l, _)| (*l).clone())
    }

    /// Closest core name among `kinds`, for diagnostics
    pub fn suggest(&self, kinds: &[LocationKind], name: &str) -> Option<String> {
        let matcher = SkimMatcherV2::default();
        self.locations()
            .filter(|l| l.is_core() && kinds.contains(&l.kind))
            .filter_map(|l| matcher.fuzzy_match(&l.name, name).map(|score| (score, &l.name)))
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, n)| n.clone())
    }
}
