//! Name-based queries for outer layers (HTTP handlers, CLI).
//!
//! Every operation takes concept names. `None` means a name did not resolve;
//! a resolved query with no result is an empty vector.

use ahash::AHashMap;
use serde::Serialize;

use crate::algorithms::shortest_path;
use crate::reader::Causenet;
use crate::support::Support;

/// In-memory name -> index map for callers that resolve many names.
pub struct ConceptLookup {
    by_name: AHashMap<Box<str>, u32>,
}

impl ConceptLookup {
    pub fn build(causenet: &Causenet) -> Self {
        let by_name = causenet
            .concepts()
            .enumerate()
            .map(|(idx, name)| (Box::from(name.as_ref()), idx as u32))
            .collect();
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Edge weight used for path search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathWeighting {
    /// Each edge costs its support count.
    #[default]
    SupportCount,
    /// Each edge costs 1.
    Hops,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConceptView {
    pub name: String,
    pub effects: Vec<String>,
}

pub struct CausenetQueries<'a> {
    causenet: &'a Causenet,
    lookup: Option<ConceptLookup>,
}

impl<'a> CausenetQueries<'a> {
    /// Queries resolving names by linear scan.
    pub fn new(causenet: &'a Causenet) -> Self {
        Self {
            causenet,
            lookup: None,
        }
    }

    /// Queries resolving names through a prebuilt [`ConceptLookup`].
    pub fn with_lookup(causenet: &'a Causenet) -> Self {
        Self {
            causenet,
            lookup: Some(ConceptLookup::build(causenet)),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<u32> {
        match &self.lookup {
            Some(lookup) => lookup.get(name),
            None => self.causenet.concept_index(name),
        }
    }

    pub fn concepts(&self) -> Vec<String> {
        self.causenet.concepts().map(|c| c.into_owned()).collect()
    }

    pub fn concept(&self, name: &str) -> Option<ConceptView> {
        let effects = self.effect_names(name)?;
        Some(ConceptView {
            name: name.to_string(),
            effects,
        })
    }

    pub fn effect_names(&self, name: &str) -> Option<Vec<String>> {
        let idx = self.resolve(name)?;
        Some(
            self.causenet
                .effects(idx)
                .map(|(target, _)| self.causenet.concept_name(target).into_owned())
                .collect(),
        )
    }

    pub fn supports(&self, cause: &str, effect: &str) -> Option<Vec<Support>> {
        let cause = self.resolve(cause)?;
        let effect = self.resolve(effect)?;
        Some(self.causenet.support(cause, effect).collect())
    }

    pub fn path(&self, from: &str, to: &str, weighting: PathWeighting) -> Option<Vec<String>> {
        let start = self.resolve(from)?;
        let target = self.resolve(to)?;
        let causenet = self.causenet;
        let nodes = match weighting {
            PathWeighting::SupportCount => shortest_path(start, target, |n| causenet.effects(n)),
            PathWeighting::Hops => {
                shortest_path(start, target, |n| causenet.effects(n).map(|(t, _)| (t, 1u32)))
            }
        };
        Some(
            nodes
                .into_iter()
                .map(|n| causenet.concept_name(n).into_owned())
                .collect(),
        )
    }
}
