//! Lazy candidate generators and the combined program stream.
//!
//! Each generator yields [`Candidate`] values on demand in a fixed,
//! deterministic order; nothing is interpreted here and no stream is ever
//! materialized up front. The combined [`programs`] stream concatenates the
//! tiers cheapest-first: references, then dissolves, then the two binary
//! families merged fairly so that a slow spatial enumeration cannot starve
//! the relational one (or the other way round).

use std::iter::Fuse;

use tracing::debug;

use crate::bindings::Bindings;
use crate::frame::JoinMode;
use crate::geom::SpatialPredicate;
use crate::grammar::Candidate;

// ------------- Per-tier generators -------------

/// One [`Candidate::Reference`] per binding, in binding order.
pub fn references(bindings: &Bindings) -> impl Iterator<Item = Candidate> + '_ {
    bindings.names().map(|name| Candidate::Reference {
        name: name.to_owned(),
    })
}

/// One [`Candidate::Dissolve`] per binding and grouping column, in binding
/// order then column order. The geometry column never serves as a grouping
/// key; every other column does, whether or not the dissolve can succeed.
pub fn dissolves(bindings: &Bindings) -> impl Iterator<Item = Candidate> + '_ {
    bindings.iter().flat_map(|(name, frame)| {
        let source = Candidate::Reference {
            name: name.to_owned(),
        };
        let keys: Vec<String> = frame
            .columns()
            .iter()
            .filter(|column| Some(column.name.as_str()) != frame.geometry_column())
            .map(|column| column.name.clone())
            .collect();
        keys.into_iter().map(move |by| Candidate::Dissolve {
            source: Box::new(source.clone()),
            by,
        })
    })
}

/// Every [`Candidate::Merge`] over unordered binding pairs: for each pair,
/// each dtype both sides share, each key-column pair of that dtype and each
/// join mode, the merge is emitted followed immediately by its dual.
pub fn merges(bindings: &Bindings) -> impl Iterator<Item = Candidate> + '_ {
    pairs(bindings).into_iter().flat_map(move |(left, right)| {
        let keys = key_pairs(bindings, &left, &right);
        keys.into_iter().flat_map(move |(left_on, right_on)| {
            let left = left.clone();
            let right = right.clone();
            JoinMode::MERGE.into_iter().flat_map(move |how| {
                let candidate = Candidate::Merge {
                    left: left.clone(),
                    right: right.clone(),
                    how,
                    left_on: left_on.clone(),
                    right_on: right_on.clone(),
                };
                let dual = candidate.dual();
                std::iter::once(candidate).chain(dual)
            })
        })
    })
}

/// Every [`Candidate::SpatialJoin`] over unordered binding pairs: for each
/// pair of geometry-bearing bindings, each join mode and each predicate both
/// sides' spatial indexes support, the join is emitted followed by its dual.
pub fn spatial_joins(bindings: &Bindings) -> impl Iterator<Item = Candidate> + '_ {
    pairs(bindings).into_iter().flat_map(move |(left, right)| {
        let predicates = shared_predicates(bindings, &left, &right);
        JoinMode::SPATIAL.into_iter().flat_map(move |how| {
            let left = left.clone();
            let right = right.clone();
            predicates
                .clone()
                .into_iter()
                .flat_map(move |predicate| {
                    let candidate = Candidate::SpatialJoin {
                        left: left.clone(),
                        right: right.clone(),
                        how,
                        predicate,
                    };
                    let dual = candidate.dual();
                    std::iter::once(candidate).chain(dual)
                })
        })
    })
}

// ------------- Combined stream -------------

/// The full program stream in search order: references, then dissolves,
/// then the merge and spatial-join streams interleaved fairly.
pub fn programs(bindings: &Bindings) -> impl Iterator<Item = Candidate> + '_ {
    debug!(bindings = bindings.len(), "building program stream");
    references(bindings)
        .chain(dissolves(bindings))
        .chain(Interleave::new(merges(bindings), spatial_joins(bindings)))
}

/// Alternates between two streams one element at a time while both still
/// produce, then drains whichever is left. Neither source is collected;
/// elements are pulled only as the consumer advances.
pub struct Interleave<A: Iterator, B: Iterator<Item = A::Item>> {
    first: Fuse<A>,
    second: Fuse<B>,
    pull_first: bool,
}

impl<A: Iterator, B: Iterator<Item = A::Item>> Interleave<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first: first.fuse(),
            second: second.fuse(),
            pull_first: true,
        }
    }
}

impl<A: Iterator, B: Iterator<Item = A::Item>> Iterator for Interleave<A, B> {
    type Item = A::Item;

    fn next(&mut self) -> Option<A::Item> {
        if self.pull_first {
            match self.first.next() {
                Some(item) => {
                    self.pull_first = false;
                    Some(item)
                }
                None => self.second.next(),
            }
        } else {
            match self.second.next() {
                Some(item) => {
                    self.pull_first = true;
                    Some(item)
                }
                None => self.first.next(),
            }
        }
    }
}

// ------------- Enumeration inputs -------------

/// Unordered binding pairs in binding order: (0,1), (0,2), (1,2), ...
fn pairs(bindings: &Bindings) -> Vec<(String, String)> {
    let names: Vec<&str> = bindings.names().collect();
    let mut out = Vec::new();
    for (at, left) in names.iter().enumerate() {
        for right in &names[at + 1..] {
            out.push(((*left).to_owned(), (*right).to_owned()));
        }
    }
    out
}

/// Key-column pairs two bindings can merge on: the per-dtype Cartesian
/// product of their column buckets, in dtype order then name order.
fn key_pairs(bindings: &Bindings, left: &str, right: &str) -> Vec<(String, String)> {
    let mut keys = Vec::new();
    if let (Some(l), Some(r)) = (
        bindings.columns_by_dtype(left),
        bindings.columns_by_dtype(right),
    ) {
        for (dtype, l_names) in l.iter() {
            if let Some(r_names) = r.get(dtype) {
                for l_name in l_names {
                    for r_name in r_names {
                        keys.push((l_name.clone(), r_name.clone()));
                    }
                }
            }
        }
    }
    keys
}

/// Predicates both sides' spatial indexes support, in predicate order.
/// Empty when either binding lacks geometry.
fn shared_predicates(bindings: &Bindings, left: &str, right: &str) -> Vec<SpatialPredicate> {
    let (Some(l), Some(r)) = (bindings.frame(left), bindings.frame(right)) else {
        return Vec::new();
    };
    if l.geometry_column().is_none() || r.geometry_column().is_none() {
        return Vec::new();
    }
    let (Ok(l_index), Ok(r_index)) = (l.spatial_index(), r.spatial_index()) else {
        return Vec::new();
    };
    let l_supported = l_index.supported_predicates();
    let r_supported = r_index.supported_predicates();
    l_supported.intersection(&r_supported).copied().collect()
}
