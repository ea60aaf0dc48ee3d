//! The binding environment a synthesis run searches over.
//!
//! [`Bindings`] maps names to immutable frames and memoizes, per name, the
//! frame's columns grouped by dtype. The join generators consult that index
//! to discover join-compatible column pairs without rescanning columns for
//! every pair of bindings. The cache fills on first lookup and is never
//! invalidated afterwards; bindings do not change while a search runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::frame::{Dtype, Frame, NameHasher};

/// Column names grouped by dtype, sorted within each bucket.
pub type ColumnsByDtype = BTreeMap<Dtype, BTreeSet<String>>;

/// Name-keyed collection of frames with insertion-based iteration order.
///
/// One struct holds both the binding map and the dtype index cache, so the
/// environment itself stays an ordinary value that can be built, handed to a
/// synthesizer and dropped.
#[derive(Debug, Default)]
pub struct Bindings {
    order: Vec<String>,
    frames: HashMap<String, Arc<Frame>, NameHasher>,
    columns_by_dtype: Mutex<HashMap<String, Arc<ColumnsByDtype>, NameHasher>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a binding. Replacing keeps the original position in
    /// iteration order and drops the stale dtype index for that name.
    pub fn insert(&mut self, name: impl Into<String>, frame: Frame) {
        self.insert_shared(name, Arc::new(frame));
    }

    /// Adds or replaces a binding that is already shared elsewhere.
    pub fn insert_shared(&mut self, name: impl Into<String>, frame: Arc<Frame>) {
        let name = name.into();
        if self.frames.insert(name.clone(), frame).is_none() {
            self.order.push(name);
        } else {
            self.columns_by_dtype.lock().unwrap().remove(&name);
        }
    }

    pub fn frame(&self, name: &str) -> Option<Arc<Frame>> {
        self.frames.get(name).cloned()
    }

    /// Binding names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// `(name, frame)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Frame>)> {
        self.order
            .iter()
            .filter_map(|name| self.frames.get(name).map(|frame| (name.as_str(), frame)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The named frame's columns grouped by dtype, computed on first lookup
    /// and memoized for the rest of the environment's life.
    pub fn columns_by_dtype(&self, name: &str) -> Option<Arc<ColumnsByDtype>> {
        let mut cache = self.columns_by_dtype.lock().unwrap();
        if let Some(cached) = cache.get(name) {
            return Some(Arc::clone(cached));
        }
        let frame = self.frames.get(name)?;
        let computed = Arc::new(frame.columns_by_dtype());
        cache.insert(name.to_owned(), Arc::clone(&computed));
        Some(computed)
    }

    /// Splits one binding out as a synthesis target: the remaining bindings
    /// keep their relative order, the named frame is returned alongside.
    pub fn holdout(&self, name: &str) -> Option<(Bindings, Arc<Frame>)> {
        let goal = self.frame(name)?;
        let mut rest = Bindings::new();
        for (other, frame) in self.iter() {
            if other != name {
                rest.insert_shared(other, Arc::clone(frame));
            }
        }
        Some((rest, goal))
    }
}
