//! Concurrent candidate evaluation over one shared stream.
//!
//! A single lazy candidate stream feeds any number of workers through a
//! [`SharedCursor`]: the mutex covers only the pull, and each worker
//! interprets and compares its candidate outside the lock, so evaluation
//! (the expensive part) runs in parallel while the stream stays strictly
//! consumed-once. Workers are scoped threads, which lets them borrow the
//! binding environment and the target directly and propagates any worker
//! panic to the caller when the scope joins.
//!
//! [`match_all`] drains the stream and returns the set of matching
//! programs. [`match_first`] stops pulling once any worker finds a match;
//! units already in flight still run to completion, and when several
//! workers match simultaneously, which match is returned is unspecified.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::debug;

use crate::bindings::Bindings;
use crate::frame::{Frame, NameHasher};
use crate::grammar::Candidate;
use crate::oracle::Comparison;

// ------------- Shared cursor -------------

/// A pull cursor over one iterator, shared by reference across workers.
#[derive(Debug)]
pub struct SharedCursor<I> {
    inner: Mutex<I>,
}

impl<I: Iterator> SharedCursor<I> {
    pub fn new(source: I) -> Self {
        Self {
            inner: Mutex::new(source),
        }
    }

    /// The next element, or `None` once the source is exhausted. A poisoned
    /// lock means another worker panicked mid-pull; the panic propagates.
    pub fn take(&self) -> Option<I::Item> {
        self.inner.lock().unwrap().next()
    }
}

// ------------- Harness entry points -------------

/// Evaluates every candidate in `source` across `workers` threads and
/// returns the rendered programs that reproduce `target`. The result is
/// independent of the worker count; only the division of labor varies.
pub fn match_all<I>(
    source: I,
    bindings: &Bindings,
    target: &Frame,
    workers: usize,
) -> HashSet<String, NameHasher>
where
    I: Iterator<Item = Candidate> + Send,
{
    let cursor = SharedCursor::new(source);
    let sink: Mutex<HashSet<String, NameHasher>> = Mutex::new(HashSet::default());
    let comparison = Comparison::matching();
    thread::scope(|scope| {
        for worker in 0..workers.max(1) {
            let cursor = &cursor;
            let sink = &sink;
            let comparison = &comparison;
            scope.spawn(move || {
                let mut pulled = 0u64;
                let mut matched = 0u64;
                while let Some(candidate) = cursor.take() {
                    pulled += 1;
                    if reproduces(&candidate, bindings, target, comparison) {
                        matched += 1;
                        sink.lock().unwrap().insert(candidate.to_string());
                    }
                }
                debug!(worker, pulled, matched, "worker drained");
            });
        }
    });
    sink.into_inner().unwrap()
}

/// Evaluates candidates across `workers` threads until any worker finds a
/// match, then stops handing out new work and returns the match. `None`
/// once the stream is exhausted without one.
pub fn match_first<I>(
    source: I,
    bindings: &Bindings,
    target: &Frame,
    workers: usize,
) -> Option<Candidate>
where
    I: Iterator<Item = Candidate> + Send,
{
    let cursor = SharedCursor::new(source);
    let stop = AtomicBool::new(false);
    let hit: Mutex<Option<Candidate>> = Mutex::new(None);
    let comparison = Comparison::matching();
    thread::scope(|scope| {
        for worker in 0..workers.max(1) {
            let cursor = &cursor;
            let stop = &stop;
            let hit = &hit;
            let comparison = &comparison;
            scope.spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let Some(candidate) = cursor.take() else {
                        break;
                    };
                    if reproduces(&candidate, bindings, target, comparison) {
                        stop.store(true, Ordering::SeqCst);
                        let mut slot = hit.lock().unwrap();
                        if slot.is_none() {
                            debug!(worker, program = %candidate, "worker matched");
                            *slot = Some(candidate);
                        }
                    }
                }
            });
        }
    });
    hit.into_inner().unwrap()
}

/// Interpret-and-compare for one unit of work; failures are non-matches.
fn reproduces(
    candidate: &Candidate,
    bindings: &Bindings,
    target: &Frame,
    comparison: &Comparison,
) -> bool {
    match candidate.interpret(bindings) {
        Ok(result) => comparison.equal(&result, target),
        Err(_) => false,
    }
}
