//! The synthesis driver: walks the program stream and tests each candidate
//! against the target.
//!
//! A [`Synthesizer`] borrows a binding environment and a target frame and
//! offers three policies over the same stream order: [`find_first`] stops
//! at the first match, [`find_all`] drains the whole stream, and [`traced`]
//! exposes every attempt as it happens so a caller can report progress.
//! A candidate whose interpretation fails simply does not match; only
//! infrastructure failures (a panicking worker, a poisoned lock) escape.
//!
//! [`find_first`]: Synthesizer::find_first
//! [`find_all`]: Synthesizer::find_all
//! [`traced`]: Synthesizer::traced

use std::time::Instant;

use tracing::{debug, info};

use crate::bindings::Bindings;
use crate::frame::Frame;
use crate::generate::{self, Interleave};
use crate::grammar::Candidate;
use crate::oracle::Comparison;

// ------------- Attempts -------------

/// One step of a traced search: the 1-based position of the candidate in
/// stream order, the candidate itself, and whether it matched the target.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub ordinal: usize,
    pub candidate: Candidate,
    pub matched: bool,
}

// ------------- Synthesizer -------------

/// Drives a synthesis run over one binding environment and one target.
pub struct Synthesizer<'a> {
    bindings: &'a Bindings,
    target: &'a Frame,
    comparison: Comparison,
    prune_unary_tier: bool,
}

impl<'a> Synthesizer<'a> {
    pub fn new(bindings: &'a Bindings, target: &'a Frame) -> Self {
        Self {
            bindings,
            target,
            comparison: Comparison::matching(),
            prune_unary_tier: false,
        }
    }

    /// Runs the reference and dissolve tiers through the observational
    /// equivalence pruner before searching. Off by default: pruning spends
    /// an interpretation per comparison, which only pays off when the same
    /// stream prefix is walked many times.
    pub fn with_pruning(mut self) -> Self {
        self.prune_unary_tier = true;
        self
    }

    /// Whether one candidate reproduces the target. Interpretation failures
    /// are ordinary non-matches.
    fn matches(&self, candidate: &Candidate) -> bool {
        match candidate.interpret(self.bindings) {
            Ok(result) => self.comparison.equal(&result, self.target),
            Err(error) => {
                debug!(candidate = %candidate, error = %error, "candidate rejected");
                false
            }
        }
    }

    fn stream(&self) -> Box<dyn Iterator<Item = Candidate> + '_> {
        if self.prune_unary_tier {
            let tier: Vec<Candidate> = generate::references(self.bindings)
                .chain(generate::dissolves(self.bindings))
                .collect();
            let tier = retain_distinct(tier, self.bindings, &self.comparison);
            Box::new(tier.into_iter().chain(Interleave::new(
                generate::merges(self.bindings),
                generate::spatial_joins(self.bindings),
            )))
        } else {
            Box::new(generate::programs(self.bindings))
        }
    }

    // ------------- Policies -------------

    /// The first candidate in stream order that reproduces the target, or
    /// `None` once the stream is exhausted.
    pub fn find_first(&self) -> Option<Candidate> {
        let started = Instant::now();
        debug!(target = %self.target.fingerprint(), "searching");
        let mut attempts = 0;
        for attempt in self.traced() {
            attempts = attempt.ordinal;
            if attempt.matched {
                info!(
                    attempts,
                    elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                    program = %attempt.candidate,
                    "program found"
                );
                return Some(attempt.candidate);
            }
        }
        info!(
            attempts,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "no program found"
        );
        None
    }

    /// Every candidate that reproduces the target, in stream order. Drains
    /// the entire stream; on wide environments this takes a while.
    pub fn find_all(&self) -> Vec<Candidate> {
        let started = Instant::now();
        let mut attempts = 0;
        let mut matches = Vec::new();
        for candidate in self.stream() {
            attempts += 1;
            if self.matches(&candidate) {
                debug!(program = %candidate, "match");
                matches.push(candidate);
            }
        }
        info!(
            attempts,
            matches = matches.len(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "exhaustive search complete"
        );
        matches
    }

    /// Lazily yields one [`Attempt`] per examined candidate and ends right
    /// after the first match. Interpretation happens as the caller pulls,
    /// so progress can be reported while the search runs.
    pub fn traced(&self) -> impl Iterator<Item = Attempt> + '_ {
        let mut stream = self.stream().enumerate();
        let mut done = false;
        std::iter::from_fn(move || {
            if done {
                return None;
            }
            let (at, candidate) = stream.next()?;
            let matched = self.matches(&candidate);
            done = matched;
            Some(Attempt {
                ordinal: at + 1,
                candidate,
                matched,
            })
        })
    }
}

// ------------- Observational equivalence pruning -------------

/// Whether some accepted candidate already produces the same dataset as
/// `candidate` over `bindings`. A candidate that fails to interpret is
/// never considered covered, so it survives pruning and fails later, where
/// the failure is visible to the search.
pub fn already_covered(
    accepted: &[Candidate],
    candidate: &Candidate,
    bindings: &Bindings,
    comparison: &Comparison,
) -> bool {
    let Ok(output) = candidate.interpret(bindings) else {
        return false;
    };
    accepted.iter().any(|kept| match kept.interpret(bindings) {
        Ok(existing) => comparison.equal(&output, &existing),
        Err(_) => false,
    })
}

/// Keeps the first candidate of every observational equivalence class, in
/// input order. Each decision re-interprets the candidates it compares, so
/// this is quadratic in interpretations and meant for small tiers.
pub fn retain_distinct(
    candidates: Vec<Candidate>,
    bindings: &Bindings,
    comparison: &Comparison,
) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if already_covered(&kept, &candidate, bindings, comparison) {
            debug!(candidate = %candidate, "observationally equivalent, dropped");
            continue;
        }
        kept.push(candidate);
    }
    kept
}
