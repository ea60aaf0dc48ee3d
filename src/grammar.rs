//! The candidate program grammar.
//!
//! A [`Candidate`] is one program in the search space: a binding reference,
//! a dissolve of a sub-program, a relational merge of two named bindings,
//! or a spatial join of two named bindings. The grammar is a closed set of
//! tagged variants; adding an operator means adding a variant here and the
//! compiler points at every match that must learn about it.
//!
//! A candidate is pure syntax. [`Candidate::interpret`] evaluates it
//! against a binding environment, [`fmt::Display`] renders it as the
//! equivalent operator call, and [`Candidate::dual`] produces the
//! side-swapped form of the binary operators.

use std::fmt;

use crate::bindings::Bindings;
use crate::error::{FramewrightError, Result};
use crate::frame::{Frame, JoinMode};
use crate::geom::SpatialPredicate;

/// One node of the program grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Candidate {
    /// A named binding, verbatim.
    Reference { name: String },
    /// Dissolve the result of a sub-program, grouping by one column.
    Dissolve { source: Box<Candidate>, by: String },
    /// Relational merge of two named bindings on one key column per side.
    Merge {
        left: String,
        right: String,
        how: JoinMode,
        left_on: String,
        right_on: String,
    },
    /// Spatial join of two named bindings under a geometric predicate.
    SpatialJoin {
        left: String,
        right: String,
        how: JoinMode,
        predicate: SpatialPredicate,
    },
}

impl Candidate {
    /// Evaluates the candidate against `bindings`, producing the dataset it
    /// denotes. Unknown names and operator failures surface as errors; the
    /// search layers treat any error as "this candidate does not match".
    pub fn interpret(&self, bindings: &Bindings) -> Result<Frame> {
        match self {
            Candidate::Reference { name } => {
                let frame = bindings
                    .frame(name)
                    .ok_or_else(|| FramewrightError::UnknownBinding { name: name.clone() })?;
                Ok((*frame).clone())
            }
            Candidate::Dissolve { source, by } => source.interpret(bindings)?.dissolve(by),
            Candidate::Merge {
                left,
                right,
                how,
                left_on,
                right_on,
            } => {
                let l = bindings
                    .frame(left)
                    .ok_or_else(|| FramewrightError::UnknownBinding { name: left.clone() })?;
                let r = bindings
                    .frame(right)
                    .ok_or_else(|| FramewrightError::UnknownBinding { name: right.clone() })?;
                l.merge(&r, *how, left_on, right_on)
            }
            Candidate::SpatialJoin {
                left,
                right,
                how,
                predicate,
            } => {
                let l = bindings
                    .frame(left)
                    .ok_or_else(|| FramewrightError::UnknownBinding { name: left.clone() })?;
                let r = bindings
                    .frame(right)
                    .ok_or_else(|| FramewrightError::UnknownBinding { name: right.clone() })?;
                l.sjoin(&r, *how, *predicate)
            }
        }
    }

    /// The side-swapped form of a binary candidate: operands trade places
    /// and the side-specific parameters follow them, so `left_on`/`right_on`
    /// swap, `left`/`right` modes swap, and directional predicates turn into
    /// their converse. `None` for the nullary and unary operators.
    pub fn dual(&self) -> Option<Candidate> {
        match self {
            Candidate::Merge {
                left,
                right,
                how,
                left_on,
                right_on,
            } => Some(Candidate::Merge {
                left: right.clone(),
                right: left.clone(),
                how: how.swapped(),
                left_on: right_on.clone(),
                right_on: left_on.clone(),
            }),
            Candidate::SpatialJoin {
                left,
                right,
                how,
                predicate,
            } => Some(Candidate::SpatialJoin {
                left: right.clone(),
                right: left.clone(),
                how: how.swapped(),
                predicate: predicate.converse(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Candidate::Reference { name } => write!(f, "{}", name),
            Candidate::Dissolve { source, by } => {
                write!(f, "{}.dissolve(by=\"{}\")", source, by)
            }
            Candidate::Merge {
                left,
                right,
                how,
                left_on,
                right_on,
            } => write!(
                f,
                "merge({}, {}, how=\"{}\", left_on=\"{}\", right_on=\"{}\")",
                left, right, how, left_on, right_on
            ),
            Candidate::SpatialJoin {
                left,
                right,
                how,
                predicate,
            } => write!(
                f,
                "sjoin({}, {}, how=\"{}\", predicate=\"{}\")",
                left, right, how, predicate
            ),
        }
    }
}
