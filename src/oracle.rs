//! Deep frame equality with tunable strictness.
//!
//! A [`Comparison`] bundles the knobs a caller can loosen: dtype checking,
//! geometry-type checking, CRS checking, order insensitivity, geometry
//! normalization and a numeric tolerance. [`Comparison::equal`] walks two
//! frames under those options and returns a plain `bool`; it never panics
//! and never allocates more than the row permutation an order-insensitive
//! comparison needs.
//!
//! Candidate matching during synthesis uses [`Comparison::matching`], which
//! keeps every check strict and additionally treats geometry-type
//! mismatches as inequality, so a `Polygon` result never passes for a
//! `MultiPolygon` target.

use std::collections::{HashMap, VecDeque};

use crate::frame::{Column, Frame, Value};
use crate::geom::{Geometry, RowHasher};

// ------------- Comparison options -------------

/// Options for deep frame comparison.
///
/// The defaults compare strictly except for geometry types: two cells whose
/// geometries collapse to the same shape count as equal even when one is a
/// single-member collection. Enable `check_geom_type` to make that a
/// difference.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Require identical column and index dtypes.
    pub check_dtype: bool,
    /// Require identical geometry type names cell by cell.
    pub check_geom_type: bool,
    /// Require identical coordinate reference systems.
    pub check_crs: bool,
    /// Ignore row and column order: columns pair up by name and rows pair
    /// up by index value instead of by position.
    pub check_like: bool,
    /// Normalize geometries (vertex order, ring rotation) before comparing.
    pub normalize: bool,
    /// Absolute tolerance for numeric cells and coordinates. `None`
    /// compares exactly.
    pub tolerance: Option<f64>,
}

impl Default for Comparison {
    fn default() -> Self {
        Self {
            check_dtype: true,
            check_geom_type: false,
            check_crs: true,
            check_like: false,
            normalize: false,
            tolerance: None,
        }
    }
}

impl Comparison {
    /// The strict profile candidate matching runs under: everything exact,
    /// geometry types included.
    pub fn matching() -> Self {
        Self {
            check_geom_type: true,
            ..Self::default()
        }
    }

    // ------------- Frame comparison -------------

    /// Deep equality of two frames under these options.
    pub fn equal(&self, left: &Frame, right: &Frame) -> bool {
        if self.check_crs && left.crs() != right.crs() {
            return false;
        }
        if left.row_count() != right.row_count()
            || left.columns().len() != right.columns().len()
        {
            return false;
        }
        let Some(column_pairs) = self.paired_columns(left, right) else {
            return false;
        };
        if self.check_dtype
            && column_pairs
                .iter()
                .any(|(l, r)| l.dtype != r.dtype)
        {
            return false;
        }

        // The index pairs rows up; its values always compare exactly.
        if left.index().name != right.index().name {
            return false;
        }
        if self.check_dtype && left.index().dtype != right.index().dtype {
            return false;
        }
        let Some(permutation) = self.paired_rows(left, right) else {
            return false;
        };

        for (l, r) in column_pairs {
            for (row, r_value) in r.values.iter().enumerate() {
                if !self.value_equal(&l.values[permutation[row]], r_value) {
                    return false;
                }
            }
        }
        true
    }

    /// Pairs left columns with right columns: positionally by default, by
    /// name when order-insensitive. `None` when the frames cannot pair up.
    fn paired_columns<'a>(
        &self,
        left: &'a Frame,
        right: &'a Frame,
    ) -> Option<Vec<(&'a Column, &'a Column)>> {
        if self.check_like {
            right
                .columns()
                .iter()
                .map(|r| left.column(&r.name).map(|l| (l, r)))
                .collect()
        } else {
            left.columns()
                .iter()
                .zip(right.columns().iter())
                .map(|(l, r)| (l.name == r.name).then_some((l, r)))
                .collect()
        }
    }

    /// Maps each right row to the left row it compares against. Positional
    /// by default; under `check_like` rows pair up by index value, taking
    /// duplicates in order of appearance.
    fn paired_rows(&self, left: &Frame, right: &Frame) -> Option<Vec<usize>> {
        let l_index = &left.index().values;
        let r_index = &right.index().values;
        if !self.check_like {
            return (l_index == r_index).then(|| (0..r_index.len()).collect());
        }
        let mut positions: HashMap<&Value, VecDeque<usize>, RowHasher> = HashMap::default();
        for (at, value) in l_index.iter().enumerate() {
            positions.entry(value).or_default().push_back(at);
        }
        let mut permutation = Vec::with_capacity(r_index.len());
        for value in r_index {
            permutation.push(positions.get_mut(value)?.pop_front()?);
        }
        Some(permutation)
    }

    // ------------- Cell comparison -------------

    fn value_equal(&self, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Geom(l), Value::Geom(r)) => self.geometry_equal(l, r),
            (Value::Float(l), Value::Float(r)) => {
                l.to_bits() == r.to_bits() || self.close(*l, *r)
            }
            (Value::Int(l), Value::Int(r)) => {
                l == r || self.close(*l as f64, *r as f64)
            }
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
                self.close(*i as f64, *f)
            }
            _ => left == right,
        }
    }

    fn geometry_equal(&self, left: &Geometry, right: &Geometry) -> bool {
        if self.check_geom_type && left.geometry_type() != right.geometry_type() {
            return false;
        }
        let mut left = left.collapsed();
        let mut right = right.collapsed();
        if self.normalize {
            left = left.normalized();
            right = right.normalized();
        }
        match self.tolerance {
            Some(tolerance) => left.almost_equal(&right, tolerance),
            None => left == right,
        }
    }

    fn close(&self, left: f64, right: f64) -> bool {
        match self.tolerance {
            Some(tolerance) => (left - right).abs() <= tolerance,
            None => left == right,
        }
    }
}
