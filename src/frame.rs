//! Typed tabular frames with an optional geometry column.
//!
//! A [`Frame`] is an ordered set of named, uniformly typed columns plus an
//! explicit row index. The index is itself a value column: freshly built
//! frames carry an unnamed 0..n integer range, and a dissolve installs the
//! group key there. Frames are immutable once built; the three relational
//! operations return new frames.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::BuildHasherDefault;
use std::ops;
use std::str::FromStr;
use std::sync::OnceLock;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use seahash::SeaHasher;

use crate::error::{FramewrightError, Result};
use crate::geom::{Bounds, Geometry, RowHasher, SpatialIndex, SpatialPredicate};

/// Hasher for name-keyed maps.
pub type NameHasher = BuildHasherDefault<SeaHasher>;

// ------------- Decimal -------------
/// Arbitrary-precision decimal column value.
#[derive(Eq, PartialEq, Hash, PartialOrd, Ord, Clone, Debug)]
pub struct Decimal(BigDecimal);

impl Decimal {
    pub fn from_str(s: &str) -> Option<Decimal> {
        match BigDecimal::from_str(s) {
            Ok(decimal) => Some(Decimal(decimal)),
            Err(_) => None,
        }
    }
}
impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl ops::Deref for Decimal {
    type Target = BigDecimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ------------- Dtype and Value -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dtype {
    Int,
    Float,
    Bool,
    Text,
    Date,
    Decimal,
    Geometry,
}

impl Dtype {
    pub fn name(&self) -> &'static str {
        match self {
            Dtype::Int => "int",
            Dtype::Float => "float",
            Dtype::Bool => "bool",
            Dtype::Text => "text",
            Dtype::Date => "date",
            Dtype::Decimal => "decimal",
            Dtype::Geometry => "geometry",
        }
    }
}
impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single cell. `Null` belongs to every dtype.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDate),
    Decimal(Decimal),
    Geom(Geometry),
}

impl Value {
    pub fn dtype(&self) -> Option<Dtype> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(Dtype::Int),
            Value::Float(_) => Some(Dtype::Float),
            Value::Bool(_) => Some(Dtype::Bool),
            Value::Text(_) => Some(Dtype::Text),
            Value::Date(_) => Some(Dtype::Date),
            Value::Decimal(_) => Some(Dtype::Decimal),
            Value::Geom(_) => Some(Dtype::Geometry),
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
    pub fn as_geometry(&self) -> Option<&Geometry> {
        match self {
            Value::Geom(g) => Some(g),
            _ => None,
        }
    }
}

// Floats compare and hash bitwise so that values can key join maps; the
// oracle applies numeric tolerance separately when asked to.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Geom(a), Value::Geom(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Value {}
impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => (),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Text(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Decimal(d) => d.hash(state),
            Value::Geom(g) => g.hash(state),
        }
    }
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Geom(g) => write!(f, "{}", g),
        }
    }
}

// ------------- Column -------------
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub dtype: Dtype,
    pub values: Vec<Value>,
}

impl Column {
    /// A column rejects values of a foreign dtype; nulls always pass.
    pub fn new(name: impl Into<String>, dtype: Dtype, values: Vec<Value>) -> Result<Column> {
        let name = name.into();
        for v in &values {
            if let Some(found) = v.dtype() {
                if found != dtype {
                    return Err(FramewrightError::Type(format!(
                        "column {} holds {} where {} was declared",
                        name, found, dtype
                    )));
                }
            }
        }
        Ok(Column { name, dtype, values })
    }

    /// The default unnamed 0..n index.
    pub fn range_index(len: usize) -> Column {
        Column {
            name: String::new(),
            dtype: Dtype::Int,
            values: (0..len as i64).map(Value::Int).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ------------- Join modes -------------

/// How a join decides which rows survive. There is deliberately no `cross`
/// mode: a cross join takes no key columns, so it fits neither the merge
/// nor the spatial operator shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JoinMode {
    Left,
    Right,
    Inner,
    Outer,
}

impl JoinMode {
    /// Modes a relational merge enumerates, in enumeration order.
    pub const MERGE: [JoinMode; 4] =
        [JoinMode::Left, JoinMode::Right, JoinMode::Inner, JoinMode::Outer];
    /// Modes a spatial join enumerates, in enumeration order.
    pub const SPATIAL: [JoinMode; 3] = [JoinMode::Left, JoinMode::Right, JoinMode::Inner];

    pub fn name(&self) -> &'static str {
        match self {
            JoinMode::Left => "left",
            JoinMode::Right => "right",
            JoinMode::Inner => "inner",
            JoinMode::Outer => "outer",
        }
    }

    /// The mode that keeps the same side's rows after the operands trade
    /// places: `left` and `right` swap, `inner` and `outer` are symmetric.
    pub fn swapped(&self) -> JoinMode {
        match self {
            JoinMode::Left => JoinMode::Right,
            JoinMode::Right => JoinMode::Left,
            other => *other,
        }
    }
}
impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ------------- Frame -------------
#[derive(Debug, Clone)]
pub struct Frame {
    columns: Vec<Column>,
    index: Column,
    crs: Option<String>,
    geometry_column: Option<String>,
    sindex: OnceLock<SpatialIndex>,
}

impl Frame {
    /// Builds a frame over equal-length, uniquely named columns with a
    /// fresh range index.
    pub fn new(columns: Vec<Column>) -> Result<Frame> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        let mut seen: HashSet<&str, NameHasher> = HashSet::default();
        for c in &columns {
            if c.len() != rows {
                return Err(FramewrightError::Type(format!(
                    "column {} has {} rows where {} were expected",
                    c.name,
                    c.len(),
                    rows
                )));
            }
            if !seen.insert(&c.name) {
                return Err(FramewrightError::Type(format!("duplicate column name {}", c.name)));
            }
        }
        Ok(Frame {
            index: Column::range_index(rows),
            columns,
            crs: None,
            geometry_column: None,
            sindex: OnceLock::new(),
        })
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Frame {
        self.crs = Some(crs.into());
        self
    }

    pub fn with_geometry(mut self, column: &str) -> Result<Frame> {
        match self.column(column) {
            Some(c) if c.dtype == Dtype::Geometry => {
                self.geometry_column = Some(column.to_owned());
                Ok(self)
            }
            Some(c) => Err(FramewrightError::Type(format!(
                "geometry column {} has dtype {}",
                column, c.dtype
            ))),
            None => Err(FramewrightError::MissingColumn {
                frame: "frame".to_owned(),
                column: column.to_owned(),
            }),
        }
    }

    pub fn with_index(mut self, index: Column) -> Result<Frame> {
        if index.len() != self.row_count() {
            return Err(FramewrightError::Type(format!(
                "index has {} rows where {} were expected",
                index.len(),
                self.row_count()
            )));
        }
        self.index = index;
        Ok(self)
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
    pub fn dtype_of(&self, name: &str) -> Option<Dtype> {
        self.column(name).map(|c| c.dtype)
    }
    pub fn index(&self) -> &Column {
        &self.index
    }
    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }
    pub fn geometry_column(&self) -> Option<&str> {
        self.geometry_column.as_deref()
    }

    /// Column names grouped by dtype; names sorted for stable enumeration.
    pub fn columns_by_dtype(&self) -> BTreeMap<Dtype, BTreeSet<String>> {
        let mut map: BTreeMap<Dtype, BTreeSet<String>> = BTreeMap::new();
        for c in &self.columns {
            map.entry(c.dtype).or_default().insert(c.name.clone());
        }
        map
    }

    /// Content digest over shape, index and cells. Used in logs and test
    /// assertions, never as an equality decision.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        let mut feed = |part: &str| {
            hasher.update(part.as_bytes());
            hasher.update(&[0x1f]);
        };
        feed(&self.index.name);
        feed(self.index.dtype.name());
        for v in &self.index.values {
            feed(&v.to_string());
        }
        for c in &self.columns {
            feed(&c.name);
            feed(c.dtype.name());
            for v in &c.values {
                feed(&v.to_string());
            }
        }
        feed(self.crs.as_deref().unwrap_or(""));
        feed(self.geometry_column.as_deref().unwrap_or(""));
        hasher.finalize()
    }

    fn geometry_at(&self, row: usize) -> Option<&Geometry> {
        let name = self.geometry_column.as_deref()?;
        self.column(name)?.values.get(row)?.as_geometry()
    }

    /// The grid index over the geometry column, built on first use.
    pub fn spatial_index(&self) -> Result<&SpatialIndex> {
        if self.geometry_column.is_none() {
            return Err(FramewrightError::NoGeometry { frame: "frame".to_owned() });
        }
        if self.sindex.get().is_none() {
            let mut rows: Vec<(u64, Bounds)> = Vec::new();
            for row in 0..self.row_count() {
                if let Some(b) = self.geometry_at(row).and_then(Geometry::bounds) {
                    rows.push((row as u64, b));
                }
            }
            let _ = self.sindex.set(SpatialIndex::build(&rows));
        }
        self.sindex
            .get()
            .ok_or_else(|| FramewrightError::Invariant("spatial index initialization".to_owned()))
    }

    // ------------- merge -------------
    /// Relational join on key equality. Null keys never match; integer and
    /// float keys unify through float promotion; overlapping column names
    /// (the keys included) get `_x`/`_y` suffixes; the result carries a
    /// fresh range index and the left side's CRS and geometry when present.
    pub fn merge(
        &self,
        right: &Frame,
        how: JoinMode,
        left_on: &str,
        right_on: &str,
    ) -> Result<Frame> {
        let lcol = self.column(left_on).ok_or_else(|| FramewrightError::MissingColumn {
            frame: "left".to_owned(),
            column: left_on.to_owned(),
        })?;
        let rcol = right.column(right_on).ok_or_else(|| FramewrightError::MissingColumn {
            frame: "right".to_owned(),
            column: right_on.to_owned(),
        })?;
        let promote = match (lcol.dtype, rcol.dtype) {
            (a, b) if a == b => false,
            (Dtype::Int, Dtype::Float) | (Dtype::Float, Dtype::Int) => true,
            (a, b) => {
                return Err(FramewrightError::KeyTypeMismatch {
                    left: a.to_string(),
                    right: b.to_string(),
                });
            }
        };
        let key_of = |v: &Value| -> Option<Value> {
            if v.is_null() {
                return None;
            }
            if promote {
                if let Some(f) = v.as_f64() {
                    return Some(Value::Float(f));
                }
            }
            Some(v.clone())
        };

        let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::new();
        match how {
            JoinMode::Right => {
                let mut by_key: HashMap<Value, Vec<usize>, RowHasher> = HashMap::default();
                for (row, v) in lcol.values.iter().enumerate() {
                    if let Some(k) = key_of(v) {
                        by_key.entry(k).or_default().push(row);
                    }
                }
                for (row, v) in rcol.values.iter().enumerate() {
                    match key_of(v).and_then(|k| by_key.get(&k)) {
                        Some(ls) => pairs.extend(ls.iter().map(|l| (Some(*l), Some(row)))),
                        None => pairs.push((None, Some(row))),
                    }
                }
            }
            _ => {
                let mut by_key: HashMap<Value, Vec<usize>, RowHasher> = HashMap::default();
                for (row, v) in rcol.values.iter().enumerate() {
                    if let Some(k) = key_of(v) {
                        by_key.entry(k).or_default().push(row);
                    }
                }
                let mut right_hit = vec![false; rcol.len()];
                for (row, v) in lcol.values.iter().enumerate() {
                    match key_of(v).and_then(|k| by_key.get(&k)) {
                        Some(rs) => {
                            for r in rs {
                                right_hit[*r] = true;
                                pairs.push((Some(row), Some(*r)));
                            }
                        }
                        None if how != JoinMode::Inner => pairs.push((Some(row), None)),
                        None => (),
                    }
                }
                if how == JoinMode::Outer {
                    for (row, hit) in right_hit.iter().enumerate() {
                        if !hit {
                            pairs.push((None, Some(row)));
                        }
                    }
                }
            }
        }

        let left_picks: Vec<Option<usize>> = pairs.iter().map(|(l, _)| *l).collect();
        let right_picks: Vec<Option<usize>> = pairs.iter().map(|(_, r)| *r).collect();
        let suffix =
            |c: &Column, other: &Frame, tag: &str| -> String {
                if other.column(&c.name).is_some() {
                    format!("{}{}", c.name, tag)
                } else {
                    c.name.clone()
                }
            };

        let mut columns = Vec::with_capacity(self.columns.len() + right.columns.len());
        let mut renamed: HashMap<(bool, String), String, NameHasher> = HashMap::default();
        for c in &self.columns {
            let name = suffix(c, right, "_x");
            renamed.insert((false, c.name.clone()), name.clone());
            columns.push(Column { name, dtype: c.dtype, values: picked(&c.values, &left_picks) });
        }
        for c in &right.columns {
            let name = suffix(c, self, "_y");
            renamed.insert((true, c.name.clone()), name.clone());
            columns.push(Column { name, dtype: c.dtype, values: picked(&c.values, &right_picks) });
        }

        let geometry = self
            .geometry_column
            .as_ref()
            .and_then(|g| renamed.get(&(false, g.clone())))
            .or_else(|| {
                right.geometry_column.as_ref().and_then(|g| renamed.get(&(true, g.clone())))
            })
            .cloned();
        let crs = self.crs.clone().or_else(|| right.crs.clone());

        let mut out = Frame::new(columns)?;
        if let Some(crs) = crs {
            out = out.with_crs(crs);
        }
        match geometry {
            Some(g) => out.with_geometry(&g),
            None => Ok(out),
        }
    }

    // ------------- dissolve -------------
    /// Groups rows by `by` in order of first appearance, merges each
    /// group's geometry into one shape and keeps the first non-null value
    /// of every other column. The group key becomes the row index; rows
    /// with a null key are dropped.
    pub fn dissolve(&self, by: &str) -> Result<Frame> {
        let key = self.column(by).ok_or_else(|| FramewrightError::MissingColumn {
            frame: "frame".to_owned(),
            column: by.to_owned(),
        })?;
        let geometry_name = self
            .geometry_column
            .clone()
            .ok_or_else(|| FramewrightError::NoGeometry { frame: "dissolve input".to_owned() })?;
        if by == geometry_name {
            return Err(FramewrightError::GeometryKey { column: by.to_owned() });
        }

        let mut group_of: HashMap<Value, usize, RowHasher> = HashMap::default();
        let mut group_keys: Vec<Value> = Vec::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (row, v) in key.values.iter().enumerate() {
            if v.is_null() {
                continue;
            }
            let slot = *group_of.entry(v.clone()).or_insert_with(|| {
                group_keys.push(v.clone());
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(row);
        }

        let geom_col = self.column(&geometry_name).ok_or_else(|| {
            FramewrightError::Invariant(format!("geometry column {} lost", geometry_name))
        })?;
        let mut merged_geoms = Vec::with_capacity(groups.len());
        for group in &groups {
            let shapes: Vec<Geometry> = group
                .iter()
                .filter_map(|row| geom_col.values[*row].as_geometry().cloned())
                .collect();
            merged_geoms.push(match Geometry::merged(&shapes) {
                Some(g) => Value::Geom(g),
                None => Value::Null,
            });
        }

        // Geometry leads the dissolved frame, then the surviving columns
        // in their original order.
        let mut columns = vec![Column {
            name: geometry_name.clone(),
            dtype: Dtype::Geometry,
            values: merged_geoms,
        }];
        for c in &self.columns {
            if c.name == by || c.name == geometry_name {
                continue;
            }
            let values = groups
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|row| &c.values[*row])
                        .find(|v| !v.is_null())
                        .cloned()
                        .unwrap_or(Value::Null)
                })
                .collect();
            columns.push(Column { name: c.name.clone(), dtype: c.dtype, values });
        }

        let index = Column { name: by.to_owned(), dtype: key.dtype, values: group_keys };
        let mut out = Frame::new(columns)?.with_index(index)?;
        if let Some(crs) = self.crs.clone() {
            out = out.with_crs(crs);
        }
        out.with_geometry(&geometry_name)
    }

    // ------------- sjoin -------------
    /// Spatial join: pairs rows whose geometries satisfy `predicate`
    /// (always relating left to right). Candidates come from the other
    /// side's grid index, the exact test runs after. The non-driving
    /// side's geometry is dropped, overlapping names get `_left`/`_right`
    /// suffixes and a column of the matched opposite-side index values is
    /// added between the two sides.
    pub fn sjoin(
        &self,
        right: &Frame,
        how: JoinMode,
        predicate: SpatialPredicate,
    ) -> Result<Frame> {
        if !JoinMode::SPATIAL.contains(&how) {
            return Err(FramewrightError::Invariant(format!("spatial join mode {}", how)));
        }
        if self.geometry_column.is_none() {
            return Err(FramewrightError::NoGeometry { frame: "sjoin left side".to_owned() });
        }
        if right.geometry_column.is_none() {
            return Err(FramewrightError::NoGeometry { frame: "sjoin right side".to_owned() });
        }
        if let (Some(l), Some(r)) = (&self.crs, &right.crs) {
            if l != r {
                return Err(FramewrightError::CrsMismatch { left: l.clone(), right: r.clone() });
            }
        }

        let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::new();
        if how == JoinMode::Right {
            let index = self.spatial_index()?;
            for row in 0..right.row_count() {
                let matches: Vec<usize> = match right.geometry_at(row) {
                    Some(g) => candidate_rows(index, g)
                        .into_iter()
                        .filter(|l| {
                            self.geometry_at(*l)
                                .map(|lg| predicate.evaluate(lg, g))
                                .unwrap_or(false)
                        })
                        .collect(),
                    None => Vec::new(),
                };
                if matches.is_empty() {
                    pairs.push((None, Some(row)));
                } else {
                    pairs.extend(matches.into_iter().map(|l| (Some(l), Some(row))));
                }
            }
        } else {
            let index = right.spatial_index()?;
            for row in 0..self.row_count() {
                let matches: Vec<usize> = match self.geometry_at(row) {
                    Some(g) => candidate_rows(index, g)
                        .into_iter()
                        .filter(|r| {
                            right
                                .geometry_at(*r)
                                .map(|rg| predicate.evaluate(g, rg))
                                .unwrap_or(false)
                        })
                        .collect(),
                    None => Vec::new(),
                };
                if matches.is_empty() {
                    if how == JoinMode::Left {
                        pairs.push((Some(row), None));
                    }
                } else {
                    pairs.extend(matches.into_iter().map(|r| (Some(row), Some(r))));
                }
            }
        }

        let left_picks: Vec<Option<usize>> = pairs.iter().map(|(l, _)| *l).collect();
        let right_picks: Vec<Option<usize>> = pairs.iter().map(|(_, r)| *r).collect();
        let drop_left_geometry = how == JoinMode::Right;
        let kept_left: Vec<&Column> = self
            .columns
            .iter()
            .filter(|c| !(drop_left_geometry && Some(c.name.as_str()) == self.geometry_column()))
            .collect();
        let kept_right: Vec<&Column> = right
            .columns
            .iter()
            .filter(|c| drop_left_geometry || Some(c.name.as_str()) != right.geometry_column())
            .collect();
        let overlap: HashSet<&str, NameHasher> = kept_left
            .iter()
            .map(|c| c.name.as_str())
            .filter(|n| kept_right.iter().any(|c| c.name == *n))
            .collect();
        let renamed = |c: &Column, tag: &str| -> String {
            if overlap.contains(c.name.as_str()) {
                format!("{}_{}", c.name, tag)
            } else {
                c.name.clone()
            }
        };

        let mut columns = Vec::with_capacity(kept_left.len() + kept_right.len() + 1);
        let mut geometry_out: Option<String> = None;
        for c in &kept_left {
            let name = renamed(c, "left");
            if !drop_left_geometry && Some(c.name.as_str()) == self.geometry_column() {
                geometry_out = Some(name.clone());
            }
            columns.push(Column { name, dtype: c.dtype, values: picked(&c.values, &left_picks) });
        }
        if how == JoinMode::Right {
            columns.push(Column {
                name: "index_left".to_owned(),
                dtype: self.index.dtype,
                values: picked(&self.index.values, &left_picks),
            });
        } else {
            columns.push(Column {
                name: "index_right".to_owned(),
                dtype: right.index.dtype,
                values: picked(&right.index.values, &right_picks),
            });
        }
        for c in &kept_right {
            let name = renamed(c, "right");
            if drop_left_geometry && Some(c.name.as_str()) == right.geometry_column() {
                geometry_out = Some(name.clone());
            }
            columns.push(Column { name, dtype: c.dtype, values: picked(&c.values, &right_picks) });
        }

        let crs = if drop_left_geometry {
            right.crs.clone().or_else(|| self.crs.clone())
        } else {
            self.crs.clone().or_else(|| right.crs.clone())
        };
        let mut out = Frame::new(columns)?;
        if let Some(crs) = crs {
            out = out.with_crs(crs);
        }
        match geometry_out {
            Some(g) => out.with_geometry(&g),
            None => Ok(out),
        }
    }
}

/// Gathers `values` by row picks, padding missing picks with nulls.
fn picked(values: &[Value], picks: &[Option<usize>]) -> Vec<Value> {
    picks
        .iter()
        .map(|p| match p {
            Some(row) => values[*row].clone(),
            None => Value::Null,
        })
        .collect()
}

/// Grid candidates for one probe geometry, ascending by row.
fn candidate_rows(index: &SpatialIndex, probe: &Geometry) -> Vec<usize> {
    match probe.bounds() {
        Some(b) => index.query(&b).iter().map(|row| row as usize).collect(),
        None => Vec::new(),
    }
}
