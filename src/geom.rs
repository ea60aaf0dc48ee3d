//! Lite planar geometry for geospatial frames.
//!
//! Framewright does not embed a full computational-geometry suite. It carries
//! exactly what spatial joins, grouped dissolves and the equality oracle
//! need: a small closed set of shapes, WKT in both directions, bounding
//! boxes, the five join predicates, and a uniform-grid index whose posting
//! lists are roaring bitmaps.
//!
//! All predicate evaluation is exact for the shapes we support (points,
//! multipoints, open linestrings and unholed polygons), with two documented
//! simplifications: a primitive is `within` a collection only when a single
//! element contains it, and collinear pass-through of a polyline vertex over
//! another line's interior is not detected as interior contact.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasherDefault, Hash, Hasher};

use lazy_static::lazy_static;
use regex::Regex;
use roaring::RoaringTreemap;
use seahash::SeaHasher;

use crate::error::{FramewrightError, Result};

/// Hasher for row/cell keyed maps.
pub type RowHasher = BuildHasherDefault<SeaHasher>;

fn geometry_error(message: impl Into<String>) -> FramewrightError {
    FramewrightError::Geometry { message: message.into() }
}

// ------------- Point -------------
#[derive(Debug, Clone, Copy)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// Coordinates are compared bitwise so that points can key hash sets.
// Parsed WKT never produces NaN, which keeps this reflexive in practice.
impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }
}
impl Eq for Point {}
impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
    }
}
impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.x, self.y)
    }
}

// ------------- Bounds -------------
/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn of_point(p: Point) -> Self {
        Self { min_x: p.x, min_y: p.y, max_x: p.x, max_y: p.y }
    }
    pub fn expand(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }
    pub fn merge(&mut self, other: &Bounds) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

// ------------- Geometry -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Geometry {
    Point(Point),
    MultiPoint(Vec<Point>),
    LineString(Vec<Point>),
    /// Exterior ring without the repeated closing vertex.
    Polygon(Vec<Point>),
    /// Heterogeneous collection, also the result of a dissolve merge.
    Multi(Vec<Geometry>),
}

impl Geometry {
    /// Stable geometry-type name, as the oracle's geometry-type check sees it.
    pub fn geometry_type(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::Multi(_) => "GeometryCollection",
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            Geometry::Point(p) => Some(Bounds::of_point(*p)),
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) | Geometry::Polygon(ps) => {
                let mut iter = ps.iter();
                let mut b = Bounds::of_point(*iter.next()?);
                for p in iter {
                    b.expand(*p);
                }
                Some(b)
            }
            Geometry::Multi(gs) => {
                let mut acc: Option<Bounds> = None;
                for g in gs {
                    if let Some(b) = g.bounds() {
                        match acc.as_mut() {
                            Some(a) => a.merge(&b),
                            None => acc = Some(b),
                        }
                    }
                }
                acc
            }
        }
    }

    /// Topological dimension: 0 for points, 1 for lines, 2 for polygons.
    pub fn dimension(&self) -> u8 {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => 0,
            Geometry::LineString(_) => 1,
            Geometry::Polygon(_) => 2,
            Geometry::Multi(gs) => gs.iter().map(Geometry::dimension).max().unwrap_or(0),
        }
    }

    /// Merge a group of shapes into one, the way a dissolve combines the
    /// geometry column: a single survivor stays itself, an all-point group
    /// becomes a multipoint, anything else a collection.
    pub fn merged(shapes: &[Geometry]) -> Option<Geometry> {
        let mut flat = Vec::new();
        for s in shapes {
            match s {
                Geometry::Multi(gs) => flat.extend(gs.iter().cloned()),
                other => flat.push(other.clone()),
            }
        }
        match flat.len() {
            0 => None,
            1 => Some(flat.remove(0)),
            _ => {
                if flat.iter().all(|g| matches!(g, Geometry::Point(_))) {
                    let points = flat
                        .iter()
                        .map(|g| match g {
                            Geometry::Point(p) => *p,
                            _ => unreachable!(),
                        })
                        .collect();
                    Some(Geometry::MultiPoint(points))
                } else {
                    Some(Geometry::Multi(flat))
                }
            }
        }
    }

    /// Unwraps single-member collections: a one-shape collection collapses
    /// to that shape, a one-point multipoint to that point. Shapes that
    /// differ only in such wrapping describe the same figure.
    pub fn collapsed(&self) -> Geometry {
        match self {
            Geometry::Multi(gs) if gs.len() == 1 => gs[0].collapsed(),
            Geometry::MultiPoint(ps) if ps.len() == 1 => Geometry::Point(ps[0]),
            other => other.clone(),
        }
    }

    /// Canonical form used by order-normalizing comparisons: multipoints
    /// sorted, linestrings directed from their lesser endpoint, polygon
    /// rings counterclockwise and rotated to their lexicographic minimum.
    pub fn normalized(&self) -> Geometry {
        match self {
            Geometry::Point(p) => Geometry::Point(*p),
            Geometry::MultiPoint(ps) => {
                let mut sorted = ps.clone();
                sorted.sort_by(cmp_points);
                Geometry::MultiPoint(sorted)
            }
            Geometry::LineString(ps) => {
                let mut line = ps.clone();
                if let (Some(first), Some(last)) = (line.first(), line.last()) {
                    if cmp_points(last, first) == Ordering::Less {
                        line.reverse();
                    }
                }
                Geometry::LineString(line)
            }
            Geometry::Polygon(ring) => {
                let mut ring = ring.clone();
                if signed_area(&ring) < 0.0 {
                    ring.reverse();
                }
                if let Some(start) = ring
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| cmp_points(a, b))
                    .map(|(i, _)| i)
                {
                    ring.rotate_left(start);
                }
                Geometry::Polygon(ring)
            }
            Geometry::Multi(gs) => Geometry::Multi(gs.iter().map(Geometry::normalized).collect()),
        }
    }

    /// Coordinate-wise comparison within a tolerance; shapes must agree
    /// structurally (same variant, same vertex counts).
    pub fn almost_equal(&self, other: &Geometry, tolerance: f64) -> bool {
        match (self, other) {
            (Geometry::Point(a), Geometry::Point(b)) => close(*a, *b, tolerance),
            (Geometry::MultiPoint(a), Geometry::MultiPoint(b))
            | (Geometry::LineString(a), Geometry::LineString(b))
            | (Geometry::Polygon(a), Geometry::Polygon(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(p, q)| close(*p, *q, tolerance))
            }
            (Geometry::Multi(a), Geometry::Multi(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(g, h)| g.almost_equal(h, tolerance))
            }
            _ => false,
        }
    }
}

fn close(a: Point, b: Point, tolerance: f64) -> bool {
    (a.x - b.x).abs() <= tolerance && (a.y - b.y).abs() <= tolerance
}

fn cmp_points(a: &Point, b: &Point) -> Ordering {
    a.x.partial_cmp(&b.x)
        .unwrap_or(Ordering::Equal)
        .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
}

// ------------- WKT -------------
lazy_static! {
    static ref WKT_HEAD: Regex = Regex::new(r"(?s)^\s*([A-Za-z]+)\s*\((.*)\)\s*$").unwrap();
    static ref COORD_PAIR: Regex = Regex::new(
        r"^\s*(-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)\s+(-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)\s*$"
    )
    .unwrap();
}

impl Geometry {
    pub fn from_wkt(text: &str) -> Result<Geometry> {
        let caps = WKT_HEAD
            .captures(text)
            .ok_or_else(|| geometry_error(format!("not a WKT literal: {}", text.trim())))?;
        let tag = caps.get(1).unwrap().as_str().to_ascii_uppercase();
        let body = caps.get(2).unwrap().as_str();
        match tag.as_str() {
            "POINT" => Ok(Geometry::Point(parse_coord(body)?)),
            "MULTIPOINT" => Ok(Geometry::MultiPoint(parse_coord_list(body)?)),
            "LINESTRING" => {
                let points = parse_coord_list(body)?;
                if points.len() < 2 {
                    return Err(geometry_error("LINESTRING needs at least two points"));
                }
                Ok(Geometry::LineString(points))
            }
            "POLYGON" => {
                let ring = strip_parens(body)
                    .ok_or_else(|| geometry_error("POLYGON body must be parenthesized"))?;
                let mut points = parse_coord_list(ring)?;
                if points.len() > 1 && points.first() == points.last() {
                    points.pop();
                }
                if points.len() < 3 {
                    return Err(geometry_error("POLYGON ring needs at least three points"));
                }
                Ok(Geometry::Polygon(points))
            }
            "GEOMETRYCOLLECTION" => {
                let mut members = Vec::new();
                for part in split_top_level(body) {
                    members.push(Geometry::from_wkt(part)?);
                }
                if members.is_empty() {
                    return Err(geometry_error("empty GEOMETRYCOLLECTION"));
                }
                Ok(Geometry::Multi(members))
            }
            other => Err(geometry_error(format!("unsupported WKT type: {}", other))),
        }
    }
}

fn parse_coord(text: &str) -> Result<Point> {
    let text = strip_parens(text).unwrap_or(text);
    let caps = COORD_PAIR
        .captures(text)
        .ok_or_else(|| geometry_error(format!("bad coordinate pair: {}", text.trim())))?;
    // The pattern only admits number syntax, so the parses cannot fail.
    let x = caps.get(1).unwrap().as_str().parse::<f64>().unwrap();
    let y = caps.get(2).unwrap().as_str().parse::<f64>().unwrap();
    Ok(Point::new(x, y))
}

fn parse_coord_list(body: &str) -> Result<Vec<Point>> {
    split_top_level(body).into_iter().map(parse_coord).collect()
}

/// Strips one level of surrounding parentheses, if present.
fn strip_parens(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('(') && trimmed.ends_with(')') {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

/// Splits on commas that sit outside any parentheses.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => (),
        }
    }
    parts.push(&body[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Geometry::Point(p) => write!(f, "POINT ({})", p),
            Geometry::MultiPoint(ps) => {
                write!(f, "MULTIPOINT (")?;
                write_points(f, ps)?;
                write!(f, ")")
            }
            Geometry::LineString(ps) => {
                write!(f, "LINESTRING (")?;
                write_points(f, ps)?;
                write!(f, ")")
            }
            Geometry::Polygon(ring) => {
                write!(f, "POLYGON ((")?;
                write_points(f, ring)?;
                if let Some(first) = ring.first() {
                    write!(f, ", {}", first)?;
                }
                write!(f, "))")
            }
            Geometry::Multi(gs) => {
                write!(f, "GEOMETRYCOLLECTION (")?;
                for (i, g) in gs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", g)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_points(f: &mut fmt::Formatter, points: &[Point]) -> fmt::Result {
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", p)?;
    }
    Ok(())
}

// ------------- Spatial predicates -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpatialPredicate {
    Intersects,
    Within,
    Contains,
    Touches,
    Overlaps,
}

impl SpatialPredicate {
    pub const ALL: [SpatialPredicate; 5] = [
        SpatialPredicate::Intersects,
        SpatialPredicate::Within,
        SpatialPredicate::Contains,
        SpatialPredicate::Touches,
        SpatialPredicate::Overlaps,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SpatialPredicate::Intersects => "intersects",
            SpatialPredicate::Within => "within",
            SpatialPredicate::Contains => "contains",
            SpatialPredicate::Touches => "touches",
            SpatialPredicate::Overlaps => "overlaps",
        }
    }

    /// The predicate relating the operands in the opposite direction:
    /// `within` and `contains` trade places, the symmetric predicates are
    /// their own converse.
    pub fn converse(&self) -> SpatialPredicate {
        match self {
            SpatialPredicate::Within => SpatialPredicate::Contains,
            SpatialPredicate::Contains => SpatialPredicate::Within,
            other => *other,
        }
    }

    /// Relates `left` to `right`, e.g. `Within` asks whether `left` lies
    /// within `right`.
    pub fn evaluate(&self, left: &Geometry, right: &Geometry) -> bool {
        match self {
            SpatialPredicate::Intersects => intersects(left, right),
            SpatialPredicate::Within => within(left, right),
            SpatialPredicate::Contains => within(right, left),
            SpatialPredicate::Touches => {
                intersects(left, right) && !interiors_intersect(left, right)
            }
            SpatialPredicate::Overlaps => {
                left.dimension() == right.dimension()
                    && interiors_intersect(left, right)
                    && !within(left, right)
                    && !within(right, left)
            }
        }
    }
}

impl fmt::Display for SpatialPredicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ------------- Predicate internals -------------
const EPS: f64 = 1e-9;

#[derive(Clone, Copy)]
enum Prim<'a> {
    Pt(Point),
    Line(&'a [Point]),
    Poly(&'a [Point]),
}

fn prims<'a>(g: &'a Geometry, out: &mut Vec<Prim<'a>>) {
    match g {
        Geometry::Point(p) => out.push(Prim::Pt(*p)),
        Geometry::MultiPoint(ps) => out.extend(ps.iter().map(|p| Prim::Pt(*p))),
        Geometry::LineString(ps) => out.push(Prim::Line(ps)),
        Geometry::Polygon(ring) => out.push(Prim::Poly(ring)),
        Geometry::Multi(gs) => {
            for g in gs {
                prims(g, out);
            }
        }
    }
}

fn intersects(a: &Geometry, b: &Geometry) -> bool {
    match (a.bounds(), b.bounds()) {
        (Some(ba), Some(bb)) if !ba.intersects(&bb) => return false,
        _ => (),
    }
    let (mut pa, mut pb) = (Vec::new(), Vec::new());
    prims(a, &mut pa);
    prims(b, &mut pb);
    pa.iter().any(|x| pb.iter().any(|y| prim_intersects(*x, *y)))
}

fn within(a: &Geometry, b: &Geometry) -> bool {
    let (mut pa, mut pb) = (Vec::new(), Vec::new());
    prims(a, &mut pa);
    prims(b, &mut pb);
    if pa.is_empty() || pb.is_empty() {
        return false;
    }
    pa.iter().all(|x| pb.iter().any(|y| prim_within(*x, *y)))
}

fn interiors_intersect(a: &Geometry, b: &Geometry) -> bool {
    let (mut pa, mut pb) = (Vec::new(), Vec::new());
    prims(a, &mut pa);
    prims(b, &mut pb);
    pa.iter().any(|x| pb.iter().any(|y| prim_interiors_intersect(*x, *y)))
}

fn prim_intersects(a: Prim, b: Prim) -> bool {
    match (a, b) {
        (Prim::Pt(p), Prim::Pt(q)) => p == q,
        (Prim::Pt(p), Prim::Line(l)) | (Prim::Line(l), Prim::Pt(p)) => on_path(p, l),
        (Prim::Pt(p), Prim::Poly(r)) | (Prim::Poly(r), Prim::Pt(p)) => {
            locate(p, r) != Location::Outside
        }
        (Prim::Line(l), Prim::Line(m)) => lines_touch_or_cross(l, m),
        (Prim::Line(l), Prim::Poly(r)) | (Prim::Poly(r), Prim::Line(l)) => {
            l.iter().any(|p| locate(*p, r) != Location::Outside)
                || ring_edges(r).any(|(a1, a2)| {
                    segments(l).any(|(b1, b2)| segment_relation(a1, a2, b1, b2) != SegRel::Apart)
                })
        }
        (Prim::Poly(r), Prim::Poly(s)) => {
            r.iter().any(|p| locate(*p, s) != Location::Outside)
                || s.iter().any(|p| locate(*p, r) != Location::Outside)
                || ring_edges(r).any(|(a1, a2)| {
                    ring_edges(s).any(|(b1, b2)| segment_relation(a1, a2, b1, b2) != SegRel::Apart)
                })
        }
    }
}

fn prim_within(a: Prim, b: Prim) -> bool {
    match (a, b) {
        (Prim::Pt(p), Prim::Pt(q)) => p == q,
        (Prim::Pt(p), Prim::Line(l)) => in_line_interior(p, l),
        (Prim::Pt(p), Prim::Poly(r)) => locate(p, r) == Location::Inside,
        (Prim::Line(l), Prim::Line(m)) => {
            l.iter().all(|p| on_path(*p, m))
                && segments(l).all(|(p, q)| on_path(midpoint(p, q), m))
        }
        (Prim::Line(l), Prim::Poly(r)) => {
            let no_escape = l.iter().all(|p| locate(*p, r) != Location::Outside)
                && segments(l).all(|(p, q)| locate(midpoint(p, q), r) != Location::Outside)
                && !crosses_ring(l, r);
            let interior_contact = l.iter().any(|p| locate(*p, r) == Location::Inside)
                || segments(l).any(|(p, q)| locate(midpoint(p, q), r) == Location::Inside);
            no_escape && interior_contact
        }
        (Prim::Poly(r), Prim::Poly(s)) => {
            let no_escape = r.iter().all(|p| locate(*p, s) != Location::Outside)
                && !rings_cross(r, s);
            no_escape
                && (r.iter().any(|p| locate(*p, s) == Location::Inside)
                    || interior_point(r).map(|p| locate(p, s) == Location::Inside).unwrap_or(false))
        }
        // Lines and polygons never fit in lower-dimensional shapes.
        _ => false,
    }
}

fn prim_interiors_intersect(a: Prim, b: Prim) -> bool {
    match (a, b) {
        (Prim::Pt(p), Prim::Pt(q)) => p == q,
        (Prim::Pt(p), Prim::Line(l)) | (Prim::Line(l), Prim::Pt(p)) => in_line_interior(p, l),
        (Prim::Pt(p), Prim::Poly(r)) | (Prim::Poly(r), Prim::Pt(p)) => {
            locate(p, r) == Location::Inside
        }
        (Prim::Line(l), Prim::Line(m)) => {
            segments(l).any(|(a1, a2)| {
                segments(m).any(|(b1, b2)| {
                    matches!(
                        segment_relation(a1, a2, b1, b2),
                        SegRel::Proper | SegRel::CollinearOverlap
                    )
                })
            })
        }
        (Prim::Line(l), Prim::Poly(r)) | (Prim::Poly(r), Prim::Line(l)) => {
            l.iter().any(|p| locate(*p, r) == Location::Inside)
                || segments(l).any(|(p, q)| locate(midpoint(p, q), r) == Location::Inside)
                || crosses_ring(l, r)
        }
        (Prim::Poly(r), Prim::Poly(s)) => {
            r.iter().any(|p| locate(*p, s) == Location::Inside)
                || s.iter().any(|p| locate(*p, r) == Location::Inside)
                || rings_cross(r, s)
                || interior_point(r).map(|p| locate(p, s) == Location::Inside).unwrap_or(false)
                || interior_point(s).map(|p| locate(p, r) == Location::Inside).unwrap_or(false)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Inside,
    Boundary,
    Outside,
}

/// Even-odd ray cast with an explicit boundary check first.
fn locate(p: Point, ring: &[Point]) -> Location {
    for (a, b) in ring_edges(ring) {
        if on_segment(p, a, b) {
            return Location::Boundary;
        }
    }
    let mut inside = false;
    for (a, b) in ring_edges(ring) {
        if (a.y > p.y) != (b.y > p.y) {
            let t = (p.y - a.y) / (b.y - a.y);
            let x = a.x + t * (b.x - a.x);
            if x > p.x {
                inside = !inside;
            }
        }
    }
    if inside { Location::Inside } else { Location::Outside }
}

fn ring_edges(ring: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = ring.len();
    (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
}

fn segments(line: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    line.windows(2).map(|w| (w[0], w[1]))
}

fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    cross(a, b, p).abs() <= EPS
        && p.x >= a.x.min(b.x) - EPS
        && p.x <= a.x.max(b.x) + EPS
        && p.y >= a.y.min(b.y) - EPS
        && p.y <= a.y.max(b.y) + EPS
}

fn on_path(p: Point, line: &[Point]) -> bool {
    segments(line).any(|(a, b)| on_segment(p, a, b))
}

/// On the path but not at an open linestring's endpoints.
fn in_line_interior(p: Point, line: &[Point]) -> bool {
    if !on_path(p, line) {
        return false;
    }
    let closed = line.len() > 2 && line.first() == line.last();
    if closed {
        return true;
    }
    match (line.first(), line.last()) {
        (Some(first), Some(last)) => p != *first && p != *last,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegRel {
    Apart,
    /// Interiors cross at a single point.
    Proper,
    /// Contact that involves an endpoint or a shared single point.
    Touch,
    /// Collinear with a shared extent of positive length.
    CollinearOverlap,
}

fn segment_relation(a1: Point, a2: Point, b1: Point, b2: Point) -> SegRel {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);

    if d1.abs() <= EPS && d2.abs() <= EPS && d3.abs() <= EPS && d4.abs() <= EPS {
        // Collinear: measure the shared extent along the dominant axis.
        let horizontal = (a2.x - a1.x).abs() >= (a2.y - a1.y).abs();
        let key = |p: Point| if horizontal { p.x } else { p.y };
        let (alo, ahi) = (key(a1).min(key(a2)), key(a1).max(key(a2)));
        let (blo, bhi) = (key(b1).min(key(b2)), key(b1).max(key(b2)));
        let lo = alo.max(blo);
        let hi = ahi.min(bhi);
        return if hi - lo > EPS {
            SegRel::CollinearOverlap
        } else if hi - lo >= -EPS {
            SegRel::Touch
        } else {
            SegRel::Apart
        };
    }

    if ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
    {
        return SegRel::Proper;
    }

    if (d1.abs() <= EPS && on_segment(a1, b1, b2))
        || (d2.abs() <= EPS && on_segment(a2, b1, b2))
        || (d3.abs() <= EPS && on_segment(b1, a1, a2))
        || (d4.abs() <= EPS && on_segment(b2, a1, a2))
    {
        return SegRel::Touch;
    }
    SegRel::Apart
}

fn lines_touch_or_cross(l: &[Point], m: &[Point]) -> bool {
    segments(l).any(|(a1, a2)| {
        segments(m).any(|(b1, b2)| segment_relation(a1, a2, b1, b2) != SegRel::Apart)
    })
}

fn crosses_ring(line: &[Point], ring: &[Point]) -> bool {
    segments(line).any(|(a1, a2)| {
        ring_edges(ring).any(|(b1, b2)| segment_relation(a1, a2, b1, b2) == SegRel::Proper)
    })
}

fn rings_cross(r: &[Point], s: &[Point]) -> bool {
    ring_edges(r).any(|(a1, a2)| {
        ring_edges(s).any(|(b1, b2)| segment_relation(a1, a2, b1, b2) == SegRel::Proper)
    })
}

fn signed_area(ring: &[Point]) -> f64 {
    let mut sum = 0.0;
    for (a, b) in ring_edges(ring) {
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

/// A point strictly inside the ring: the centroid when it lands inside,
/// otherwise midpoints of diagonals from the first vertex.
fn interior_point(ring: &[Point]) -> Option<Point> {
    let area = signed_area(ring);
    if area.abs() > EPS {
        let mut cx = 0.0;
        let mut cy = 0.0;
        for (a, b) in ring_edges(ring) {
            let w = a.x * b.y - b.x * a.y;
            cx += (a.x + b.x) * w;
            cy += (a.y + b.y) * w;
        }
        let centroid = Point::new(cx / (6.0 * area), cy / (6.0 * area));
        if locate(centroid, ring) == Location::Inside {
            return Some(centroid);
        }
    }
    let first = *ring.first()?;
    for v in ring.iter().skip(2) {
        let candidate = midpoint(first, *v);
        if locate(candidate, ring) == Location::Inside {
            return Some(candidate);
        }
    }
    None
}

// ------------- Spatial index -------------
/// Uniform grid over the indexed rows' bounding boxes. Cell posting lists
/// are roaring bitmaps so query results can be unioned cheaply; the exact
/// predicate runs on the refined candidates afterwards.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    origin: (f64, f64),
    cell_size: f64,
    cells: HashMap<(i64, i64), RoaringTreemap, RowHasher>,
    indexed: u64,
}

/// Grid resolution along the longer extent axis.
const GRID_SPAN: f64 = 16.0;

impl SpatialIndex {
    /// Builds an index over `(row id, bounds)` pairs.
    pub fn build(rows: &[(u64, Bounds)]) -> Self {
        let mut total: Option<Bounds> = None;
        for (_, b) in rows {
            match total.as_mut() {
                Some(t) => t.merge(b),
                None => total = Some(*b),
            }
        }
        let total = total.unwrap_or(Bounds { min_x: 0.0, min_y: 0.0, max_x: 0.0, max_y: 0.0 });
        let extent = total.width().max(total.height());
        let cell_size = if extent > 0.0 { extent / GRID_SPAN } else { 1.0 };
        let mut index = Self {
            origin: (total.min_x, total.min_y),
            cell_size,
            cells: HashMap::default(),
            indexed: rows.len() as u64,
        };
        for (row, b) in rows {
            let (x0, y0, x1, y1) = index.cell_range(b);
            for cx in x0..=x1 {
                for cy in y0..=y1 {
                    index.cells.entry((cx, cy)).or_default().insert(*row);
                }
            }
        }
        index
    }

    fn cell_range(&self, b: &Bounds) -> (i64, i64, i64, i64) {
        let to_cell = |v: f64, o: f64| ((v - o) / self.cell_size).floor() as i64;
        (
            to_cell(b.min_x, self.origin.0),
            to_cell(b.min_y, self.origin.1),
            to_cell(b.max_x, self.origin.0),
            to_cell(b.max_y, self.origin.1),
        )
    }

    /// Row ids whose bounds may intersect `query`; exactness is the
    /// caller's refinement step.
    pub fn query(&self, query: &Bounds) -> RoaringTreemap {
        let mut result = RoaringTreemap::new();
        let (x0, y0, x1, y1) = self.cell_range(query);
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                if let Some(rows) = self.cells.get(&(cx, cy)) {
                    result |= rows;
                }
            }
        }
        result
    }

    pub fn len(&self) -> u64 {
        self.indexed
    }

    pub fn is_empty(&self) -> bool {
        self.indexed == 0
    }

    /// The predicates this index can answer. The grid evaluates the full
    /// set; a join still intersects both sides' sets, since other backends
    /// may answer fewer.
    pub fn supported_predicates(&self) -> BTreeSet<SpatialPredicate> {
        SpatialPredicate::ALL.iter().copied().collect()
    }
}
