use framewright::bindings::Bindings;
use framewright::frame::{Column, Dtype, Frame, JoinMode, Value};
use framewright::generate;
use framewright::geom::{Geometry, SpatialPredicate};
use framewright::grammar::Candidate;
use framewright::oracle::Comparison;

fn ints(name: &str, values: &[i64]) -> Column {
    let values = values.iter().copied().map(Value::Int).collect();
    Column::new(name, Dtype::Int, values).unwrap()
}

fn texts(name: &str, values: &[&str]) -> Column {
    let values = values.iter().map(|v| Value::Text((*v).to_owned())).collect();
    Column::new(name, Dtype::Text, values).unwrap()
}

fn shapes(name: &str, wkt: &[&str]) -> Column {
    let values = wkt
        .iter()
        .map(|w| Value::Geom(Geometry::from_wkt(w).unwrap()))
        .collect();
    Column::new(name, Dtype::Geometry, values).unwrap()
}

fn setup() -> Bindings {
    let parcels = Frame::new(vec![
        texts("name", &["alpha", "beta", "gamma"]),
        ints("zone", &[1, 2, 3]),
        shapes(
            "geometry",
            &[
                "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))",
                "POLYGON ((20 0, 30 0, 30 10, 20 10, 20 0))",
                "POLYGON ((40 40, 44 40, 44 44, 40 44, 40 40))",
            ],
        ),
    ])
    .unwrap()
    .with_geometry("geometry")
    .unwrap()
    .with_crs("EPSG:4326");
    let trees = Frame::new(vec![
        texts("species", &["oak", "ash", "fir"]),
        ints("height", &[12, 7, 3]),
        shapes("geometry", &["POINT (1 1)", "POINT (25 5)", "POINT (50 50)"]),
    ])
    .unwrap()
    .with_geometry("geometry")
    .unwrap()
    .with_crs("EPSG:4326");
    let mut bindings = Bindings::new();
    bindings.insert("parcels", parcels);
    bindings.insert("trees", trees);
    bindings
}

/// The side a suffixed name belongs to, flipped.
fn swapped_name(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("_x") {
        return format!("{stem}_y");
    }
    if let Some(stem) = name.strip_suffix("_y") {
        return format!("{stem}_x");
    }
    if let Some(stem) = name.strip_suffix("_left") {
        return format!("{stem}_right");
    }
    if let Some(stem) = name.strip_suffix("_right") {
        return format!("{stem}_left");
    }
    name.to_owned()
}

/// Renames every side-suffixed column to the opposite side, keeping index
/// and CRS.
fn relabeled(frame: &Frame) -> Frame {
    let columns = frame
        .columns()
        .iter()
        .map(|c| Column {
            name: swapped_name(&c.name),
            dtype: c.dtype,
            values: c.values.clone(),
        })
        .collect();
    let mut out = Frame::new(columns).unwrap();
    if let Some(crs) = frame.crs() {
        out = out.with_crs(crs);
    }
    out.with_index(frame.index().clone()).unwrap()
}

/// Rebuilds the frame with rows sorted by their rendered cells (taken in
/// column-name order, so two frames with the same columns sort alike) and a
/// fresh range index. Join outputs carry a meaningless range index, so this
/// makes row order irrelevant without losing anything.
fn row_sorted(frame: &Frame) -> Frame {
    let mut names: Vec<&str> = frame.columns().iter().map(|c| c.name.as_str()).collect();
    names.sort_unstable();
    let mut order: Vec<usize> = (0..frame.row_count()).collect();
    order.sort_by_key(|row| {
        names
            .iter()
            .map(|name| frame.column(name).unwrap().values[*row].to_string())
            .collect::<Vec<_>>()
            .join("\u{1f}")
    });
    let columns = frame
        .columns()
        .iter()
        .map(|c| Column {
            name: c.name.clone(),
            dtype: c.dtype,
            values: order.iter().map(|row| c.values[*row].clone()).collect(),
        })
        .collect();
    let mut out = Frame::new(columns).unwrap();
    if let Some(crs) = frame.crs() {
        out = out.with_crs(crs);
    }
    out
}

fn same_rows(left: &Frame, right: &Frame) -> bool {
    let options = Comparison {
        check_like: true,
        ..Comparison::matching()
    };
    options.equal(&row_sorted(left), &row_sorted(right))
}

#[test]
fn merge_dual_swaps_sides_keys_and_mode() {
    let candidate = Candidate::Merge {
        left: "a".into(),
        right: "b".into(),
        how: JoinMode::Left,
        left_on: "x".into(),
        right_on: "z".into(),
    };
    assert_eq!(
        candidate.dual(),
        Some(Candidate::Merge {
            left: "b".into(),
            right: "a".into(),
            how: JoinMode::Right,
            left_on: "z".into(),
            right_on: "x".into(),
        })
    );
}

#[test]
fn spatial_dual_swaps_sides_mode_and_predicate() {
    let candidate = Candidate::SpatialJoin {
        left: "a".into(),
        right: "b".into(),
        how: JoinMode::Right,
        predicate: SpatialPredicate::Within,
    };
    assert_eq!(
        candidate.dual(),
        Some(Candidate::SpatialJoin {
            left: "b".into(),
            right: "a".into(),
            how: JoinMode::Left,
            predicate: SpatialPredicate::Contains,
        })
    );
}

#[test]
fn dual_is_an_involution() {
    let bindings = setup();
    for candidate in generate::merges(&bindings).chain(generate::spatial_joins(&bindings)) {
        let twice = candidate.dual().unwrap().dual();
        assert_eq!(twice, Some(candidate));
    }
}

#[test]
fn unary_candidates_have_no_dual() {
    let reference = Candidate::Reference { name: "a".into() };
    assert_eq!(reference.dual(), None);
    let dissolve = Candidate::Dissolve {
        source: Box::new(reference),
        by: "zone".into(),
    };
    assert_eq!(dissolve.dual(), None);
}

#[test]
fn every_merge_dual_reproduces_the_same_dataset() {
    let bindings = setup();
    let all: Vec<_> = generate::merges(&bindings).collect();
    assert!(!all.is_empty());
    for pair in all.chunks(2) {
        let [candidate, dual] = pair else {
            panic!("merges must come in candidate/dual pairs");
        };
        assert_eq!(candidate.dual().as_ref(), Some(dual));
        let base = candidate.interpret(&bindings).unwrap();
        let mirrored = relabeled(&dual.interpret(&bindings).unwrap());
        assert!(
            same_rows(&base, &mirrored),
            "{candidate} and {dual} disagree"
        );
    }
}

#[test]
fn left_and_right_spatial_duals_reproduce_the_same_dataset() {
    let bindings = setup();
    let all: Vec<_> = generate::spatial_joins(&bindings).collect();
    assert!(!all.is_empty());
    for pair in all.chunks(2) {
        let [candidate, dual] = pair else {
            panic!("spatial joins must come in candidate/dual pairs");
        };
        assert_eq!(candidate.dual().as_ref(), Some(dual));
        let Candidate::SpatialJoin { how, .. } = candidate else {
            panic!("spatial tier emitted {candidate}");
        };
        // An inner spatial join keeps the driving side's geometry, so the
        // two directions legitimately disagree there; only the left/right
        // pairs are output-identical.
        if *how == JoinMode::Inner {
            continue;
        }
        let base = candidate.interpret(&bindings).unwrap();
        let mirrored = relabeled(&dual.interpret(&bindings).unwrap());
        assert!(
            same_rows(&base, &mirrored),
            "{candidate} and {dual} disagree"
        );
    }
}

#[test]
fn inner_spatial_directions_keep_different_geometry() {
    let bindings = setup();
    let candidate = Candidate::SpatialJoin {
        left: "parcels".into(),
        right: "trees".into(),
        how: JoinMode::Inner,
        predicate: SpatialPredicate::Intersects,
    };
    let base = candidate.interpret(&bindings).unwrap();
    let dual = candidate.dual().unwrap().interpret(&bindings).unwrap();
    let kept_type = |frame: &Frame| {
        frame.column("geometry").unwrap().values[0]
            .as_geometry()
            .unwrap()
            .geometry_type()
    };
    assert_eq!(kept_type(&base), "Polygon");
    assert_eq!(kept_type(&dual), "Point");
}
