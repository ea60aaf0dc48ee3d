use framewright::error::FramewrightError;
use framewright::frame::{Column, Dtype, Frame, JoinMode, Value};
use framewright::geom::{Geometry, SpatialPredicate};

fn ints(name: &str, values: &[i64]) -> Column {
    let values = values.iter().copied().map(Value::Int).collect();
    Column::new(name, Dtype::Int, values).unwrap()
}

fn floats(name: &str, values: &[f64]) -> Column {
    let values = values.iter().copied().map(Value::Float).collect();
    Column::new(name, Dtype::Float, values).unwrap()
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

fn names(frame: &Frame) -> Vec<&str> {
    frame.columns().iter().map(|c| c.name.as_str()).collect()
}

fn cell(frame: &Frame, column: &str, row: usize) -> Value {
    frame.column(column).unwrap().values[row].clone()
}

fn geom(wkt: &str) -> Value {
    Value::Geom(Geometry::from_wkt(wkt).unwrap())
}

// ------------- merge -------------

fn merge_fixture() -> (Frame, Frame) {
    let a = Frame::new(vec![ints("x", &[1, 2, 3]), ints("y", &[10, 20, 30])]).unwrap();
    let b = Frame::new(vec![ints("x", &[2, 3, 4]), ints("z", &[200, 300, 400])]).unwrap();
    (a, b)
}

#[test]
fn inner_merge_keeps_matching_rows_and_suffixes_shared_names() {
    let (a, b) = merge_fixture();
    let out = a.merge(&b, JoinMode::Inner, "x", "x").unwrap();
    assert_eq!(names(&out), vec!["x_x", "y", "x_y", "z"]);
    assert_eq!(out.row_count(), 2);
    assert_eq!(cell(&out, "x_x", 0), Value::Int(2));
    assert_eq!(cell(&out, "y", 0), Value::Int(20));
    assert_eq!(cell(&out, "x_y", 0), Value::Int(2));
    assert_eq!(cell(&out, "z", 0), Value::Int(200));
    assert_eq!(cell(&out, "z", 1), Value::Int(300));
    // Fresh unnamed range index.
    assert_eq!(out.index().name, "");
    assert_eq!(out.index().values, vec![Value::Int(0), Value::Int(1)]);
}

#[test]
fn left_merge_pads_unmatched_left_rows() {
    let (a, b) = merge_fixture();
    let out = a.merge(&b, JoinMode::Left, "x", "x").unwrap();
    assert_eq!(out.row_count(), 3);
    assert_eq!(cell(&out, "x_x", 0), Value::Int(1));
    assert_eq!(cell(&out, "x_y", 0), Value::Null);
    assert_eq!(cell(&out, "z", 0), Value::Null);
    assert_eq!(cell(&out, "z", 2), Value::Int(300));
}

#[test]
fn right_merge_follows_right_row_order() {
    let (a, b) = merge_fixture();
    let out = a.merge(&b, JoinMode::Right, "x", "x").unwrap();
    assert_eq!(out.row_count(), 3);
    assert_eq!(cell(&out, "x_y", 0), Value::Int(2));
    assert_eq!(cell(&out, "x_y", 2), Value::Int(4));
    assert_eq!(cell(&out, "x_x", 2), Value::Null);
    assert_eq!(cell(&out, "y", 2), Value::Null);
}

#[test]
fn outer_merge_appends_unmatched_right_rows_after_the_left_pass() {
    let (a, b) = merge_fixture();
    let out = a.merge(&b, JoinMode::Outer, "x", "x").unwrap();
    assert_eq!(out.row_count(), 4);
    let x_left: Vec<Value> = out.column("x_x").unwrap().values.clone();
    assert_eq!(
        x_left,
        vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Null]
    );
    assert_eq!(cell(&out, "x_y", 3), Value::Int(4));
    assert_eq!(cell(&out, "z", 3), Value::Int(400));
}

#[test]
fn duplicate_keys_multiply_matches() {
    let a = Frame::new(vec![ints("k", &[1, 1])]).unwrap();
    let b = Frame::new(vec![ints("k", &[1, 1])]).unwrap();
    let out = a.merge(&b, JoinMode::Inner, "k", "k").unwrap();
    assert_eq!(out.row_count(), 4);
}

#[test]
fn merge_promotes_int_and_float_keys() {
    let a = Frame::new(vec![ints("k", &[1, 2])]).unwrap();
    let c = Frame::new(vec![floats("k", &[1.0, 3.0])]).unwrap();
    let out = a.merge(&c, JoinMode::Inner, "k", "k").unwrap();
    assert_eq!(out.row_count(), 1);
    assert_eq!(cell(&out, "k_x", 0), Value::Int(1));
    assert_eq!(cell(&out, "k_y", 0), Value::Float(1.0));
}

#[test]
fn merge_rejects_unrelated_key_dtypes() {
    let a = Frame::new(vec![ints("k", &[1])]).unwrap();
    let t = Frame::new(vec![texts("k", &["one"])]).unwrap();
    let error = a.merge(&t, JoinMode::Inner, "k", "k").unwrap_err();
    assert!(matches!(error, FramewrightError::KeyTypeMismatch { .. }));
}

#[test]
fn merge_requires_both_key_columns() {
    let (a, b) = merge_fixture();
    let error = a.merge(&b, JoinMode::Inner, "nope", "x").unwrap_err();
    assert!(matches!(
        error,
        FramewrightError::MissingColumn { ref column, .. } if column == "nope"
    ));
}

#[test]
fn null_keys_never_match() {
    let a = Frame::new(vec![Column::new(
        "k",
        Dtype::Int,
        vec![Value::Null, Value::Int(2)],
    )
    .unwrap()])
    .unwrap();
    let b = Frame::new(vec![Column::new(
        "k",
        Dtype::Int,
        vec![Value::Null, Value::Int(2)],
    )
    .unwrap()])
    .unwrap();
    let inner = a.merge(&b, JoinMode::Inner, "k", "k").unwrap();
    assert_eq!(inner.row_count(), 1);
    // A left join still keeps the null-keyed row, unmatched.
    let left = a.merge(&b, JoinMode::Left, "k", "k").unwrap();
    assert_eq!(left.row_count(), 2);
    assert_eq!(cell(&left, "k_y", 0), Value::Null);
}

#[test]
fn merge_prefers_the_left_crs_and_geometry() {
    let zones = Frame::new(vec![
        ints("id", &[1]),
        shapes("geometry", &["POINT (0 0)"]),
    ])
    .unwrap()
    .with_geometry("geometry")
    .unwrap()
    .with_crs("EPSG:4326");
    let facts = Frame::new(vec![ints("id", &[1])]).unwrap().with_crs("EPSG:3857");
    let out = zones.merge(&facts, JoinMode::Inner, "id", "id").unwrap();
    assert_eq!(out.crs(), Some("EPSG:4326"));
    assert_eq!(out.geometry_column(), Some("geometry"));
}

// ------------- dissolve -------------

fn dissolve_fixture() -> Frame {
    Frame::new(vec![
        texts("label", &["p", "q", "r"]),
        ints("zone", &[2, 1, 2]),
        floats("size", &[0.5, 1.5, 2.5]),
        shapes("geometry", &["POINT (0 0)", "POINT (5 5)", "POINT (1 1)"]),
    ])
    .unwrap()
    .with_geometry("geometry")
    .unwrap()
    .with_crs("EPSG:4326")
}

#[test]
fn dissolve_groups_by_first_appearance() {
    let out = dissolve_fixture().dissolve("zone").unwrap();
    assert_eq!(out.row_count(), 2);
    assert_eq!(out.index().name, "zone");
    assert_eq!(out.index().dtype, Dtype::Int);
    assert_eq!(out.index().values, vec![Value::Int(2), Value::Int(1)]);
}

#[test]
fn dissolve_merges_group_geometry_and_keeps_first_values() {
    let out = dissolve_fixture().dissolve("zone").unwrap();
    // Geometry leads, the key column disappears, the rest keep their order.
    assert_eq!(names(&out), vec!["geometry", "label", "size"]);
    assert_eq!(cell(&out, "geometry", 0), geom("MULTIPOINT (0 0, 1 1)"));
    assert_eq!(cell(&out, "geometry", 1), geom("POINT (5 5)"));
    assert_eq!(cell(&out, "label", 0), Value::Text("p".into()));
    assert_eq!(cell(&out, "size", 0), Value::Float(0.5));
    assert_eq!(out.crs(), Some("EPSG:4326"));
    assert_eq!(out.geometry_column(), Some("geometry"));
}

#[test]
fn dissolve_skips_null_values_within_a_group() {
    let frame = Frame::new(vec![
        Column::new(
            "label",
            Dtype::Text,
            vec![Value::Null, Value::Text("q".into()), Value::Text("r".into())],
        )
        .unwrap(),
        ints("zone", &[2, 1, 2]),
        shapes("geometry", &["POINT (0 0)", "POINT (5 5)", "POINT (1 1)"]),
    ])
    .unwrap()
    .with_geometry("geometry")
    .unwrap();
    let out = frame.dissolve("zone").unwrap();
    // The first non-null wins; an all-null group stays null.
    assert_eq!(cell(&out, "label", 0), Value::Text("r".into()));
}

#[test]
fn dissolve_drops_null_keyed_rows() {
    let frame = Frame::new(vec![
        Column::new(
            "zone",
            Dtype::Int,
            vec![Value::Int(2), Value::Null, Value::Int(2)],
        )
        .unwrap(),
        shapes("geometry", &["POINT (0 0)", "POINT (5 5)", "POINT (1 1)"]),
    ])
    .unwrap()
    .with_geometry("geometry")
    .unwrap();
    let out = frame.dissolve("zone").unwrap();
    assert_eq!(out.row_count(), 1);
    assert_eq!(cell(&out, "geometry", 0), geom("MULTIPOINT (0 0, 1 1)"));
}

#[test]
fn dissolve_needs_geometry_and_a_non_geometry_key() {
    let plain = Frame::new(vec![ints("zone", &[1, 2])]).unwrap();
    assert!(matches!(
        plain.dissolve("zone").unwrap_err(),
        FramewrightError::NoGeometry { .. }
    ));
    let fixture = dissolve_fixture();
    assert!(matches!(
        fixture.dissolve("geometry").unwrap_err(),
        FramewrightError::GeometryKey { .. }
    ));
    assert!(matches!(
        fixture.dissolve("nope").unwrap_err(),
        FramewrightError::MissingColumn { .. }
    ));
}

// ------------- sjoin -------------

fn districts() -> Frame {
    Frame::new(vec![
        texts("name", &["north", "south"]),
        ints("zone", &[1, 2]),
        shapes(
            "geometry",
            &[
                "POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0))",
                "POLYGON ((10 0, 14 0, 14 4, 10 4, 10 0))",
            ],
        ),
    ])
    .unwrap()
    .with_geometry("geometry")
    .unwrap()
    .with_crs("EPSG:4326")
}

fn sites() -> Frame {
    Frame::new(vec![
        texts("label", &["well A", "well B", "mast C", "cairn D"]),
        ints("zone", &[1, 1, 2, 3]),
        shapes(
            "geometry",
            &["POINT (1 1)", "POINT (2 3)", "POINT (11 2)", "POINT (20 20)"],
        ),
    ])
    .unwrap()
    .with_geometry("geometry")
    .unwrap()
    .with_crs("EPSG:4326")
}

#[test]
fn inner_sjoin_drops_unmatched_rows_and_right_geometry() {
    let out = sites().sjoin(&districts(), JoinMode::Inner, SpatialPredicate::Intersects).unwrap();
    assert_eq!(
        names(&out),
        vec!["label", "zone_left", "geometry", "index_right", "name", "zone_right"]
    );
    assert_eq!(out.row_count(), 3);
    assert_eq!(cell(&out, "label", 0), Value::Text("well A".into()));
    assert_eq!(cell(&out, "name", 0), Value::Text("north".into()));
    assert_eq!(cell(&out, "zone_left", 2), Value::Int(2));
    assert_eq!(cell(&out, "zone_right", 2), Value::Int(2));
    assert_eq!(
        out.column("index_right").unwrap().values,
        vec![Value::Int(0), Value::Int(0), Value::Int(1)]
    );
    // The left geometry survives; the match carries the site points.
    assert_eq!(out.geometry_column(), Some("geometry"));
    assert_eq!(cell(&out, "geometry", 0), geom("POINT (1 1)"));
    assert_eq!(out.crs(), Some("EPSG:4326"));
}

#[test]
fn left_sjoin_keeps_unmatched_rows_with_nulls() {
    let out = sites().sjoin(&districts(), JoinMode::Left, SpatialPredicate::Intersects).unwrap();
    assert_eq!(out.row_count(), 4);
    assert_eq!(cell(&out, "label", 3), Value::Text("cairn D".into()));
    assert_eq!(cell(&out, "index_right", 3), Value::Null);
    assert_eq!(cell(&out, "name", 3), Value::Null);
    assert_eq!(cell(&out, "zone_right", 3), Value::Null);
}

#[test]
fn right_sjoin_drives_right_rows_and_keeps_their_geometry() {
    let out = sites().sjoin(&districts(), JoinMode::Right, SpatialPredicate::Intersects).unwrap();
    assert_eq!(
        names(&out),
        vec!["label", "zone_left", "index_left", "name", "zone_right", "geometry"]
    );
    // District north gathers both wells, south gathers the mast.
    assert_eq!(out.row_count(), 3);
    assert_eq!(
        out.column("index_left").unwrap().values,
        vec![Value::Int(0), Value::Int(1), Value::Int(2)]
    );
    assert_eq!(cell(&out, "name", 0), Value::Text("north".into()));
    assert_eq!(cell(&out, "name", 1), Value::Text("north".into()));
    assert_eq!(cell(&out, "name", 2), Value::Text("south".into()));
    assert_eq!(out.geometry_column(), Some("geometry"));
    assert_eq!(
        cell(&out, "geometry", 0),
        geom("POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0))")
    );
}

#[test]
fn contains_relates_left_to_right() {
    let out = districts()
        .sjoin(&sites(), JoinMode::Inner, SpatialPredicate::Contains)
        .unwrap();
    assert_eq!(out.row_count(), 3);
    // Within in the same direction matches nothing: a polygon does not sit
    // inside a point.
    let none = districts()
        .sjoin(&sites(), JoinMode::Inner, SpatialPredicate::Within)
        .unwrap();
    assert_eq!(none.row_count(), 0);
}

#[test]
fn boundary_contact_counts_as_intersects_and_touches_but_not_within() {
    let edge = Frame::new(vec![
        texts("label", &["gate"]),
        shapes("geometry", &["POINT (4 2)"]),
    ])
    .unwrap()
    .with_geometry("geometry")
    .unwrap()
    .with_crs("EPSG:4326");
    let run = |predicate| {
        edge.sjoin(&districts(), JoinMode::Inner, predicate)
            .unwrap()
            .row_count()
    };
    assert_eq!(run(SpatialPredicate::Intersects), 1);
    assert_eq!(run(SpatialPredicate::Touches), 1);
    assert_eq!(run(SpatialPredicate::Within), 0);
}

#[test]
fn sjoin_rejects_mismatched_crs() {
    let reprojected = sites(); // EPSG:4326
    let other = districts().with_crs("EPSG:3857");
    let error = reprojected
        .sjoin(&other, JoinMode::Inner, SpatialPredicate::Intersects)
        .unwrap_err();
    assert!(matches!(error, FramewrightError::CrsMismatch { .. }));
}

#[test]
fn sjoin_tolerates_a_missing_crs_on_one_side() {
    let bare = Frame::new(vec![
        texts("label", &["well A"]),
        shapes("geometry", &["POINT (1 1)"]),
    ])
    .unwrap()
    .with_geometry("geometry")
    .unwrap();
    let out = bare
        .sjoin(&districts(), JoinMode::Inner, SpatialPredicate::Intersects)
        .unwrap();
    assert_eq!(out.row_count(), 1);
    assert_eq!(out.crs(), Some("EPSG:4326"));
}

#[test]
fn sjoin_requires_geometry_on_both_sides() {
    let plain = Frame::new(vec![ints("x", &[1])]).unwrap();
    let error = sites()
        .sjoin(&plain, JoinMode::Inner, SpatialPredicate::Intersects)
        .unwrap_err();
    assert!(matches!(error, FramewrightError::NoGeometry { .. }));
    let error = plain
        .sjoin(&sites(), JoinMode::Inner, SpatialPredicate::Intersects)
        .unwrap_err();
    assert!(matches!(error, FramewrightError::NoGeometry { .. }));
}

#[test]
fn sjoin_rejects_the_outer_mode() {
    let error = sites()
        .sjoin(&districts(), JoinMode::Outer, SpatialPredicate::Intersects)
        .unwrap_err();
    assert!(matches!(error, FramewrightError::Invariant(_)));
}
