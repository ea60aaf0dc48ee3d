use chrono::NaiveDate;
use rusqlite::Connection;

use framewright::frame::{Column, Decimal, Dtype, Frame, Value};
use framewright::geom::Geometry;
use framewright::oracle::Comparison;
use framewright::search::Synthesizer;
use framewright::store::{load_bindings, seed_demo};

fn setup() -> Connection {
    let connection = Connection::open_in_memory().unwrap();
    seed_demo(&connection).unwrap();
    connection
}

#[test]
fn tables_load_alphabetically_and_crs_stays_out() {
    let bindings = load_bindings(&setup()).unwrap();
    let names: Vec<&str> = bindings.names().collect();
    assert_eq!(names, vec!["districts", "sites", "sites_in_districts"]);
}

#[test]
fn demo_tables_carry_geometry_and_crs() {
    let bindings = load_bindings(&setup()).unwrap();
    let districts = bindings.frame("districts").unwrap();
    assert_eq!(districts.row_count(), 2);
    assert_eq!(districts.geometry_column(), Some("geometry"));
    assert_eq!(districts.crs(), Some("EPSG:4326"));
    assert_eq!(districts.dtype_of("name"), Some(Dtype::Text));
    assert_eq!(districts.dtype_of("zone"), Some(Dtype::Int));
    assert_eq!(districts.dtype_of("geometry"), Some(Dtype::Geometry));
    let shape = districts.column("geometry").unwrap().values[0]
        .as_geometry()
        .unwrap()
        .clone();
    assert_eq!(shape, Geometry::from_wkt("POLYGON ((0 0, 4 0, 4 4, 0 4))").unwrap());
}

#[test]
fn declared_types_map_onto_dtypes() {
    let connection = Connection::open_in_memory().unwrap();
    connection
        .execute_batch(
            "
            create table readings (
                id INTEGER,
                ratio REAL,
                flag BOOLEAN,
                noted DATE,
                price DECIMAL(8,2),
                note TEXT,
                geometry GEOMETRY
            );
            insert into readings values
                (1, 1.5, 1, '2024-03-31', '19.99', 'ok', 'POINT (1 1)'),
                (null, null, null, null, null, null, null);
            ",
        )
        .unwrap();
    let bindings = load_bindings(&connection).unwrap();
    let readings = bindings.frame("readings").unwrap();
    assert_eq!(readings.dtype_of("id"), Some(Dtype::Int));
    assert_eq!(readings.dtype_of("ratio"), Some(Dtype::Float));
    assert_eq!(readings.dtype_of("flag"), Some(Dtype::Bool));
    assert_eq!(readings.dtype_of("noted"), Some(Dtype::Date));
    assert_eq!(readings.dtype_of("price"), Some(Dtype::Decimal));
    assert_eq!(readings.dtype_of("note"), Some(Dtype::Text));
    assert_eq!(readings.dtype_of("geometry"), Some(Dtype::Geometry));

    let row = |column: &str| readings.column(column).unwrap().values.clone();
    assert_eq!(row("id")[0], Value::Int(1));
    assert_eq!(row("ratio")[0], Value::Float(1.5));
    assert_eq!(row("flag")[0], Value::Bool(true));
    assert_eq!(
        row("noted")[0],
        Value::Date(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap())
    );
    assert_eq!(
        row("price")[0],
        Value::Decimal(Decimal::from_str("19.99").unwrap())
    );
    assert_eq!(row("note")[0], Value::Text("ok".into()));
    assert_eq!(
        row("geometry")[0],
        Value::Geom(Geometry::from_wkt("POINT (1 1)").unwrap())
    );
    // The second row is null straight across.
    for column in ["id", "ratio", "flag", "noted", "price", "note", "geometry"] {
        assert_eq!(row(column)[1], Value::Null, "column {column}");
    }
}

#[test]
fn a_column_named_geometry_is_spatial_whatever_it_declares() {
    let connection = Connection::open_in_memory().unwrap();
    connection
        .execute_batch(
            "
            create table spots (label TEXT, geometry TEXT);
            insert into spots values ('a', 'POINT (3 4)');
            ",
        )
        .unwrap();
    let bindings = load_bindings(&connection).unwrap();
    let spots = bindings.frame("spots").unwrap();
    assert_eq!(spots.dtype_of("geometry"), Some(Dtype::Geometry));
    assert_eq!(spots.geometry_column(), Some("geometry"));
}

#[test]
fn quoted_identifiers_survive_loading() {
    let connection = Connection::open_in_memory().unwrap();
    connection
        .execute_batch(
            "
            create table \"field notes\" (entry TEXT);
            insert into \"field notes\" values ('first');
            ",
        )
        .unwrap();
    let bindings = load_bindings(&connection).unwrap();
    let notes = bindings.frame("field notes").unwrap();
    assert_eq!(notes.row_count(), 1);
    assert_eq!(
        notes.column("entry").unwrap().values[0],
        Value::Text("first".into())
    );
}

#[test]
fn loading_matches_a_hand_built_frame() {
    let bindings = load_bindings(&setup()).unwrap();
    let loaded = bindings.frame("districts").unwrap();
    let built = Frame::new(vec![
        Column::new(
            "name",
            Dtype::Text,
            vec![Value::Text("north".into()), Value::Text("south".into())],
        )
        .unwrap(),
        Column::new("zone", Dtype::Int, vec![Value::Int(1), Value::Int(2)]).unwrap(),
        Column::new(
            "geometry",
            Dtype::Geometry,
            vec![
                Value::Geom(Geometry::from_wkt("POLYGON ((0 0, 4 0, 4 4, 0 4))").unwrap()),
                Value::Geom(Geometry::from_wkt("POLYGON ((10 0, 14 0, 14 4, 10 4))").unwrap()),
            ],
        )
        .unwrap(),
    ])
    .unwrap()
    .with_geometry("geometry")
    .unwrap()
    .with_crs("EPSG:4326");
    assert_eq!(loaded.fingerprint(), built.fingerprint());
    assert!(Comparison::matching().equal(&loaded, &built));
}

#[test]
fn the_demo_store_round_trips_through_synthesis() {
    let bindings = load_bindings(&setup()).unwrap();
    let (rest, target) = bindings.holdout("sites_in_districts").unwrap();
    assert_eq!(rest.len(), 2);
    let found = Synthesizer::new(&rest, &target).find_first().unwrap();
    assert_eq!(
        found.to_string(),
        "sjoin(sites, districts, how=\"inner\", predicate=\"intersects\")"
    );
    let result = found.interpret(&rest).unwrap();
    assert!(Comparison::matching().equal(&result, &target));
}
