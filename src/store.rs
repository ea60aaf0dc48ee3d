//! SQLite-backed binding stores.
//!
//! A store is an ordinary SQLite database in which every table is one
//! binding. Tables load in full at startup, alphabetically, so binding
//! order (and with it search order) is reproducible across runs. Declared
//! column types map onto frame dtypes; a column declared `GEOMETRY` or
//! simply named `geometry` holds WKT text and is parsed into shapes. An
//! optional `crs` table (`name`, `crs`) assigns coordinate reference
//! systems to the tables it names.

use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use tracing::{debug, info};

use crate::bindings::Bindings;
use crate::error::{FramewrightError, Result};
use crate::frame::{Column, Decimal, Dtype, Frame, NameHasher, Value};
use crate::geom::Geometry;

const CRS_TABLE: &str = "crs";

// ------------- Loading -------------

/// Reads every table of `connection` into a binding environment.
pub fn load_bindings(connection: &Connection) -> Result<Bindings> {
    let crs_by_table = read_crs(connection)?;
    let mut bindings = Bindings::new();
    let mut tables = connection.prepare(
        "
        select name from sqlite_master
        where type = 'table' and name not like 'sqlite_%' and name <> 'crs'
        order by name
        ",
    )?;
    let mut rows = tables.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let crs = crs_by_table.get(&name).map(String::as_str);
        let frame = read_table(connection, &name, crs)?;
        debug!(table = %name, rows = frame.row_count(), "table loaded");
        bindings.insert(&name, frame);
    }
    info!(bindings = bindings.len(), "store loaded");
    Ok(bindings)
}

/// Reads one table into a frame, detecting the geometry column and
/// attaching the CRS when the store declares one.
fn read_table(connection: &Connection, table: &str, crs: Option<&str>) -> Result<Frame> {
    let mut info = connection.prepare(&format!("pragma table_info({})", quoted(table)))?;
    let mut layout: Vec<(String, Dtype)> = Vec::new();
    let mut rows = info.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        let declared: String = row.get(2)?;
        let dtype = declared_dtype(&declared, &name);
        layout.push((name, dtype));
    }

    let mut cells: Vec<Vec<Value>> = vec![Vec::new(); layout.len()];
    let mut select = connection.prepare(&format!("select * from {}", quoted(table)))?;
    let mut rows = select.query([])?;
    while let Some(row) = rows.next()? {
        for (at, (name, dtype)) in layout.iter().enumerate() {
            cells[at].push(decode(row, at, name, *dtype)?);
        }
    }

    let mut columns = Vec::with_capacity(layout.len());
    let mut geometry_column = None;
    for ((name, dtype), values) in layout.into_iter().zip(cells) {
        if dtype == Dtype::Geometry && geometry_column.is_none() {
            geometry_column = Some(name.clone());
        }
        columns.push(Column::new(name, dtype, values)?);
    }
    let mut frame = Frame::new(columns)?;
    if let Some(crs) = crs {
        frame = frame.with_crs(crs);
    }
    match geometry_column {
        Some(column) => frame.with_geometry(&column),
        None => Ok(frame),
    }
}

/// Maps a declared SQLite column type onto a frame dtype. SQLite is loose
/// about declarations, so this follows its affinity conventions; a column
/// named `geometry` counts as geometry whatever its declaration says.
fn declared_dtype(declared: &str, column: &str) -> Dtype {
    let declared = declared.to_uppercase();
    if declared.contains("GEOM") || column == "geometry" {
        Dtype::Geometry
    } else if declared.contains("BOOL") {
        Dtype::Bool
    } else if declared.contains("INT") {
        Dtype::Int
    } else if declared.contains("DATE") {
        Dtype::Date
    } else if declared.contains("DEC") || declared.contains("NUMERIC") {
        Dtype::Decimal
    } else if declared.contains("REAL") || declared.contains("FLOA") || declared.contains("DOUB") {
        Dtype::Float
    } else {
        Dtype::Text
    }
}

fn decode(row: &rusqlite::Row, at: usize, column: &str, dtype: Dtype) -> Result<Value> {
    if let ValueRef::Null = row.get_ref(at)? {
        return Ok(Value::Null);
    }
    Ok(match dtype {
        Dtype::Int => Value::Int(row.get(at)?),
        Dtype::Float => Value::Float(row.get(at)?),
        Dtype::Bool => Value::Bool(row.get::<_, i64>(at)? != 0),
        Dtype::Text => Value::Text(row.get(at)?),
        Dtype::Date => Value::Date(row.get::<_, NaiveDate>(at)?),
        Dtype::Decimal => {
            // Numeric affinity may have turned the stored literal into a
            // number; render it back before parsing.
            let literal = match row.get_ref(at)? {
                ValueRef::Text(text) => String::from_utf8_lossy(text).into_owned(),
                ValueRef::Integer(whole) => whole.to_string(),
                ValueRef::Real(real) => real.to_string(),
                _ => {
                    return Err(FramewrightError::Store(format!(
                        "bad decimal cell in {}",
                        column
                    )));
                }
            };
            let decimal = Decimal::from_str(&literal).ok_or_else(|| {
                FramewrightError::Store(format!("bad decimal literal {} in {}", literal, column))
            })?;
            Value::Decimal(decimal)
        }
        Dtype::Geometry => {
            let wkt: String = row.get(at)?;
            Value::Geom(Geometry::from_wkt(&wkt)?)
        }
    })
}

/// The optional `crs` table, as a table-name to CRS map.
fn read_crs(connection: &Connection) -> Result<HashMap<String, String, NameHasher>> {
    let mut out: HashMap<String, String, NameHasher> = HashMap::default();
    let present: i64 = connection.query_row(
        "select count(*) from sqlite_master where type = 'table' and name = ?",
        [CRS_TABLE],
        |row| row.get(0),
    )?;
    if present == 0 {
        return Ok(out);
    }
    let mut entries = connection.prepare("select name, crs from crs")?;
    let mut rows = entries.query([])?;
    while let Some(row) = rows.next()? {
        out.insert(row.get(0)?, row.get(1)?);
    }
    Ok(out)
}

fn quoted(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

// ------------- Demo store -------------

/// Seeds a small demo store: two spatial tables (`districts` polygons and
/// `sites` points) plus `sites_in_districts`, which holds exactly the
/// dataset a spatial join of the two produces, so a freshly seeded store
/// has something synthesizable out of the box. Tests and benches use the
/// same seed.
pub fn seed_demo(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        create table districts (
            name TEXT,
            zone INTEGER,
            geometry GEOMETRY
        );
        insert into districts values
            ('north', 1, 'POLYGON ((0 0, 4 0, 4 4, 0 4))'),
            ('south', 2, 'POLYGON ((10 0, 14 0, 14 4, 10 4))');

        create table sites (
            label TEXT,
            zone INTEGER,
            geometry GEOMETRY
        );
        insert into sites values
            ('well A', 1, 'POINT (1 1)'),
            ('well B', 1, 'POINT (2 3)'),
            ('mast C', 2, 'POINT (11 2)'),
            ('cairn D', 3, 'POINT (20 20)');

        create table sites_in_districts (
            label TEXT,
            zone_left INTEGER,
            geometry GEOMETRY,
            index_right INTEGER,
            name TEXT,
            zone_right INTEGER
        );
        insert into sites_in_districts values
            ('well A', 1, 'POINT (1 1)', 0, 'north', 1),
            ('well B', 1, 'POINT (2 3)', 0, 'north', 1),
            ('mast C', 2, 'POINT (11 2)', 1, 'south', 2);

        create table crs (name TEXT, crs TEXT);
        insert into crs values
            ('districts', 'EPSG:4326'),
            ('sites', 'EPSG:4326'),
            ('sites_in_districts', 'EPSG:4326');
        ",
    )?;
    Ok(())
}
