//! Framewright – enumerative synthesis of dataframe pipelines.
//!
//! Given a set of named datasets and one target dataset, framewright
//! searches a small grammar of dataframe operators for a program that
//! reproduces the target exactly:
//! * A [`grammar::Candidate`] is one program: a binding reference, a
//!   dissolve (group and merge geometry), a relational merge, or a spatial
//!   join.
//! * [`generate`] enumerates candidates lazily in a fixed order, cheapest
//!   programs first, with the two binary families interleaved fairly.
//! * The [`oracle::Comparison`] decides whether a candidate's output *is*
//!   the target; matching compares strictly, down to dtypes, geometry types
//!   and coordinate reference systems.
//! * A [`search::Synthesizer`] drives the walk; [`parallel`] does the same
//!   across threads off one shared stream.
//!
//! Candidates are cheap syntax and interpretation is the expensive part,
//! so the whole engine leans on laziness: nothing is evaluated until the
//! stream consumer asks, and a first-match run touches exactly as many
//! candidates as it reports.
//!
//! ## Modules
//! * [`frame`] – columns, typed values and the dataset operators (merge,
//!   dissolve, spatial join).
//! * [`geom`] – planar geometry: WKT parsing, spatial predicates and the
//!   grid index backing spatial joins.
//! * [`oracle`] – deep frame equality with tunable strictness.
//! * [`bindings`] – the name-to-frame environment a search runs over.
//! * [`grammar`] – the candidate program grammar.
//! * [`generate`] – lazy candidate generators and the combined stream.
//! * [`search`] – sequential search policies: first match, all matches,
//!   traced.
//! * [`parallel`] – shared-cursor concurrent evaluation.
//! * [`store`] – SQLite-backed binding stores.
//! * [`server`] – HTTP/WebSocket front end.
//!
//! ## Stores
//! A store is a plain SQLite file: one table per binding, WKT text for
//! geometry columns, an optional `crs` table for coordinate reference
//! systems. [`store::load_bindings`] reads it into an environment; the
//! served API holds one table out as the target of each request.
//!
//! ## Quick Start
//! ```
//! use framewright::bindings::Bindings;
//! use framewright::frame::{Column, Dtype, Frame, JoinMode, Value};
//! use framewright::search::Synthesizer;
//!
//! fn ints(name: &str, values: &[i64]) -> Column {
//!     let values = values.iter().copied().map(Value::Int).collect();
//!     Column::new(name, Dtype::Int, values).unwrap()
//! }
//!
//! let mut bindings = Bindings::new();
//! bindings.insert(
//!     "orders",
//!     Frame::new(vec![ints("customer", &[1, 2, 3]), ints("total", &[9, 12, 30])]).unwrap(),
//! );
//! bindings.insert(
//!     "vips",
//!     Frame::new(vec![ints("id", &[2, 3, 4]), ints("tier", &[1, 1, 2])]).unwrap(),
//! );
//!
//! // A dataset somebody derived by hand; we want the recipe back.
//! let orders = bindings.frame("orders").unwrap();
//! let vips = bindings.frame("vips").unwrap();
//! let target = orders.merge(&vips, JoinMode::Inner, "customer", "id").unwrap();
//!
//! let program = Synthesizer::new(&bindings, &target).find_first().unwrap();
//! assert_eq!(
//!     program.to_string(),
//!     "merge(orders, vips, how=\"inner\", left_on=\"customer\", right_on=\"id\")"
//! );
//! ```

pub mod bindings;
pub mod error;
pub mod frame;
pub mod generate;
pub mod geom;
pub mod grammar;
pub mod oracle;
pub mod parallel;
pub mod search;
pub mod server;
pub mod store;
