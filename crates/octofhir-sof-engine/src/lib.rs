//! Runtime layers of the SQL-on-FHIR engine
//!
//! A Lambda-style serving architecture over the compiled queries from
//! `octofhir-sof-sql`:
//!
//! - [`BatchRunner`] executes against a materialized view when one exists,
//!   falling back to compile-and-run over the live resource tables, with a
//!   TTL result cache and execution statistics.
//! - [`SpeedLayer`] holds individually cached recent documents and projects
//!   them into batch-shaped rows in memory.
//! - [`ServingLayer`] routes a query to both and merges the results, with
//!   speed-layer rows superseding batch rows for the same resource id. A
//!   speed-layer outage degrades the call to batch-only, never fails it.
//! - [`IntegrityValidator`] runs the out-of-band consistency battery over
//!   materialized views; [`MatviewRefresher`] rebuilds them under
//!   single-writer discipline.
//!
//! Database access goes through the [`DocumentStore`] trait; the
//! `tokio-postgres` implementation lives in [`postgres`].

mod batch;
mod hybrid;
mod integrity;
pub mod postgres;
mod projection;
mod refresh;
mod speed;
mod stats;
mod store;

pub use batch::*;
pub use hybrid::*;
pub use integrity::*;
pub use postgres::{PostgresConfig, PostgresStore};
pub use projection::*;
pub use refresh::*;
pub use speed::*;
pub use stats::*;
pub use store::*;
