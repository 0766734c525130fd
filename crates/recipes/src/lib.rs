#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]
//! Built-in recipes for crucible
//!
//! Five upstream libraries described as [`Recipe`](crucible_builder::Recipe)
//! tables, the [`Catalog`] that serves them with their bundled source
//! tables, and dependency graph resolution across them.

mod catalog;
mod cyrus_sasl;
mod graph;
mod libpq;
mod librdkafka;
mod rocksdb;
mod soci;
#[cfg(test)]
mod testing;

pub use catalog::Catalog;
pub use cyrus_sasl::CyrusSasl;
pub use graph::{resolve_graph, DependencyGraph, GraphNode};
pub use libpq::Libpq;
pub use librdkafka::Librdkafka;
pub use rocksdb::RocksDb;
pub use soci::Soci;
