//! Integration tests for the builder crate
//!
//! Native tools are replaced by a recording runner; archives are built on
//! the fly and served from a pre-populated download cache.

mod integration;
