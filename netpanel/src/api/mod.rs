//! Public API module.
//!
//! Data types shared by the backend adapters, the coordinator and the
//! presentation layer.

pub mod models;
