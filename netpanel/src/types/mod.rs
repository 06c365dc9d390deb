//! Type definitions and constants.
//!
//! This module contains NetworkManager constants shared by the adapters.

pub(crate) mod constants;
