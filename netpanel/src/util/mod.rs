//! Shared helpers for decoding D-Bus values and command output.

pub(crate) mod utils;
