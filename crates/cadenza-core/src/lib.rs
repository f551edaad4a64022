//! Core domain model for cadenza.
//!
//! This crate defines the records that flow through the star-schema batch
//! job (catalog songs, listening events, and the dimension and fact rows
//! derived from them), their Arrow table layouts, and the order-independent
//! distinct helpers the builders rely on. It performs no I/O.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod distinct;
pub mod error;
pub mod model;
pub mod table;

pub use error::{Error, Result};
pub use table::Table;
