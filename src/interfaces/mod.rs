//! Driving adapters: the JSON-lines command protocol and CSV export.

pub mod csv;
pub mod json;
