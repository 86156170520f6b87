//! Core compiler logic: types, manifest parsing, context resolution, translation.

pub mod builder;
pub mod error;
pub mod naming;
pub mod parser;
pub mod resolver;
pub mod translate;
pub mod types;
