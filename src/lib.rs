//! Tron: source-emission backend for distributed query applications.
//!
//! Declarative queries over remote services go in, one compilable Rust module
//! comes out: materialized boundary types, service clients, self-healing call
//! wrappers and one entry point per query.

pub mod cli;
pub mod codegen;
pub mod core;
pub mod output;
