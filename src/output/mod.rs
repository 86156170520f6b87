//! Generated program persistence: source files, build records, hashing.

pub mod hasher;
pub mod record;
