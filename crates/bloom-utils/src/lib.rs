//! File and markup utilities shared by the conversion crates.

pub mod archive;
pub mod xml;
