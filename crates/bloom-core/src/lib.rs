//! Shared types for the EPUB → Bloom conversion pipeline.

pub mod error;
pub mod metadata;
pub mod report;
