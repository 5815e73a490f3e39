//! Bibliographic and structural metadata extracted from an EPUB package.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Everything the page converter needs to know about a book.
///
/// Built once per conversion run by `bloom-epub`'s factory and immutable
/// afterwards. There is no partially-initialized state: a record either
/// exists with every field populated or extraction failed with an error.
#[derive(Debug, Clone)]
pub struct BookMetadata {
    pub identifier: String,
    pub title: String,
    pub language_code: String,
    pub description: String,
    /// Value of the `dcterms:modified` package meta.
    pub modified: DateTime<Utc>,

    /// Creators with no role refinement or the MARC relator role `aut`.
    pub authors: Vec<String>,
    /// Contributors with no role refinement or the MARC relator role `ill`.
    pub illustrators: Vec<String>,
    /// Creators with any other role refinement.
    pub other_creators: Vec<String>,
    /// Contributors with any other role refinement.
    pub other_contributors: Vec<String>,

    /// XHTML manifest items (minus the `toc` item) in declaration order.
    /// Index 0 is always treated as the cover page.
    pub page_files: Vec<PathBuf>,
    /// Manifest items with an `image/*` media type, in declaration order.
    pub image_files: Vec<PathBuf>,
}
