//! End-of-run summary of a conversion, including per-page problems.

use std::fmt;
use std::path::{Path, PathBuf};

/// Outcome of a conversion run. Page-level problems are collected here
/// instead of aborting the run, so a book with one odd page still converts
/// the rest.
#[derive(Debug, Default)]
pub struct ConversionReport {
    pub images_copied: usize,
    pub pages_inserted: usize,
    pub issues: Vec<PageIssue>,
}

#[derive(Debug)]
pub struct PageIssue {
    pub page: PathBuf,
    pub kind: PageIssueKind,
}

#[derive(Debug)]
pub enum PageIssueKind {
    /// The page did not classify as cover or simple image+text. End-credits
    /// pages land here; converting them is intentionally unsupported.
    UnsupportedPageKind,
    /// The page could not be read or did not have the expected XHTML shape.
    Malformed(String),
}

impl fmt::Display for PageIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageIssueKind::UnsupportedPageKind => write!(f, "unsupported page kind"),
            PageIssueKind::Malformed(reason) => write!(f, "malformed page: {}", reason),
        }
    }
}

impl ConversionReport {
    pub fn add_unsupported(&mut self, page: &Path) {
        self.issues.push(PageIssue {
            page: page.to_path_buf(),
            kind: PageIssueKind::UnsupportedPageKind,
        });
    }

    pub fn add_malformed(&mut self, page: &Path, reason: impl Into<String>) {
        self.issues.push(PageIssue {
            page: page.to_path_buf(),
            kind: PageIssueKind::Malformed(reason.into()),
        });
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Log a one-line summary plus one warning per skipped page.
    pub fn log_summary(&self) {
        log::info!(
            "Conversion finished: {} images copied, {} pages inserted, {} pages skipped",
            self.images_copied,
            self.pages_inserted,
            self.issues.len()
        );
        for issue in &self.issues {
            log::warn!("Skipped {}: {}", issue.page.display(), issue.kind);
        }
    }
}
