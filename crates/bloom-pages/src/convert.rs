//! The conversion run: copy images, inject bibliographic data, and turn
//! each source page into the matching piece of the Bloom document.

use std::fs;
use std::path::Path;

use markup5ever_rcdom::{Handle, RcDom};
use uuid::Uuid;

use bloom_core::error::{ConvertError, Result};
use bloom_core::metadata::BookMetadata;
use bloom_core::report::ConversionReport;
use bloom_utils::xml::{escape_xml_text, strip_default_xmlns};

use crate::classify::{self, PageElement, PageKind};
use crate::doc::{BloomDoc, CONTENT_LANGUAGE_KEY, COVER_CREDITS_KEY};
use crate::dom;
use crate::template;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Converts one book into one Bloom document. The document is mutated in
/// place; the metadata is read-only.
pub struct BookConverter<'a> {
    metadata: &'a BookMetadata,
    book_folder: &'a Path,
    doc: &'a BloomDoc,
}

impl<'a> BookConverter<'a> {
    pub fn new(metadata: &'a BookMetadata, book_folder: &'a Path, doc: &'a BloomDoc) -> Self {
        Self {
            metadata,
            book_folder,
            doc,
        }
    }

    /// Run the whole conversion. Metadata injection and image copying are
    /// fatal on failure; per-page problems are collected in the report and
    /// the remaining pages still convert.
    pub fn convert_book(&self) -> Result<ConversionReport> {
        let mut report = ConversionReport::default();

        self.copy_images(&mut report)?;

        self.doc
            .set_data_text(CONTENT_LANGUAGE_KEY, &self.metadata.language_code);
        self.doc.set_data_text(COVER_CREDITS_KEY, "");

        for (number, page_file) in self.metadata.page_files.iter().enumerate() {
            match self.convert_page(number, page_file, &mut report) {
                Ok(()) => {}
                Err(ConvertError::SourcePageMalformed { reason, .. }) => {
                    report.add_malformed(page_file, reason);
                }
                Err(ConvertError::Io(e)) => {
                    report.add_malformed(page_file, e.to_string());
                }
                // Template problems mean the target document cannot be
                // trusted any further; stop the run.
                Err(other) => return Err(other),
            }
        }

        report.log_summary();
        Ok(report)
    }

    /// Copy every referenced image into the book folder, flat by filename.
    /// A name collision silently overwrites; that is accepted behavior, not
    /// an error.
    fn copy_images(&self, report: &mut ConversionReport) -> Result<()> {
        for image in &self.metadata.image_files {
            let Some(file_name) = image.file_name() else {
                log::warn!("Image entry has no file name: {}", image.display());
                continue;
            };
            let dest = self.book_folder.join(file_name);
            fs::copy(image, &dest).map_err(|source| ConvertError::ImageCopyFailed {
                src: image.clone(),
                dest: dest.clone(),
                source,
            })?;
            report.images_copied += 1;
        }
        Ok(())
    }

    fn convert_page(
        &self,
        number: usize,
        page_file: &Path,
        report: &mut ConversionReport,
    ) -> Result<()> {
        let page = SourcePage::load(page_file)?;
        let children = classify::scan_children(&page.body);

        match classify::classify(number, &children) {
            PageKind::Cover => self.convert_cover_page(&page.body),
            PageKind::SimpleImageText => {
                self.convert_content_page(number, &children)?;
                report.pages_inserted += 1;
            }
            PageKind::Unrecognized => {
                log::warn!(
                    "Page {} ({}) does not match any supported page shape",
                    number,
                    page_file.display()
                );
                report.add_unsupported(page_file);
            }
        }
        Ok(())
    }

    /// Merge the cover page into the template's existing cover nodes.
    ///
    /// The first image is the cover image; later images go to the inside
    /// front cover. The first paragraph is the title; later paragraphs are
    /// cover credits, carried over verbatim.
    fn convert_cover_page(&self, body: &Handle) {
        let mut image_set = false;
        let mut title_set = false;
        let mut credits_set = false;

        for child in body.children.borrow().iter() {
            if dom::is_element(child, "img") {
                let src = dom::attr(child, "src").unwrap_or_default();
                if !image_set {
                    self.doc.set_cover_image(&src);
                    image_set = true;
                } else {
                    self.doc.add_inside_front_cover_image(&src);
                }
            } else if dom::is_element(child, "p") {
                if !title_set {
                    let title = dom::text_content(child);
                    self.doc.set_title(title.trim());
                    title_set = true;
                } else {
                    let para = strip_default_xmlns(&dom::outer_html(child));
                    self.doc.append_data_markup(COVER_CREDITS_KEY, &para);
                    credits_set = true;
                }
            }
        }

        if !title_set {
            self.doc.set_title(&self.metadata.title);
        }
        if !credits_set {
            if let Some(markup) = credits_markup(self.metadata) {
                self.doc.append_data_markup(COVER_CREDITS_KEY, &markup);
            }
        }
    }

    /// Build a Basic Text & Picture page from the descriptors and insert it
    /// before the boundary page. The node is assembled completely first, so
    /// a failure never leaves a half-built page in the document.
    fn convert_content_page(&self, number: usize, children: &[PageElement]) -> Result<()> {
        let mut image_src = String::new();
        let mut payload = String::new();
        for child in children {
            match child {
                PageElement::Image(src) => image_src = src.clone(),
                PageElement::NonEmptyText(markup) => {
                    payload.push_str(&strip_default_xmlns(markup));
                }
                PageElement::Whitespace => {}
            }
        }

        let page_id = Uuid::new_v4().to_string();
        let page_div = dom::new_element(
            "div",
            &[
                ("class", template::PAGE_CLASS),
                ("id", &page_id),
                ("data-pagelineage", template::PAGE_LINEAGE),
                ("data-page-number", &number.to_string()),
            ],
        );
        let inner = template::basic_text_and_picture(&image_src, &payload);
        dom::replace_children(&page_div, dom::parse_body_fragment(&inner));

        self.doc.insert_page_before_back_cover(page_div)
    }
}

/// A parsed source page with its shape verified.
///
/// The whole tree is held alongside the body handle: rcdom tears a node's
/// descendants down when the document root drops, so the body would be
/// emptied if the `RcDom` were let go.
struct SourcePage {
    _dom: RcDom,
    body: Handle,
}

impl SourcePage {
    fn load(path: &Path) -> Result<Self> {
        let html = fs::read_to_string(path)?;
        let dom = dom::parse_document_str(&html);
        let html_el = dom::find_first_element(&dom.document, "html")
            .ok_or_else(|| malformed(path, "no html element"))?;
        if dom::attr(&html_el, "xmlns").as_deref() != Some(XHTML_NS) {
            return Err(malformed(path, "html element is not in the XHTML namespace"));
        }
        let body = dom::find_first_element(&html_el, "body")
            .ok_or_else(|| malformed(path, "no body element"))?;
        Ok(Self { _dom: dom, body })
    }
}

fn malformed(page: &Path, reason: &str) -> ConvertError {
    ConvertError::SourcePageMalformed {
        page: page.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Synthesize cover credits from the metadata lists, one paragraph per
/// non-empty list, in fixed order. Returns None when every list is empty so
/// the caller leaves the credits key untouched.
fn credits_markup(metadata: &BookMetadata) -> Option<String> {
    let mut paragraphs = Vec::new();
    push_credit(&mut paragraphs, &metadata.authors, "Author", "Authors");
    push_credit(
        &mut paragraphs,
        &metadata.illustrators,
        "Illustrator",
        "Illustrators",
    );
    push_credit(
        &mut paragraphs,
        &metadata.other_creators,
        "Creator",
        "Creators",
    );
    push_credit(
        &mut paragraphs,
        &metadata.other_contributors,
        "Contributor",
        "Contributors",
    );
    if paragraphs.is_empty() {
        None
    } else {
        Some(paragraphs.concat())
    }
}

fn push_credit(paragraphs: &mut Vec<String>, names: &[String], singular: &str, plural: &str) {
    if names.is_empty() {
        return;
    }
    let label = if names.len() == 1 { singular } else { plural };
    let joined = names
        .iter()
        .map(|n| escape_xml_text(n))
        .collect::<Vec<_>>()
        .join(", ");
    paragraphs.push(format!("<p>{}: {}</p>", label, joined));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MINI_TEMPLATE;
    use chrono::Utc;
    use std::path::PathBuf;

    fn make_metadata() -> BookMetadata {
        BookMetadata {
            identifier: "urn:uuid:12345".to_string(),
            title: "Too Much Noise".to_string(),
            language_code: "en".to_string(),
            description: "An illustrated story.".to_string(),
            modified: Utc::now(),
            authors: vec!["Jane Doe".to_string()],
            illustrators: Vec::new(),
            other_creators: Vec::new(),
            other_contributors: Vec::new(),
            page_files: Vec::new(),
            image_files: Vec::new(),
        }
    }

    fn xhtml_page(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title></title></head>
<body>{}</body>
</html>"#,
            body
        )
    }

    fn write_page(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, xhtml_page(body)).unwrap();
        path
    }

    fn numbered_pages(doc: &BloomDoc) -> Vec<String> {
        let body = dom::find_first_element(doc.document(), "body").unwrap();
        let pages = body
            .children
            .borrow()
            .iter()
            .filter(|c| dom::has_class(c, "numberedPage"))
            .map(|c| dom::attr(c, "data-page-number").unwrap_or_default())
            .collect();
        pages
    }

    #[test]
    fn test_loaded_page_body_keeps_its_children() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_page(
            dir.path(),
            "page.xhtml",
            r#"<img src="pic.png"/><p>The mouse squeaked.</p>"#,
        );

        // The body handle must stay populated after load() returns; if the
        // page's tree were dropped, every page would scan as empty.
        let page = SourcePage::load(&path).unwrap();
        let children = classify::scan_children(&page.body);
        assert!(children.contains(&PageElement::Image("pic.png".to_string())));
        assert_eq!(classify::classify(1, &children), PageKind::SimpleImageText);
    }

    #[test]
    fn test_credits_markup_single_author() {
        let metadata = make_metadata();
        assert_eq!(
            credits_markup(&metadata).unwrap(),
            "<p>Author: Jane Doe</p>"
        );
    }

    #[test]
    fn test_credits_markup_plural_and_order() {
        let mut metadata = make_metadata();
        metadata.authors = vec!["A One".to_string(), "B Two".to_string()];
        metadata.illustrators = vec!["Pat Painter".to_string()];
        metadata.other_contributors = vec!["Terry Translator".to_string()];
        assert_eq!(
            credits_markup(&metadata).unwrap(),
            "<p>Authors: A One, B Two</p><p>Illustrator: Pat Painter</p><p>Contributor: Terry Translator</p>"
        );
    }

    #[test]
    fn test_credits_markup_escapes_names() {
        let mut metadata = make_metadata();
        metadata.authors = vec!["Ampersand & Sons <Ltd>".to_string()];
        assert_eq!(
            credits_markup(&metadata).unwrap(),
            "<p>Author: Ampersand &amp; Sons &lt;Ltd&gt;</p>"
        );
    }

    #[test]
    fn test_credits_markup_all_empty() {
        let mut metadata = make_metadata();
        metadata.authors.clear();
        assert!(credits_markup(&metadata).is_none());
    }

    #[test]
    fn test_cover_with_no_image_never_sets_cover_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = make_metadata();
        metadata.page_files = vec![write_page(dir.path(), "cover.xhtml", "<p>A Title</p>")];

        let doc = BloomDoc::parse(MINI_TEMPLATE).unwrap();
        let converter = BookConverter::new(&metadata, dir.path(), &doc);
        converter.convert_book().unwrap();

        assert!(doc.data_element("coverImage").is_none());
        assert_eq!(doc.data_markup("bookTitle"), "<p>A Title</p>");
    }

    #[test]
    fn test_cover_credits_from_source_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = make_metadata();
        metadata.page_files = vec![write_page(
            dir.path(),
            "cover.xhtml",
            r#"<img src="cover.png"/>
<p>A Title</p>
<p xmlns="http://www.w3.org/1999/xhtml">Written by Someone Else</p>"#,
        )];

        let doc = BloomDoc::parse(MINI_TEMPLATE).unwrap();
        let converter = BookConverter::new(&metadata, dir.path(), &doc);
        converter.convert_book().unwrap();

        // Source credits win over synthesized metadata credits, and the
        // default namespace declaration is stripped.
        let credits = doc.data_markup(COVER_CREDITS_KEY);
        assert_eq!(credits, "<p>Written by Someone Else</p>");
    }

    #[test]
    fn test_cover_extra_images_go_inside_front_cover() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = make_metadata();
        metadata.page_files = vec![write_page(
            dir.path(),
            "cover.xhtml",
            r#"<img src="cover.png"/><p>A Title</p><img src="extra.png"/>"#,
        )];

        let doc = BloomDoc::parse(MINI_TEMPLATE).unwrap();
        let converter = BookConverter::new(&metadata, dir.path(), &doc);
        converter.convert_book().unwrap();

        assert_eq!(doc.data_markup("coverImage"), "cover.png");
        assert!(doc
            .data_markup("insideFrontCover")
            .contains(r#"<p><img src="extra.png"></p>"#));
    }

    #[test]
    fn test_end_to_end_too_much_noise() {
        let dir = tempfile::tempdir().unwrap();
        let epub = dir.path().join("epub");
        let book = dir.path().join("book");
        fs::create_dir_all(&epub).unwrap();
        fs::create_dir_all(&book).unwrap();

        let image = epub.join("cover.png");
        fs::write(&image, b"png bytes").unwrap();

        let mut metadata = make_metadata();
        metadata.image_files = vec![image];
        metadata.page_files = vec![
            write_page(&epub, "cover.xhtml", r#"<img src="cover.png"/><p>Too Much Noise</p>"#),
            write_page(
                &epub,
                "page1.xhtml",
                r#"<img src="cover.png"/><p>The old house was noisy.</p>"#,
            ),
            write_page(&epub, "page2.xhtml", r#"<img src="cover.png"/>"#),
        ];

        let doc = BloomDoc::parse(MINI_TEMPLATE).unwrap();
        let converter = BookConverter::new(&metadata, &book, &doc);
        let report = converter.convert_book().unwrap();

        assert_eq!(report.images_copied, 1);
        assert_eq!(report.pages_inserted, 2);
        assert!(!report.has_issues());
        assert!(book.join("cover.png").exists());

        // The cover merged into existing template nodes; only the two
        // content pages became new page divs, numbered by source position.
        let title = dom::find_first_element(doc.document(), "title").unwrap();
        assert_eq!(dom::text_content(&title), "Too Much Noise");
        assert_eq!(doc.data_markup("bookTitle"), "<p>Too Much Noise</p>");
        assert_eq!(doc.data_markup(CONTENT_LANGUAGE_KEY), "en");
        assert_eq!(numbered_pages(&doc), vec!["1", "2"]);

        let page_text = dom::find_all_where(doc.document(), &|h| {
            dom::has_class(h, "numberedPage")
        });
        assert!(dom::text_content(&page_text[0]).contains("The old house was noisy."));
    }

    #[test]
    fn test_conversion_is_deterministic_modulo_page_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = make_metadata();
        metadata.page_files = vec![
            write_page(dir.path(), "cover.xhtml", "<p>T</p>"),
            write_page(dir.path(), "page1.xhtml", r#"<img src="a.png"/><p>x</p>"#),
            write_page(dir.path(), "page2.xhtml", "<p>just text</p>"),
        ];

        let run = || {
            let doc = BloomDoc::parse(MINI_TEMPLATE).unwrap();
            let report = BookConverter::new(&metadata, dir.path(), &doc)
                .convert_book()
                .unwrap();
            (report.pages_inserted, numbered_pages(&doc))
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_unrecognized_page_is_reported_not_dropped_silently() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = make_metadata();
        metadata.page_files = vec![
            write_page(dir.path(), "cover.xhtml", "<p>T</p>"),
            write_page(
                dir.path(),
                "credits.xhtml",
                "<p>Thanks to everyone</p><p>and their dog</p>",
            ),
        ];

        let doc = BloomDoc::parse(MINI_TEMPLATE).unwrap();
        let report = BookConverter::new(&metadata, dir.path(), &doc)
            .convert_book()
            .unwrap();

        assert_eq!(report.pages_inserted, 0);
        assert_eq!(report.issues.len(), 1);
        assert!(numbered_pages(&doc).is_empty());
    }

    #[test]
    fn test_page_without_xhtml_namespace_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.xhtml");
        fs::write(&bad, "<html><body><p>T</p></body></html>").unwrap();

        let mut metadata = make_metadata();
        metadata.page_files = vec![
            write_page(dir.path(), "cover.xhtml", "<p>T</p>"),
            bad,
        ];

        let doc = BloomDoc::parse(MINI_TEMPLATE).unwrap();
        let report = BookConverter::new(&metadata, dir.path(), &doc)
            .convert_book()
            .unwrap();
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_duplicate_image_filenames_overwrite_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("pic.png"), b"first").unwrap();
        fs::write(b.join("pic.png"), b"second").unwrap();

        let book = dir.path().join("book");
        fs::create_dir_all(&book).unwrap();

        let mut metadata = make_metadata();
        metadata.image_files = vec![a.join("pic.png"), b.join("pic.png")];

        let doc = BloomDoc::parse(MINI_TEMPLATE).unwrap();
        let report = BookConverter::new(&metadata, &book, &doc)
            .convert_book()
            .unwrap();

        assert_eq!(report.images_copied, 2);
        // Last copy wins.
        assert_eq!(fs::read(book.join("pic.png")).unwrap(), b"second");
    }

    #[test]
    fn test_missing_image_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = make_metadata();
        metadata.image_files = vec![dir.path().join("missing.png")];

        let doc = BloomDoc::parse(MINI_TEMPLATE).unwrap();
        let err = BookConverter::new(&metadata, dir.path(), &doc)
            .convert_book()
            .unwrap_err();
        assert!(matches!(err, ConvertError::ImageCopyFailed { .. }));
    }
}
