//! Heuristic page classification.
//!
//! A source page body is reduced to an ordered list of typed child
//! descriptors, and the classification rules operate on those alone, so the
//! heuristics stay auditable without touching any tree.

use markup5ever_rcdom::Handle;

use crate::dom;

/// One direct child of a source page body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageElement {
    /// An `<img>` element; carries its `src`.
    Image(String),
    /// Any other child carrying non-whitespace text; carries its outer markup.
    NonEmptyText(String),
    /// Whitespace-only text or an element with no visible text.
    Whitespace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// The first page of the book, merged into the template's cover.
    Cover,
    /// One illustration with optional text: becomes a new numbered page.
    SimpleImageText,
    /// Anything else (end credits and the like): explicitly unsupported.
    Unrecognized,
}

/// Reduce a page body's direct children to descriptors, in document order.
pub fn scan_children(body: &Handle) -> Vec<PageElement> {
    body.children
        .borrow()
        .iter()
        .map(|child| {
            if dom::is_element(child, "img") {
                PageElement::Image(dom::attr(child, "src").unwrap_or_default())
            } else if !dom::text_content(child).trim().is_empty() {
                PageElement::NonEmptyText(dom::outer_html(child))
            } else {
                PageElement::Whitespace
            }
        })
        .collect()
}

/// Classify a page by position and shape.
///
/// Page 0 is always the cover. A later page is simple image+text when it has
/// exactly one image and nothing with visible text precedes that image; text
/// after the image is the page's caption and is fine.
pub fn classify(page_index: usize, children: &[PageElement]) -> PageKind {
    if page_index == 0 {
        return PageKind::Cover;
    }

    let mut image_count = 0usize;
    let mut text_seen = false;
    for child in children {
        match child {
            PageElement::Image(_) => {
                if image_count > 0 || text_seen {
                    return PageKind::Unrecognized;
                }
                image_count += 1;
            }
            PageElement::NonEmptyText(_) => text_seen = true,
            PageElement::Whitespace => {}
        }
    }

    if image_count == 1 {
        PageKind::SimpleImageText
    } else {
        PageKind::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img() -> PageElement {
        PageElement::Image("pic.png".to_string())
    }

    fn text() -> PageElement {
        PageElement::NonEmptyText("<p>words</p>".to_string())
    }

    #[test]
    fn test_index_zero_is_cover() {
        assert_eq!(classify(0, &[]), PageKind::Cover);
        assert_eq!(classify(0, &[text(), text()]), PageKind::Cover);
    }

    #[test]
    fn test_one_image_with_text_after() {
        let children = [img(), text(), text()];
        assert_eq!(classify(1, &children), PageKind::SimpleImageText);
    }

    #[test]
    fn test_one_image_with_only_whitespace_siblings() {
        let children = [PageElement::Whitespace, img(), PageElement::Whitespace];
        assert_eq!(classify(3, &children), PageKind::SimpleImageText);
    }

    #[test]
    fn test_two_images_rejected() {
        assert_eq!(classify(1, &[img(), img()]), PageKind::Unrecognized);
        assert_eq!(classify(1, &[img(), text(), img()]), PageKind::Unrecognized);
    }

    #[test]
    fn test_image_after_text_rejected() {
        assert_eq!(classify(1, &[text(), img()]), PageKind::Unrecognized);
    }

    #[test]
    fn test_no_image_rejected() {
        assert_eq!(classify(1, &[]), PageKind::Unrecognized);
        assert_eq!(classify(1, &[text(), text()]), PageKind::Unrecognized);
    }

    #[test]
    fn test_scan_children() {
        let dom = dom::parse_document_str(
            r#"<html><body>
<img src="pic.png">
<p>The mouse squeaked.</p>
<p>   </p>
</body></html>"#,
        );
        let body = dom::find_first_element(&dom.document, "body").unwrap();
        let children = scan_children(&body);

        let images: Vec<_> = children
            .iter()
            .filter(|c| matches!(c, PageElement::Image(_)))
            .collect();
        assert_eq!(images, vec![&PageElement::Image("pic.png".to_string())]);

        let texts: Vec<_> = children
            .iter()
            .filter_map(|c| match c {
                PageElement::NonEmptyText(markup) => Some(markup.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["<p>The mouse squeaked.</p>"]);

        // The empty paragraph and inter-element whitespace are all Whitespace.
        assert_eq!(classify(1, &children), PageKind::SimpleImageText);
    }
}
