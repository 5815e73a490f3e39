//! The Bloom book document being filled in.
//!
//! A blank Bloom book is an HTML file with a hidden `div#bloomDataDiv`
//! holding one child per data key, "live" editable divs elsewhere in the
//! tree that mirror those keys, and a trailing inside-back-cover page that
//! marks where new content pages are inserted.

use std::fs;
use std::path::Path;

use markup5ever_rcdom::{Handle, RcDom};

use bloom_core::error::{ConvertError, Result};
use bloom_utils::xml::{escape_xml_attr, escape_xml_text};

use crate::dom;

/// Data-key of the canonical language for the book's content.
pub const CONTENT_LANGUAGE_KEY: &str = "contentLanguage1";
/// Data-key holding the cover credits markup.
pub const COVER_CREDITS_KEY: &str = "smallCoverCredits";
/// Generic "any language" code marking template placeholders; mirrors
/// tagged with it are never updated with real content.
pub const GENERIC_LANG: &str = "z";

const BOUNDARY_PAGE: &str = "insideBackCover";

pub struct BloomDoc {
    dom: RcDom,
}

impl BloomDoc {
    /// Parse a blank Bloom book. The data div must be present; everything
    /// else is checked lazily by the operations that need it.
    pub fn parse(html: &str) -> Result<Self> {
        let doc = Self {
            dom: dom::parse_document_str(html),
        };
        doc.data_div()
            .ok_or_else(|| ConvertError::Template("no bloomDataDiv in template".to_string()))?;
        Ok(doc)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let html = fs::read_to_string(path)?;
        Self::parse(&html)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, dom::serialize_document(&self.dom))?;
        Ok(())
    }

    /// Root handle, for callers that need to inspect the whole tree.
    pub fn document(&self) -> &Handle {
        &self.dom.document
    }

    fn data_div(&self) -> Option<Handle> {
        dom::find_all_where(&self.dom.document, &|h| {
            dom::is_element(h, "div") && dom::attr(h, "id").as_deref() == Some("bloomDataDiv")
        })
        .into_iter()
        .next()
    }

    /// Canonical data node for a key, if present.
    pub fn data_element(&self, key: &str) -> Option<Handle> {
        let data_div = self.data_div()?;
        let children = data_div.children.borrow();
        children
            .iter()
            .find(|child| dom::attr(child, "data-book").as_deref() == Some(key))
            .cloned()
    }

    fn data_element_or_create(&self, key: &str) -> Handle {
        if let Some(existing) = self.data_element(key) {
            return existing;
        }
        let node = dom::new_element("div", &[("data-book", key)]);
        // parse() guarantees the data div exists
        let data_div = self.data_div().expect("bloomDataDiv checked at parse time");
        dom::append_child(&data_div, node.clone());
        node
    }

    /// Live editable nodes mirroring a data key: `bloom-editable` divs with
    /// the same `data-book` and a concrete (non-generic) language tag.
    fn mirrors(&self, key: &str) -> Vec<Handle> {
        dom::find_all_where(&self.dom.document, &|h| {
            dom::is_element(h, "div")
                && dom::has_class(h, "bloom-editable")
                && dom::attr(h, "data-book").as_deref() == Some(key)
                && matches!(dom::attr(h, "lang"), Some(lang) if lang != GENERIC_LANG)
        })
    }

    /// The one place a data value changes: replace the canonical node's
    /// content, then every mirror's, from the same factory. The factory is
    /// called once per target because a node cannot have two parents.
    fn fan_out(&self, key: &str, make: impl Fn() -> Vec<Handle>) {
        let canonical = self.data_element_or_create(key);
        dom::replace_children(&canonical, make());
        for mirror in self.mirrors(key) {
            dom::replace_children(&mirror, make());
        }
    }

    /// Set a data key to plain text.
    pub fn set_data_text(&self, key: &str, value: &str) {
        self.fan_out(key, || vec![dom::new_text(value)]);
    }

    /// Set a data key to a single paragraph of text (escaped).
    pub fn set_data_para(&self, key: &str, text: &str) {
        self.set_data_markup(key, &format!("<p>{}</p>", escape_xml_text(text)));
    }

    /// Set a data key to arbitrary markup. Callers are responsible for
    /// escaping any user-supplied text inside `markup` first.
    pub fn set_data_markup(&self, key: &str, markup: &str) {
        self.fan_out(key, || dom::parse_body_fragment(markup));
    }

    /// Current inner markup of a data key's canonical node.
    pub fn data_markup(&self, key: &str) -> String {
        self.data_element(key)
            .map(|node| dom::inner_html(&node))
            .unwrap_or_default()
    }

    /// Append markup to a data key, keeping mirrors in step.
    pub fn append_data_markup(&self, key: &str, markup: &str) {
        let combined = format!("{}{}", self.data_markup(key), markup);
        self.set_data_markup(key, &combined);
    }

    /// Set the book title: the document `<title>`, the `bookTitle` data key,
    /// and every live mirror.
    pub fn set_title(&self, title: &str) {
        if let Some(title_node) = dom::find_first_element(&self.dom.document, "title") {
            dom::replace_children(&title_node, vec![dom::new_text(title)]);
        }
        self.set_data_para("bookTitle", title);
    }

    /// Record the cover image and point the template's cover img at it.
    pub fn set_cover_image(&self, src: &str) {
        self.set_data_text("coverImage", src);
        let cover_imgs = dom::find_all_where(&self.dom.document, &|h| {
            dom::is_element(h, "img") && dom::attr(h, "data-book").as_deref() == Some("coverImage")
        });
        if let Some(img) = cover_imgs.first() {
            dom::set_attr(img, "src", src);
        }
    }

    /// Append an illustration to the inside-front-cover data key, wrapped
    /// in its own paragraph.
    pub fn add_inside_front_cover_image(&self, src: &str) {
        let para = format!(r#"<p><img src="{}"></p>"#, escape_xml_attr(src));
        self.append_data_markup("insideFrontCover", &para);
    }

    /// Insert a fully-built page div immediately before the inside-back-cover
    /// boundary page, preserving insertion order as visual page order.
    pub fn insert_page_before_back_cover(&self, page: Handle) -> Result<()> {
        let body = dom::find_first_element(&self.dom.document, "body")
            .ok_or_else(|| ConvertError::Template("template has no body".to_string()))?;

        let mut children = body.children.borrow_mut();
        let boundary = children
            .iter()
            .position(|c| dom::attr(c, "data-xmatter-page").as_deref() == Some(BOUNDARY_PAGE))
            .ok_or_else(|| {
                ConvertError::Template("no insideBackCover page in template".to_string())
            })?;

        page.parent.set(Some(std::rc::Rc::downgrade(&body)));
        children.insert(boundary, page);
        Ok(())
    }
}
