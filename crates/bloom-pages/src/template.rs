//! The fixed "Basic Text & Picture" page fragment.

use bloom_utils::xml::escape_xml_attr;

/// Class set for every generated content page.
pub const PAGE_CLASS: &str =
    "bloom-page numberedPage customPage bloom-combinedPage A5Portrait side-right bloom-monolingual";

/// Lineage GUID of the Basic Text & Picture template page.
pub const PAGE_LINEAGE: &str = "adcd48df-e9ab-4a07-afd4-6a24d0398382";

/// Inner markup for a content page: a two-pane vertical split with the
/// illustration on top and the editable text below, plus the empty generic
/// language placeholder the template contract requires.
///
/// `text_markup` must already be sanitized; it is wrapped in a single
/// paragraph unless it already leads with one.
pub fn basic_text_and_picture(image_src: &str, text_markup: &str) -> String {
    let content = text_markup.trim();
    let text_block = if content.starts_with("<p>") || content.starts_with("<p ") {
        content.to_string()
    } else {
        format!("<p>{}</p>", content)
    };

    format!(
        r#"<div class="pageLabel" data-i18n="TemplateBooks.PageLabel.Basic Text &amp; Picture" lang="en">Basic Text &amp; Picture</div>
<div class="pageDescription" lang="en"></div>
<div class="marginBox">
  <div style="min-height: 42px;" class="split-pane horizontal-percent">
    <div class="split-pane-component position-top" style="bottom: 50%">
      <div class="split-pane-component-inner">
        <div class="bloom-imageContainer bloom-leadingElement"><img src="{src}" alt=""></div>
      </div>
    </div>
    <div class="split-pane-divider horizontal-divider" style="bottom: 50%"></div>
    <div class="split-pane-component position-bottom" style="height: 50%">
      <div class="split-pane-component-inner">
        <div class="bloom-translationGroup bloom-trailingElement" data-default-languages="auto">
          <div aria-label="false" role="textbox" spellcheck="true" tabindex="0" style="min-height: 28px;" data-languagetipcontent="English" class="bloom-editable normal-style bloom-content1 bloom-contentNational1 bloom-visibility-code-on" lang="en" contenteditable="true">
            {text}
          </div>
          <div style="" class="bloom-editable normal-style" lang="z" contenteditable="true">
            <p></p>
          </div>
        </div>
      </div>
    </div>
  </div>
</div>"#,
        src = escape_xml_attr(image_src),
        text = text_block,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_text_gets_wrapped() {
        let markup = basic_text_and_picture("pic.png", "plain words");
        assert!(markup.contains("<p>plain words</p>"));
        assert!(markup.contains(r#"<img src="pic.png" alt="">"#));
    }

    #[test]
    fn test_paragraph_payload_kept_as_is() {
        let markup = basic_text_and_picture("pic.png", "<p>already wrapped</p><p>more</p>");
        assert!(markup.contains("<p>already wrapped</p><p>more</p>"));
        assert!(!markup.contains("<p><p>"));
    }

    #[test]
    fn test_image_src_is_attribute_escaped() {
        let markup = basic_text_and_picture(r#"odd"name.png"#, "");
        assert!(markup.contains(r#"src="odd&quot;name.png""#));
    }
}
