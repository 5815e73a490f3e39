//! Page conversion — turns EPUB content pages into Bloom page divs and
//! merges bibliographic data into a blank Bloom book document.

pub mod classify;
pub mod convert;
pub mod doc;
pub mod dom;
pub mod template;

pub use convert::BookConverter;
pub use doc::BloomDoc;
