//! EPUB metadata extraction — reads container.xml and the OPF package
//! document from an unpacked EPUB folder.

mod opf;

pub use opf::read_book_metadata;
