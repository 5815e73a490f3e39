//! OPF package document parsing — bibliographic fields, creator/contributor
//! role partitioning, and the page/image manifest lists.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::{NsReader, Reader};

use bloom_core::error::{ConvertError, Result};
use bloom_core::metadata::BookMetadata;

const OPF_NS: &[u8] = b"http://www.idpf.org/2007/opf";
const DC_NS: &[u8] = b"http://purl.org/dc/elements/1.1/";

/// Subfolder beneath the EPUB folder that manifest hrefs resolve against.
const CONTENT_ROOT: &str = "content";

/// Read the metadata record for an unpacked EPUB.
///
/// This is the only way to obtain a `BookMetadata`: either every field is
/// populated or the whole extraction fails.
pub fn read_book_metadata(epub_folder: &Path) -> Result<BookMetadata> {
    let container_path = epub_folder.join("META-INF").join("container.xml");
    let container = fs::read_to_string(&container_path)?;
    let relpath = rootfile_path(&container)?.ok_or(ConvertError::MissingRootfile)?;

    let opf_path = epub_folder.join(&relpath);
    log::info!("Package document: {}", opf_path.display());
    let opf = fs::read_to_string(&opf_path)?;

    parse_package(&opf, epub_folder)
}

/// Read container.xml and return the first rootfile's full-path, if any.
fn rootfile_path(container: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(container);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"rootfile" {
                    return Ok(attr_value(e, b"full-path").filter(|p| !p.is_empty()));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(ConvertError::Xml(format!(
                    "XML error in container.xml: {}",
                    e
                )))
            }
            _ => {}
        }
    }
}

/// Parse an OPF package document into a metadata record.
///
/// Manifest hrefs are percent-decoded and resolved against
/// `<epub_folder>/content/`.
fn parse_package(opf: &str, epub_folder: &Path) -> Result<BookMetadata> {
    let raw = parse_metadata_section(opf)?;
    let items = parse_manifest_items(opf)?;

    let identifier = require(raw.identifier, "dc:identifier")?;
    let title = require(raw.title, "dc:title")?;
    let language_code = require(raw.language, "dc:language")?;
    let description = require(raw.description, "dc:description")?;
    let modified_raw = require(raw.modified, "dcterms:modified")?;
    let modified = DateTime::parse_from_rfc3339(&modified_raw)
        .map_err(|_| ConvertError::MalformedTimestamp(modified_raw.clone()))?
        .with_timezone(&Utc);

    // Partition by role refinement: the index built above replaces per-entry
    // document queries, so a creator id never ends up inside a query string.
    let mut authors = Vec::new();
    let mut other_creators = Vec::new();
    for (id, name) in raw.creators {
        match lookup_role(&raw.refinements, id.as_deref()) {
            None | Some("aut") => authors.push(name),
            Some(_) => other_creators.push(name),
        }
    }
    let mut illustrators = Vec::new();
    let mut other_contributors = Vec::new();
    for (id, name) in raw.contributors {
        match lookup_role(&raw.refinements, id.as_deref()) {
            None | Some("ill") => illustrators.push(name),
            Some(_) => other_contributors.push(name),
        }
    }

    let content_root = epub_folder.join(CONTENT_ROOT);
    let mut page_files = Vec::new();
    let mut image_files = Vec::new();
    for item in items {
        let href = percent_decode_str(&item.href).decode_utf8_lossy();
        if item.media_type == "application/xhtml+xml" && item.id != "toc" {
            page_files.push(content_root.join(href.as_ref()));
        } else if item.media_type.starts_with("image/") {
            image_files.push(content_root.join(href.as_ref()));
        }
    }

    Ok(BookMetadata {
        identifier,
        title,
        language_code,
        description,
        modified,
        authors,
        illustrators,
        other_creators,
        other_contributors,
        page_files,
        image_files,
    })
}

fn require(value: Option<String>, field: &str) -> Result<String> {
    value.ok_or_else(|| ConvertError::MissingRequiredField(field.to_string()))
}

fn lookup_role<'a>(refinements: &'a HashMap<String, String>, id: Option<&str>) -> Option<&'a str> {
    refinements.get(id?).map(String::as_str)
}

/// Raw contents of the `<metadata>` section, before validation.
#[derive(Default)]
struct RawMetadata {
    identifier: Option<String>,
    title: Option<String>,
    language: Option<String>,
    description: Option<String>,
    modified: Option<String>,
    /// (element id, name) pairs in document order.
    creators: Vec<(Option<String>, String)>,
    contributors: Vec<(Option<String>, String)>,
    /// Element id → MARC relator role, from
    /// `meta[refines="#id"][property="role"][scheme="marc:relators"]`.
    refinements: HashMap<String, String>,
}

/// What the current text event belongs to.
enum Pending {
    None,
    Identifier,
    Title,
    Language,
    Description,
    Modified,
    Creator(Option<String>),
    Contributor(Option<String>),
    Refinement(String),
}

fn parse_metadata_section(opf: &str) -> Result<RawMetadata> {
    let mut reader = NsReader::from_str(opf);
    let mut raw = RawMetadata::default();
    let mut in_metadata = false;
    let mut pending = Pending::None;
    let mut buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let (ns, local) = reader.resolve_element(e.name());
                let ns = bound_ns(&ns);
                if local.as_ref() == b"metadata" && ns == OPF_NS {
                    in_metadata = true;
                } else if in_metadata {
                    pending = pending_for(e, ns, local.as_ref());
                    buf.clear();
                }
            }
            Ok(Event::Text(ref t)) => {
                if let Ok(text) = t.unescape() {
                    buf.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => {
                let (ns, local) = reader.resolve_element(e.name());
                if local.as_ref() == b"metadata" && bound_ns(&ns) == OPF_NS {
                    break;
                }
                commit(&mut raw, std::mem::replace(&mut pending, Pending::None), &buf);
                buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ConvertError::Xml(format!(
                    "XML error in package document: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(raw)
}

fn pending_for(e: &BytesStart, ns: &[u8], local: &[u8]) -> Pending {
    if ns == DC_NS {
        return match local {
            b"identifier" => Pending::Identifier,
            b"title" => Pending::Title,
            b"language" => Pending::Language,
            b"description" => Pending::Description,
            b"creator" => Pending::Creator(attr_value(e, b"id")),
            b"contributor" => Pending::Contributor(attr_value(e, b"id")),
            _ => Pending::None,
        };
    }
    if ns == OPF_NS && local == b"meta" {
        let property = attr_value(e, b"property");
        match property.as_deref() {
            Some("dcterms:modified") => return Pending::Modified,
            Some("role") => {
                let scheme = attr_value(e, b"scheme");
                let refines = attr_value(e, b"refines");
                if scheme.as_deref() == Some("marc:relators") {
                    if let Some(target) = refines.as_deref().and_then(|r| r.strip_prefix('#')) {
                        return Pending::Refinement(target.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    Pending::None
}

fn commit(raw: &mut RawMetadata, pending: Pending, buf: &str) {
    let text = buf.trim().to_string();
    match pending {
        Pending::None => {}
        Pending::Identifier => set_first(&mut raw.identifier, text),
        Pending::Title => set_first(&mut raw.title, text),
        Pending::Language => set_first(&mut raw.language, text),
        Pending::Description => set_first(&mut raw.description, text),
        Pending::Modified => set_first(&mut raw.modified, text),
        Pending::Creator(id) => raw.creators.push((id, text)),
        Pending::Contributor(id) => raw.contributors.push((id, text)),
        Pending::Refinement(target) => {
            raw.refinements.insert(target, text);
        }
    }
}

/// A required field is taken from its first occurrence only.
fn set_first(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

struct RawItem {
    id: String,
    href: String,
    media_type: String,
}

/// Parse the manifest section, preserving declaration order.
fn parse_manifest_items(opf: &str) -> Result<Vec<RawItem>> {
    let mut reader = NsReader::from_str(opf);
    let mut items = Vec::new();
    let mut in_manifest = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let (ns, local) = reader.resolve_element(e.name());
                if bound_ns(&ns) != OPF_NS {
                    continue;
                }
                if local.as_ref() == b"manifest" {
                    in_manifest = true;
                } else if local.as_ref() == b"item" && in_manifest {
                    let id = attr_value(e, b"id");
                    let href = attr_value(e, b"href");
                    let media_type = attr_value(e, b"media-type");
                    if let (Some(id), Some(href), Some(media_type)) = (id, href, media_type) {
                        items.push(RawItem {
                            id,
                            href,
                            media_type,
                        });
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"manifest" {
                    in_manifest = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ConvertError::Xml(format!(
                    "XML error in package manifest: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(items)
}

fn bound_ns<'a>(ns: &'a ResolveResult) -> &'a [u8] {
    match ns {
        ResolveResult::Bound(Namespace(n)) => n,
        _ => b"",
    }
}

fn attr_value(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}
