//! ZIP extraction for EPUB packages and blank Bloom book templates.

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

use zip::read::ZipArchive;

/// Extract all files from a ZIP archive to a directory.
///
/// Entries whose names would escape the output directory (absolute paths or
/// `..` segments) are skipped with a warning; EPUBs come from unknown
/// sources.
pub fn extract_zip(zip_path: &Path, output_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut extracted = Vec::new();

    std::fs::create_dir_all(output_dir)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        if !is_contained(&name) {
            log::warn!("Skipping archive entry outside target directory: {}", name);
            continue;
        }

        if name.ends_with('/') {
            std::fs::create_dir_all(output_dir.join(&name))?;
            continue;
        }

        let out_path = output_dir.join(&name);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&out_path)?;
        io::copy(&mut entry, &mut outfile)?;
        extracted.push(out_path);
    }

    Ok(extracted)
}

/// True when a relative entry name stays inside the extraction directory.
fn is_contained(name: &str) -> bool {
    let path = Path::new(name);
    path.components().all(|c| match c {
        Component::Normal(_) | Component::CurDir => true,
        Component::ParentDir | Component::RootDir | Component::Prefix(_) => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn make_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_zip() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("book.zip");
        make_zip(
            &zip_path,
            &[
                ("mimetype", b"application/epub+zip"),
                ("META-INF/container.xml", b"<container/>"),
                ("content/page1.xhtml", b"<html/>"),
            ],
        );

        let out = dir.path().join("out");
        let extracted = extract_zip(&zip_path, &out).unwrap();
        assert_eq!(extracted.len(), 3);
        assert!(out.join("META-INF/container.xml").exists());
        assert_eq!(
            std::fs::read(out.join("content/page1.xhtml")).unwrap(),
            b"<html/>"
        );
    }

    #[test]
    fn test_extract_zip_skips_escaping_entries() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("evil.zip");
        make_zip(
            &zip_path,
            &[("../escape.txt", b"nope"), ("safe.txt", b"ok")],
        );

        let out = dir.path().join("out");
        let extracted = extract_zip(&zip_path, &out).unwrap();
        assert_eq!(extracted.len(), 1);
        assert!(out.join("safe.txt").exists());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained("content/images/cover.png"));
        assert!(!is_contained("../outside.txt"));
        assert!(!is_contained("/etc/passwd"));
    }
}
