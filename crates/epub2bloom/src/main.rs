//! epub2bloom — convert an EPUB illustrated book into a Bloom book.
//!
//! `epub2bloom book.epub --template BlankBloomBook.zip --output books/`
//! unpacks the EPUB, reads its package metadata, unpacks a blank Bloom
//! template next to it, and fills the template in from the EPUB's pages.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::Parser;

use bloom_epub::read_book_metadata;
use bloom_pages::{BloomDoc, BookConverter};
use bloom_utils::archive::extract_zip;

/// Name of the main document inside a blank Bloom template archive.
const TEMPLATE_BOOK_FILE: &str = "Book.htm";

#[derive(Parser)]
#[command(
    name = "epub2bloom",
    version,
    about = "Convert an EPUB illustrated book to a Bloom book"
)]
struct Cli {
    /// The EPUB file to convert
    epub: PathBuf,

    /// Blank Bloom book template archive
    #[arg(short, long)]
    template: PathBuf,

    /// Directory to create the Bloom book in
    #[arg(short, long)]
    output: PathBuf,

    /// Book folder/file name (defaults to the EPUB file stem)
    #[arg(short, long)]
    name: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let book_name = match &cli.name {
        Some(name) => name.clone(),
        None => cli
            .epub
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .context("Cannot derive a book name from the EPUB path. Use --name.")?,
    };

    let epub_folder = cli.output.join(format!("{}-epub", book_name));
    let book_folder = cli.output.join(&book_name);
    fs::create_dir_all(&epub_folder)
        .with_context(|| format!("Failed to create {}", epub_folder.display()))?;

    log::info!(
        "Unpacking {} into {}",
        cli.epub.display(),
        epub_folder.display()
    );
    extract_zip(&cli.epub, &epub_folder)
        .with_context(|| format!("Failed to unpack {}", cli.epub.display()))?;

    let metadata = read_book_metadata(&epub_folder)
        .with_context(|| format!("Failed to read package metadata from {}", cli.epub.display()))?;
    log::info!(
        "\"{}\" [{}]: {} pages, {} images, authors: {}",
        metadata.title,
        metadata.language_code,
        metadata.page_files.len(),
        metadata.image_files.len(),
        if metadata.authors.is_empty() {
            "(none)".to_string()
        } else {
            metadata.authors.join(", ")
        }
    );

    let book_file = prepare_book_folder(&cli.template, &book_folder, &book_name)?;

    let doc = BloomDoc::load(&book_file)
        .with_context(|| format!("Failed to load template document {}", book_file.display()))?;
    let report = BookConverter::new(&metadata, &book_folder, &doc)
        .convert_book()
        .context("Conversion failed")?;

    // Keep the pristine template document around for diffing.
    fs::copy(&book_file, book_folder.join("bookhtml.bak"))
        .with_context(|| format!("Failed to back up {}", book_file.display()))?;
    doc.save(&book_file)
        .with_context(|| format!("Failed to write {}", book_file.display()))?;

    println!(
        "Created {}: {} pages, {} images copied",
        book_file.display(),
        report.pages_inserted,
        report.images_copied
    );
    for issue in &report.issues {
        println!("  skipped {}: {}", issue.page.display(), issue.kind);
    }

    Ok(())
}

/// Unpack the blank template into the book folder and rename its document
/// after the book. Returns the path of the renamed document.
fn prepare_book_folder(template: &Path, book_folder: &Path, book_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(book_folder)
        .with_context(|| format!("Failed to create {}", book_folder.display()))?;
    extract_zip(template, book_folder)
        .with_context(|| format!("Failed to unpack template {}", template.display()))?;

    let source = book_folder.join(TEMPLATE_BOOK_FILE);
    if !source.exists() {
        bail!(
            "Template archive has no {} at its root: {}",
            TEMPLATE_BOOK_FILE,
            template.display()
        );
    }
    let book_file = book_folder.join(format!("{}.htm", book_name));
    fs::rename(&source, &book_file)
        .with_context(|| format!("Failed to rename {}", source.display()))?;
    Ok(book_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_template_zip(path: &Path, book_htm: &str) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file(TEMPLATE_BOOK_FILE, options).unwrap();
        writer.write_all(book_htm.as_bytes()).unwrap();
        writer
            .start_file("customCollectionStyles.css", options)
            .unwrap();
        writer.write_all(b"/* styles */").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_prepare_book_folder_renames_document() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("BlankBloomBook.zip");
        write_template_zip(&template, "<html><body></body></html>");

        let book_folder = dir.path().join("Too Much Noise");
        let book_file = prepare_book_folder(&template, &book_folder, "Too Much Noise").unwrap();

        assert_eq!(book_file, book_folder.join("Too Much Noise.htm"));
        assert!(book_file.exists());
        assert!(!book_folder.join(TEMPLATE_BOOK_FILE).exists());
        assert!(book_folder.join("customCollectionStyles.css").exists());
    }

    #[test]
    fn test_prepare_book_folder_rejects_template_without_document() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("empty.zip");
        let file = fs::File::create(&template).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("readme.txt", options).unwrap();
        writer.write_all(b"not a template").unwrap();
        writer.finish().unwrap();

        let book_folder = dir.path().join("book");
        assert!(prepare_book_folder(&template, &book_folder, "book").is_err());
    }
}
