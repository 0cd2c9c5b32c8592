// Corpus loading module
// Walks an author/book.pdf directory tree and extracts one document per page


use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{AssistantError, Result};

/// Provenance attached to every document and inherited by its chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Author name, taken from the directory name and title-cased
    pub author: String,
    /// Book title, taken from the file stem and title-cased
    pub book: String,
    /// Path of the source PDF file
    pub source_path: PathBuf,
}

/// Raw extracted text of one source page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Summary of a loaded corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusStats {
    pub document_count: usize,
    pub authors: BTreeSet<String>,
    pub books: BTreeSet<String>,
}

impl CorpusStats {
    #[inline]
    pub fn from_documents(documents: &[Document]) -> Self {
        Self {
            document_count: documents.len(),
            authors: documents
                .iter()
                .map(|d| d.metadata.author.clone())
                .collect(),
            books: documents.iter().map(|d| d.metadata.book.clone()).collect(),
        }
    }
}

/// Load every PDF under `root`, where each immediate subdirectory of `root`
/// is an author name and each PDF inside it is one book.
///
/// Produces one `Document` per non-blank extracted page. Subdirectories
/// containing no PDFs are skipped; a missing root or a corpus with zero PDF
/// files overall is an `Ingestion` error.
#[inline]
pub fn load_corpus(root: &Path) -> Result<Vec<Document>> {
    if !root.is_dir() {
        return Err(AssistantError::Ingestion(format!(
            "corpus root does not exist or is not a directory: {}",
            root.display()
        )));
    }

    info!("Loading corpus from {}", root.display());

    let mut documents = Vec::new();
    let mut pdf_count = 0usize;

    let mut author_dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    author_dirs.sort();

    for author_dir in &author_dirs {
        let author = author_dir
            .file_name()
            .map(|name| title_case(&name.to_string_lossy()))
            .unwrap_or_default();

        let mut pdf_paths = Vec::new();
        collect_pdfs(author_dir, &mut pdf_paths)?;
        pdf_paths.sort();

        if pdf_paths.is_empty() {
            debug!("Skipping author directory with no PDFs: {}", author);
            continue;
        }

        for pdf_path in pdf_paths {
            pdf_count += 1;
            let pages = load_book(&pdf_path, &author)?;
            documents.extend(pages);
        }
    }

    if pdf_count == 0 {
        return Err(AssistantError::Ingestion(format!(
            "no PDF files found under corpus root: {}",
            root.display()
        )));
    }

    info!(
        "Loaded {} documents from {} PDF files",
        documents.len(),
        pdf_count
    );

    Ok(documents)
}

/// Extract one document per non-blank page of a single PDF
fn load_book(pdf_path: &Path, author: &str) -> Result<Vec<Document>> {
    let book = pdf_path
        .file_stem()
        .map(|stem| title_case(&stem.to_string_lossy()))
        .unwrap_or_default();

    debug!("Extracting text from {}", pdf_path.display());

    let bytes = fs::read(pdf_path).map_err(|e| {
        AssistantError::Ingestion(format!("failed to read {}: {}", pdf_path.display(), e))
    })?;

    let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| {
        AssistantError::Ingestion(format!(
            "failed to extract text from {}: {}",
            pdf_path.display(),
            e
        ))
    })?;

    // pdf-extract separates pages with form feeds
    let documents: Vec<Document> = text
        .split('\x0C')
        .filter(|page| !page.trim().is_empty())
        .map(|page| Document {
            text: page.trim().to_string(),
            metadata: DocumentMetadata {
                author: author.to_string(),
                book: book.clone(),
                source_path: pdf_path.to_path_buf(),
            },
        })
        .collect();

    if documents.is_empty() {
        warn!("No extractable text in {}", pdf_path.display());
    }

    Ok(documents)
}

fn collect_pdfs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_pdfs(&path, out)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Normalize a directory or file-stem name into title case, treating
/// underscores and hyphens as word separators.
#[inline]
pub fn title_case(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
