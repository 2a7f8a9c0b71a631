use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures while turning a file on disk into a `Document`
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document not found: {0}")]
    NotFound(PathBuf),
    #[error("Invalid file name: {0}")]
    InvalidFileName(PathBuf),
    #[error("Unsupported document format: {0}. Only text and PDF files are supported.")]
    UnsupportedFormat(String),
    #[error("Failed to extract text from PDF {path}: {reason}")]
    Pdf { path: PathBuf, reason: String },
    #[error("Failed to read text file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Document {0} contains no extractable text")]
    EmptyDocument(String),
}

/// Represents a document with its content and metadata
#[derive(Debug, Clone)]
pub struct Document {
    /// The extracted text content of the document
    pub content: String,
    /// The document's file name (used as document ID)
    pub document_id: String,
    /// The document's MIME type
    pub mime_type: String,
}

impl Document {
    /// Load a document from a file path.
    ///
    /// An empty extraction result is not rejected here; the index builder
    /// decides that, since it is the one that cannot work without chunks.
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self, ExtractionError> {
        let path = file_path.as_ref();
        if !path.exists() {
            return Err(ExtractionError::NotFound(path.to_path_buf()));
        }

        let document_id = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ExtractionError::InvalidFileName(path.to_path_buf()))?
            .to_string();

        let mime_type = from_path(path).first_or_octet_stream().to_string();
        debug!("Detected MIME type: {}", mime_type);

        let content = read_document_content(path, &mime_type)?;

        Ok(Document {
            content,
            document_id,
            mime_type,
        })
    }

    /// Build a document directly from text already in memory
    pub fn from_text(document_id: impl Into<String>, content: impl Into<String>) -> Self {
        Document {
            content: content.into(),
            document_id: document_id.into(),
            mime_type: "text/plain".to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Read content from a document based on its MIME type
pub fn read_document_content<P: AsRef<Path>>(
    file_path: P,
    mime_type: &str,
) -> Result<String, ExtractionError> {
    let path = file_path.as_ref();

    match mime_type {
        mime if mime.starts_with("application/pdf") => {
            info!("Processing PDF document: {}", path.display());
            let content = extract_text(path).map_err(|e| ExtractionError::Pdf {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

            // PDF extraction tends to leave runs of blank lines and spaces
            let cleaned_content = normalize_whitespace(&content);

            if cleaned_content.is_empty() {
                warn!("Extracted PDF content is empty or contains only whitespace");
            }

            Ok(cleaned_content)
        }

        mime if mime.starts_with("text/") => {
            info!("Processing text document: {}", path.display());
            fs::read_to_string(path).map_err(|source| ExtractionError::Io {
                path: path.to_path_buf(),
                source,
            })
        }

        _ => Err(ExtractionError::UnsupportedFormat(mime_type.to_string())),
    }
}

/// Normalize whitespace in text (collapse repeated spaces, cap blank lines at one)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
            continue;
        }

        if newline_count > 0 {
            push_newlines(&mut normalized, newline_count);
            newline_count = 0;
        }

        if !(c == ' ' && prev_char == ' ') {
            normalized.push(c);
        }
        prev_char = c;
    }

    if newline_count > 0 {
        push_newlines(&mut normalized, newline_count);
    }

    normalized.trim().to_string()
}

// At most a paragraph break
fn push_newlines(out: &mut String, count: usize) {
    if count >= 2 {
        out.push_str("\n\n");
    } else {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_whitespace_collapses_runs() {
        let text = "Annual   Report\r\n2023\n\n\n\nRevenue  was 10M.";
        assert_eq!(
            normalize_whitespace(text),
            "Annual Report\n2023\n\nRevenue was 10M."
        );
    }

    #[test]
    fn test_normalize_whitespace_trims_page_edges() {
        assert_eq!(normalize_whitespace("  Title\n\n\n\nBody  \n\n"), "Title\n\nBody");
        assert_eq!(normalize_whitespace("\n\r\n  \n"), "");
    }

    #[test]
    fn test_from_file_reads_text_documents() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "Quarterly report\n\nRevenue grew.").unwrap();

        let document = Document::from_file(file.path()).unwrap();
        assert_eq!(document.content, "Quarterly report\n\nRevenue grew.");
        assert_eq!(document.mime_type, "text/plain");
        assert!(document.document_id.ends_with(".txt"));
    }

    #[test]
    fn test_from_file_missing_path() {
        let err = Document::from_file("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, ExtractionError::NotFound(_)));
    }

    #[test]
    fn test_from_file_rejects_unsupported_format() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        let err = Document::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_is_empty() {
        assert!(Document::from_text("a.pdf", "  \n ").is_empty());
        assert!(!Document::from_text("a.pdf", "x").is_empty());
    }
}
