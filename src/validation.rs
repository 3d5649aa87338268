//! Upload validation: PDF gate and filename sanitizing.
//!
//! `validate_pdf_file` never errors and never panics; callers surface the
//! message themselves.

use std::path::Path;

use serde::{Deserialize, Serialize};

pub const PDF_MIME: &str = "application/pdf";

const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024; // 100MB

const MSG_NO_FILE: &str = "No file selected. Please choose a PDF invoice.";
const MSG_NOT_PDF: &str = "Only PDF files are supported.";

/// A file handed over by the UI for intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    pub name: String,
    /// MIME type as reported by the picker.
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        }
    }

    /// Load from disk. The MIME type comes from the magic bytes, not the
    /// extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime_type = if has_pdf_signature(&bytes) {
            PDF_MIME
        } else {
            "application/octet-stream"
        };
        let name = sanitize_filename(&path.to_string_lossy());
        Ok(Self::new(&name, mime_type, bytes))
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// `{ is_valid, error_message }`; the message is set iff invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error_message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_message: Some(message.into()),
        }
    }
}

pub fn validate_pdf_file(file: Option<&UploadFile>) -> ValidationResult {
    let Some(file) = file else {
        return ValidationResult::invalid(MSG_NO_FILE);
    };

    let mime = file
        .mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();
    if !mime.eq_ignore_ascii_case(PDF_MIME) {
        return ValidationResult::invalid(MSG_NOT_PDF);
    }

    if file.size_bytes() > MAX_FILE_SIZE {
        return ValidationResult::invalid(format!(
            "File too large: {:.1}MB exceeds {}MB limit",
            file.size_bytes() as f64 / (1024.0 * 1024.0),
            MAX_FILE_SIZE / (1024 * 1024)
        ));
    }

    ValidationResult::valid()
}

/// PDF files start with `%PDF`.
pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Sanitize a filename: strip path components and limit length
pub fn sanitize_filename(original: &str) -> String {
    let last = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let clean: String = last
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect();
    let clean = clean.trim();

    if clean.is_empty() || clean == "." || clean == ".." {
        "document.pdf".to_string()
    } else {
        clean.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str) -> UploadFile {
        UploadFile::new(name, PDF_MIME, b"%PDF-1.7\n".to_vec())
    }

    #[test]
    fn missing_file_is_invalid_with_message() {
        let result = validate_pdf_file(None);
        assert!(!result.is_valid);
        assert!(!result.error_message.unwrap().is_empty());
    }

    #[test]
    fn png_is_invalid() {
        let file = UploadFile::new("scan.png", "image/png", vec![0x89, 0x50, 0x4E, 0x47]);
        let result = validate_pdf_file(Some(&file));
        assert!(!result.is_valid);
        assert_eq!(result.error_message.as_deref(), Some(MSG_NOT_PDF));
    }

    #[test]
    fn pdf_is_valid() {
        assert_eq!(validate_pdf_file(Some(&pdf("invoice.pdf"))), ValidationResult::valid());
    }

    #[test]
    fn mime_parameters_and_case_are_ignored() {
        let file = UploadFile::new("a.pdf", "Application/PDF; charset=binary", vec![]);
        assert!(validate_pdf_file(Some(&file)).is_valid);
    }

    #[test]
    fn extension_alone_does_not_make_a_pdf() {
        let file = UploadFile::new("invoice.pdf", "text/plain", b"hello".to_vec());
        assert!(!validate_pdf_file(Some(&file)).is_valid);
    }

    #[test]
    fn oversized_pdf_is_invalid() {
        let file = UploadFile::new("big.pdf", PDF_MIME, vec![0u8; (MAX_FILE_SIZE + 1) as usize]);
        let result = validate_pdf_file(Some(&file));
        assert!(!result.is_valid);
        assert!(result.error_message.unwrap().contains("too large"));
    }

    #[test]
    fn valid_result_serializes_without_message() {
        let json = serde_json::to_value(ValidationResult::valid()).unwrap();
        assert_eq!(json, serde_json::json!({ "is_valid": true }));
    }

    #[test]
    fn pdf_signature_detection() {
        assert!(has_pdf_signature(b"%PDF-1.4 rest"));
        assert!(!has_pdf_signature(b"%PD"));
        assert!(!has_pdf_signature(&[0xFF, 0xD8, 0xFF]));
    }

    #[test]
    fn from_path_sniffs_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("invoice.bin");
        std::fs::write(&real, b"%PDF-1.7\n%%EOF").unwrap();
        let file = UploadFile::from_path(&real).unwrap();
        assert_eq!(file.mime_type, PDF_MIME);
        assert_eq!(file.name, "invoice.bin");

        let fake = dir.path().join("fake.pdf");
        std::fs::write(&fake, b"not a pdf").unwrap();
        let file = UploadFile::from_path(&fake).unwrap();
        assert!(!validate_pdf_file(Some(&file)).is_valid);
    }

    #[test]
    fn sanitize_strips_paths() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\invoice.pdf"), "invoice.pdf");
        assert_eq!(sanitize_filename("a\0b.pdf"), "ab.pdf");
    }

    #[test]
    fn sanitize_falls_back_for_empty_names() {
        assert_eq!(sanitize_filename(""), "document.pdf");
        assert_eq!(sanitize_filename("dir/"), "document.pdf");
        assert_eq!(sanitize_filename(".."), "document.pdf");
    }

    #[test]
    fn sanitize_limits_length() {
        let long = "a".repeat(400);
        assert_eq!(sanitize_filename(&long).len(), 255);
    }
}
