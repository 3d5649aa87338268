//! Invoice intake orchestration.
//!
//! validate → extract fields → upload → (optionally) spreadsheet row.
//! Every step is recorded in the processing log. The extraction engine,
//! storage upload and spreadsheet append are collaborators behind traits;
//! this module only sequences them and gates on service readiness.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::diagnostics::ProcessingLog;
use crate::route_guard::{shell_view, ShellView};
use crate::services::Readiness;
use crate::validation::{has_pdf_signature, sanitize_filename, validate_pdf_file, UploadFile};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Fields pulled from an invoice. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub vendor: Option<String>,
    pub amount: Option<String>,
    pub date: Option<String>,
    pub document_number: Option<String>,
}

impl ExtractedFields {
    pub fn found_count(&self) -> usize {
        [&self.vendor, &self.amount, &self.date, &self.document_number]
            .iter()
            .filter(|f| f.is_some())
            .count()
    }
}

/// Where the uploaded file landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub url: Option<String>,
}

/// One spreadsheet row per processed invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpreadsheetRow {
    pub file_name: String,
    pub vendor: String,
    pub amount: String,
    pub date: String,
    pub document_number: String,
    pub document_url: String,
    pub processed_at: String,
}

impl SpreadsheetRow {
    fn build(file_name: &str, fields: &ExtractedFields, stored: &StoredDocument) -> Self {
        let cell = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            file_name: file_name.to_string(),
            vendor: cell(&fields.vendor),
            amount: cell(&fields.amount),
            date: cell(&fields.date),
            document_number: cell(&fields.document_number),
            document_url: cell(&stored.url),
            processed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeOptions {
    pub log_to_spreadsheet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeOutcome {
    pub id: Uuid,
    pub file_name: String,
    pub fields: ExtractedFields,
    pub stored: StoredDocument,
    pub logged_to_spreadsheet: bool,
}

/// Failure reported by an intake collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Services are not ready")]
    NotReady,
    #[error("{0}")]
    Invalid(String),
    #[error("Field extraction failed: {0}")]
    Extraction(#[source] CollaboratorError),
    #[error("Upload failed: {0}")]
    Upload(#[source] CollaboratorError),
}

// ═══════════════════════════════════════════════════════════
// Collaborators
// ═══════════════════════════════════════════════════════════

#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(&self, file: &UploadFile) -> Result<ExtractedFields, CollaboratorError>;
}

#[async_trait]
pub trait DocumentStorage: Send + Sync {
    async fn upload(&self, file: &UploadFile) -> Result<StoredDocument, CollaboratorError>;
}

#[async_trait]
pub trait SpreadsheetLog: Send + Sync {
    async fn append_row(&self, row: &SpreadsheetRow) -> Result<(), CollaboratorError>;
}

// ═══════════════════════════════════════════════════════════
// IntakeService
// ═══════════════════════════════════════════════════════════

pub struct IntakeService {
    extractor: Arc<dyn FieldExtractor>,
    storage: Arc<dyn DocumentStorage>,
    spreadsheet: Arc<dyn SpreadsheetLog>,
    readiness: watch::Receiver<Readiness>,
    log: Arc<ProcessingLog>,
}

impl IntakeService {
    pub fn new(
        extractor: Arc<dyn FieldExtractor>,
        storage: Arc<dyn DocumentStorage>,
        spreadsheet: Arc<dyn SpreadsheetLog>,
        readiness: watch::Receiver<Readiness>,
        log: Arc<ProcessingLog>,
    ) -> Self {
        Self {
            extractor,
            storage,
            spreadsheet,
            readiness,
            log,
        }
    }

    /// Process one uploaded invoice.
    ///
    /// A spreadsheet failure does not fail the intake: the file is already
    /// stored, so the outcome reports `logged_to_spreadsheet = false`.
    pub async fn process(
        &self,
        file: Option<&UploadFile>,
        options: IntakeOptions,
    ) -> Result<IntakeOutcome, IntakeError> {
        let view = shell_view(&self.readiness.borrow());
        if view != ShellView::Ready {
            self.log.append("Rejected upload: services not ready");
            return Err(IntakeError::NotReady);
        }

        let validation = validate_pdf_file(file);
        let file = match (validation.is_valid, file) {
            (true, Some(file)) => file,
            _ => {
                let message = validation
                    .error_message
                    .unwrap_or_else(|| "Invalid file".to_string());
                self.log.append(format!("Validation failed: {message}"));
                return Err(IntakeError::Invalid(message));
            }
        };
        let file_name = sanitize_filename(&file.name);
        if !has_pdf_signature(&file.bytes) {
            let message = format!("{file_name} is labeled as PDF but is not a PDF file");
            self.log.append(format!("Validation failed: {message}"));
            return Err(IntakeError::Invalid(message));
        }

        // Collaborators only ever see the sanitized name.
        let renamed;
        let file = if file.name == file_name {
            file
        } else {
            renamed = UploadFile {
                name: file_name.clone(),
                ..file.clone()
            };
            &renamed
        };

        let id = Uuid::new_v4();
        tracing::info!(%id, file = %file_name, size = file.size_bytes(), "Processing invoice");
        self.log.append(format!("Processing {file_name}"));

        let fields = self.extractor.extract(file).await.map_err(|e| {
            self.log.append(format!("Extraction failed for {file_name}: {e}"));
            IntakeError::Extraction(e)
        })?;
        self.log.append(format!(
            "Extracted {}/4 fields from {file_name}",
            fields.found_count()
        ));

        let stored = self.storage.upload(file).await.map_err(|e| {
            self.log.append(format!("Upload failed for {file_name}: {e}"));
            IntakeError::Upload(e)
        })?;
        self.log.append(format!("Stored {file_name} as {}", stored.id));

        let mut logged_to_spreadsheet = false;
        if options.log_to_spreadsheet {
            let row = SpreadsheetRow::build(&file_name, &fields, &stored);
            match self.spreadsheet.append_row(&row).await {
                Ok(()) => {
                    logged_to_spreadsheet = true;
                    self.log.append(format!("Logged {file_name} to spreadsheet"));
                }
                Err(e) => {
                    tracing::warn!(%id, error = %e, "Spreadsheet append failed");
                    self.log.append(format!("Spreadsheet logging failed for {file_name}: {e}"));
                }
            }
        }

        Ok(IntakeOutcome {
            id,
            file_name,
            fields,
            stored,
            logged_to_spreadsheet,
        })
    }
}
