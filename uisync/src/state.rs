//! Workflow stages, per-run statistics and document failures

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where control sits inside the per-document workflow. Only used to decide
/// how a blocking dialog is recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStage {
    Selecting,
    ContextMenuOpen,
    PrintDialogOpen,
    SaveDialogOpen,
    Saving,
    NavigationPending,
}

impl fmt::Display for AutomationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AutomationStage::Selecting => "selecting",
            AutomationStage::ContextMenuOpen => "context menu open",
            AutomationStage::PrintDialogOpen => "print dialog open",
            AutomationStage::SaveDialogOpen => "save dialog open",
            AutomationStage::Saving => "saving",
            AutomationStage::NavigationPending => "navigation pending",
        };
        f.write_str(name)
    }
}

/// Stages of the printer configuration sub-flow, which spans secondary windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStage {
    DocumentSelection,
    ContextMenu,
    DocumentUpdate,
    PrinterSettings,
}

impl fmt::Display for ConfigStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigStage::DocumentSelection => "document selection",
            ConfigStage::ContextMenu => "context menu",
            ConfigStage::DocumentUpdate => "document update window",
            ConfigStage::PrinterSettings => "printer settings window",
        };
        f.write_str(name)
    }
}

/// Position of the single in-flight document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationState {
    stage: AutomationStage,
    document_number: usize,
    document_path: Option<PathBuf>,
}

impl Default for AutomationState {
    fn default() -> Self {
        Self {
            stage: AutomationStage::Selecting,
            document_number: 0,
            document_path: None,
        }
    }
}

impl AutomationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> AutomationStage {
        self.stage
    }

    pub fn set_stage(&mut self, stage: AutomationStage) {
        self.stage = stage;
    }

    /// 1-based number of the document in flight; 0 before the first one
    pub fn document_number(&self) -> usize {
        self.document_number
    }

    pub fn document_path(&self) -> Option<&PathBuf> {
        self.document_path.as_ref()
    }

    /// Move to a new document, resetting the stage to `Selecting`.
    pub fn begin_document(&mut self, number: usize, path: PathBuf) {
        self.document_number = number;
        self.document_path = Some(path);
        self.stage = AutomationStage::Selecting;
    }

    pub fn snapshot(&self) -> AutomationState {
        self.clone()
    }
}

/// A document that failed irrecoverably. `document_index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentError {
    document_index: usize,
    message: String,
}

impl DocumentError {
    /// Blank messages are replaced so every recorded failure says something.
    pub fn new(document_index: usize, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            format!("document {document_index} failed without a reported cause")
        } else {
            message
        };
        Self {
            document_index,
            message,
        }
    }

    pub fn document_index(&self) -> usize {
        self.document_index
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Outcome counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    total_documents: usize,
    processed_documents: usize,
    errors: Vec<DocumentError>,
}

impl ProcessingStats {
    pub fn new(total_documents: usize) -> Self {
        Self {
            total_documents,
            processed_documents: 0,
            errors: Vec::new(),
        }
    }

    pub fn total_documents(&self) -> usize {
        self.total_documents
    }

    pub fn processed_documents(&self) -> usize {
        self.processed_documents
    }

    pub fn errors(&self) -> &[DocumentError] {
        &self.errors
    }

    pub(crate) fn record_success(&mut self) {
        if self.processed_documents < self.total_documents {
            self.processed_documents += 1;
        }
    }

    pub(crate) fn record_failure(&mut self, document_index: usize, message: impl Into<String>) {
        self.errors.push(DocumentError::new(document_index, message));
    }

    pub fn failed_documents(&self) -> impl Iterator<Item = usize> + '_ {
        self.errors.iter().map(DocumentError::document_index)
    }
}
