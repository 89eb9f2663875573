//! End-of-run summary handed to whoever archives or displays the results

use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::errors::AutomationError;
use crate::state::{DocumentError, ProcessingStats};

const RULE: &str = "----------------------------------------";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingSummary {
    pub total_documents: usize,
    pub processed_documents: usize,
    pub error_count: usize,
    /// Percentage, 0 when there were no documents
    pub success_rate: f64,
    pub errors: Vec<DocumentError>,
}

impl ProcessingSummary {
    pub fn from_stats(stats: &ProcessingStats) -> Self {
        let total = stats.total_documents();
        let processed = stats.processed_documents();
        let success_rate = if total > 0 {
            processed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_documents: total,
            processed_documents: processed,
            error_count: stats.errors().len(),
            success_rate,
            errors: stats.errors().to_vec(),
        }
    }

    /// Emit the summary through `tracing`, one line per event.
    pub fn log_summary(&self) {
        for line in self.to_string().lines() {
            info!("{}", line);
        }
    }

    pub fn to_json(&self) -> Result<String, AutomationError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AutomationError::Internal(format!("failed to serialize summary: {e}")))
    }
}

impl fmt::Display for ProcessingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "Processing Summary")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Total Documents: {}", self.total_documents)?;
        writeln!(f, "Successfully Processed: {}", self.processed_documents)?;
        writeln!(f, "Errors Encountered: {}", self.error_count)?;
        writeln!(f, "Success Rate: {:.2}%", self.success_rate)?;
        if !self.errors.is_empty() {
            writeln!(f, "Error Details:")?;
            for error in &self.errors {
                writeln!(f, "  Document {}: {}", error.document_index(), error.message())?;
            }
        }
        write!(f, "{RULE}")
    }
}
