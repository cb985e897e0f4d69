//! Structural validation of training files.

use std::path::Path;

use ethicsgen_shared::{Result, TrainingExample};

use crate::reasoning::ParsedReasoning;
use crate::training::read_training_file;

/// One invalid example and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Zero-based position in the file.
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub total: usize,
    pub valid: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check passages are non-empty and every reasoning has well-ordered sentinels.
pub fn validate_examples(examples: &[TrainingExample]) -> ValidationReport {
    let mut report = ValidationReport {
        total: examples.len(),
        ..Default::default()
    };

    for (index, example) in examples.iter().enumerate() {
        let reason = if example.passage.trim().is_empty() {
            Some("empty passage".to_string())
        } else {
            ParsedReasoning::parse(&example.reasoning)
                .err()
                .map(|e| e.to_string())
        };

        match reason {
            Some(reason) => report.issues.push(ValidationIssue { index, reason }),
            None => report.valid += 1,
        }
    }

    report
}

/// Read and validate a JSON or JSONL training file.
pub fn validate_file(path: &Path) -> Result<ValidationReport> {
    let examples = read_training_file(path)?;
    Ok(validate_examples(&examples))
}
