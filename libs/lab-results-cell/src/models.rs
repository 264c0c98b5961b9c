use serde::{Deserialize, Serialize};

use shared_models::error::AppError;

pub const MAX_INPUT_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
}

impl ExtractRequest {
    pub fn validate(&self) -> Result<(), LabResultError> {
        if self.text.trim().is_empty() {
            return Err(LabResultError::EmptyInput);
        }
        if self.text.len() > MAX_INPUT_BYTES {
            return Err(LabResultError::InputTooLarge(self.text.len()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabFlag {
    Low,
    Normal,
    High,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub low: f64,
    pub high: f64,
}

impl ReferenceRange {
    pub fn classify(&self, value: f64) -> LabFlag {
        if value < self.low {
            LabFlag::Low
        } else if value > self.high {
            LabFlag::High
        } else {
            LabFlag::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabValue {
    pub analyte: String,
    /// Name exactly as it appeared in the source line.
    pub source_name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub reference_range: Option<ReferenceRange>,
    pub flag: LabFlag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabReport {
    pub results: Vec<LabValue>,
    pub abnormal_count: usize,
    pub unparsed_lines: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum LabResultError {
    #[error("No text to extract from")]
    EmptyInput,

    #[error("Input of {0} bytes exceeds the 64 KiB limit")]
    InputTooLarge(usize),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl From<LabResultError> for AppError {
    fn from(error: LabResultError) -> Self {
        match error {
            LabResultError::EmptyInput | LabResultError::InputTooLarge(_) => {
                AppError::ValidationError(error.to_string())
            }
            LabResultError::Pattern(e) => AppError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_are_inclusive() {
        let range = ReferenceRange { low: 70.0, high: 99.0 };
        assert_eq!(range.classify(69.9), LabFlag::Low);
        assert_eq!(range.classify(70.0), LabFlag::Normal);
        assert_eq!(range.classify(99.0), LabFlag::Normal);
        assert_eq!(range.classify(105.0), LabFlag::High);
    }

    #[test]
    fn blank_and_oversized_inputs_are_rejected() {
        assert!(ExtractRequest { text: "  \n ".to_string() }.validate().is_err());
        assert!(ExtractRequest { text: "x".repeat(MAX_INPUT_BYTES + 1) }.validate().is_err());
        assert!(ExtractRequest { text: "Glucose 90".to_string() }.validate().is_ok());
    }
}
