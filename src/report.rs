//! Report categories and the label prepended to each transcript.

use serde::{Deserialize, Serialize};

/// Kind of medical report being dictated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReportCategory {
    /// Ultrasonography
    #[default]
    #[serde(rename = "USG")]
    Usg,
    #[serde(rename = "X-Ray")]
    XRay,
    #[serde(rename = "MRI")]
    Mri,
    #[serde(rename = "CT Scan")]
    CtScan,
    #[serde(rename = "Other")]
    Other,
}

impl ReportCategory {
    /// Every category in selection order
    pub const ALL: [ReportCategory; 5] = [
        ReportCategory::Usg,
        ReportCategory::XRay,
        ReportCategory::Mri,
        ReportCategory::CtScan,
        ReportCategory::Other,
    ];

    /// Name shown in the category selection
    pub fn name(&self) -> &'static str {
        match self {
            ReportCategory::Usg => "USG",
            ReportCategory::XRay => "X-Ray",
            ReportCategory::Mri => "MRI",
            ReportCategory::CtScan => "CT Scan",
            ReportCategory::Other => "Other",
        }
    }

    /// Label written on the line above the transcript
    pub fn label(&self) -> &'static str {
        match self {
            ReportCategory::Usg => "[Ultrasound Report]",
            ReportCategory::XRay => "[X-Ray Report]",
            ReportCategory::Mri => "[MRI Report]",
            ReportCategory::CtScan => "[CT Scan Report]",
            ReportCategory::Other => "[General Report]",
        }
    }

    /// Parse a category name. Never fails: anything unrecognized is `Other`.
    pub fn parse(s: &str) -> Self {
        if let Some(category) = Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
        {
            return category;
        }

        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        match normalized.as_str() {
            "usg" | "ultrasound" => ReportCategory::Usg,
            "xray" => ReportCategory::XRay,
            "mri" => ReportCategory::Mri,
            "ctscan" | "ct" => ReportCategory::CtScan,
            _ => ReportCategory::Other,
        }
    }
}

impl std::fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Prefix a transcript with the label for its category
pub fn apply_label(category: ReportCategory, transcript: &str) -> String {
    format!("{}\n{}", category.label(), transcript)
}
