// rams-generation-client/src/document.rs

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Risk banding used throughout the document, derived from a 5x5
/// likelihood/severity matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        if score >= 15 {
            RiskLevel::VeryHigh
        } else if score >= 10 {
            RiskLevel::High
        } else if score >= 6 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very-high",
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Medium
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The generated method statement as stored in the job's `method_data`
/// column. Generated documents come back with uneven field coverage, so
/// everything beyond the title defaults rather than failing to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodStatement {
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub contractor: String,
    #[serde(default)]
    pub supervisor: String,
    #[serde(default)]
    pub overall_risk_level: RiskLevel,
    #[serde(default)]
    pub total_estimated_time: Option<String>,
    #[serde(default)]
    pub steps: Vec<MethodStep>,
    #[serde(default)]
    pub risk_assessment: RiskAssessment,
    #[serde(default)]
    pub ppe: Vec<PpeItem>,
    #[serde(default)]
    pub compliance_regulations: Vec<String>,
    #[serde(default)]
    pub emergency_procedures: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodStep {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub safety_requirements: Vec<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    #[serde(default)]
    pub hazards: Vec<Hazard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hazard {
    #[serde(rename = "hazard")]
    pub description: String,
    #[serde(default)]
    pub likelihood: u8,
    #[serde(default)]
    pub severity: u8,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub control_measure: String,
    #[serde(default)]
    pub residual_risk: Option<u8>,
    #[serde(default)]
    pub residual_risk_level: Option<RiskLevel>,
    // 0 means a general site hazard rather than a specific step.
    #[serde(default)]
    pub linked_to_step: Option<u32>,
    #[serde(default)]
    pub regulation: Option<String>,
}

impl Hazard {
    pub fn score(&self) -> u8 {
        self.likelihood.saturating_mul(self.severity)
    }

    pub fn linked_step(&self) -> Option<u32> {
        match self.linked_to_step {
            Some(0) | None => None,
            linked => linked,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PpeItem {
    pub ppe_type: String,
    #[serde(default)]
    pub standard: Option<String>,
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,
    #[serde(default)]
    pub purpose: Option<String>,
}

fn default_mandatory() -> bool {
    true
}

/// A step description, split into an optional intro and enumerated sub-steps
/// when the text carries an inline numbered list ("1. Isolate... 2. Prove...").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepBody {
    Plain(String),
    Enumerated {
        intro: Option<String>,
        items: Vec<String>,
    },
}

fn sub_step_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"\d+\.\s+").expect("valid sub-step pattern"))
}

impl StepBody {
    pub fn parse(description: &str) -> StepBody {
        let marker = sub_step_marker();
        let mut items = Vec::new();
        let mut intro_end = None;
        let mut last_end = None;
        for found in marker.find_iter(description) {
            match last_end {
                None => intro_end = Some(found.start()),
                Some(end) => items.push(description[end..found.start()].trim().to_string()),
            }
            last_end = Some(found.end());
        }
        if let Some(end) = last_end {
            items.push(description[end..].trim().to_string());
        }
        items.retain(|item| !item.is_empty());
        if items.is_empty() {
            return StepBody::Plain(description.trim().to_string());
        }
        let intro = intro_end
            .map(|end| description[..end].trim().to_string())
            .filter(|intro| !intro.is_empty());
        StepBody::Enumerated { intro, items }
    }
}

/// Headline numbers for the completion banner. Everything defaults so a
/// threadbare document still celebrates.
#[derive(Debug, Clone)]
pub struct CelebrationStats {
    pub steps: usize,
    pub hazards: usize,
    pub total_duration: String,
    pub risk_level: RiskLevel,
    pub generation_seconds: u64,
}

impl CelebrationStats {
    pub fn from_document(document: &MethodStatement, generation_seconds: u64) -> Self {
        Self {
            steps: document.steps.len(),
            hazards: document.risk_assessment.hazards.len(),
            total_duration: document
                .total_estimated_time
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            risk_level: document.overall_risk_level,
            generation_seconds,
        }
    }
}
