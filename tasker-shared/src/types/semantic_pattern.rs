//! SemanticPattern: validated output of the consolidation pipeline
//! (spec §3, §4.8).

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Pattern,
    Decision,
    Fact,
    Workflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HallucinationRisk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetadata {
    /// Fraction of the pattern's evidence strings traceable into its
    /// source events (GLOSSARY "Grounding score").
    pub grounding_score: f64,
    pub hallucination_risk: HallucinationRisk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticPattern {
    pub id: Uuid,
    pub description: String,
    pub pattern_type: PatternType,
    /// 0.0..=1.0.
    pub confidence: f64,
    pub tags: Vec<String>,
    pub evidence: String,
    pub source_event_ids: Vec<Uuid>,
    pub validation: ValidationMetadata,
}

impl SemanticPattern {
    pub fn new(description: impl Into<String>, pattern_type: PatternType, confidence: f64) -> Self {
        Self {
            id: Uuid::now_v7(),
            description: description.into(),
            pattern_type,
            confidence: confidence.clamp(0.0, 1.0),
            tags: Vec::new(),
            evidence: String::new(),
            source_event_ids: Vec::new(),
            validation: ValidationMetadata {
                grounding_score: 0.0,
                hallucination_risk: HallucinationRisk::Medium,
            },
        }
    }

    /// Normalized description used as the group key when reconciling
    /// System 1 vs System 2 candidates (spec §4.8 step 5).
    pub fn normalized_description(&self) -> String {
        self.description
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
