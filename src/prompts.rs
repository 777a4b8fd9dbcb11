//! Prompt templates for the similarity narrator and the risk assessor.

use crate::patient::PatientProfile;

/// System role shared by both narrative calls
pub const CLINICAL_PHARMACOLOGIST_ROLE: &str =
    "You are a clinical pharmacologist providing detailed reasoning for drug interactions.";

/// Chain-of-thought cue appended to every prompt; must stay verbatim
pub const STEP_BY_STEP_CUE: &str = "Let's think step by step.";

pub const RISK_QUESTION: &str =
    "Assess the risk of drug-drug interactions and provide recommendations.";

pub const SIMILARITY_QUESTION: &str = "Describe the similarity between two given drugs based on given cosine similarity also in terms of their composition in 3 to 4 sentences.";

/// Sampling settings for both narrative calls
pub const NARRATIVE_TEMPERATURE: f32 = 0.7;
pub const NARRATIVE_MAX_TOKENS: u32 = 500;

pub fn similarity_prompt(drug1: &str, drug2: &str, cos_score: f64) -> String {
    format!(
        r#"Cosine Similarity of {} and {} is: {:.4}

Question:
{}

Answer:
{}
"#,
        drug1, drug2, cos_score, SIMILARITY_QUESTION, STEP_BY_STEP_CUE
    )
}

pub fn risk_prompt(profile: &PatientProfile) -> String {
    format!(
        r#"Patient Profile:
{}

Question:
{}

Answer:
{}
"#,
        profile, RISK_QUESTION, STEP_BY_STEP_CUE
    )
}
