use crate::error::Result;
use crate::narrative::NarrativeGenerator;
use crate::prompts::{
    similarity_prompt, CLINICAL_PHARMACOLOGIST_ROLE, NARRATIVE_MAX_TOKENS, NARRATIVE_TEMPERATURE,
};
use tracing::info;

/// Explains a cosine similarity score in plain language
#[derive(Clone)]
pub struct SimilarityNarrator {
    generator: NarrativeGenerator,
}

impl SimilarityNarrator {
    pub fn new(generator: NarrativeGenerator) -> Self {
        Self { generator }
    }

    pub async fn describe(&self, drug1: &str, drug2: &str, cos_score: f64) -> Result<String> {
        info!("Describing similarity of {} and {} ({:.4})", drug1, drug2, cos_score);
        let prompt = similarity_prompt(drug1, drug2, cos_score);
        self.generator
            .generate(
                CLINICAL_PHARMACOLOGIST_ROLE,
                &prompt,
                NARRATIVE_TEMPERATURE,
                NARRATIVE_MAX_TOKENS,
            )
            .await
    }
}
