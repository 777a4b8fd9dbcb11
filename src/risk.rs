use crate::error::Result;
use crate::narrative::NarrativeGenerator;
use crate::patient::PatientProfile;
use crate::prompts::{
    risk_prompt, CLINICAL_PHARMACOLOGIST_ROLE, NARRATIVE_MAX_TOKENS, NARRATIVE_TEMPERATURE,
};
use tracing::info;

/// Chain-of-thought risk narrative for a patient on two drugs
#[derive(Clone)]
pub struct RiskAssessor {
    generator: NarrativeGenerator,
}

impl RiskAssessor {
    pub fn new(generator: NarrativeGenerator) -> Self {
        Self { generator }
    }

    pub async fn assess(&self, profile: &PatientProfile) -> Result<String> {
        info!(
            "Assessing interaction risk for {} + {} (age {})",
            profile.drug1(),
            profile.drug2(),
            profile.age()
        );
        let prompt = risk_prompt(profile);
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
