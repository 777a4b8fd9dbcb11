//! Pipeline Orchestrator
//!
//! Validate -> (Resolve -> Score -> Narrate similarity) || Assess risk -> Finalize.
//!
//! The similarity branch and the risk branch share nothing but the request
//! and may run concurrently. Every failure after validation degrades only the
//! branch it happened in; the caller always gets an `AssessmentResult`.

use crate::embeddings::EntityLookup;
use crate::error::{DdiError, FailureKind, Result};
use crate::narrative::NarrativeGenerator;
use crate::narrator::SimilarityNarrator;
use crate::patient::PatientProfile;
use crate::risk::RiskAssessor;
use crate::similarity::cosine_similarity;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub drug1: String,
    pub drug2: String,
    pub age: u32,
    pub lab_results: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentStatus {
    Complete,
    PartialSuccess,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Validate,
    Resolve,
    Score,
    NarrateSimilarity,
    AssessRisk,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStep::Validate => write!(f, "validate"),
            PipelineStep::Resolve => write!(f, "resolve"),
            PipelineStep::Score => write!(f, "score"),
            PipelineStep::NarrateSimilarity => write!(f, "narrate_similarity"),
            PipelineStep::AssessRisk => write!(f, "assess_risk"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: PipelineStep,
    pub kind: FailureKind,
    pub message: String,
}

impl StepFailure {
    fn new(step: PipelineStep, error: &DdiError) -> Self {
        Self {
            step,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Result surface handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub status: AssessmentStatus,
    pub drug1: String,
    pub drug2: String,
    pub similarity_score: Option<f64>,
    pub similarity_description: Option<String>,
    pub risk_narrative: Option<String>,
    pub failures: Vec<StepFailure>,
}

impl AssessmentResult {
    fn rejected(request: &AssessmentRequest, failure: StepFailure) -> Self {
        Self {
            status: AssessmentStatus::Rejected,
            drug1: request.drug1.clone(),
            drug2: request.drug2.clone(),
            similarity_score: None,
            similarity_description: None,
            risk_narrative: None,
            failures: vec![failure],
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == AssessmentStatus::Complete
    }

    pub fn failure_at(&self, step: PipelineStep) -> Option<&StepFailure> {
        self.failures.iter().find(|f| f.step == step)
    }
}

#[derive(Debug, Default)]
struct SimilarityOutcome {
    score: Option<f64>,
    description: Option<String>,
    failures: Vec<StepFailure>,
}

#[derive(Debug, Default)]
struct RiskOutcome {
    narrative: Option<String>,
    failure: Option<StepFailure>,
}

pub struct DdiPipeline {
    lookup: EntityLookup,
    generator: NarrativeGenerator,
    concurrent: bool,
}

impl DdiPipeline {
    pub fn new(lookup: EntityLookup, generator: NarrativeGenerator) -> Self {
        Self {
            lookup,
            generator,
            concurrent: true,
        }
    }

    /// Run the similarity and risk branches one after the other.
    pub fn sequential(mut self) -> Self {
        self.concurrent = false;
        self
    }

    pub fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn lookup(&self) -> &EntityLookup {
        &self.lookup
    }

    /// Resolve both drugs and score them, without any LLM call.
    pub fn score(&self, drug1: &str, drug2: &str) -> Result<f64> {
        let a = self.lookup.resolve(drug1)?;
        let b = self.lookup.resolve(drug2)?;
        cosine_similarity(a, b)
    }

    pub async fn assess(&self, request: &AssessmentRequest) -> AssessmentResult {
        let span = info_span!(
            "assessment",
            request_id = %Uuid::new_v4(),
            drug1 = %request.drug1,
            drug2 = %request.drug2
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &AssessmentRequest) -> AssessmentResult {
        if request.drug1 == request.drug2 {
            let error = DdiError::IdenticalDrugs(request.drug1.clone());
            warn!("Rejected: {}", error);
            return AssessmentResult::rejected(request, StepFailure::new(PipelineStep::Validate, &error));
        }

        let profile = match PatientProfile::new(
            request.age,
            request.drug1.as_str(),
            request.drug2.as_str(),
            request.lab_results.as_str(),
        ) {
            Ok(profile) => profile,
            Err(error) => {
                warn!("Rejected: {}", error);
                return AssessmentResult::rejected(request, StepFailure::new(PipelineStep::Validate, &error));
            }
        };

        let generator = self.generator.for_request();
        let narrator = SimilarityNarrator::new(generator.clone());
        let assessor = RiskAssessor::new(generator);

        let similarity_branch = self.similarity_branch(&request.drug1, &request.drug2, &narrator);
        let risk_branch = Self::risk_branch(&assessor, &profile);

        let (similarity, risk) = if self.concurrent {
            tokio::join!(similarity_branch, risk_branch)
        } else {
            let similarity = similarity_branch.await;
            (similarity, risk_branch.await)
        };

        let mut failures = similarity.failures;
        failures.extend(risk.failure);

        let status = if failures.is_empty() {
            AssessmentStatus::Complete
        } else {
            AssessmentStatus::PartialSuccess
        };
        info!("Assessment finished: {:?} ({} failed steps)", status, failures.len());

        AssessmentResult {
            status,
            drug1: request.drug1.clone(),
            drug2: request.drug2.clone(),
            similarity_score: similarity.score,
            similarity_description: similarity.description,
            risk_narrative: risk.narrative,
            failures,
        }
    }

    async fn similarity_branch(
        &self,
        drug1: &str,
        drug2: &str,
        narrator: &SimilarityNarrator,
    ) -> SimilarityOutcome {
        let mut outcome = SimilarityOutcome::default();

        // Resolve both so every unresolvable drug is reported
        let resolved = [drug1, drug2].map(|drug| self.lookup.resolve(drug));
        let mut embeddings = Vec::with_capacity(2);
        for result in resolved {
            match result {
                Ok(embedding) => embeddings.push(embedding),
                Err(error) => {
                    warn!("Lookup failed: {}", error);
                    outcome.failures.push(StepFailure::new(PipelineStep::Resolve, &error));
                }
            }
        }
        if embeddings.len() != 2 {
            return outcome;
        }

        let score = match cosine_similarity(embeddings[0], embeddings[1]) {
            Ok(score) => score,
            Err(error) => {
                warn!("Scoring failed: {}", error);
                outcome.failures.push(StepFailure::new(PipelineStep::Score, &error));
                return outcome;
            }
        };
        info!("Similarity between {} and {}: {:.4}", drug1, drug2, score);
        outcome.score = Some(score);

        match narrator.describe(drug1, drug2, score).await {
            Ok(description) => outcome.description = Some(description),
            Err(error) => {
                warn!("Similarity narration failed: {}", error);
                outcome
                    .failures
                    .push(StepFailure::new(PipelineStep::NarrateSimilarity, &error));
            }
        }
        outcome
    }

    async fn risk_branch(assessor: &RiskAssessor, profile: &PatientProfile) -> RiskOutcome {
        match assessor.assess(profile).await {
            Ok(narrative) => RiskOutcome {
                narrative: Some(narrative),
                failure: None,
            },
            Err(error) => {
                warn!("Risk assessment failed: {}", error);
                RiskOutcome {
                    narrative: None,
                    failure: Some(StepFailure::new(PipelineStep::AssessRisk, &error)),
                }
            }
        }
    }
}
