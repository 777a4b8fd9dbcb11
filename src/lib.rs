pub mod config;
pub mod drug_map;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod narrative;
pub mod narrator;
pub mod patient;
pub mod pipeline;
pub mod prompts;
pub mod risk;
pub mod similarity;

pub use config::{LlmSettings, PipelineConfig};
pub use drug_map::DrugIdMap;
pub use embeddings::{EntityLookup, EntityTable, MatchPolicy};
pub use error::{DdiError, FailureKind, Result};
pub use llm::{ChatMessage, NarrativeRequest, OpenAiClient, Role, TextCompletion};
pub use narrative::{NarrativeGenerator, RetryPolicy};
pub use patient::PatientProfile;
pub use pipeline::{AssessmentRequest, AssessmentResult, AssessmentStatus, DdiPipeline, PipelineStep, StepFailure};
