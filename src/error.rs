use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DdiError {
    #[error("Unknown drug: {name}{}", suggestion_hint(.suggestion))]
    UnknownDrug {
        name: String,
        suggestion: Option<String>,
    },

    #[error("No embedding found for {drug} (id fragment '{id}')")]
    NotFound { drug: String, id: String },

    #[error("Degenerate vector: cosine similarity is undefined for a zero-norm embedding")]
    DegenerateVector,

    #[error("Embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Identical drugs selected: {0}. Choose two different drugs")]
    IdenticalDrugs(String),

    #[error("Transient provider error: {0}")]
    TransientProvider(String),

    #[error("Provider rejected credential: {0}")]
    Auth(String),

    #[error("Provider refused prompt: {0}")]
    ContentPolicy(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Embedding table error: {0}")]
    Table(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

impl From<polars::error::PolarsError> for DdiError {
    fn from(err: polars::error::PolarsError) -> Self {
        DdiError::Polars(err.to_string())
    }
}

impl DdiError {
    /// Classify into the taxonomy reported on the result surface.
    pub fn kind(&self) -> FailureKind {
        match self {
            DdiError::UnknownDrug { .. } => FailureKind::UnknownDrug,
            DdiError::NotFound { .. } => FailureKind::NotFound,
            DdiError::DegenerateVector => FailureKind::DegenerateVector,
            DdiError::IdenticalDrugs(_) => FailureKind::IdenticalDrugs,
            DdiError::TransientProvider(_) => FailureKind::TransientProvider,
            DdiError::Auth(_) => FailureKind::Auth,
            DdiError::ContentPolicy(_) => FailureKind::ContentPolicy,
            DdiError::InvalidRequest(_) => FailureKind::InvalidRequest,
            _ => FailureKind::Internal,
        }
    }

    /// Only transient provider failures are eligible for retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, DdiError::TransientProvider(_))
    }
}

pub type Result<T> = std::result::Result<T, DdiError>;

/// Failure taxonomy exposed to callers alongside partial results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    UnknownDrug,
    NotFound,
    DegenerateVector,
    #[serde(rename = "IdenticalDrugsError")]
    IdenticalDrugs,
    #[serde(rename = "TransientProviderError")]
    TransientProvider,
    #[serde(rename = "AuthError")]
    Auth,
    #[serde(rename = "ContentPolicyError")]
    ContentPolicy,
    InvalidRequest,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::UnknownDrug => write!(f, "UnknownDrug"),
            FailureKind::NotFound => write!(f, "NotFound"),
            FailureKind::DegenerateVector => write!(f, "DegenerateVector"),
            FailureKind::IdenticalDrugs => write!(f, "IdenticalDrugsError"),
            FailureKind::TransientProvider => write!(f, "TransientProviderError"),
            FailureKind::Auth => write!(f, "AuthError"),
            FailureKind::ContentPolicy => write!(f, "ContentPolicyError"),
            FailureKind::InvalidRequest => write!(f, "InvalidRequest"),
            FailureKind::Internal => write!(f, "Internal"),
        }
    }
}
