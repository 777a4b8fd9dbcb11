//! Runtime configuration
//!
//! Values come from the process environment (optionally seeded from a
//! `.env` file by the binary) and may be overridden by CLI flags. Nothing
//! here is global: the resulting structs are passed into constructors.

use crate::drug_map::DrugIdMap;
use crate::embeddings::{EntityLookup, EntityTable, MatchPolicy};
use crate::error::{DdiError, Result};
use crate::llm::{OpenAiClient, TextCompletion, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::narrative::{NarrativeGenerator, RetryPolicy, DEFAULT_TIMEOUT};
use crate::pipeline::DdiPipeline;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_EMBEDDINGS_PATH: &str = "drug_embeddings.csv";
pub const DEFAULT_DRUG_MAP_PATH: &str = "data/drug_id_mapping.json";

#[derive(Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: usize,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
        }
    }
}

impl LlmSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();
        settings.api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        if let Some(model) = lookup("DDI_LLM_MODEL") {
            settings.model = model;
        }
        if let Some(base_url) = lookup("DDI_LLM_BASE_URL") {
            settings.base_url = base_url;
        }
        if let Some(secs) = lookup("DDI_LLM_TIMEOUT_SECS") {
            let secs: u64 = parse_var("DDI_LLM_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(DdiError::Config("DDI_LLM_TIMEOUT_SECS must be positive".to_string()));
            }
            settings.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = lookup("DDI_LLM_MAX_RETRIES") {
            settings.max_retries = parse_var("DDI_LLM_MAX_RETRIES", &retries)?;
        }
        Ok(settings)
    }

    pub fn client(&self) -> Result<OpenAiClient> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            DdiError::Config("No API key supplied (set OPENAI_API_KEY or pass --api-key)".to_string())
        })?;
        Ok(OpenAiClient::new(api_key, self.model.clone(), self.base_url.clone()))
    }

    pub fn generator(&self, provider: Arc<dyn TextCompletion>) -> NarrativeGenerator {
        NarrativeGenerator::new(provider)
            .with_timeout(self.timeout)
            .with_retry_policy(RetryPolicy::with_max_retries(self.max_retries))
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub embeddings_path: PathBuf,
    pub drug_map_path: PathBuf,
    pub match_policy: MatchPolicy,
    pub concurrent: bool,
    pub llm: LlmSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embeddings_path: PathBuf::from(DEFAULT_EMBEDDINGS_PATH),
            drug_map_path: PathBuf::from(DEFAULT_DRUG_MAP_PATH),
            match_policy: MatchPolicy::default(),
            concurrent: true,
            llm: LlmSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup("DDI_EMBEDDINGS_PATH") {
            config.embeddings_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("DDI_DRUG_MAP_PATH") {
            config.drug_map_path = PathBuf::from(path);
        }
        if let Some(policy) = lookup("DDI_MATCH_POLICY") {
            config.match_policy = policy.parse()?;
        }
        if let Some(concurrent) = lookup("DDI_CONCURRENT") {
            config.concurrent = parse_var("DDI_CONCURRENT", &concurrent)?;
        }
        config.llm = LlmSettings::from_lookup(&lookup)?;
        Ok(config)
    }

    pub fn load_drug_map(&self) -> Result<DrugIdMap> {
        DrugIdMap::load(&self.drug_map_path)
    }

    /// Load the drug map and embedding table into a lookup.
    pub fn load_lookup(&self) -> Result<EntityLookup> {
        let drug_map = self.load_drug_map()?;
        let table = EntityTable::load_csv(&self.embeddings_path)?;
        info!("Match policy: {:?}", self.match_policy);
        Ok(EntityLookup::new(Arc::new(drug_map), Arc::new(table), self.match_policy))
    }

    pub fn build_pipeline(&self, provider: Arc<dyn TextCompletion>) -> Result<DdiPipeline> {
        let lookup = self.load_lookup()?;
        Ok(DdiPipeline::new(lookup, self.llm.generator(provider)).with_concurrency(self.concurrent))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| DdiError::Config(format!("Invalid {} '{}': {}", key, value, e)))
}
