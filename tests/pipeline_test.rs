use async_trait::async_trait;
use ddi_risk::{
    AssessmentRequest, AssessmentStatus, DdiError, DdiPipeline, DrugIdMap, EntityLookup,
    EntityTable, FailureKind, MatchPolicy, NarrativeGenerator, NarrativeRequest, PipelineStep,
    TextCompletion,
};
use std::sync::{Arc, Mutex};

/// Which prompt a request carries
#[derive(Debug, Clone, Copy, PartialEq)]
enum Call {
    Similarity,
    Risk,
}

fn classify(request: &NarrativeRequest) -> Call {
    let prompt = &request.messages[1].content;
    if prompt.starts_with("Patient Profile:") {
        Call::Risk
    } else {
        Call::Similarity
    }
}

/// Deterministic provider answering each prompt kind with a fixed outcome
struct ScriptedProvider {
    similarity: fn() -> ddi_risk::Result<String>,
    risk: fn() -> ddi_risk::Result<String>,
    log: Mutex<Vec<(Call, String)>>,
}

impl ScriptedProvider {
    fn new(
        similarity: fn() -> ddi_risk::Result<String>,
        risk: fn() -> ddi_risk::Result<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            similarity,
            risk,
            log: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }

    fn prompt_for(&self, call: Call) -> Option<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| *c == call)
            .map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl TextCompletion for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &NarrativeRequest) -> ddi_risk::Result<String> {
        let call = classify(request);
        self.log
            .lock()
            .unwrap()
            .push((call, request.messages[1].content.clone()));
        match call {
            Call::Similarity => (self.similarity)(),
            Call::Risk => (self.risk)(),
        }
    }
}

fn similarity_ok() -> ddi_risk::Result<String> {
    Ok("The two compounds share little structure.".to_string())
}

fn risk_ok() -> ddi_risk::Result<String> {
    Ok("Step 1: both drugs are renally cleared...".to_string())
}

fn transient() -> ddi_risk::Result<String> {
    Err(DdiError::TransientProvider("rate limited".to_string()))
}

fn auth() -> ddi_risk::Result<String> {
    Err(DdiError::Auth("Incorrect API key provided".to_string()))
}

fn refused() -> ddi_risk::Result<String> {
    Err(DdiError::ContentPolicy("Your request was rejected by our safety system".to_string()))
}

fn lookup(map: DrugIdMap) -> EntityLookup {
    let table = EntityTable::from_rows(vec![
        ("Compound::X001", vec![1.0, 0.0]),
        ("Compound::X002", vec![0.0, 1.0]),
        ("Compound::X003", vec![0.0, 0.0]),
    ])
    .unwrap();
    EntityLookup::new(Arc::new(map), Arc::new(table), MatchPolicy::Substring)
}

fn default_map() -> DrugIdMap {
    DrugIdMap::new([("Aspirin", "X001"), ("Ibuprofen", "X002"), ("Placebo", "X003")])
}

fn pipeline(provider: Arc<ScriptedProvider>, map: DrugIdMap) -> DdiPipeline {
    DdiPipeline::new(lookup(map), NarrativeGenerator::new(provider))
}

fn request(drug1: &str, drug2: &str) -> AssessmentRequest {
    AssessmentRequest {
        drug1: drug1.to_string(),
        drug2: drug2.to_string(),
        age: 70,
        lab_results: "Elevated creatinine levels".to_string(),
    }
}

#[tokio::test]
async fn test_complete_assessment() -> Result<(), Box<dyn std::error::Error>> {
    let provider = ScriptedProvider::new(similarity_ok, risk_ok);
    let pipeline = pipeline(provider.clone(), default_map());

    let result = pipeline.assess(&request("Aspirin", "Ibuprofen")).await;

    assert_eq!(result.status, AssessmentStatus::Complete);
    assert_eq!(result.similarity_score, Some(0.0));
    assert_eq!(result.similarity_description.as_deref(), Some("The two compounds share little structure."));
    assert_eq!(result.risk_narrative.as_deref(), Some("Step 1: both drugs are renally cleared..."));
    assert!(result.failures.is_empty());

    let mut calls = provider.calls();
    calls.sort_by_key(|c| *c == Call::Risk);
    assert_eq!(calls, vec![Call::Similarity, Call::Risk]);

    let similarity_prompt = provider.prompt_for(Call::Similarity).unwrap();
    assert!(similarity_prompt.contains("Cosine Similarity of Aspirin and Ibuprofen is: 0.0000"));
    let risk_prompt = provider.prompt_for(Call::Risk).unwrap();
    assert!(risk_prompt.contains("- Age: 70\n- Medications: Aspirin and Ibuprofen\n- Lab Results: Elevated creatinine levels"));
    assert!(risk_prompt.contains("Let's think step by step."));
    Ok(())
}

#[tokio::test]
async fn test_score_orthogonal_embeddings() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = pipeline(ScriptedProvider::new(similarity_ok, risk_ok), default_map());
    assert_eq!(pipeline.score("Aspirin", "Ibuprofen")?, 0.0);
    assert!((pipeline.score("Aspirin", "Aspirin")? - 1.0).abs() < 1e-12);
    Ok(())
}

#[tokio::test]
async fn test_identical_drugs_rejected_without_any_call() {
    for (drug, age) in [("Aspirin", 70), ("Unknown", 200), ("", 0)] {
        let provider = ScriptedProvider::new(similarity_ok, risk_ok);
        let pipeline = pipeline(provider.clone(), default_map());
        let mut req = request(drug, drug);
        req.age = age;

        let result = pipeline.assess(&req).await;

        assert_eq!(result.status, AssessmentStatus::Rejected);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].kind, FailureKind::IdenticalDrugs);
        assert_eq!(result.failures[0].step, PipelineStep::Validate);
        assert!(result.similarity_score.is_none());
        assert!(result.risk_narrative.is_none());
        assert!(provider.calls().is_empty());
    }
}

#[tokio::test]
async fn test_unknown_drug_still_assesses_risk() {
    let provider = ScriptedProvider::new(similarity_ok, risk_ok);
    let map = DrugIdMap::new([("Ibuprofen", "X002")]);
    let pipeline = pipeline(provider.clone(), map);

    let result = pipeline.assess(&request("Aspirin", "Ibuprofen")).await;

    assert_eq!(result.status, AssessmentStatus::PartialSuccess);
    assert!(result.similarity_score.is_none());
    assert!(result.similarity_description.is_none());
    assert!(result.risk_narrative.is_some());
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].step, PipelineStep::Resolve);
    assert_eq!(result.failures[0].kind, FailureKind::UnknownDrug);
    assert_eq!(provider.calls(), vec![Call::Risk]);
}

#[tokio::test]
async fn test_both_lookups_reported() {
    let provider = ScriptedProvider::new(similarity_ok, risk_ok);
    let map = DrugIdMap::new([("Ghost", "X999")]);
    let pipeline = pipeline(provider, map);

    let result = pipeline.assess(&request("Ghost", "Aspirin")).await;

    let kinds: Vec<FailureKind> = result.failures.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![FailureKind::NotFound, FailureKind::UnknownDrug]);
    assert!(result.risk_narrative.is_some());
}

#[tokio::test]
async fn test_degenerate_embedding_degrades_similarity_only() {
    let provider = ScriptedProvider::new(similarity_ok, risk_ok);
    let pipeline = pipeline(provider.clone(), default_map());

    let result = pipeline.assess(&request("Aspirin", "Placebo")).await;

    assert_eq!(result.status, AssessmentStatus::PartialSuccess);
    assert!(result.similarity_score.is_none());
    assert_eq!(result.failure_at(PipelineStep::Score).map(|f| f.kind), Some(FailureKind::DegenerateVector));
    assert!(result.risk_narrative.is_some());
    assert_eq!(provider.calls(), vec![Call::Risk]);
}

#[tokio::test]
async fn test_transient_risk_failure_keeps_similarity() {
    let provider = ScriptedProvider::new(similarity_ok, transient);
    let pipeline = pipeline(provider, default_map());

    let result = pipeline.assess(&request("Aspirin", "Ibuprofen")).await;

    assert_eq!(result.status, AssessmentStatus::PartialSuccess);
    assert_eq!(result.similarity_score, Some(0.0));
    assert!(result.similarity_description.is_some());
    assert!(result.risk_narrative.is_none());
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].kind, FailureKind::TransientProvider);
    assert_eq!(result.failures[0].step, PipelineStep::AssessRisk);
}

#[tokio::test]
async fn test_narration_failure_keeps_numeric_score() {
    let provider = ScriptedProvider::new(refused, risk_ok);
    let pipeline = pipeline(provider, default_map());

    let result = pipeline.assess(&request("Aspirin", "Ibuprofen")).await;

    assert_eq!(result.similarity_score, Some(0.0));
    assert!(result.similarity_description.is_none());
    let failure = result.failure_at(PipelineStep::NarrateSimilarity).unwrap();
    assert_eq!(failure.kind, FailureKind::ContentPolicy);
    assert!(failure.message.contains("Your request was rejected by our safety system"));
    assert!(result.risk_narrative.is_some());
}

#[tokio::test]
async fn test_auth_failure_short_circuits_remaining_calls() {
    let provider = ScriptedProvider::new(auth, risk_ok);
    let pipeline = pipeline(provider.clone(), default_map()).sequential();

    let result = pipeline.assess(&request("Aspirin", "Ibuprofen")).await;

    assert_eq!(result.status, AssessmentStatus::PartialSuccess);
    assert_eq!(result.similarity_score, Some(0.0));
    assert!(result.similarity_description.is_none());
    assert!(result.risk_narrative.is_none());
    assert_eq!(result.failure_at(PipelineStep::NarrateSimilarity).map(|f| f.kind), Some(FailureKind::Auth));
    assert_eq!(result.failure_at(PipelineStep::AssessRisk).map(|f| f.kind), Some(FailureKind::Auth));
    // risk call never reached the provider
    assert_eq!(provider.calls(), vec![Call::Similarity]);

    // the next request starts with a fresh gate; no similarity call for a zero embedding
    let result = pipeline.assess(&request("Aspirin", "Placebo")).await;
    assert_eq!(provider.calls(), vec![Call::Similarity, Call::Risk]);
    assert!(result.risk_narrative.is_some());
}

#[tokio::test]
async fn test_repeated_assessments_are_identical() -> Result<(), Box<dyn std::error::Error>> {
    let provider = ScriptedProvider::new(similarity_ok, transient);
    let pipeline = pipeline(provider, default_map());

    let first = pipeline.assess(&request("Aspirin", "Ibuprofen")).await;
    let second = pipeline.assess(&request("Aspirin", "Ibuprofen")).await;

    assert_eq!(first, second);
    assert_eq!(serde_json::to_string(&first)?, serde_json::to_string(&second)?);
    Ok(())
}

#[tokio::test]
async fn test_result_surface_serialization() -> Result<(), Box<dyn std::error::Error>> {
    let provider = ScriptedProvider::new(similarity_ok, transient);
    let pipeline = pipeline(provider, default_map());

    let result = pipeline.assess(&request("Aspirin", "Ibuprofen")).await;
    let json = serde_json::to_value(&result)?;

    assert_eq!(json["status"], "PartialSuccess");
    assert_eq!(json["similarityScore"], 0.0);
    assert!(json["riskNarrative"].is_null());
    assert_eq!(json["failures"][0]["kind"], "TransientProviderError");
    assert_eq!(json["failures"][0]["step"], "assess_risk");
    Ok(())
}
