use anyhow::Result;
use clap::{Parser, Subcommand};
use ddi_risk::{AssessmentRequest, AssessmentResult, AssessmentStatus, DdiPipeline, MatchPolicy, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ddi-risk")]
#[command(about = "Personalized drug-drug interaction risk assessment")]
struct Args {
    /// Path to the drug embedding CSV (or set DDI_EMBEDDINGS_PATH)
    #[arg(long, global = true)]
    embeddings: Option<PathBuf>,

    /// Path to the drug name -> id map, .json or .csv (or set DDI_DRUG_MAP_PATH)
    #[arg(long, global = true)]
    drug_map: Option<PathBuf>,

    /// Require entity names to equal Compound::<id> instead of containing it
    #[arg(long, global = true)]
    exact_match: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score two drugs and generate similarity and risk narratives
    Assess {
        drug1: String,
        drug2: String,

        /// Patient age in years
        #[arg(long, default_value_t = 70)]
        age: u32,

        /// Free-text lab results
        #[arg(long, default_value = "Elevated creatinine levels")]
        lab_results: String,

        /// OpenAI API key (or set OPENAI_API_KEY env var)
        #[arg(long)]
        api_key: Option<String>,

        /// Model name (or set DDI_LLM_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Per-call timeout in seconds (or set DDI_LLM_TIMEOUT_SECS)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Retries for transient provider failures (or set DDI_LLM_MAX_RETRIES)
        #[arg(long)]
        retries: Option<usize>,

        /// Run the similarity and risk branches one after the other
        #[arg(long)]
        sequential: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print only the cosine similarity of two drugs (no LLM call)
    Similarity { drug1: String, drug2: String },

    /// List selectable drug names
    Drugs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = PipelineConfig::from_env()?;
    if let Some(path) = args.embeddings {
        config.embeddings_path = path;
    }
    if let Some(path) = args.drug_map {
        config.drug_map_path = path;
    }
    if args.exact_match {
        config.match_policy = MatchPolicy::Exact;
    }

    match args.command {
        Command::Drugs => {
            let drug_map = config.load_drug_map()?;
            for name in drug_map.names() {
                println!("{}", name);
            }
        }
        Command::Similarity { drug1, drug2 } => {
            let lookup = config.load_lookup()?;
            let a = lookup.resolve(&drug1)?;
            let b = lookup.resolve(&drug2)?;
            let score = ddi_risk::similarity::cosine_similarity(a, b)?;
            println!("{:.6}", score);
        }
        Command::Assess {
            drug1,
            drug2,
            age,
            lab_results,
            api_key,
            model,
            timeout_secs,
            retries,
            sequential,
            json,
        } => {
            if api_key.is_some() {
                config.llm.api_key = api_key;
            }
            if let Some(model) = model {
                config.llm.model = model;
            }
            if let Some(secs) = timeout_secs {
                config.llm.timeout = Duration::from_secs(secs.max(1));
            }
            if let Some(retries) = retries {
                config.llm.max_retries = retries;
            }
            if sequential {
                config.concurrent = false;
            }

            info!("DDI risk assessment starting...");
            let client = config.llm.client()?;
            let pipeline: DdiPipeline = config.build_pipeline(Arc::new(client))?;

            let request = AssessmentRequest {
                drug1,
                drug2,
                age,
                lab_results,
            };
            let result = pipeline.assess(&request).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }

            if result.status == AssessmentStatus::Rejected {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

fn print_result(result: &AssessmentResult) {
    println!("\n=== Similarity between {} and {} ===", result.drug1, result.drug2);
    match result.similarity_score {
        Some(score) => println!("Cosine similarity: {:.4}", score),
        None => println!("Cosine similarity: unavailable"),
    }
    if let Some(ref description) = result.similarity_description {
        println!("{}", description);
    }

    println!("\n=== Risk Assessment ===");
    match result.risk_narrative {
        Some(ref narrative) => println!("{}", narrative),
        None => println!("unavailable"),
    }

    if !result.failures.is_empty() {
        println!("\n=== {:?} ===", result.status);
        for failure in &result.failures {
            println!("- {} [{}]: {}", failure.step, failure.kind, failure.message);
        }
    }
}
