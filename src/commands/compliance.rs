//! CLI commands for the regulatory-compliance research agent.
//!
//! Provides `symbi compliance query|verify|baseline|cache|history`.

use clap::ArgMatches;
use std::path::PathBuf;
use std::sync::Arc;
use symbi_runtime::compliance::baseline::BaselineStore;
use symbi_runtime::compliance::cache::QueryCache;
use symbi_runtime::compliance::config::AppConfig;
use symbi_runtime::compliance::graph::planner::Planner;
use symbi_runtime::compliance::graph::researcher::Researcher;
use symbi_runtime::compliance::graph::validator::Validator;
use symbi_runtime::compliance::handler::QueryHandler;
use symbi_runtime::compliance::history::HistoryStore;
use symbi_runtime::compliance::orchestrator::Orchestrator;
use symbi_runtime::compliance::scheduler::verifier::ScheduledVerifier;
use symbi_runtime::compliance::tools::build_default_registry;
use symbi_runtime::http_input::llm_client::{LlmClient, LlmProvider};
use symbi_runtime::reasoning::inference::InferenceProvider;
use symbi_runtime::reasoning::providers::cloud::CloudInferenceProvider;

pub async fn run(matches: &ArgMatches) {
    match matches.subcommand() {
        Some(("query", sub)) => cmd_query(sub).await,
        Some(("verify", sub)) => cmd_verify(sub).await,
        Some(("baseline", sub)) => cmd_baseline(sub).await,
        Some(("cache", sub)) => cmd_cache(sub).await,
        Some(("history", sub)) => cmd_history(sub).await,
        _ => {
            eprintln!("Unknown compliance subcommand. Use --help for usage.");
            std::process::exit(1);
        }
    }
}

fn load_config() -> AppConfig {
    match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    }
}

fn parse_provider(name: &str) -> LlmProvider {
    match name.to_lowercase().as_str() {
        "openai" => LlmProvider::OpenAI,
        "openrouter" => LlmProvider::OpenRouter,
        _ => LlmProvider::Anthropic,
    }
}

fn build_inference_provider(config: &AppConfig) -> Arc<dyn InferenceProvider> {
    let api_key = config.get_llm_api_key().unwrap_or_else(|e| {
        eprintln!("Missing LLM credentials: {e}");
        std::process::exit(1);
    });
    let client = LlmClient::new(
        parse_provider(&config.llm.provider),
        api_key,
        config.llm.endpoint.clone(),
        config.llm.model.clone(),
    )
    .unwrap_or_else(|e| {
        eprintln!("Failed to build LLM client: {e}");
        std::process::exit(1);
    });
    Arc::new(CloudInferenceProvider::new(client))
}

fn open_baseline_store(config: &AppConfig) -> Arc<BaselineStore> {
    let snapshot = config.cache.dir.join("baseline_snapshot.json");
    Arc::new(BaselineStore::new(Some(snapshot)))
}

async fn cmd_query(sub: &ArgMatches) {
    let query = match sub.get_one::<String>("text") {
        Some(q) => q.clone(),
        None => {
            eprintln!("Usage: symbi compliance query <text> [--jurisdiction CODE] [--skip-cache]");
            std::process::exit(1);
        }
    };
    let jurisdiction = sub.get_one::<String>("jurisdiction").cloned();
    let skip_cache = sub.get_flag("skip-cache");

    let config = load_config();
    let provider = build_inference_provider(&config);
    let tools = Arc::new(build_default_registry(&config));
    let baseline = open_baseline_store(&config);

    let planner = Planner::new(provider.clone(), &config.prompts);
    let researcher = Researcher::new(provider.clone(), tools, &config.prompts);
    let validator = Validator::new(provider, &config.prompts);
    let orchestrator = Orchestrator::new(planner, researcher, validator, baseline);

    let cache = QueryCache::new(config.cache.dir.clone(), config.cache.ttl_hours);
    let history = HistoryStore::with_max_items(config.history.path.clone(), config.history.max_entries);
    let handler = QueryHandler::new(orchestrator, cache, history);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let print_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("… {event:?}");
        }
    });

    match handler.handle(&query, jurisdiction.as_deref(), skip_cache, &tx).await {
        Ok(result) => println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default()),
        Err(e) => {
            eprintln!("Query failed: {e}");
            std::process::exit(1);
        }
    }
    drop(tx);
    let _ = print_task.await;
}

async fn cmd_verify(sub: &ArgMatches) {
    let config = load_config();
    let baseline = open_baseline_store(&config);
    let tools = Arc::new(build_default_registry(&config));

    let mut verifier = ScheduledVerifier::new(baseline, tools);
    if let Some(days) = sub.get_one::<String>("days").and_then(|s| s.parse().ok()) {
        verifier = verifier.with_thresholds(days, symbi_runtime::compliance::scheduler::verifier::DEFAULT_MAX_COUNT);
    }

    let summary = verifier.run().await;
    println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
}

async fn cmd_baseline(sub: &ArgMatches) {
    let config = load_config();
    let store = open_baseline_store(&config);

    match sub.subcommand() {
        Some(("keywords", s)) => {
            let country = s.get_one::<String>("country").map(String::as_str).unwrap_or("");
            let industry = s.get_one::<String>("industry").map(String::as_str);
            let topic = s.get_one::<String>("topic").map(String::as_str);
            let keywords = store.mandatory_keywords(country, industry, topic);
            println!("{}", serde_json::to_string_pretty(&keywords).unwrap_or_default());
        }
        Some(("stats", _)) => {
            let stats = store.statistics();
            println!("{}", serde_json::to_string_pretty(&stats).unwrap_or_default());
        }
        Some(("add", s)) => {
            let name = s.get_one::<String>("name").cloned().unwrap_or_default();
            let country = s.get_one::<String>("country").cloned().unwrap_or_default();
            let industry = s.get_one::<String>("industry").cloned().unwrap_or_default();
            let topic = s.get_one::<String>("topic").cloned().unwrap_or_default();
            let identity = symbi_runtime::compliance::types::RegulationIdentity {
                name,
                country_code: country,
                industry_code: industry,
            };
            let baseline = symbi_runtime::compliance::types::RegulationBaseline::new_manual(identity, topic);
            let added = store.add(baseline);
            println!("{}", serde_json::to_string_pretty(&added).unwrap_or_default());
        }
        Some(("query", s)) => {
            let country = s.get_one::<String>("country").cloned();
            let industry = s.get_one::<String>("industry").cloned();
            let topic = s.get_one::<String>("topic").cloned();
            let filter = symbi_runtime::compliance::baseline::QueryFilter {
                country_code: country,
                industry_code: industry,
                topic_code: topic,
                mandatory: None,
                verified: None,
                min_confidence: None,
            };
            let results = store.query(&filter);
            println!("{}", serde_json::to_string_pretty(&results).unwrap_or_default());
        }
        _ => {
            eprintln!("Unknown baseline subcommand. Use --help for usage.");
            std::process::exit(1);
        }
    }
}

async fn cmd_cache(sub: &ArgMatches) {
    let config = load_config();
    let cache = QueryCache::new(config.cache.dir.clone(), config.cache.ttl_hours);

    match sub.subcommand() {
        Some(("list", _)) => match cache.list().await {
            Ok(entries) => println!("{}", serde_json::to_string_pretty(&entries).unwrap_or_default()),
            Err(e) => eprintln!("Failed to list cache: {e}"),
        },
        Some(("clear", _)) => match cache.clear_all().await {
            Ok(count) => println!("Removed {count} cache entries"),
            Err(e) => eprintln!("Failed to clear cache: {e}"),
        },
        _ => {
            eprintln!("Unknown cache subcommand. Use --help for usage.");
            std::process::exit(1);
        }
    }
}

async fn cmd_history(sub: &ArgMatches) {
    let config = load_config();
    let history = HistoryStore::with_max_items(config.history.path.clone(), config.history.max_entries);

    match sub.subcommand() {
        Some(("list", _)) => match history.list().await {
            Ok(entries) => println!("{}", serde_json::to_string_pretty(&entries).unwrap_or_default()),
            Err(e) => eprintln!("Failed to list history: {e}"),
        },
        Some(("show", s)) => {
            let id = s.get_one::<String>("id").cloned().unwrap_or_default();
            match history.get(&id).await {
                Ok(Some(entry)) => println!("{}", serde_json::to_string_pretty(&entry).unwrap_or_default()),
                Ok(None) => {
                    eprintln!("No history entry with id {id}");
                    std::process::exit(1);
                }
                Err(e) => eprintln!("Failed to load history entry: {e}"),
            }
        }
        Some(("clear", _)) => match history.clear_all().await {
            Ok(()) => println!("History cleared"),
            Err(e) => eprintln!("Failed to clear history: {e}"),
        },
        _ => {
            eprintln!("Unknown history subcommand. Use --help for usage.");
            std::process::exit(1);
        }
    }
}

#[allow(dead_code)]
fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/cache")
}
