use anyhow::{Context, Result};
use cdp_core::export::{events_by_naming, write_combined, CombinedRecord};
use cdp_core::persist::{
    load_scores, load_versions, load_versions_file, read_json, save_meta, save_scores, save_versions, IndexPaths,
    MetaFile, FORMAT_VERSION,
};
use cdp_core::ranker::{search, validate_ceiling, RankOptions, DEFAULT_FUZZY_DISTANCE_CEILING, DEFAULT_MAX_RESULTS};
use cdp_core::{CorpusIndex, TranscriptDir, VersionStore};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "cdp-indexer")]
#[command(about = "Build and query the transcript relevancy index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile transcript versions and rebuild the weighted score table
    Build {
        /// Directory of {document_id}.txt transcripts
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Externally sourced version history (JSON); new versions are appended to the stored ones
        #[arg(long)]
        versions: Option<PathBuf>,
        /// Run this query after the build and log how long it took
        #[arg(long)]
        test_query: Option<String>,
    },
    /// Rank transcripts against a query and print the hits as JSON
    Search {
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        #[arg(long)]
        query: String,
        /// Exact matches only
        #[arg(long, default_value_t = false)]
        no_fuzzy: bool,
        #[arg(long, default_value_t = DEFAULT_FUZZY_DISTANCE_CEILING, value_parser = parse_ceiling)]
        ceiling: f64,
        #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
        k: usize,
        /// Apply the document tokenizer to the query
        #[arg(long, default_value_t = false)]
        normalize_query: bool,
        /// Keep only the N closest fuzzy matches per query term
        #[arg(long)]
        max_fuzzy: Option<usize>,
    },
    /// Write combined_data.json (events, scores, versions) for the remote store
    Export {
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Scraped event feeds (JSON array of records with a `naming` field)
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, versions, test_query } => {
            build_index(&input, &output, versions.as_deref(), test_query.as_deref())
        }
        Commands::Search { index, query, no_fuzzy, ceiling, k, normalize_query, max_fuzzy } => {
            let opts = RankOptions {
                fuzzy: !no_fuzzy,
                fuzzy_distance_ceiling: ceiling,
                max_results: k,
                normalize_query,
                max_fuzzy_matches_per_term: max_fuzzy,
            };
            run_search(&index, &query, &opts)
        }
        Commands::Export { index, output, events } => export(&index, &output, events.as_deref()),
    }
}

fn parse_ceiling(s: &str) -> std::result::Result<f64, String> {
    let ceiling: f64 = s.parse().map_err(|e| format!("{e}"))?;
    validate_ceiling(ceiling).map_err(|e| e.to_string())?;
    Ok(ceiling)
}

fn build_index(input: &Path, output: &Path, versions: Option<&Path>, test_query: Option<&str>) -> Result<()> {
    let start = Instant::now();
    let transcripts = TranscriptDir::new(input);
    let out_paths = IndexPaths::new(output);

    let history = load_versions(&out_paths).context("loading stored version history")?;
    let mut store = VersionStore::from_history(history);
    if let Some(path) = versions {
        let external = load_versions_file(path).with_context(|| format!("loading versions from {}", path.display()))?;
        let documents = external.len();
        let appended = store.merge(external);
        tracing::info!(documents, appended, "merged external version history");
    }

    let now = OffsetDateTime::now_utc();
    let reconciled = store.reconcile_dir(&transcripts, now).context("reconciling transcript versions")?;

    let index = CorpusIndex::from_texts(&reconciled.texts);
    tracing::info!(num_docs = index.num_docs(), num_terms = index.num_terms(), "indexed corpus");

    save_scores(&out_paths, &index.scores)?;
    save_versions(&out_paths, store.history())?;
    let meta = MetaFile {
        num_docs: index.num_docs(),
        num_terms: index.num_terms(),
        rewritten_documents: reconciled.rewritten,
        created_at: now.format(&Rfc3339).unwrap_or_default(),
        version: FORMAT_VERSION,
        build_seconds: start.elapsed().as_secs_f64(),
    };
    save_meta(&out_paths, &meta)?;

    if let Some(query) = test_query {
        let t = Instant::now();
        let hits = search(query, &index.scores, &RankOptions::default());
        tracing::info!(query, hits = hits.len(), took_s = t.elapsed().as_secs_f64(), "test query");
    }

    tracing::info!(output = %output.display(), took_s = meta.build_seconds, "index build complete");
    Ok(())
}

fn run_search(index: &Path, query: &str, opts: &RankOptions) -> Result<()> {
    let paths = IndexPaths::new(index);
    let scores = load_scores(&paths).with_context(|| format!("loading index from {}", index.display()))?;
    let start = Instant::now();
    let hits = search(query, &scores, opts);
    tracing::debug!(query, took_s = start.elapsed().as_secs_f64(), "searched corpus");
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}

fn export(index: &Path, output: &Path, events: Option<&Path>) -> Result<()> {
    let paths = IndexPaths::new(index);
    let scores = load_scores(&paths)?;
    let versions = load_versions(&paths)?;
    let events = match events {
        Some(p) => events_by_naming(read_json(p)?)?,
        None => BTreeMap::new(),
    };
    let record = CombinedRecord { events, events_tfidf: &scores, transcript_versioning: &versions };
    for p in write_combined(output, &record, OffsetDateTime::now_utc())? {
        tracing::info!(path = %p.display(), "stored combined data");
    }
    Ok(())
}
