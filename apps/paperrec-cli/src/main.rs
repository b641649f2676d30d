//! `paperrec`: recommend papers and datasets for a free-text request.
//!
//! ```bash
//! paperrec recommend "cancer imaging with deep learning" --top-k 5
//! paperrec recommend "robot navigation" --mode hybrid --output results.jsonl
//! paperrec recommend "graph neural networks" --output outputs/recommendations.csv
//! paperrec cache --corpus data/papers_clean.prep.csv
//! paperrec eval --queries queries.csv --qrels qrels.csv
//! ```
//!
//! Settings come from `config.toml` / `config.<env>.toml` / `APP_*` variables;
//! command-line flags override them.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use paperrec_core::config::{expand_path, Config, DataConfig, RecommenderConfig};
use paperrec_core::corpus;
use paperrec_core::traits::{Embedder, ResultSink};
use paperrec_core::types::{BackendMode, Document, RankedResult};
use paperrec_embed::load_embedder;
use paperrec_hybrid::eval::{evaluate, load_qrels, load_queries};
use paperrec_hybrid::{CsvSink, JsonlSink, LeadSummarizer, PrefitState, Recommender};
use paperrec_text::snapshot;
use paperrec_vector::table::open_db;
use paperrec_vector::{compose_text, embed_corpus_cached, DenseMatrix};

const EMBED_BATCH: usize = 32;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Lexical,
    Dense,
    Hybrid,
}

impl From<ModeArg> for BackendMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Lexical => BackendMode::Lexical,
            ModeArg::Dense => BackendMode::Dense,
            ModeArg::Hybrid => BackendMode::Hybrid,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "paperrec", version, about = "Hybrid lexical + semantic paper recommender")]
struct Cli {
    /// Corpus file (CSV / JSON array / JSONL) or directory; defaults to data.corpus_path
    #[arg(long, global = true, value_name = "PATH")]
    corpus: Option<PathBuf>,

    /// Backend mode; defaults to recommender.mode
    #[arg(long, global = true, value_enum)]
    mode: Option<ModeArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank the corpus against a query
    Recommend {
        /// Free-text request
        query: String,

        /// Number of results to return
        #[arg(long, short = 'k', default_value = "5")]
        top_k: usize,

        /// Write results here: a `.csv` path is replaced with a table, any
        /// other path gets JSON lines appended; defaults to data.output_path
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Print results as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Fit the corpus and store the lexical snapshot and embedding cache
    Cache,
    /// Report mean nDCG@k, MRR@k and Recall@k over judged queries
    Eval {
        /// CSV with id,title,desc columns
        #[arg(long, value_name = "PATH")]
        queries: PathBuf,

        /// CSV with id,doc_id,rel columns
        #[arg(long, value_name = "PATH")]
        qrels: PathBuf,

        /// Cutoff for every metric
        #[arg(long, short = 'k', default_value = "10")]
        top_k: usize,

        /// Print per-query metrics as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let mut rec_config = config.recommender()?;
    if let Some(mode) = cli.mode {
        rec_config.mode = mode.into();
    }
    let data = config.data()?;
    let corpus_path = match (&cli.corpus, &data.corpus_path) {
        (Some(p), _) => p.clone(),
        (None, Some(p)) => expand_path(p),
        (None, None) => return Err(anyhow!("no corpus given (use --corpus or set data.corpus_path)")),
    };
    let documents = corpus::load_path(&corpus_path)?;
    info!("Loaded {} documents from {}", documents.len(), corpus_path.display());

    let embedder = if rec_config.mode.uses_dense() { Some(load_embedder(&config.embedding()?)?) } else { None };

    match cli.command {
        Command::Recommend { query, top_k, output, json } => {
            let rec = build_recommender(rec_config, documents, embedder, &data, true)?;
            let start = Instant::now();
            let results = rec.recommend(&query, top_k)?;
            info!("Ranked {} documents in {:?}", rec.corpus().len(), start.elapsed());
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&query, rec.mode(), &results);
            }
            if let Some(path) = output.or_else(|| data.output_path.as_deref().map(expand_path)) {
                if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
                    CsvSink::create(&path)?.persist(&results)?;
                    info!("Wrote {} results to {}", results.len(), path.display());
                } else {
                    JsonlSink::append_to(&path)?.persist(&results)?;
                    info!("Appended {} results to {}", results.len(), path.display());
                }
            }
        }
        Command::Cache => {
            let rec = build_recommender(rec_config, documents, embedder, &data, false)?;
            let path = expand_path(&data.snapshot_path);
            if let Some(state) = rec.lexical_state() {
                snapshot::save(&path, state)?;
                println!("✅ Lexical snapshot written to {}", path.display());
            }
            if let Some(matrix) = rec.dense_matrix() {
                println!("✅ {} embeddings cached in {}", matrix.n_rows(), expand_path(&data.cache_dir).display());
            }
        }
        Command::Eval { queries, qrels, top_k, json } => {
            let queries = load_queries(&queries)?;
            let qrels = load_qrels(&qrels)?;
            let rec = build_recommender(rec_config, documents, embedder, &data, true)?;
            let report = evaluate(&rec, &queries, &qrels, top_k)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "📊 {} queries  nDCG@{k}={:.3}  MRR@{k}={:.3}  Recall@{k}={:.3}",
                    report.per_query.len(),
                    report.mean_ndcg,
                    report.mean_mrr,
                    report.mean_recall,
                    k = report.k
                );
            }
        }
    }
    Ok(())
}

/// Assemble a fitted recommender, reusing the lexical snapshot (when
/// `use_snapshot`) and the embedding cache. A snapshot that does not fit the
/// corpus or settings is ignored and the lexical space is refitted.
fn build_recommender(
    config: RecommenderConfig,
    documents: Vec<Document>,
    embedder: Option<Arc<dyn Embedder>>,
    data: &DataConfig,
    use_snapshot: bool,
) -> Result<Recommender> {
    let summarizer = LeadSummarizer::new(config.summary_chars);
    let lexical = if use_snapshot && config.mode.uses_lexical() {
        snapshot::load(&expand_path(&data.snapshot_path))?
    } else {
        None
    };
    let dense = match &embedder {
        Some(e) => Some(cached_embeddings(e.as_ref(), &documents, data)?),
        None => None,
    };

    let prefit = PrefitState { lexical, dense };
    let had_snapshot = prefit.lexical.is_some();
    let rec = match Recommender::from_prefit(config.clone(), documents.clone(), embedder.clone(), prefit.clone()) {
        Ok(rec) => rec,
        Err(e) if had_snapshot => {
            warn!("Ignoring lexical snapshot: {}", e);
            Recommender::from_prefit(config, documents, embedder, PrefitState { lexical: None, ..prefit })?
        }
        Err(e) => return Err(e.into()),
    };
    Ok(rec.with_summarizer(Box::new(summarizer)))
}

fn cached_embeddings(embedder: &dyn Embedder, documents: &[Document], data: &DataConfig) -> Result<DenseMatrix> {
    let texts: Vec<String> = documents.iter().map(|d| compose_text(&d.title, &d.description)).collect();
    let cache_dir = expand_path(&data.cache_dir);
    std::fs::create_dir_all(&cache_dir).with_context(|| format!("creating {}", cache_dir.display()))?;
    let uri = cache_dir.to_string_lossy().to_string();
    let table = data.cache_table.clone();
    let rt = tokio::runtime::Runtime::new()?;
    let cached = rt.block_on(async {
        let conn = open_db(&uri).await?;
        embed_corpus_cached(&conn, &table, embedder, &texts, EMBED_BATCH).await
    })?;
    info!("Embedding cache: {} hits, {} misses", cached.hits, cached.misses);
    Ok(DenseMatrix::from_rows(embedder.dim(), cached.vectors)?)
}

fn print_results(query: &str, mode: BackendMode, results: &[RankedResult<'_>]) {
    println!("🔍 \"{}\" ({} mode): {} results", query, mode, results.len());
    for r in results {
        println!("\n{}. {}  [{}]  score={:.4}", r.rank, display_title(&r.document.title), r.tier, r.score);
        if let Some(url) = &r.document.url {
            println!("   🔗 {}", url);
        }
        println!("   {}", r.explanation);
    }
}

fn display_title(title: &str) -> &str {
    if title.trim().is_empty() { "(untitled)" } else { title }
}
