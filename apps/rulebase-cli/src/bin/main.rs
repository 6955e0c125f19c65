use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use rulebase_core::chunker::{ChunkLabels, HierarchicalChunker};
use rulebase_core::config::{Config, Settings};
use rulebase_core::types::{DocType, ScopeKey, SearchResult, Shard};
use rulebase_embed::get_default_embedder;
use rulebase_hybrid::{
    DualPathPipeline, HybridRetriever, IngestMode, IngestRequest, IngestSource, Ingestor, PassthroughReranker,
    RrfParams, ScopedStore,
};

#[derive(Parser, Debug)]
#[command(name = "rulebase", about = "Chunk, index and query hockey rulebooks by scope")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk a layout file and print the chunks as JSON, without touching the stores
    Chunk {
        #[arg(long)]
        variant: String,
        /// Layout JSON (one shard or an array of shards), or a directory of them
        layout: PathBuf,
    },
    /// Chunk, embed and store one rulebook
    Ingest {
        #[arg(long)]
        variant: String,
        /// Country code for local rules; omit for the official rulebook
        #[arg(long)]
        country: Option<String>,
        /// Layout JSON file or directory (official rulebooks)
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        layout: Option<PathBuf>,
        /// Plain text file (local rulebooks)
        #[arg(long)]
        text: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Mode::Replace)]
        mode: Mode,
    },
    /// Dual-path retrieval: official rules, plus the country's local rules when given
    Query {
        query: String,
        #[arg(long)]
        variant: String,
        #[arg(long)]
        country: Option<String>,
        /// Results per scope (defaults to retrieval.k)
        #[arg(long)]
        k: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove one scope
    Delete {
        #[arg(long)]
        variant: String,
        #[arg(long)]
        country: Option<String>,
    },
    /// List countries that have local rules
    Jurisdictions {
        #[arg(long)]
        variant: Option<String>,
    },
    /// Remove every scope from both stores
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Replace,
    Append,
}

impl From<Mode> for IngestMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Replace => IngestMode::Replace,
            Mode::Append => IngestMode::Append,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lance=warn,tantivy=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn parse_shards(path: &Path) -> Result<Vec<Shard>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if let Ok(many) = serde_json::from_str::<Vec<Shard>>(&raw) {
        return Ok(many);
    }
    let one: Shard = serde_json::from_str(&raw).with_context(|| format!("parsing layout {}", path.display()))?;
    Ok(vec![one])
}

/// Shards from one file, or from every `.json` file under a directory in path order.
fn load_shards(path: &Path) -> Result<Vec<Shard>> {
    if path.is_file() {
        return parse_shards(path);
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|x| x == "json"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    if files.is_empty() {
        bail!("no layout JSON files under {}", path.display());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} shard files {msg}")?.progress_chars("##-"));
    let mut shards = Vec::new();
    for file in &files {
        shards.extend(parse_shards(file)?);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(shards)
}

fn print_results(results: &[SearchResult]) {
    for (i, r) in results.iter().enumerate() {
        let m = &r.metadata;
        let scope = m.country.as_deref().unwrap_or("official");
        println!(
            "{:>2}. [{}] {} | {} | p.{} | score {:.4}",
            i + 1,
            scope,
            m.rule.as_deref().unwrap_or("-"),
            m.section.as_deref().unwrap_or("-"),
            m.page.map_or_else(|| "-".to_string(), |p| p.to_string()),
            r.fused_score
        );
        let preview: String = r.content.chars().take(160).collect();
        println!("    {}", preview.replace('\n', " "));
    }
}

async fn open_store(settings: &Settings) -> Result<ScopedStore> {
    let store = ScopedStore::connect(&settings.data, settings.embedding.dim).await?;
    store.ensure_schema().await?;
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Config::load()?.settings()?;

    match cli.command {
        Command::Chunk { variant, layout } => {
            settings.check_variant(&variant)?;
            let labels =
                ChunkLabels::new(variant, settings.chunking.source_tag.clone()).with_doc_type(DocType::Official);
            let chunks = HierarchicalChunker::new(labels).chunk_shards(&load_shards(&layout)?);
            println!("{}", serde_json::to_string_pretty(&chunks)?);
        }
        Command::Ingest { variant, country, layout, text, mode } => {
            let source = match (layout, text) {
                (Some(path), _) => IngestSource::Layout(load_shards(&path)?),
                (None, Some(path)) => {
                    let body = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
                    let name = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
                    IngestSource::Text { text: body, source: name }
                }
                (None, None) => bail!("either --layout or --text is required"),
            };
            let embedder = get_default_embedder(&settings.embedding)?;
            let store = open_store(&settings).await?;
            let request = IngestRequest { variant, country, source, mode: mode.into() };

            let spinner = ProgressBar::new_spinner();
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_message("chunking, embedding and writing");
            let written = Ingestor::new(&store, embedder.as_ref(), &settings).ingest(&request).await;
            spinner.finish_and_clear();
            let written = written?;
            println!("Ingested {written} chunks");
        }
        Command::Query { query, variant, country, k, json } => {
            settings.check_variant(&variant)?;
            let embedder = get_default_embedder(&settings.embedding)?;
            let store = open_store(&settings).await?;
            let query_vector = embedder
                .embed_batch(std::slice::from_ref(&query))?
                .pop()
                .context("embedder returned no vector for the query")?;

            let retriever = HybridRetriever::new(&store, &store, RrfParams::from(&settings.retrieval));
            let k = k.unwrap_or(settings.retrieval.k);
            let pipeline = DualPathPipeline::new(retriever, PassthroughReranker, k, settings.retrieval.rerank_top_n);
            let out = pipeline.run(&query, &query_vector, &variant, country.as_deref()).await?;
            for path in &out.paths {
                if let Some(d) = &path.degraded {
                    eprintln!("warning: {} answered without {:?} search: {}", path.scope, d.path, d.reason);
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&out.results)?);
            } else {
                print_results(&out.results);
            }
        }
        Command::Delete { variant, country } => {
            settings.check_variant(&variant)?;
            let scope = ScopeKey::new(&variant, country.as_deref())?;
            let store = open_store(&settings).await?;
            let before = store.count(&scope).await?;
            store.delete_scope(&scope).await?;
            println!("Deleted {before} chunks from {scope}");
        }
        Command::Jurisdictions { variant } => {
            let store = open_store(&settings).await?;
            for country in store.list_jurisdictions(variant.as_deref()).await? {
                println!("{country}");
            }
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("refusing to clear every scope without --yes");
            }
            let store = open_store(&settings).await?;
            store.clear_all().await?;
            info!("All scopes cleared");
        }
    }
    Ok(())
}
