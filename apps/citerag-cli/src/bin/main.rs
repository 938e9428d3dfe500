use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use citerag_cite::{highlight_passages, view_document, AnswerComposer, FsDocumentStore};
use citerag_core::config::{Config, RagSettings, ScoringProvider};
use citerag_core::corpus::ChunkStore;
use citerag_core::traits::{RelevanceScorer, VectorIndex};
use citerag_core::Error;
use citerag_embed::get_default_embedder;
use citerag_hybrid::retriever::StageTimeouts;
use citerag_hybrid::{HybridRetriever, MultiQueryAggregator, OverlapScorer, QueryExpander};
use citerag_llm::{HttpReranker, OllamaGenerator};
use citerag_text::TantivyLexicalIndex;
use citerag_vector::{FlatVectorIndex, LanceVectorIndex};

const USAGE: &str = "Usage: citerag <retrieve \"<query>\" [top_k] | ask \"<query>\" | view <filename> \"<passage>\"...>";
const EMBED_BATCH: usize = 64;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

struct Engine {
    settings: RagSettings,
    aggregator: MultiQueryAggregator,
    composer: AnswerComposer,
}

async fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    let settings = config.settings()?;
    let store = Arc::new(ChunkStore::load_csv(&config.resolve(&settings.data.metadata_csv))?);
    let embedder = get_default_embedder(&settings.embedding, &settings.llm)?;
    let lexical = TantivyLexicalIndex::build_in_ram(store.iter())?;

    let vector: Arc<dyn VectorIndex> = match &settings.data.lancedb_uri {
        Some(uri) => {
            let uri = if uri.contains("://") { uri.clone() } else { config.resolve(uri).display().to_string() };
            Arc::new(LanceVectorIndex::open(&uri, &settings.data.lancedb_table).await?)
        }
        None => {
            let pb = ProgressBar::new(store.len() as u64);
            pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks embedded")?.progress_chars("#>-"));
            let flat = FlatVectorIndex::embed_store(&store, embedder.as_ref(), EMBED_BATCH, |n| pb.inc(n as u64)).await?;
            pb.finish_and_clear();
            Arc::new(flat)
        }
    };

    let scorer: Arc<dyn RelevanceScorer> = match settings.scoring.provider {
        ScoringProvider::Overlap => Arc::new(OverlapScorer),
        ScoringProvider::Http => Arc::new(HttpReranker::new(&settings.scoring.url, settings.scoring.timeout())?),
    };
    let timeouts = StageTimeouts { embed: settings.embedding.timeout(), score: settings.scoring.timeout(), ..StageTimeouts::default() };
    let retriever = HybridRetriever::new(store, embedder, scorer)
        .with_vector(vector)
        .with_lexical(Arc::new(lexical))
        .with_timeouts(timeouts);

    let expansion_llm = Arc::new(OllamaGenerator::new(&settings.llm, settings.expansion.timeout())?);
    let answer_llm = Arc::new(OllamaGenerator::new(&settings.llm, settings.generation.timeout())?);
    let aggregator = MultiQueryAggregator::new(
        QueryExpander::new(expansion_llm, settings.expansion.clone()),
        retriever,
        settings.retrieval.clone(),
    );
    let composer = AnswerComposer::new(answer_llm, settings.generation.clone());
    Ok(Engine { settings, aggregator, composer })
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {e}"); e })?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "retrieve" => {
            let Some(query) = args.first() else { eprintln!("{USAGE}"); std::process::exit(1) };
            let engine = build_engine(&config).await?;
            let top_k = match args.get(1) {
                Some(k) => k.parse::<usize>().map_err(|_| anyhow::anyhow!("top_k must be a number, got '{k}'"))?,
                None => engine.settings.retrieval.top_k,
            };
            let retrieved = engine.aggregator.retrieve_knowledge(query, top_k).await;
            print_json(&retrieved)?;
        }
        "ask" => {
            let Some(query) = args.first() else { eprintln!("{USAGE}"); std::process::exit(1) };
            let engine = build_engine(&config).await?;
            let retrieved = engine.aggregator.retrieve_knowledge(query, engine.settings.retrieval.top_k).await;
            let answer = engine.composer.compose(query, &[], &retrieved).await;
            let citations = answer.citations(&engine.settings.attribution);
            let highlights: BTreeMap<usize, _> = citations
                .iter()
                .filter_map(|(index, record)| {
                    let doc = answer.mapping.get(*index)?;
                    let passages: Vec<&str> = record.passages.iter().map(|p| p.passage).collect();
                    Some((*index, highlight_passages(&doc.content, &passages)))
                })
                .collect();
            print_json(&json!({
                "response": answer.response,
                "citations": citations,
                "highlighted_passages": highlights,
                "source_documents": answer.source_documents(),
            }))?;
        }
        "view" => {
            let Some((filename, passages)) = args.split_first() else { eprintln!("{USAGE}"); std::process::exit(1) };
            let settings = config.settings()?;
            let store = FsDocumentStore::new(config.resolve(&settings.data.documents_dir));
            match view_document(&store, filename, passages) {
                Ok(view) => print_json(&view)?,
                Err(Error::NotFound(name)) => { eprintln!("Document not found: {name}"); std::process::exit(2) }
                Err(e) => return Err(e.into()),
            }
        }
        _ => { eprintln!("Unknown command: {cmd}\n{USAGE}"); std::process::exit(1); }
    }
    Ok(())
}
