use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use citerag_core::config::{ExpansionSettings, RetrievalSettings};
use citerag_core::corpus::ChunkStore;
use citerag_core::traits::{Embedder, LexicalIndex, RelevanceScorer, TextGenerator, VectorIndex};
use citerag_core::types::{Chunk, ChunkMeta, GenerationParams, LexicalHit, RetrievalParams, VectorHit};
use citerag_embed::hash::HashEmbedder;
use citerag_hybrid::aggregator::merge_variants;
use citerag_hybrid::retriever::StageTimeouts;
use citerag_hybrid::{HybridRetriever, MultiQueryAggregator, OverlapScorer, QueryExpander};
use citerag_text::TantivyLexicalIndex;
use citerag_vector::FlatVectorIndex;

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    fn name(&self) -> &str { "failing" }
    async fn generate(&self, _prompt: &str, _params: GenerationParams) -> Result<String> {
        Err(anyhow!("service unavailable"))
    }
}

struct SlowGenerator;

#[async_trait]
impl TextGenerator for SlowGenerator {
    fn name(&self) -> &str { "slow" }
    async fn generate(&self, _prompt: &str, _params: GenerationParams) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("Expanded Queries: [\"never\"]".into())
    }
}

struct ScriptedGenerator(String);

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str { "scripted" }
    async fn generate(&self, _prompt: &str, _params: GenerationParams) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Longer passages are more relevant. Deterministic and distinct per text.
struct LengthScorer;

#[async_trait]
impl RelevanceScorer for LengthScorer {
    fn name(&self) -> &str { "length" }
    async fn score_batch(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>> {
        Ok(passages.iter().map(|p| p.len() as f32).collect())
    }
}

struct FailingScorer;

#[async_trait]
impl RelevanceScorer for FailingScorer {
    fn name(&self) -> &str { "failing-scorer" }
    async fn score_batch(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>> {
        Err(anyhow!("scorer down"))
    }
}

struct FixedLexical(Vec<&'static str>);

impl LexicalIndex for FixedLexical {
    fn len(&self) -> usize { self.0.len() }
    fn search(&self, _query: &str, k: usize) -> Result<Vec<LexicalHit>> {
        Ok(self.0.iter().take(k).enumerate().map(|(i, id)| LexicalHit { chunk_id: id.to_string(), score: 10.0 - i as f32 }).collect())
    }
}

struct FixedVector {
    ids: Vec<&'static str>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FixedVector {
    fn new(ids: Vec<&'static str>) -> Self {
        Self { ids, fail: false, delay: None, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl VectorIndex for FixedVector {
    fn len(&self) -> usize { self.ids.len() }
    async fn search_vec(&self, _query_vec: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.fail {
            return Err(anyhow!("vector store offline"));
        }
        Ok(self.ids.iter().take(k).enumerate().map(|(i, id)| VectorHit { chunk_id: id.to_string(), distance: i as f32 * 0.1 }).collect())
    }
}

fn meta(filename: &str) -> ChunkMeta {
    ChunkMeta { filename: filename.into(), source_url: format!("https://docs.example/{filename}") }
}

fn small_store() -> Arc<ChunkStore> {
    Arc::new(ChunkStore::new(vec![
        Chunk { id: "0".into(), text: "duplicated maintenance note".into(), meta: meta("a.txt") },
        Chunk { id: "1".into(), text: "duplicated maintenance note".into(), meta: meta("b.txt") },
        Chunk { id: "2".into(), text: "short".into(), meta: meta("c.txt") },
        Chunk { id: "3".into(), text: "a considerably longer passage about turbine blades".into(), meta: meta("d.txt") },
        Chunk { id: "4".into(), text: "medium passage text".into(), meta: meta("e.txt") },
    ]))
}

fn embedder() -> Arc<dyn Embedder> {
    Arc::new(HashEmbedder::new(64))
}

fn expansion(timeout_ms: u64) -> ExpansionSettings {
    ExpansionSettings { timeout_ms, ..ExpansionSettings::default() }
}

#[tokio::test]
async fn expander_falls_back_when_generation_fails() {
    let expander = QueryExpander::new(Arc::new(FailingGenerator), expansion(1_000));
    let variants = expander.expand("engine wash interval").await;
    assert!(variants.len() >= 4);
    assert!(variants.iter().all(|v| !v.trim().is_empty()));
    assert!(variants.iter().any(|v| v == "engine wash interval"));
}

#[tokio::test]
async fn expander_treats_timeout_as_failure() {
    let expander = QueryExpander::new(Arc::new(SlowGenerator), expansion(50));
    let started = std::time::Instant::now();
    let variants = expander.expand("fuel nozzle").await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(variants[0], "fuel nozzle");
    assert!(variants.len() >= 4);
}

#[tokio::test]
async fn expander_keeps_original_first_and_dedupes() {
    let output = "Original Query: \"fuel nozzle\"\nExpanded Queries: ['nozzle cleaning', 'fuel nozzle', \"injector service\"]";
    let expander = QueryExpander::new(Arc::new(ScriptedGenerator(output.into())), expansion(1_000));
    assert_eq!(expander.expand("fuel nozzle").await, vec!["fuel nozzle", "nozzle cleaning", "injector service"]);
}

#[tokio::test]
async fn expander_falls_back_on_garbage_output() {
    let expander = QueryExpander::new(Arc::new(ScriptedGenerator("I cannot help with that.".into())), expansion(1_000));
    let variants = expander.expand("q").await;
    assert_eq!(variants.len(), 4);
    assert_eq!(variants[0], "q");
}

#[tokio::test]
async fn fused_output_contains_each_text_once() {
    let retriever = HybridRetriever::new(small_store(), embedder(), Arc::new(LengthScorer))
        .with_vector(Arc::new(FixedVector::new(vec!["0", "2"])))
        .with_lexical(Arc::new(FixedLexical(vec!["1", "0", "3", "2"])));
    let ranked = retriever.retrieve("maintenance", RetrievalParams::uniform(10, 10)).await;
    let texts: Vec<&str> = ranked.iter().map(|r| r.text()).collect();
    let unique: HashSet<&str> = texts.iter().copied().collect();
    assert_eq!(texts.len(), unique.len());
    assert_eq!(texts.len(), 3);
    // The semantic copy of the duplicated text is the one kept.
    let dup = ranked.iter().find(|r| r.text() == "duplicated maintenance note").expect("dup kept");
    assert_eq!(dup.candidate.chunk.meta.filename, "a.txt");
}

#[tokio::test]
async fn output_is_sorted_by_relevance_and_truncated() {
    let retriever = HybridRetriever::new(small_store(), embedder(), Arc::new(LengthScorer))
        .with_vector(Arc::new(FixedVector::new(vec!["2", "4"])))
        .with_lexical(Arc::new(FixedLexical(vec!["3", "0"])));
    let ranked = retriever.retrieve("anything", RetrievalParams::uniform(10, 3)).await;
    assert_eq!(ranked.len(), 3);
    for pair in ranked.windows(2) {
        assert!(pair[0].relevance >= pair[1].relevance);
    }
    assert_eq!(ranked[0].text(), "a considerably longer passage about turbine blades");
    assert!(ranked.iter().all(|r| r.text() != "short"), "lowest score is cut by final_top_k");
}

#[tokio::test]
async fn failing_source_is_excluded_not_fatal() {
    let broken = FixedVector { fail: true, ..FixedVector::new(vec!["2"]) };
    let retriever = HybridRetriever::new(small_store(), embedder(), Arc::new(LengthScorer))
        .with_vector(Arc::new(broken))
        .with_lexical(Arc::new(FixedLexical(vec!["4"])));
    let ranked = retriever.retrieve("q", RetrievalParams::default()).await;
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].text(), "medium passage text");
}

#[tokio::test]
async fn slow_source_times_out_and_is_skipped() {
    let slow = FixedVector { delay: Some(Duration::from_secs(30)), ..FixedVector::new(vec!["2"]) };
    let timeouts = StageTimeouts { search: Duration::from_millis(50), ..StageTimeouts::default() };
    let retriever = HybridRetriever::new(small_store(), embedder(), Arc::new(LengthScorer))
        .with_vector(Arc::new(slow))
        .with_lexical(Arc::new(FixedLexical(vec!["3"])))
        .with_timeouts(timeouts);
    let ranked = retriever.retrieve("q", RetrievalParams::default()).await;
    let texts: Vec<&str> = ranked.iter().map(|r| r.text()).collect();
    assert_eq!(texts, vec!["a considerably longer passage about turbine blades"]);
}

#[tokio::test]
async fn scorer_failure_keeps_fused_order() {
    let retriever = HybridRetriever::new(small_store(), embedder(), Arc::new(FailingScorer))
        .with_vector(Arc::new(FixedVector::new(vec!["2", "4"])))
        .with_lexical(Arc::new(FixedLexical(vec!["3", "2"])));
    let ranked = retriever.retrieve("q", RetrievalParams::uniform(10, 10)).await;
    let texts: Vec<&str> = ranked.iter().map(|r| r.text()).collect();
    assert_eq!(texts, vec!["short", "medium passage text", "a considerably longer passage about turbine blades"]);
}

#[tokio::test]
async fn unknown_ids_are_skipped() {
    let retriever = HybridRetriever::new(small_store(), embedder(), Arc::new(LengthScorer))
        .with_lexical(Arc::new(FixedLexical(vec!["99", "2"])));
    let ranked = retriever.retrieve("q", RetrievalParams::default()).await;
    assert_eq!(ranked.len(), 1);
}

fn corpus() -> Vec<Chunk> {
    let rows = [
        ("Compressor wash removes salt deposits from compressor blades.", "wash.txt"),
        ("Fuel nozzles are inspected with a borescope during hot section inspection.", "nozzle.txt"),
        ("Borescope inspection of compressor blades detects erosion and nicks.", "borescope.txt"),
        ("Quarterly budget reviews are held with program managers.", "budget.txt"),
        ("Turbine blade erosion is tracked against the engine manual limits.", "limits.txt"),
    ];
    rows.iter().enumerate().map(|(i, (t, f))| Chunk { id: i.to_string(), text: t.to_string(), meta: meta(f) }).collect()
}

async fn real_aggregator(chunks: Vec<Chunk>, generator: Arc<dyn TextGenerator>) -> MultiQueryAggregator {
    let store = Arc::new(ChunkStore::new(chunks));
    let embedder = Arc::new(HashEmbedder::new(64));
    let lexical = TantivyLexicalIndex::build_in_ram(store.iter()).expect("lexical index");
    let vector = FlatVectorIndex::embed_store(&store, embedder.as_ref(), 8, |_| {}).await.expect("vector index");
    let retriever = HybridRetriever::new(store, embedder, Arc::new(OverlapScorer))
        .with_vector(Arc::new(vector))
        .with_lexical(Arc::new(lexical));
    let settings = RetrievalSettings { final_top_k: 3, max_concurrent_variants: 2, ..RetrievalSettings::default() };
    MultiQueryAggregator::new(QueryExpander::new(generator, expansion(1_000)), retriever, settings)
}

#[tokio::test]
async fn aggregator_output_is_stable_and_unique() {
    let script = "Expanded Queries: ['borescope blade inspection', 'compressor erosion', 'nozzle inspection']";
    let aggregator = real_aggregator(corpus(), Arc::new(ScriptedGenerator(script.into()))).await;
    let first = aggregator.retrieve_knowledge("compressor blades", 10).await;
    let second = aggregator.retrieve_knowledge("compressor blades", 10).await;
    assert_eq!(first, second);
    assert!(!first.is_empty());
    let unique: HashSet<&str> = first.iter().map(|r| r.chunk_text.as_str()).collect();
    assert_eq!(unique.len(), first.len());
    assert!(["wash.txt", "borescope.txt"].contains(&first[0].metadata.filename.as_str()));
}

#[tokio::test]
async fn empty_corpus_yields_empty_list() {
    let aggregator = real_aggregator(Vec::new(), Arc::new(FailingGenerator)).await;
    assert!(aggregator.retrieve_knowledge("anything", 10).await.is_empty());
}

#[tokio::test]
async fn cancelled_retrieval_leaves_aggregator_usable() {
    let slow = Arc::new(FixedVector { delay: Some(Duration::from_millis(300)), ..FixedVector::new(vec!["3"]) });
    let retriever = HybridRetriever::new(small_store(), embedder(), Arc::new(LengthScorer)).with_vector(slow.clone());
    let aggregator = MultiQueryAggregator::new(QueryExpander::new(Arc::new(FailingGenerator), expansion(1_000)), retriever, RetrievalSettings::default());

    let cancelled = tokio::time::timeout(Duration::from_millis(20), aggregator.retrieve_knowledge("q", 5)).await;
    assert!(cancelled.is_err());

    let done = aggregator.retrieve_knowledge("q", 5).await;
    assert_eq!(done.len(), 1);
    assert!(slow.calls.load(Ordering::SeqCst) >= 2);
}

#[test]
fn merge_keeps_first_variant_copy() {
    use citerag_core::types::{Candidate, RankedCandidate, SourceKind};
    let rc = |text: &str, file: &str| RankedCandidate {
        candidate: Candidate { chunk: Chunk { id: file.into(), text: text.into(), meta: meta(file) }, score: 0.0, source: SourceKind::Lexical },
        relevance: 1.0,
    };
    let merged = merge_variants(vec![vec![rc("x", "first.txt"), rc("y", "y.txt")], vec![rc("x", "second.txt"), rc("z", "z.txt")]]);
    let got: Vec<(&str, &str)> = merged.iter().map(|r| (r.chunk_text.as_str(), r.metadata.filename.as_str())).collect();
    assert_eq!(got, vec![("x", "first.txt"), ("y", "y.txt"), ("z", "z.txt")]);
}
