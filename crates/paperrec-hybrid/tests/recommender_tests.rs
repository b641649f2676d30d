use std::sync::Arc;

use anyhow::anyhow;
use paperrec_core::config::{LexicalConfig, RecommenderConfig};
use paperrec_core::error::Error;
use paperrec_core::traits::{Embedder, QueryClarifier, ResultSink, Summarizer};
use paperrec_core::types::{BackendMode, Document, RankedResult, Tier};
use paperrec_embed::HashingEmbedder;
use paperrec_hybrid::explain::{DENSE_ONLY_LABEL, NO_OVERLAP_LABEL};
use paperrec_hybrid::eval;
use paperrec_hybrid::sink::CSV_COLUMNS;
use paperrec_hybrid::{CsvSink, JsonlSink, LeadSummarizer, PrefitState, Recommender};
use paperrec_text::snapshot;

const KEYWORDS: [&str; 4] = ["cancer", "robot", "graph", "speech"];

/// One axis per keyword present in the text.
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn id(&self) -> &str { "keywords" }
    fn dim(&self) -> usize { KEYWORDS.len() }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let t = t.to_lowercase();
                KEYWORDS.iter().map(|k| if t.contains(k) { 1.0 } else { 0.0 }).collect()
            })
            .collect())
    }
}

/// Embeds the corpus but fails on any text mentioning "boom".
struct Fragile;

impl Embedder for Fragile {
    fn id(&self) -> &str { "fragile" }
    fn dim(&self) -> usize { 8 }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains("boom")) {
            return Err(anyhow!("provider crashed"));
        }
        HashingEmbedder::new(8).embed_batch(texts)
    }
}

struct Failing;

impl Summarizer for Failing {
    fn summarize(&self, _text: &str) -> anyhow::Result<String> {
        Err(anyhow!("summarizer offline"))
    }
}

struct Fixed(&'static str);

impl QueryClarifier for Fixed {
    fn clarify(&self, _raw: &str) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

struct Unreachable;

impl QueryClarifier for Unreachable {
    fn clarify(&self, _raw: &str) -> anyhow::Result<String> {
        Err(anyhow!("translation service unreachable"))
    }
}

fn two_docs() -> Vec<Document> {
    vec![
        Document::new("deep learning for cancer imaging", "a CNN model for tumor detection"),
        Document::new("robot control survey", "overview of autonomous navigation"),
    ]
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new("Cancer imaging", "Tumor detection in medical scans").with_url("https://example.org/0"),
        Document::new("Robot control", "Autonomous navigation of mobile platforms"),
        Document::new("Robot surgery for cancer", "Assisted procedures in oncology"),
        Document::new("Robot swarms", "Graph based coordination of many agents"),
        Document::new("Speech recognition", "Acoustic models for spoken language"),
        Document::new("", ""),
    ]
}

fn config(mode: BackendMode) -> RecommenderConfig {
    RecommenderConfig { mode, ..RecommenderConfig::default() }
}

fn fitted(mode: BackendMode, alpha: f32, embedder: Option<Arc<dyn Embedder>>) -> Recommender {
    let config = RecommenderConfig { hybrid_alpha: alpha, ..config(mode) };
    let mut rec = Recommender::new(config, corpus(), embedder).expect("new");
    rec.fit().expect("fit");
    rec
}

fn hashing() -> Option<Arc<dyn Embedder>> {
    Some(Arc::new(HashingEmbedder::new(64)))
}

fn ranking(results: &[RankedResult<'_>]) -> Vec<(usize, f32, Tier)> {
    results.iter().map(|r| (r.doc_id, r.score, r.tier)).collect()
}

#[test]
fn two_document_scenario_returns_the_matching_paper_as_high() {
    let mut rec = Recommender::new(config(BackendMode::Lexical), two_docs(), None).unwrap();
    rec.fit().unwrap();
    let query = "cancer imaging deep learning";

    let top = rec.recommend(query, 1).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].rank, 1);
    assert_eq!(top[0].doc_id, 0);
    assert_eq!(top[0].tier, Tier::High);

    let both = rec.recommend(query, 2).unwrap();
    assert!(both[0].score > both[1].score);
    assert_eq!(both[1].doc_id, 1);
}

#[test]
fn results_are_bounded_sorted_and_in_range() {
    for mode in [BackendMode::Lexical, BackendMode::Dense, BackendMode::Hybrid] {
        let rec = fitted(mode, 0.5, hashing());
        for k in [0, 1, 3, 6, 50] {
            let results = rec.recommend("robot navigation for cancer", k).unwrap();
            assert!(results.len() <= k && results.len() <= 6, "mode={mode} k={k}");
            for (i, r) in results.iter().enumerate() {
                assert_eq!(r.rank, i + 1);
                assert!((0.0..=1.0).contains(&r.score));
                assert!(std::ptr::eq(r.document, &rec.corpus()[r.doc_id]));
            }
            for w in results.windows(2) {
                assert!(w[0].score >= w[1].score);
                if w[0].score == w[1].score {
                    assert!(w[0].doc_id < w[1].doc_id);
                }
            }
        }
    }
}

#[test]
fn all_empty_document_scores_zero_lexically() {
    let rec = fitted(BackendMode::Lexical, 0.5, None);
    for q in ["cancer", "robot swarms", "x"] {
        let all = rec.recommend(q, 10).unwrap();
        let empty = all.iter().find(|r| r.doc_id == 5).expect("every document is ranked");
        assert_eq!(empty.score, 0.0);
    }
}

#[test]
fn tiers_depend_on_the_query() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder);
    let rec = fitted(BackendMode::Dense, 0.5, Some(embedder));

    let tier_of = |query: &str, doc: usize| {
        rec.recommend(query, 10).unwrap().into_iter().find(|r| r.doc_id == doc).map(|r| r.tier)
    };
    assert_eq!(tier_of("cancer", 0), Some(Tier::High));
    assert_eq!(tier_of("robot", 0), Some(Tier::Low));
}

#[test]
fn recommend_is_idempotent() {
    for mode in [BackendMode::Lexical, BackendMode::Hybrid] {
        let rec = fitted(mode, 0.5, hashing()).with_summarizer(Box::new(LeadSummarizer::default()));
        let a = rec.recommend("graph coordination", 4).unwrap();
        let b = rec.recommend("graph coordination", 4).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn alpha_one_is_lexical_and_alpha_zero_is_dense() {
    let query = "robot surgery";
    let lexical = fitted(BackendMode::Lexical, 0.5, None);
    let dense = fitted(BackendMode::Dense, 0.5, hashing());
    let at_one = fitted(BackendMode::Hybrid, 1.0, hashing());
    let at_zero = fitted(BackendMode::Hybrid, 0.0, hashing());

    assert_eq!(ranking(&at_one.recommend(query, 6).unwrap()), ranking(&lexical.recommend(query, 6).unwrap()));
    assert_eq!(ranking(&at_zero.recommend(query, 6).unwrap()), ranking(&dense.recommend(query, 6).unwrap()));
}

#[test]
fn explanations_only_cite_shared_ngrams() {
    let rec = fitted(BackendMode::Hybrid, 0.5, hashing());
    let query = "robot surgery for oncology";
    for r in rec.recommend(query, 6).unwrap() {
        let doc_text = format!("{} {}", r.document.title, r.document.description).to_lowercase();
        assert!(r.shared_terms.len() <= 3);
        for term in &r.shared_terms {
            assert!(query.contains(term.as_str()), "{term:?} not in query");
            assert!(doc_text.contains(term.as_str()), "{term:?} not in doc {}", r.doc_id);
        }
        assert!(r.explanation.contains(query));
        if r.shared_terms.is_empty() {
            assert!(r.explanation.contains(NO_OVERLAP_LABEL));
        }
    }
}

#[test]
fn dense_only_explanations_use_the_semantic_label() {
    let rec = fitted(BackendMode::Dense, 0.5, hashing());
    for r in rec.recommend("cancer imaging", 3).unwrap() {
        assert!(r.shared_terms.is_empty());
        assert!(r.explanation.contains(DENSE_ONLY_LABEL));
    }
}

#[test]
fn empty_query_fails_in_every_mode() {
    for mode in [BackendMode::Lexical, BackendMode::Dense, BackendMode::Hybrid] {
        let rec = fitted(mode, 0.5, hashing());
        assert!(matches!(rec.recommend("", 3), Err(Error::EmptyQuery)), "mode={mode}");
        assert!(matches!(rec.recommend("  \t\n", 3), Err(Error::EmptyQuery)), "mode={mode}");
    }
}

#[test]
fn empty_corpus_returns_nothing() {
    for mode in [BackendMode::Lexical, BackendMode::Dense, BackendMode::Hybrid] {
        let mut rec = Recommender::new(config(mode), Vec::new(), hashing()).unwrap();
        rec.fit().unwrap();
        assert!(rec.recommend("anything at all", 5).unwrap().is_empty());
    }
}

#[test]
fn lifecycle_and_configuration_errors() {
    let rec = Recommender::new(config(BackendMode::Lexical), corpus(), None).unwrap();
    assert!(!rec.is_fitted());
    assert!(matches!(rec.recommend("cancer", 3), Err(Error::NotFitted(_))));

    for mode in [BackendMode::Dense, BackendMode::Hybrid] {
        let mut rec = Recommender::new(config(mode), corpus(), None).unwrap();
        assert!(matches!(rec.fit(), Err(Error::InvalidConfig(_))), "mode={mode}");
        assert!(!rec.is_fitted());
    }

    let bad_alpha = RecommenderConfig { hybrid_alpha: 1.5, ..config(BackendMode::Hybrid) };
    assert!(matches!(Recommender::new(bad_alpha, corpus(), hashing()), Err(Error::InvalidConfig(_))));
    let bad_ngrams = RecommenderConfig {
        lexical: LexicalConfig { ngram_min: 5, ngram_max: 2, ..LexicalConfig::default() },
        ..config(BackendMode::Lexical)
    };
    assert!(matches!(Recommender::new(bad_ngrams, corpus(), None), Err(Error::InvalidConfig(_))));
}

#[test]
fn provider_failure_surfaces_as_encoding_error() {
    let embedder: Arc<dyn Embedder> = Arc::new(Fragile);
    let rec = fitted(BackendMode::Hybrid, 0.5, Some(embedder));
    assert!(rec.recommend("robot", 2).is_ok());
    assert!(matches!(rec.recommend("boom", 2), Err(Error::Encoding(_))));
}

#[test]
fn summarizer_failure_falls_back_to_description_head() {
    let long = "word ".repeat(60);
    let corpus = vec![Document::new("Cancer study", long.clone())];
    let mut rec = Recommender::new(config(BackendMode::Lexical), corpus, None).unwrap().with_summarizer(Box::new(Failing));
    rec.fit().unwrap();
    let r = rec.recommend("cancer", 1).unwrap();
    let head: String = long.chars().take(150).collect();
    assert!(r[0].explanation.contains(&format!("{}...", head)));
}

#[test]
fn clarifier_rewrites_or_falls_back() {
    let rec = fitted(BackendMode::Lexical, 0.5, None);
    assert_eq!(
        rec.recommend_clarified(&Fixed("speech recognition"), "음성 인식", 3).unwrap(),
        rec.recommend("speech recognition", 3).unwrap()
    );
    assert_eq!(
        rec.recommend_clarified(&Unreachable, "robot swarms", 3).unwrap(),
        rec.recommend("robot swarms", 3).unwrap()
    );
    assert_eq!(
        rec.recommend_clarified(&Fixed("  "), "robot swarms", 3).unwrap(),
        rec.recommend("robot swarms", 3).unwrap()
    );
}

#[test]
fn prefit_state_reproduces_a_fresh_fit() {
    let fresh = fitted(BackendMode::Hybrid, 0.5, hashing());
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("lexical.json");
    snapshot::save(&path, fresh.lexical_state().unwrap()).unwrap();
    let prefit = PrefitState {
        lexical: snapshot::load(&path).unwrap(),
        dense: fresh.dense_matrix().cloned(),
    };
    let restored = Recommender::from_prefit(config(BackendMode::Hybrid), corpus(), hashing(), prefit).unwrap();
    assert!(restored.is_fitted());
    for q in ["cancer", "robot swarms", "spoken language models"] {
        assert_eq!(fresh.recommend(q, 6).unwrap(), restored.recommend(q, 6).unwrap(), "q={q}");
    }

    // missing parts are fitted on the spot
    let partial = Recommender::from_prefit(config(BackendMode::Hybrid), corpus(), hashing(), PrefitState::default()).unwrap();
    assert_eq!(fresh.recommend("cancer", 6).unwrap(), partial.recommend("cancer", 6).unwrap());
}

#[test]
fn prefit_state_must_match_corpus_and_settings() {
    let fresh = fitted(BackendMode::Lexical, 0.5, None);
    let state = fresh.lexical_state().cloned();

    let shorter = corpus().into_iter().take(2).collect();
    let prefit = PrefitState { lexical: state.clone(), dense: None };
    assert!(matches!(
        Recommender::from_prefit(config(BackendMode::Lexical), shorter, None, prefit),
        Err(Error::DimensionMismatch { expected: 2, actual: 6 })
    ));

    let other = RecommenderConfig {
        lexical: LexicalConfig { ngram_max: 3, ..LexicalConfig::default() },
        ..config(BackendMode::Lexical)
    };
    let prefit = PrefitState { lexical: state, dense: None };
    assert!(matches!(Recommender::from_prefit(other, corpus(), None, prefit), Err(Error::InvalidConfig(_))));
}

#[test]
fn snapshot_of_edited_corpus_is_rejected() {
    let fresh = fitted(BackendMode::Lexical, 0.5, None);
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("lexical.json");
    snapshot::save(&path, fresh.lexical_state().unwrap()).unwrap();

    let mut edited = corpus();
    edited[0] = Document::new("Speech synthesis", "Neural vocoders for spoken audio");
    let prefit = PrefitState { lexical: snapshot::load(&path).unwrap(), dense: None };
    assert!(matches!(
        Recommender::from_prefit(config(BackendMode::Lexical), edited.clone(), None, prefit),
        Err(Error::InvalidConfig(_))
    ));

    // swapping two documents changes the fingerprint as well
    let mut reordered = corpus();
    reordered.swap(1, 2);
    let prefit = PrefitState { lexical: fresh.lexical_state().cloned(), dense: None };
    assert!(Recommender::from_prefit(config(BackendMode::Lexical), reordered, None, prefit).is_err());

    // refitting on the edited text ranks the new document by its own words
    let refit = Recommender::from_prefit(config(BackendMode::Lexical), edited, None, PrefitState::default()).unwrap();
    let top = &refit.recommend("speech synthesis", 1).unwrap()[0];
    assert_eq!(top.doc_id, 0);
    assert_eq!(top.document.title, "Speech synthesis");
}

#[test]
fn fitted_recommender_is_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Recommender>();

    let rec = Arc::new(fitted(BackendMode::Hybrid, 0.5, hashing()));
    let expected = rec.recommend("graph", 3).unwrap().iter().map(|r| r.doc_id).collect::<Vec<_>>();
    std::thread::scope(|s| {
        for _ in 0..4 {
            let rec = Arc::clone(&rec);
            let expected = expected.clone();
            s.spawn(move || {
                let got: Vec<usize> = rec.recommend("graph", 3).unwrap().iter().map(|r| r.doc_id).collect();
                assert_eq!(got, expected);
            });
        }
    });
}

#[test]
fn jsonl_sink_writes_one_line_per_result() {
    let rec = fitted(BackendMode::Lexical, 0.5, None);
    let results = rec.recommend("cancer imaging", 3).unwrap();
    let mut sink = JsonlSink::new(Vec::new());
    sink.persist(&results).unwrap();
    let out = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<serde_json::Value> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), results.len());
    assert_eq!(lines[0]["rank"], 1);
    assert_eq!(lines[0]["document"]["title"], results[0].document.title.as_str());
    assert_eq!(lines[0]["tier"], results[0].tier.to_string());
    assert_eq!(lines[0]["document"]["url"], "https://example.org/0");
}

#[test]
fn csv_sink_writes_a_header_then_one_row_per_result() {
    let rec = fitted(BackendMode::Lexical, 0.5, None);
    let results = rec.recommend("cancer imaging", 3).unwrap();
    let mut sink = CsvSink::new(Vec::new());
    sink.persist(&results).unwrap();
    sink.persist(&results[..1]).unwrap();
    let out = sink.into_inner().unwrap();

    let mut reader = csv::Reader::from_reader(out.as_slice());
    assert_eq!(reader.headers().unwrap().iter().collect::<Vec<_>>(), CSV_COLUMNS);
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), results.len() + 1, "header is written once");
    assert_eq!(&rows[0][0], "1");
    assert_eq!(&rows[0][2], results[0].document.title.as_str());
    assert_eq!(&rows[0][4], "https://example.org/0");
    assert_eq!(&rows[0][5], format!("{:.4}", results[0].score).as_str());
    assert_eq!(&rows[0][6], results[0].tier.to_string().as_str());
    assert_eq!(&rows[0][7], results[0].shared_terms.join("; ").as_str());
    assert_eq!(&rows[0][8], results[0].explanation.as_str());
}

#[test]
fn csv_export_file_starts_with_a_byte_order_mark() {
    let rec = fitted(BackendMode::Lexical, 0.5, None);
    let results = rec.recommend("robot", 2).unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("outputs/recommendations.csv");
    CsvSink::create(&path).unwrap().persist(&results).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with("\u{feff}rank,doc_id,".as_bytes()));
}

#[test]
fn evaluation_reads_csv_files_and_averages_per_query() {
    let rec = fitted(BackendMode::Lexical, 0.5, None);
    let tmp = tempfile::tempdir().unwrap();
    let queries_path = tmp.path().join("queries.csv");
    let qrels_path = tmp.path().join("qrels.csv");
    std::fs::write(&queries_path, "id,title,desc\nq1,cancer imaging,tumor detection\nq2,robot swarms,\nq3,,\n").unwrap();
    std::fs::write(&qrels_path, "id,doc_id,rel\nq1,0,1\nq2,Robot swarms,1\nq2,example.org/nothing,1\nq2,4,0\n").unwrap();

    let queries = eval::load_queries(&queries_path).unwrap();
    assert_eq!(queries[0].text, "cancer imaging tumor detection");
    assert_eq!(queries[1].text, "robot swarms");
    let qrels = eval::load_qrels(&qrels_path).unwrap();
    assert_eq!(qrels.len(), 3, "zero-gain judgements are dropped");

    let report = eval::evaluate(&rec, &queries, &qrels, 10).unwrap();
    assert_eq!(report.per_query.len(), 2, "blank query skipped");
    let q1 = &report.per_query[0];
    assert_eq!((q1.mrr, q1.recall, q1.ndcg), (1.0, 1.0, 1.0));
    let q2 = &report.per_query[1];
    assert_eq!(q2.mrr, 1.0, "title match counts as relevant");
    assert_eq!(q2.recall, 0.5, "one of two judged documents is in the corpus");
    assert!((report.mean_mrr - 1.0).abs() < 1e-12);
    assert!((report.mean_recall - 0.75).abs() < 1e-12);
}
