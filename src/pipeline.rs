//! Batch pipeline: stories in, report out.
//!
//! # Flow
//!
//! ```text
//!  RawStory ──▶ Structurer ──▶ parse ──▶ Miner ──▶ Counter     (per story,
//!     │                                                      blocking pool)
//!     └──────────────── ordered merge by story number ────────────────┐
//!                                                                     ▼
//!                  MatrixBuilder ──▶ Constructor ──▶ Report (graphs, Prolog)
//! ```
//!
//! A story that cannot be structured or parsed, or whose mining panics,
//! becomes a [`StoryFailure`]; the rest of the batch is unaffected.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{NarratorError, Result};
use crate::matrix::{MatrixBuilder, TermMatrix, TermSummary};
use crate::ontology::{to_prolog, Constructor, Ontology, OntologyGraph, OntologySet};
use crate::parser::{Dep, LanguageParser, Pos, SharedParser, Token};
use crate::stats::{CorpusStatistics, Counter, StoryFailure};
use crate::story::{MinedStory, Miner, RawStory, StoryExport, Structurer};

// ============================================================================
// Report
// ============================================================================

/// Wall-clock time per stage, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub mining_ms: u64,
    pub matrix_ms: u64,
    pub ontology_ms: u64,
    pub total_ms: u64,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub system_name: String,
    /// Successfully mined stories, ordered by number.
    pub stories: Vec<StoryExport>,
    pub failures: Vec<StoryFailure>,
    pub statistics: CorpusStatistics,
    pub matrix: Vec<TermSummary>,
    pub ontology: Ontology,
    pub graph: OntologyGraph,
    /// Keyed by functional-role lemma; empty unless per-role output is on.
    pub per_role: BTreeMap<String, OntologyGraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prolog: Option<String>,
    pub timings: Timings,
    /// Full mining results, kept for printing.
    #[serde(skip)]
    pub mined: Vec<MinedStory>,
    #[serde(skip)]
    pub per_role_ontologies: BTreeMap<String, Ontology>,
}

impl Report {
    /// Number of classes in the global ontology.
    pub fn class_count(&self) -> usize {
        self.ontology.class_count()
    }
}

// ============================================================================
// Story Worker
// ============================================================================

/// The per-story half of the pipeline, shared by all batches.
struct StoryWorker {
    parser: SharedParser,
    structurer: Structurer,
    miner: Miner,
    counter: Counter,
    system: Token,
}

impl StoryWorker {
    fn process(&self, raw: RawStory) -> std::result::Result<MinedStory, StoryFailure> {
        let failure = |raw: &RawStory, reason: String| StoryFailure {
            number: raw.number,
            text: raw.text.clone(),
            reason,
        };

        let structured = match self.structurer.structure(&raw) {
            Ok(structured) => structured,
            Err(e) => {
                tracing::warn!(story = raw.number, error = %e, "Skipping story");
                return Err(failure(&raw, e.to_string()));
            }
        };

        let doc = match self.parser.parse(&raw.sentence) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(story = raw.number, parser = self.parser.name(), error = %e, "Parse failed");
                return Err(failure(&raw, e.to_string()));
            }
        };

        let mut mined = self.miner.mine(structured, &doc, self.system.clone());
        mined.stats = self.counter.count(&mined);
        tracing::debug!(
            story = mined.number,
            role = mined.role_lemma().unwrap_or("-"),
            main_verb = mined.means.main_verb.lemma().unwrap_or("-"),
            main_object = mined.means.main_object.lemma().unwrap_or("-"),
            "Mined story"
        );
        Ok(mined)
    }

    /// Process a batch; a panic while mining one story fails only that story.
    fn process_batch(
        &self,
        batch: Vec<RawStory>,
    ) -> Vec<std::result::Result<MinedStory, StoryFailure>> {
        batch
            .into_iter()
            .map(|raw| {
                let (number, text) = (raw.number, raw.text.clone());
                panic::catch_unwind(AssertUnwindSafe(|| self.process(raw))).unwrap_or_else(
                    |payload| {
                        let reason = format!("mining panicked: {}", panic_message(&*payload));
                        tracing::error!(story = number, %reason, "Story aborted");
                        Err(StoryFailure {
                            number,
                            text,
                            reason,
                        })
                    },
                )
            })
            .collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Parse the system name into a token, or synthesize a noun for it.
fn system_token(parser: &SharedParser, name: &str) -> Token {
    let parsed = panic::catch_unwind(AssertUnwindSafe(|| parser.parse(name)))
        .ok()
        .and_then(|parsed| parsed.ok())
        .and_then(|doc| doc.tokens.into_iter().next());
    parsed.unwrap_or_else(|| Token {
        i: 0,
        idx: 0,
        text: name.to_string(),
        lemma: name.to_lowercase(),
        pos: Pos::Noun,
        dep: Dep::Root,
        head: 0,
    })
}

/// Split `items` into at most `n` contiguous batches of near-equal size.
fn into_batches<T>(items: Vec<T>, n: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let size = items.len().div_ceil(n.max(1));
    let mut batches = Vec::with_capacity(n);
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

// ============================================================================
// Narrator
// ============================================================================

/// Runs the full mining and generation pipeline over a corpus.
pub struct Narrator {
    config: Config,
    parser: SharedParser,
}

impl Narrator {
    pub fn new(config: Config, parser: Arc<dyn LanguageParser>) -> Self {
        Self {
            config,
            parser: SharedParser::new(parser),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Structure and mine every story, then build the matrix and ontologies.
    pub async fn run(&self, stories: Vec<RawStory>) -> Result<Report> {
        let start_time = Instant::now();
        let total = stories.len();
        tracing::info!(
            stories = total,
            parser = self.parser.name(),
            workers = self.config.pipeline.workers,
            "Starting run"
        );

        let worker = Arc::new(StoryWorker {
            parser: self.parser.clone(),
            structurer: Structurer::new(),
            miner: Miner::new(),
            counter: Counter::new(),
            system: system_token(&self.parser, &self.config.system_name),
        });

        let handles = into_batches(stories, self.config.pipeline.workers)
            .into_iter()
            .map(|batch| {
                let worker = Arc::clone(&worker);
                tokio::task::spawn_blocking(move || worker.process_batch(batch))
            });

        let mut mined = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for joined in join_all(handles).await {
            let outcomes =
                joined.map_err(|e| NarratorError::Pipeline(format!("Task join error: {}", e)))?;
            for outcome in outcomes {
                match outcome {
                    Ok(story) => mined.push(story),
                    Err(failure) => failures.push(failure),
                }
            }
        }
        mined.sort_by_key(|s| s.number);
        failures.sort_by_key(|f| f.number);
        let mining_ms = start_time.elapsed().as_millis() as u64;

        let mut statistics = CorpusStatistics::new();
        for story in &mined {
            statistics.record(&story.stats);
        }
        for _ in &failures {
            statistics.record_failure();
        }

        let matrix_start = Instant::now();
        let matrix = self.build_matrix(&mined);
        let matrix_ms = matrix_start.elapsed().as_millis() as u64;

        let ontology_start = Instant::now();
        let set = self.construct(&mined, &matrix);
        let ontology_ms = ontology_start.elapsed().as_millis() as u64;

        let prolog = self.config.output.prolog.then(|| to_prolog(&set.global));

        let report = Report {
            generated_at: Utc::now(),
            system_name: self.config.system_name.clone(),
            stories: mined.iter().map(MinedStory::to_json).collect(),
            failures,
            statistics,
            matrix: matrix.summary(),
            graph: set.global.to_graph(),
            per_role: set
                .per_role
                .iter()
                .map(|(role, ontology)| (role.clone(), ontology.to_graph()))
                .collect(),
            ontology: set.global,
            prolog,
            timings: Timings {
                mining_ms,
                matrix_ms,
                ontology_ms,
                total_ms: start_time.elapsed().as_millis() as u64,
            },
            mined,
            per_role_ontologies: set.per_role,
        };

        tracing::info!(
            succeeded = report.statistics.succeeded,
            failed = report.statistics.failed,
            classes = report.class_count(),
            relationships = report.ontology.relationships().len(),
            duration_ms = report.timings.total_ms,
            "Run complete"
        );
        Ok(report)
    }

    fn build_matrix(&self, mined: &[MinedStory]) -> TermMatrix {
        let generation = &self.config.generation;
        MatrixBuilder::new(generation.base_weight, generation.weights, self.parser.clone())
            .with_role_similarity(generation.role_similarity)
            .build(mined)
    }

    fn construct(&self, mined: &[MinedStory], matrix: &TermMatrix) -> OntologySet {
        Constructor::new(self.config.generation.cutoff())
            .with_link(self.config.output.link)
            .construct_all(mined, matrix, self.config.output.per_role)
    }
}

impl std::fmt::Debug for Narrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Narrator")
            .field("system_name", &self.config.system_name)
            .field("parser", &self.parser)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::parse_stories;
    use crate::ontology::Relationship;
    use crate::parser::{ParsedDoc, RuleParser};

    /// Delegates to the rule parser but panics on sentences mentioning "crash".
    struct FragileParser(RuleParser);

    impl LanguageParser for FragileParser {
        fn name(&self) -> &str {
            "fragile"
        }

        fn parse(&self, text: &str) -> Result<ParsedDoc> {
            if text.contains("crash") {
                panic!("cannot parse {text}");
            }
            self.0.parse(text)
        }
    }

    fn narrator(config: Config) -> Narrator {
        Narrator::new(config, Arc::new(RuleParser::new()))
    }

    #[test]
    fn test_into_batches() {
        let batches = into_batches((1..=10).collect::<Vec<_>>(), 4);
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[0], vec![1, 2, 3]);
        assert_eq!(batches.concat(), (1..=10).collect::<Vec<_>>());

        assert!(into_batches(Vec::<u8>::new(), 4).is_empty());
        assert_eq!(into_batches(vec![1, 2], 8).len(), 2);
    }

    #[test]
    fn test_system_token() {
        let parser = SharedParser::new(Arc::new(RuleParser::new()));
        let token = system_token(&parser, "Webshop");
        assert_eq!(token.text, "Webshop");
        assert_eq!(token.i, 0);
    }

    #[tokio::test]
    async fn test_run_single_story() {
        let stories = parse_stories("As a user, I want to search for products so that I can buy them");
        let report = narrator(Config::default()).run(stories).await.unwrap();

        assert_eq!(report.statistics.succeeded, 1);
        assert!(report.failures.is_empty());
        assert!(report.ontology.has_class("user"));
        assert!(report.ontology.has_class("product"));
        assert!(report
            .ontology
            .relationships()
            .contains(&Relationship::new("user", "search", "product")));
        assert!(report.prolog.is_none());
        assert!(report.per_role.is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let stories = parse_stories(
            "I want to delete everything\nAs an admin, I want to delete an account\nAs a",
        );
        let report = narrator(Config::default()).run(stories).await.unwrap();

        assert_eq!(report.statistics.total, 3);
        assert_eq!(report.statistics.succeeded, 1);
        assert_eq!(report.statistics.failed, 2);
        let failed: Vec<usize> = report.failures.iter().map(|f| f.number).collect();
        assert_eq!(failed, vec![1, 3]);
        assert_eq!(report.stories[0].number, 2);
    }

    #[tokio::test]
    async fn test_results_are_ordered_and_independent_of_workers() {
        let corpus = "As a user, I want to search for products\n\
                      As an admin, I want to delete an account\n\
                      As a user, I want to cancel orders\n\
                      As a manager, I want to export sales reports\n\
                      As a visitor, I want to register an account";

        let mut single = Config::default();
        single.pipeline.workers = 1;
        let mut many = Config::default();
        many.pipeline.workers = 3;

        let a = narrator(single).run(parse_stories(corpus)).await.unwrap();
        let b = narrator(many).run(parse_stories(corpus)).await.unwrap();

        let numbers: Vec<usize> = b.stories.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(a.stories, b.stories);
        assert_eq!(a.matrix, b.matrix);
        assert_eq!(a.ontology, b.ontology);
    }

    #[tokio::test]
    async fn test_output_options() {
        let mut config = Config::default();
        config.output.prolog = true;
        config.output.per_role = true;
        config.output.link = true;

        let stories = parse_stories(
            "As a user, I want to search for products\nAs an admin, I want to delete an account",
        );
        let report = narrator(config).run(stories).await.unwrap();

        let prolog = report.prolog.as_deref().unwrap();
        assert!(prolog.contains("class('product')."));
        assert!(prolog.contains("occurs_in('product', 'US1')."));
        assert_eq!(report.per_role.len(), 2);
        assert!(report.per_role.contains_key("admin"));
        assert!(report.ontology.has_class("US2"));
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let report = narrator(Config::default()).run(Vec::new()).await.unwrap();
        assert!(report.ontology.is_empty());
        assert!(report.graph.nodes.is_empty());
        assert_eq!(report.statistics.total, 0);
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let stories = parse_stories("As a user, I want to cancel orders");
        let report = narrator(Config::default()).run(stories).await.unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["system_name"], "System");
        assert_eq!(json["stories"][0]["means"]["indicator"], "I want to");
        assert!(json.get("mined").is_none());
        assert!(json.get("prolog").is_none());
    }

    #[tokio::test]
    async fn test_panicking_story_fails_alone() {
        let stories = parse_stories(
            "As a user, I want to cancel orders
             As a user, I want to crash the server
             As an admin, I want to delete an account",
        );
        for workers in [1, 3] {
            let mut config = Config::default();
            config.pipeline.workers = workers;
            let report = Narrator::new(config, Arc::new(FragileParser(RuleParser::new())))
                .run(stories.clone())
                .await
                .unwrap();

            assert_eq!(report.statistics.succeeded, 2);
            assert_eq!(report.statistics.failed, 1);
            let failure = &report.failures[0];
            assert_eq!(failure.number, 2);
            assert!(failure.reason.starts_with("mining panicked: cannot parse"));
            assert!(report.ontology.has_class("order"));
            assert!(report.ontology.has_class("account"));
        }
    }

    #[tokio::test]
    async fn test_non_ascii_and_malformed_stories() {
        let stories = parse_stories(
            "As a user I want to 耀ed the reports
             As a café owner, I want to list crème brûlée
             As a ☃☃☃ I want to
             — ünïcödé without any indicator —",
        );
        let report = narrator(Config::default()).run(stories).await.unwrap();

        assert_eq!(report.statistics.total, 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].number, 4);
        assert!(report.stories.iter().any(|s| s.number == 2));
        assert!(report.ontology.has_class("owner"));
    }
}
