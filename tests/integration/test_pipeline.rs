//! End-to-end pipeline tests.

use std::sync::Arc;

use narrator::config::Config;
use narrator::corpus::{parse_stories, read_stories};
use narrator::parser::{PreparsedParser, RuleParser};
use narrator::pipeline::{Narrator, Report};
use narrator::story::{RawStory, StoryExport, Structurer};
use narrator::StructuringError;

async fn run(config: Config, corpus: &str) -> Report {
    Narrator::new(config, Arc::new(RuleParser::new()))
        .run(parse_stories(corpus))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_search_scenario() {
    let report = run(
        Config::default(),
        "As a user, I want to search for products, so that I can buy them.",
    )
    .await;

    let story = &report.mined[0];
    assert_eq!(story.role_lemma(), Some("user"));
    assert_eq!(story.means.main_verb.lemma(), Some("search"));
    assert_eq!(
        story.means.main_object.main.as_ref().map(|t| t.text.as_str()),
        Some("products")
    );
    assert!(story.has_ends());
    assert!(!story.ends.as_ref().unwrap().segment.simplified.is_empty());
}

#[tokio::test]
async fn test_story_without_ends() {
    let report = run(Config::default(), "As an admin I want to delete an account.").await;

    assert!(report.failures.is_empty());
    let story = &report.mined[0];
    assert!(!story.has_ends());
    assert!(story.ends.is_none());
    assert_eq!(story.means.main_verb.lemma(), Some("delete"));
    assert_eq!(story.means.main_object.lemma(), Some("account"));
    assert!(report.stories[0].ends.is_none());
}

#[tokio::test]
async fn test_missing_role_is_recorded() {
    let report = run(
        Config::default(),
        "I want to log in.\nAs a user, I want to cancel orders",
    )
    .await;

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.number, 1);
    assert_eq!(failure.text, "I want to log in.");
    assert_eq!(
        failure.reason,
        StructuringError::MissingRoleIndicator.to_string()
    );

    // Only the second story reaches the matrix and ontology.
    assert!(report.matrix.iter().all(|t| t.term != "log"));
    assert!(report.ontology.classes().all(|c| c.stories.iter().all(|&n| n == 2)));
    assert_eq!(report.statistics.failed, 1);
    assert_eq!(report.statistics.succeeded, 1);
}

#[test]
fn test_has_ends_iff_goal_indicator() {
    let structurer = Structurer::new();
    let cases = [
        ("As a user, I want to export reports so that I can share them", true),
        ("As a user, I want to export reports in order to share them", true),
        ("As a user, I want to export reports", false),
        ("As a visitor, I can browse the catalog", false),
        ("As a manager I can view reports so that I am able to plan budgets", true),
        ("As a user I can upload photos so that I want to share them", true),
        ("As a café owner, I want to list crème brûlée so that guests order it", true),
    ];
    for (text, has_ends) in cases {
        let story = structurer.structure(&RawStory::new(1, text)).unwrap();
        assert_eq!(story.has_ends(), has_ends, "{text}");
    }
}

#[test]
fn test_means_indicator_is_the_earliest_phrase() {
    let structurer = Structurer::new();
    let story = structurer
        .structure(&RawStory::new(1, "As a user I can upload photos so that I want to share them"))
        .unwrap();

    assert_eq!(story.means.indicator, "I can");
    assert_eq!(story.means.simplified, "upload photos");
    let ends = story.ends.unwrap();
    assert_eq!(ends.indicator, "so that");
    assert!(ends.text.contains("I want to share them"));
}

#[tokio::test]
async fn test_unusual_text_degrades_per_story() {
    let corpus = "As a user I want to 耀ed the reports\n\
                  As a café owner, I want to list crème brûlée so that guests order it\n\
                  — ünïcödé without any indicator —\n\
                  As a user, I want to cancel orders";
    let report = run(Config::default(), corpus).await;

    assert_eq!(report.statistics.total, 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].number, 3);
    assert_eq!(
        report.failures[0].reason,
        StructuringError::MissingRoleIndicator.to_string()
    );
    assert_eq!(report.statistics.succeeded, 3);
    assert!(report.stories.iter().any(|s| s.number == 2));
    assert!(report.ontology.class("user").unwrap().is_role);
}

#[test]
fn test_structuring_is_deterministic() {
    let structurer = Structurer::new();
    let raw = RawStory::new(7, "As a site administrator, I want to manage user accounts so that data stays clean");
    let runs: Vec<_> = (0..5).map(|_| structurer.structure(&raw).unwrap()).collect();
    assert!(runs.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_json_export_round_trip() {
    let report = run(
        Config::default(),
        "As a user, I want to search for products so that I can buy them\n\
         As an admin, I want to delete an account",
    )
    .await;

    let json = serde_json::to_string(&report.stories).unwrap();
    let parsed: Vec<StoryExport> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, report.stories);

    for (export, mined) in parsed.iter().zip(&report.mined) {
        assert_eq!(export.role.text, mined.role.segment.text);
        assert_eq!(export.means.text, mined.means.segment.text);
        assert_eq!(
            export.ends.as_ref().map(|e| e.text.as_str()),
            mined.ends.as_ref().map(|e| e.segment.text.as_str())
        );
    }
}

#[tokio::test]
async fn test_means_weight_is_monotonic() {
    let corpus = "As a user, I want to compare product prices in the catalog\n\
                  As a manager, I want to review orders for the warehouse";

    let mut previous: Option<Vec<(String, f64)>> = None;
    for weight in [0.0, 0.3, 0.7, 1.0, 2.0] {
        let mut config = Config::default();
        config.generation.weights.free_form_means_noun = weight;
        let report = run(config, corpus).await;

        let means_terms: Vec<(String, f64)> = report
            .matrix
            .iter()
            .filter(|t| t.means > 0)
            .map(|t| (t.term.clone(), t.weight))
            .collect();

        if let Some(previous) = &previous {
            for (term, w) in &means_terms {
                let before = previous
                    .iter()
                    .find(|(t, _)| t == term)
                    .map_or(0.0, |(_, w)| *w);
                assert!(*w + 1e-9 >= before, "{term} dropped at weight {weight}");
            }
        }
        previous = Some(means_terms);
    }
}

#[tokio::test]
async fn test_corpus_file_and_preparsed_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stories.txt");
    std::fs::write(
        &path,
        "# shop\nAs a user, I want to search for products\n\nAs a user, I want to cancel orders\n",
    )
    .unwrap();
    let stories = read_stories(&path).unwrap();
    assert_eq!(stories.len(), 2);

    // Annotations cover nothing, so every sentence goes to the fallback.
    let parser = PreparsedParser::from_json_str("[]")
        .unwrap()
        .with_fallback(Arc::new(RuleParser::new()));
    let report = Narrator::new(Config::default(), Arc::new(parser))
        .run(stories)
        .await
        .unwrap();

    assert_eq!(report.statistics.succeeded, 2);
    assert!(report.ontology.has_class("user"));
    assert!(report.ontology.has_class("order"));
}
