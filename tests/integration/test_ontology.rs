//! Ontology generation across whole corpora.

use std::collections::BTreeSet;
use std::sync::Arc;

use narrator::config::Config;
use narrator::corpus::parse_stories;
use narrator::ontology::{Ontology, Relationship};
use narrator::parser::RuleParser;
use narrator::pipeline::{Narrator, Report};

const WEBSHOP: &str = "\
As a user, I want to search for products so that I can compare products
As a user, I want to cancel orders
As a site administrator, I want to manage user accounts
As a manager, I want to export sales reports so that I can plan the budget
As a visitor, I want to register an account so that I can place orders";

async fn run(config: Config, corpus: &str) -> Report {
    Narrator::new(config, Arc::new(RuleParser::new()))
        .run(parse_stories(corpus))
        .await
        .unwrap()
}

fn with_threshold(threshold: f64) -> Config {
    let mut config = Config::default();
    config.generation.threshold = threshold;
    config
}

fn class_set(ontology: &Ontology) -> BTreeSet<String> {
    ontology.classes().map(|c| c.name.clone()).collect()
}

fn assert_endpoints_are_classes(ontology: &Ontology) {
    for rel in ontology.relationships() {
        assert!(ontology.has_class(&rel.domain), "missing domain {:?}", rel);
        assert!(ontology.has_class(&rel.range), "missing range {:?}", rel);
    }
}

#[tokio::test]
async fn test_threshold_keeps_roles_and_prunes_objects() {
    let corpus = "As a user, I want to search for products so that I can compare products\n\
                  As a user, I want to cancel orders";
    let report = run(with_threshold(1.2), corpus).await;
    let ontology = &report.ontology;

    assert!(ontology.has_class("user"));
    assert!(ontology.class("user").unwrap().is_role);
    assert!(ontology.has_class("product"));
    assert!(!ontology.has_class("order"));

    assert!(ontology
        .relationships()
        .contains(&Relationship::new("user", "search", "product")));
    assert!(!ontology
        .relationships()
        .iter()
        .any(|r| r.range == "order" || r.domain == "order"));
}

#[tokio::test]
async fn test_threshold_monotonicity() {
    let mut previous: Option<BTreeSet<String>> = None;
    for threshold in [0.0, 0.5, 1.0, 1.5, 2.0, 5.0] {
        let report = run(with_threshold(threshold), WEBSHOP).await;
        let classes = class_set(&report.ontology);

        for role in ["user", "administrator", "manager", "visitor"] {
            assert!(classes.contains(role), "{role} missing at {threshold}");
        }
        if let Some(previous) = &previous {
            assert!(classes.is_subset(previous), "not a subset at {threshold}");
        }
        previous = Some(classes);
    }
}

#[tokio::test]
async fn test_relationship_endpoints_are_classes() {
    for threshold in [0.5, 1.0, 2.0] {
        let mut config = with_threshold(threshold);
        config.output.per_role = true;
        config.output.link = true;
        let report = run(config, WEBSHOP).await;

        assert_endpoints_are_classes(&report.ontology);
        for ontology in report.per_role_ontologies.values() {
            assert_endpoints_are_classes(ontology);
        }
    }
}

#[tokio::test]
async fn test_compound_roles_and_objects() {
    let report = run(Config::default(), WEBSHOP).await;
    let ontology = &report.ontology;

    assert!(ontology.class("site administrator").unwrap().is_role);
    assert!(ontology
        .relationships()
        .contains(&Relationship::isa("site administrator", "administrator")));
    assert!(ontology
        .relationships()
        .contains(&Relationship::isa("user account", "account")));
    assert!(ontology
        .relationships()
        .contains(&Relationship::new("site administrator", "manage", "user account")));
}

#[tokio::test]
async fn test_graph_matches_ontology() {
    let report = run(Config::default(), WEBSHOP).await;

    assert_eq!(report.graph.nodes.len(), report.ontology.class_count());
    assert_eq!(report.graph.edges.len(), report.ontology.relationships().len());

    let json = serde_json::to_value(&report.graph).unwrap();
    let edges = json["edges"].as_array().unwrap();
    for edge in edges {
        let dashed = edge.get("dashes").is_some();
        assert_eq!(dashed, edge["label"] == "isa");
    }
}

#[tokio::test]
async fn test_per_role_partition() {
    let mut config = Config::default();
    config.output.per_role = true;
    let report = run(config, WEBSHOP).await;

    let roles: Vec<&str> = report.per_role.keys().map(String::as_str).collect();
    assert_eq!(roles, vec!["administrator", "manager", "user", "visitor"]);

    let manager = &report.per_role_ontologies["manager"];
    assert!(manager.has_class("manager"));
    assert!(!manager.has_class("product"));
    assert!(manager.classes().all(|c| c.stories.iter().all(|&n| n == 4)));
}

#[tokio::test]
async fn test_prolog_export() {
    let mut config = Config::default();
    config.output.prolog = true;
    let report = run(config, "As a user, I want to search for products").await;

    let prolog = report.prolog.unwrap();
    assert!(prolog.contains("class('user')."));
    assert!(prolog.contains("class('product')."));
    assert!(prolog.contains("relationship('user', 'search', 'product')."));
}
