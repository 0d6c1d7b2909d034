//! Derives ontologies from mined stories and the term matrix.

use std::collections::{BTreeMap, BTreeSet};

use super::types::{Ontology, OntologyClass, OntologySet, Relationship, OCCURS_IN, USER_STORY};
use crate::matrix::TermMatrix;
use crate::story::{compound_name, MinedStory};
use crate::utils::story_label;

/// Tolerance for comparing accumulated weights against the cutoff.
const EPSILON: f64 = 1e-9;

/// Selects classes and synthesizes relationships.
#[derive(Debug, Clone)]
pub struct Constructor {
    cutoff: f64,
    link: bool,
}

impl Constructor {
    /// `cutoff` is `threshold × base_weight`.
    pub fn new(cutoff: f64) -> Self {
        Self {
            cutoff,
            link: false,
        }
    }

    /// Link classes to the stories they occur in.
    pub fn with_link(mut self, link: bool) -> Self {
        self.link = link;
        self
    }

    /// Ontology over all given stories.
    pub fn construct(&self, stories: &[MinedStory], matrix: &TermMatrix) -> Ontology {
        let subset: Vec<&MinedStory> = stories.iter().collect();
        self.construct_subset(&subset, matrix)
    }

    /// Global ontology plus, when `per_role` is set, one per functional role.
    pub fn construct_all(
        &self,
        stories: &[MinedStory],
        matrix: &TermMatrix,
        per_role: bool,
    ) -> OntologySet {
        let global = self.construct(stories, matrix);
        let mut set = OntologySet {
            global,
            per_role: BTreeMap::new(),
        };
        if !per_role {
            return set;
        }

        let mut by_role: BTreeMap<String, Vec<&MinedStory>> = BTreeMap::new();
        for story in stories {
            if let Some(role) = story.role_lemma() {
                by_role.entry(role.to_lowercase()).or_default().push(story);
            }
        }
        for (role, subset) in by_role {
            tracing::debug!(role = %role, stories = subset.len(), "Constructing role ontology");
            set.per_role.insert(role, self.construct_subset(&subset, matrix));
        }
        set
    }

    fn construct_subset(&self, stories: &[&MinedStory], matrix: &TermMatrix) -> Ontology {
        let mut ontology = Ontology::new();
        let numbers: BTreeSet<usize> = stories.iter().map(|s| s.number).collect();
        let role_heads: BTreeSet<String> = stories
            .iter()
            .filter_map(|s| s.role_lemma())
            .map(str::to_lowercase)
            .collect();

        for term in matrix.terms() {
            let occurrences = matrix.occurrences(term, &numbers);
            if occurrences.is_empty() {
                continue;
            }
            let weight = matrix.row_sum_over(term, &numbers);
            let is_role = role_heads.contains(term);
            if weight + EPSILON >= self.cutoff || is_role {
                let mut class = OntologyClass::new(term.clone())
                    .with_weight(weight)
                    .with_stories(occurrences);
                class.is_role = is_role;
                ontology.add_class(class);
            }
        }

        for story in stories {
            self.add_compounds(&mut ontology, story, matrix);
            self.add_association(&mut ontology, story);
        }

        if self.link {
            self.add_links(&mut ontology, stories);
        }

        tracing::debug!(
            stories = stories.len(),
            classes = ontology.class_count(),
            relationships = ontology.relationships().len(),
            "Constructed ontology"
        );
        ontology
    }

    fn add_compounds(&self, ontology: &mut Ontology, story: &MinedStory, matrix: &TermMatrix) {
        let role = &story.role.functional_role;
        if let (Some(name), Some(head)) = (role.compound_name(), role.lemma()) {
            let head = head.to_lowercase();
            if ontology.has_class(&head) {
                ontology.add_class(
                    OntologyClass::new(name.clone())
                        .with_parent(head.clone())
                        .with_weight(matrix.weight(&head, story.number))
                        .with_stories([story.number])
                        .as_role(),
                );
                ontology.add_relationship(Relationship::isa(name, head));
            }
        }

        for part in story.free_form_parts() {
            for (modifiers, head) in part.compound_groups() {
                let head_name = head.lemma.to_lowercase();
                if !ontology.has_class(&head_name) {
                    continue;
                }
                let name = compound_name(&modifiers, &head);
                ontology.add_class(
                    OntologyClass::new(name.clone())
                        .with_parent(head_name.clone())
                        .with_weight(matrix.weight(&head_name, story.number))
                        .with_stories([story.number]),
                );
                ontology.add_relationship(Relationship::isa(name, head_name));
            }
        }
    }

    fn add_association(&self, ontology: &mut Ontology, story: &MinedStory) {
        let means = &story.means;
        let (Some(verb), Some(object)) = (means.main_verb.lemma(), means.main_object.lemma()) else {
            return;
        };
        let Some(role) = story.role_lemma() else {
            return;
        };

        let pick = |compound: Option<String>, head: &str| -> Option<String> {
            compound
                .filter(|name| ontology.has_class(name))
                .or_else(|| Some(head.to_lowercase()).filter(|name| ontology.has_class(name)))
        };
        let domain = pick(story.role.functional_role.compound_name(), role);
        let range = pick(means.main_object.compound_name(), object);

        match (domain, range) {
            (Some(domain), Some(range)) => {
                ontology.add_relationship(Relationship::new(domain, verb.to_lowercase(), range));
            }
            _ => tracing::trace!(
                story = story.number,
                verb = %verb,
                object = %object,
                "Association endpoint pruned"
            ),
        }
    }

    fn add_links(&self, ontology: &mut Ontology, stories: &[&MinedStory]) {
        let concepts: Vec<(String, BTreeSet<usize>)> = ontology
            .classes()
            .map(|c| (c.name.clone(), c.stories.clone()))
            .collect();

        ontology.add_class(OntologyClass::new(USER_STORY));
        for story in stories {
            let label = story_label(story.number);
            ontology.add_class(
                OntologyClass::new(label.clone())
                    .with_parent(USER_STORY)
                    .with_stories([story.number]),
            );
            ontology.add_relationship(Relationship::isa(label, USER_STORY));
        }

        for (name, occurrences) in concepts {
            for number in occurrences {
                ontology.add_relationship(Relationship::new(
                    name.clone(),
                    OCCURS_IN,
                    story_label(number),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightConfig;
    use crate::matrix::MatrixBuilder;
    use crate::parser::{LanguageParser, RuleParser, SharedParser};
    use crate::story::{Miner, RawStory, Structurer};
    use std::sync::Arc;

    fn prepare(lines: &[&str]) -> (Vec<MinedStory>, TermMatrix) {
        let parser = RuleParser::new();
        let system = parser.parse("System").unwrap().tokens[0].clone();
        let stories: Vec<MinedStory> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let raw = RawStory::new(i + 1, *line);
                let structured = Structurer::new().structure(&raw).unwrap();
                let doc = parser.parse(&raw.sentence).unwrap();
                Miner::new().mine(structured, &doc, system.clone())
            })
            .collect();
        let matrix = MatrixBuilder::new(
            1,
            WeightConfig::default(),
            SharedParser::new(Arc::new(RuleParser::new())),
        )
        .build(&stories);
        (stories, matrix)
    }

    fn class_names(ontology: &Ontology) -> Vec<&str> {
        ontology.classes().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_search_story_ontology() {
        let (stories, matrix) =
            prepare(&["As a user, I want to search for products so that I can buy them"]);
        let ontology = Constructor::new(1.0).construct(&stories, &matrix);

        assert_eq!(class_names(&ontology), vec!["product", "user"]);
        assert!(ontology.class("user").unwrap().is_role);
        assert!(ontology
            .relationships()
            .contains(&Relationship::new("user", "search", "product")));
    }

    #[test]
    fn test_threshold_prunes_weak_terms() {
        let (stories, matrix) = prepare(&[
            "As a user, I want to search for products so that I can compare products",
            "As a user, I want to cancel orders",
        ]);
        let ontology = Constructor::new(1.2).construct(&stories, &matrix);

        assert!(ontology.has_class("user"));
        assert!(ontology.has_class("product"));
        assert!(!ontology.has_class("order"));
        assert!(ontology
            .relationships()
            .iter()
            .all(|r| r.range != "order" && r.domain != "order"));
    }

    #[test]
    fn test_compound_classes_and_isa() {
        let (stories, matrix) =
            prepare(&["As a site administrator, I want to manage user accounts"]);
        let ontology = Constructor::new(1.0).construct(&stories, &matrix);

        let site_admin = ontology.class("site administrator").unwrap();
        assert_eq!(site_admin.parent.as_deref(), Some("administrator"));
        assert!(site_admin.is_role);
        assert_eq!(ontology.class("user account").unwrap().parent.as_deref(), Some("account"));

        assert!(ontology
            .relationships()
            .contains(&Relationship::isa("site administrator", "administrator")));
        assert!(ontology
            .relationships()
            .contains(&Relationship::new("site administrator", "manage", "user account")));

        for rel in ontology.relationships().iter().filter(|r| r.is_isa()) {
            assert!(ontology.has_class(&rel.domain));
            assert!(ontology.has_class(&rel.range));
        }
    }

    #[test]
    fn test_higher_threshold_yields_subset() {
        let (stories, matrix) = prepare(&[
            "As a user, I want to search for products so that I can compare products",
            "As a user, I want to cancel orders so that my budget stays safe",
            "As a manager, I want to export sales reports",
        ]);

        let mut previous: Option<BTreeSet<String>> = None;
        for threshold in [0.0, 0.5, 1.0, 1.5, 3.0] {
            let ontology = Constructor::new(threshold).construct(&stories, &matrix);
            let names: BTreeSet<String> = ontology.classes().map(|c| c.name.clone()).collect();
            if let Some(previous) = &previous {
                assert!(names.is_subset(previous), "threshold {threshold}");
            }
            previous = Some(names);
        }
    }

    #[test]
    fn test_per_role_ontologies() {
        let (stories, matrix) = prepare(&[
            "As a user, I want to search for products",
            "As an admin, I want to delete an account",
        ]);
        let set = Constructor::new(1.0).construct_all(&stories, &matrix, true);

        assert_eq!(set.per_role.len(), 2);
        let admin = &set.per_role["admin"];
        assert!(admin.has_class("admin"));
        assert!(admin.has_class("account"));
        assert!(!admin.has_class("product"));
        assert!(set.global.has_class("product"));
    }

    #[test]
    fn test_link_adds_story_classes() {
        let (stories, matrix) = prepare(&["As a user, I want to cancel orders"]);
        let ontology = Constructor::new(1.0).with_link(true).construct(&stories, &matrix);

        assert!(ontology.has_class(USER_STORY));
        assert_eq!(ontology.class("US1").unwrap().parent.as_deref(), Some(USER_STORY));
        assert!(ontology
            .relationships()
            .contains(&Relationship::new("order", OCCURS_IN, "US1")));
        assert!(ontology
            .relationships()
            .contains(&Relationship::isa("US1", USER_STORY)));
    }

    #[test]
    fn test_empty_input() {
        let (stories, matrix) = prepare(&[]);
        let set = Constructor::new(1.0).construct_all(&stories, &matrix, true);
        assert!(set.global.is_empty());
        assert!(set.per_role.is_empty());
    }
}
