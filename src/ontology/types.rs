//! Core types for generated conceptual models.
//!
//! An [`Ontology`] holds classes ordered by name and relationships in
//! insertion order. [`OntologyGraph`] is its node/edge export.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::utils::occurrence_list;

/// Relationship name for class inheritance.
pub const ISA: &str = "isa";
/// Relationship name linking a class to a story it occurs in.
pub const OCCURS_IN: &str = "occurs_in";
/// Parent class of all story classes when linking is on.
pub const USER_STORY: &str = "UserStory";

// ============================================================================
// Classes and Relationships
// ============================================================================

/// A concept of the modeled system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyClass {
    /// Class name: a lemma, `"<modifiers> <head>"` or a story label.
    pub name: String,
    /// Parent class for compound and story classes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Stories the class occurs in.
    pub stories: BTreeSet<usize>,
    /// Aggregate weight over the stories the ontology covers.
    pub weight: f64,
    /// Whether the class names a functional role.
    pub is_role: bool,
}

impl OntologyClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            stories: BTreeSet::new(),
            weight: 0.0,
            is_role: false,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_stories(mut self, stories: impl IntoIterator<Item = usize>) -> Self {
        self.stories.extend(stories);
        self
    }

    pub fn as_role(mut self) -> Self {
        self.is_role = true;
        self
    }

    /// `US1, US3` style list of the stories.
    pub fn occurs_in(&self) -> String {
        occurrence_list(&self.stories)
    }
}

/// A directed, named relation between two classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relationship {
    pub domain: String,
    /// `isa`, `occurs_in` or a verb lemma.
    pub name: String,
    pub range: String,
}

impl Relationship {
    pub fn new(domain: impl Into<String>, name: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            range: range.into(),
        }
    }

    pub fn isa(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::new(child, ISA, parent)
    }

    pub fn is_isa(&self) -> bool {
        self.name == ISA
    }
}

/// Classes and relationships derived from a set of stories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "OntologyData")]
pub struct Ontology {
    classes: BTreeMap<String, OntologyClass>,
    relationships: Vec<Relationship>,
    /// Mirrors `relationships` for constant-time dedup.
    #[serde(skip)]
    relationship_index: HashSet<Relationship>,
}

/// Serialized shape of an [`Ontology`]; the index is rebuilt on load.
#[derive(Deserialize)]
struct OntologyData {
    classes: BTreeMap<String, OntologyClass>,
    relationships: Vec<Relationship>,
}

impl From<OntologyData> for Ontology {
    fn from(data: OntologyData) -> Self {
        let mut ontology = Ontology {
            classes: data.classes,
            ..Ontology::default()
        };
        for relationship in data.relationships {
            ontology.add_relationship(relationship);
        }
        ontology
    }
}

impl Ontology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class, merging stories, weight and flags into an existing one.
    pub fn add_class(&mut self, class: OntologyClass) {
        match self.classes.get_mut(&class.name) {
            Some(existing) => {
                existing.stories.extend(class.stories);
                existing.is_role |= class.is_role;
                existing.weight += class.weight;
                if existing.parent.is_none() {
                    existing.parent = class.parent;
                }
            }
            None => {
                self.classes.insert(class.name.clone(), class);
            }
        }
    }

    /// Add a relationship unless an identical one exists.
    pub fn add_relationship(&mut self, relationship: Relationship) -> bool {
        if !self.relationship_index.insert(relationship.clone()) {
            return false;
        }
        self.relationships.push(relationship);
        true
    }

    pub fn class(&self, name: &str) -> Option<&OntologyClass> {
        self.classes.get(name)
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Classes ordered by name.
    pub fn classes(&self) -> impl Iterator<Item = &OntologyClass> {
        self.classes.values()
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.relationships.is_empty()
    }

    /// Node/edge export.
    ///
    /// Relationships with an endpoint that is not a class are left out.
    pub fn to_graph(&self) -> OntologyGraph {
        let ids: HashMap<&str, usize> = self
            .classes
            .keys()
            .enumerate()
            .map(|(id, name)| (name.as_str(), id))
            .collect();

        let nodes = self
            .classes
            .values()
            .enumerate()
            .map(|(id, class)| GraphNode {
                id,
                label: class.name.clone(),
                weight: class.weight,
            })
            .collect();

        let edges = self
            .relationships
            .iter()
            .filter_map(|rel| {
                match (ids.get(rel.domain.as_str()), ids.get(rel.range.as_str())) {
                    (Some(&from), Some(&to)) => Some(GraphEdge {
                        from,
                        to,
                        label: rel.name.clone(),
                        dashes: rel.is_isa().then_some(true),
                    }),
                    _ => {
                        tracing::debug!(
                            domain = %rel.domain,
                            name = %rel.name,
                            range = %rel.range,
                            "Dropping relationship with unknown endpoint"
                        );
                        None
                    }
                }
            })
            .collect();

        OntologyGraph { nodes, edges }
    }
}

/// The global ontology plus one per functional role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OntologySet {
    pub global: Ontology,
    /// Keyed by functional-role lemma.
    pub per_role: BTreeMap<String, Ontology>,
}

// ============================================================================
// Graph Export
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: usize,
    pub label: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
    pub label: String,
    /// Set for `isa` edges only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashes: Option<bool>,
}

/// `{nodes, edges}` shape consumed by graph viewers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OntologyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}
