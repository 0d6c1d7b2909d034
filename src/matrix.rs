//! Term-by-story weight matrix.
//!
//! Every noun occurrence in a mined story adds `base × factor` to the cell
//! of its lemma and story. The factor depends on where the noun sits:
//!
//! | occurrence                              | factor                      |
//! |-----------------------------------------|-----------------------------|
//! | functional-role head                    | `role`                      |
//! | functional-role compound modifier       | `role × compound`           |
//! | other role noun                         | `free_form_means_noun`      |
//! | means main-object head                  | `main_object`               |
//! | means main-object compound modifier     | `main_object × compound`    |
//! | other means noun                        | `free_form_means_noun` (× compound for modifiers) |
//! | ends noun                               | `free_form_ends_noun` (× compound for modifiers)  |
//! | free-form noun similar to the role      | `role`                      |

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::WeightConfig;
use crate::parser::{Dep, SharedParser, Token};
use crate::story::{FreeFormPart, MinedStory};

/// Segment index into per-term segment counts.
const ROLE: usize = 0;
const MEANS: usize = 1;
const ENDS: usize = 2;

// ============================================================================
// Matrix
// ============================================================================

/// Weighted term occurrences per story.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermMatrix {
    /// Row labels, sorted.
    terms: Vec<String>,
    /// Column labels: story numbers in input order.
    stories: Vec<usize>,
    /// `values[term][story]`, weighted.
    values: Vec<Vec<f64>>,
    /// `counts[term][story]`, raw occurrences.
    counts: Vec<Vec<u32>>,
    /// `[role, means, ends]` occurrences per term.
    segment_counts: Vec<[u32; 3]>,
    /// Lemmas that head a functional role somewhere in the corpus.
    role_terms: BTreeSet<String>,
}

/// One matrix row, flattened for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSummary {
    pub term: String,
    pub weight: f64,
    pub count: u32,
    pub role: u32,
    pub means: u32,
    pub ends: u32,
    pub row_value_excluding_zero: f64,
}

impl TermMatrix {
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn stories(&self) -> &[usize] {
        &self.stories
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn row_index(&self, term: &str) -> Option<usize> {
        self.terms.binary_search_by(|t| t.as_str().cmp(term)).ok()
    }

    fn column_index(&self, story: usize) -> Option<usize> {
        self.stories.iter().position(|s| *s == story)
    }

    /// Weighted cell value; 0.0 for unknown terms or stories.
    pub fn weight(&self, term: &str, story: usize) -> f64 {
        match (self.row_index(term), self.column_index(story)) {
            (Some(r), Some(c)) => self.values[r][c],
            _ => 0.0,
        }
    }

    /// Raw occurrence count of a cell.
    pub fn count(&self, term: &str, story: usize) -> u32 {
        match (self.row_index(term), self.column_index(story)) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    /// `[role, means, ends]` occurrence counts.
    pub fn segment_counts(&self, term: &str) -> Option<[u32; 3]> {
        self.row_index(term).map(|r| self.segment_counts[r])
    }

    /// Row sum restricted to the given stories.
    pub fn row_sum_over(&self, term: &str, stories: &BTreeSet<usize>) -> f64 {
        let Some(r) = self.row_index(term) else {
            return 0.0;
        };
        self.stories
            .iter()
            .zip(&self.values[r])
            .filter(|(story, _)| stories.contains(story))
            .map(|(_, value)| value)
            .sum()
    }

    /// Stories among `stories` in which the term occurs.
    pub fn occurrences(&self, term: &str, stories: &BTreeSet<usize>) -> BTreeSet<usize> {
        let Some(r) = self.row_index(term) else {
            return BTreeSet::new();
        };
        self.stories
            .iter()
            .zip(&self.counts[r])
            .filter(|(story, count)| **count > 0 && stories.contains(story))
            .map(|(story, _)| *story)
            .collect()
    }

    /// Mean of the non-zero weighted entries of a row; 0.0 for an all-zero row.
    pub fn row_value_excluding_zero(&self, term: &str) -> f64 {
        let Some(r) = self.row_index(term) else {
            return 0.0;
        };
        let non_zero: Vec<f64> = self.values[r].iter().copied().filter(|v| *v != 0.0).collect();
        if non_zero.is_empty() {
            0.0
        } else {
            non_zero.iter().sum::<f64>() / non_zero.len() as f64
        }
    }

    pub fn is_role_term(&self, term: &str) -> bool {
        self.role_terms.contains(term)
    }

    /// Per-term totals in term order.
    pub fn summary(&self) -> Vec<TermSummary> {
        self.terms
            .iter()
            .enumerate()
            .map(|(r, term)| {
                let [role, means, ends] = self.segment_counts[r];
                TermSummary {
                    term: term.clone(),
                    weight: self.values[r].iter().sum(),
                    count: self.counts[r].iter().sum(),
                    role,
                    means,
                    ends,
                    row_value_excluding_zero: self.row_value_excluding_zero(term),
                }
            })
            .collect()
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone)]
struct Row {
    values: Vec<f64>,
    counts: Vec<u32>,
    segments: [u32; 3],
}

impl Row {
    fn new(width: usize) -> Self {
        Self {
            values: vec![0.0; width],
            counts: vec![0; width],
            segments: [0; 3],
        }
    }
}

/// Builds a [`TermMatrix`] from the whole mined corpus.
#[derive(Debug, Clone)]
pub struct MatrixBuilder {
    base: f64,
    weights: WeightConfig,
    role_similarity: f32,
    parser: SharedParser,
}

impl MatrixBuilder {
    pub fn new(base: u32, weights: WeightConfig, parser: SharedParser) -> Self {
        Self {
            base: f64::from(base),
            weights,
            role_similarity: 0.95,
            parser,
        }
    }

    /// Minimum similarity for a free-form noun to weigh as the role.
    pub fn with_role_similarity(mut self, threshold: f32) -> Self {
        self.role_similarity = threshold;
        self
    }

    pub fn build(&self, stories: &[MinedStory]) -> TermMatrix {
        let width = stories.len();
        let mut rows: BTreeMap<String, Row> = BTreeMap::new();
        let mut role_terms = BTreeSet::new();
        let mut similarity_cache: HashMap<(String, String), bool> = HashMap::new();

        for (column, story) in stories.iter().enumerate() {
            let mut add = |token: &Token, segment: usize, factor: f64| {
                let row = rows
                    .entry(token.lemma.to_lowercase())
                    .or_insert_with(|| Row::new(width));
                row.values[column] += self.base * factor;
                row.counts[column] += 1;
                row.segments[segment] += 1;
            };

            let role = &story.role.functional_role;
            let role_lemma = role.lemma().map(str::to_lowercase);
            let compound_factor = self.weights.compound_relative_to_head;

            if let Some(head) = &role.main {
                role_terms.insert(head.lemma.to_lowercase());
                add(head, ROLE, self.weights.role);
            }
            for modifier in role.compound() {
                add(modifier, ROLE, self.weights.role * compound_factor);
            }
            for noun in &story.role.nouns {
                let in_phrase = role.main.as_ref().is_some_and(|m| m.i == noun.i)
                    || role.compound().iter().any(|m| m.i == noun.i);
                if !in_phrase {
                    add(noun, ROLE, self.weights.free_form_means_noun);
                }
            }

            let object = &story.means.main_object;
            let object_head = object.main.as_ref().filter(|t| t.pos.is_nominal());
            if let Some(head) = object_head {
                add(head, MEANS, self.weights.main_object);
                for modifier in object.compound() {
                    add(modifier, MEANS, self.weights.main_object * compound_factor);
                }
            }
            let in_object = |noun: &Token| {
                object_head.is_some_and(|h| h.i == noun.i)
                    || (object_head.is_some() && object.compound().iter().any(|m| m.i == noun.i))
            };

            let parts: [(Option<&FreeFormPart>, usize, f64); 2] = [
                (Some(&story.means), MEANS, self.weights.free_form_means_noun),
                (story.ends.as_ref(), ENDS, self.weights.free_form_ends_noun),
            ];
            for (part, segment, free_form) in parts {
                let Some(part) = part else {
                    continue;
                };
                for noun in part.all_nouns() {
                    if segment == MEANS && in_object(noun) {
                        continue;
                    }
                    let similar = role_lemma.as_deref().is_some_and(|role| {
                        self.similar_to_role(&mut similarity_cache, &noun.lemma, role)
                    });
                    let factor = if similar {
                        self.weights.role
                    } else if noun.dep == Dep::Compound {
                        free_form * compound_factor
                    } else {
                        free_form
                    };
                    add(noun, segment, factor);
                }
            }
        }

        tracing::debug!(
            terms = rows.len(),
            stories = width,
            "Built term-story matrix"
        );

        let mut matrix = TermMatrix {
            stories: stories.iter().map(|s| s.number).collect(),
            role_terms,
            ..Default::default()
        };
        for (term, row) in rows {
            matrix.terms.push(term);
            matrix.values.push(row.values);
            matrix.counts.push(row.counts);
            matrix.segment_counts.push(row.segments);
        }
        matrix
    }

    fn similar_to_role(
        &self,
        cache: &mut HashMap<(String, String), bool>,
        noun: &str,
        role: &str,
    ) -> bool {
        let key = (noun.to_lowercase(), role.to_string());
        if let Some(similar) = cache.get(&key) {
            return *similar;
        }
        let similar = self.parser.similarity(&key.0, &key.1) >= self.role_similarity;
        cache.insert(key, similar);
        similar
    }
}
