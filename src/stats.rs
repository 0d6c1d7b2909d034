//! Per-story and corpus statistics.

use serde::{Deserialize, Serialize};

use crate::story::MinedStory;

/// What mining found in one story.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryStatistics {
    pub has_role: bool,
    pub has_means: bool,
    pub has_ends: bool,
    pub has_main_verb: bool,
    pub has_main_object: bool,
    /// Subject found inside the means rather than borrowed from the role.
    pub has_subject: bool,
    /// Functional role with compound modifiers.
    pub multi_word_role: bool,
    pub has_phrasal_verb: bool,
}

/// A story that could not be structured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryFailure {
    pub number: usize,
    pub text: String,
    pub reason: String,
}

/// Tallies mining outcomes.
#[derive(Debug, Clone, Default)]
pub struct Counter;

impl Counter {
    pub fn new() -> Self {
        Self
    }

    pub fn count(&self, story: &MinedStory) -> StoryStatistics {
        let means = &story.means;
        let subject_inside = means
            .subject
            .main
            .as_ref()
            .is_some_and(|s| means.segment.contains(s));

        StoryStatistics {
            has_role: story.role.functional_role.main.is_some(),
            has_means: means.main_verb.main.is_some() || !means.segment.simplified.is_empty(),
            has_ends: story.has_ends(),
            has_main_verb: means.main_verb.main.is_some(),
            has_main_object: means.main_object.main.is_some(),
            has_subject: subject_inside,
            multi_word_role: !story.role.functional_role.compound().is_empty(),
            has_phrasal_verb: story.free_form_parts().any(|p| !p.phrasal_verbs.is_empty()),
        }
    }
}

/// Aggregate counts over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStatistics {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub with_ends: usize,
    pub multi_word_roles: usize,
    pub with_main_object: usize,
    pub with_subject: usize,
    pub with_phrasal_verb: usize,
}

impl CorpusStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stats: &StoryStatistics) {
        self.total += 1;
        self.succeeded += 1;
        self.with_ends += usize::from(stats.has_ends);
        self.multi_word_roles += usize::from(stats.multi_word_role);
        self.with_main_object += usize::from(stats.has_main_object);
        self.with_subject += usize::from(stats.has_subject);
        self.with_phrasal_verb += usize::from(stats.has_phrasal_verb);
    }

    pub fn record_failure(&mut self) {
        self.total += 1;
        self.failed += 1;
    }

    /// Share of stories that were mined, in `0.0..=1.0`.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_statistics() {
        let mut corpus = CorpusStatistics::new();
        corpus.record(&StoryStatistics {
            has_role: true,
            has_means: true,
            has_ends: true,
            has_main_object: true,
            ..Default::default()
        });
        corpus.record(&StoryStatistics {
            multi_word_role: true,
            ..Default::default()
        });
        corpus.record_failure();

        assert_eq!(corpus.total, 3);
        assert_eq!(corpus.succeeded, 2);
        assert_eq!(corpus.failed, 1);
        assert_eq!(corpus.with_ends, 1);
        assert_eq!(corpus.multi_word_roles, 1);
        assert_eq!(corpus.with_main_object, 1);
        assert!((corpus.success_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_corpus_rate() {
        assert_eq!(CorpusStatistics::new().success_rate(), 0.0);
    }
}
