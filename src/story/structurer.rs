//! Splits a story sentence into role, means and ends segments.
//!
//! Each segment opens with an indicator phrase. The earliest match at an
//! allowed position wins; when several phrases start at the same word the
//! higher-ranked (longer) phrasing is taken.

use std::ops::Range;

use regex::Regex;

use super::{RawStory, Segment, SegmentKind, StructuredStory};
use crate::error::StructuringError;

/// Role indicators, in rank order.
const ROLE_INDICATORS: &[&str] = &["as an", "as a", "as the", "as"];

/// Means indicators, in rank order.
const MEANS_INDICATORS: &[&str] = &[
    "i want to be able to",
    "i would like to be able to",
    "i'd like to be able to",
    "i would love to be able to",
    "i need to be able to",
    "i wish to be able to",
    "i should be able to",
    "i must be able to",
    "i want to",
    "i would like to",
    "i'd like to",
    "i would love to",
    "i need to",
    "i wish to",
    "i have to",
    "i am able to",
    "i'm able to",
    "i can",
    "i must",
    "i should",
    "i will",
    "i would",
    "i want",
    "i need",
    "i wish",
    "we want to",
    "we would like to",
    "we need to",
    "we can",
    "we want",
    "we need",
];

/// Ends indicators, in rank order.
const ENDS_INDICATORS: &[&str] = &["so that", "in order to", "such that", "so"];

/// The role indicator has to start within this many leading words.
const ROLE_WINDOW: usize = 3;

#[derive(Debug, Clone)]
struct Indicator {
    phrase: &'static str,
    pattern: Regex,
}

/// Compile indicator phrases into word-bounded, case-insensitive patterns.
fn compile(phrases: &[&'static str]) -> Vec<Indicator> {
    phrases
        .iter()
        .filter_map(|phrase| {
            let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
            let source = format!(r"(?i)\b{}\b", words.join(r"\s+"));
            Regex::new(&source)
                .ok()
                .map(|pattern| Indicator { phrase, pattern })
        })
        .collect()
}

/// Number of words that start before byte offset `at`.
fn word_index(sentence: &str, at: usize) -> usize {
    sentence[..at].split_whitespace().count()
}

/// Rule-based sentence structurer.
#[derive(Debug, Clone)]
pub struct Structurer {
    role: Vec<Indicator>,
    means: Vec<Indicator>,
    ends: Vec<Indicator>,
}

impl Default for Structurer {
    fn default() -> Self {
        Self::new()
    }
}

impl Structurer {
    pub fn new() -> Self {
        Self {
            role: compile(ROLE_INDICATORS),
            means: compile(MEANS_INDICATORS),
            ends: compile(ENDS_INDICATORS),
        }
    }

    /// Split a story into segments.
    pub fn structure(&self, raw: &RawStory) -> Result<StructuredStory, StructuringError> {
        let sentence = raw.sentence.as_str();
        if sentence.trim().is_empty() {
            return Err(StructuringError::EmptyStory);
        }

        let role = Self::find(&self.role, sentence, 0, |start| {
            word_index(sentence, start) < ROLE_WINDOW
        })
        .ok_or(StructuringError::MissingRoleIndicator)?;

        let means = Self::find(&self.means, sentence, role.end, |_| true)
            .ok_or(StructuringError::MissingMeansIndicator)?;

        let ends = Self::find(&self.ends, sentence, means.end, |_| true);

        let means_end = ends.as_ref().map_or(sentence.len(), |e| e.start);
        let role_segment = segment(sentence, SegmentKind::Role, &role, means.start);
        let means_segment = segment(sentence, SegmentKind::Means, &means, means_end);
        let ends_segment = ends
            .as_ref()
            .map(|e| segment(sentence, SegmentKind::Ends, e, sentence.len()));

        let first = word_index(sentence, role_segment.content.start);
        let iloc = (first..first + role_segment.simplified.split_whitespace().count()).collect();

        tracing::trace!(
            story = raw.number,
            role = %role.phrase,
            means = %means.phrase,
            ends = ends.as_ref().map(|e| e.phrase).unwrap_or("-"),
            "Structured story"
        );

        Ok(StructuredStory {
            raw: raw.clone(),
            iloc,
            role: role_segment,
            means: means_segment,
            ends: ends_segment,
        })
    }

    /// Earliest accepted indicator match after `from`.
    ///
    /// Rank only breaks ties between phrases starting at the same offset,
    /// so the longer phrasing wins there.
    fn find(
        indicators: &[Indicator],
        sentence: &str,
        from: usize,
        accept: impl Fn(usize) -> bool,
    ) -> Option<Found> {
        let haystack = &sentence[from..];
        indicators
            .iter()
            .enumerate()
            .filter_map(|(rank, indicator)| {
                indicator
                    .pattern
                    .find_iter(haystack)
                    .map(|m| Found {
                        phrase: indicator.phrase,
                        start: from + m.start(),
                        end: from + m.end(),
                    })
                    .find(|found| accept(found.start))
                    .map(|found| (rank, found))
            })
            .min_by_key(|(rank, found)| (found.start, *rank))
            .map(|(_, found)| found)
    }
}

#[derive(Debug, Clone)]
struct Found {
    phrase: &'static str,
    start: usize,
    end: usize,
}

impl Found {
    fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

fn segment(sentence: &str, kind: SegmentKind, indicator: &Found, end: usize) -> Segment {
    let span = indicator.start..end;
    let raw_content = &sentence[indicator.end..end];
    let lead = raw_content.len() - raw_content.trim_start().len();
    let content_start = indicator.end + lead;
    let content_end = content_start + raw_content.trim().len();
    let text = sentence[span.clone()].trim().to_string();

    Segment {
        kind,
        words: text.split_whitespace().map(str::to_string).collect(),
        text,
        indicator: sentence[indicator.range()].to_string(),
        indicator_i: word_index(sentence, indicator.start),
        span,
        content: content_start..content_end,
        simplified: sentence[content_start..content_end].to_string(),
    }
}
