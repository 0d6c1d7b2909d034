//! User-story data model and the per-story pipeline stages.
//!
//! A story moves through three explicit values:
//!
//! ```text
//! ┌──────────┐  Structurer   ┌─────────────────┐   Miner    ┌────────────┐
//! │ RawStory │ ────────────▶ │ StructuredStory │ ─────────▶ │ MinedStory │
//! └──────────┘  indicators   └─────────────────┘  ParsedDoc └────────────┘
//!                role/means/ends segments        constituents + stats
//! ```
//!
//! Stages never mutate their input; each produces the next value.

mod miner;
mod structurer;

pub use miner::Miner;
pub use structurer::Structurer;

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::parser::Token;
use crate::stats::StoryStatistics;
use crate::utils::{normalize_whitespace, remove_punct, story_label};

// ============================================================================
// Stage Values
// ============================================================================

/// A story line as read from the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStory {
    /// 1-based position of the story in the corpus.
    pub number: usize,
    /// The line as written.
    pub text: String,
    /// Punctuation-stripped, whitespace-normalized text.
    pub sentence: String,
}

impl RawStory {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let sentence = normalize_whitespace(&remove_punct(&text));
        Self {
            number,
            text,
            sentence,
        }
    }

    /// `US<n>` label.
    pub fn label(&self) -> String {
        story_label(self.number)
    }
}

/// Which part of a story a segment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Role,
    Means,
    Ends,
}

/// One indicator-delimited part of a story sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Full segment text, indicator included.
    pub text: String,
    /// Words of the segment in order.
    pub words: Vec<String>,
    /// The indicator phrase as it appears in the sentence.
    pub indicator: String,
    /// Word index of the indicator's first word.
    pub indicator_i: usize,
    /// Byte range of the segment in the sentence.
    pub span: Range<usize>,
    /// Byte range of the segment without its indicator.
    pub content: Range<usize>,
    /// Segment text without its indicator.
    pub simplified: String,
}

impl Segment {
    /// Whether a token starts inside the indicator-stripped content.
    pub fn contains(&self, token: &Token) -> bool {
        self.content.contains(&token.idx)
    }
}

/// A story split into its role, means and optional ends segments.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredStory {
    pub raw: RawStory,
    /// Word indices of the functional-role mention.
    pub iloc: Vec<usize>,
    pub role: Segment,
    pub means: Segment,
    pub ends: Option<Segment>,
}

impl StructuredStory {
    pub fn has_ends(&self) -> bool {
        self.ends.is_some()
    }
}

// ============================================================================
// Mined Constituents
// ============================================================================

/// Grammatical function of a [`WithPhrase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhraseType {
    Agent,
    Action,
    Theme,
}

/// A head token with its modifiers.
///
/// `main` never appears in `phrase` or `compound`; the mutators below are
/// the only way to fill the lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithPhrase {
    pub main: Option<Token>,
    phrase: Vec<Token>,
    compound: Vec<Token>,
    pub kind: PhraseType,
}

impl WithPhrase {
    pub fn new(kind: PhraseType) -> Self {
        Self {
            main: None,
            phrase: Vec::new(),
            compound: Vec::new(),
            kind,
        }
    }

    /// Set the head, dropping it from the modifier lists.
    pub fn set_main(&mut self, token: Token) {
        self.phrase.retain(|t| t.i != token.i);
        self.compound.retain(|t| t.i != token.i);
        self.main = Some(token);
    }

    pub fn add_phrase(&mut self, token: Token) {
        if !self.is_main(&token) && !self.phrase.iter().any(|t| t.i == token.i) {
            self.phrase.push(token);
            self.phrase.sort_by_key(|t| t.i);
        }
    }

    pub fn add_compound(&mut self, token: Token) {
        if !self.is_main(&token) && !self.compound.iter().any(|t| t.i == token.i) {
            self.compound.push(token);
            self.compound.sort_by_key(|t| t.i);
        }
    }

    pub fn phrase(&self) -> &[Token] {
        &self.phrase
    }

    pub fn compound(&self) -> &[Token] {
        &self.compound
    }

    fn is_main(&self, token: &Token) -> bool {
        self.main.as_ref().is_some_and(|m| m.i == token.i)
    }

    /// Lemma of the head.
    pub fn lemma(&self) -> Option<&str> {
        self.main.as_ref().map(|t| t.lemma.as_str())
    }

    /// `"<modifiers> <head>"` in lemma form when the head has compound
    /// modifiers.
    pub fn compound_name(&self) -> Option<String> {
        let main = self.main.as_ref()?;
        if self.compound.is_empty() {
            return None;
        }
        Some(compound_name(&self.compound, main))
    }

    /// Copy with a different phrase type.
    pub fn retyped(&self, kind: PhraseType) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }
}

/// Join modifier and head lemmas into a compound class name.
pub fn compound_name(modifiers: &[Token], head: &Token) -> String {
    modifiers
        .iter()
        .chain(std::iter::once(head))
        .map(|t| t.lemma.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhrasalVerb {
    pub verb: Token,
    pub particle: Token,
}

/// A noun head with its determiner, adjective and compound modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NounPhrase {
    pub head: Token,
    /// Modifiers and head in sentence order.
    pub tokens: Vec<Token>,
}

impl NounPhrase {
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A `compound` relation between two nouns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compound {
    pub modifier: Token,
    pub head: Token,
}

/// The mined role segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePart {
    pub segment: Segment,
    pub functional_role: WithPhrase,
    /// Nouns and proper nouns of the role content.
    pub nouns: Vec<Token>,
}

/// The mined means or ends segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeFormPart {
    pub segment: Segment,
    pub main_verb: WithPhrase,
    pub main_object: WithPhrase,
    pub subject: WithPhrase,
    pub verbs: Vec<Token>,
    pub phrasal_verbs: Vec<PhrasalVerb>,
    pub nouns: Vec<Token>,
    pub proper_nouns: Vec<Token>,
    pub noun_phrases: Vec<NounPhrase>,
    pub compounds: Vec<Compound>,
}

impl FreeFormPart {
    /// Empty constituents for a segment.
    pub fn new(segment: Segment) -> Self {
        Self {
            segment,
            main_verb: WithPhrase::new(PhraseType::Action),
            main_object: WithPhrase::new(PhraseType::Theme),
            subject: WithPhrase::new(PhraseType::Agent),
            verbs: Vec::new(),
            phrasal_verbs: Vec::new(),
            nouns: Vec::new(),
            proper_nouns: Vec::new(),
            noun_phrases: Vec::new(),
            compounds: Vec::new(),
        }
    }

    /// Nouns and proper nouns in sentence order.
    pub fn all_nouns(&self) -> Vec<&Token> {
        let mut all: Vec<&Token> = self.nouns.iter().chain(&self.proper_nouns).collect();
        all.sort_by_key(|t| t.i);
        all
    }

    /// Compound modifiers grouped per head, heads in sentence order.
    pub fn compound_groups(&self) -> Vec<(Vec<Token>, Token)> {
        let mut groups: Vec<(Vec<Token>, Token)> = Vec::new();
        for compound in &self.compounds {
            match groups.iter_mut().find(|(_, head)| head.i == compound.head.i) {
                Some((modifiers, _)) => modifiers.push(compound.modifier.clone()),
                None => groups.push((vec![compound.modifier.clone()], compound.head.clone())),
            }
        }
        for (modifiers, _) in &mut groups {
            modifiers.sort_by_key(|t| t.i);
        }
        groups.sort_by_key(|(_, head)| head.i);
        groups
    }
}

/// A fully mined story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinedStory {
    pub number: usize,
    pub text: String,
    pub sentence: String,
    pub iloc: Vec<usize>,
    pub role: RolePart,
    pub means: FreeFormPart,
    pub ends: Option<FreeFormPart>,
    /// Parsed system-name token.
    pub system: Token,
    pub stats: StoryStatistics,
}

impl MinedStory {
    pub fn has_ends(&self) -> bool {
        self.ends.is_some()
    }

    pub fn label(&self) -> String {
        story_label(self.number)
    }

    /// Whether a token is part of the functional-role mention.
    pub fn is_func_role(&self, token: &Token) -> bool {
        self.role.segment.contains(token)
    }

    /// Lemma of the functional-role head.
    pub fn role_lemma(&self) -> Option<&str> {
        self.role.functional_role.lemma()
    }

    /// The means part followed by the ends part, if any.
    pub fn free_form_parts(&self) -> impl Iterator<Item = &FreeFormPart> {
        std::iter::once(&self.means).chain(self.ends.as_ref())
    }

    pub fn to_json(&self) -> StoryExport {
        StoryExport {
            number: self.number,
            text: self.text.clone(),
            iloc: self.iloc.clone(),
            role: PartExport::from(&self.role.segment),
            means: PartExport::from(&self.means.segment),
            ends: self.ends.as_ref().map(|e| PartExport::from(&e.segment)),
        }
    }
}

// ============================================================================
// Export Types
// ============================================================================

/// JSON shape of one exported story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryExport {
    pub number: usize,
    pub text: String,
    pub iloc: Vec<usize>,
    pub role: PartExport,
    pub means: PartExport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends: Option<PartExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartExport {
    pub text: String,
    pub indicator: String,
}

impl From<&Segment> for PartExport {
    fn from(segment: &Segment) -> Self {
        Self {
            text: segment.text.clone(),
            indicator: segment.indicator.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Dep, Pos};

    fn token(i: usize, text: &str) -> Token {
        Token {
            i,
            idx: i * 10,
            text: text.to_string(),
            lemma: text.to_lowercase(),
            pos: Pos::Noun,
            dep: Dep::Compound,
            head: i + 1,
        }
    }

    #[test]
    fn test_raw_story_cleans_sentence() {
        let raw = RawStory::new(3, "As a user,  I want to log-in!");
        assert_eq!(raw.sentence, "As a user I want to log-in");
        assert_eq!(raw.label(), "US3");
    }

    #[test]
    fn test_with_phrase_keeps_main_out_of_modifiers() {
        let mut phrase = WithPhrase::new(PhraseType::Agent);
        phrase.add_compound(token(0, "Site"));
        phrase.add_phrase(token(1, "administrator"));
        phrase.set_main(token(1, "administrator"));
        phrase.add_compound(token(1, "administrator"));
        phrase.add_compound(token(0, "Site"));

        assert!(phrase.phrase().is_empty());
        assert_eq!(phrase.compound().len(), 1);
        assert_eq!(phrase.compound_name().as_deref(), Some("site administrator"));
    }

    #[test]
    fn test_compound_groups() {
        let mut part = FreeFormPart::new(Segment {
            kind: SegmentKind::Means,
            text: String::new(),
            words: Vec::new(),
            indicator: String::new(),
            indicator_i: 0,
            span: 0..0,
            content: 0..0,
            simplified: String::new(),
        });
        let head = token(3, "history");
        part.compounds.push(Compound {
            modifier: token(2, "order"),
            head: head.clone(),
        });
        part.compounds.push(Compound {
            modifier: token(1, "account"),
            head: head.clone(),
        });

        let groups = part.compound_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(compound_name(&groups[0].0, &groups[0].1), "account order history");
    }
}
