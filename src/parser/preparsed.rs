//! Parser backend serving annotations produced ahead of time.
//!
//! An external tagger (for example a spaCy pipeline) exports one entry per
//! story sentence plus optional word vectors:
//!
//! ```json
//! {
//!   "sentences": [{ "text": "As a user I want ...", "tokens": [ ... ] }],
//!   "vectors": { "user": [0.1, 0.3], "customer": [0.1, 0.29] }
//! }
//! ```
//!
//! A bare array of sentences is accepted as well. Sentences are matched on
//! their normalized text; misses go to the fallback parser when one is set.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{LanguageParser, ParsedDoc, Token};
use crate::error::{ParserError, Result};

/// One annotated sentence as exported by an external tagger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparsedSentence {
    pub text: String,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnnotationFile {
    Bundle {
        sentences: Vec<PreparsedSentence>,
        #[serde(default)]
        vectors: HashMap<String, Vec<f32>>,
    },
    Sentences(Vec<PreparsedSentence>),
}

/// Serves pre-computed parses and word vectors.
pub struct PreparsedParser {
    docs: HashMap<String, ParsedDoc>,
    vectors: HashMap<String, Vec<f32>>,
    fallback: Option<Arc<dyn LanguageParser>>,
}

impl PreparsedParser {
    /// Build a parser from annotated sentences.
    pub fn new(sentences: Vec<PreparsedSentence>) -> Result<Self> {
        let mut docs = HashMap::with_capacity(sentences.len());
        for sentence in sentences {
            let key = normalize_key(&sentence.text);
            let doc = ParsedDoc::new(sentence.text, sentence.tokens)?;
            docs.insert(key, doc);
        }
        Ok(Self {
            docs,
            vectors: HashMap::new(),
            fallback: None,
        })
    }

    /// Parse an annotation export.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: AnnotationFile =
            serde_json::from_str(content).map_err(|e| ParserError::Load(e.to_string()))?;
        let (sentences, vectors) = match file {
            AnnotationFile::Bundle { sentences, vectors } => (sentences, vectors),
            AnnotationFile::Sentences(sentences) => (sentences, HashMap::new()),
        };
        Ok(Self::new(sentences)?.with_vectors(vectors))
    }

    /// Load an annotation export from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ParserError::Load(format!("{}: {}", path.display(), e)))?;
        let parser = Self::from_json_str(&content)?;
        tracing::info!(
            "Loaded {} annotated sentences and {} vectors from {}",
            parser.docs.len(),
            parser.vectors.len(),
            path.display()
        );
        Ok(parser)
    }

    /// Attach word vectors, keyed by lower-cased word.
    pub fn with_vectors(mut self, vectors: HashMap<String, Vec<f32>>) -> Self {
        self.vectors = vectors
            .into_iter()
            .map(|(word, vector)| (word.to_lowercase(), vector))
            .collect();
        self
    }

    /// Parser used for sentences without annotations.
    pub fn with_fallback(mut self, parser: Arc<dyn LanguageParser>) -> Self {
        self.fallback = Some(parser);
        self
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn lookup(&self, text: &str) -> Option<ParsedDoc> {
        let doc = self.docs.get(&normalize_key(text))?;
        if doc.text == text {
            return Some(doc.clone());
        }
        realign(doc, text)
    }
}

impl LanguageParser for PreparsedParser {
    fn name(&self) -> &str {
        "preparsed"
    }

    fn parse(&self, text: &str) -> Result<ParsedDoc> {
        if let Some(doc) = self.lookup(text) {
            return Ok(doc);
        }
        match &self.fallback {
            Some(parser) => {
                tracing::debug!("No annotation for {:?}, using {}", text, parser.name());
                parser.parse(text)
            }
            None => Err(ParserError::Unavailable(text.to_string()).into()),
        }
    }

    fn similarity(&self, a: &str, b: &str) -> f32 {
        let key_a = a.trim().to_lowercase();
        let key_b = b.trim().to_lowercase();
        if key_a == key_b {
            return 1.0;
        }
        match (self.vectors.get(&key_a), self.vectors.get(&key_b)) {
            (Some(va), Some(vb)) => cosine_similarity(va, vb),
            _ => match &self.fallback {
                Some(parser) => parser.similarity(a, b),
                None => 0.0,
            },
        }
    }

    fn is_reentrant(&self) -> bool {
        self.fallback.as_ref().map_or(true, |p| p.is_reentrant())
    }
}

fn normalize_key(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Re-point token offsets at `text` when it differs from the annotated text
/// only in spacing, case or punctuation. Tokens that no longer occur must be
/// punctuation; anything else means the annotation belongs elsewhere.
fn realign(doc: &ParsedDoc, text: &str) -> Option<ParsedDoc> {
    let lower = text.to_lowercase();
    let mut cursor = 0;
    let mut tokens = Vec::with_capacity(doc.tokens.len());

    for token in &doc.tokens {
        let needle = token.text.to_lowercase();
        let mut aligned = token.clone();
        match lower[cursor..].find(&needle) {
            Some(offset) => {
                aligned.idx = cursor + offset;
                cursor = aligned.idx + needle.len();
            }
            None if token.text.chars().all(|c| c.is_ascii_punctuation()) => {
                aligned.idx = cursor;
                aligned.text = String::new();
            }
            None => return None,
        }
        aligned.text = text
            .get(aligned.idx..aligned.idx + aligned.text.len())
            .unwrap_or_default()
            .to_string();
        tokens.push(aligned);
    }

    ParsedDoc::new(text, tokens).ok()
}

/// Cosine similarity of two vectors; 0.0 when undefined.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Dep, Pos, RuleParser};

    fn annotation() -> &'static str {
        r#"{
            "sentences": [{
                "text": "As a buyer, I want carts.",
                "tokens": [
                    {"i":0,"idx":0,"text":"As","lemma":"as","pos":"ADP","dep":"prep","head":4},
                    {"i":1,"idx":3,"text":"a","lemma":"a","pos":"DET","dep":"det","head":2},
                    {"i":2,"idx":5,"text":"buyer","lemma":"buyer","pos":"NOUN","dep":"pobj","head":0},
                    {"i":3,"idx":10,"text":",","lemma":",","pos":"PUNCT","dep":"punct","head":4},
                    {"i":4,"idx":14,"text":"want","lemma":"want","pos":"VERB","dep":"ROOT","head":4},
                    {"i":5,"idx":19,"text":"carts","lemma":"cart","pos":"NOUN","dep":"dobj","head":4},
                    {"i":6,"idx":24,"text":".","lemma":".","pos":"PUNCT","dep":"punct","head":4}
                ]
            }],
            "vectors": {"buyer": [1.0, 0.0], "customer": [0.96, 0.28], "cart": [0.0, 1.0]}
        }"#
    }

    #[test]
    fn test_exact_lookup() {
        let parser = PreparsedParser::from_json_str(annotation()).unwrap();
        assert_eq!(parser.len(), 1);

        let doc = parser.parse("As a buyer, I want carts.").unwrap();
        assert_eq!(doc.tokens[2].lemma, "buyer");
        let root = doc.tokens.iter().find(|t| t.dep == Dep::Root).unwrap();
        assert_eq!(root.text, "want");
    }

    #[test]
    fn test_lookup_realigns_offsets() {
        let parser = PreparsedParser::from_json_str(annotation()).unwrap();

        let doc = parser.parse("As a buyer I want carts").unwrap();
        let carts = &doc.tokens[5];
        assert_eq!(carts.idx, 18);
        assert_eq!(carts.text, "carts");
        assert_eq!(carts.dep, Dep::Dobj);
        assert_eq!(doc.tokens[3].pos, Pos::Punct);
    }

    #[test]
    fn test_missing_sentence_without_fallback() {
        let parser = PreparsedParser::from_json_str(annotation()).unwrap();
        assert!(parser.parse("As a seller I want stock").is_err());
    }

    #[test]
    fn test_missing_sentence_uses_fallback() {
        let parser = PreparsedParser::from_json_str(annotation())
            .unwrap()
            .with_fallback(Arc::new(RuleParser::new()));

        let doc = parser.parse("As a seller I want to add stock").unwrap();
        assert!(doc.tokens.iter().any(|t| t.text == "stock"));
    }

    #[test]
    fn test_vector_similarity() {
        let parser = PreparsedParser::from_json_str(annotation()).unwrap();
        assert!(parser.similarity("buyer", "customer") > 0.95);
        assert!(parser.similarity("buyer", "cart") < 0.01);
        assert_eq!(parser.similarity("Buyer", "buyer"), 1.0);
        assert_eq!(parser.similarity("buyer", "unknown"), 0.0);
    }

    #[test]
    fn test_bare_array_and_bad_json() {
        let parser = PreparsedParser::from_json_str("[]").unwrap();
        assert!(parser.is_empty());
        assert!(PreparsedParser::from_json_str("{not json").is_err());
    }
}
