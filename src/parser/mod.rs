//! Language parser capability used by the mining pipeline.
//!
//! The pipeline never tokenizes or tags text itself. It consumes
//! [`ParsedDoc`]s produced by a [`LanguageParser`] backend and asks the
//! same backend for word similarity scores during weighting.
//!
//! Two backends ship with the crate:
//! - [`RuleParser`]: deterministic lexicon and rule based tagging for
//!   user-story English (offline, reentrant)
//! - [`PreparsedParser`]: annotations exported by an external tagger,
//!   loaded from JSON, with optional word vectors

mod preparsed;
mod rules;

pub use preparsed::{PreparsedParser, PreparsedSentence};
pub use rules::RuleParser;

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ============================================================================
// Token Types
// ============================================================================

/// Coarse part-of-speech tag (universal tag set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Pos {
    Noun,
    PropN,
    Verb,
    Aux,
    Adp,
    Det,
    Pron,
    Adj,
    Adv,
    Part,
    CConj,
    SConj,
    Num,
    Punct,
    Other,
}

impl Pos {
    /// Parse a universal part-of-speech tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "NOUN" => Pos::Noun,
            "PROPN" => Pos::PropN,
            "VERB" => Pos::Verb,
            "AUX" => Pos::Aux,
            "ADP" => Pos::Adp,
            "DET" => Pos::Det,
            "PRON" => Pos::Pron,
            "ADJ" => Pos::Adj,
            "ADV" => Pos::Adv,
            "PART" => Pos::Part,
            "CCONJ" | "CONJ" => Pos::CConj,
            "SCONJ" => Pos::SConj,
            "NUM" => Pos::Num,
            "PUNCT" => Pos::Punct,
            _ => Pos::Other,
        }
    }

    /// The universal tag string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pos::Noun => "NOUN",
            Pos::PropN => "PROPN",
            Pos::Verb => "VERB",
            Pos::Aux => "AUX",
            Pos::Adp => "ADP",
            Pos::Det => "DET",
            Pos::Pron => "PRON",
            Pos::Adj => "ADJ",
            Pos::Adv => "ADV",
            Pos::Part => "PART",
            Pos::CConj => "CCONJ",
            Pos::SConj => "SCONJ",
            Pos::Num => "NUM",
            Pos::Punct => "PUNCT",
            Pos::Other => "X",
        }
    }

    /// Nouns and proper nouns.
    pub fn is_nominal(&self) -> bool {
        matches!(self, Pos::Noun | Pos::PropN)
    }
}

impl From<String> for Pos {
    fn from(tag: String) -> Self {
        Pos::from_tag(&tag)
    }
}

impl From<Pos> for String {
    fn from(pos: Pos) -> Self {
        pos.as_str().to_string()
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dependency relation to the syntactic head (ClearNLP style labels).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Dep {
    Root,
    Nsubj,
    NsubjPass,
    Dobj,
    Pobj,
    Prep,
    Prt,
    Compound,
    Amod,
    Nummod,
    Det,
    Poss,
    Aux,
    AuxPass,
    Neg,
    Xcomp,
    Ccomp,
    Advcl,
    Advmod,
    Acomp,
    Attr,
    Conj,
    Cc,
    Mark,
    Punct,
    Dep,
    Other(String),
}

impl Dep {
    /// Parse a dependency label. Universal Dependencies spellings are
    /// mapped onto their closest equivalent.
    pub fn from_label(label: &str) -> Self {
        match label {
            "ROOT" | "root" => Dep::Root,
            "nsubj" => Dep::Nsubj,
            "nsubjpass" | "nsubj:pass" => Dep::NsubjPass,
            "dobj" | "obj" => Dep::Dobj,
            "pobj" => Dep::Pobj,
            "prep" => Dep::Prep,
            "prt" | "compound:prt" => Dep::Prt,
            "compound" => Dep::Compound,
            "amod" => Dep::Amod,
            "nummod" => Dep::Nummod,
            "det" => Dep::Det,
            "poss" | "nmod:poss" => Dep::Poss,
            "aux" => Dep::Aux,
            "auxpass" | "aux:pass" => Dep::AuxPass,
            "neg" => Dep::Neg,
            "xcomp" => Dep::Xcomp,
            "ccomp" => Dep::Ccomp,
            "advcl" => Dep::Advcl,
            "advmod" => Dep::Advmod,
            "acomp" => Dep::Acomp,
            "attr" => Dep::Attr,
            "conj" => Dep::Conj,
            "cc" => Dep::Cc,
            "mark" => Dep::Mark,
            "punct" => Dep::Punct,
            "dep" => Dep::Dep,
            other => Dep::Other(other.to_string()),
        }
    }

    /// The label string.
    pub fn as_str(&self) -> &str {
        match self {
            Dep::Root => "ROOT",
            Dep::Nsubj => "nsubj",
            Dep::NsubjPass => "nsubjpass",
            Dep::Dobj => "dobj",
            Dep::Pobj => "pobj",
            Dep::Prep => "prep",
            Dep::Prt => "prt",
            Dep::Compound => "compound",
            Dep::Amod => "amod",
            Dep::Nummod => "nummod",
            Dep::Det => "det",
            Dep::Poss => "poss",
            Dep::Aux => "aux",
            Dep::AuxPass => "auxpass",
            Dep::Neg => "neg",
            Dep::Xcomp => "xcomp",
            Dep::Ccomp => "ccomp",
            Dep::Advcl => "advcl",
            Dep::Advmod => "advmod",
            Dep::Acomp => "acomp",
            Dep::Attr => "attr",
            Dep::Conj => "conj",
            Dep::Cc => "cc",
            Dep::Mark => "mark",
            Dep::Punct => "punct",
            Dep::Dep => "dep",
            Dep::Other(label) => label,
        }
    }

    /// Subject relations.
    pub fn is_subject(&self) -> bool {
        matches!(self, Dep::Nsubj | Dep::NsubjPass)
    }
}

impl From<String> for Dep {
    fn from(label: String) -> Self {
        Dep::from_label(&label)
    }
}

impl From<Dep> for String {
    fn from(dep: Dep) -> Self {
        dep.as_str().to_string()
    }
}

impl fmt::Display for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parsed token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Position of the token in its document.
    pub i: usize,
    /// Byte offset of the token in the parsed text.
    pub idx: usize,
    /// Surface text.
    pub text: String,
    /// Lower-cased lemma.
    pub lemma: String,
    /// Part-of-speech tag.
    pub pos: Pos,
    /// Dependency relation to `head`.
    pub dep: Dep,
    /// Index of the syntactic head; the root points to itself.
    pub head: usize,
}

impl Token {
    /// Byte offset just past the token.
    pub fn end(&self) -> usize {
        self.idx + self.text.len()
    }
}

/// A dependency-parsed sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDoc {
    /// The parsed text.
    pub text: String,
    /// Tokens in document order; `tokens[n].i == n`.
    pub tokens: Vec<Token>,
}

impl ParsedDoc {
    /// Create a document, validating token indices and heads.
    pub fn new(text: impl Into<String>, tokens: Vec<Token>) -> Result<Self> {
        let len = tokens.len();
        for (n, token) in tokens.iter().enumerate() {
            if token.i != n || token.head >= len {
                return Err(crate::error::ParserError::Malformed(format!(
                    "token {n} ({}) has index {} and head {}",
                    token.text, token.i, token.head
                ))
                .into());
            }
        }
        Ok(Self {
            text: text.into(),
            tokens,
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token(&self, i: usize) -> Option<&Token> {
        self.tokens.get(i)
    }

    /// Direct dependents of token `i`, in sentence order.
    pub fn children(&self, i: usize) -> impl Iterator<Item = &Token> + '_ {
        self.tokens.iter().filter(move |t| t.head == i && t.i != i)
    }

    /// Tokens starting inside the given byte range.
    pub fn tokens_in(&self, range: Range<usize>) -> impl Iterator<Item = &Token> + '_ {
        self.tokens
            .iter()
            .filter(move |t| t.idx >= range.start && t.idx < range.end)
    }
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for natural-language parser backends.
pub trait LanguageParser: Send + Sync {
    /// Short backend name for logging.
    fn name(&self) -> &str;

    /// Tokenize, tag, lemmatize and dependency-parse a sentence.
    fn parse(&self, text: &str) -> Result<ParsedDoc>;

    /// Similarity between two single words in `0.0..=1.0`.
    fn similarity(&self, a: &str, b: &str) -> f32 {
        if a.trim().eq_ignore_ascii_case(b.trim()) {
            1.0
        } else {
            0.0
        }
    }

    /// Whether concurrent calls on one instance are safe.
    ///
    /// Backends that return `false` are serialized by [`SharedParser`].
    fn is_reentrant(&self) -> bool {
        false
    }
}

/// A parser handle shared by every stage of one run.
#[derive(Clone)]
pub struct SharedParser {
    inner: Arc<dyn LanguageParser>,
    gate: Option<Arc<Mutex<()>>>,
}

impl SharedParser {
    /// Wrap a parser; non-reentrant backends get a call gate.
    pub fn new(parser: Arc<dyn LanguageParser>) -> Self {
        let gate = if parser.is_reentrant() {
            None
        } else {
            Some(Arc::new(Mutex::new(())))
        };
        Self {
            inner: parser,
            gate,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn parse(&self, text: &str) -> Result<ParsedDoc> {
        let _guard = self.gate.as_ref().map(|gate| gate.lock());
        self.inner.parse(text)
    }

    pub fn similarity(&self, a: &str, b: &str) -> f32 {
        let _guard = self.gate.as_ref().map(|gate| gate.lock());
        self.inner.similarity(a, b)
    }

    /// Whether calls are serialized through the gate.
    pub fn is_serialized(&self) -> bool {
        self.gate.is_some()
    }
}

impl fmt::Debug for SharedParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedParser")
            .field("backend", &self.inner.name())
            .field("serialized", &self.is_serialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedParser;

    impl LanguageParser for FixedParser {
        fn name(&self) -> &str {
            "fixed"
        }

        fn parse(&self, text: &str) -> Result<ParsedDoc> {
            ParsedDoc::new(
                text,
                vec![Token {
                    i: 0,
                    idx: 0,
                    text: text.to_string(),
                    lemma: text.to_lowercase(),
                    pos: Pos::Noun,
                    dep: Dep::Root,
                    head: 0,
                }],
            )
        }
    }

    #[test]
    fn test_labels_roundtrip_through_strings() {
        assert_eq!(Dep::from_label("obj"), Dep::Dobj);
        assert_eq!(Dep::from_label("compound:prt"), Dep::Prt);
        assert_eq!(Dep::from_label("relcl"), Dep::Other("relcl".to_string()));
        assert_eq!(Pos::from_tag("propn"), Pos::PropN);
        assert_eq!(String::from(Pos::CConj), "CCONJ");
    }

    #[test]
    fn test_token_serde_uses_tag_strings() {
        let json = r#"{"i":0,"idx":0,"text":"Users","lemma":"user","pos":"NOUN","dep":"nsubj","head":1}"#;
        let token: Token = serde_json::from_str(json).unwrap();
        assert_eq!(token.pos, Pos::Noun);
        assert_eq!(token.dep, Dep::Nsubj);
        assert_eq!(token.end(), 5);
    }

    #[test]
    fn test_parsed_doc_rejects_bad_heads() {
        let token = Token {
            i: 0,
            idx: 0,
            text: "x".to_string(),
            lemma: "x".to_string(),
            pos: Pos::Noun,
            dep: Dep::Root,
            head: 3,
        };
        assert!(ParsedDoc::new("x", vec![token]).is_err());
    }

    #[test]
    fn test_shared_parser_gates_non_reentrant_backends() {
        let shared = SharedParser::new(Arc::new(FixedParser));
        assert!(shared.is_serialized());
        assert_eq!(shared.parse("Catalog").unwrap().tokens[0].lemma, "catalog");
        assert_eq!(shared.similarity("User", "user"), 1.0);

        let reentrant = SharedParser::new(Arc::new(RuleParser::new()));
        assert!(!reentrant.is_serialized());
    }
}
