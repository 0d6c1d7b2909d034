//! Lexicon and rule based parser for user-story English.
//!
//! User stories are short, formulaic sentences ("As a ⟨role⟩, I want to
//! ⟨means⟩, so that ⟨ends⟩"), so a closed-class lexicon, a list of common
//! requirement verbs and a handful of positional rules recover the
//! structure the miner needs: noun chunks with compounds, verb chains with
//! particles, subjects, direct and prepositional objects, and clause marks.

use super::{Dep, LanguageParser, ParsedDoc, Pos, Token};
use crate::error::Result;

// ============================================================================
// Lexicon
// ============================================================================

const DETERMINERS: &[&str] = &[
    "a", "an", "the", "this", "these", "those", "some", "any", "all", "each", "every", "another",
    "no", "both", "either", "neither", "such", "which", "what",
];

const POSSESSIVES: &[&str] = &["my", "your", "our", "their", "his", "its", "her"];

const SUBJECT_PRONOUNS: &[&str] = &[
    "i", "we", "you", "he", "she", "it", "they", "who", "i'd", "i'm", "i'll", "we'd", "we'll",
];

const PRONOUNS: &[&str] = &[
    "me", "us", "him", "them", "myself", "ourselves", "yourself", "themselves", "itself",
    "someone", "anyone", "everyone", "something", "anything", "everything", "nothing", "whom",
];

const AUXILIARIES: &[&str] = &[
    "can", "could", "will", "would", "shall", "should", "may", "might", "must", "do", "does",
    "did", "am", "is", "are", "was", "were", "be", "been", "being", "can't", "cannot", "won't",
    "don't", "doesn't", "didn't", "shouldn't", "wouldn't", "couldn't",
];

const NEGATIONS: &[&str] = &["not", "never"];

const COORDINATORS: &[&str] = &["and", "or", "but", "nor"];

const SUBORDINATORS: &[&str] = &[
    "because", "if", "when", "whenever", "while", "although", "though", "since", "unless",
    "whether", "once", "where",
];

const PREPOSITIONS: &[&str] = &[
    "about", "above", "across", "after", "against", "along", "among", "around", "at", "before",
    "behind", "below", "between", "by", "during", "except", "for", "from", "in", "inside", "into",
    "like", "near", "of", "off", "on", "onto", "out", "outside", "over", "per", "through",
    "throughout", "toward", "towards", "under", "until", "up", "upon", "via", "with", "within",
    "without", "down",
];

const PARTICLES: &[&str] = &[
    "up", "out", "off", "down", "in", "on", "back", "away", "over", "through", "around",
];

const PHRASAL_VERBS: &[(&str, &str)] = &[
    ("log", "in"),
    ("log", "out"),
    ("log", "on"),
    ("sign", "up"),
    ("sign", "in"),
    ("sign", "out"),
    ("set", "up"),
    ("back", "up"),
    ("look", "up"),
    ("fill", "out"),
    ("fill", "in"),
    ("check", "out"),
    ("check", "in"),
    ("opt", "out"),
    ("opt", "in"),
    ("pick", "up"),
    ("turn", "on"),
    ("turn", "off"),
    ("find", "out"),
    ("follow", "up"),
    ("print", "out"),
    ("shut", "down"),
    ("top", "up"),
    ("drop", "off"),
];

const ADVERBS: &[&str] = &[
    "also", "only", "easily", "quickly", "always", "often", "again", "then", "later", "now",
    "soon", "already", "still", "just", "very", "directly", "automatically", "immediately",
    "together", "instead", "too", "even", "more", "most", "less", "well", "here", "there",
    "back", "away", "ever", "anytime", "anywhere", "everywhere", "easier", "faster",
];

const LY_NON_ADVERBS: &[&str] = &[
    "apply", "reply", "supply", "family", "assembly", "italy", "july", "ally", "rally", "fly",
    "anomaly", "monopoly",
];

const ADJECTIVES: &[&str] = &[
    "able", "new", "old", "existing", "current", "personal", "available", "relevant", "specific",
    "different", "multiple", "own", "public", "private", "recent", "important", "other", "easy",
    "simple", "secure", "safe", "fast", "quick", "correct", "right", "wrong", "full", "complete",
    "single", "same", "free", "main", "final", "previous", "next", "last", "first", "latest",
    "online", "digital", "upcoming", "past", "closed", "active", "inactive", "several",
    "many", "few", "certain", "various", "additional", "total", "daily", "weekly", "monthly",
    "yearly", "annual", "social", "local", "global", "general", "detailed", "accurate", "high",
    "low", "good", "bad", "best", "better", "large", "small", "big", "clear", "visible",
    "informed", "aware", "happy", "satisfied", "interested", "sure", "responsible", "possible",
    "necessary", "useful", "helpful", "valid", "invalid", "unique", "favorite", "favourite",
    "preferred", "popular", "similar", "related", "special", "technical", "financial", "legal",
    "mobile", "electronic", "automatic", "real", "appropriate", "suitable", "convenient",
    "efficient", "effective", "consistent", "reliable", "registered", "anonymous",
];

const VERBS: &[&str] = &[
    "want", "need", "like", "wish", "search", "buy", "purchase", "delete", "remove", "view",
    "see", "create", "add", "edit", "update", "change", "modify", "log", "register", "upload",
    "download", "manage", "know", "find", "track", "share", "receive", "send", "pay", "book",
    "read", "write", "check", "select", "filter", "sort", "export", "import", "print", "save",
    "access", "browse", "compare", "order", "cancel", "rate", "review", "submit", "get", "make",
    "have", "use", "reset", "sign", "contact", "invite", "assign", "approve", "reject",
    "publish", "schedule", "visit", "navigate", "help", "ensure", "keep", "avoid", "understand",
    "learn", "decide", "choose", "list", "display", "show", "store", "monitor", "report",
    "notify", "configure", "set", "provide", "include", "start", "stop", "open", "close", "link",
    "connect", "request", "verify", "subscribe", "unsubscribe", "follow", "comment", "post",
    "reply", "answer", "ask", "return", "replace", "refund", "ship", "deliver", "plan",
    "prepare", "organize", "analyze", "generate", "calculate", "estimate", "archive",
    "restore", "block", "unblock", "lock", "unlock", "enable", "disable", "customize",
    "personalize", "translate", "attach", "tag", "mark", "flag", "bookmark", "recommend",
    "suggest", "discover", "explore", "watch", "listen", "play", "pause", "stream", "chat",
    "message", "call", "email", "meet", "join", "leave", "enter", "exit", "go", "come", "stay",
    "remain", "become", "feel", "look", "spend", "earn", "win", "lose", "give", "take", "bring",
    "put", "move", "copy", "paste", "merge", "split", "group", "rename", "define", "specify",
    "describe", "document", "test", "fix", "deploy", "install", "run", "execute", "process",
    "handle", "apply", "claim", "transfer", "withdraw", "deposit", "invest", "borrow", "lend",
    "rent", "reserve", "confirm", "validate", "authenticate", "authorize", "login", "logout",
    "scan", "sync", "integrate", "collect", "gather", "aggregate", "measure", "evaluate",
    "assess", "improve", "reduce", "increase", "maintain", "support", "protect", "prevent",
    "allow", "let", "encourage", "inform", "remind", "alert", "warn", "sell", "offer",
    "promote", "advertise", "hire", "supervise", "coordinate", "communicate", "collaborate",
    "contribute", "participate", "attend", "enroll", "study", "teach", "grade", "retrieve",
    "fetch", "load", "refresh", "reload", "adjust", "identify", "recognize", "determine",
    "pick", "drop", "drag", "click", "tap", "scroll", "zoom", "reach", "obtain", "acquire",
    "fill", "complete", "finish", "continue", "proceed", "resume", "repeat", "retry", "undo",
    "accept", "decline", "deny", "grant", "revoke", "renew", "extend", "upgrade", "downgrade",
    "migrate", "convert", "format", "preview", "opt", "turn", "record", "think", "tell", "hold",
    "build", "stand", "try", "do",
];

const IRREGULAR_VERBS: &[(&str, &str)] = &[
    ("bought", "buy"),
    ("sent", "send"),
    ("got", "get"),
    ("gotten", "get"),
    ("made", "make"),
    ("paid", "pay"),
    ("found", "find"),
    ("saw", "see"),
    ("seen", "see"),
    ("gave", "give"),
    ("given", "give"),
    ("went", "go"),
    ("gone", "go"),
    ("done", "do"),
    ("did", "do"),
    ("does", "do"),
    ("has", "have"),
    ("had", "have"),
    ("is", "be"),
    ("are", "be"),
    ("was", "be"),
    ("were", "be"),
    ("am", "be"),
    ("been", "be"),
    ("being", "be"),
    ("told", "tell"),
    ("kept", "keep"),
    ("left", "leave"),
    ("known", "know"),
    ("knew", "know"),
    ("chosen", "choose"),
    ("chose", "choose"),
    ("written", "write"),
    ("wrote", "write"),
    ("ran", "run"),
    ("shown", "show"),
    ("taken", "take"),
    ("took", "take"),
    ("sold", "sell"),
    ("held", "hold"),
    ("brought", "bring"),
    ("thought", "think"),
    ("built", "build"),
    ("understood", "understand"),
    ("spent", "spend"),
    ("won", "win"),
    ("lost", "lose"),
    ("met", "meet"),
    ("came", "come"),
    ("became", "become"),
    ("felt", "feel"),
    ("stood", "stand"),
    ("can't", "can"),
    ("cannot", "can"),
    ("won't", "will"),
    ("don't", "do"),
    ("doesn't", "do"),
    ("didn't", "do"),
    ("shouldn't", "should"),
    ("wouldn't", "would"),
    ("couldn't", "could"),
];

const IRREGULAR_NOUNS: &[(&str, &str)] = &[
    ("people", "person"),
    ("children", "child"),
    ("men", "man"),
    ("women", "woman"),
    ("feet", "foot"),
    ("mice", "mouse"),
    ("criteria", "criterion"),
    ("analyses", "analysis"),
    ("indices", "index"),
    ("i'd", "i"),
    ("i'm", "i"),
    ("i'll", "i"),
    ("we'd", "we"),
    ("we'll", "we"),
];

const INVARIANT_NOUNS: &[&str] = &[
    "news", "series", "status", "species", "data", "media", "analytics", "logistics",
    "statistics", "bus", "campus", "this", "its", "us", "gas", "canvas", "lens", "atlas",
];

fn contains(list: &[&str], word: &str) -> bool {
    list.contains(&word)
}

fn lookup<'a>(table: &'a [(&'a str, &'a str)], word: &str) -> Option<&'a str> {
    table.iter().find(|(form, _)| *form == word).map(|(_, lemma)| *lemma)
}

/// `stopp` -> `stop`: drop a doubled final letter.
fn undouble(stem: &str) -> Option<String> {
    let mut chars = stem.chars().rev();
    let (last, before) = (chars.next()?, chars.next()?);
    (last == before).then(|| stem[..stem.len() - last.len_utf8()].to_string())
}

/// Candidate base forms of an inflected verb, most likely first.
fn verb_candidates(word: &str) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(stem) = word.strip_suffix("ing") {
        out.push(stem.to_string());
        out.push(format!("{stem}e"));
        out.extend(undouble(stem));
    } else if let Some(stem) = word.strip_suffix("ied") {
        out.push(format!("{stem}y"));
    } else if let Some(stem) = word.strip_suffix("ed") {
        out.push(stem.to_string());
        out.push(format!("{stem}e"));
        out.extend(undouble(stem));
    } else if let Some(stem) = word.strip_suffix("ies") {
        out.push(format!("{stem}y"));
    } else if let Some(stem) = word.strip_suffix("es") {
        out.push(stem.to_string());
        out.push(format!("{stem}e"));
    } else if let Some(stem) = word.strip_suffix('s') {
        if !stem.ends_with('s') {
            out.push(stem.to_string());
        }
    }
    out.retain(|c| c.len() >= 2);
    out
}

/// Base form of a word in the verb lexicon, if it is one.
fn known_verb(word: &str) -> Option<String> {
    if let Some(lemma) = lookup(IRREGULAR_VERBS, word) {
        return Some(lemma.to_string());
    }
    if contains(VERBS, word) {
        return Some(word.to_string());
    }
    verb_candidates(word)
        .into_iter()
        .find(|candidate| contains(VERBS, candidate))
}

fn verb_lemma(word: &str) -> String {
    known_verb(word)
        .or_else(|| verb_candidates(word).into_iter().next())
        .unwrap_or_else(|| word.to_string())
}

/// Singular form of a noun.
pub(crate) fn noun_lemma(word: &str) -> String {
    if let Some(lemma) = lookup(IRREGULAR_NOUNS, word) {
        return lemma.to_string();
    }
    if contains(INVARIANT_NOUNS, word) || word.len() <= 3 {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => word.to_string(),
    }
}

// ============================================================================
// Tokenization and Tagging
// ============================================================================

#[derive(Debug, Clone)]
struct Word<'a> {
    text: &'a str,
    lower: String,
    idx: usize,
    punct: bool,
}

#[derive(Debug, Clone)]
struct Tagged {
    pos: Pos,
    lemma: String,
    particle: bool,
    possessive: bool,
}

impl Tagged {
    fn new(pos: Pos, lemma: impl Into<String>) -> Self {
        Self {
            pos,
            lemma: lemma.into(),
            particle: false,
            possessive: false,
        }
    }

    fn is_to_marker(&self) -> bool {
        self.pos == Pos::Part && self.lemma == "to"
    }

    fn is_negation(&self) -> bool {
        self.pos == Pos::Part && self.lemma == "not"
    }
}

fn is_punct_char(c: char) -> bool {
    c.is_ascii_punctuation()
}

fn push_word<'a>(out: &mut Vec<Word<'a>>, text: &'a str, idx: usize, punct: bool) {
    out.push(Word {
        text,
        lower: text.to_lowercase(),
        idx,
        punct,
    });
}

fn push_punct<'a>(out: &mut Vec<Word<'a>>, text: &'a str, range: std::ops::Range<usize>) {
    for (offset, c) in text[range.clone()].char_indices() {
        let at = range.start + offset;
        push_word(out, &text[at..at + c.len_utf8()], at, true);
    }
}

fn split_chunk<'a>(out: &mut Vec<Word<'a>>, text: &'a str, start: usize, end: usize) {
    let chunk = &text[start..end];
    let lead = chunk.len() - chunk.trim_start_matches(is_punct_char).len();
    if lead == chunk.len() {
        push_punct(out, text, start..end);
        return;
    }
    let trail = chunk.len() - chunk.trim_end_matches(is_punct_char).len();
    let core_start = start + lead;
    let core_end = end - trail;

    push_punct(out, text, start..core_start);
    push_word(out, &text[core_start..core_end], core_start, false);
    push_punct(out, text, core_end..end);
}

/// Split on whitespace, then peel leading and trailing punctuation off
/// each chunk. Apostrophes and hyphens inside words are kept.
fn tokenize(text: &str) -> Vec<Word<'_>> {
    let mut words = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                split_chunk(&mut words, text, s, i);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        split_chunk(&mut words, text, s, text.len());
    }

    words
}

fn is_adverb(w: &str) -> bool {
    contains(ADVERBS, w) || (w.len() > 4 && w.ends_with("ly") && !contains(LY_NON_ADVERBS, w))
}

fn assign(heads: &mut [Option<usize>], deps: &mut [Dep], i: usize, head: usize, dep: Dep) {
    if heads[i].is_none() && i != head {
        heads[i] = Some(head);
        deps[i] = dep;
    }
}

// ============================================================================
// Rule Parser
// ============================================================================

/// Deterministic parser for user-story sentences.
#[derive(Debug, Clone, Default)]
pub struct RuleParser;

impl RuleParser {
    pub fn new() -> Self {
        Self
    }

    fn tag(&self, words: &[Word<'_>]) -> Vec<Tagged> {
        let mut tags: Vec<Tagged> = Vec::with_capacity(words.len());
        // Index of the first word of the clause being tagged.
        let mut clause_start = 0;

        for (i, word) in words.iter().enumerate() {
            let w = word.lower.as_str();
            let prev = if i > 0 { tags.get(i - 1) } else { None };
            let prev_word = if i > 0 { words.get(i - 1) } else { None };
            let next = words.get(i + 1).filter(|n| !n.punct);
            let first_word = words[..i].iter().all(|p| p.punct);

            let tagged = if word.punct {
                Tagged::new(Pos::Punct, word.text)
            } else if w.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
                Tagged::new(Pos::Num, w)
            } else if contains(NEGATIONS, w) {
                Tagged::new(Pos::Part, "not")
            } else if w == "to" {
                if self.to_introduces_verb(prev, next) {
                    Tagged::new(Pos::Part, "to")
                } else {
                    Tagged::new(Pos::Adp, "to")
                }
            } else if w == "that" {
                let after_so = prev_word.is_some_and(|p| p.lower == "so" || p.lower == "such");
                if after_so || prev.is_some_and(|p| p.pos == Pos::Verb) {
                    Tagged::new(Pos::SConj, "that")
                } else if next.is_some_and(|n| known_verb(&n.lower).is_none()) {
                    Tagged::new(Pos::Det, "that")
                } else {
                    Tagged::new(Pos::Pron, "that")
                }
            } else if w == "so" {
                let opens_clause = next.is_some_and(|n| {
                    n.lower == "that" || contains(SUBJECT_PRONOUNS, &n.lower)
                });
                if opens_clause {
                    Tagged::new(Pos::SConj, "so")
                } else {
                    Tagged::new(Pos::Adv, "so")
                }
            } else if w == "as" {
                Tagged::new(Pos::Adp, "as")
            } else if w == "do" && prev.is_some_and(Tagged::is_to_marker) {
                Tagged::new(Pos::Verb, "do")
            } else if contains(AUXILIARIES, w) {
                let lemma = lookup(IRREGULAR_VERBS, w).unwrap_or(w);
                Tagged::new(Pos::Aux, lemma)
            } else if contains(SUBJECT_PRONOUNS, w) || contains(PRONOUNS, w) {
                Tagged::new(Pos::Pron, lookup(IRREGULAR_NOUNS, w).unwrap_or(w))
            } else if contains(POSSESSIVES, w) {
                let mut tagged = Tagged::new(Pos::Pron, w);
                tagged.possessive = true;
                tagged
            } else if contains(DETERMINERS, w) {
                Tagged::new(Pos::Det, w)
            } else if contains(COORDINATORS, w) {
                Tagged::new(Pos::CConj, w)
            } else if contains(SUBORDINATORS, w) {
                Tagged::new(Pos::SConj, w)
            } else if !is_adverb(w)
                && (w == "like" || !contains(PREPOSITIONS, w))
                && self.in_verb_position(i, w, &tags, words, clause_start)
            {
                if contains(ADJECTIVES, w) && prev.is_some_and(|p| p.lemma == "be") {
                    Tagged::new(Pos::Adj, w)
                } else {
                    Tagged::new(Pos::Verb, verb_lemma(w))
                }
            } else if self.is_particle(w, prev, next) {
                let mut tagged = Tagged::new(Pos::Adp, w);
                tagged.particle = true;
                tagged
            } else if contains(PREPOSITIONS, w) {
                Tagged::new(Pos::Adp, w)
            } else if is_adverb(w) {
                Tagged::new(Pos::Adv, w)
            } else if contains(ADJECTIVES, w) {
                Tagged::new(Pos::Adj, w)
            } else if first_word && known_verb(w).is_some() {
                Tagged::new(Pos::Verb, verb_lemma(w))
            } else if !first_word && word.text.chars().next().is_some_and(char::is_uppercase) {
                Tagged::new(Pos::PropN, w)
            } else {
                Tagged::new(Pos::Noun, noun_lemma(w))
            };

            if tagged.pos == Pos::SConj && prev.map_or(true, |p| p.pos != Pos::SConj) {
                clause_start = i;
            }
            tags.push(tagged);
        }

        tags
    }

    fn to_introduces_verb(&self, prev: Option<&Tagged>, next: Option<&Word<'_>>) -> bool {
        let Some(next) = next else {
            return false;
        };
        let n = next.lower.as_str();
        if contains(VERBS, n) || n == "be" {
            return true;
        }
        let closed = contains(DETERMINERS, n)
            || contains(POSSESSIVES, n)
            || contains(SUBJECT_PRONOUNS, n)
            || contains(PRONOUNS, n)
            || contains(PREPOSITIONS, n)
            || contains(ADJECTIVES, n)
            || n.chars().all(|c| c.is_ascii_digit())
            || next.text.chars().next().is_some_and(char::is_uppercase);
        !closed && prev.is_some_and(|p| matches!(p.pos, Pos::Verb | Pos::Adj | Pos::Aux))
    }

    fn is_particle(&self, w: &str, prev: Option<&Tagged>, next: Option<&Word<'_>>) -> bool {
        let Some(prev) = prev else {
            return false;
        };
        if prev.pos != Pos::Verb || !contains(PARTICLES, w) {
            return false;
        }
        if PHRASAL_VERBS.iter().any(|(v, p)| *v == prev.lemma && *p == w) {
            return true;
        }
        match next {
            None => true,
            Some(n) => {
                let n = n.lower.as_str();
                contains(PREPOSITIONS, n)
                    || n == "to"
                    || contains(COORDINATORS, n)
                    || contains(SUBORDINATORS, n)
                    || n == "so"
            }
        }
    }

    fn in_verb_position(
        &self,
        i: usize,
        w: &str,
        tags: &[Tagged],
        words: &[Word<'_>],
        clause_start: usize,
    ) -> bool {
        let Some(prev) = i.checked_sub(1).and_then(|p| tags.get(p)) else {
            return false;
        };
        // A subject pronoun opens a verb unless it is itself an object.
        let opens_verb = |at: usize| {
            let t = &tags[at];
            let object_position = at
                .checked_sub(1)
                .is_some_and(|b| matches!(tags[b].pos, Pos::Verb | Pos::Adp));
            t.is_to_marker()
                || t.pos == Pos::Aux
                || (t.pos == Pos::Pron
                    && !t.possessive
                    && contains(SUBJECT_PRONOUNS, &words[at].lower)
                    && !object_position)
        };

        if opens_verb(i - 1) {
            return true;
        }
        if (prev.pos == Pos::Adv || prev.is_negation()) && i >= 2 && opens_verb(i - 2) {
            return true;
        }

        let clause = &tags[clause_start.min(i)..i];
        let verb_in_clause = clause.iter().any(|t| t.pos == Pos::Verb);

        if prev.pos == Pos::CConj && verb_in_clause && contains(VERBS, w) {
            let before = i.checked_sub(2).and_then(|p| tags.get(p));
            let next_opens_np = words.get(i + 1).is_some_and(|n| {
                contains(DETERMINERS, &n.lower)
                    || contains(POSSESSIVES, &n.lower)
                    || contains(PRONOUNS, &n.lower)
            });
            if before.is_some_and(|b| b.pos == Pos::Verb || b.particle) || next_opens_np {
                return true;
            }
        }

        if !prev.pos.is_nominal() || verb_in_clause {
            return false;
        }

        // "the shop stays safe", "customers stay informed": a finite verb
        // right after the clause subject.
        let third_person = w.len() > 3
            && w.ends_with('s')
            && !w.ends_with("ss")
            && known_verb(w).is_some_and(|lemma| lemma != w);
        let plural_subject = contains(VERBS, w) && words[i - 1].lower.ends_with('s');
        third_person || plural_subject
    }

    fn attach(&self, tags: &[Tagged]) -> Vec<(usize, Dep)> {
        let n = tags.len();
        let mut heads: Vec<Option<usize>> = vec![None; n];
        let mut deps: Vec<Dep> = vec![Dep::Dep; n];
        if n == 0 {
            return Vec::new();
        }

        // Clauses open at the first subordinator of a run.
        let mut clause_of = vec![0usize; n];
        let mut clause = 0;
        for i in 0..n {
            if i > 0 && tags[i].pos == Pos::SConj && tags[i - 1].pos != Pos::SConj {
                clause += 1;
            }
            clause_of[i] = clause;
        }
        let clause_count = clause + 1;

        let mut clause_heads: Vec<Option<usize>> = vec![None; clause_count];
        for i in 0..n {
            if tags[i].pos == Pos::Verb && clause_heads[clause_of[i]].is_none() {
                clause_heads[clause_of[i]] = Some(i);
            }
        }

        let root = clause_heads[0]
            .or_else(|| clause_heads.iter().flatten().next().copied())
            .or_else(|| (0..n).find(|&i| tags[i].pos.is_nominal()))
            .or_else(|| (0..n).find(|&i| tags[i].pos != Pos::Punct))
            .unwrap_or(0);
        heads[root] = Some(root);
        deps[root] = Dep::Root;

        let same_clause = |a: usize, b: usize| clause_of[a] == clause_of[b];
        let prev_matching = |from: usize, pred: &dyn Fn(&Tagged) -> bool| -> Option<usize> {
            (0..from).rev().take_while(|&j| same_clause(j, from)).find(|&j| pred(&tags[j]))
        };
        let next_matching = |from: usize, pred: &dyn Fn(&Tagged) -> bool| -> Option<usize> {
            (from + 1..n).take_while(|&j| same_clause(j, from)).find(|&j| pred(&tags[j]))
        };

        // Subordinate clause heads hang off the root.
        for head in clause_heads.iter().skip(1).flatten() {
            assign(&mut heads, &mut deps, *head, root, Dep::Advcl);
        }

        // Verb chains.
        for v in 0..n {
            if tags[v].pos != Pos::Verb || heads[v].is_some() {
                continue;
            }
            let p = (0..v)
                .rev()
                .find(|&j| tags[j].pos != Pos::Adv && !tags[j].is_negation());
            let governor = match p {
                Some(p) if tags[p].is_to_marker() => {
                    prev_matching(p, &|t: &Tagged| matches!(t.pos, Pos::Verb | Pos::Adj))
                        .map(|j| (j, Dep::Xcomp))
                }
                Some(p) if tags[p].pos == Pos::CConj => {
                    prev_matching(v, &|t: &Tagged| t.pos == Pos::Verb).map(|mut j| {
                        while deps[j] == Dep::Conj {
                            match heads[j] {
                                Some(h) => j = h,
                                None => break,
                            }
                        }
                        (j, Dep::Conj)
                    })
                }
                _ => prev_matching(v, &|t: &Tagged| t.pos == Pos::Verb).map(|j| (j, Dep::Ccomp)),
            };
            let (head, dep) = governor.unwrap_or_else(|| {
                (clause_heads[clause_of[v]].unwrap_or(root), Dep::Dep)
            });
            let head = if head == v { root } else { head };
            assign(&mut heads, &mut deps, v, head, dep);
        }

        // Auxiliaries, infinitival "to", negation and clause marks look right.
        for i in 0..n {
            let t = &tags[i];
            let dep = if t.is_negation() {
                Dep::Neg
            } else if t.pos == Pos::Aux || t.is_to_marker() {
                Dep::Aux
            } else if t.pos == Pos::SConj {
                Dep::Mark
            } else {
                continue;
            };
            let head = next_matching(i, &|t: &Tagged| matches!(t.pos, Pos::Verb | Pos::Adj))
                .unwrap_or(root);
            assign(&mut heads, &mut deps, i, head, dep);
        }

        // Particles attach to the verb before them.
        for i in 1..n {
            if tags[i].particle {
                assign(&mut heads, &mut deps, i, i - 1, Dep::Prt);
            }
        }

        // Noun chunks.
        let mut chunks: Vec<(usize, usize)> = Vec::new();
        let mut i = 0;
        while i < n {
            let t = &tags[i];
            let opens = matches!(t.pos, Pos::Det | Pos::Adj | Pos::Num)
                || t.pos.is_nominal()
                || t.possessive;
            if t.pos == Pos::Pron && !t.possessive {
                chunks.push((i, i));
                i += 1;
                continue;
            }
            if !opens || heads[i].is_some() {
                i += 1;
                continue;
            }
            let mut j = i;
            while j < n
                && heads[j].is_none()
                && (matches!(tags[j].pos, Pos::Det | Pos::Adj | Pos::Num) || tags[j].possessive)
            {
                j += 1;
            }
            let mut k = j;
            while k < n && heads[k].is_none() && tags[k].pos.is_nominal() {
                k += 1;
            }
            if k > j {
                chunks.push((i, k - 1));
                i = k;
            } else if j > i && tags[j - 1].pos == Pos::Det {
                chunks.push((i, j - 1));
                i = j;
            } else {
                i = j.max(i + 1);
            }
        }

        for &(start, head) in &chunks {
            for m in start..head {
                let dep = if tags[m].possessive {
                    Dep::Poss
                } else {
                    match tags[m].pos {
                        Pos::Det => Dep::Det,
                        Pos::Adj => Dep::Amod,
                        Pos::Num => Dep::Nummod,
                        _ => Dep::Compound,
                    }
                };
                assign(&mut heads, &mut deps, m, head, dep);
            }
        }

        let chunk_head_at = |j: usize| chunks.iter().find(|(_, h)| *h == j).map(|(_, h)| *h);

        for &(start, head) in &chunks {
            let before = start.checked_sub(1);

            if let Some(b) = before.filter(|&b| tags[b].pos == Pos::Adp && !tags[b].particle) {
                assign(&mut heads, &mut deps, head, b, Dep::Pobj);
                continue;
            }

            if let Some(b) = before.filter(|&b| tags[b].pos == Pos::CConj) {
                let conjunct = b.checked_sub(1).and_then(chunk_head_at);
                if let Some(mut first) = conjunct {
                    while deps[first] == Dep::Conj {
                        match heads[first] {
                            Some(h) => first = h,
                            None => break,
                        }
                    }
                    assign(&mut heads, &mut deps, head, first, Dep::Conj);
                    assign(&mut heads, &mut deps, b, first, Dep::Cc);
                    continue;
                }
            }

            let verb_before = prev_matching(start, &|t: &Tagged| t.pos == Pos::Verb);
            if verb_before.is_none() {
                let governor = (head + 1..n)
                    .take_while(|&j| same_clause(j, head))
                    .find(|&j| {
                        !(tags[j].pos == Pos::Aux
                            || tags[j].pos == Pos::Adv
                            || tags[j].is_negation())
                    })
                    .filter(|&j| matches!(tags[j].pos, Pos::Verb | Pos::Adj));
                if let Some(g) = governor {
                    let passive = (head + 1..g).any(|j| tags[j].lemma == "be")
                        && tags[g].pos == Pos::Verb
                        && (head + 1..g).all(|j| tags[j].pos != Pos::Adj);
                    let dep = if passive { Dep::NsubjPass } else { Dep::Nsubj };
                    assign(&mut heads, &mut deps, head, g, dep);
                    continue;
                }
            }

            let mut b = before;
            while let Some(j) = b {
                if tags[j].pos == Pos::Adv || tags[j].particle {
                    b = j.checked_sub(1);
                } else {
                    break;
                }
            }
            if let Some(v) = b.filter(|&j| tags[j].pos == Pos::Verb) {
                assign(&mut heads, &mut deps, head, v, Dep::Dobj);
                continue;
            }

            let (fallback, dep) = match verb_before {
                Some(v) => (v, Dep::Dobj),
                None => (clause_heads[clause_of[head]].unwrap_or(root), Dep::Dep),
            };
            assign(&mut heads, &mut deps, head, fallback, dep);
        }

        // Prepositions attach left, skipping adverbs and particles.
        for i in 0..n {
            if tags[i].pos != Pos::Adp || tags[i].particle || heads[i].is_some() {
                continue;
            }
            let mut j = i.checked_sub(1);
            while let Some(k) = j {
                if tags[k].pos == Pos::Adv || tags[k].particle {
                    match heads[k] {
                        Some(h) if tags[k].particle => {
                            j = Some(h);
                            break;
                        }
                        _ => j = k.checked_sub(1),
                    }
                } else {
                    break;
                }
            }
            let head = match j {
                Some(k) if tags[k].pos.is_nominal() || tags[k].pos == Pos::Pron => k,
                Some(k) if tags[k].pos == Pos::Verb => k,
                Some(_) => prev_matching(i, &|t: &Tagged| t.pos == Pos::Verb).unwrap_or(root),
                None => root,
            };
            assign(&mut heads, &mut deps, i, head, Dep::Prep);
        }

        for i in 0..n {
            if heads[i].is_some() {
                continue;
            }
            let (head, dep) = match tags[i].pos {
                Pos::Adv => {
                    let next = (i + 1 < n && matches!(tags[i + 1].pos, Pos::Verb | Pos::Adj))
                        .then_some(i + 1);
                    let head = next
                        .or_else(|| prev_matching(i, &|t: &Tagged| t.pos == Pos::Verb))
                        .unwrap_or(root);
                    (head, Dep::Advmod)
                }
                Pos::Adj => (
                    prev_matching(i, &|t: &Tagged| t.pos == Pos::Verb).unwrap_or(root),
                    Dep::Acomp,
                ),
                Pos::CConj => (
                    prev_matching(i, &|t: &Tagged| t.pos == Pos::Verb).unwrap_or(root),
                    Dep::Cc,
                ),
                Pos::Punct => (root, Dep::Punct),
                _ => (root, Dep::Dep),
            };
            assign(&mut heads, &mut deps, i, head, dep);
        }

        heads
            .into_iter()
            .zip(deps)
            .map(|(head, dep)| (head.unwrap_or(root), dep))
            .collect()
    }
}

impl LanguageParser for RuleParser {
    fn name(&self) -> &str {
        "rules"
    }

    fn parse(&self, text: &str) -> Result<ParsedDoc> {
        let words = tokenize(text);
        let tags = self.tag(&words);
        let attached = self.attach(&tags);

        let tokens = words
            .iter()
            .zip(tags)
            .zip(attached)
            .enumerate()
            .map(|(i, ((word, tagged), (head, dep)))| Token {
                i,
                idx: word.idx,
                text: word.text.to_string(),
                lemma: tagged.lemma,
                pos: tagged.pos,
                dep,
                head,
            })
            .collect();

        ParsedDoc::new(text, tokens)
    }

    fn similarity(&self, a: &str, b: &str) -> f32 {
        let a = noun_lemma(&a.trim().to_lowercase());
        let b = noun_lemma(&b.trim().to_lowercase());
        if !a.is_empty() && a == b {
            1.0
        } else {
            0.0
        }
    }

    fn is_reentrant(&self) -> bool {
        true
    }
}
