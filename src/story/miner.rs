//! Linguistic miner: fills the story model from a dependency parse.
//!
//! Tokens belong to a segment when their byte offset falls inside the
//! segment content. The miner never fails; constituents it cannot find
//! stay empty.

use super::{
    Compound, FreeFormPart, MinedStory, NounPhrase, PhrasalVerb, PhraseType, RolePart, Segment,
    StructuredStory, WithPhrase,
};
use crate::parser::{Dep, ParsedDoc, Pos, Token};
use crate::stats::StoryStatistics;

/// Extracts syntactic constituents per segment.
#[derive(Debug, Clone, Default)]
pub struct Miner;

impl Miner {
    pub fn new() -> Self {
        Self
    }

    /// Mine a structured story against the parse of its sentence.
    pub fn mine(&self, story: StructuredStory, doc: &ParsedDoc, system: Token) -> MinedStory {
        let role = self.mine_role(&story.role, doc);
        let means = self.mine_free_form(&story.means, doc, &role.functional_role);
        let ends = story
            .ends
            .as_ref()
            .map(|segment| self.mine_free_form(segment, doc, &role.functional_role));

        tracing::trace!(
            story = story.raw.number,
            role = role.functional_role.lemma().unwrap_or("-"),
            verb = means.main_verb.lemma().unwrap_or("-"),
            object = means.main_object.lemma().unwrap_or("-"),
            "Mined story"
        );

        MinedStory {
            number: story.raw.number,
            text: story.raw.text,
            sentence: story.raw.sentence,
            iloc: story.iloc,
            role,
            means,
            ends,
            system,
            stats: StoryStatistics::default(),
        }
    }

    fn mine_role(&self, segment: &Segment, doc: &ParsedDoc) -> RolePart {
        let content: Vec<&Token> = doc.tokens_in(segment.content.clone()).collect();
        let mut functional_role = WithPhrase::new(PhraseType::Agent);

        let head = content
            .iter()
            .find(|t| t.pos.is_nominal() && t.dep != Dep::Compound)
            .or_else(|| content.iter().rev().find(|t| t.pos.is_nominal()))
            .copied();

        if let Some(head) = head {
            functional_role.set_main(head.clone());
            for child in doc.children(head.i).filter(|c| segment.contains(c)) {
                match child.dep {
                    Dep::Compound => functional_role.add_compound(child.clone()),
                    Dep::Amod => functional_role.add_phrase(child.clone()),
                    _ => {}
                }
            }
        }

        let nouns = content
            .iter()
            .filter(|t| t.pos.is_nominal())
            .map(|t| (*t).clone())
            .collect();

        RolePart {
            segment: segment.clone(),
            functional_role,
            nouns,
        }
    }

    fn mine_free_form(&self, segment: &Segment, doc: &ParsedDoc, role: &WithPhrase) -> FreeFormPart {
        let mut part = FreeFormPart::new(segment.clone());
        let content: Vec<&Token> = doc.tokens_in(segment.content.clone()).collect();
        let inside = |t: &Token| segment.contains(t);

        for token in &content {
            match token.pos {
                Pos::Verb => part.verbs.push((*token).clone()),
                Pos::Noun => part.nouns.push((*token).clone()),
                Pos::PropN => part.proper_nouns.push((*token).clone()),
                _ => {}
            }
        }

        // Main verb: first verb among the local roots of the segment.
        let is_local_root = |t: &Token| {
            t.dep == Dep::Root || doc.token(t.head).map_or(true, |h| !inside(h))
        };
        let main_verb = content
            .iter()
            .find(|t| t.pos == Pos::Verb && is_local_root(t))
            .or_else(|| content.iter().find(|t| t.pos == Pos::Verb))
            .copied();

        if let Some(verb) = main_verb {
            part.main_verb.set_main(verb.clone());
            for child in doc.children(verb.i).filter(|c| inside(c)) {
                if child.dep == Dep::Prt {
                    part.main_verb.add_phrase(child.clone());
                }
            }

            let conjoined: Vec<&Token> = doc
                .children(verb.i)
                .filter(|c| inside(c) && c.dep == Dep::Conj && c.pos == Pos::Verb)
                .collect();
            let object = std::iter::once(verb)
                .chain(conjoined)
                .find_map(|v| find_object(doc, v, &inside));

            if let Some((object, preposition)) = object {
                if let Some(preposition) = preposition {
                    part.main_verb.add_phrase(preposition.clone());
                }
                part.main_object.set_main(object.clone());
                for child in doc.children(object.i).filter(|c| inside(c)) {
                    match child.dep {
                        Dep::Compound => part.main_object.add_compound(child.clone()),
                        Dep::Amod => part.main_object.add_phrase(child.clone()),
                        _ => {}
                    }
                }
            }

            let subject = doc
                .children(verb.i)
                .find(|c| inside(c) && c.dep.is_subject());
            if let Some(subject) = subject {
                part.subject.set_main(subject.clone());
                for child in doc.children(subject.i).filter(|c| inside(c)) {
                    match child.dep {
                        Dep::Compound => part.subject.add_compound(child.clone()),
                        Dep::Amod => part.subject.add_phrase(child.clone()),
                        _ => {}
                    }
                }
            }
        }

        if part.subject.main.is_none() {
            part.subject = role.retyped(PhraseType::Agent);
        }

        for verb in &part.verbs {
            for child in doc.children(verb.i).filter(|c| inside(c) && c.dep == Dep::Prt) {
                part.phrasal_verbs.push(PhrasalVerb {
                    verb: verb.clone(),
                    particle: child.clone(),
                });
            }
        }

        for token in content.iter().filter(|t| t.pos.is_nominal()) {
            if token.dep == Dep::Compound {
                if let Some(head) = doc.token(token.head).filter(|h| inside(h)) {
                    part.compounds.push(Compound {
                        modifier: (*token).clone(),
                        head: head.clone(),
                    });
                }
                continue;
            }

            let modifiers: Vec<&Token> = doc
                .children(token.i)
                .filter(|c| {
                    inside(c)
                        && matches!(
                            c.dep,
                            Dep::Det | Dep::Amod | Dep::Compound | Dep::Poss | Dep::Nummod
                        )
                })
                .collect();
            if !modifiers.is_empty() {
                let mut tokens: Vec<Token> = modifiers.into_iter().cloned().collect();
                tokens.push((*token).clone());
                tokens.sort_by_key(|t| t.i);
                part.noun_phrases.push(NounPhrase {
                    head: (*token).clone(),
                    tokens,
                });
            }
        }

        part
    }
}

/// Direct object of `verb`, else a prepositional object reached through one
/// of its `prep` children (returned alongside the preposition).
fn find_object<'a>(
    doc: &'a ParsedDoc,
    verb: &Token,
    inside: &dyn Fn(&Token) -> bool,
) -> Option<(&'a Token, Option<&'a Token>)> {
    if let Some(object) = doc
        .children(verb.i)
        .find(|c| inside(c) && c.dep == Dep::Dobj)
    {
        return Some((object, None));
    }

    doc.children(verb.i)
        .filter(|c| inside(c) && c.dep == Dep::Prep)
        .find_map(|prep| {
            doc.children(prep.i)
                .find(|c| inside(c) && c.dep == Dep::Pobj)
                .map(|object| (object, Some(prep)))
        })
}
