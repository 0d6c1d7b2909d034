//! Prolog fact export.
//!
//! ```prolog
//! class('user account').
//! parent('user account', 'account').
//! relationship('user', 'manage', 'user account').
//! occurs_in('user account', 'US1').
//! ```

use super::types::{Ontology, Relationship, OCCURS_IN};

/// Quote a Prolog atom, doubling embedded single quotes.
fn atom(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

fn relationship_fact(rel: &Relationship) -> String {
    let (domain, range) = (atom(&rel.domain), atom(&rel.range));
    if rel.is_isa() {
        format!("parent({domain}, {range}).")
    } else if rel.name == OCCURS_IN {
        format!("occurs_in({domain}, {range}).")
    } else {
        format!("relationship({domain}, {}, {range}).", atom(&rel.name))
    }
}

/// Render an ontology as Prolog facts, one per line.
pub fn to_prolog(ontology: &Ontology) -> String {
    let classes = ontology
        .classes()
        .map(|class| format!("class({}).", atom(&class.name)));
    let relationships = ontology
        .relationships()
        .iter()
        .filter(|r| ontology.has_class(&r.domain) && ontology.has_class(&r.range))
        .map(relationship_fact);

    let mut out = String::new();
    for fact in classes.chain(relationships) {
        out.push_str(&fact);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::OntologyClass;

    #[test]
    fn test_prolog_facts() {
        let mut ontology = Ontology::new();
        ontology.add_class(OntologyClass::new("account"));
        ontology.add_class(OntologyClass::new("user account").with_parent("account"));
        ontology.add_class(OntologyClass::new("admin"));
        ontology.add_relationship(Relationship::isa("user account", "account"));
        ontology.add_relationship(Relationship::new("admin", "manage", "user account"));

        let prolog = to_prolog(&ontology);
        let lines: Vec<&str> = prolog.lines().collect();
        assert_eq!(
            lines,
            vec![
                "class('account').",
                "class('admin').",
                "class('user account').",
                "parent('user account', 'account').",
                "relationship('admin', 'manage', 'user account').",
            ]
        );
    }

    #[test]
    fn test_atoms_escape_quotes() {
        assert_eq!(atom("o'neil"), "'o''neil'");
    }

    #[test]
    fn test_links_render_as_occurs_in() {
        let mut ontology = Ontology::new();
        ontology.add_class(OntologyClass::new("order"));
        ontology.add_class(OntologyClass::new("US1"));
        ontology.add_relationship(Relationship::new("order", OCCURS_IN, "US1"));

        assert!(to_prolog(&ontology).contains("occurs_in('order', 'US1')."));
    }

    #[test]
    fn test_dangling_relationships_are_skipped() {
        let mut ontology = Ontology::new();
        ontology.add_class(OntologyClass::new("user"));
        ontology.add_relationship(Relationship::new("user", "cancel", "order"));

        assert_eq!(to_prolog(&ontology), "class('user').\n");
    }
}
