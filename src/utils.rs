//! Text helpers shared by the pipeline stages.

/// Strip punctuation from a story line.
///
/// Apostrophes and hyphens survive when they sit between two word
/// characters ("i'd", "e-mail"); every other punctuation character is
/// replaced by a space.
pub fn remove_punct(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_punctuation() {
            out.push(c);
            continue;
        }
        let inner = matches!(c, '\'' | '-')
            && i > 0
            && chars[i - 1].is_alphanumeric()
            && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
        out.push(if inner { c } else { ' ' });
    }

    out
}

/// Collapse whitespace runs into single spaces and trim the ends.
#[inline]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Label used for a story in exports and linked ontologies.
#[inline]
pub fn story_label(number: usize) -> String {
    format!("US{number}")
}

/// Render story numbers as `US1, US4, US7`.
pub fn occurrence_list<'a>(numbers: impl IntoIterator<Item = &'a usize>) -> String {
    numbers
        .into_iter()
        .map(|n| story_label(*n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_punct() {
        assert_eq!(
            normalize_whitespace(&remove_punct("As a user, I'd like to e-mail (quickly)!")),
            "As a user I'd like to e-mail quickly"
        );
        assert_eq!(remove_punct("'quoted'"), " quoted ");
        assert_eq!(remove_punct("- item"), "  item");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \t b\n c  "), "a b c");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_story_labels() {
        assert_eq!(story_label(3), "US3");
        let numbers = std::collections::BTreeSet::from([7, 1, 4]);
        assert_eq!(occurrence_list(&numbers), "US1, US4, US7");
        assert_eq!(occurrence_list(&Vec::<usize>::new()), "");
    }
}
