//! Output formatting for CLI commands.
//!
//! Human-readable text goes to stdout; JSON exports are pretty-printed.

use anyhow::Result;
use narrator::{
    matrix::TermSummary,
    story::{FreeFormPart, WithPhrase},
    utils::story_label,
    CorpusStatistics, MinedStory, Ontology, Report, StoryExport, StoryFailure,
};

fn phrase(p: &WithPhrase) -> String {
    match (&p.main, p.compound_name()) {
        (Some(_), Some(compound)) => compound,
        (Some(main), None) => {
            let mut words = vec![main.text.clone()];
            words.extend(p.phrase().iter().map(|t| t.text.clone()));
            words.join(" ")
        }
        (None, _) => "-".to_string(),
    }
}

fn words<'a>(tokens: impl IntoIterator<Item = &'a narrator::Token>) -> String {
    let joined: Vec<&str> = tokens.into_iter().map(|t| t.text.as_str()).collect();
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined.join(", ")
    }
}

fn print_free_form(label: &str, part: &FreeFormPart) {
    println!("  {} [{}]: {}", label, part.segment.indicator, part.segment.simplified);
    println!("    Subject:     {}", phrase(&part.subject));
    println!("    Main verb:   {}", phrase(&part.main_verb));
    println!("    Main object: {}", phrase(&part.main_object));
    println!("    Verbs:       {}", words(&part.verbs));
    println!("    Nouns:       {}", words(part.all_nouns()));
    if !part.phrasal_verbs.is_empty() {
        let phrasal: Vec<String> = part
            .phrasal_verbs
            .iter()
            .map(|p| format!("{} {}", p.verb.text, p.particle.text))
            .collect();
        println!("    Phrasal:     {}", phrasal.join(", "));
    }
    if !part.noun_phrases.is_empty() {
        let phrases: Vec<String> = part.noun_phrases.iter().map(|np| np.text()).collect();
        println!("    NPs:         {}", phrases.join(", "));
    }
}

/// Print mined data per story.
pub fn print_stories(stories: &[MinedStory]) {
    for story in stories {
        println!("{}: {}", story.label(), story.text);
        println!("{}", "-".repeat(60));
        println!(
            "  Role [{}]: {}",
            story.role.segment.indicator, story.role.segment.simplified
        );
        println!("    Functional role: {}", phrase(&story.role.functional_role));
        print_free_form("Means", &story.means);
        if let Some(ends) = &story.ends {
            print_free_form("Ends", ends);
        }
        println!();
    }
}

/// Print the story export as JSON.
pub fn print_story_json(stories: &[StoryExport]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(stories)?);
    Ok(())
}

/// Print classes and relationships of one ontology.
pub fn print_ontology(title: &str, ontology: &Ontology) {
    println!("Ontology: {}", title);
    println!("{}", "=".repeat(60));

    if ontology.is_empty() {
        println!("No classes above the threshold.\n");
        return;
    }

    println!("{:<30} {:<20} {:>7}  OCCURS IN", "CLASS", "PARENT", "WEIGHT");
    for class in ontology.classes() {
        let name = if class.is_role {
            format!("{} *", class.name)
        } else {
            class.name.clone()
        };
        println!(
            "{:<30} {:<20} {:>7.2}  {}",
            name,
            class.parent.as_deref().unwrap_or("-"),
            class.weight,
            class.occurs_in()
        );
    }

    println!("\nRelationships:");
    for rel in ontology.relationships() {
        println!("  {} --{}--> {}", rel.domain, rel.name, rel.range);
    }
    println!();
}

/// Print Prolog facts.
pub fn print_prolog(prolog: &str) {
    println!("% Prolog facts");
    print!("{}", prolog);
    println!();
}

/// Print corpus statistics and the term summary.
pub fn print_statistics(stats: &CorpusStatistics, terms: &[TermSummary]) {
    println!("Statistics");
    println!("{}", "=".repeat(40));
    println!("Stories:            {}", stats.total);
    println!("Mined:              {}", stats.succeeded);
    println!("Failed:             {}", stats.failed);
    println!("Success rate:       {:.1}%", stats.success_rate() * 100.0);
    println!("With ends:          {}", stats.with_ends);
    println!("Multi-word roles:   {}", stats.multi_word_roles);
    println!("With main object:   {}", stats.with_main_object);
    println!("With subject:       {}", stats.with_subject);
    println!("With phrasal verb:  {}", stats.with_phrasal_verb);

    if terms.is_empty() {
        return;
    }
    println!(
        "\n{:<24} {:>7} {:>6} {:>5} {:>6} {:>5} {:>8}",
        "TERM", "WEIGHT", "COUNT", "ROLE", "MEANS", "ENDS", "AVG>0"
    );
    for t in terms {
        println!(
            "{:<24} {:>7.2} {:>6} {:>5} {:>6} {:>5} {:>8.2}",
            t.term, t.weight, t.count, t.role, t.means, t.ends, t.row_value_excluding_zero
        );
    }
    println!();
}

/// Print stories that were skipped.
pub fn print_failures(failures: &[StoryFailure]) {
    for failure in failures {
        eprintln!(
            "{} skipped: {} ({})",
            story_label(failure.number),
            failure.reason,
            failure.text
        );
    }
}

/// One-line run summary.
pub fn print_summary(report: &Report) {
    eprintln!(
        "Mined {}/{} stories into {} classes and {} relationships ({}ms)",
        report.statistics.succeeded,
        report.statistics.total,
        report.class_count(),
        report.ontology.relationships().len(),
        report.timings.total_ms
    );
}
