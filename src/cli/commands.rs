//! CLI command runner.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use narrator::{read_stories, Config, LanguageParser, Narrator, PreparsedParser, RuleParser};

use super::output;

/// Pick the parser backend: annotations from a file with the rule parser
/// as fallback, or the rule parser alone.
fn build_parser(parses: Option<&Path>) -> Result<Arc<dyn LanguageParser>> {
    let rules: Arc<dyn LanguageParser> = Arc::new(RuleParser::new());
    match parses {
        Some(path) => {
            let parser = PreparsedParser::from_file(path)
                .with_context(|| format!("loading parses from {}", path.display()))?
                .with_fallback(rules);
            Ok(Arc::new(parser))
        }
        None => Ok(rules),
    }
}

/// Mine a corpus and generate its conceptual model.
pub async fn run_generate(
    config: Config,
    input: &Path,
    parses: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<()> {
    let stories = read_stories(input)
        .with_context(|| format!("reading stories from {}", input.display()))?;
    let parser = build_parser(parses)?;
    let narrator = Narrator::new(config.clone(), parser);

    let report = narrator.run(stories).await?;
    let out = &config.output;

    if out.print_stories {
        output::print_stories(&report.mined);
    }
    if out.json {
        output::print_story_json(&report.stories)?;
    }
    if out.print_ontology {
        output::print_ontology(&report.system_name, &report.ontology);
        for (role, ontology) in &report.per_role_ontologies {
            output::print_ontology(&format!("{} ({})", report.system_name, role), ontology);
        }
    }
    if let Some(prolog) = &report.prolog {
        output::print_prolog(prolog);
    }
    if out.statistics {
        output::print_statistics(&report.statistics, &report.matrix);
    }
    output::print_failures(&report.failures);
    output::print_summary(&report);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    Ok(())
}
