//! Story corpus input.
//!
//! One story per line. Blank lines and lines starting with `#` are skipped;
//! story numbers count the stories that remain, starting at 1.

use std::path::Path;

use crate::error::Result;
use crate::story::RawStory;

/// Read a corpus file.
pub fn read_stories(path: impl AsRef<Path>) -> Result<Vec<RawStory>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let stories = parse_stories(&content);
    tracing::info!("Read {} stories from {}", stories.len(), path.display());
    Ok(stories)
}

/// Split corpus text into numbered stories.
pub fn parse_stories(content: &str) -> Vec<RawStory> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !is_skipped(line))
        .enumerate()
        .map(|(i, line)| RawStory::new(i + 1, line))
        .collect()
}

fn is_skipped(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}
