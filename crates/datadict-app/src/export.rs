// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};

use crate::DataDictionary;

/// Examples column in the Markdown table shows at most this many values.
const MARKDOWN_EXAMPLE_LIMIT: usize = 2;

/// Pretty-printed JSON (2-space indent) of the whole dictionary, as handed to
/// the clipboard.
pub fn dictionary_json(dictionary: &DataDictionary) -> Result<String> {
    serde_json::to_string_pretty(dictionary).context("encode dictionary as JSON")
}

/// Markdown rendering of a dictionary: title, summary, and one table row per
/// column with constraints and the first two example values comma-joined.
pub fn dictionary_markdown(dictionary: &DataDictionary) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Data Dictionary: {}\n\n", dictionary.table_name));
    out.push_str(&format!("## Summary\n{}\n\n", dictionary.summary));
    out.push_str("## Columns\n\n");
    out.push_str("| Column Name | Data Type | Description | Constraints | Examples |\n");
    out.push_str("| :--- | :--- | :--- | :--- | :--- |\n");
    for column in &dictionary.columns {
        let examples = column
            .example_values
            .iter()
            .take(MARKDOWN_EXAMPLE_LIMIT)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            column.name,
            column.inferred_type,
            column.description,
            column.constraints.join(", "),
            examples,
        ));
    }
    out
}

/// File name for the Markdown export: table name lowercased, whitespace runs
/// collapsed to single underscores, suffixed `_dictionary.md`.
pub fn markdown_file_name(table_name: &str) -> String {
    let mut slug = String::with_capacity(table_name.len());
    let mut in_whitespace = false;
    for ch in table_name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                slug.push('_');
            }
            in_whitespace = true;
        } else {
            for lowered in ch.to_lowercase() {
                slug.push(lowered);
            }
            in_whitespace = false;
        }
    }
    format!("{slug}_dictionary.md")
}
