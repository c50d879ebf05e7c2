use std::collections::BTreeMap;

use colored::Colorize;
use comfy_table::{Cell, ContentArrangement, Table, presets};
use serde_json::{Map, Value};
use similar::{ChangeTag, TextDiff};

use crate::mutate::{MUTATE_ORDER, MutatePipeline, RunStats};

/// Computes a colored line diff between a record before and after
/// mutation, or `None` when nothing changed.
pub fn render_record_diff(
    original: &Map<String, Value>,
    mutated: &Map<String, Value>,
) -> Option<String> {
    if original == mutated {
        return None;
    }

    let before = pretty_json(original);
    let after = pretty_json(mutated);
    let diff = TextDiff::from_lines(&before, &after);

    let mut result = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => result.push_str(&format!("{}", format!("-{change}").red())),
            ChangeTag::Insert => result.push_str(&format!("{}", format!("+{change}").green())),
            ChangeTag::Equal => result.push_str(&format!(" {change}")),
        }
    }
    Some(result)
}

/// Prints one record's diff under a numbered header.
pub fn print_record_diff(record_number: usize, diff: &str) {
    println!("{}", format!("record {record_number}").bold());
    print!("{diff}");
}

fn pretty_json(record: &Map<String, Value>) -> String {
    serde_json::to_string_pretty(record).unwrap_or_default()
}

fn create_styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.to_vec());
    table
}

/// Prints the compiled pipeline in evaluation order, one row per action
/// with the number of field entries it touches.
pub fn print_pipeline_summary(pipeline: &MutatePipeline) {
    let mut table = create_styled_table(&["#", "Action", "Fields"]);
    for (position, action) in pipeline.actions().iter().enumerate() {
        table.add_row(vec![
            Cell::new(position + 1),
            Cell::new(action.kind().name()),
            Cell::new(action.field_count()),
        ]);
    }
    println!("{table}");
}

/// Prints the per-run summary to stderr so piped record output stays
/// clean.
pub fn print_run_summary(pipeline: &MutatePipeline, stats: &RunStats) {
    let mut configured: BTreeMap<&'static str, usize> = BTreeMap::new();
    for action in pipeline.actions() {
        *configured.entry(action.kind().name()).or_insert(0) += 1;
    }

    eprintln!("\n{}", "MUTATION SUMMARY".bold());
    eprintln!("{}", "-".repeat(60).bright_black());

    let mut table = create_styled_table(&["Action", "Configured", "Failed runs"]);
    for kind in MUTATE_ORDER {
        let Some(count) = configured.get(kind.name()) else {
            continue;
        };
        let failed = stats
            .failures_by_kind
            .get(kind.name())
            .copied()
            .unwrap_or(0);
        table.add_row(vec![
            Cell::new(kind.name()),
            Cell::new(*count),
            Cell::new(failed),
        ]);
    }
    eprintln!("{table}");

    eprintln!(
        "Records processed: {}",
        stats.records.to_string().green().bold()
    );
    if stats.failed_actions > 0 {
        eprintln!(
            "Failed actions:    {}",
            stats.failed_actions.to_string().red().bold()
        );
    }
    if stats.emptied_records > 0 {
        eprintln!(
            "Records emptied:   {}",
            stats.emptied_records.to_string().yellow()
        );
    }
}
