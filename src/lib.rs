pub mod cli;
pub mod config;
pub mod event;
pub mod mutate;
pub mod report;

use std::io::Read as _;
use std::path::Path;

use serde_json::{Map, Value};

pub use cli::{Cli, ColorMode, Commands, cli_parse};
pub use config::{ConfigError, MutateConfig, MutatorSection, load_config_from_path};
pub use event::MutateEvent;
pub use mutate::{
    Action, ActionKind, MUTATE_ORDER, MutateConfigError, MutateOptions, MutatePipeline, RunStats,
    expand_patterns,
};

fn read_records_input(path: Option<&Path>) -> Result<String, Box<dyn std::error::Error>> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read input file '{}': {}", path.display(), e).into()),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            Ok(buffer)
        }
    }
}

fn parse_record(line: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!(
            "expected a JSON object, got {}",
            crate::mutate::convert::value_kind(&other)
        )),
        Err(e) => Err(e.to_string()),
    }
}

fn write_output_file(path: &Path, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, content)
        .map_err(|e| format!("Failed to write output file '{}': {}", path.display(), e).into())
}

fn init_logging(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn run_apply(
    pipeline: &MutatePipeline,
    input: Option<&Path>,
    tag: &str,
    time: Option<i64>,
    output: Option<&Path>,
    show_diff: bool,
    show_stats: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = read_records_input(input)?;
    let event_time = time.unwrap_or_else(|| chrono::Utc::now().timestamp());

    let mut stats = RunStats::default();
    let mut lines = Vec::new();
    for (number, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        // Bad input lines pass through untouched; the stream must survive
        // them just like a failing action.
        let record = match parse_record(line) {
            Ok(record) => record,
            Err(reason) => {
                log::error!("line {} is not a record, passing through: {reason}", number + 1);
                if !show_diff {
                    lines.push(line.to_string());
                }
                continue;
            }
        };

        let mutated = pipeline.apply_with(record.clone(), event_time, tag, &mut stats);

        if show_diff {
            if let Some(diff) = report::render_record_diff(&record, &mutated) {
                report::print_record_diff(number + 1, &diff);
            }
        } else {
            lines.push(serde_json::to_string(&mutated)?);
        }
    }

    if !show_diff {
        let mut body = lines.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        match output {
            Some(path) => write_output_file(path, &body)?,
            None => print!("{body}"),
        }
    }

    if show_stats {
        report::print_run_summary(pipeline, &stats);
    }

    Ok(())
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = cli_parse();

    // Set up color handling based on user preference
    match cli.color {
        ColorMode::Always => unsafe {
            std::env::set_var("CLICOLOR_FORCE", "1");
        },
        ColorMode::Never => unsafe {
            std::env::set_var("NO_COLOR", "1");
        },
        ColorMode::Auto => {}
    }

    init_logging(cli.verbose, cli.quiet);

    let config = load_config_from_path(&cli.config)
        .map_err(|e| format!("Failed to load config: {}", e))?;
    let pipeline = config
        .build()
        .map_err(|e| format!("Invalid mutate configuration: {}", e))?;

    match &cli.command {
        Commands::Apply {
            input,
            tag,
            time,
            output,
            diff,
            stats,
        } => {
            run_apply(
                &pipeline,
                input.as_deref(),
                tag,
                *time,
                output.as_deref(),
                *diff,
                *stats,
            )?;
        }
        Commands::Check { dump } => {
            if *dump {
                let rendered = toml::to_string_pretty(&config)?;
                print!("{rendered}");
            } else {
                println!(
                    "Configuration OK: {} action(s), expand_nesting={}, prune_empty={}",
                    pipeline.actions().len(),
                    config.expand_nesting,
                    config.prune_empty
                );
                report::print_pipeline_summary(&pipeline);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_accepts_objects() {
        let record = parse_record(r#"{"a": 1}"#).expect("valid record line");
        assert_eq!(record.get("a"), Some(&Value::from(1)));
    }

    #[test]
    fn test_parse_record_rejects_non_objects() {
        let error = parse_record("[1, 2]").expect_err("arrays are not records");
        assert!(error.contains("expected a JSON object"));
        assert!(parse_record("not json").is_err());
    }
}
