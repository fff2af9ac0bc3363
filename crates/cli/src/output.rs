//! Rendering of sweep results.
//!
//! Reports go to stdout; failures are printed to stderr as diagnostics.

use clap::ValueEnum;
use serde::Deserialize;
use serde_json::{Value, json};
use snapbench::{ConfigOutcome, ConfigReport, Error, ExtractSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Header line plus one `metric - p50 - p90` line per metric
    #[default]
    Text,
    /// One JSON object per configuration
    Json,
}

pub fn print_outcome(outcome: &ConfigOutcome, format: OutputFormat) {
    match &outcome.result {
        Ok(run) => {
            print_malformed(&run.extract);
            match format {
                OutputFormat::Text => print!("{}", run.report),
                OutputFormat::Json => {
                    let mut value = report_json(&run.report, &run.extract);
                    value["run_id"] = json!(outcome.run_id.to_string());
                    value["elapsed_ms"] = json!(run.elapsed.as_millis() as u64);
                    println!("{value}");
                }
            }
        }
        Err(e) => {
            eprintln!("{}", failure_line(outcome, e));
            if format == OutputFormat::Json {
                println!("{}", failure_json(outcome, e));
            }
        }
    }
}

fn failure_line(outcome: &ConfigOutcome, error: &Error) -> String {
    format!(
        "FAILED for {} VCPUs and {} MEM_SIZE: {error}",
        outcome.config.vcpu_count(),
        outcome.config.memory_size_mib()
    )
}

fn failure_json(outcome: &ConfigOutcome, error: &Error) -> Value {
    json!({
        "run_id": outcome.run_id.to_string(),
        "config": outcome.config,
        "status": "failed",
        "error": error.to_string(),
    })
}

pub fn print_report(report: &ConfigReport, extract: &ExtractSummary, format: OutputFormat) {
    print_malformed(extract);
    match format {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => println!("{}", report_json(report, extract)),
    }
}

fn print_malformed(extract: &ExtractSummary) {
    for malformed in &extract.malformed {
        eprintln!("warning: {malformed}");
    }
}

fn report_json(report: &ConfigReport, extract: &ExtractSummary) -> Value {
    json!({
        "config": report.config,
        "status": "ok",
        "metrics": report.metrics,
        "markers": extract.matched,
        "malformed": extract.malformed.len(),
    })
}
