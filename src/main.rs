//! vigil - recall-first PII classifier for administrative records

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil::evaluate::{parse_truthy_json, ConfusionMatrix, Metrics};
use vigil::{
    BatchProcessor, BatchReport, EntityModel, ModelOracle, NameOracle, Record, RecordOutcome,
    VigilConfig,
};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Recall-first PII detection for administrative records")]
struct Cli {
    /// Configuration file path (.hcl or .json)
    #[arg(short, long, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify records from a JSON array or JSONL file
    Classify {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Write the full batch report here (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the review queue here (JSON)
        #[arg(short, long)]
        review: Option<PathBuf>,

        /// Skip the name oracle and use the heuristic path
        #[arg(long)]
        no_oracle: bool,

        /// Shell command acting as the entity model (text on stdin, JSON on stdout)
        #[arg(long, env = "VIGIL_ORACLE_CMD")]
        oracle_cmd: Option<String>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries results
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("vigil={}", log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let (mut config, _config_path) =
        VigilConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Classify {
            input,
            output,
            review,
            no_oracle,
            oracle_cmd,
        } => {
            if no_oracle {
                config.oracle.enabled = false;
            }
            let oracle = oracle_cmd.map(|cmd| {
                Arc::new(ModelOracle::new(Box::new(CommandModel::new(cmd))).with_name("command"))
                    as Arc<dyn NameOracle>
            });
            run_classify(&config, oracle, &input, output.as_deref(), review.as_deref()).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// One input line; `contains_pii` is an optional ground-truth label
#[derive(Debug, Deserialize)]
struct InputRecord {
    #[serde(alias = "ID")]
    id: serde_json::Value,
    #[serde(default, alias = "texto", alias = "raw_text")]
    text: Option<String>,
    #[serde(default)]
    contains_pii: Option<serde_json::Value>,
}

impl InputRecord {
    fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

fn read_records(path: &Path) -> Result<Vec<InputRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON array in {}", path.display()));
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid JSON on line {} of {}", n + 1, path.display()))
        })
        .collect()
}

async fn run_classify(
    config: &VigilConfig,
    oracle: Option<Arc<dyn NameOracle>>,
    input: &Path,
    output: Option<&Path>,
    review: Option<&Path>,
) -> Result<()> {
    let inputs = read_records(input)?;
    let labels: HashMap<String, bool> = inputs
        .iter()
        .filter_map(|r| r.contains_pii.as_ref().map(|v| (r.id_string(), parse_truthy_json(v))))
        .collect();
    let records: Vec<Record> = inputs
        .into_iter()
        .map(|r| Record {
            id: r.id_string(),
            raw_text: r.text,
        })
        .collect();

    let processor = BatchProcessor::new(config, oracle).context("Invalid configuration")?;
    let report = processor.run(records).await;

    print_summary(&report);
    if !labels.is_empty() {
        print_metrics(&evaluate_report(&report, &labels));
    }

    if let Some(path) = output {
        write_json(path, &report)?;
        println!("Report written to: {}", path.display());
    }
    if let Some(path) = review {
        write_json(path, &report.review_queue())?;
        println!("Review queue written to: {}", path.display());
    }

    Ok(())
}

fn evaluate_report(report: &BatchReport, labels: &HashMap<String, bool>) -> Metrics {
    ConfusionMatrix::from_pairs(
        report
            .results()
            .filter_map(|r| labels.get(&r.record_id).map(|&actual| (r.contains_pii, actual))),
    )
    .metrics()
}

fn print_summary(report: &BatchReport) {
    for outcome in &report.outcomes {
        match outcome {
            RecordOutcome::Classified { result, .. } if result.contains_pii => {
                let categories: Vec<&str> = result.categories().iter().map(|c| c.as_str()).collect();
                println!(
                    "{}: PII [{}] confidence {:.2}",
                    result.record_id,
                    categories.join(", "),
                    result.overall_confidence
                );
            }
            RecordOutcome::Classified { .. } => {}
            RecordOutcome::Failed { record_id, reason } => {
                println!("{}: FAILED ({})", record_id, reason);
            }
        }
    }

    let s = &report.summary;
    println!();
    println!("Records:          {}", s.total);
    println!("Classified:       {}", s.succeeded);
    println!("Failed:           {}", s.failed);
    println!("With PII:         {}", s.with_pii);
    println!("Oracle fallbacks: {}", s.oracle_fallbacks);
    println!("Review items:     {}", s.review_items);
}

fn print_metrics(m: &Metrics) {
    let c = &m.matrix;
    println!();
    println!("Evaluation ({} labelled records)", c.total());
    println!("  TP {}  FP {}  TN {}  FN {}", c.true_positives, c.false_positives, c.true_negatives, c.false_negatives);
    println!("  Accuracy  {:.4}", m.accuracy);
    println!("  Precision {:.4}", m.precision);
    println!("  Recall    {:.4}", m.recall);
    println!("  F1        {:.4}", m.f1);
    if c.false_negatives > 0 {
        println!("  WARNING: {} false negatives", c.false_negatives);
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn show_config(config: Option<&VigilConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let hcl = hcl::to_string(&config)?;
    println!("{}", hcl);
    Ok(())
}

// ---------------------------------------------------------------------------
// CommandModel - external entity model over a child process
// ---------------------------------------------------------------------------

/// Runs `sh -c <command>` per chunk, feeding the chunk on stdin
struct CommandModel {
    command: String,
}

impl CommandModel {
    fn new(command: String) -> Self {
        Self { command }
    }
}

#[async_trait]
impl EntityModel for CommandModel {
    async fn call(&self, text: &str) -> std::result::Result<String, String> {
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("spawn failed: {}", e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| format!("write failed: {}", e))?;
        }

        let out = child
            .wait_with_output()
            .await
            .map_err(|e| format!("wait failed: {}", e))?;
        if !out.status.success() {
            return Err(format!(
                "exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        String::from_utf8(out.stdout).map_err(|e| format!("non-UTF-8 output: {}", e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_jsonl_and_array() {
        let mut jsonl = tempfile::NamedTempFile::new().unwrap();
        writeln!(jsonl, r#"{{"id": 1, "text": "Meu CPF é 123.456.789-00", "contains_pii": "sim"}}"#).unwrap();
        writeln!(jsonl).unwrap();
        writeln!(jsonl, r#"{{"id": "b"}}"#).unwrap();
        let records = read_records(jsonl.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id_string(), "1");
        assert!(records[1].text.is_none());

        let mut array = tempfile::NamedTempFile::new().unwrap();
        write!(array, r#"[{{"ID": "x", "texto": "ok"}}]"#).unwrap();
        let records = read_records(array.path()).unwrap();
        assert_eq!(records[0].id_string(), "x");
        assert_eq!(records[0].text.as_deref(), Some("ok"));
    }

    #[test]
    fn test_bad_line_reports_position() {
        let mut jsonl = tempfile::NamedTempFile::new().unwrap();
        writeln!(jsonl, r#"{{"id": "a", "text": "x"}}"#).unwrap();
        writeln!(jsonl, "not json").unwrap();
        let err = read_records(jsonl.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[tokio::test]
    async fn test_evaluate_report() {
        let mut config = VigilConfig::default();
        config.oracle.enabled = false;
        let processor = BatchProcessor::new(&config, None).unwrap();
        let report = processor
            .run(vec![
                Record::new("1", "CPF 123.456.789-00"),
                Record::new("2", "Solicito dados de 2023"),
            ])
            .await;
        let labels = HashMap::from([("1".to_string(), true), ("2".to_string(), false)]);
        let m = evaluate_report(&report, &labels);
        assert_eq!(m.matrix.false_negatives, 0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.accuracy, 1.0);
    }

    #[tokio::test]
    async fn test_command_model() {
        let model = CommandModel::new("cat".to_string());
        assert_eq!(model.call("[]").await.unwrap(), "[]");

        let failing = CommandModel::new("exit 3".to_string());
        assert!(failing.call("x").await.is_err());
    }

    #[test]
    fn test_cli_parses_classify() {
        let cli = Cli::try_parse_from(["vigil", "classify", "--input", "in.jsonl", "--no-oracle"]).unwrap();
        match cli.command {
            Commands::Classify { input, no_oracle, .. } => {
                assert_eq!(input, PathBuf::from("in.jsonl"));
                assert!(no_oracle);
            }
            Commands::Config { .. } => panic!("expected classify"),
        }
    }
}
