//! CLI entrypoint for conclave
//!
//! Wires the layers together with dependency injection: configuration,
//! the HTTP gateway, the calculator broker for arithmetic queries, and
//! the orchestrate use case.

use anyhow::{Context, Result, bail};
use clap::Parser;
use conclave_application::{
    FinalAnswer, OrchestrateInput, OrchestrateUseCase, ProgressNotifier, ToolBroker,
};
use conclave_domain::{
    AuthoritativeResult, ExpectedFormat, ModelId, ModelProfile, ProviderRoster, Query, Strategy,
    TaskKind, VerificationStatus,
};
use conclave_infrastructure::{
    CalculatorBroker, ConfigLoader, JsonlAuditSink, OpenAiCompatGateway,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conclave", about = "Ensemble orchestration across LLM providers")]
struct Cli {
    /// The question to answer
    question: Option<String>,

    /// Task kind hint (qa, code, math, research, comparison, creative, summary)
    #[arg(long, default_value = "qa")]
    task: String,

    /// Accuracy dial (minimal, standard, maximal)
    #[arg(long, default_value = "standard")]
    accuracy: String,

    /// Prefer the fastest answer over exhaustiveness
    #[arg(long)]
    fast: bool,

    /// Overall deadline in milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Expected output format (text, markdown, code, json)
    #[arg(long)]
    format: Option<String>,

    /// Models to use instead of the configured roster (repeatable)
    #[arg(short, long)]
    model: Vec<String>,

    /// Path to a config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore config files and use built-in defaults
    #[arg(long)]
    no_config: bool,

    /// Write a JSONL audit trail to this path
    #[arg(long)]
    audit: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Progress reporter printing one line per event to stderr
struct ConsoleProgress;

impl ProgressNotifier for ConsoleProgress {
    fn on_strategy_selected(&self, strategy: Strategy, calls: usize) {
        eprintln!("strategy: {} ({} call(s))", strategy, calls);
    }

    fn on_call_complete(&self, model: &ModelId, success: bool) {
        let mark = if success { "ok" } else { "failed" };
        eprintln!("  {} .. {}", model, mark);
    }

    fn on_round_verified(&self, round: usize, status: VerificationStatus) {
        eprintln!("round {}: {}", round, status);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting conclave");

    let Some(question) = cli.question.clone() else {
        bail!("A question is required");
    };

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow::anyhow!(e))?
    };

    let task: TaskKind = cli.task.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let accuracy = cli
        .accuracy
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let mut query = Query::new(question.clone())
        .with_task(task)
        .with_accuracy(accuracy);
    if cli.fast {
        query = query.prioritizing_latency();
    }
    if let Some(deadline_ms) = cli.deadline_ms {
        query = query.with_deadline_in(Duration::from_millis(deadline_ms));
    }
    if let Some(format) = &cli.format {
        query = query.with_expected_format(parse_format(format)?);
    }

    // For arithmetic tasks the calculator result is authoritative; the
    // Verifier checks the ensemble's answer against it.
    if task == TaskKind::Arithmetic
        && let Some(expression) = extract_expression(&question)
    {
        let broker = CalculatorBroker::new();
        match broker
            .invoke("calculator", &serde_json::json!({ "expression": expression }))
            .await
        {
            Ok(output) => {
                debug!(value = %output.value, "Calculator result attached");
                query = query.with_authoritative(AuthoritativeResult::new(
                    output.tool,
                    output.value,
                ));
            }
            Err(e) => debug!("Calculator could not evaluate the question: {}", e),
        }
    }

    let roster = if cli.model.is_empty() {
        config.providers.roster()
    } else {
        ProviderRoster::new(
            cli.model
                .iter()
                .map(|m| {
                    let id: ModelId = m.parse().expect("model parsing is infallible");
                    ModelProfile::new(id).with_uniform_capability(0.6)
                })
                .collect(),
        )
    };

    // === Dependency Injection ===
    let mut gateway = OpenAiCompatGateway::new(config.providers.endpoint.clone())
        .map_err(|e| anyhow::anyhow!(e))?;
    if let Some(env_name) = &config.providers.api_key_env
        && let Ok(api_key) = std::env::var(env_name)
    {
        gateway = gateway.with_api_key(api_key);
    }

    let mut use_case =
        OrchestrateUseCase::new(Arc::new(gateway)).with_params(config.engine.params());
    if let Some(audit_path) = &cli.audit {
        let sink = JsonlAuditSink::new(audit_path)
            .with_context(|| format!("cannot write audit trail to {}", audit_path.display()))?;
        use_case = use_case.with_audit(Arc::new(sink));
    }

    let input = OrchestrateInput::new(query).with_roster(roster);

    let result = if cli.quiet {
        use_case.execute(input).await
    } else {
        use_case.execute_with_progress(input, &ConsoleProgress).await
    };

    match result {
        Ok(answer) => {
            print_answer(&answer, cli.json)?;
            Ok(())
        }
        Err(error) => bail!("orchestration failed: {}", error),
    }
}

fn parse_format(raw: &str) -> Result<ExpectedFormat> {
    match raw.to_lowercase().as_str() {
        "text" | "plain" => Ok(ExpectedFormat::PlainText),
        "markdown" | "md" => Ok(ExpectedFormat::Markdown),
        "code" => Ok(ExpectedFormat::CodeOnly),
        "json" => Ok(ExpectedFormat::Json),
        other => bail!("unknown format: {}", other),
    }
}

/// Pull an arithmetic expression out of a natural-language question
fn extract_expression(question: &str) -> Option<String> {
    let expression: String = question
        .chars()
        .filter(|c| c.is_ascii_digit() || "+-*/()x× .".contains(*c))
        .collect();
    let expression = expression.trim().trim_end_matches(['.', ' ']).to_string();

    let has_digit = expression.chars().any(|c| c.is_ascii_digit());
    let has_operator = expression.chars().any(|c| "+-*/x×".contains(c));
    (has_digit && has_operator).then_some(expression)
}

fn print_answer(answer: &FinalAnswer, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(answer)?);
        return Ok(());
    }

    println!("{}", answer.text);
    println!();
    println!(
        "confidence: {:.2} | strategy: {} | rounds: {}",
        answer.confidence, answer.strategy_used, answer.iterations
    );
    if answer.escalated {
        println!("note: returned best effort, verification did not fully pass");
    }
    for caveat in &answer.caveats {
        println!("caveat: {}", caveat);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_expression() {
        assert_eq!(
            extract_expression("What is 12345*67890?").as_deref(),
            Some("12345*67890")
        );
        assert_eq!(
            extract_expression("Compute (2+3)*4 please").as_deref(),
            Some("(2+3)*4")
        );
        assert!(extract_expression("What is the capital of France?").is_none());
        assert!(extract_expression("No numbers here").is_none());
    }

    #[test]
    fn test_parse_format() {
        assert!(matches!(parse_format("json"), Ok(ExpectedFormat::Json)));
        assert!(matches!(parse_format("code"), Ok(ExpectedFormat::CodeOnly)));
        assert!(parse_format("yaml").is_err());
    }
}
