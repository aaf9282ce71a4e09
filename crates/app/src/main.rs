use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use quiz_core::model::{Report, SanitizedQuestion, UserContextDraft};
use services::llm::{LlmProvider, OpenAiProvider, RetryPolicy, RetryingProvider};
use services::{AdaptiveServices, AnswerOutcome, Clock, EngineConfig, Submission};

const DEFAULT_DB_URL: &str = "sqlite://quiz.sqlite3?mode=rwc";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    MissingContext,
    MissingFile,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingContext => write!(f, "--system and --grade are required"),
            ArgsError::MissingFile => write!(f, "grade needs a submission file"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- quiz  --system <code> --grade <grade> [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- grade <submission.json> [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_SYSTEM, QUIZ_GRADE, RUST_LOG");
    eprintln!("  QUIZ_LLM_API_KEY, QUIZ_LLM_BASE_URL, QUIZ_LLM_MODEL");
    eprintln!("  QUIZ_LLM_MAX_ATTEMPTS, QUIZ_LLM_DEADLINE_MS");
    eprintln!("  QUIZ_IO_TIMEOUT_MS, QUIZ_CANDIDATE_BATCH");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quiz,
    Grade,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "quiz" => Some(Self::Quiz),
            "grade" => Some(Self::Grade),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    system: Option<String>,
    grade: Option<String>,
    file: Option<String>,
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut args = args;
        let mut parsed = Self {
            db_url: std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.into()),
            system: std::env::var("QUIZ_SYSTEM").ok(),
            grade: std::env::var("QUIZ_GRADE").ok(),
            file: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if !value.starts_with("sqlite:") {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = value;
                }
                "--system" => parsed.system = Some(require_value(&mut args, "--system")?),
                "--grade" => parsed.grade = Some(require_value(&mut args, "--grade")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other if !other.starts_with("--") && parsed.file.is_none() => {
                    parsed.file = Some(arg);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_llm() -> Arc<dyn LlmProvider> {
    let provider = OpenAiProvider::from_env();
    if !provider.enabled() {
        tracing::warn!("QUIZ_LLM_API_KEY is not set, only stored questions can be served");
    }
    Arc::new(RetryingProvider::new(provider, RetryPolicy::from_env()))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Quiz,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Quiz,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if argv.first().is_some_and(|a| !a.starts_with("--")) {
        argv.remove(0);
    }

    let args = Args::parse(argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let services = AdaptiveServices::new_sqlite(
        &args.db_url,
        Clock::default(),
        build_llm(),
        EngineConfig::from_env(),
    )
    .await?;
    info!(db = %args.db_url, "storage ready");

    match cmd {
        Command::Quiz => {
            let (Some(system), Some(grade)) = (args.system, args.grade) else {
                return Err(ArgsError::MissingContext.into());
            };
            run_quiz(&services, UserContextDraft::new(system, grade)).await
        }
        Command::Grade => {
            let path = args.file.ok_or(ArgsError::MissingFile)?;
            run_grade(&services, &path).await
        }
    }
}

async fn run_quiz(
    services: &AdaptiveServices,
    draft: UserContextDraft,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = services.engine();
    let started = engine.start(draft).await?;
    let session_id = started.session_id.to_string();
    let mut out = tokio::io::stdout();
    out.write_all(
        format!("Session {session_id}: {} questions\n", started.total_questions).as_bytes(),
    )
    .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut current = started.first_question;
    loop {
        out.write_all(render_question(&current).as_bytes()).await?;
        out.write_all(b"> ").await?;
        out.flush().await?;

        let Some(line) = lines.next_line().await? else {
            out.write_all(b"\nSession left unfinished.\n").await?;
            return Ok(());
        };
        let answer = line.trim();
        if answer.is_empty() {
            continue;
        }

        match engine
            .submit_answer(&session_id, current.id.as_str(), answer)
            .await?
        {
            AnswerOutcome::Next(next) => current = next,
            AnswerOutcome::Finished(report) => {
                out.write_all(render_report(&report).as_bytes()).await?;
                return Ok(());
            }
        }
    }
}

async fn run_grade(
    services: &AdaptiveServices,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let submission: Submission = serde_json::from_str(&raw)?;
    let report = services.submissions().submit(submission).await?;
    let json = serde_json::to_string_pretty(&report)?;
    tokio::io::stdout()
        .write_all(format!("{json}\n").as_bytes())
        .await?;
    Ok(())
}

fn render_question(question: &SanitizedQuestion) -> String {
    let mut text = format!(
        "\n[{} | {}] {}\n",
        question.difficulty, question.topic, question.text
    );
    for choice in question.choices.iter().flatten() {
        text.push_str(&format!("  {}) {}\n", choice.id, choice.text));
    }
    text
}

fn render_report(report: &Report) -> String {
    let mut text = format!(
        "\nScore: {}/{} ({}%), final difficulty {}\n{}\n",
        report.score,
        report.total,
        report.score_percent,
        report.final_difficulty,
        report.recommendation_text
    );
    for entry in &report.answer_history {
        let mark = if entry.is_correct { "ok" } else { "miss" };
        text.push_str(&format!("\n[{mark}] {}\n", entry.text));
        if let Some(explanation) = &entry.explanation {
            text.push_str(&format!("{explanation}\n"));
        }
    }
    text
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
