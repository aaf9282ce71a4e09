use std::fmt;

use chrono::{DateTime, Utc};
use quiz_core::model::{Choice, Difficulty, Question, QuestionId};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    system: String,
    grade: String,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
    Blank { flag: &'static str },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
            ArgsError::Blank { flag } => write!(f, "{flag} must not be blank"),
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

fn require_non_blank(value: String, flag: &'static str) -> Result<String, ArgsError> {
    if value.trim().is_empty() {
        return Err(ArgsError::Blank { flag });
    }
    Ok(value)
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite://quiz.sqlite3?mode=rwc".into());
        let mut system = std::env::var("QUIZ_SYSTEM").unwrap_or_else(|_| "US".into());
        let mut grade = std::env::var("QUIZ_GRADE").unwrap_or_else(|_| "G9".into());
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--system" => {
                    system = require_non_blank(require_value(&mut args, "--system")?, "--system")?;
                }
                "--grade" => {
                    grade = require_non_blank(require_value(&mut args, "--grade")?, "--grade")?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            system,
            grade,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://quiz.sqlite3?mode=rwc)");
    eprintln!("  --system <name>           Curriculum system of the seeded bank (default: US)");
    eprintln!("  --grade <name>            Grade of the seeded bank (default: G9)");
    eprintln!("  --now <rfc3339>           Fixed creation time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_SYSTEM, QUIZ_GRADE");
}

/// (topic, difficulty, text, choices, correct choice id, solution)
type Sample = (
    &'static str,
    Difficulty,
    &'static str,
    [&'static str; 4],
    &'static str,
    Option<&'static str>,
);

const SAMPLES: &[Sample] = &[
    (
        "Algebra",
        Difficulty::Easy,
        "Solve for $x$: $x + 3 = 7$",
        ["$2$", "$4$", "$7$", "$10$"],
        "B",
        Some("Subtract 3 from both sides: $x = 4$."),
    ),
    (
        "Algebra",
        Difficulty::Medium,
        "Solve for $x$: $3x - 5 = 10$",
        ["$3$", "$5$", "$\\frac{5}{3}$", "$15$"],
        "B",
        Some("Add 5 to both sides to get $3x = 15$, then divide by 3."),
    ),
    (
        "Algebra",
        Difficulty::Hard,
        "Find the sum of the roots of $x^2 - 7x + 10 = 0$",
        ["$-7$", "$10$", "$7$", "$5$"],
        "C",
        Some("By Vieta's formulas the sum of the roots is $-b/a = 7$."),
    ),
    (
        "Geometry",
        Difficulty::Easy,
        "How many degrees are in the interior angles of a triangle?",
        ["$90$", "$180$", "$270$", "$360$"],
        "B",
        None,
    ),
    (
        "Geometry",
        Difficulty::Medium,
        "A right triangle has legs $3$ and $4$. What is the hypotenuse?",
        ["$5$", "$6$", "$7$", "$\\sqrt{7}$"],
        "A",
        Some("$\\sqrt{3^2 + 4^2} = \\sqrt{25} = 5$."),
    ),
    (
        "Geometry",
        Difficulty::Hard,
        "What is the area of a circle inscribed in a square of side $6$?",
        ["$6\\pi$", "$9\\pi$", "$12\\pi$", "$36\\pi$"],
        "B",
        Some("The radius is half the side, $3$, so the area is $9\\pi$."),
    ),
];

fn build_questions(args: &Args, now: DateTime<Utc>) -> Vec<Question> {
    let base_millis = now.timestamp_millis();
    SAMPLES
        .iter()
        .zip(0_i64..)
        .map(|(&(topic, difficulty, text, choices, correct, solution), offset)| Question {
            id: QuestionId::synthesize(&args.system, &args.grade, topic, base_millis + offset),
            text: text.to_string(),
            choices: ["A", "B", "C", "D"]
                .into_iter()
                .zip(choices)
                .map(|(id, text)| Choice::new(id, text))
                .collect(),
            correct_answer: correct.to_string(),
            explanation: None,
            topic: Some(topic.to_string()),
            subtopic: None,
            solution: solution.map(str::to_string),
            difficulty,
            curriculum_system: args.system.clone(),
            grade: args.grade.clone(),
            created_at: Some(now),
        })
        .collect()
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let questions = build_questions(&args, now);
    for question in &questions {
        storage.questions.upsert_question(question).await?;
    }

    println!(
        "Seeded {} questions for {} {} into {}",
        questions.len(),
        args.system,
        args.grade,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
