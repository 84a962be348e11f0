mod render;

use std::fmt;
use std::io::Write as _;

use services::{AppServices, Clock, ErrorKind, RunnerConfig};
use sqlearn_core::model::{AnswerKind, DatasetId, QuizQuestion};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_ENV: &str = "SQLEARN_LOG";
const DEFAULT_LOG_FILTER: &str = "info,services=debug,storage=debug";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { command: &'static str, name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDatasetId { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { command, name } => {
                write!(f, "{command} requires <{name}>")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDatasetId { raw } => write!(f, "invalid dataset id: {raw}"),
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

fn parse_number<T: std::str::FromStr>(raw: String, flag: &'static str) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- topics");
    eprintln!("  cargo run -p app -- show <topic>");
    eprintln!("  cargo run -p app -- datasets");
    eprintln!("  cargo run -p app -- describe <dataset>");
    eprintln!("  cargo run -p app -- query <dataset> <sql...>");
    eprintln!("  cargo run -p app -- example <example-id>");
    eprintln!("  cargo run -p app -- quiz <topic>");
    eprintln!();
    eprintln!("Options (query, example):");
    eprintln!("  --timeout-ms <ms>   per-query time limit (default 2000)");
    eprintln!("  --max-rows <n>      rows returned before truncation (default 500)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SQLEARN_QUERY_TIMEOUT_MS, SQLEARN_MAX_ROWS, SQLEARN_LOG (or RUST_LOG)");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Topics,
    Show { topic: String },
    Datasets,
    Describe { dataset: DatasetId },
    Query { dataset: DatasetId, sql: String },
    Example { id: String },
    Quiz { topic: String },
}

struct Args {
    command: Command,
    timeout_ms: Option<u64>,
    max_rows: Option<usize>,
}

impl Args {
    fn parse(name: &str, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut timeout_ms = None;
        let mut max_rows = None;
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--timeout-ms" => {
                    let value = require_value(args, "--timeout-ms")?;
                    timeout_ms = Some(parse_number(value, "--timeout-ms")?);
                }
                "--max-rows" => {
                    let value = require_value(args, "--max-rows")?;
                    max_rows = Some(parse_number(value, "--max-rows")?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let command = Command::from_parts(name, positional)?;
        Ok(Self {
            command,
            timeout_ms,
            max_rows,
        })
    }

    fn runner_config(&self) -> Result<RunnerConfig, services::ConfigError> {
        let mut config = RunnerConfig::from_env()?;
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout_ms(ms)?;
        }
        if let Some(rows) = self.max_rows {
            config = config.with_max_rows(rows)?;
        }
        Ok(config)
    }
}

impl Command {
    fn from_parts(name: &str, positional: Vec<String>) -> Result<Self, ArgsError> {
        let mut rest = positional.into_iter();
        let mut take = |command: &'static str, name: &'static str| {
            rest.next()
                .ok_or(ArgsError::MissingArgument { command, name })
        };

        let command = match name {
            "topics" => Self::Topics,
            "show" => Self::Show {
                topic: take("show", "topic")?,
            },
            "datasets" => Self::Datasets,
            "describe" => Self::Describe {
                dataset: dataset_id(take("describe", "dataset")?)?,
            },
            "query" => {
                let dataset = dataset_id(take("query", "dataset")?)?;
                let sql = rest.collect::<Vec<_>>().join(" ");
                if sql.trim().is_empty() {
                    return Err(ArgsError::MissingArgument {
                        command: "query",
                        name: "sql",
                    });
                }
                return Ok(Self::Query { dataset, sql });
            }
            "example" => Self::Example {
                id: take("example", "example-id")?,
            },
            "quiz" => Self::Quiz {
                topic: take("quiz", "topic")?,
            },
            other => return Err(ArgsError::UnknownCommand(other.to_string())),
        };

        match rest.next() {
            Some(extra) => Err(ArgsError::UnknownArg(extra)),
            None => Ok(command),
        }
    }
}

fn dataset_id(raw: String) -> Result<DatasetId, ArgsError> {
    DatasetId::new(raw.as_str()).map_err(|_| ArgsError::InvalidDatasetId { raw })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // Logs go to stderr so query output on stdout stays pipeable.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let name = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => first,
    };

    let args = Args::parse(&name, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let config = args.runner_config()?;
    let services = AppServices::bundled(Clock::default(), config).await?;

    match args.command {
        Command::Topics => {
            print!("{}", render::topics(&services.catalog().list_topics()));
        }
        Command::Show { topic } => {
            let topic = services.catalog().get_topic(&topic)?;
            print!("{}", render::topic(topic));
        }
        Command::Datasets => {
            for info in services.runner().datasets() {
                println!("{:<10} {}", info.id, info.title);
                if !info.description.is_empty() {
                    println!("{:<10} {}", "", info.description);
                }
            }
        }
        Command::Describe { dataset } => {
            let tables = services.runner().describe(&dataset).await?;
            print!("{}", render::schema(&tables));
        }
        Command::Query { dataset, sql } => {
            let result = services.runner().run(&sql, &dataset).await?;
            print!("{}", render::result(&result));
        }
        Command::Example { id } => {
            let example = services.catalog().example(&id)?;
            println!("-- {}", example.title());
            println!("{}", example.sql().trim_end());
            let result = services.runner().run_example(&id).await?;
            print!("{}", render::result(&result));
        }
        Command::Quiz { topic } => quiz(&services, &topic).await?,
    }

    Ok(())
}

/// Interactive quiz over one topic's questions, read from stdin.
async fn quiz(services: &AppServices, topic: &str) -> Result<(), Box<dyn std::error::Error>> {
    let topic = services.catalog().get_topic(topic)?;
    if topic.quiz().is_empty() {
        println!("{} has no quiz questions.", topic.title());
        return Ok(());
    }

    let sessions = services.sessions();
    let session = sessions.start()?;
    sessions.visit_topic(session, topic.id().as_str()).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    'questions: for (number, question) in topic.quiz().iter().enumerate() {
        println!();
        print!("{}", render::question(number + 1, question));
        loop {
            print!("> ");
            std::io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                println!();
                break 'questions;
            };
            let Some(picked) = parse_choices(&line) else {
                println!("Enter candidate numbers such as 2 or 1,3.");
                continue;
            };

            let submitted = match question.answer_kind() {
                AnswerKind::SingleChoice if picked.len() == 1 => {
                    sessions
                        .submit_answer(session, question.id().as_str(), picked[0])
                        .await
                }
                AnswerKind::SingleChoice => {
                    println!("Pick exactly one number.");
                    continue;
                }
                AnswerKind::MultiSelect => {
                    sessions
                        .submit_selection(session, question.id().as_str(), &picked)
                        .await
                }
            };

            match submitted {
                Ok(feedback) => {
                    print!("{}", render::feedback(&feedback));
                    continue 'questions;
                }
                Err(err) if err.kind() == ErrorKind::InvalidAnswerIndex => {
                    println!("{}", out_of_range(question));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    let score = sessions.end(session).await?;
    println!();
    println!("{}", render::score(score));
    sessions.discard(session)?;
    Ok(())
}

/// One-based candidate numbers, converted to zero-based indices.
fn parse_choices(line: &str) -> Option<Vec<usize>> {
    let picked: Option<Vec<usize>> = line
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<usize>().ok()?.checked_sub(1))
        .collect();
    picked.filter(|p| !p.is_empty())
}

fn out_of_range(question: &QuizQuestion) -> String {
    format!("Choose between 1 and {}.", question.candidates().len())
}

/// Log a failed command and return the line shown to the user.
fn report_failure(err: &dyn std::error::Error) -> String {
    tracing::error!(error = %err, "command failed");
    err.to_string()
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{}", report_failure(err.as_ref()));
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = argv[1..].iter().map(ToString::to_string);
        Args::parse(argv[0], &mut iter)
    }

    #[test]
    fn query_joins_remaining_words() {
        let args = parse(&["query", "school", "SELECT", "name", "FROM", "students"]).unwrap();
        assert_eq!(
            args.command,
            Command::Query {
                dataset: DatasetId::new("school").unwrap(),
                sql: "SELECT name FROM students".into(),
            }
        );
    }

    #[test]
    fn limit_flags_are_parsed() {
        let args = parse(&["query", "--max-rows", "5", "company", "SELECT 1", "--timeout-ms", "250"])
            .unwrap();
        assert_eq!(args.max_rows, Some(5));
        assert_eq!(args.timeout_ms, Some(250));
        assert!(matches!(args.command, Command::Query { .. }));
    }

    #[test]
    fn missing_and_unknown_arguments_are_rejected() {
        assert!(matches!(
            parse(&["describe"]),
            Err(ArgsError::MissingArgument { .. })
        ));
        assert!(matches!(
            parse(&["query", "school"]),
            Err(ArgsError::MissingArgument { name: "sql", .. })
        ));
        assert!(matches!(
            parse(&["topics", "--verbose"]),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(matches!(
            parse(&["show", "joins", "extra"]),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(matches!(
            parse(&["max-rows", "5"]),
            Err(ArgsError::UnknownCommand(_))
        ));
        assert!(matches!(
            parse(&["query", "--max-rows", "lots", "school", "SELECT 1"]),
            Err(ArgsError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse(&["describe", "Bad Id"]),
            Err(ArgsError::InvalidDatasetId { .. })
        ));
    }

    #[test]
    fn failures_are_reported_once_tracing_is_up() {
        init_tracing();
        init_tracing();
        let err = ArgsError::UnknownCommand("drop".into());
        assert_eq!(report_failure(&err), "unknown command: drop");
    }

    #[test]
    fn choices_are_one_based() {
        assert_eq!(parse_choices("2"), Some(vec![1]));
        assert_eq!(parse_choices(" 1, 3 ,4"), Some(vec![0, 2, 3]));
        assert_eq!(parse_choices("0"), None);
        assert_eq!(parse_choices("b"), None);
        assert_eq!(parse_choices(""), None);
    }
}
