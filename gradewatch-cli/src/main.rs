//! gradewatch-cli — one-shot grade probe.
//!
//! Logs in, fetches the periodic ("usual") and final grade tables for one
//! term, and prints a single JSON document to stdout:
//!
//! ```json
//! {"usual_grades": [...], "final_grades": [...]}
//! ```
//!
//! Errors go to stderr with exit status 1. Stdout carries only the JSON, so
//! the output can be piped straight into other tools.

use chrono::{Local, NaiveDate};
use clap::Parser;
use serde::Serialize;

use gradewatch_core::config::FetcherConfig;
use gradewatch_core::fetch::{Credentials, EamsClient, GradeFetcher};
use gradewatch_core::models::{Snapshot, UsualGradeRecord};
use gradewatch_core::semester;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 300;

#[derive(Debug, Parser)]
#[command(
    name = "gradewatch-cli",
    version,
    about = "Fetch one term's grades from the records service as JSON"
)]
struct Cli {
    /// Account identifier (student number)
    #[arg(long, env = "GRADEWATCH_ACCOUNT")]
    account: String,

    /// Account password
    #[arg(long, env = "GRADEWATCH_PASSWORD", hide_env_values = true)]
    password: String,

    /// Term id; inferred from today's date when omitted
    #[arg(long)]
    term: Option<i32>,

    /// Records gateway base URL
    #[arg(long, env = "GRADEWATCH_BASE_URL")]
    base_url: String,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

/// The stdout contract: two arrays, nothing else.
#[derive(Debug, Serialize)]
struct ProbeReport {
    usual_grades: Vec<UsualGradeRecord>,
    final_grades: Snapshot,
}

fn resolve_term(requested: Option<i32>, today: NaiveDate) -> Result<i32, semester::SemesterError> {
    match requested {
        Some(id) => Ok(id),
        None => semester::current_term_id(today),
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let term_id = match resolve_term(cli.term, Local::now().date_naive()) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Cannot resolve term: {}", e);
            std::process::exit(1);
        }
    };

    let client = match EamsClient::new(FetcherConfig {
        base_url: cli.base_url.clone(),
        request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        retries: DEFAULT_RETRIES,
        retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
    }) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Cannot build gateway client: {}", e);
            std::process::exit(1);
        }
    };

    let credentials = Credentials::new(cli.account, cli.password);

    let usual_grades = match client.usual_grades(&credentials, term_id).await {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Usual grades fetch failed: {}", e);
            std::process::exit(1);
        }
    };
    let final_grades = match client.fetch(&credentials, term_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("Final grades fetch failed: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!(
        "OK: term {}: {} usual, {} final",
        term_id,
        usual_grades.len(),
        final_grades.len()
    );

    let report = ProbeReport {
        usual_grades,
        final_grades,
    };
    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .expect("grade records always serialize");
    println!("{}", json);
}
