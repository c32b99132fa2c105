//! repoglob CLI entry point.
//!
//! Usage:
//!   repoglob <owner>/<repo> <pattern>              # One matched path per line
//!   repoglob <owner>/<repo> <pattern> --json       # Full remote records as JSON
//!   repoglob <owner>/<repo> <pattern> --branch dev # Match against a branch

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use repoglob::{RunOptions, run};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    match dispatch(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Help,
    Version,
    Glob(GlobArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct GlobArgs {
    owner: String,
    repo: String,
    pattern: String,
    branch: Option<String>,
    json: bool,
}

fn dispatch(args: &[String]) -> Result<ExitCode> {
    match parse_args(args)? {
        Command::Help => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }
        Command::Version => {
            println!("repoglob {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Command::Glob(glob) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;
            runtime.block_on(run_glob(glob))
        }
    }
}

fn parse_args(args: &[String]) -> Result<Command> {
    let mut positional = Vec::new();
    let mut branch = None;
    let mut json = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--version" | "-V" => return Ok(Command::Version),
            "--json" => json = true,
            "--branch" | "-b" => {
                let name = iter.next().context("--branch requires a branch name")?;
                branch = Some(name.clone());
            }
            other if other.starts_with("--branch=") => {
                branch = Some(other["--branch=".len()..].to_string());
            }
            other if other.starts_with('-') && other.len() > 1 => {
                bail!("Unknown option: {other}\nRun 'repoglob --help' for usage.");
            }
            other => positional.push(other.to_string()),
        }
    }

    let [target, pattern] = <[String; 2]>::try_from(positional).map_err(|got| {
        anyhow::anyhow!(
            "expected <owner>/<repo> <pattern>, got {} argument(s)\nRun 'repoglob --help' for usage.",
            got.len()
        )
    })?;
    let (owner, repo) = target
        .split_once('/')
        .with_context(|| format!("repository must be <owner>/<repo>, got {target:?}"))?;

    Ok(Command::Glob(GlobArgs {
        owner: owner.to_string(),
        repo: repo.to_string(),
        pattern,
        branch,
        json,
    }))
}

async fn run_glob(args: GlobArgs) -> Result<ExitCode> {
    let mut options = RunOptions::new(args.owner, args.repo, args.pattern);
    if let Some(branch) = args.branch {
        options = options.with_branch(branch);
    }
    tracing::debug!(?options, "starting glob session");

    let outcome = run(options).await;

    if args.json {
        let report = serde_json::json!({
            "entries": outcome.entries.iter().map(|e| e.as_ref()).collect::<Vec<_>>(),
            "meta": outcome.meta,
        });
        println!("{}", serde_json::to_string_pretty(&report).context("Failed to encode results")?);
    } else {
        for entry in &outcome.entries {
            println!("{}", entry.absolute_path());
        }
    }

    let limit = outcome
        .meta
        .limit
        .map_or_else(|| "unbounded".to_string(), |n| n.to_string());
    eprintln!(
        "api calls: {}, cache hits: {}, rate limit remaining: {limit}",
        outcome.meta.api_calls, outcome.meta.cache_hits
    );

    match outcome.error {
        Some(err) => {
            eprintln!("Error: {err}");
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

fn print_help() {
    println!(
        r#"repoglob v{}

Match glob patterns against a GitHub repository without cloning it.

Usage:
  repoglob <owner>/<repo> <pattern> [OPTIONS]

Options:
  -b, --branch <name>          Branch, tag, or commit (default: repository default)
      --json                   Print full remote records as JSON
  -h, --help                   Show this help
  -V, --version                Show version

Configuration:
  ~/.config/repoglob/config.toml   api_base, user_agent, token, timeout_ms
  GITHUB_TOKEN                     Token used when the config has none

Examples:
  repoglob rust-lang/rust '/*.md'
  repoglob jekyll/jekyll '/docs/**/*.html' --branch gh-pages
  RUST_LOG=repoglob=debug repoglob tokio-rs/tokio 'tokio/src/*/mod.rs'
"#,
        env!("CARGO_PKG_VERSION")
    );
}
