use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use colored::Colorize;
use folio_lib::{Error, Notice, Repository, repository::remote};
use sysexits::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod admin;
mod cert;
mod portfolio;
mod student;

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Log in and out as a student
    #[command(subcommand)]
    Student(student::Command),
    /// Manage the logged in student's portfolio
    #[command(subcommand)]
    Portfolio(portfolio::Command),
    /// Track certificates
    #[command(subcommand)]
    Cert(cert::Command),
    /// Administrator tools
    #[command(subcommand)]
    Admin(admin::Command),
}

#[tokio::main]
async fn main() -> ExitCode {
    // Human friendly panicking in release mode
    human_panic::setup_panic!();

    // Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Could not set up logging: {e}");
    }

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::Ok,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            exit_code(&e)
        }
    }
}

async fn run(cli: &Cli) -> folio_lib::Result<()> {
    let repo = Repository::new()?;
    repo.identity().restore()?;

    match &cli.command {
        Command::Student(cmd) => student::handle(&repo, cmd).await,
        Command::Portfolio(cmd) => portfolio::handle(&repo, cmd).await,
        Command::Cert(cmd) => cert::handle(&repo, cmd).await,
        Command::Admin(cmd) => admin::handle(&repo, cmd).await,
    }
}

fn exit_code(e: &Error) -> ExitCode {
    match e {
        Error::Validation(_) | Error::Image(_) => ExitCode::DataErr,
        Error::NotLoggedIn | Error::NotAuthorized => ExitCode::NoPerm,
        Error::UnknownItem(_) => ExitCode::NoInput,
        Error::Remote(remote::Error::Protocol(_)) => ExitCode::Protocol,
        Error::Remote(remote::Error::Unsupported(_)) => ExitCode::Software,
        Error::Remote(_) => ExitCode::Unavailable,
        Error::Config(_) => ExitCode::Config,
        Error::Io(_) => ExitCode::IoErr,
    }
}

pub(crate) fn notify(notice: &Notice) {
    println!("{}", notice.to_string().green());
}

/// Ask a yes/no question on the terminal. Anything but `y` or `yes` is a no.
pub(crate) fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }

    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Read one line from the terminal after showing `prompt`.
pub(crate) fn prompt(prompt: &str) -> io::Result<String> {
    print!("{prompt}: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
