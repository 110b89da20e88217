use clap::Subcommand;
use colored::Colorize;
use folio_lib::{Repository, repository::models::Certificate};

use crate::notify;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load the certificates of a student
    Login { name: String },
    /// Stop viewing certificates
    Logout,
    /// Show every certificate and overall progress
    Status,
    /// Mark a certificate obtained, or not obtained if it already is
    Toggle {
        /// Official certificate title, e.g. ITQ
        certificate: Certificate,
        /// Date obtained as YYYY-MM-DD. Defaults to today.
        #[arg(short, long)]
        date: Option<String>,
    },
}

pub async fn handle(repo: &Repository, cmd: &Command) -> folio_lib::Result<()> {
    let mut certificates = repo.certificates();

    match cmd {
        Command::Login { name } => {
            notify(&certificates.login(name).await?);
            print_status(&certificates);
        }
        Command::Logout => certificates.logout()?,
        Command::Status => {
            certificates.refresh().await?;
            print_status(&certificates);
        }
        Command::Toggle { certificate, date } => {
            certificates.refresh().await?;
            notify(&certificates.toggle(*certificate, date.as_deref()).await?);
            print_status(&certificates);
        }
    }

    Ok(())
}

fn print_status(certificates: &folio_lib::Certificates) {
    for status in certificates.statuses() {
        let mark = if status.is_obtained() {
            "[x]".green()
        } else {
            "[ ]".normal()
        };
        let date = status.obtained_date().unwrap_or_default();

        println!(
            "{mark} {} {} {}",
            status.certificate.to_string().bold(),
            status.certificate.description().dimmed(),
            date.green()
        );
    }

    let progress = certificates.progress();
    println!();
    println!(
        "{} obtained, {} remaining ({}%)",
        progress.obtained, progress.remaining, progress.percentage
    );
}
