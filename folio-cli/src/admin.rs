use std::{fs, path::PathBuf};

use clap::Subcommand;
use colored::Colorize;
use folio_lib::{
    Notice, Repository,
    repository::{entities::DeleteOutcome, models::ExportKind},
};

use crate::{confirm, notify, prompt};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in as administrator. Prompts for the password if it isn't given.
    Login {
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Log out
    Logout,
    /// List every portfolio and certificate
    Dashboard,
    /// Delete any student's project
    Delete {
        id: String,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Export a collection as CSV
    Export {
        /// `portfolios` or `certificates`
        kind: ExportKind,
        /// Write to this file instead of standard output
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

pub async fn handle(repo: &Repository, cmd: &Command) -> folio_lib::Result<()> {
    let mut admin = repo.admin();

    match cmd {
        Command::Login { password } => {
            let password = match password {
                Some(password) => password.clone(),
                None => prompt("Password")?,
            };
            notify(&admin.login(&password).await?);
        }
        Command::Logout => admin.logout()?,
        Command::Dashboard => {
            let dashboard = admin.refresh().await?;

            println!("{}", "Portfolios".bold());
            for item in &dashboard.portfolios {
                println!(
                    "  {} {} [{}] {}",
                    item.id.dimmed(),
                    item.student_name,
                    item.category,
                    item.title
                );
            }
            println!("{}", "Certificates".bold());
            for record in &dashboard.certificates {
                println!(
                    "  {} {} {} {}",
                    record.id.dimmed(),
                    record.student_name,
                    record.cert_name,
                    record.obtained_date
                );
            }
        }
        Command::Delete { id, yes } => {
            let outcome = admin
                .delete_portfolio(id, |id| *yes || confirm(&format!("Really delete '{id}'?")))
                .await?;
            if outcome == DeleteOutcome::Deleted {
                notify(&Notice::PortfolioDeleted);
            }
        }
        Command::Export { kind, out } => {
            let csv = admin.export(*kind).await?;
            match out {
                Some(path) => fs::write(path, csv)?,
                None => println!("{}", String::from_utf8_lossy(&csv)),
            }
        }
    }

    Ok(())
}
