use clap::Subcommand;
use colored::Colorize;
use folio_lib::Repository;

use crate::notify;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in, registering the student if they are new
    Login { name: String },
    /// Log out
    Logout,
    /// Show who is logged in
    Whoami,
    /// List registered students
    List,
}

pub async fn handle(repo: &Repository, cmd: &Command) -> folio_lib::Result<()> {
    let identity = repo.identity();

    match cmd {
        Command::Login { name } => notify(&identity.login(name).await?),
        Command::Logout => identity.logout()?,
        Command::Whoami => match identity.current_user() {
            Some(name) => println!("{name}"),
            None => eprintln!("Not logged in"),
        },
        Command::List => {
            let current = identity.current_user();
            for student in identity.registered_students().await {
                if current.as_deref() == Some(student.name.as_str()) {
                    println!("* {}", student.name.bold());
                } else {
                    println!("  {}", student.name);
                }
            }
        }
    }

    Ok(())
}
