use std::{fs, path::PathBuf};

use clap::{Args, Subcommand};
use colored::Colorize;
use folio_lib::{
    Error, Notice, Repository,
    repository::{
        entities::{DeleteOutcome, Draft, Portfolios},
        models::{ALL_CATEGORIES, ImagePayload, PortfolioItem},
    },
};

use crate::{confirm, notify};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List projects, newest first
    List {
        /// Only show this category
        #[arg(short, long, default_value = ALL_CATEGORIES)]
        category: String,
    },
    /// Show one project in full
    Show { id: String },
    /// Add a project
    Add(Fields),
    /// Change a project. Fields that aren't given keep their current value.
    Edit {
        id: String,
        #[command(flatten)]
        fields: Fields,
        /// Drop the attached image
        #[arg(long, conflicts_with = "image")]
        remove_image: bool,
    },
    /// Delete a project
    Remove {
        id: String,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct Fields {
    #[arg(short, long)]
    category: Option<String>,
    #[arg(short, long)]
    title: Option<String>,
    /// How the project went
    #[arg(short, long)]
    description: Option<String>,
    /// Image file to attach
    #[arg(short, long)]
    image: Option<PathBuf>,
}

impl Fields {
    /// Apply the given fields on top of `draft`, preparing the image if there is one.
    async fn apply(&self, portfolios: &Portfolios, mut draft: Draft) -> folio_lib::Result<Draft> {
        if let Some(category) = &self.category {
            draft.category.clone_from(category);
        }
        if let Some(title) = &self.title {
            draft.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            draft.description.clone_from(description);
        }
        if let Some(path) = &self.image {
            draft.image = portfolios.prepare_image(&fs::read(path)?).await?;
        }

        Ok(draft)
    }
}

pub async fn handle(repo: &Repository, cmd: &Command) -> folio_lib::Result<()> {
    let mut portfolios = repo.portfolios();
    portfolios.refresh().await?;

    match cmd {
        Command::List { category } => {
            let items = portfolios.filter(category);
            if items.is_empty() {
                eprintln!("No projects yet");
            }
            for item in items {
                print_row(item);
            }
        }
        Command::Show { id } => {
            let item = portfolios
                .get(id)
                .ok_or_else(|| Error::UnknownItem(id.clone()))?;
            print_item(item);
        }
        Command::Add(fields) => {
            let draft = fields.apply(&portfolios, Draft::default()).await?;
            notify(&portfolios.save(&draft, None).await?);
        }
        Command::Edit {
            id,
            fields,
            remove_image,
        } => {
            let current = portfolios
                .get(id)
                .map(Draft::from)
                .ok_or_else(|| Error::UnknownItem(id.clone()))?;
            let mut draft = fields.apply(&portfolios, current).await?;
            if *remove_image {
                draft.image = ImagePayload::Empty;
            }
            notify(&portfolios.save(&draft, Some(id.as_str())).await?);
        }
        Command::Remove { id, yes } => {
            let outcome = portfolios
                .delete(id, |item| {
                    *yes || confirm(&format!("Really delete '{}'?", item.title))
                })
                .await?;
            if outcome == DeleteOutcome::Deleted {
                notify(&Notice::PortfolioDeleted);
            }
        }
    }

    Ok(())
}

fn print_row(item: &PortfolioItem) {
    let date = item
        .created_at
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let image = if item.has_image() { " [image]" } else { "" };

    println!(
        "{} {} {}{} {}",
        item.id.dimmed(),
        format!("[{}]", item.category).cyan(),
        item.title.bold(),
        image,
        date.dimmed()
    );
}

fn print_item(item: &PortfolioItem) {
    println!("{}", item.title.bold());
    println!("{} {}", "Category:".dimmed(), item.category);
    if let Some(created_at) = item.created_at {
        println!("{} {}", "Written:".dimmed(), created_at.format("%Y-%m-%d"));
    }
    if item.has_image() {
        match &item.image {
            ImagePayload::Hosted(url) => println!("{} {url}", "Image:".dimmed()),
            _ => println!("{} attached", "Image:".dimmed()),
        }
    }
    println!();
    println!("{}", item.description);
}
