use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use client_core::{
    AuthorDetails, BookDetails, CatalogClient, CoverFile, CoverUploadCoordinator,
    HttpObjectStore, UploadOutcome, UploadRequest,
};
use shared::domain::{AuthorDraft, AuthorId, BookDraft, BookId, ResourceRef};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "catalog", about = "Manage authors, books and book covers")]
struct Cli {
    /// Record API base URL, e.g. https://api.example.com/Prod
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    Authors(AuthorCommand),
    #[command(subcommand)]
    Books(BookCommand),
}

#[derive(Subcommand, Debug)]
enum AuthorCommand {
    List,
    Show { id: String },
    Create { name: String },
    Update { id: String, name: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum BookCommand {
    List,
    Show {
        id: String,
    },
    Create(BookArgs),
    Update {
        id: String,
        #[command(flatten)]
        book: BookArgs,
    },
    Delete {
        id: String,
    },
    /// Attach a cover image to an existing book.
    SetCover {
        id: String,
        path: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
}

#[derive(Args, Debug)]
struct BookArgs {
    #[arg(long)]
    title: String,
    /// Author id
    #[arg(long)]
    author: String,
    #[arg(long, default_value = "")]
    description: String,
    /// YYYY-MM-DD
    #[arg(long)]
    publish_date: NaiveDate,
    #[arg(long)]
    page_count: u32,
    #[arg(long)]
    cover: Option<PathBuf>,
    #[arg(long)]
    content_type: Option<String>,
}

impl BookArgs {
    fn draft(&self) -> BookDraft {
        BookDraft {
            title: self.title.clone(),
            author: AuthorId::from(self.author.as_str()),
            description: self.description.clone(),
            publish_date: self.publish_date,
            page_count: self.page_count,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let settings = load_settings(cli.api_url.as_deref())?;
    info!("catalog: using record api {}", settings.api_base_url);
    let client = CatalogClient::with_timeout(&settings.api_base_url, settings.request_timeout())?;
    let store = HttpObjectStore::with_timeout(settings.request_timeout())?;

    match cli.command {
        Command::Authors(command) => run_author_command(&client, command).await,
        Command::Books(command) => run_book_command(client, store, command).await,
    }
}

async fn run_author_command(client: &CatalogClient, command: AuthorCommand) -> Result<()> {
    match command {
        AuthorCommand::List => {
            for author in client.list_authors().await? {
                println!("{}\t{}", author.id, author.name);
            }
        }
        AuthorCommand::Show { id } => {
            let details = client.author_details(&AuthorId::from(id)).await?;
            print!("{}", render_author_details(&details));
        }
        AuthorCommand::Create { name } => {
            let id = client.create_author(&AuthorDraft { name }).await?;
            println!("Author saved! id={id}");
        }
        AuthorCommand::Update { id, name } => {
            client
                .update_author(&AuthorId::from(id.as_str()), &AuthorDraft { name })
                .await?;
            println!("Author saved! id={id}");
        }
        AuthorCommand::Delete { id } => {
            client.delete_author(&AuthorId::from(id.as_str())).await?;
            println!("Deleted author {id}");
        }
    }
    Ok(())
}

async fn run_book_command(
    client: CatalogClient,
    store: HttpObjectStore,
    command: BookCommand,
) -> Result<()> {
    match command {
        BookCommand::List => {
            for book in client.list_books().await? {
                let cover = book.cover_image_s3_key.as_deref().unwrap_or("-");
                println!("{}\t{}\t{}\t{cover}", book.id, book.title, book.author);
            }
        }
        BookCommand::Show { id } => {
            let details = client.book_details(&BookId::from(id)).await?;
            print!("{}", render_book_details(&details));
        }
        BookCommand::Create(book) => {
            let cover = read_cover(book.cover.as_ref(), book.content_type.as_deref()).await?;
            let saved = client
                .save_book_with_cover(&store, None, &book.draft(), cover)
                .await?;
            println!("Book saved! id={}", saved.id);
            report_cover(saved.cover)?;
        }
        BookCommand::Update { id, book } => {
            let cover = read_cover(book.cover.as_ref(), book.content_type.as_deref()).await?;
            let id = BookId::from(id);
            let saved = client
                .save_book_with_cover(&store, Some(&id), &book.draft(), cover)
                .await?;
            println!("Book saved! id={}", saved.id);
            report_cover(saved.cover)?;
        }
        BookCommand::Delete { id } => {
            client.delete_book(&BookId::from(id.as_str())).await?;
            println!("Deleted book {id}");
        }
        BookCommand::SetCover {
            id,
            path,
            content_type,
        } => {
            let Some(cover) = read_cover(Some(&path), content_type.as_deref()).await? else {
                bail!("no cover file given");
            };
            let request = UploadRequest::new(
                ResourceRef::book(&BookId::from(id)),
                cover.bytes,
                cover.content_type,
            )?;
            let coordinator = CoverUploadCoordinator::new(Arc::new(client), Arc::new(store));
            report_cover(Some(coordinator.upload(&request).await))?;
        }
    }
    Ok(())
}

fn render_author_details(details: &AuthorDetails) -> String {
    let mut out = format!("{}\t{}\n", details.author.id, details.author.name);
    if details.books.is_empty() {
        out.push_str("No books by this author.\n");
    }
    for book in &details.books {
        out.push_str(&format!("  {}\t{}\n", book.id, book.title));
    }
    out
}

/// Falls back to the raw author id when the author could not be fetched.
fn render_book_details(details: &BookDetails) -> String {
    let book = &details.book;
    let author = details
        .author
        .as_ref()
        .map(|author| author.name.as_str())
        .unwrap_or(book.author.as_str());
    let mut out = format!("{}\t{}\nAuthor: {author}\n", book.id, book.title);
    if !book.description.is_empty() {
        out.push_str(&format!("Description: {}\n", book.description));
    }
    if let Some(date) = book.publish_date {
        out.push_str(&format!("Published: {date}\n"));
    }
    if let Some(pages) = book.page_count {
        out.push_str(&format!("Pages: {pages}\n"));
    }
    if let Some(key) = &book.cover_image_s3_key {
        out.push_str(&format!("Cover: {key}\n"));
    }
    out
}

async fn read_cover(
    path: Option<&PathBuf>,
    content_type: Option<&str>,
) -> Result<Option<CoverFile>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let content_type = match content_type {
        Some(content_type) => content_type.to_string(),
        None => mime_guess::from_path(path)
            .first_raw()
            .map(str::to_string)
            .with_context(|| {
                format!(
                    "cannot guess content type of '{}', pass --content-type",
                    path.display()
                )
            })?,
    };
    if !content_type.starts_with("image/") {
        bail!("cover must be an image, got {content_type}");
    }
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read cover '{}'", path.display()))?;
    Ok(Some(CoverFile {
        bytes,
        content_type,
    }))
}

fn report_cover(outcome: Option<UploadOutcome>) -> Result<()> {
    match outcome {
        None => Ok(()),
        Some(outcome @ UploadOutcome::Linked(_)) => {
            println!("{outcome}");
            Ok(())
        }
        Some(UploadOutcome::UploadFailed(reason)) => {
            bail!("cover upload failed: {reason}; retrying is safe")
        }
        Some(UploadOutcome::LinkFailed(reason)) => {
            bail!("Book saved, but failed to link cover image: {reason}")
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
