//! services/shelf/src/cli.rs
//!
//! The command-line front end. It only parses arguments, calls the `Library`
//! and prints plain text; all state lives behind the core ports.

use crate::error::AppError;
use clap::{Parser, Subcommand};
use shelf_core::paging::page_count;
use shelf_core::{Library, OpenOutcome, Page, Record, RecordBody, Source, Theme};

//=========================================================================================
// Argument Definitions
//=========================================================================================

#[derive(Parser, Debug)]
#[command(name = "shelf", version, about = "Browse annotated books and vocabulary decks stored locally")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Annotated book exports
    Books {
        #[command(subcommand)]
        action: BooksAction,
    },
    /// Word dictionaries
    Words {
        #[command(subcommand)]
        action: WordsAction,
    },
    /// The set of already learned words
    Learned {
        #[command(subcommand)]
        action: LearnedAction,
    },
    /// List imported sources
    Sources,
    /// Make a stored source the active one
    Use { source_id: i64 },
    /// Show the current page of the active source
    Page,
    /// Advance one page
    Next,
    /// Go back one page
    Prev,
    /// Jump to a 1-based page number
    Jump { page: usize },
    /// Case-insensitive title search in the active source
    Search { term: String },
    /// Show or change the theme (light or dark)
    Theme { value: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum BooksAction {
    /// Import a {books, annotations} export. Reuses the last URL when omitted.
    Import {
        url: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// List books that have annotations
    List {
        /// Include books without annotations
        #[arg(long)]
        all: bool,
    },
    /// Print the annotations of one book
    Show { key: String },
}

#[derive(Subcommand, Debug)]
pub enum WordsAction {
    /// Open a dictionary, importing it if it is not stored yet
    Open {
        url: String,
        #[arg(long)]
        name: Option<String>,
        /// Fetch again even if the dictionary is already stored
        #[arg(long)]
        refresh: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum LearnedAction {
    /// Merge a JSON array of words into the learned set
    Import { url: String },
    /// Print the learned set
    List,
}

//=========================================================================================
// Command Dispatch
//=========================================================================================

pub async fn run(command: Command, library: &Library) -> Result<(), AppError> {
    match command {
        Command::Books { action } => run_books(action, library).await?,
        Command::Words {
            action: WordsAction::Open { url, name, refresh },
        } => match library.open_dictionary(&url, name.as_deref(), refresh).await? {
            OpenOutcome::Reused(source) => {
                println!("Using stored dictionary {}", render_source(&source));
            }
            OpenOutcome::Imported(report) => {
                println!(
                    "Imported {} new words ({} in dictionary) into source {}",
                    report.inserted, report.total, report.source_id
                );
            }
        },
        Command::Learned { action } => match action {
            LearnedAction::Import { url } => {
                let result = library.import_learned(&url).await?;
                println!("Learned words: {} read, {} added", result.total, result.added);
            }
            LearnedAction::List => {
                for word in library.learned_words().await? {
                    println!("{}", word);
                }
            }
        },
        Command::Sources => {
            let active = library.active_source();
            for source in library.sources().await? {
                let marker = if Some(source.id) == active { "*" } else { " " };
                println!("{} {}", marker, render_source(&source));
            }
        }
        Command::Use { source_id } => {
            let source = library.select_source(source_id).await?;
            println!("Active source: {}", render_source(&source));
        }
        Command::Page => print_page(&library.current_page().await?, library.page_size()),
        Command::Next => print_page(&library.next_page().await?, library.page_size()),
        Command::Prev => print_page(&library.prev_page().await?, library.page_size()),
        Command::Jump { page } => match library.jump_to_page(page).await? {
            Some(found) => print_page(&found, library.page_size()),
            None => return Err(AppError::Usage(format!("page {} does not exist", page))),
        },
        Command::Search { term } => {
            for record in library.search(&term).await? {
                println!("{}", render_record(&record));
            }
        }
        Command::Theme { value: None } => println!("{}", library.theme().as_str()),
        Command::Theme { value: Some(value) } => {
            let theme = Theme::parse(&value)
                .ok_or_else(|| AppError::Usage(format!("unknown theme '{}'", value)))?;
            library.set_theme(theme);
            println!("{}", theme.as_str());
        }
    }
    Ok(())
}

async fn run_books(action: BooksAction, library: &Library) -> Result<(), AppError> {
    match action {
        BooksAction::Import { url, name } => {
            let url = url
                .or_else(|| library.data_url())
                .ok_or_else(|| AppError::Usage("no URL given and none remembered".to_string()))?;
            library.set_data_url(&url);
            let report = library.import_books(&url, name.as_deref()).await?;
            println!("Imported {} books into source {}", report.total, report.source_id);
        }
        BooksAction::List { all } => {
            let books = if all {
                library.active_records().await?
            } else {
                library.book_listing().await?
            };
            for book in books {
                println!("{}", render_record(&book));
            }
        }
        BooksAction::Show { key } => {
            for annotation in library.annotations(&key).await? {
                println!("> {}", annotation.text);
                if let Some(note) = annotation.note {
                    println!("  {}", note);
                }
            }
        }
    }
    Ok(())
}

//=========================================================================================
// Rendering
//=========================================================================================

fn print_page(page: &Page<Record>, page_size: usize) {
    print!("{}", render_page(page, page_size));
}

pub fn render_source(source: &Source) -> String {
    format!(
        "[{}] {} ({}) added {}",
        source.id,
        source.name,
        source.url,
        source.created_at.format("%Y-%m-%d")
    )
}

pub fn render_record(record: &Record) -> String {
    match &record.body {
        RecordBody::Book(book) => format!(
            "{}  {} by {} ({} notes)",
            record.key, book.title, book.author, record.notes_count
        ),
        RecordBody::Word(word) => match &word.note {
            Some(note) => format!("{}  {}  [{}]", word.word, word.translation, note),
            None => format!("{}  {}", word.word, word.translation),
        },
    }
}

pub fn render_page(page: &Page<Record>, page_size: usize) -> String {
    let mut out = String::new();
    for record in &page.items {
        out.push_str(&render_record(record));
        out.push('\n');
    }
    let pages = page_count(page.total, page_size);
    let current = if pages == 0 { 0 } else { page.offset / page_size.max(1) + 1 };
    out.push_str(&format!(
        "-- page {}/{} ({} items){}{}\n",
        current,
        pages,
        page.total,
        if page.has_prev { " [prev]" } else { "" },
        if page.has_next { " [next]" } else { "" },
    ));
    out
}
