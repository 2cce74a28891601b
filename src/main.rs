use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use notepool::{
    ActionItem, ActionItemFilter, ActionItemId, Note, NoteId, NoteService, Page, StoreConfig,
    StoreConfigBuilder, StoreError, logging,
};
use time::format_description::well_known::Rfc3339;

/// notepool - notes and action items in a local SQLite file
#[derive(Parser)]
#[command(name = "notepool")]
#[command(about = "Notes and action items backed by a pooled, cached SQLite store")]
#[command(version)]
struct Cli {
    /// Database file (overrides NOTEPOOL_DB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage notes
    #[command(subcommand)]
    Note(NoteCommand),

    /// Manage action items
    #[command(subcommand)]
    Item(ItemCommand),

    /// Create a note and its action items in one step
    Capture(CaptureCommand),

    /// Show table, cache, and pool statistics
    Stats,

    /// Run ANALYZE and VACUUM on the database
    Optimize,
}

#[derive(Subcommand)]
enum NoteCommand {
    /// Add a note
    Add {
        #[arg(value_name = "CONTENT")]
        content: String,
    },
    /// List notes, newest first
    List(PageArgs),
    /// Show one note and its action items
    Show { id: i64 },
    /// Replace a note's content
    Edit {
        id: i64,
        #[arg(value_name = "CONTENT")]
        content: String,
    },
    /// Delete a note and its action items
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum ItemCommand {
    /// Add an action item
    Add {
        #[arg(value_name = "TEXT")]
        text: String,
        /// Note that owns the item
        #[arg(short, long)]
        note: Option<i64>,
    },
    /// List action items, newest first
    List {
        /// Only items owned by this note
        #[arg(short, long)]
        note: Option<i64>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Mark an action item done (or not done with --undo)
    Done {
        id: i64,
        #[arg(long)]
        undo: bool,
    },
    /// Delete an action item
    Delete { id: i64 },
}

#[derive(Args)]
struct CaptureCommand {
    /// The content of the note
    #[arg(value_name = "CONTENT")]
    content: String,

    /// Action item text; repeat for several items
    #[arg(short, long = "item", value_name = "TEXT")]
    items: Vec<String>,
}

#[derive(Args)]
struct PageArgs {
    /// Maximum rows to show
    #[arg(short, long)]
    limit: Option<u32>,

    /// Rows to skip
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

impl PageArgs {
    fn page(&self) -> Page {
        Page {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = open_service(cli.db.clone()).and_then(|service| {
        let mut out = io::stdout().lock();
        let result = execute(&cli.command, &service, &mut out);
        service.shutdown();
        result
    });

    if let Err(e) = result {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Validation and not-found errors are the caller's fault; everything else is
/// internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<StoreError>()
        .is_some_and(|e| e.kind().is_user_error())
}

fn load_config(db: Option<PathBuf>) -> Result<StoreConfig> {
    let mut builder = StoreConfigBuilder::new();
    if let Some(path) = db {
        builder = builder.database_path(path);
    }
    Ok(builder.build()?)
}

fn open_service(db: Option<PathBuf>) -> Result<NoteService> {
    let config = load_config(db)?;
    NoteService::open(&config).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.pool.path.display()
        )
    })
}

fn execute(command: &Commands, service: &NoteService, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Note(cmd) => execute_note(cmd, service, out),
        Commands::Item(cmd) => execute_item(cmd, service, out),
        Commands::Capture(cmd) => execute_capture(cmd, service, out),
        Commands::Stats => execute_stats(service, out),
        Commands::Optimize => {
            service.optimize_database()?;
            writeln!(out, "Database optimized")?;
            Ok(())
        }
    }
}

fn execute_note(cmd: &NoteCommand, service: &NoteService, out: &mut impl Write) -> Result<()> {
    match cmd {
        NoteCommand::Add { content } => {
            let note = service.create_note(content)?;
            writeln!(out, "Note created (id: {})", note.id)?;
        }
        NoteCommand::List(page) => {
            let notes = service.list_notes(page.page())?;
            if notes.is_empty() {
                writeln!(out, "No notes")?;
            }
            for note in &notes {
                write_note(out, note)?;
            }
        }
        NoteCommand::Show { id } => {
            let id = NoteId::new(*id);
            let note = service
                .get_note(id)?
                .ok_or_else(|| StoreError::not_found("note", id.get()))?;
            write_note(out, &note)?;
            for item in service.list_action_items(ActionItemFilter::for_note(id))? {
                write_item(out, &item)?;
            }
        }
        NoteCommand::Edit { id, content } => {
            let id = NoteId::new(*id);
            if !service.update_note(id, content)? {
                return Err(StoreError::not_found("note", id.get()).into());
            }
            writeln!(out, "Note updated (id: {id})")?;
        }
        NoteCommand::Delete { id } => {
            service.delete_note(NoteId::new(*id))?;
            writeln!(out, "Note deleted (id: {id})")?;
        }
    }
    Ok(())
}

fn execute_item(cmd: &ItemCommand, service: &NoteService, out: &mut impl Write) -> Result<()> {
    match cmd {
        ItemCommand::Add { text, note } => {
            let item = service.create_action_item(text, note.map(NoteId::new))?;
            writeln!(out, "Action item created (id: {})", item.id)?;
        }
        ItemCommand::List { note, page } => {
            let filter = ActionItemFilter {
                note_id: note.map(NoteId::new),
                page: page.page(),
            };
            let items = service.list_action_items(filter)?;
            if items.is_empty() {
                writeln!(out, "No action items")?;
            }
            for item in &items {
                write_item(out, item)?;
            }
        }
        ItemCommand::Done { id, undo } => {
            let id = ActionItemId::new(*id);
            if !service.update_action_item_status(id, !undo)? {
                return Err(StoreError::not_found("action item", id.get()).into());
            }
            let state = if *undo { "open" } else { "done" };
            writeln!(out, "Action item {id} marked {state}")?;
        }
        ItemCommand::Delete { id } => {
            service.delete_action_item(ActionItemId::new(*id))?;
            writeln!(out, "Action item deleted (id: {id})")?;
        }
    }
    Ok(())
}

fn execute_capture(cmd: &CaptureCommand, service: &NoteService, out: &mut impl Write) -> Result<()> {
    let (note, ids) = service
        .create_note_with_action_items(&cmd.content, &cmd.items)
        .context("Failed to capture note")?;

    write!(out, "Note created (id: {})", note.id)?;
    if !ids.is_empty() {
        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        write!(out, " with action items: {}", ids.join(", "))?;
    }
    writeln!(out)?;
    Ok(())
}

fn execute_stats(service: &NoteService, out: &mut impl Write) -> Result<()> {
    let stats = service.stats()?;
    writeln!(out, "notes:        {}", stats.tables.notes)?;
    writeln!(out, "action items: {}", stats.tables.action_items)?;
    writeln!(out, "size:         {} bytes", stats.tables.size_bytes)?;
    writeln!(
        out,
        "cache:        {} entries (default ttl {}s)",
        stats.cache.size,
        stats.cache.default_ttl.as_secs()
    )?;
    writeln!(
        out,
        "pool:         {} idle / {} live / {} max ({:?})",
        stats.pool.idle, stats.pool.live, stats.pool.max_connections, stats.pool.policy
    )?;
    Ok(())
}

fn write_note(out: &mut impl Write, note: &Note) -> Result<()> {
    let created = note.created_at.format(&Rfc3339)?;
    writeln!(out, "[{}] {}  {}", note.id, created, note.content)?;
    Ok(())
}

fn write_item(out: &mut impl Write, item: &ActionItem) -> Result<()> {
    let mark = if item.done { "x" } else { " " };
    writeln!(out, "  [{mark}] {} {}", item.id, item.text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (tempfile::TempDir, NoteService) {
        let dir = tempfile::tempdir().unwrap();
        let service = NoteService::open(&StoreConfig::for_path(dir.path().join("cli.db"))).unwrap();
        (dir, service)
    }

    fn run(service: &NoteService, args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("notepool").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        execute(&cli.command, service, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn note_add_prints_the_new_id() {
        let (_dir, service) = service();

        let output = run(&service, &["note", "add", "Buy milk"]).unwrap();

        assert_eq!(output, "Note created (id: 1)\n");
    }

    #[test]
    fn capture_links_items_to_the_note() {
        let (_dir, service) = service();

        let output = run(
            &service,
            &["capture", "Trip", "--item", "Book flight", "-i", "Pack"],
        )
        .unwrap();

        assert_eq!(output, "Note created (id: 1) with action items: 1, 2\n");
        let shown = run(&service, &["note", "show", "1"]).unwrap();
        assert!(shown.contains("[ ] 1 Book flight"));
        assert!(shown.contains("[ ] 2 Pack"));
    }

    #[test]
    fn item_done_marks_the_item() {
        let (_dir, service) = service();
        run(&service, &["item", "add", "Call mom"]).unwrap();

        run(&service, &["item", "done", "1"]).unwrap();

        let listed = run(&service, &["item", "list"]).unwrap();
        assert!(listed.contains("[x] 1 Call mom"));
    }

    #[test]
    fn blank_content_is_a_user_error() {
        let (_dir, service) = service();

        let err = run(&service, &["note", "add", "   "]).unwrap_err();

        assert!(is_user_error(&err));
    }

    #[test]
    fn missing_note_is_a_user_error() {
        let (_dir, service) = service();

        let err = run(&service, &["note", "show", "42"]).unwrap_err();

        assert!(is_user_error(&err));
        assert_eq!(err.to_string(), "note not found: 42");
    }

    #[test]
    fn database_failures_are_internal_errors() {
        let err = anyhow::Error::from(StoreError::database("create note", "disk I/O error"));

        assert!(!is_user_error(&err));
    }

    #[test]
    fn capture_context_keeps_the_store_error_reachable() {
        let (_dir, service) = service();

        let err = run(&service, &["capture", "Trip", "--item", ""]).unwrap_err();

        assert!(is_user_error(&err));
    }

    #[test]
    fn list_with_no_notes_says_so() {
        let (_dir, service) = service();

        assert_eq!(run(&service, &["note", "list"]).unwrap(), "No notes\n");
    }
}
