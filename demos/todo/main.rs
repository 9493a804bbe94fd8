//! stashdb Todo Demo
//!
//! A command-line todo list backed by stashdb:
//! - Declares a `todolist` store with an auto-increment `id`
//! - Bootstraps storage once per invocation
//! - Drives the typed action set for every command
//!
//! Run with: cargo run -p todo_demo -- add "buy milk"

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use stashdb_store::{Actions, Engine, SchemaConfig, Storage, StoreSchema};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const STORE: &str = "todolist";

/// A single todo item.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Todo {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    description: String,
    done: bool,
}

/// Command-line todo list backed by stashdb.
#[derive(Parser)]
#[command(name = "todo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the todo database
    #[arg(global = true, short, long, default_value = "todo_data")]
    path: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new todo
    Add {
        /// What needs doing
        description: String,
    },

    /// List all todos
    List,

    /// Mark a todo as done (by list position)
    Done {
        /// Position from `list`
        index: usize,
    },

    /// Mark a todo as not done (by list position)
    Undone {
        /// Position from `list`
        index: usize,
    },

    /// Remove a todo (by list position)
    Rm {
        /// Position from `list`
        index: usize,
    },

    /// Remove all todos
    Clear,
}

fn schema() -> SchemaConfig {
    SchemaConfig::new("todo-db", 1).store(StoreSchema::new(STORE, "id", true))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let storage = Storage::new(Engine::open_dir(&cli.path)?);
    storage.setup(schema()).await?;
    let todos = storage.actions::<Todo>(STORE);

    match cli.command {
        Commands::Add { description } => {
            let key = todos
                .add(
                    &Todo {
                        id: None,
                        description: description.clone(),
                        done: false,
                    },
                    None,
                )
                .await?;
            println!("added #{key}: {description}");
        }
        Commands::List => {
            let all = todos.get_all().await?;
            if all.is_empty() {
                println!("nothing to do");
            }
            for (index, todo) in all.iter().enumerate() {
                let mark = if todo.done { "x" } else { " " };
                println!("{index:>3} [{mark}] {}", todo.description);
            }
        }
        Commands::Done { index } => {
            let todo = set_done(&todos, index, true).await?;
            println!("done: {}", todo.description);
        }
        Commands::Undone { index } => {
            let todo = set_done(&todos, index, false).await?;
            println!("not done: {}", todo.description);
        }
        Commands::Rm { index } => {
            let todo = at_position(&todos, index).await?;
            if let Some(id) = todo.id {
                todos.delete_by_id(id).await?;
            }
            println!("removed: {}", todo.description);
        }
        Commands::Clear => {
            todos.delete_all().await?;
            println!("cleared");
        }
    }

    Ok(())
}

/// Looks up a todo by its `list` position.
async fn at_position(
    todos: &Actions<Todo>,
    index: usize,
) -> Result<Todo, Box<dyn std::error::Error>> {
    let all = todos.get_all().await?;
    all.get(index)
        .cloned()
        .ok_or_else(|| format!("no todo at position {index}").into())
}

/// Toggles the done flag of the todo at a `list` position.
async fn set_done(
    todos: &Actions<Todo>,
    index: usize,
    done: bool,
) -> Result<Todo, Box<dyn std::error::Error>> {
    let mut todo = at_position(todos, index).await?;
    todo.done = done;
    todos.update(&todo, None).await?;
    Ok(todo)
}
