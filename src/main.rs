use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::Colorize;
use std::io;

mod api;
mod commands;
mod config;
mod scheduler;
mod session;
mod storage;
mod translate;

/// ASCII art banner for the application
const BANNER: &str = r#"
  _              _ ____            _
 | |    _____  _(_)  _ \  ___  ___| | __
 | |   / _ \ \/ / | | | |/ _ \/ __| |/ /
 | |__|  __/>  <| | |_| |  __/ (__|   <
 |_____\___/_/\_\_|____/ \___|\___|_|\_\
"#;

/// Print the application banner
fn print_banner() {
    println!("{}", BANNER.cyan().bold());
}

/// Print a styled status line
fn print_status(label: &str, value: &str, icon: &str) {
    println!(
        "  {} {} {}",
        icon,
        format!("{}:", label).dimmed(),
        value.cyan()
    );
}

#[derive(Parser)]
#[command(name = "lexideck")]
#[command(about = "Spaced-repetition flashcards for language learning")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a word and save it as a flashcard
    Add {
        /// Word or phrase (skips interactive prompt if provided)
        word: Option<String>,
    },
    /// Translate text without saving
    Translate {
        /// Text to translate
        text: Option<String>,
        /// Source language code (defaults to config)
        #[arg(long)]
        from: Option<String>,
        /// Target language code (defaults to config)
        #[arg(long)]
        to: Option<String>,
        /// Only report the detected source language
        #[arg(long)]
        detect: bool,
    },
    /// List flashcards
    List {
        /// Restrict to one group id
        #[arg(long)]
        group: Option<String>,
    },
    /// Search flashcards by word, translation, or tag
    Search {
        /// Search query
        query: Option<String>,
    },
    /// Browse and manage flashcards (view, favorite, move, delete)
    Cards,
    /// Delete a flashcard by id
    Delete {
        /// Flashcard id to delete
        id: Option<String>,
    },
    /// Manage flashcard groups
    Groups {
        #[command(subcommand)]
        action: Option<GroupAction>,
    },
    /// Start a study session
    Study {
        #[command(subcommand)]
        action: Option<StudyAction>,
    },
    /// Show study statistics and streak
    Stats,
    /// Configure settings (languages, default group)
    Config,
    /// Handle a single JSON API request
    Api {
        /// JSON request (reads stdin if omitted)
        request: Option<String>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum GroupAction {
    /// Create a new group
    Create {
        /// Group name
        name: Option<String>,
    },
    /// List all groups
    List,
}

#[derive(Subcommand)]
enum StudyAction {
    /// Review all cards due now
    Due,
    /// Learn cards never reviewed before
    New {
        /// Cap on new cards (default 20)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Study a custom selection
    Custom {
        /// Group id to draw cards from
        #[arg(long)]
        group: Option<String>,
        /// Tags every card must carry (repeatable)
        #[arg(long)]
        tag: Vec<String>,
        /// Cap on session size
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Add { word }) => {
            commands::add::run(word).await?;
        }
        Some(Commands::Translate {
            text,
            from,
            to,
            detect,
        }) => {
            commands::translate::run(text, from, to, detect).await?;
        }
        Some(Commands::List { group }) => {
            commands::cards::list(group).await?;
        }
        Some(Commands::Search { query }) => {
            commands::cards::search(query).await?;
        }
        Some(Commands::Cards) => {
            commands::cards::run().await?;
        }
        Some(Commands::Delete { id }) => {
            commands::cards::delete(id).await?;
        }
        Some(Commands::Groups { action }) => match action {
            Some(GroupAction::Create { name }) => {
                commands::groups::create(name).await?;
            }
            Some(GroupAction::List) => {
                commands::groups::list().await?;
            }
            None => {
                commands::groups::run().await?;
            }
        },
        Some(Commands::Study { action }) => match action {
            Some(StudyAction::Due) => {
                commands::study::due().await?;
            }
            Some(StudyAction::New { limit }) => {
                commands::study::new_cards(limit).await?;
            }
            Some(StudyAction::Custom { group, tag, limit }) => {
                commands::study::custom(group, tag, limit).await?;
            }
            None => {
                commands::study::run().await?;
            }
        },
        Some(Commands::Stats) => {
            commands::stats::run().await?;
        }
        Some(Commands::Config) => {
            commands::config::run().await?;
        }
        Some(Commands::Api { request }) => {
            commands::api::run(request).await?;
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
        None => {
            // No subcommand - show interactive menu
            run_interactive().await?;
        }
    }

    Ok(())
}

async fn run_interactive() -> Result<()> {
    use inquire::Select;

    print_banner();

    println!(
        "  {} {}",
        "Version:".dimmed(),
        env!("CARGO_PKG_VERSION").cyan()
    );
    println!(
        "  {} {}\n",
        "Scheduler:".dimmed(),
        "FSRS spaced repetition".green()
    );

    println!("{}", "─".repeat(50).dimmed());

    // Collection status for the header
    let (cards, due, streak) = storage::Database::open()
        .and_then(|db| {
            let store = storage::FlashcardStore::new(&db);
            let now = chrono::Utc::now();
            let manager = session::SessionManager::new(&db);
            Ok((
                store.count()?,
                store.count_due(now)?,
                manager.streak()?.current,
            ))
        })
        .unwrap_or((0, 0, 0));

    print_status("Cards", &cards.to_string(), "🃏");
    let due_display = if due > 0 {
        format!("{} due now", due).yellow().to_string()
    } else {
        "all caught up".green().to_string()
    };
    print_status("Reviews", &due_display, "🔁");
    print_status("Streak", &format!("{} day(s)", streak), "🔥");

    println!("{}\n", "─".repeat(50).dimmed());

    let options = vec![
        "🔁  Study (due cards, new cards, custom)",
        "📥  Add a word",
        "🌐  Translate text",
        "🃏  Browse flashcards",
        "🗂   Manage groups",
        "📊  Statistics",
        "⚙️   Configure settings",
        "🚪  Exit",
    ];

    let selection = Select::new("What would you like to do?", options)
        .with_help_message("Use arrow keys to navigate, Enter to select")
        .prompt()?;

    println!(); // Add spacing

    match selection {
        s if s.contains("Study") => commands::study::run().await?,
        s if s.contains("Add a word") => commands::add::run(None).await?,
        s if s.contains("Translate") => commands::translate::run(None, None, None, false).await?,
        s if s.contains("Browse") => commands::cards::run().await?,
        s if s.contains("Manage groups") => commands::groups::run().await?,
        s if s.contains("Statistics") => commands::stats::run().await?,
        s if s.contains("Configure") => commands::config::run().await?,
        s if s.contains("Exit") => {
            println!("{}", "👋 Happy learning!".cyan());
        }
        _ => unreachable!(),
    }

    Ok(())
}
