use anyhow::Result;
use colored::Colorize;
use inquire::Select;

use crate::config::Config;
use crate::storage::{Database, GroupStore};
use crate::translate::SUPPORTED_LANGUAGES;

pub async fn run() -> Result<()> {
    println!();
    println!(
        "    {}",
        "╭──────────────────────────────────────────────────────╮".bright_black()
    );
    println!(
        "    {}            {}            {}",
        "│".bright_black(),
        "⚙️  SETTINGS ⚙️".bold().white(),
        "│".bright_black()
    );
    println!(
        "    {}",
        "╰──────────────────────────────────────────────────────╯".bright_black()
    );
    println!();

    let mut config = Config::load()?;

    let options = vec![
        "🌐  Translation languages │ Source and target defaults",
        "📂  Default group         │ Where new cards land",
        "📋  View settings         │ See current configuration",
        "←   Back",
    ];

    loop {
        let selection = Select::new("What would you like to configure?", options.clone()).prompt();

        let selection = match selection {
            Ok(s) => s,
            Err(inquire::InquireError::OperationCanceled)
            | Err(inquire::InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e.into()),
        };

        match selection {
            s if s.contains("languages") => {
                if let Err(e) = set_languages(&mut config) {
                    eprintln!("{} {}", "Error:".red(), e);
                }
            }
            s if s.contains("Default group") => {
                if let Err(e) = set_default_group(&mut config) {
                    eprintln!("{} {}", "Error:".red(), e);
                }
            }
            s if s.contains("View") => view_config(&config),
            _ => break,
        }

        println!();
    }

    Ok(())
}

fn set_languages(config: &mut Config) -> Result<()> {
    let source_options: Vec<String> = SUPPORTED_LANGUAGES
        .iter()
        .map(|(code, name)| format!("{} - {}", code, name))
        .collect();

    // Target cannot be auto-detected.
    let target_options: Vec<String> = SUPPORTED_LANGUAGES
        .iter()
        .filter(|(code, _)| *code != "auto")
        .map(|(code, name)| format!("{} - {}", code, name))
        .collect();

    let source = Select::new("Source language:", source_options).prompt()?;
    let target = Select::new("Target language:", target_options).prompt()?;

    config.source_lang = source.split(" - ").next().unwrap_or("auto").to_string();
    config.target_lang = target.split(" - ").next().unwrap_or("en").to_string();
    config.save()?;

    println!(
        "{} Translating {} → {}.",
        "✓".green(),
        config.source_lang.yellow(),
        config.target_lang.yellow()
    );

    Ok(())
}

fn set_default_group(config: &mut Config) -> Result<()> {
    let db = Database::open()?;
    let groups = GroupStore::new(&db).get_all()?;

    let options: Vec<String> = groups
        .iter()
        .map(|g| format!("{} ({} cards)", g.name, g.card_count))
        .collect();

    let selection = Select::new("Default group for new cards:", options.clone()).prompt()?;
    let idx = options.iter().position(|o| *o == selection).unwrap_or(0);

    config.default_group = Some(groups[idx].id.clone());
    config.save()?;

    println!(
        "{} New cards default to {}.",
        "✓".green(),
        groups[idx].name.yellow()
    );

    Ok(())
}

fn view_config(config: &Config) {
    println!("\n{}", "Current Configuration:".bold());
    println!("{}", "─".repeat(30).dimmed());
    println!(
        "  Languages: {} → {}",
        config.source_lang.cyan(),
        config.target_lang.cyan()
    );
    println!(
        "  Default group: {}",
        config
            .default_group
            .as_deref()
            .unwrap_or("default")
            .cyan()
    );
    match Config::config_path() {
        Ok(path) => println!("  Config file: {}", path.display().to_string().dimmed()),
        Err(_) => println!("  Config file: {}", "unknown".dimmed()),
    }
}
