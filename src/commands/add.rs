use anyhow::Result;
use colored::Colorize;
use inquire::{Select, Text};

use crate::commands::create_spinner;
use crate::config::Config;
use crate::storage::{Database, FlashcardStore, GroupStore, StoreError};
use crate::translate::{Translation, Translator};

pub async fn run(word: Option<String>) -> Result<()> {
    let config = Config::load()?;

    let word = match word {
        Some(w) => w,
        None => Text::new("Word or phrase to learn:")
            .with_help_message("It will be translated and saved as a flashcard")
            .prompt()?,
    };

    let spinner = create_spinner("Translating...");
    let result = Translator::new()
        .translate(&word, &config.source_lang, &config.target_lang)
        .await;
    spinner.finish_and_clear();

    let translation = match result {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} {}", "Translation failed:".red(), e);
            return Ok(());
        }
    };

    crate::commands::translate::print_translation(&translation);
    save_card(&translation, &config)?;

    Ok(())
}

/// Persist a translation as a flashcard, letting the user pick a group
/// when more than the default exists.
pub(crate) fn save_card(translation: &Translation, config: &Config) -> Result<()> {
    let db = Database::open()?;
    let groups = GroupStore::new(&db).get_all()?;

    let group_id = if groups.len() > 1 {
        let options: Vec<String> = groups
            .iter()
            .map(|g| format!("{} ({} cards)", g.name, g.card_count))
            .collect();
        let selection = Select::new("Save to which group?", options.clone()).prompt();
        match selection {
            Ok(s) => {
                let idx = options.iter().position(|o| *o == s).unwrap_or(0);
                groups[idx].id.clone()
            }
            Err(inquire::InquireError::OperationCanceled)
            | Err(inquire::InquireError::OperationInterrupted) => {
                println!("{}", "Not saved.".dimmed());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        config.group_id().to_string()
    };

    match FlashcardStore::new(&db).create_from_translation(translation, Some(&group_id)) {
        Ok(card) => {
            println!(
                "{} Saved {} ({} → {})",
                "✓".green(),
                card.word.bold(),
                card.source_lang,
                card.target_lang
            );
        }
        Err(e) => match e.downcast_ref::<StoreError>() {
            Some(StoreError::Duplicate { word, .. }) => {
                println!(
                    "{} A card for {} already exists.",
                    "!".yellow(),
                    word.bold()
                );
            }
            _ => return Err(e),
        },
    }

    Ok(())
}
