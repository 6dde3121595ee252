use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use inquire::{Confirm, Select, Text};

use crate::scheduler::Proficiency;
use crate::storage::{Database, Flashcard, FlashcardStore, GroupStore, SearchFilter};

/// List cards, optionally restricted to one group.
pub async fn list(group: Option<String>) -> Result<()> {
    let db = Database::open()?;
    let store = FlashcardStore::new(&db);

    let cards = match group {
        Some(g) => store.search(&SearchFilter {
            group_id: Some(g),
            ..Default::default()
        })?,
        None => store.get_all()?,
    };

    if cards.is_empty() {
        println!(
            "\n{} No flashcards yet. Use {} to create one.",
            "✗".yellow(),
            "lexideck add".cyan()
        );
        return Ok(());
    }

    print_card_table(&cards);
    Ok(())
}

pub async fn search(query: Option<String>) -> Result<()> {
    let query = match query {
        Some(q) => q,
        None => Text::new("Search for:")
            .with_help_message("Matches word, translation, and tags")
            .prompt()?,
    };

    let db = Database::open()?;
    let cards = FlashcardStore::new(&db).search(&SearchFilter {
        query: Some(query.clone()),
        ..Default::default()
    })?;

    if cards.is_empty() {
        println!("\n{} No cards match '{}'.", "✗".yellow(), query);
        return Ok(());
    }

    println!(
        "\n{} {} result(s) for '{}':",
        "🔍".cyan(),
        cards.len(),
        query.bold()
    );
    print_card_table(&cards);
    Ok(())
}

pub async fn delete(id: Option<String>) -> Result<()> {
    let db = Database::open()?;
    let store = FlashcardStore::new(&db);

    let card = match id {
        Some(id) => match store.get(&id)? {
            Some(c) => c,
            None => {
                println!("{} No card with id {}.", "✗".red(), id);
                return Ok(());
            }
        },
        None => match pick_card(&store)? {
            Some(c) => c,
            None => return Ok(()),
        },
    };

    let confirmed = Confirm::new(&format!("Delete '{}'?", card.word))
        .with_default(false)
        .prompt()
        .unwrap_or(false);

    if confirmed {
        store.delete(&card.id)?;
        println!("{} Deleted {}.", "✓".green(), card.word.bold());
    } else {
        println!("{}", "Cancelled.".dimmed());
    }

    Ok(())
}

/// Interactive card manager: pick a card, then act on it.
pub async fn run() -> Result<()> {
    let db = Database::open()?;
    let store = FlashcardStore::new(&db);

    loop {
        let card = match pick_card(&store)? {
            Some(c) => c,
            None => return Ok(()),
        };

        print_card_details(&card);

        let options = vec![
            "⭐  Toggle favorite",
            "📂  Move to group",
            "🗑   Delete card",
            "←   Back",
        ];

        let action = match Select::new("What would you like to do?", options).prompt() {
            Ok(a) => a,
            Err(inquire::InquireError::OperationCanceled)
            | Err(inquire::InquireError::OperationInterrupted) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        match action {
            a if a.contains("favorite") => {
                let updated = store.toggle_favorite(&card.id)?;
                let state = if updated.favorite { "added to" } else { "removed from" };
                println!("{} {} {} favorites.", "✓".green(), updated.word.bold(), state);
            }
            a if a.contains("Move") => {
                move_card(&db, &store, &card)?;
            }
            a if a.contains("Delete") => {
                let confirmed = Confirm::new(&format!("Delete '{}'?", card.word))
                    .with_default(false)
                    .prompt()
                    .unwrap_or(false);
                if confirmed {
                    store.delete(&card.id)?;
                    println!("{} Deleted {}.", "✓".green(), card.word.bold());
                }
            }
            _ => return Ok(()),
        }

        println!();
    }
}

fn move_card(db: &Database, store: &FlashcardStore<'_>, card: &Flashcard) -> Result<()> {
    let groups = GroupStore::new(db).get_all()?;
    let options: Vec<String> = groups
        .iter()
        .filter(|g| g.id != card.group_id)
        .map(|g| format!("{} ({} cards)", g.name, g.card_count))
        .collect();

    if options.is_empty() {
        println!(
            "{} No other groups. Create one with {}.",
            "!".yellow(),
            "lexideck groups create".cyan()
        );
        return Ok(());
    }

    let selection = match Select::new("Move to which group?", options.clone()).prompt() {
        Ok(s) => s,
        Err(inquire::InquireError::OperationCanceled)
        | Err(inquire::InquireError::OperationInterrupted) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let idx = options.iter().position(|o| *o == selection).unwrap_or(0);
    let target = groups
        .iter()
        .filter(|g| g.id != card.group_id)
        .nth(idx)
        .map(|g| g.id.clone());

    if let Some(target) = target {
        let moved = store.move_to_group(&card.id, &target)?;
        println!("{} Moved {} to its new group.", "✓".green(), moved.word.bold());
    }

    Ok(())
}

fn pick_card(store: &FlashcardStore<'_>) -> Result<Option<Flashcard>> {
    let cards = store.get_all()?;
    if cards.is_empty() {
        println!(
            "\n{} No flashcards yet. Use {} to create one.",
            "✗".yellow(),
            "lexideck add".cyan()
        );
        return Ok(None);
    }

    let options: Vec<String> = cards.iter().map(format_card_line).collect();
    let selection = match Select::new("Select a card:", options.clone())
        .with_page_size(15)
        .prompt()
    {
        Ok(s) => s,
        Err(inquire::InquireError::OperationCanceled)
        | Err(inquire::InquireError::OperationInterrupted) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let idx = options.iter().position(|o| *o == selection).unwrap_or(0);
    Ok(cards.into_iter().nth(idx))
}

fn format_card_line(card: &Flashcard) -> String {
    let fav = if card.favorite { "★ " } else { "" };
    format!(
        "{}{} → {} [{}]",
        fav,
        card.word,
        card.translation,
        card.proficiency.as_str()
    )
}

fn print_card_table(cards: &[Flashcard]) {
    let now = Utc::now();
    println!();
    for card in cards {
        let due_marker = if card.is_due(now) {
            "●".yellow().to_string()
        } else {
            "○".dimmed().to_string()
        };
        let fav = if card.favorite { "★".yellow().to_string() } else { " ".to_string() };
        println!(
            "  {} {} {} {} {}",
            due_marker,
            fav,
            card.word.bold(),
            "→".dimmed(),
            card.translation.cyan()
        );
        println!(
            "      {} {} │ {} reviews │ group: {}",
            proficiency_badge(card.proficiency),
            format!("({}→{})", card.source_lang, card.target_lang).dimmed(),
            card.total_reviews,
            card.group_id.dimmed()
        );
    }
    println!("\n  {} card(s)\n", cards.len());
}

fn print_card_details(card: &Flashcard) {
    println!();
    println!("  {} {}", "Word:".dimmed(), card.word.bold());
    println!("  {} {}", "Translation:".dimmed(), card.translation.cyan());
    if let Some(p) = &card.pronunciation {
        println!("  {} {}", "Pronunciation:".dimmed(), p.italic());
    }
    if !card.examples.is_empty() {
        println!("  {}", "Examples:".dimmed());
        for ex in &card.examples {
            println!("    • {}", ex);
        }
    }
    if let Some(n) = &card.notes {
        println!("  {} {}", "Notes:".dimmed(), n);
    }
    if !card.tags.is_empty() {
        println!("  {} {}", "Tags:".dimmed(), card.tags.join(", "));
    }
    println!(
        "  {} {}",
        "Proficiency:".dimmed(),
        proficiency_badge(card.proficiency)
    );
    println!(
        "  {} {} reviews ({} correct, {} wrong)",
        "History:".dimmed(),
        card.total_reviews,
        card.correct_count,
        card.wrong_count
    );
    println!(
        "  {} {}",
        "Next review:".dimmed(),
        card.next_review().format("%Y-%m-%d %H:%M")
    );
    println!();
}

fn proficiency_badge(p: Proficiency) -> String {
    match p {
        Proficiency::New => "new".blue().to_string(),
        Proficiency::Learning => "learning".yellow().to_string(),
        Proficiency::Review => "review".cyan().to_string(),
        Proficiency::Mastered => "mastered".green().to_string(),
    }
}
