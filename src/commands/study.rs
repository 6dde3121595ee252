use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use inquire::Select;
use std::time::Instant;

use crate::scheduler::Rating;
use crate::session::{DEFAULT_NEW_CARDS_LIMIT, SessionError, SessionManager};
use crate::storage::{Database, Flashcard, SearchFilter};

pub async fn run() -> Result<()> {
    let options = vec![
        "🔁  Review due cards",
        "✨  Learn new cards",
        "🎯  Custom session (group/tags)",
        "←   Back",
    ];

    let selection = match Select::new("What would you like to study?", options).prompt() {
        Ok(s) => s,
        Err(inquire::InquireError::OperationCanceled)
        | Err(inquire::InquireError::OperationInterrupted) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    match selection {
        s if s.contains("due") => due().await,
        s if s.contains("new") => new_cards(None).await,
        s if s.contains("Custom") => custom(None, Vec::new(), None).await,
        _ => Ok(()),
    }
}

pub async fn due() -> Result<()> {
    let db = Database::open()?;
    let mut manager = SessionManager::new(&db);

    match manager.create_today_review_session() {
        Ok(_) => {}
        Err(e) => return report_start_error(e),
    }

    study_loop(&mut manager)
}

pub async fn new_cards(limit: Option<usize>) -> Result<()> {
    let db = Database::open()?;
    let mut manager = SessionManager::new(&db);

    match manager.create_new_cards_session(limit.unwrap_or(DEFAULT_NEW_CARDS_LIMIT)) {
        Ok(_) => {}
        Err(e) => return report_start_error(e),
    }

    study_loop(&mut manager)
}

pub async fn custom(
    group: Option<String>,
    tags: Vec<String>,
    limit: Option<usize>,
) -> Result<()> {
    let db = Database::open()?;

    let filter = if group.is_none() && tags.is_empty() {
        prompt_for_filter(&db)?
    } else {
        SearchFilter {
            group_id: group,
            tags,
            query: None,
        }
    };

    let mut manager = SessionManager::new(&db);
    match manager.create_custom_session(&filter, limit) {
        Ok(_) => {}
        Err(e) => return report_start_error(e),
    }

    study_loop(&mut manager)
}

fn prompt_for_filter(db: &Database) -> Result<SearchFilter> {
    use crate::storage::GroupStore;

    let groups = GroupStore::new(db).get_all()?;
    let mut options: Vec<String> = vec!["All cards".to_string()];
    options.extend(
        groups
            .iter()
            .map(|g| format!("{} ({} cards)", g.name, g.card_count)),
    );

    let selection = Select::new("Which cards?", options.clone()).prompt()?;
    let group_id = options
        .iter()
        .position(|o| *o == selection)
        .filter(|&idx| idx > 0)
        .map(|idx| groups[idx - 1].id.clone());

    Ok(SearchFilter {
        group_id,
        ..Default::default()
    })
}

fn report_start_error(e: anyhow::Error) -> Result<()> {
    match e.downcast_ref::<SessionError>() {
        Some(SessionError::NothingDue) => {
            println!(
                "\n{} Nothing due right now. Come back later, or learn new cards with {}.",
                "✓".green(),
                "lexideck study new".cyan()
            );
            Ok(())
        }
        Some(SessionError::NoNewCards) => {
            println!(
                "\n{} No new cards to learn. Add some with {}.",
                "✓".green(),
                "lexideck add".cyan()
            );
            Ok(())
        }
        Some(SessionError::NoMatches) => {
            println!("\n{} No cards match that filter.", "✗".yellow());
            Ok(())
        }
        _ => Err(e),
    }
}

/// One pass over the session's cards: show, reveal, rate, repeat. Esc or
/// Ctrl-C ends early; skipped cards keep their schedule untouched.
fn study_loop(manager: &mut SessionManager<'_>) -> Result<()> {
    let total = manager
        .current_session()
        .map(|s| s.cards.len())
        .unwrap_or(0);

    print_session_header(total);

    let started = Instant::now();
    let mut reviewed = 0usize;
    let mut correct = 0usize;

    loop {
        let Some(card) = manager.current_card().cloned() else {
            break;
        };
        let position = manager.progress().map(|p| p.current).unwrap_or(0);

        println!(
            "{} [{}/{}]",
            "Card".bold().cyan(),
            position,
            total
        );
        println!();
        println!("  {} {}", "Q:".bold().yellow(), card.word.bold());
        println!();

        let shown = Instant::now();

        // Wait for user to reveal answer
        let reveal = inquire::Text::new("  Press Enter to reveal...")
            .with_default("")
            .prompt();
        if reveal.is_err() {
            return end_early(manager, correct, reviewed, started);
        }

        print_answer(&card);

        let options = vec![
            "1 - Again   │ forgot it",
            "2 - Hard    │ barely recalled",
            "3 - Good    │ recalled with effort",
            "4 - Easy    │ instant recall",
            "○ - Skip this card",
        ];

        let rating = Select::new("  How well did you recall this?", options).prompt();

        let selection = match rating {
            Ok(s) => s,
            Err(inquire::InquireError::OperationCanceled)
            | Err(inquire::InquireError::OperationInterrupted) => {
                return end_early(manager, correct, reviewed, started);
            }
            Err(e) => return Err(e.into()),
        };

        if selection.starts_with('○') {
            manager.skip_card()?;
            println!("{}", "Skipped.".dimmed());
            println!("{}", "─".repeat(50).dimmed());
            continue;
        }

        let rating = selection
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .and_then(|d| Rating::from_value(d as i64))
            .unwrap_or(Rating::Good);

        let response_ms = shown.elapsed().as_millis() as i64;
        let outcome = manager.submit_answer(rating, response_ms)?;

        reviewed += 1;
        if rating.is_correct() {
            correct += 1;
        }

        let days = (outcome.card.next_review() - Utc::now()).num_days().max(0);
        let when = match days {
            0 => "later today".to_string(),
            1 => "tomorrow".to_string(),
            d => format!("in {} days", d),
        };
        println!(
            "  {} {} · next review {}.",
            "↻".cyan(),
            rating.label().dimmed(),
            when.cyan()
        );
        println!("{}", "─".repeat(50).dimmed());

        if outcome.completed {
            break;
        }
    }

    print_summary(correct, reviewed, started);
    Ok(())
}

fn end_early(
    manager: &mut SessionManager<'_>,
    correct: usize,
    reviewed: usize,
    started: Instant,
) -> Result<()> {
    manager.cancel_session();
    println!("\n{}", "Session ended early.".dimmed());
    print_summary(correct, reviewed, started);
    Ok(())
}

fn print_answer(card: &Flashcard) {
    println!("  {} {}", "A:".bold().green(), card.translation.bold());
    if let Some(p) = &card.pronunciation {
        println!("     {}", p.italic().dimmed());
    }
    for ex in &card.examples {
        println!("     • {}", ex.dimmed());
    }
    println!();
}

fn print_session_header(total: usize) {
    println!();
    println!(
        "    {}",
        "╭──────────────────────────────────────────────────────╮".blue()
    );
    println!(
        "    {}              {}              {}",
        "│".blue(),
        "🃏 STUDY SESSION 🃏".bold().white(),
        "│".blue()
    );
    println!(
        "    {}   {} card(s) queued                               {}",
        "│".blue(),
        total.to_string().yellow().bold(),
        "│".blue()
    );
    println!(
        "    {}",
        "╰──────────────────────────────────────────────────────╯".blue()
    );
    println!();
}

fn print_summary(correct: usize, reviewed: usize, started: Instant) {
    let pct = if reviewed > 0 {
        (correct as f64 / reviewed as f64) * 100.0
    } else {
        0.0
    };
    let minutes = started.elapsed().as_secs() / 60;
    let seconds = started.elapsed().as_secs() % 60;

    println!();
    println!(
        "    {}",
        "╭──────────────────────────────────────────────────────╮".green()
    );
    println!(
        "    {}            {}            {}",
        "│".green(),
        "📊 SESSION SUMMARY 📊".bold().white(),
        "│".green()
    );
    println!(
        "    {}  Reviewed: {} │ Correct: {} │ Score: {:.0}%           {}",
        "│".green(),
        reviewed.to_string().cyan(),
        correct.to_string().green(),
        pct,
        "│".green()
    );
    println!(
        "    {}  Time: {}m {}s                                       {}",
        "│".green(),
        minutes,
        seconds,
        "│".green()
    );
    println!(
        "    {}",
        "╰──────────────────────────────────────────────────────╯".green()
    );
    println!();
}
