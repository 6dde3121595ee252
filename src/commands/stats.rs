use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use crate::scheduler::Proficiency;
use crate::session::SessionManager;
use crate::storage::{Database, FlashcardStore};

pub async fn run() -> Result<()> {
    let db = Database::open()?;
    let store = FlashcardStore::new(&db);
    let manager = SessionManager::new(&db);

    println!();
    println!(
        "    {}",
        "╭──────────────────────────────────────────────────────╮".cyan()
    );
    println!(
        "    {}             {}             {}",
        "│".cyan(),
        "📊 STUDY STATISTICS 📊".bold().white(),
        "│".cyan()
    );
    println!(
        "    {}",
        "╰──────────────────────────────────────────────────────╯".cyan()
    );
    println!();

    // Collection overview
    let now = Utc::now();
    let total = store.count()?;
    let due = store.count_due(now)?;

    println!("{}", "Collection".bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("  Cards: {}", total.to_string().cyan());
    println!(
        "  Due now: {}",
        if due > 0 {
            due.to_string().yellow().to_string()
        } else {
            "0".green().to_string()
        }
    );
    print_proficiency_breakdown(&store)?;
    println!();

    // Today
    println!("{}", "Today".bold());
    println!("{}", "─".repeat(40).dimmed());
    match manager.today_stats()? {
        Some(today) => {
            let accuracy = if today.reviewed_cards > 0 {
                (today.correct_count as f64 / today.reviewed_cards as f64) * 100.0
            } else {
                0.0
            };
            println!(
                "  Reviewed: {} ({} new)",
                today.reviewed_cards.to_string().cyan(),
                today.new_cards
            );
            println!(
                "  Accuracy: {:.0}% ({} correct, {} wrong)",
                accuracy, today.correct_count, today.wrong_count
            );
            println!(
                "  Time: {}m {}s",
                today.total_study_ms / 60_000,
                (today.total_study_ms % 60_000) / 1000
            );
        }
        None => println!("  {}", "No reviews yet today.".dimmed()),
    }
    println!();

    // Streak
    let streak = manager.streak()?;
    println!("{}", "Streak".bold());
    println!("{}", "─".repeat(40).dimmed());
    println!(
        "  Current: {} day(s) {}",
        streak.current.to_string().yellow().bold(),
        if streak.current > 0 { "🔥" } else { "" }
    );
    println!("  Longest: {} day(s)", streak.longest);
    println!();

    // Last 7 days
    let recent = manager.recent_stats(7)?;
    if !recent.is_empty() {
        println!("{}", "Last 7 days".bold());
        println!("{}", "─".repeat(40).dimmed());
        for day in &recent {
            let bar = "█".repeat((day.reviewed_cards as usize).min(30));
            println!(
                "  {} {} {}",
                day.date.dimmed(),
                bar.cyan(),
                day.reviewed_cards
            );
        }
        println!();
    }

    // Storage
    let usage = db.usage()?;
    println!("{}", "Storage".bold());
    println!("{}", "─".repeat(40).dimmed());
    println!(
        "  Database: {} ({} cards, {} reviews)",
        format_bytes(usage.file_bytes).cyan(),
        usage.flashcards,
        usage.review_records
    );
    println!();

    Ok(())
}

fn print_proficiency_breakdown(store: &FlashcardStore<'_>) -> Result<()> {
    let cards = store.get_all()?;
    let mut counts = [0usize; 4];
    for card in &cards {
        let idx = match card.proficiency {
            Proficiency::New => 0,
            Proficiency::Learning => 1,
            Proficiency::Review => 2,
            Proficiency::Mastered => 3,
        };
        counts[idx] += 1;
    }

    println!(
        "  By level: {} new │ {} learning │ {} review │ {} mastered",
        counts[0].to_string().blue(),
        counts[1].to_string().yellow(),
        counts[2].to_string().cyan(),
        counts[3].to_string().green()
    );
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
