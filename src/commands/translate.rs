use anyhow::Result;
use colored::Colorize;
use inquire::{Confirm, Text};

use crate::commands::create_spinner;
use crate::config::Config;
use crate::translate::{SUPPORTED_LANGUAGES, Translation, Translator};

pub async fn run(
    text: Option<String>,
    from: Option<String>,
    to: Option<String>,
    detect: bool,
) -> Result<()> {
    let config = Config::load()?;

    let text = match text {
        Some(t) => t,
        None => Text::new("Text to translate:")
            .with_help_message("A word or short phrase")
            .prompt()?,
    };

    if detect {
        let spinner = create_spinner("Detecting language...");
        let detected = Translator::new().detect_language(&text).await;
        spinner.finish_and_clear();

        if detected == "auto" {
            println!("{} Could not detect the language.", "!".yellow());
        } else {
            println!(
                "  {} {}",
                "Detected:".dimmed(),
                language_name(&detected).cyan().bold()
            );
        }
        return Ok(());
    }

    let source = from.unwrap_or_else(|| config.source_lang.clone());
    let target = to.unwrap_or_else(|| config.target_lang.clone());

    let spinner = create_spinner(&format!("Translating ({} → {})...", source, target));
    let result = Translator::new().translate(&text, &source, &target).await;
    spinner.finish_and_clear();

    let translation = match result {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} {}", "Translation failed:".red(), e);
            return Ok(());
        }
    };

    print_translation(&translation);

    let save = Confirm::new("Save as flashcard?")
        .with_default(true)
        .prompt();
    match save {
        Ok(true) => crate::commands::add::save_card(&translation, &config)?,
        Ok(false) => {}
        Err(inquire::InquireError::OperationCanceled)
        | Err(inquire::InquireError::OperationInterrupted) => {}
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

fn language_name(code: &str) -> String {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| format!("{} ({})", name, code))
        .unwrap_or_else(|| code.to_string())
}

pub(crate) fn print_translation(t: &Translation) {
    println!();
    println!("  {} {}", "From:".dimmed(), t.text.bold());
    println!("  {} {}", "To:".dimmed(), t.translation.cyan().bold());
    if let Some(p) = &t.pronunciation {
        println!("  {} {}", "Say:".dimmed(), p.italic());
    }
    println!(
        "  {} {} → {}",
        "Lang:".dimmed(),
        t.source_lang,
        t.target_lang
    );
    println!();
}
