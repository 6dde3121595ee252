use anyhow::Result;
use colored::Colorize;
use inquire::{Confirm, Select, Text};

use crate::storage::{DEFAULT_GROUP_ID, Database, Group, GroupStore};

pub async fn create(name: Option<String>) -> Result<()> {
    let name = match name {
        Some(n) => n,
        None => Text::new("Group name:")
            .with_help_message("e.g. 'Spanish trip' or 'Exam vocab'")
            .prompt()?,
    };

    let db = Database::open()?;
    let group = GroupStore::new(&db).create(&name, None, None)?;
    println!("{} Created group {}.", "✓".green(), group.name.bold());

    Ok(())
}

pub async fn list() -> Result<()> {
    let db = Database::open()?;
    let groups = GroupStore::new(&db).get_all()?;

    println!("\n{}", "Groups:".bold());
    println!("{}", "─".repeat(40).dimmed());
    for group in &groups {
        let marker = if group.id == DEFAULT_GROUP_ID {
            "📌".to_string()
        } else {
            "📂".to_string()
        };
        println!(
            "  {} {} {}",
            marker,
            group.name.cyan(),
            format!("({} cards)", group.card_count).dimmed()
        );
        if let Some(desc) = &group.description {
            println!("      {}", desc.dimmed());
        }
    }
    println!();

    Ok(())
}

/// Interactive group manager: rename or delete an existing group.
pub async fn run() -> Result<()> {
    let db = Database::open()?;
    let store = GroupStore::new(&db);

    let options = vec![
        "➕  Create group",
        "📋  List groups",
        "✏️   Rename group",
        "🗑   Delete group",
        "←   Back",
    ];

    loop {
        let action = match Select::new("Manage groups:", options.clone()).prompt() {
            Ok(a) => a,
            Err(inquire::InquireError::OperationCanceled)
            | Err(inquire::InquireError::OperationInterrupted) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        match action {
            a if a.contains("Create") => {
                let name = Text::new("Group name:").prompt()?;
                let group = store.create(&name, None, None)?;
                println!("{} Created group {}.", "✓".green(), group.name.bold());
            }
            a if a.contains("List") => list().await?,
            a if a.contains("Rename") => rename(&store)?,
            a if a.contains("Delete") => delete_interactive(&store)?,
            _ => return Ok(()),
        }

        println!();
    }
}

fn rename(store: &GroupStore<'_>) -> Result<()> {
    let group = match pick_group(store, false)? {
        Some(g) => g,
        None => return Ok(()),
    };

    let name = Text::new("New name:")
        .with_initial_value(&group.name)
        .prompt()?;
    let updated = store.update(&group.id, Some(&name), None, None)?;
    println!("{} Renamed to {}.", "✓".green(), updated.name.bold());

    Ok(())
}

fn delete_interactive(store: &GroupStore<'_>) -> Result<()> {
    let group = match pick_group(store, false)? {
        Some(g) => g,
        None => return Ok(()),
    };

    let confirmed = Confirm::new(&format!(
        "Delete '{}'? Its {} card(s) move to the default group.",
        group.name, group.card_count
    ))
    .with_default(false)
    .prompt()
    .unwrap_or(false);

    if confirmed {
        store.delete(&group.id)?;
        println!("{} Deleted group {}.", "✓".green(), group.name.bold());
    } else {
        println!("{}", "Cancelled.".dimmed());
    }

    Ok(())
}

/// Pick a group; the default group is excluded unless `include_default`.
fn pick_group(store: &GroupStore<'_>, include_default: bool) -> Result<Option<Group>> {
    let groups: Vec<Group> = store
        .get_all()?
        .into_iter()
        .filter(|g| include_default || g.id != DEFAULT_GROUP_ID)
        .collect();

    if groups.is_empty() {
        println!("{} No groups to manage yet.", "!".yellow());
        return Ok(None);
    }

    let options: Vec<String> = groups
        .iter()
        .map(|g| format!("{} ({} cards)", g.name, g.card_count))
        .collect();

    let selection = match Select::new("Select a group:", options.clone()).prompt() {
        Ok(s) => s,
        Err(inquire::InquireError::OperationCanceled)
        | Err(inquire::InquireError::OperationInterrupted) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let idx = options.iter().position(|o| *o == selection).unwrap_or(0);
    Ok(groups.into_iter().nth(idx))
}
