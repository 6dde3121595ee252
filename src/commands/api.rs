use anyhow::{Context, Result};
use std::io::Read;

use crate::api;
use crate::storage::Database;

/// One-shot JSON request/response. Reads the request from the argument or
/// stdin and writes the response to stdout; no styling, machine-facing.
pub async fn run(request: Option<String>) -> Result<()> {
    let input = match request {
        Some(r) => r,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };

    let db = Database::open()?;
    println!("{}", api::handle_json(&db, &input));

    Ok(())
}
