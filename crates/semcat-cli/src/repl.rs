//! REPL – interactive queries against a built catalog.
//!
//! Supported slash-commands:
//!   /help            – show this list
//!   /load <key>      – show everything stored about one object
//!   /json <key>      – same, as JSON
//!   /list <kind>     – enumerate objects, scenes, receptacles, materials,
//!                      actions, affordances or categories
//!   /info            – provenance of the loaded build
//!   /quit | /exit    – leave the shell

use clap::ValueEnum;
use colored::Colorize;
use semcat_store::KnowledgeStore;
use std::io::{self, BufRead, Write};

use crate::commands::{self, ListKind};

/// Entry point for the interactive REPL. Returns at EOF or `/quit`.
pub fn run(store: &KnowledgeStore) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", "semcat>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        let result = match cmd {
            "/help" => {
                cmd_help();
                Ok(())
            }
            "/load" | "/json" if arg.is_empty() => Err(format!("Usage: {cmd} <key>")),
            "/load" => commands::load(store, arg, false),
            "/json" => commands::load(store, arg, true),
            "/list" => cmd_list(store, arg),
            "/info" => cmd_info(store),
            "/quit" | "/exit" => {
                println!("{}", "Goodbye.".green());
                break;
            }
            other => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("{}: {}", "Error".red(), e);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "semcat Commands".bold().underline());
    println!("  {}   – show one object", "/load <key>".bold().cyan());
    println!("  {}   – show one object as JSON", "/json <key>".bold().cyan());
    println!("  {}  – enumerate a value set", "/list <kind>".bold().cyan());
    println!("  {}         – build provenance", "/info".bold().cyan());
    println!("  {}  – exit the shell", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_list(store: &KnowledgeStore, arg: &str) -> Result<(), String> {
    let kinds: Vec<String> = ListKind::value_variants()
        .iter()
        .filter_map(|k| k.to_possible_value())
        .map(|v| v.get_name().to_string())
        .collect();
    let kind = ListKind::from_str(arg, true)
        .map_err(|_| format!("Usage: /list <{}>", kinds.join("|")))?;
    commands::list(store, kind)
}

fn cmd_info(store: &KnowledgeStore) -> Result<(), String> {
    match store.build_info().map_err(|e| e.to_string())? {
        Some(info) => {
            println!("  Build id       : {}", info.build_id);
            println!("  Built at       : {}", info.built_at.to_rfc3339());
            println!("  Objects        : {}", info.objects);
            println!("  Embedding dim  : {}", info.embedding_dim);
            println!("  Hierarchy root : {}", info.hierarchy_root);
            println!("  Affordances    : {} flags", info.affordance_flags);
            match info.n_components {
                Some(k) => println!("  Components     : {k}"),
                None => println!("  Components     : {}", "none".dimmed()),
            }
        }
        None => println!("{}", "  No build information recorded.".yellow()),
    }
    Ok(())
}
