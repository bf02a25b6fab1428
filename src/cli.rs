use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use rusqlite::Connection;

use crate::config::Config;
use crate::db::{bootstrap, Database, MigrationSource};
use crate::error::MatchbookError;

#[derive(Parser)]
#[command(
    name = "matchbook",
    version,
    about = "matchbook: self-hosted match record keeper"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the server (default if no command specified)
    Serve,

    /// Apply seed data to the database and print row counts
    Seed,

    /// Dump deck templates as INSERT statements suitable for seed.sql
    ExportDeckTemplates {
        /// Write the statements to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// One exported row from `deck_templates`, in seed-file column order.
struct TemplateRow {
    game_id: i64,
    name: String,
    deck_type: String,
    theme: String,
}

impl Cli {
    pub fn handle_command_line() -> Result<(), MatchbookError> {
        let args = Cli::parse();

        // Default to Serve if no command specified
        match args.command.unwrap_or(Command::Serve) {
            Command::Serve => Self::start_server(),
            Command::Seed => Self::apply_seed(),
            Command::ExportDeckTemplates { out } => Self::export_deck_templates(out),
        }
    }

    fn start_server() -> Result<(), MatchbookError> {
        let config = Config::get();

        let db = Database::open(&config.database.path)?;

        // Bring the schema up to date and seed before any request handling
        // begins. A failure here terminates startup; the listener is never
        // bound over a half-migrated store.
        let source = MigrationSource::from_working_dir();
        {
            let mut conn = db.conn()?;
            bootstrap::run(&mut conn, &source, &config.seed.auto_seed)?;
        }

        info!(
            "Starting server on {}:{}",
            config.server.host, config.server.port
        );

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| MatchbookError::Error(format!("Failed to create runtime: {}", e)))?;

        rt.block_on(async {
            let web_server =
                crate::server::WebServer::new(config.server.host.clone(), config.server.port, db);
            web_server.start().await
        })
    }

    /// Manual seeding utility. Ensures the schema first, then applies the
    /// seed batch unconditionally (no empty-store guard) and prints counts.
    fn apply_seed() -> Result<(), MatchbookError> {
        let config = Config::get();

        let db = Database::open(&config.database.path)?;
        let source = MigrationSource::from_working_dir();

        let mut conn = db.conn()?;
        bootstrap::run(&mut conn, &source, "off")?;
        bootstrap::apply_seed(&conn, &source)?;

        println!("Seed data inserted");
        for table in ["users", "games", "seasons", "decks", "matches", "deck_templates"] {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            println!("   {}: {}", table, count);
        }

        Ok(())
    }

    /// Dumps the current `deck_templates` rows as a seed-file fragment, so a
    /// curated database can be folded back into `seed.sql`.
    fn export_deck_templates(out: Option<PathBuf>) -> Result<(), MatchbookError> {
        let config = Config::get();

        let db = Database::open(&config.database.path)?;
        let conn = db.conn()?;

        let rows = fetch_template_rows(&conn)?;
        let script = render_template_export(&config.database.path, &rows);

        match out {
            Some(path) => {
                std::fs::write(&path, &script)?;
                println!(
                    "Wrote {} deck_templates rows to {}",
                    rows.len(),
                    path.display()
                );
            }
            None => print!("{}", script),
        }

        Ok(())
    }
}

fn fetch_template_rows(conn: &Connection) -> Result<Vec<TemplateRow>, MatchbookError> {
    let mut stmt = conn.prepare(
        "SELECT game_id, name, deck_type, theme
         FROM deck_templates
         ORDER BY deck_type ASC, name ASC, template_id ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TemplateRow {
                game_id: row.get(0)?,
                name: row.get(1)?,
                deck_type: row.get(2)?,
                theme: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn render_template_export(db_path: &str, rows: &[TemplateRow]) -> String {
    let mut script = String::new();
    script.push_str("-- Exported deck_templates\n");
    script.push_str(&format!("-- Source DB: {}\n", db_path));
    script.push_str("-- Usage: replace the deck_templates section in seed.sql with this output\n");

    if rows.is_empty() {
        return script;
    }

    script.push_str("INSERT OR IGNORE INTO deck_templates (game_id, name, deck_type, theme) VALUES\n");
    let values: Vec<String> = rows
        .iter()
        .map(|row| {
            format!(
                "    ({}, {}, {}, {})",
                row.game_id,
                sql_quote(&row.name),
                sql_quote(&row.deck_type),
                sql_quote(&row.theme)
            )
        })
        .collect();
    script.push_str(&values.join(",\n"));
    script.push_str(";\n");
    script
}

fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing_no_command_defaults_to_serve() {
        let result = Cli::try_parse_from(["matchbook"]);
        assert!(result.is_ok(), "Should accept no command");

        let cli = result.unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parsing_serve_command() {
        let cli = Cli::try_parse_from(["matchbook", "serve"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn test_cli_parsing_seed_command() {
        let cli = Cli::try_parse_from(["matchbook", "seed"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Seed)));
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["matchbook", "scan"]).is_err());
    }

    #[test]
    fn test_cli_parsing_export_command_with_out() {
        let cli =
            Cli::try_parse_from(["matchbook", "export-deck-templates", "--out", "dump.sql"])
                .unwrap();
        match cli.command {
            Some(Command::ExportDeckTemplates { out }) => {
                assert_eq!(out, Some(PathBuf::from("dump.sql")));
            }
            _ => panic!("Expected export-deck-templates"),
        }
    }

    #[test]
    fn test_sql_quote_escapes_single_quotes() {
        assert_eq!(sql_quote("Labrynth"), "'Labrynth'");
        assert_eq!(sql_quote("Traptrix 'Rafflesia'"), "'Traptrix ''Rafflesia'''");
    }

    #[test]
    fn test_render_template_export_emits_ordered_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE deck_templates (
                template_id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                deck_type TEXT NOT NULL,
                theme TEXT NOT NULL DEFAULT 'Midrange'
            );
            INSERT INTO deck_templates (game_id, name, deck_type, theme) VALUES
                (1, 'Fiendsmith', 'sub', 'Combo'),
                (1, 'Tenpai Dragon', 'main', 'Aggro'),
                (1, 'Branded', 'main', 'Midrange');",
        )
        .unwrap();

        let rows = fetch_template_rows(&conn).unwrap();
        let script = render_template_export("./test.db", &rows);

        assert!(script.starts_with("-- Exported deck_templates\n"));
        assert!(script.contains("-- Source DB: ./test.db\n"));
        assert_eq!(
            script.lines().skip(3).collect::<Vec<_>>(),
            vec![
                "INSERT OR IGNORE INTO deck_templates (game_id, name, deck_type, theme) VALUES",
                "    (1, 'Branded', 'main', 'Midrange'),",
                "    (1, 'Tenpai Dragon', 'main', 'Aggro'),",
                "    (1, 'Fiendsmith', 'sub', 'Combo');",
            ]
        );
    }

    #[test]
    fn test_render_template_export_empty_table_skips_insert() {
        let script = render_template_export("./test.db", &[]);
        assert!(script.contains("-- Exported deck_templates"));
        assert!(!script.contains("INSERT"));
    }
}
