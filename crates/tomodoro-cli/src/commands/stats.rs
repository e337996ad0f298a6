//! Session statistics commands.

use clap::Subcommand;

use tomodoro_core::{Database, SessionFilter, SessionStore};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's statistics
    Today,
    /// All-time statistics
    All,
    /// Recent sessions, newest first
    Sessions {
        /// Maximum number of sessions to list
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        StatsAction::Today => {
            let stats = db.stats_today()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::All => {
            let stats = db.stats_all()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Sessions { limit } => {
            let sessions = db.list_sessions(&SessionFilter {
                limit: Some(limit),
                ..SessionFilter::default()
            })?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
    }
    Ok(())
}
