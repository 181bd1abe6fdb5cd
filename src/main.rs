use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;

use character_ranking::{
    leaderboard, moderation, Character, CharacterId, Config, Store, TopFilter,
};

const USAGE: &str = "Usage: character-ranking <command>

Commands:
  init                  Create the database schema
  stats                 Totals, per-race and per-gender counts
  top [key=value ...]   Best win ratio (keys: race, bloodline, gender)
  shame                 Most losses
  reset                 Start a new voting epoch
  report <id>           Report a character
  history <id>          Audit trail for a character";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = Config::from_env()?;
    let store = Store::open(&config.database_path)
        .with_context(|| format!("Failed to open database at {:?}", config.database_path))?;

    match command.as_str() {
        "init" => {
            let count = store.count().await?;
            println!("✓ Database ready at {:?} ({} characters)", config.database_path, count);
        }
        "stats" => run_stats(&store).await?,
        "top" => {
            let filter = TopFilter::from_params(&parse_filters(&args[1..])?)?;
            print_board("🏆 Top characters", &leaderboard::top(&store, filter).await?);
        }
        "shame" => print_board("💀 Hall of shame", &leaderboard::bottom(&store).await?),
        "reset" => {
            let cleared = store.reset_epoch().await?;
            println!("✓ New epoch started, {} characters eligible again", cleared);
        }
        "report" => {
            let outcome = moderation::report_character(&store, parse_id(&args)?).await?;
            println!("✓ {}", outcome.message());
        }
        "history" => {
            let events = store.history(parse_id(&args)?).await?;
            println!("📜 {} events", events.len());
            for event in events {
                println!("  {}  {:<20} {}", event.timestamp.format("%Y-%m-%d %H:%M:%S"), event.event_type, event.data);
            }
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }

    Ok(())
}

async fn run_stats(store: &Store) -> Result<()> {
    let stats = leaderboard::stats(store).await?;

    println!("📊 Character Ranking Stats");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Characters: {}", stats.total_count);
    println!("✓ Votes cast: {}", stats.total_votes);

    println!("\nBy race:");
    for (race, count) in &stats.race_counts {
        println!("  {:<12} {}", race, count);
    }

    println!("\nBy gender:");
    for (gender, count) in &stats.gender_counts {
        println!("  {:<12} {}", gender, count);
    }

    if let Some(leader) = &stats.leading_race {
        println!("\nLeading race: {} ({} in the top)", leader.value, leader.count);
    }
    if let Some(leader) = &stats.leading_bloodline {
        println!("Leading bloodline: {} ({} in the top)", leader.value, leader.count);
    }

    Ok(())
}

fn print_board(title: &str, characters: &[Character]) {
    println!("{}", title);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (rank, c) in characters.iter().enumerate() {
        println!(
            "{:>3}. {:<30} {:<10} {:<12} W {:>4}  L {:>4}  {:.2}",
            rank + 1,
            c.name,
            c.race,
            c.bloodline,
            c.wins,
            c.losses,
            c.win_ratio()
        );
    }
    if characters.is_empty() {
        println!("  (no characters)");
    }
}

fn parse_id(args: &[String]) -> Result<CharacterId> {
    let raw = args.get(1).context("A character id is required")?;
    raw.parse()
        .with_context(|| format!("'{}' is not a valid character id", raw))
}

fn parse_filters(args: &[String]) -> Result<HashMap<String, String>> {
    args.iter()
        .map(|arg| match arg.split_once('=') {
            Some((key, value)) => Ok((key.to_string(), value.to_string())),
            None => bail!("Filters look like key=value, got '{}'", arg),
        })
        .collect()
}
