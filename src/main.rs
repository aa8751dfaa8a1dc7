use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use expense_tracker::config::CommonArgs;
use expense_tracker::{classify, db, export, logging, Category, ExpenseQuery, User};
use rusqlite::Connection;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "expense-tracker", version, about = "Personal expense tracker")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Suggest a category for an expense title/description
    Classify {
        title: String,
        #[arg(long, short)]
        description: Option<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the category labels in priority order
    Categories,
    /// Create the database schema
    InitDb,
    /// Spending summary for one user
    Stats {
        #[arg(long)]
        user: String,
    },
    /// Export a user's expenses as CSV
    Export {
        #[arg(long)]
        user: String,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Only this month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.common.log_filter);

    match cli.command {
        Command::Classify {
            title,
            description,
            json,
        } => run_classify(&title, description.as_deref(), json),
        Command::Categories => {
            for (rank, category) in Category::ALL.iter().enumerate() {
                println!("{:>2}. {}", rank + 1, category);
            }
            Ok(())
        }
        Command::InitDb => {
            let conn = cli.common.open_database()?;
            println!("✓ Database ready: {:?}", cli.common.database);
            println!("✓ Expenses stored: {}", db::verify_count(&conn)?);
            Ok(())
        }
        Command::Stats { user } => run_stats(&cli.common, &user),
        Command::Export {
            user,
            output,
            month,
        } => run_export(&cli.common, &user, output, month),
    }
}

fn run_classify(title: &str, description: Option<&str>, json: bool) -> Result<()> {
    let result = classify(title, description);

    if json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        println!("{} ({})", result.category, result.source.as_str());
    }

    Ok(())
}

fn require_user(conn: &Connection, username: &str) -> Result<User> {
    match db::find_user_by_username(conn, username)? {
        Some(user) => Ok(user),
        None => bail!("No such user: {}", username),
    }
}

fn run_stats(common: &CommonArgs, username: &str) -> Result<()> {
    let conn = common.open_database()?;
    let user = require_user(&conn, username)?;
    let summary = db::expense_summary(&conn, user.id)?;

    println!("📊 Expenses for {}", user.username);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Count:  {}", summary.count);
    println!("Total:  {:.2}", summary.total);
    if let (Some(title), Some(at)) = (&summary.latest_title, summary.latest_at) {
        println!("Latest: {} ({})", title, at.format("%Y-%m-%d %H:%M"));
    }

    if !summary.by_category.is_empty() {
        println!();
        for row in &summary.by_category {
            println!("  {:<16} {:>4}  {:>12.2}", row.category, row.count, row.total);
        }
    }

    Ok(())
}

fn run_export(
    common: &CommonArgs,
    username: &str,
    output: Option<PathBuf>,
    month: Option<String>,
) -> Result<()> {
    let conn = common.open_database()?;
    let user = require_user(&conn, username)?;
    let query = ExpenseQuery {
        month,
        ..Default::default()
    };
    let expenses = db::list_expenses(&conn, user.id, &query)?;

    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create export file: {:?}", path))?;
            export::write_csv(file, &expenses)?;
            eprintln!("✓ Exported {} expenses to {:?}", expenses.len(), path);
        }
        None => export::write_csv(io::stdout().lock(), &expenses)?,
    }

    Ok(())
}
