use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use classtrack::config::AppConfig;
use classtrack::engine::Engine;
use classtrack::models::FetchOutcome;
use classtrack::{status, utils};

#[derive(Parser)]
#[command(name = "classtrack", about = "ERP attendance extraction engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Log in to an ERP portal and fetch subject-wise attendance
    Fetch {
        /// Any page URL of the portal — reduced to its origin before use
        #[arg(long)]
        url: String,

        #[arg(short, long)]
        username: String,

        /// Password (falls back to ERP_PASSWORD)
        #[arg(short, long, env = "ERP_PASSWORD", hide_env_values = true)]
        password: String,

        /// Minimum attendance percentage to maintain (defaults to the
        /// configured threshold)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Print the raw JSON outcome instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// How many classes can be missed (or must be attended) for one subject
    Plan {
        #[arg(long)]
        attended: u32,

        #[arg(long)]
        total: u32,

        #[arg(short, long, default_value_t = 75.0)]
        threshold: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "classtrack=info,warn",
        1 => "classtrack=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Fetch {
            url,
            username,
            password,
            threshold,
            json,
        } => {
            let _t = utils::Timer::start("attendance fetch");
            let threshold = threshold.unwrap_or(config.engine.default_threshold);
            let engine = Engine::new(config)?;

            match engine.scrape(&url, &username, &password, threshold).await {
                Ok(data) => {
                    info!(
                        "{} subjects for {} ({})",
                        data.subjects.len(),
                        data.student.name,
                        if data.student.usn.is_empty() {
                            "no roll number"
                        } else {
                            &data.student.usn
                        }
                    );
                    if json {
                        println!("{}", serde_json::to_string_pretty(&FetchOutcome::ok(data))?);
                    } else {
                        print_summary(&data);
                    }
                }
                Err(e) => {
                    if json {
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&FetchOutcome::err(e.user_message()))?
                        );
                    } else {
                        anyhow::bail!("{}", e.user_message());
                    }
                }
            }
        }

        Command::Plan {
            attended,
            total,
            threshold,
        } => {
            let pct = status::percentage(attended, total);
            let st = status::status_for(pct, threshold, total);
            println!("Attendance : {attended}/{total} ({pct}%)");
            println!("Status     : {st:?}");
            println!(
                "Can miss   : {} classes",
                status::classes_to_bunk(attended, total, threshold)
            );
            match status::classes_needed_to_attend(attended, total, threshold) {
                Some(0) => println!("Needed     : already at or above {threshold}%"),
                Some(n) => println!("Needed     : attend the next {n} classes to reach {threshold}%"),
                None => println!("Needed     : unattainable at a {threshold}% threshold"),
            }
        }
    }

    Ok(())
}

fn print_summary(data: &classtrack::models::AttendanceResult) {
    println!("─────────────────────────────────────────────");
    println!("  {}  {}", data.student.name, data.student.usn);
    println!("─────────────────────────────────────────────");
    for s in &data.subjects {
        println!(
            "  {:<10} {:>3}/{:<3} {:>6.2}%  {:?}",
            if s.code.is_empty() { &s.name } else { &s.code },
            s.attended,
            s.total,
            s.percentage,
            s.status,
        );
    }
    println!("─────────────────────────────────────────────");
    println!(
        "  threshold {}% · updated {}",
        data.threshold,
        data.last_updated.format("%d %b %Y %H:%M UTC")
    );
}
