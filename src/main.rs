use clap::{Parser, Subcommand, builder::styling};
use eyre::Result;
use marketo_lead_extractor::cli;
use marketo_lead_extractor::lead::BATCH_SIZE_DEFAULT;
use marketo_lead_extractor::pipeline::ExtractionConfig;
use marketo_lead_extractor::timeslice::DEFAULT_INTERVAL_SECONDS;
use owo_colors::OwoColorize;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Marketo Lead Extractor: windowed, cursor-paginated lead extraction from the Marketo SOAP API
#[derive(Parser)]
#[command(name = "mkto", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover the output column schema from the remote lead object
    Guess,

    /// Test authentication against the Marketo remote
    Auth,

    /// Extract leads updated in a date range, one JSON line per record
    Extract {
        /// Start of the range (RFC 3339, 'YYYY-MM-DD HH:MM:SS', or 'YYYY-MM-DD')
        #[arg(long)]
        from: String,

        /// End of the range; defaults to now
        #[arg(long)]
        to: Option<String>,

        /// Window width in seconds
        #[arg(long, default_value_t = DEFAULT_INTERVAL_SECONDS)]
        interval_seconds: i64,

        /// Records per page request (service caps at 1000)
        #[arg(long, default_value_t = BATCH_SIZE_DEFAULT)]
        batch_size: u32,

        /// Parallel work units
        #[arg(long, default_value_t = 1)]
        tasks: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(e) = dotenvy::from_filename(&cli.env) {
        // credentials may come from the process environment instead
        eprintln!("Note: no dotenv file loaded ({})", e);
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    match cli.command {
        Commands::Guess => {
            log::info!("Guessing column schema from remote metadata");
            let columns = cli::guess_columns().await?;
            println!("{}", serde_json::to_string_pretty(&columns)?);
            log::info!("✓ Guessed {} column(s)", columns.len().green());
        }
        Commands::Auth => {
            log::info!("Testing authentication");
            cli::test_auth().await?;
        }
        Commands::Extract {
            from,
            to,
            interval_seconds,
            batch_size,
            tasks,
        } => {
            let from = cli::parse_instant(&from)?;
            let to = to.as_deref().map(cli::parse_instant).transpose()?;
            log::info!(
                "Extracting leads from {} to {}",
                from.bright_black(),
                to.map(|t| t.to_string())
                    .unwrap_or_else(|| "now".to_string())
                    .bright_black(),
            );

            let config = ExtractionConfig {
                from,
                to,
                interval_seconds,
                batch_size,
                task_count: tasks,
            };
            let count = cli::extract_leads(config).await?;
            log::info!("✓ Extracted {} record(s)", count.green());
        }
    }

    Ok(())
}
