//! Podium CLI
//!
//! Predicts a race finishing order from a historical event, recent form and
//! current qualifying times.

use clap::{Parser, Subcommand};
use podium::{Config, Result};

#[derive(Parser)]
#[command(name = "podium")]
#[command(about = "Race finishing-order prediction with gradient boosting", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Show recent-form trends before the target round
    Trends {
        /// Override the target round
        #[arg(long)]
        round: Option<u32>,
        /// Override the number of rounds to look back
        #[arg(long)]
        window: Option<u32>,
    },
    /// Predict the finishing order
    Predict {
        /// Qualifying CSV (Driver,QualiTime)
        #[arg(long)]
        qualifying: Option<String>,
        /// Number of rows to show
        #[arg(long)]
        top: Option<usize>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import session JSON files into the database
    Import {
        /// Session files to import
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Show database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Data { action } => match action {
            DataCommands::Import { files } => commands::data_import(&config, &files),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Trends { round, window } => commands::trends(&config, round, window),
        Commands::Predict {
            qualifying,
            top,
            format,
        } => commands::predict(&config, qualifying, top, format),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use podium::data::{qualifying, Database};
    use podium::features::{TrendAggregator, TrendConfig};
    use podium::predict::{Leaderboard, Pipeline, PipelineConfig};

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        println!("Created data/ directory");

        println!("\nNext steps:");
        println!("  1. Edit {} to set the event and history", config_path);
        println!("  2. Run 'podium data import <session.json>...' to load sessions");
        println!("  3. Put qualifying times in {}", config.data.qualifying_path);
        println!("  4. Run 'podium predict'");

        Ok(())
    }

    pub fn data_import(config: &Config, files: &[String]) -> Result<()> {
        let mut db = Database::open(&config.data.database_path)?;

        for file in files {
            let import = db.import_file(file)?;
            println!(
                "Imported {} {} round {} {}: {} laps, {} results",
                file,
                import.season,
                import.round,
                import.session,
                import.laps.len(),
                import.results.len()
            );
        }

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.data.database_path);
        println!("  Events:   {}", stats.event_count);
        println!("  Laps:     {}", stats.lap_count);
        println!("  Results:  {}", stats.result_count);
        if !stats.seasons.is_empty() {
            let seasons: Vec<String> = stats.seasons.iter().map(|s| s.to_string()).collect();
            println!("  Seasons:  {}", seasons.join(", "));
        }

        Ok(())
    }

    pub fn trends(config: &Config, round: Option<u32>, window: Option<u32>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let trend_config = TrendConfig {
            season: config.event.season,
            target_round: round.unwrap_or(config.event.round),
            window_size: window.unwrap_or(config.trends.window_size),
        };

        let window = TrendAggregator::collect(&db, &trend_config);

        println!(
            "Trends for season {} before round {}",
            trend_config.season, trend_config.target_round
        );
        println!("Rounds included: {:?}", window.included_rounds);
        for skipped in &window.skipped {
            println!("Skipped round {}: {}", skipped.round, skipped.reason);
        }
        if window.trends.is_empty() {
            println!("\nNo trend data.");
            return Ok(());
        }

        let mut records: Vec<_> = window.trends.values().collect();
        records.sort_by(|a, b| a.code.cmp(&b.code));

        let fmt = |v: Option<f64>, precision: usize| match v {
            Some(v) => format!("{:.*}", precision, v),
            None => "-".to_string(),
        };

        println!();
        println!(
            "{:<6} {:>10} {:>10} {:>8} {:>7}",
            "Code", "AvgQuali", "AvgFinish", "DNF%", "Rounds"
        );
        println!("{}", "─".repeat(45));
        for t in records {
            println!(
                "{:<6} {:>10} {:>10} {:>8} {:>7}",
                t.code,
                fmt(t.avg_qualifying_time, 3),
                fmt(t.avg_finish_position, 2),
                fmt(t.dnf_rate.map(|r| r * 100.0), 1),
                t.rounds
            );
        }

        Ok(())
    }

    pub fn predict(
        config: &Config,
        qualifying_path: Option<String>,
        top: Option<usize>,
        format: OutputFormat,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let path = qualifying_path.unwrap_or_else(|| config.data.qualifying_path.clone());
        let entries = qualifying::load_csv(&path)?;

        let mut pipeline_config = PipelineConfig::from(config);
        if let Some(top) = top {
            pipeline_config.top_k = top;
        }

        let board = Pipeline::run(&db, &entries, &pipeline_config)?;

        match format {
            OutputFormat::Table => print_table(config, &board),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&board)?),
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(std::io::stdout());
                for row in &board.rows {
                    writer.serialize(row)?;
                }
                writer.flush()?;
            }
        }

        Ok(())
    }

    fn print_table(config: &Config, board: &Leaderboard) {
        println!(
            "\nPredicted finishing order: {} {} (round {})",
            config.event.season, config.event.name, config.event.round
        );
        println!("{}", "─".repeat(48));
        println!(
            "{:>4}  {:<6} {:>12} {:>12}  {}",
            "Pos", "Code", "FastestLap", "Score", "Origin"
        );
        for (i, row) in board.rows.iter().enumerate() {
            println!(
                "{:>4}  {:<6} {:>12.3} {:>12.4}  {}",
                i + 1,
                row.code,
                row.fastest_lap,
                row.predicted_score,
                row.origin
            );
        }
        println!("{}", "─".repeat(48));
        println!(
            "{} known, {} new competitors",
            board.known_count, board.new_count
        );
        println!("Training fit: {}", board.fit_report);
        for skipped in &board.skipped_rounds {
            println!("Skipped round {}: {}", skipped.round, skipped.reason);
        }

        let mut importances = board.importances.clone();
        importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        println!("\nFeature importance:");
        for imp in importances {
            println!("  {:<20} {:.3}", imp.feature, imp.importance);
        }
    }
}
