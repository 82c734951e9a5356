//! # Burritos CLI (`burritos`)
//!
//! Runs the data-browser HTTP server and exposes the same stores from the
//! command line for scripting and shift work.
//!
//! ## Usage
//!
//! ```bash
//! burritos --config ./config/burritos.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `burritos serve` | Start the HTTP server |
//! | `burritos files <year> <month> <day>` | List a day's acquisition files |
//! | `burritos resolve <file> <detector>` | Print where a dump's files live |
//! | `burritos comment get <file>` | Print the comment of a dump |
//! | `burritos comment set <file> <text>` | Set the comment of a dump |
//! | `burritos comment list <file>` | Print every comment of the dump's day |
//! | `burritos config show` | Print the active and default configurations |
//! | `burritos config set-particle <p>` | Switch `positrons` / `antiprotons`, keeping other fields |
//! | `burritos latest` | Print the freshness marker |
//! | `burritos watch <year> <month> <day>` | Print the newest dump whenever the listing changes |
//! | `burritos hash-password <password>` | Print the value for `USER_PASSWORD_HASH` |
//!
//! Every setting can be overridden from the environment (`MAIN_DIR`,
//! `ANALYSIS_DIR`, `PYTHON_PATH`, `PORT`, `JWT_SECRET`, `USER_LOGIN`,
//! `USER_PASSWORD_HASH`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use burritos::acquisition;
use burritos::auth::hash_password;
use burritos::comments::CommentStore;
use burritos::config;
use burritos::configuration::ConfigurationStore;
use burritos::models::{Category, DateKey, Detector, Particle};
use burritos::paths::PathResolver;
use burritos::server;
use burritos::watch;

/// Burritos: browse, annotate and re-analyse detector acquisition dumps.
#[derive(Parser)]
#[command(
    name = "burritos",
    about = "Burritos: data browser backend for detector acquisition dumps",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Optional: when the file does not exist, defaults and environment
    /// variables are used.
    #[arg(long, global = true, default_value = "./config/burritos.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,

    /// List the acquisition files of a day (creates the directory).
    Files {
        year: String,
        month: String,
        day: String,
    },

    /// Print the on-disk locations derived from an acquisition filename.
    Resolve {
        /// Acquisition filename, e.g. `data-2025-05-14_10-30-00.json`.
        filename: String,
        /// Detector subdirectory (`PDS`, `BDS`, `DSAT`, `USAT`, `PMT11`, ...).
        detector: String,
    },

    /// Read or write acquisition comments.
    Comment {
        #[command(subcommand)]
        action: CommentAction,
    },

    /// Inspect or change the analysis configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the freshness marker written by the pipeline.
    Latest,

    /// Poll a day and print the newest dump whenever the listing changes.
    Watch {
        year: String,
        month: String,
        day: String,
        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 2000)]
        interval_ms: u64,
    },

    /// Print the hex SHA-256 of a password for `USER_PASSWORD_HASH`.
    HashPassword { password: String },
}

#[derive(Subcommand)]
enum CommentAction {
    Get { filename: String },
    Set { filename: String, comment: String },
    /// Print every comment recorded for the day of `filename`.
    List { filename: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the active configuration and both defaults as JSON.
    Show,
    /// Switch the particle species, keeping every other field.
    SetParticle { particle: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = match &cli.command {
        Commands::HashPassword { password } => {
            println!("{}", hash_password(password));
            return Ok(());
        }
        _ => config::load_config(&cli.config)?,
    };
    let resolver = PathResolver::new(&cfg.data.main_dir);

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Files { year, month, day } => {
            let key = DateKey::from_segments(&year, &month, Some(&day))?;
            for file in acquisition::list_json_files(&resolver, &key).await? {
                println!("{}", file);
            }
        }
        Commands::Resolve { filename, detector } => {
            let detector: Detector = detector.parse()?;
            let (_, json) = resolver.acquisition_path(&filename)?;
            let (_, comments) = resolver.comments_path(&filename)?;
            println!("json:     {}", json.display());
            println!("comments: {}", comments.display());
            println!(
                "signal:   {}",
                resolver.signal_path(&filename, &detector)?.display()
            );
            println!(
                "image:    {}",
                resolver.image_path(&filename, &detector)?.display()
            );
            println!(
                "together: {}",
                resolver
                    .combined_image_path(&filename, &Category::Together)?
                    .display()
            );
            println!(
                "same:     {}",
                resolver
                    .combined_image_path(&filename, &Category::Same)?
                    .display()
            );
        }
        Commands::Comment { action } => {
            let store = CommentStore::new(resolver);
            match action {
                CommentAction::Get { filename } => match store.get_comment(&filename).await? {
                    Some(comment) => println!("{}", comment),
                    None => println!("(no comment)"),
                },
                CommentAction::Set { filename, comment } => {
                    store.set_comment(&filename, &comment).await?;
                    println!("comment saved for {}", filename);
                }
                CommentAction::List { filename } => {
                    for (file, comment) in store.day_comments(&filename).await? {
                        match comment.as_str() {
                            Some(text) => println!("{}\t{}", file, text),
                            None => println!("{}\t{}", file, comment),
                        }
                    }
                }
            }
        }
        Commands::Config { action } => {
            let store = ConfigurationStore::new(&cfg.data.analysis_dir);
            match action {
                ConfigAction::Show => {
                    let bundle = store.get_configuration().await?;
                    println!("{}", serde_json::to_string_pretty(&bundle)?);
                }
                ConfigAction::SetParticle { particle } => {
                    let particle: Particle = particle.parse()?;
                    let doc = store.switch_particle(particle).await?;
                    println!("{}", serde_json::to_string_pretty(&doc)?);
                }
            }
        }
        Commands::Latest => {
            let store = ConfigurationStore::new(&cfg.data.analysis_dir);
            let marker = store.get_latest().await?;
            println!("{}", serde_json::to_string_pretty(&marker)?);
        }
        Commands::Watch {
            year,
            month,
            day,
            interval_ms,
        } => {
            let key = DateKey::from_segments(&year, &month, Some(&day))?;
            watch::watch_day(
                &resolver,
                &key,
                Duration::from_millis(interval_ms.max(100)),
                |files| {
                    match files.first() {
                        Some(newest) => println!("{} ({} dumps)", newest, files.len()),
                        None => println!("(no dumps yet)"),
                    }
                    true
                },
            )
            .await?;
        }
        Commands::HashPassword { .. } => {}
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
