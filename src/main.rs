use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spy_cats::breeds::BreedValidator;
use spy_cats::config::Config;
use spy_cats::{api, db};

#[derive(Parser)]
#[command(name = "spycats")]
#[command(about = "Record keeping for spy cat field operations")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// SQLite database file (overrides SPY_CATS_DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Apply pending database migrations and exit
    Migrate {
        /// SQLite database file (overrides SPY_CATS_DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Re-derive mission completion from target state and fix any drift
    Repair {
        /// SQLite database file (overrides SPY_CATS_DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print the breeds currently accepted by the breed catalogue
    Breeds,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "spy_cats=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<db::Database> {
    let db = match path {
        Some(path) => db::Database::open(path)?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(config: Config, port: u16, db_path: Option<PathBuf>) -> anyhow::Result<()> {
    tracing::info!("Starting spy cats server on port {}", port);

    let db = open_database(db_path.or(config.db_path.clone()))?;
    let breeds = BreedValidator::remote(&config.breeds_url, config.breeds_timeout)?;
    let app = api::create_router_with_cors(db, breeds, config.cors_origins.as_deref());

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Spy cats server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = Config::from_env();

    match cli.command {
        Some(Commands::Serve { port, db }) => serve(config, port, db).await?,
        Some(Commands::Migrate { db }) => {
            open_database(db.or(config.db_path))?;
            println!("Database is up to date");
        }
        Some(Commands::Repair { db }) => {
            let repaired = open_database(db.or(config.db_path))?.repair_mission_completion()?;
            println!("Repaired {} mission(s)", repaired);
        }
        Some(Commands::Breeds) => {
            let breeds = BreedValidator::remote(&config.breeds_url, config.breeds_timeout)?;
            for breed in breeds.allowed_breeds().await? {
                println!("{}", breed);
            }
        }
        None => serve(config, 3000, None).await?,
    }

    Ok(())
}
