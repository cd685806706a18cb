//! Alexandria: browse the Magic: The Gathering card catalog from the terminal.
//!
//! ```bash
//! # First two pages of blue-red cards whose name mentions "bolt"
//! alexandria list --pages 2 --colors ur --search bolt
//!
//! # Card details
//! alexandria show <id>
//!
//! # Favorites
//! alexandria cart add <id>
//! alexandria cart list
//!
//! # Interactive catalog view
//! alexandria browse
//! ```

use alexandria::config::{default_data_dir, Config, DEFAULT_SLOT};
use alexandria::glue::{write_card_detail, write_cards, write_cart, HELP};
use alexandria::{BrowseCommand, CartStore, CatalogSession, ColorFilter, Flow, MtgIoFetcher};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing::info;

#[derive(Parser)]
#[command(name = "alexandria")]
#[command(version)]
#[command(about = "Card catalog viewer for magicthegathering.io")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Base URL of the card API
    #[arg(long, env = "ALEXANDRIA_API_URL", default_value = alexandria::fetch::DEFAULT_API_URL)]
    api_url: String,

    /// Cards requested per page (1-100)
    #[arg(long, default_value_t = alexandria::fetch::DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Data directory (default: ~/.alexandria)
    #[arg(short, long, env = "ALEXANDRIA_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Name of the favorites slot
    #[arg(long, default_value = DEFAULT_SLOT, global = true)]
    slot: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch pages of cards and print them
    List {
        /// Number of pages to fetch
        #[arg(short, long, default_value_t = 1)]
        pages: u32,

        /// Colors to filter on, e.g. "wu" or "white,blue"
        #[arg(short, long)]
        colors: Option<String>,

        /// Only print cards whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show a single card
    Show { id: String },

    /// Favorites management
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },

    /// Interactive catalog view reading commands from stdin
    Browse {
        /// Initial color filter
        #[arg(short, long)]
        colors: Option<String>,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// List favorites
    List,
    /// Add one copy of a card
    Add { id: String },
    /// Remove one copy of a card
    Remove { id: String },
    /// Remove everything
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config {
        api_url: cli.api_url,
        data_dir: cli.data_dir.unwrap_or_else(default_data_dir),
        slot: cli.slot,
        timeout: Duration::from_secs(cli.timeout),
        ..Config::default()
    }
    .with_page_size(cli.page_size);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .context("Failed to start runtime")?;
    runtime.block_on(run(cli.command, config))
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "alexandria=info",
        2 => "alexandria=debug",
        _ => "alexandria=trace,reqwest=debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

fn parse_colors(colors: Option<&str>) -> Result<ColorFilter> {
    match colors {
        Some(c) => ColorFilter::parse(c).context("Invalid --colors"),
        None => Ok(ColorFilter::default()),
    }
}

async fn run(command: Commands, config: Config) -> Result<()> {
    let fetcher = MtgIoFetcher::with_timeout(&config.api_url, config.timeout)?;
    let cart_path = config.cart_path();
    let open_session = || -> Result<CatalogSession<MtgIoFetcher>> {
        let cart = CartStore::open(&cart_path)
            .with_context(|| format!("Failed to open favorites at {}", cart_path.display()))?;
        Ok(CatalogSession::new(fetcher.clone(), config.page_size, cart))
    };
    let mut stdout = std::io::stdout().lock();

    match command {
        Commands::List {
            pages,
            colors,
            search,
        } => {
            let mut session = open_session()?;
            session.set_colors(parse_colors(colors.as_deref())?);
            session.set_search(search.as_deref().unwrap_or(""));
            session.load_pages(pages).await;
            info!(
                loaded = session.state().len(),
                next_page = session.state().next_page(),
                "Finished loading"
            );
            if session.state().is_empty() {
                bail!("No cards were loaded, run with -v for details");
            }
            write_cards(&mut stdout, session.visible())?;
        }
        Commands::Show { id } => {
            let session = open_session()?;
            let card = session.show(&id).await?;
            write_card_detail(&mut stdout, &card)?;
        }
        Commands::Cart { action } => {
            let mut session = open_session()?;
            match action {
                CartAction::List => {}
                CartAction::Add { id } => {
                    let (card, quantity) = session.add_to_cart(&id).await?;
                    writeln!(stdout, "{} x{}", card.name, quantity)?;
                }
                CartAction::Remove { id } => match session.remove_from_cart(&id)? {
                    Some(quantity) => writeln!(stdout, "{} left: {}", id, quantity)?,
                    None => bail!("{} is not in favorites", id),
                },
                CartAction::Clear => session.clear_cart()?,
            }
            write_cart(&mut stdout, &session.cart())?;
        }
        Commands::Browse { colors } => {
            let mut session = open_session()?;
            session.set_colors(parse_colors(colors.as_deref())?);
            browse(&mut session, &mut stdout).await?;
        }
    }
    Ok(())
}

async fn browse(session: &mut CatalogSession<MtgIoFetcher>, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", HELP)?;
    session.handle(BrowseCommand::More, out).await?;
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match BrowseCommand::parse(&line) {
            Ok(Some(cmd)) => {
                if session.handle(cmd, out).await? == Flow::Quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(err) => writeln!(out, "{}", err)?,
        }
    }
    Ok(())
}
