use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use folio::api::{create_router, AppState};
use folio::config::{Config, SourceConfig};
use folio::{SearchSession, SearchStatus};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use url::Url;

// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Full-text search over published page transcriptions", long_about = None)]
struct Cli {
    /// Published site to fetch texts_indices/ documents from
    #[arg(long, env = "FOLIO_BASE_URL", global = true, conflicts_with = "root")]
    base_url: Option<Url>,

    /// Built site directory containing texts_indices/
    #[arg(long, env = "FOLIO_ROOT", global = true)]
    root: Option<PathBuf>,

    /// JSON list of searchable texts
    #[arg(long, env = "FOLIO_CATALOG", global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the searchable texts
    Texts,
    /// Search the selected texts
    Search {
        query: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Open a search page URL, running the search in its `q` parameter
    Open {
        url: Url,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Serve the search API and the static index documents
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Text to search (repeatable); defaults to the first catalogue entry
    #[arg(short, long = "text")]
    texts: Vec<String>,

    /// Print the debug trace after the results
    #[arg(long)]
    debug: bool,
}

fn print_session(session: &SearchSession, debug: bool) {
    if let Some(error) = session.error() {
        eprintln!("Error: {error}");
    }

    let results = session.results();
    if results.is_empty() && session.status() != SearchStatus::Loading {
        println!("No results yet. Try a search.");
    }

    for (i, result) in results.iter().enumerate() {
        match &result.record {
            Some(record) => {
                println!("\n{}. [Score: {:.4}] {}", i + 1, result.score, record.title);
                println!("   Text: {} | Page: {}", result.slug, record.display_page());
                println!("   Link: {}", record.deep_link());
            }
            None => {
                println!("\n{}. [Score: {:.4}] <missing record {}>", i + 1, result.score, result.reference);
                println!("   Text: {}", result.slug);
            }
        }
        for excerpt in session.excerpts(result) {
            println!("   - {}", excerpt.marked("[", "]"));
        }
    }

    if debug {
        println!("\nDebug trace:");
        for entry in session.trace().entries() {
            println!("* {}\n{}", entry.msg, entry.data);
        }
    }
}

/// Page URL a command-line session pretends to be on
fn search_page_url(config: &Config) -> Result<Url> {
    let base = match &config.source {
        SourceConfig::Http { base_url } => base_url.clone(),
        SourceConfig::Dir { .. } => Url::parse("http://localhost/")?,
    };
    Ok(base.join("/search")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::new(cli.base_url, cli.root, cli.catalog)?;

    match cli.command {
        Command::Texts => {
            let catalog = config.load_catalog()?;
            for text in catalog.texts() {
                println!("{}\t{}\t{}", text.slug, text.label, text.index_path());
            }
        }
        Command::Search { query, output } => {
            let mut session = SearchSession::new(config.store()?, search_page_url(&config)?);
            if !output.texts.is_empty() {
                session.select_texts(output.texts);
            }
            session.set_query(query);

            let start = Instant::now();
            session.submit().await?;
            tracing::info!(results = session.results().len(), elapsed = ?start.elapsed(), "search finished");
            println!("URL: {}", session.url());
            print_session(&session, output.debug);
        }
        Command::Open { url, output } => {
            let mut session = SearchSession::new(config.store()?, url);
            if !output.texts.is_empty() {
                session.select_texts(output.texts);
            }
            if !session.auto_search().await? {
                println!("No query in {}", session.url());
            }
            print_session(&session, output.debug);
        }
        Command::Serve { addr } => {
            let state = AppState {
                store: config.store()?,
                page_url: Url::parse(&format!("http://{addr}/search"))
                    .context("Invalid listen address")?,
                static_root: config.source.root().cloned(),
            };
            let app = create_router(state);

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            tracing::info!("listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
