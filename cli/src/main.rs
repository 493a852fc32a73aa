use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use shopsearch_core::source::read_catalog;
use shopsearch_core::{retrieve, EngineConfig, SearchEngine, SearchFilters, SortBy};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "shopsearch")]
#[command(about = "Search a product catalog with BM25 and multi-signal ranking", long_about = None)]
struct Cli {
    /// Catalog path (JSON/JSONL file or directory)
    #[arg(long, global = true, default_value = "./catalog")]
    catalog: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ranked, filtered search. An empty query lists the whole catalog.
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        availability: Option<bool>,
        /// relevance, price_low, price_high or reviews
        #[arg(long, default_value = "relevance")]
        sort_by: String,
    },
    /// Products similar to the given row id
    Similar {
        id: u32,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Catalog answer for a query, or a report that a fallback fetch is needed
    Retrieve {
        query: String,
        #[arg(long, default_value_t = retrieve::DEFAULT_MIN_RELEVANCE)]
        threshold: f64,
        #[arg(long, default_value_t = retrieve::DEFAULT_RETRIEVE_LIMIT)]
        limit: usize,
    },
    /// Catalog and index statistics
    Stats,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    let engine = SearchEngine::new(EngineConfig::default());
    let rows = read_catalog(&cli.catalog)?;
    engine.load_rows(rows).with_context(|| format!("loading catalog {}", cli.catalog))?;

    let output = match cli.command {
        Commands::Search { query, limit, min_price, max_price, brand, availability, sort_by } => {
            let filters = SearchFilters {
                min_price,
                max_price,
                brand,
                availability,
                sort_by: SortBy::parse(&sort_by),
            };
            serde_json::to_value(engine.search(&query, &filters, limit))?
        }
        Commands::Similar { id, limit } => {
            let similar: Vec<_> = engine
                .similar(id, limit)
                .into_iter()
                .filter_map(|(other, score)| {
                    let product = engine.product(other)?;
                    Some(json!({ "id": other, "score": score, "title": product.title }))
                })
                .collect();
            json!(similar)
        }
        Commands::Retrieve { query, threshold, limit } => {
            serde_json::to_value(retrieve::retrieve(&engine, &query, threshold, limit))?
        }
        Commands::Stats => {
            let (min, max) = engine.price_range();
            json!({
                "stats": engine.stats(),
                "brands": engine.brands(),
                "price_range": { "min": min, "max": max },
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
