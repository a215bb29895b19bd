//! sightline binary.
//!
//! Reads `sightline.toml` (or the path given with `--config`) layered with
//! `SIGHTLINE_*` environment variables, opens the SQLite store, and either
//! serves the analytics API or runs ingestion cycles.
//!
//! ```text
//! sightline keyword add "data catalog" "data lineage"
//! sightline sitemap add https://atlan.com/sitemap.xml
//! sightline run            # every cycle, on the configured interval
//! sightline serve          # JSON API under /api
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::{Context as _, ensure};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::Serialize;
use sightline_core::{
  mention::SubstringMatcher,
  store::{KeywordRegistry, MentionStore, RankingStore, UrlTracker},
};
use sightline_engine::{
  Engine, EngineConfig, RetryPolicy,
  providers::{
    HttpPageFetcher, HttpSitemapFetcher, LlmAnalyzer, OpenRouterClient, OpenRouterModel,
    SerperRankChecker, http_client,
  },
};
use sightline_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Sightline brand visibility tracker")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "sightline.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the read-only analytics API.
  Serve,
  /// Run every cycle on the configured interval.
  Run {
    /// Run a single round and exit.
    #[arg(long)]
    once: bool,
  },
  /// Check search rankings for the configured keywords and domains.
  Rank {
    /// Check date; defaults to today (UTC).
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// Ask the configured models about every keyword.
  Mentions {
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// Process due sitemaps.
  Discover,
  /// Analyze every tracked URL whose analysis is missing or stale.
  Analyze,
  Keyword {
    #[command(subcommand)]
    action: KeywordAction,
  },
  Sitemap {
    #[command(subcommand)]
    action: SitemapAction,
  },
  /// Check stored mention flags against the configured brand.
  Audit {
    /// Rewrite inconsistent flags.
    #[arg(long)]
    repair: bool,
  },
}

#[derive(Subcommand)]
enum KeywordAction {
  Add { text: Vec<String> },
  List,
}

#[derive(Subcommand)]
enum SitemapAction {
  Add { url: Vec<String> },
  List,
}

type Store = SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("SIGHTLINE")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("keywords")
        .with_list_parse_key("domains")
        .with_list_parse_key("competitors")
        .with_list_parse_key("sitemaps")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let cfg: EngineConfig = settings
    .try_deserialize()
    .context("failed to deserialise EngineConfig")?;

  if cfg.brand.trim().is_empty() {
    warn!("no brand configured; no answer will count as a mention");
  }

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path, Arc::new(SubstringMatcher::new(&cfg.brand)))
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let client = http_client(Duration::from_secs(cfg.retry.timeout_secs.max(1)))
    .context("failed to build HTTP client")?;
  let engine = Engine::new(store.clone(), RetryPolicy::from(&cfg.retry), cfg.engine_options());
  let today = || Utc::now().date_naive();

  match cli.command {
    Command::Serve => serve(&cfg, store).await,
    Command::Run { once } => run(&cfg, &engine, client, once).await,
    Command::Rank { date } => {
      let checker = rank_checker(&cfg, &client)?;
      let report = engine
        .run_ranking_cycle(&checker, &cfg.keywords, &cfg.domains, date.unwrap_or_else(today))
        .await;
      print_json(&report)
    }
    Command::Mentions { date } => {
      let models = models(&cfg, &client)?;
      let report = engine
        .run_mention_cycle(&models, &cfg.keywords, date.unwrap_or_else(today))
        .await;
      print_json(&report)
    }
    Command::Discover => {
      register_sitemaps(&cfg, &engine).await?;
      let fetcher = HttpSitemapFetcher::new(client);
      print_json(&engine.run_discovery_cycle(&fetcher, Utc::now()).await)
    }
    Command::Analyze => {
      let analyzer = analyzer(&cfg, &client)?;
      let pages = HttpPageFetcher::new(client);
      let urls = engine.pending_analysis().await?;
      print_json(&engine.run_analysis_cycle(&pages, &analyzer, &urls).await)
    }
    Command::Keyword { action: KeywordAction::Add { text } } => {
      for t in &text {
        let keyword = store.register_keyword(t).await?;
        println!("{}\t{}", keyword.keyword_id, keyword.text);
      }
      Ok(())
    }
    Command::Keyword { action: KeywordAction::List } => print_json(&store.list_keywords().await?),
    Command::Sitemap { action: SitemapAction::Add { url } } => {
      for u in &url {
        let record = store.register_sitemap(u).await?;
        println!("{}\t{}", record.sitemap_url, record.status.as_str());
      }
      Ok(())
    }
    Command::Sitemap { action: SitemapAction::List } => print_json(&store.list_sitemaps().await?),
    Command::Audit { repair } => audit(&store, repair).await,
  }
}

async fn serve(cfg: &EngineConfig, store: Arc<Store>) -> anyhow::Result<()> {
  let app = axum::Router::new()
    .nest("/api", sightline_api::api_router(store))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

async fn audit(store: &Store, repair: bool) -> anyhow::Result<()> {
  let orphans = store.orphaned_rankings().await?;
  if !orphans.is_empty() {
    warn!(count = orphans.len(), "ranking observations reference unknown keywords");
  }

  if repair {
    let repaired = store.rederive_mentions().await?;
    info!(count = repaired.len(), "mention flags re-derived");
    print_json(&repaired)
  } else {
    let violations = store.audit_mentions().await?;
    info!(count = violations.len(), "mention audit finished");
    print_json(&violations)
  }
}

// ─── Cycles ──────────────────────────────────────────────────────────────────

fn rank_checker(cfg: &EngineConfig, client: &Client) -> anyhow::Result<SerperRankChecker> {
  ensure!(!cfg.serper_api_key.is_empty(), "serper_api_key is not configured");
  Ok(SerperRankChecker::new(client.clone(), &cfg.serper_api_key))
}

fn openrouter(cfg: &EngineConfig, client: &Client) -> anyhow::Result<OpenRouterClient> {
  ensure!(!cfg.openrouter_api_key.is_empty(), "openrouter_api_key is not configured");
  Ok(OpenRouterClient::new(client.clone(), &cfg.openrouter_api_key))
}

fn models(cfg: &EngineConfig, client: &Client) -> anyhow::Result<Vec<OpenRouterModel>> {
  ensure!(!cfg.models.is_empty(), "no models configured");
  let chat = openrouter(cfg, client)?;
  Ok(
    cfg
      .models
      .iter()
      .map(|m| OpenRouterModel::new(chat.clone(), &m.id, &m.name))
      .collect(),
  )
}

fn analyzer(cfg: &EngineConfig, client: &Client) -> anyhow::Result<LlmAnalyzer> {
  Ok(LlmAnalyzer::new(openrouter(cfg, client)?, &cfg.analysis_model, cfg.analysis_version))
}

async fn register_sitemaps(cfg: &EngineConfig, engine: &Engine<Store>) -> anyhow::Result<()> {
  for url in &cfg.sitemaps {
    engine
      .store()
      .register_sitemap(url)
      .await
      .with_context(|| format!("failed to register sitemap {url}"))?;
  }
  Ok(())
}

/// Every cycle whose collaborators are configured, once per interval.
async fn run(
  cfg: &EngineConfig,
  engine: &Engine<Store>,
  client: Client,
  once: bool,
) -> anyhow::Result<()> {
  register_sitemaps(cfg, engine).await?;

  let checker = rank_checker(cfg, &client)
    .inspect_err(|e| warn!("ranking cycles disabled: {e}"))
    .ok();
  let models = models(cfg, &client)
    .inspect_err(|e| warn!("mention cycles disabled: {e}"))
    .ok();
  let analyzer = analyzer(cfg, &client)
    .inspect_err(|e| warn!("analysis cycles disabled: {e}"))
    .ok();
  let fetcher = HttpSitemapFetcher::new(client.clone());
  let pages = HttpPageFetcher::new(client);

  let mut interval = tokio::time::interval(cfg.cycle_interval());
  loop {
    tokio::select! {
      _ = interval.tick() => {}
      _ = tokio::signal::ctrl_c() => {
        info!("interrupted");
        return Ok(());
      }
    }

    let date = Utc::now().date_naive();
    if let Some(checker) = &checker {
      engine
        .run_ranking_cycle(checker, &cfg.keywords, &cfg.domains, date)
        .await;
    }
    if let Some(models) = &models {
      engine.run_mention_cycle(models, &cfg.keywords, date).await;
    }

    let discovery = engine.run_discovery_cycle(&fetcher, Utc::now()).await;
    if let Some(analyzer) = &analyzer {
      let queue = engine
        .analysis_queue(&discovery.analysis_queue)
        .await
        .unwrap_or_else(|e| {
          warn!("could not list pending analyses: {e}");
          discovery.analysis_queue.clone()
        });
      engine.run_analysis_cycle(&pages, analyzer, &queue).await;
    }

    if once {
      return Ok(());
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
