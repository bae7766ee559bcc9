//! Postern CLI - inspect authorization decisions and run filtered searches
//!
//! Evaluates catalogued requests for an actor described by identity
//! attributes, against the configured read model.

mod input;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use postern_access::requests::{SearchCampaigns, SearchDomains, SearchEmails, SearchSubdomains};
use postern_access::{CatalogRequest, Decision, PolicyEvaluator, PolicyRegistry, RequestContext};
use postern_core::{init_logging, PosternConfig, SearchParams, SortOrder, SubdomainId};
use postern_store::{QueryError, SearchService, SqliteReadModel};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "postern")]
#[command(about = "Authorization toolkit for the email capture platform")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and evaluate the policy of a request for an actor
    Check {
        /// Identity attributes as JSON (or @file)
        #[arg(short, long)]
        attributes: String,

        /// Request as tagged JSON (or @file), e.g. {"type":"GetDomain","domain_id":"..."}
        #[arg(short, long)]
        request: String,

        /// Mark the request as an internal call
        #[arg(long)]
        internal: bool,
    },

    /// Run a row-filtered search as an actor
    Search {
        /// What to search
        #[arg(value_enum)]
        kind: SearchKind,

        /// Identity attributes as JSON (or @file)
        #[arg(short, long)]
        attributes: String,

        /// Case-insensitive substring filter
        #[arg(short, long)]
        term: Option<String>,

        /// 1-based page number
        #[arg(long, default_value = "1")]
        page: u32,

        /// Rows per page (0 uses the configured default)
        #[arg(long, default_value = "0")]
        page_size: u32,

        /// Newest / last first
        #[arg(long)]
        desc: bool,

        /// Restrict emails or campaigns to one subdomain
        #[arg(long)]
        subdomain: Option<SubdomainId>,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SearchKind {
    Domains,
    Subdomains,
    Emails,
    Campaigns,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, source) = load_config(cli.config.as_deref())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    match &source {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("No configuration file found, using defaults"),
    }

    match cli.command {
        Commands::Check {
            attributes,
            request,
            internal,
        } => handle_check(&attributes, &request, internal, &config).await?,
        Commands::Search {
            kind,
            attributes,
            term,
            page,
            page_size,
            desc,
            subdomain,
        } => {
            let params = SearchParams {
                term,
                sort: if desc {
                    SortOrder::Descending
                } else {
                    SortOrder::Ascending
                },
                page,
                page_size,
            };
            handle_search(kind, &attributes, params, subdomain, &config).await?
        }
        Commands::Config {
            show,
            init,
            validate,
        } => handle_config(show, init, validate, cli.config.as_deref())?,
    }

    Ok(())
}

fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|d| d.join("postern").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".postern").join("config.toml")),
        Some(PathBuf::from("postern.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Explicit path, then the first default location that exists, else defaults
fn load_config(config_path: Option<&Path>) -> Result<(PosternConfig, Option<PathBuf>)> {
    if let Some(path) = config_path {
        let config = PosternConfig::from_file(path)?;
        return Ok((config, Some(path.to_path_buf())));
    }

    for path in default_config_paths() {
        if path.exists() {
            let config = PosternConfig::from_file(&path)?;
            return Ok((config, Some(path)));
        }
    }

    Ok((PosternConfig::default(), None))
}

async fn open_evaluator(config: &PosternConfig) -> Result<(Arc<PolicyEvaluator>, SqliteReadModel)> {
    let read_model = SqliteReadModel::connect(&config.store)
        .await
        .with_context(|| format!("Failed to open {}", config.store.database_url))?;

    let evaluator = PolicyEvaluator::from_config(
        Arc::new(PolicyRegistry::standard()),
        Arc::new(read_model.clone()),
        &config.access,
    );
    Ok((Arc::new(evaluator), read_model))
}

async fn handle_check(
    attributes: &str,
    request: &str,
    internal: bool,
    config: &PosternConfig,
) -> Result<()> {
    let attributes = input::parse_attributes(attributes)?;
    let request: CatalogRequest = input::parse_request(request)?;

    let mut ctx = RequestContext::from_attributes(&attributes);
    if internal {
        ctx = ctx.into_internal();
    }

    let (evaluator, _) = open_evaluator(config).await?;

    println!("Actor:   {}", ctx.actor().summary());
    println!("Request: {}", request.name());

    let Some(policy) = evaluator.registry().build_dyn(&ctx, request.as_any()) else {
        println!("Policy:  <not registered>");
        println!("Outcome: ERR_FORBIDDEN");
        return Ok(());
    };
    println!("Policy:  {}", policy);

    if policy.is_empty() {
        println!("Outcome: allowed (empty policy)");
        return Ok(());
    }

    let evaluation = evaluator.evaluate(&ctx, &policy).await;
    for step in &evaluation.steps {
        match &step.decision {
            Decision::Authorized => println!("  [pass] {}", step.requirement),
            Decision::Denied(reason) => println!("  [deny] {} ({})", step.requirement, reason),
        }
    }
    if evaluation.skipped > 0 {
        println!("  [skip] {} not evaluated", evaluation.skipped);
    }

    match evaluation.outcome() {
        Ok(()) => println!("Outcome: allowed"),
        Err(error) => println!("Outcome: {}", error.code()),
    }
    Ok(())
}

async fn handle_search(
    kind: SearchKind,
    attributes: &str,
    params: SearchParams,
    subdomain_id: Option<SubdomainId>,
    config: &PosternConfig,
) -> Result<()> {
    let ctx = RequestContext::from_attributes(&input::parse_attributes(attributes)?);
    let (evaluator, read_model) = open_evaluator(config).await?;
    let service = SearchService::new(evaluator, read_model, config.access.clone());

    let output = match kind {
        SearchKind::Domains => render(service.search_domains(&ctx, SearchDomains { params }).await),
        SearchKind::Subdomains => {
            render(service.search_subdomains(&ctx, SearchSubdomains { params }).await)
        }
        SearchKind::Emails => render(
            service
                .search_emails(&ctx, SearchEmails { subdomain_id, params })
                .await,
        ),
        SearchKind::Campaigns => render(
            service
                .search_campaigns(&ctx, SearchCampaigns { subdomain_id, params })
                .await,
        ),
    }?;

    println!("{}", output);
    Ok(())
}

/// Pretty JSON for a page, or the error code the caller would see
fn render<T: Serialize>(result: Result<T, QueryError>) -> Result<String> {
    match result {
        Ok(page) => Ok(serde_json::to_string_pretty(&page)?),
        Err(error) => Ok(serde_json::to_string_pretty(
            &serde_json::json!({ "error": error.code() }),
        )?),
    }
}

fn handle_config(show: bool, init: bool, validate: bool, config_path: Option<&Path>) -> Result<()> {
    if init {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => dirs::config_dir()
                .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
                .ok_or_else(|| anyhow!("No configuration directory available, pass --config"))?
                .join("postern")
                .join("config.toml"),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        PosternConfig::default().save_to_file(&path)?;
        println!("Configuration initialized at: {:?}", path);
    }

    if show {
        let (config, _) = load_config(config_path)?;
        println!("{}", toml::to_string_pretty(&config)?);
    }

    if validate {
        let (config, _) = load_config(config_path)?;
        config.validate()?;
        println!("Configuration is valid");
    }

    Ok(())
}
