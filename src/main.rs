use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use guarded_query::catalog::config::CatalogDefinition;
use guarded_query::{
    BuilderConfig, Collaborators, Dialect, Engine, InMemoryCatalog, PermissionContext,
    QueryRequest,
};

/// guarded-query - build permission-checked SQL from a JSON request
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML catalog fixture (entities, access, user permissions, shares)
    #[arg(long)]
    catalog: PathBuf,

    /// JSON request document
    #[arg(long)]
    request: PathBuf,

    /// Acting user
    #[arg(long, default_value = "Administrator")]
    user: String,

    /// Builder configuration YAML; environment variables are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQL dialect (mariadb, postgres, sqlite)
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Restrict link columns to permitted documents only
    #[arg(long)]
    strict: bool,

    /// Skip every permission check
    #[arg(long)]
    ignore_permissions: bool,

    /// Entity whose link values are being listed
    #[arg(long)]
    reference_entity: Option<String>,

    /// Parent record names used to render child queries
    #[arg(long, value_delimiter = ',')]
    parent: Vec<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BuilderConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BuilderConfig::from_env().context("reading config from environment")?,
    };
    if let Some(dialect) = cli.dialect {
        config = config.with_dialect(dialect);
    }
    if cli.strict {
        config = config.with_strict_user_permissions(true);
    }

    let definition = CatalogDefinition::from_yaml_file(&cli.catalog)
        .with_context(|| format!("loading catalog {}", cli.catalog.display()))?;
    let catalog = InMemoryCatalog::from_definition(definition);

    let document = fs::read_to_string(&cli.request)
        .with_context(|| format!("reading request {}", cli.request.display()))?;
    let document: serde_json::Value =
        serde_json::from_str(&document).context("request is not valid JSON")?;
    let request = QueryRequest::from_json(&document)?;

    let mut ctx = if cli.ignore_permissions {
        PermissionContext::ignoring_permissions(&cli.user)
    } else {
        PermissionContext::for_user(&cli.user)
    };
    if let Some(reference) = &cli.reference_entity {
        ctx = ctx.with_reference_entity(reference);
    }

    log::info!("building query as {} with {} dialect", cli.user, config.dialect);
    let engine = Engine::new(Collaborators::from_catalog(Arc::new(catalog)), config);
    let query = engine.get_query(&request, &ctx)?;
    println!("{}", query.to_sql());

    for child in query.child_queries() {
        let child_query = child.get_query(&engine, &cli.parent, &ctx)?;
        println!("-- {} ({})", child.fieldname, child.entity);
        println!("{}", child_query.to_sql());
    }
    Ok(())
}
