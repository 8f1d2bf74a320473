use trendscope::analytics::PaidLevel;
use trendscope::config::AppConfig;
use trendscope::dashboard::{Dashboard, Snapshot};
use trendscope::execution::{CachedExecutor, DatabricksEngine, QueryExecutor, SqliteWarehouse};
use trendscope::filters::{FilterState, RawFilters, ALL};
use trendscope::llm::GeminiClient;
use trendscope::prompt::{self, PromptBuilder};
use trendscope::views::ViewKind;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "trendscope")]
#[command(about = "TikTok hashtag trend analytics over a gold/silver lakehouse")]
#[command(version)]
struct Args {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Warehouse engine; `auto` prefers Databricks when it is configured
    #[arg(long, value_enum, default_value_t = EngineKind::Auto, global = true)]
    engine: EngineKind,

    /// Directory holding silver.db and gold.db (or set TRENDSCOPE_SQLITE_DIR)
    #[arg(long, global = true)]
    sqlite_dir: Option<PathBuf>,

    /// Result cache lifetime in seconds (or set TRENDSCOPE_CACHE_TTL_SECS)
    #[arg(long, global = true)]
    cache_ttl_secs: Option<u64>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineKind {
    Auto,
    Databricks,
    Sqlite,
}

#[derive(clap::Args, Clone)]
struct FilterArgs {
    /// First day (YYYY-MM-DD); needs --end as well
    #[arg(long)]
    start: Option<String>,

    /// Last day (YYYY-MM-DD), inclusive
    #[arg(long)]
    end: Option<String>,

    /// Country code, repeatable (default: ALL)
    #[arg(long = "country")]
    countries: Vec<String>,

    /// Industry, repeatable (default: ALL)
    #[arg(long = "industry")]
    industries: Vec<String>,

    /// Hashtag substring, case-insensitive
    #[arg(long, default_value = "")]
    keyword: String,

    /// One of 10, 20, 30, 50, 100
    #[arg(long)]
    top_n: Option<u32>,
}

impl FilterArgs {
    fn to_state(&self) -> FilterState {
        let or_all = |values: &[String]| {
            if values.is_empty() {
                vec![ALL.to_string()]
            } else {
                values.to_vec()
            }
        };
        FilterState::from_input(RawFilters {
            start_date: self.start.clone(),
            end_date: self.end.clone(),
            countries: or_all(&self.countries),
            industries: or_all(&self.industries),
            keyword: self.keyword.clone(),
            top_n: self.top_n,
        })
    }
}

#[derive(clap::Args, Clone)]
struct BuilderArgs {
    /// Campaign goal
    #[arg(long, default_value = "")]
    goal: String,

    /// Target audience
    #[arg(long, default_value = "")]
    audience: String,

    /// Product or service and its selling points
    #[arg(long, default_value = "")]
    product: String,

    #[arg(long)]
    tone: Option<String>,

    #[arg(long)]
    kpi: Option<String>,

    #[arg(long, default_value = "")]
    constraints: String,

    /// Extra free-form instructions
    #[arg(long, default_value = "")]
    freeform: String,

    /// Number of video ideas (1-10)
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=10))]
    ideas: u32,

    #[arg(long, default_value = "English")]
    language: String,
}

impl BuilderArgs {
    fn to_builder(&self) -> PromptBuilder {
        let defaults = PromptBuilder::default();
        PromptBuilder {
            goal: self.goal.clone(),
            audience: self.audience.clone(),
            product_service: self.product.clone(),
            tone: self.tone.clone().unwrap_or(defaults.tone),
            kpi: self.kpi.clone().unwrap_or(defaults.kpi),
            constraints: self.constraints.clone(),
            freeform: self.freeform.clone(),
            idea_count: self.ideas,
            output_language: self.language.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the date range, countries and industries available for filtering
    Options,
    /// Run every view and print a summary
    Report {
        #[command(flatten)]
        filters: FilterArgs,

        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export one view as CSV
    Export {
        /// View name (e.g. momentum, retention, top100, weekly)
        view: ViewKind,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output file or directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Compile the prompt and context JSON and write them to disk
    Prompt {
        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        builder: BuilderArgs,

        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Compile the prompt and send it to the text-generation model
    Ask {
        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        builder: BuilderArgs,

        /// Also write the compiled prompt and context here
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env();
    let dashboard = Dashboard::new(build_executor(&args.source, &config)?);

    match args.command {
        Commands::Options => show_options(&dashboard).await,
        Commands::Report { filters, json } => {
            let snapshot = dashboard.render(&filters.to_state()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_report(&snapshot);
            }
            Ok(())
        }
        Commands::Export { view, filters, out } => {
            let snapshot = dashboard.render(&filters.to_state()).await;
            let path = if out.extension().map_or(false, |e| e == "csv") {
                out
            } else {
                std::fs::create_dir_all(&out)?;
                out.join(view.file_name())
            };
            let frame = snapshot.view(view);
            frame
                .save_csv(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} rows of {} to {}", frame.row_count(), view, path.display());
            Ok(())
        }
        Commands::Prompt { filters, builder, out_dir } => {
            let snapshot = dashboard.render(&filters.to_state()).await;
            let compiled = prompt::compile(&snapshot, &builder.to_builder())?;
            let (prompt_path, context_path) = compiled.write_to(&out_dir)?;
            print_picks(&compiled.context.hashtags.prefer, &compiled.context.hashtags.avoid);
            println!("\nPrompt:  {}", prompt_path.display());
            println!("Context: {}", context_path.display());
            Ok(())
        }
        Commands::Ask { filters, builder, save_dir } => {
            // Validate the key before spending a render pass.
            let client = GeminiClient::new(&config.gemini)?;
            let snapshot = dashboard.render(&filters.to_state()).await;
            let compiled = prompt::compile(&snapshot, &builder.to_builder())?;
            if let Some(dir) = save_dir {
                compiled.write_to(&dir)?;
            }
            print_picks(&compiled.context.hashtags.prefer, &compiled.context.hashtags.avoid);
            info!("Asking {} for {} ideas", client.model(), builder.ideas);
            let answer = client.generate(&compiled.system, &compiled.user).await?;
            println!("\n{}", "=".repeat(80));
            println!("{}", answer);
            Ok(())
        }
    }
}

fn build_executor(
    source: &SourceArgs,
    config: &AppConfig,
) -> Result<CachedExecutor<Box<dyn QueryExecutor>>> {
    let sqlite_dir = source.sqlite_dir.clone().or_else(|| config.sqlite_dir.clone());

    let engine: Box<dyn QueryExecutor> = match (source.engine, &config.warehouse, sqlite_dir) {
        (EngineKind::Databricks, Some(warehouse), _) | (EngineKind::Auto, Some(warehouse), _) => {
            Box::new(DatabricksEngine::new(warehouse)?)
        }
        (EngineKind::Databricks, None, _) => {
            return Err(anyhow!(
                "Databricks is not configured: set DATABRICKS_SERVER_HOSTNAME, DATABRICKS_HTTP_PATH and DATABRICKS_TOKEN"
            ))
        }
        (_, _, Some(dir)) => Box::new(SqliteWarehouse::open_dir(&dir)?),
        (_, _, None) => {
            return Err(anyhow!(
                "No warehouse configured: set the Databricks variables or pass --sqlite-dir"
            ))
        }
    };

    let ttl = source
        .cache_ttl_secs
        .map(std::time::Duration::from_secs)
        .unwrap_or(config.cache_ttl);
    info!("Using {} warehouse (cache ttl {}s)", engine.name(), ttl.as_secs());
    Ok(CachedExecutor::new(engine, ttl))
}

async fn show_options<E: QueryExecutor>(dashboard: &Dashboard<E>) -> Result<()> {
    let options = dashboard.filter_options().await;
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
    println!("Dates:      {} .. {}", date(options.min_date), date(options.max_date));
    println!("Countries:  {}", options.countries.join(", "));
    println!("Industries: {}", options.industries.join(", "));
    Ok(())
}

fn print_report(snapshot: &Snapshot) {
    println!("\n{}", "=".repeat(80));
    println!(" TREND REPORT ({})", snapshot.render_id);
    println!("{}", "=".repeat(80));

    let k = &snapshot.kpis;
    println!("\n Hashtags in scope:    {}", k.uniq_hashtags);
    println!(" Hashtags latest day:  {}", k.today_tags);
    println!(" Countries:            {}", k.uniq_countries);
    println!(" Industries:           {}", k.uniq_industries);

    println!("\n Views:");
    for kind in ViewKind::ALL {
        let source = snapshot
            .sources()
            .into_iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, s)| format!("{:?}", s).to_lowercase())
            .unwrap_or_else(|| "single".to_string());
        println!("   {:<20} {:>6} rows  ({})", kind.name(), snapshot.view(kind).row_count(), source);
    }

    let top_n = snapshot.filters.top_n.value();
    let hot = snapshot.momentum_latest.sort_by_number("view_delta", true).head(top_n);
    if !hot.is_empty() {
        println!("\n Hot on the latest day:");
        for (i, tag) in hot.texts("hashtag").iter().enumerate() {
            println!("   {:>3}. #{}", i + 1, tag);
        }
    }

    if !snapshot.industry_persistence.is_empty() {
        println!("\n Industry persistence (avg streak days):");
        for p in &snapshot.industry_persistence {
            println!("   {:<30} {:.2}", p.industry, p.avg_streak_days);
        }
    }

    let promo = &snapshot.promoted_summary;
    let pct = |s: Option<f64>| s.map(|v| format!("{:.1}%", v * 100.0)).unwrap_or_else(|| "N/A".to_string());
    println!("\n Promoted share: {} overall, {} last 7 days", pct(promo.global_share), pct(promo.last7_share));
    if promo.level != PaidLevel::Unknown {
        println!(" Market level:   {}", promo.level.label());
    }
    if let Some(top) = &promo.top_country {
        println!(" Most promoted:  {} ({:.1}%)", top.country_code, top.share * 100.0);
    }

    if !snapshot.warnings.is_empty() {
        println!("\n Warnings:");
        for w in &snapshot.warnings {
            println!("   - {}", w);
        }
    }
}

fn print_picks(prefer: &[String], avoid: &[String]) {
    let tags = |list: &[String]| {
        if list.is_empty() {
            "(none)".to_string()
        } else {
            list.iter()
                .map(|t| format!("#{}", t.trim_start_matches('#')))
                .collect::<Vec<_>>()
                .join(", ")
        }
    };
    println!("Prefer: {}", tags(prefer));
    println!("Avoid:  {}", tags(avoid));
}
