use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use product_image_finder::config::{get_config_path, get_log_directory};
use product_image_finder::core::CandidatePlan;
use product_image_finder::logging::{init_logging, LogContext, RequestIdGenerator};
use product_image_finder::{log_info, AppConfig, Brand, ImagePipeline, ValidatedImage};

#[derive(Parser)]
#[command(name = "product-image-finder")]
#[command(about = "Find validated product images for a product page or code")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Configuration file path")]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find validated images for a product page
    Find {
        #[arg(help = "Product page URL")]
        url: String,

        #[arg(long, help = "Use this rendered HTML file instead of fetching the page")]
        html: Option<String>,

        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,
    },

    /// Find validated images for a bare product code
    Code {
        #[arg(help = "Product code, e.g. 1203A474-002")]
        code: String,

        #[arg(short, long, help = "Brand name (asics, nike, adidas, new-balance)")]
        brand: Option<String>,

        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,
    },

    /// Print the generated candidates for a page without any network access
    Candidates {
        #[arg(help = "Product page URL")]
        url: String,

        #[arg(short, long, help = "Number of candidates to show")]
        limit: Option<usize>,
    },

    /// Write the default configuration file
    InitConfig {
        #[arg(short, long, help = "Target path (defaults to the platform config directory)")]
        output: Option<String>,

        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Find { url, html, json } => {
            let pipeline = start(&cli).await?;
            let images = match html {
                Some(path) => {
                    let content = tokio::fs::read_to_string(path)
                        .await
                        .with_context(|| format!("failed to read HTML file {}", path))?;
                    pipeline.get_images_from_html(url, &content).await?
                }
                None => pipeline.get_images(url).await?,
            };
            print_images(&images, *json)?;
        }
        Commands::Code { code, brand, json } => {
            let brand = match brand {
                Some(name) => name.parse::<Brand>().map_err(anyhow::Error::msg)?,
                None => Brand::Unknown,
            };
            let pipeline = start(&cli).await?;
            let images = pipeline.images_for_code(code, brand).await?;
            print_images(&images, *json)?;
        }
        Commands::Candidates { url, limit } => {
            let pipeline = start(&cli).await?;
            let plan = pipeline.plan_candidates(url)?;
            print_plan(&plan, *limit);
        }
        Commands::InitConfig { output, force } => {
            return init_config(output.as_deref(), *force).await;
        }
    }

    info!("Product image finder finished");
    Ok(())
}

/// Load configuration, start logging and build the pipeline
async fn start(cli: &Cli) -> Result<ImagePipeline> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .await
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => AppConfig::load().await?,
    };

    if cli.verbose {
        config.logging.level = "info,product_image_finder=debug".to_string();
    }
    start_logging(&mut config)?;

    Ok(ImagePipeline::new(&config)?)
}

async fn init_config(output: Option<&str>, force: bool) -> Result<()> {
    let path = output.map(PathBuf::from).unwrap_or_else(get_config_path);
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
    }

    AppConfig::default().save_to(&path).await?;
    println!("Configuration written to: {}", path.display());
    Ok(())
}

fn start_logging(config: &mut AppConfig) -> Result<()> {
    if config.logging.file_enabled && config.logging.log_directory.is_relative() {
        config.logging.log_directory = get_log_directory();
    }

    init_logging(&config.logging)?;

    let context = LogContext::new("main", "startup")
        .with_request_id(RequestIdGenerator::generate())
        .with_string_field("version", env!("CARGO_PKG_VERSION"));

    log_info!(context, "Product image finder starting up");
    Ok(())
}

fn print_images(images: &[ValidatedImage], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(images)?);
        return Ok(());
    }

    if images.is_empty() {
        println!("No images found.");
        return Ok(());
    }

    println!("{:<4} {:<11} {}", "#", "Size", "Source");
    println!("{}", "-".repeat(80));
    for (i, image) in images.iter().enumerate() {
        println!(
            "{:<4} {:<11} {}",
            i + 1,
            format!("{}x{}", image.width, image.height),
            image.src
        );
    }
    Ok(())
}

fn print_plan(plan: &CandidatePlan, limit: Option<usize>) {
    println!("Brand: {}", plan.brand);
    match &plan.code {
        Some(code) => println!("Code:  {}", code.as_str()),
        None => println!("Code:  (not found)"),
    }
    println!("Generated candidates: {}", plan.generated.len());
    println!("{}", "-".repeat(80));

    let shown = limit.unwrap_or(plan.generated.len());
    for url in plan.generated.iter().take(shown) {
        println!("{}", url);
    }
}
