//! ConvertHub CLI - unit conversions and file conversion jobs

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use converthub::{
    ClientInfo, ConversionEngine, ConversionType, ConverterRegistry, FileConversionPipeline,
    HistoryStore, JobStatus, JobStore, MemoryHistoryStore, MemoryJobStore, NewFileJob, NewRecord,
    PipelineWorker, UnitRegistry, evaluate, normalize_format,
};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser)]
#[command(name = "converthub")]
#[command(about = "Unit conversions and file conversion jobs", long_about = None)]
struct Cli {
    /// Catalog file (defaults to ~/.config/converthub/catalog.toml)
    #[arg(long, global = true, value_name = "FILE")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List conversion categories
    Categories,

    /// List conversion types
    Types {
        /// Only show types in this category (slug)
        #[arg(long)]
        category: Option<String>,
    },

    /// Convert a value using a catalog conversion type
    Convert {
        /// Conversion type: a numeric id or category/type slugs
        #[arg(value_name = "TYPE")]
        type_ref: String,
        /// Value to convert
        value: String,
        /// Input unit (defaults to the type's input unit)
        #[arg(long)]
        input_unit: Option<String>,
        /// Output unit (defaults to the type's output unit)
        #[arg(long)]
        output_unit: Option<String>,
        /// Record the conversion under this user name
        #[arg(long)]
        user: Option<String>,
        /// Print the stored record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a conversion formula directly
    Eval {
        /// Formula, e.g. "x × 9/5 + 32"
        formula: String,
        /// Name of the input variable
        #[arg(long, default_value = "x")]
        var: String,
        /// Value bound to the input variable
        #[arg(long, default_value = "1")]
        input: String,
    },

    /// List file format converters
    Formats,

    /// Convert files through the job pipeline
    File {
        /// Input files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Target format
        #[arg(long)]
        to: String,
        /// Source format (overrides extension detection)
        #[arg(long)]
        from: Option<String>,
        /// Record the jobs under this user name
        #[arg(long)]
        user: Option<String>,
        /// Print finished jobs as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let registry = Arc::new(config::load_catalog(cli.catalog.as_deref())?);

    // Create registry with the serde-backed file converters
    let mut converters = ConverterRegistry::new();
    converthub_formats::register_all(&mut converters);

    match cli.command {
        Commands::Categories => cmd_categories(&registry),
        Commands::Types { category } => cmd_types(&registry, category),
        Commands::Convert {
            type_ref,
            value,
            input_unit,
            output_unit,
            user,
            json,
        } => cmd_convert(&registry, &type_ref, &value, input_unit, output_unit, user, json),
        Commands::Eval {
            formula,
            var,
            input,
        } => cmd_eval(&formula, &var, &input),
        Commands::Formats => cmd_formats(&converters),
        Commands::File {
            inputs,
            to,
            from,
            user,
            json,
        } => cmd_file(Arc::new(converters), inputs, &to, from, user, json),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_categories(registry: &UnitRegistry) -> Result<()> {
    println!("Available categories:\n");

    for category in registry.categories() {
        println!("  {}", category.slug);
        if !category.description.is_empty() {
            println!("    {}", category.description);
        }
    }

    println!();
    println!("Total: {} categories", registry.categories().count());
    Ok(())
}

fn cmd_types(registry: &UnitRegistry, category: Option<String>) -> Result<()> {
    if let Some(slug) = &category {
        if registry.category_by_slug(slug).is_none() {
            bail!("unknown category: {}", slug);
        }
    }

    println!("Available conversion types:\n");

    for ty in registry.types() {
        let category_slug = registry
            .category(ty.category_id)
            .map(|c| c.slug.as_str())
            .unwrap_or("?");
        if let Some(slug) = &category {
            if category_slug != slug {
                continue;
            }
        }

        println!("  {}/{} (id {})", category_slug, ty.slug, ty.id);
        println!("    {} -> {}", ty.input_unit, ty.output_unit);
        println!("    {}", ty.formula);
        println!();
    }

    Ok(())
}

fn cmd_convert(
    registry: &Arc<UnitRegistry>,
    type_ref: &str,
    value: &str,
    input_unit: Option<String>,
    output_unit: Option<String>,
    user: Option<String>,
    json: bool,
) -> Result<()> {
    let ty = resolve_type(registry, type_ref)?;
    let type_id = ty.id;
    let input_unit = input_unit.unwrap_or_else(|| ty.input_unit.clone());
    let output_unit = output_unit.unwrap_or_else(|| ty.output_unit.clone());

    let input_value: Decimal = value
        .parse()
        .with_context(|| format!("invalid numeric value: {}", value))?;

    let engine = ConversionEngine::new(Arc::clone(registry));
    let result = engine.convert(type_id, input_value, &input_unit, &output_unit)?;

    let history = MemoryHistoryStore::new();
    let record = history.save(NewRecord {
        result,
        user,
        client: ClientInfo {
            ip_address: None,
            user_agent: Some(format!("converthub-cli/{}", env!("CARGO_PKG_VERSION"))),
        },
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "{} {} = {} {}",
            record.input_value, record.input_unit, record.output_value, record.output_unit
        );
    }

    Ok(())
}

fn cmd_eval(formula: &str, var: &str, input: &str) -> Result<()> {
    let input_value: Decimal = input
        .parse()
        .with_context(|| format!("invalid numeric value: {}", input))?;

    let output = evaluate(formula, var, input_value)?;
    println!("{}", output);
    Ok(())
}

fn cmd_formats(converters: &ConverterRegistry) -> Result<()> {
    println!("Available file converters:\n");

    for decl in converters.declarations() {
        println!("  {}", decl.id);
        if !decl.description.is_empty() {
            println!("    {}", decl.description);
        }
        println!("    {} -> {}", decl.input_format, decl.output_format);
        println!();
    }

    println!("Total: {} converters", converters.len());
    Ok(())
}

fn cmd_file(
    converters: Arc<ConverterRegistry>,
    inputs: Vec<PathBuf>,
    to: &str,
    from: Option<String>,
    user: Option<String>,
    json: bool,
) -> Result<()> {
    let output_format = canonical_format(to);

    let store = Arc::new(MemoryJobStore::new());
    let pipeline = FileConversionPipeline::new(store.clone(), converters);
    let worker = PipelineWorker::spawn(pipeline);

    let mut ids = Vec::new();
    for input in &inputs {
        let metadata = std::fs::metadata(input)
            .with_context(|| format!("cannot read {}", input.display()))?;

        let input_format = match &from {
            Some(format) => canonical_format(format),
            None => detect_format(input).with_context(|| {
                format!("could not detect format of {}; use --from", input.display())
            })?,
        };

        let job = store.create(NewFileJob {
            user: user.clone(),
            input_file: input.clone(),
            input_format,
            output_format: output_format.clone(),
            size_input: metadata.len(),
        });
        worker.enqueue(job.id);
        ids.push(job.id);
    }

    wait_for_jobs(store.as_ref(), &ids)?;
    worker.shutdown();

    let mut failures = 0;
    for id in &ids {
        let job = store.load(*id)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&job)?);
        }

        match job.status {
            JobStatus::Completed => {
                if !json {
                    let output = job.output_file.as_deref().unwrap_or(Path::new("?"));
                    println!(
                        "Completed: {} -> {} ({} bytes, {:.3}s)",
                        job.input_file.display(),
                        output.display(),
                        job.size_output.unwrap_or(0),
                        job.duration_secs.unwrap_or(0.0),
                    );
                }
            }
            JobStatus::Failed => {
                failures += 1;
                eprintln!(
                    "Failed: {}: {}",
                    job.input_file.display(),
                    job.error_message.as_deref().unwrap_or("unknown error")
                );
            }
            JobStatus::Pending | JobStatus::Processing => {}
        }
    }

    if failures > 0 {
        bail!("{} of {} jobs failed", failures, ids.len());
    }
    Ok(())
}

fn resolve_type<'a>(registry: &'a UnitRegistry, type_ref: &str) -> Result<&'a ConversionType> {
    if let Some((category, slug)) = type_ref.split_once('/') {
        return Ok(registry.resolve_by_slug(category, slug)?);
    }

    let id: u64 = type_ref
        .parse()
        .context("type must be a numeric id or category/type slugs")?;
    Ok(registry.resolve(id)?)
}

/// Detect format from file extension.
fn detect_format(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    let format = canonical_format(ext);
    if format.is_empty() { None } else { Some(format) }
}

/// Map a raw extension or format name to its canonical format id.
fn canonical_format(name: &str) -> String {
    let format = normalize_format(name);
    match format.as_str() {
        "yml" => "yaml".into(),
        _ => format,
    }
}

fn wait_for_jobs(store: &MemoryJobStore, ids: &[u64]) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(600);

    while Instant::now() < deadline {
        let mut all_done = true;
        for id in ids {
            if !store.load(*id)?.status.is_terminal() {
                all_done = false;
                break;
            }
        }
        if all_done {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(25));
    }

    bail!("timed out waiting for conversion jobs")
}
