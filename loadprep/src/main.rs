//! Loadprep CLI - Clean CSV extracts before a warehouse load
//!
//! # Main Commands
//!
//! ```bash
//! loadprep run recipe.json           # Run a recipe end to end
//! loadprep recipe list               # Manage stored recipes
//! loadprep validate recipe.json      # Validate a recipe document
//! ```
//!
//! # Single-stage Commands (for exploring an extract)
//!
//! ```bash
//! loadprep inspect input.csv         # Show encoding, delimiter and columns
//! loadprep build input.csv -n artists -c artist --sort artist --id artist
//! loadprep match input.csv -c genre -t rock,pop,jazz
//! loadprep tickers input.csv -c symbol --clean
//! loadprep stages                    # Show available recipe steps
//! loadprep example-recipe            # Show an example recipe
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use loadprep::sink::write_copy_payload;
use loadprep::{
    build, clean_tickers, fuzzy_match_column, init_tracing, parse_file_auto, parse_file_with_delimiter,
    pipeline::format_delimiter, run_recipe, run_recipe_file, validate_ticker_format, BuildOptions,
    ConsoleLog, CsvDirectorySink, FailurePolicy, IdTiming, ParseResult, PipelineLog, RecipeRegistry,
    RunOptions, RunReport, SimilarityMetric, Table, TickerRange, TracingLog,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "loadprep")]
#[command(about = "Clean and key CSV extracts before a warehouse load", long_about = None)]
struct Cli {
    /// Send stage logs to the tracing subscriber (RUST_LOG) instead of the console
    #[arg(long, global = true)]
    tracing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and show what was detected
    Inspect {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Number of rows to preview
        #[arg(long, default_value = "5")]
        preview_rows: usize,
    },

    /// Build a deduplicated table from a CSV file
    Build {
        /// Input CSV file
        input: PathBuf,

        /// Name of the table being built
        #[arg(short, long)]
        name: String,

        /// Columns to keep, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Only drop rows with nulls in these columns
        #[arg(long, value_delimiter = ',')]
        subset: Option<Vec<String>>,

        /// Sort by this column
        #[arg(long)]
        sort: Option<String>,

        /// Append a <prefix>_id column
        #[arg(long)]
        id: Option<String>,

        /// Drop rows dated in the future in this column
        #[arg(long)]
        date_column: Option<String>,

        /// Keep rows with missing values
        #[arg(long)]
        keep_nulls: bool,

        /// Assign ids after the date filter so they stay contiguous
        #[arg(long)]
        ids_after_filter: bool,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rewrite a column to its closest vocabulary term
    Match {
        /// Input CSV file
        input: PathBuf,

        /// Column to rewrite
        #[arg(short, long)]
        column: String,

        /// Vocabulary terms, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        targets: Vec<String>,

        /// Similarity metric
        #[arg(short, long, value_enum, default_value = "gestalt")]
        metric: MetricArg,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Audit (and optionally clean) a ticker column
    Tickers {
        /// Input CSV file
        input: PathBuf,

        /// Ticker column
        #[arg(short, long)]
        column: String,

        /// Canonicalize stk tickers and drop the rest
        #[arg(long)]
        clean: bool,

        /// Lowest accepted stk number
        #[arg(long, default_value = "1")]
        min: u32,

        /// Highest accepted stk number
        #[arg(long, default_value = "500")]
        max: u32,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file for cleaned rows (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a recipe document against the recipe schema
    Validate {
        /// Recipe JSON file
        input: PathBuf,
    },

    /// Run a recipe: read sources, run steps, write loads
    Run {
        /// Recipe JSON file
        recipe: PathBuf,

        /// Directory receiving <schema>/<table>.csv (default: $LOADPREP_OUTPUT_DIR or output)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Skip schema validation
        #[arg(long)]
        no_validate: bool,

        /// Skip failing build/map steps instead of aborting
        #[arg(long)]
        skip_failures: bool,

        /// Write a header line in every output file
        #[arg(long)]
        header: bool,

        /// Save the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show an example recipe
    ExampleRecipe {
        /// Show the ticker cleaning example instead
        #[arg(long)]
        tickers: bool,
    },

    /// Show available recipe steps
    Stages,

    /// Manage stored recipes
    Recipe {
        #[command(subcommand)]
        action: RecipeAction,
    },
}

#[derive(Subcommand)]
enum RecipeAction {
    /// List all stored recipes
    List,

    /// Import a recipe JSON file
    Import {
        /// Recipe JSON file to import
        file: PathBuf,
        /// Name for the stored recipe
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show details of a stored recipe
    Show {
        /// Recipe ID
        id: String,
    },

    /// Delete a stored recipe
    Delete {
        /// Recipe ID
        id: String,
    },

    /// Run a stored recipe
    Use {
        /// Recipe ID
        id: String,
        /// Directory the recipe's relative source paths are resolved against
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,
        /// Directory receiving <schema>/<table>.csv
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Gestalt,
    JaroWinkler,
    Levenshtein,
}

impl From<MetricArg> for SimilarityMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Gestalt => SimilarityMetric::Gestalt,
            MetricArg::JaroWinkler => SimilarityMetric::JaroWinkler,
            MetricArg::Levenshtein => SimilarityMetric::Levenshtein,
        }
    }
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let log: &dyn PipelineLog = if cli.tracing { &TracingLog } else { &ConsoleLog };

    let result = match cli.command {
        Commands::Inspect {
            input,
            delimiter,
            preview_rows,
        } => cmd_inspect(&input, delimiter, preview_rows),

        Commands::Build {
            input,
            name,
            columns,
            subset,
            sort,
            id,
            date_column,
            keep_nulls,
            ids_after_filter,
            delimiter,
            output,
        } => {
            let mut options = BuildOptions::new();
            if let Some(subset) = subset {
                options = options.subset(subset);
            }
            if let Some(sort) = sort {
                options = options.sort_by(sort);
            }
            if let Some(id) = id {
                options = options.with_id(id);
            }
            if let Some(date_column) = date_column {
                options = options.date_column(date_column);
            }
            if keep_nulls {
                options = options.keep_nulls();
            }
            if ids_after_filter {
                options = options.id_timing(IdTiming::AfterDateFilter);
            }
            cmd_build(&input, &name, &columns, &options, delimiter, output.as_deref(), log)
        }

        Commands::Match {
            input,
            column,
            targets,
            metric,
            delimiter,
            output,
        } => cmd_match(&input, &column, &targets, metric.into(), delimiter, output.as_deref(), log),

        Commands::Tickers {
            input,
            column,
            clean,
            min,
            max,
            delimiter,
            output,
        } => cmd_tickers(
            &input,
            &column,
            clean.then_some(TickerRange { min, max }),
            delimiter,
            output.as_deref(),
            log,
        ),

        Commands::Validate { input } => cmd_validate(&input),

        Commands::Run {
            recipe,
            output_dir,
            no_validate,
            skip_failures,
            header,
            report,
        } => {
            let mut options = RunOptions::from_env();
            if let Some(dir) = output_dir {
                options.output_dir = dir;
            }
            options.skip_validation = no_validate;
            options.with_header = header;
            if skip_failures {
                options.failure_policy = Some(FailurePolicy::Skip);
            }
            cmd_run(&recipe, &options, report.as_deref(), log)
        }

        Commands::ExampleRecipe { tickers } => cmd_example_recipe(tickers),

        Commands::Stages => cmd_stages(),

        Commands::Recipe { action } => cmd_recipe(action, log),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn read_input(input: &Path, delimiter: Option<char>) -> Result<ParseResult, Box<dyn std::error::Error>> {
    let result = match delimiter {
        Some(d) => parse_file_with_delimiter(input, d)?,
        None => parse_file_auto(input)?,
    };
    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    Ok(result)
}

fn cmd_inspect(
    input: &Path,
    delimiter: Option<char>,
    preview_rows: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = read_input(input, delimiter)?;
    eprintln!("   Columns:");
    for column in result.table.columns() {
        eprintln!(
            "     - {} ({}, {} nulls)",
            column.name,
            column.dtype,
            column.null_count()
        );
    }
    eprintln!("✅ Parsed {} rows", result.table.row_count());

    let preview = result
        .table
        .take(&(0..preview_rows.min(result.table.row_count())).collect::<Vec<_>>());
    write_table(&preview, None)
}

fn cmd_build(
    input: &Path,
    name: &str,
    columns: &[String],
    options: &BuildOptions,
    delimiter: Option<char>,
    output: Option<&Path>,
    log: &dyn PipelineLog,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());
    let source = read_input(input, delimiter)?;

    eprintln!("\n⚙️  Building {}...", name);
    let table = build(name, &source.table, columns, options, log)?;

    write_table(&table, output)?;
    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_match(
    input: &Path,
    column: &str,
    targets: &[String],
    metric: SimilarityMetric,
    delimiter: Option<char>,
    output: Option<&Path>,
    log: &dyn PipelineLog,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());
    let source = read_input(input, delimiter)?;

    let table = fuzzy_match_column(&source.table, column, targets, metric, log)?;
    write_table(&table, output)
}

fn cmd_tickers(
    input: &Path,
    column: &str,
    clean: Option<TickerRange>,
    delimiter: Option<char>,
    output: Option<&Path>,
    log: &dyn PipelineLog,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());
    let source = read_input(input, delimiter)?;

    eprintln!("\n✔️  Ticker audit:");
    let report = validate_ticker_format(&source.table, column, log)?;

    match clean {
        Some(range) => {
            let cleaned = clean_tickers(&source.table, column, range, log)?;
            eprintln!("   🧹 Kept {} rows, dropped {}", cleaned.table.row_count(), cleaned.dropped);
            write_table(&cleaned.table, output)?;
        }
        None => {
            if report.invalid > 0 {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let content = fs::read_to_string(input)?;
    let document: serde_json::Value = serde_json::from_str(&content)?;

    match loadprep::validate_recipe(&document) {
        Ok(()) => {}
        Err(loadprep::ValidationError::SchemaError { errors }) => {
            eprintln!("\n❌ Recipe invalid:");
            for err in errors.iter().take(10) {
                eprintln!("   - {}", err);
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    let recipe = loadprep::Recipe::from_value(&document)?;
    if let Err(missing) = recipe.check_references() {
        eprintln!("\n❌ Steps use tables nothing produces:");
        for m in &missing {
            eprintln!("   - {}", m);
        }
        std::process::exit(1);
    }

    eprintln!(
        "\n📊 Recipe '{}' is valid: {} sources, {} steps",
        recipe.name,
        recipe.sources.len(),
        recipe.steps.len()
    );
    Ok(())
}

fn cmd_run(
    recipe: &Path,
    options: &RunOptions,
    report_path: Option<&Path>,
    log: &dyn PipelineLog,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = run_recipe_file(recipe, options, log)?;
    print_report(&report, report_path)
}

fn print_report(report: &RunReport, report_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    for load in &report.loads {
        eprintln!("   💾 {} ← {} ({} rows)", load.destination, load.table, load.rows);
    }
    let skipped: Vec<_> = report.steps.iter().filter(|s| s.error.is_some()).collect();
    if !skipped.is_empty() {
        eprintln!("\n⚠️  {} steps skipped:", skipped.len());
        for step in skipped {
            eprintln!(
                "   - step {} ({}): {}",
                step.index,
                step.kind,
                step.error.as_deref().unwrap_or_default()
            );
        }
    }

    if let Some(path) = report_path {
        fs::write(path, serde_json::to_string_pretty(report)?)?;
        eprintln!("   📝 Report saved to: {}", path.display());
    }

    eprintln!("\n✨ {}", report.summary());
    Ok(())
}

fn cmd_example_recipe(tickers: bool) -> Result<(), Box<dyn std::error::Error>> {
    let recipe = if tickers {
        loadprep::example_ticker_recipe()
    } else {
        loadprep::example_recipe()
    };
    println!("{}", recipe.to_json()?);
    Ok(())
}

fn cmd_stages() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", loadprep::steps_description());
    Ok(())
}

fn write_table(table: &Table, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            write_copy_payload(table, fs::File::create(p)?, true)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            write_copy_payload(table, std::io::stdout().lock(), true)?;
        }
    }
    Ok(())
}

fn cmd_recipe(action: RecipeAction, log: &dyn PipelineLog) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = RecipeRegistry::new();

    match action {
        RecipeAction::List => {
            let recipes = registry.list();
            if recipes.is_empty() {
                eprintln!("📋 No recipes stored yet.");
                eprintln!("   Use 'loadprep recipe import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored recipes ({}):\n", recipes.len());
            for r in recipes {
                println!("  📄 {} ({})", r.name, r.id);
                println!("     Sources: {}", r.recipe.sources.keys().cloned().collect::<Vec<_>>().join(", "));
                println!("     Steps: {}", r.recipe.steps.len());
                println!("     Success rate: {:.0}%", r.success_rate * 100.0);
                println!("     Uses: {}", r.use_count);
                if let Some(ref last) = r.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        RecipeAction::Import { file, name } => {
            eprintln!("📥 Importing recipe from: {}", file.display());
            let id = registry.import(&file, name.as_deref())?;
            eprintln!("✅ Recipe saved with ID: {}", id);
        }

        RecipeAction::Show { id } => {
            let r = registry.get(&id)?;
            println!("📄 Recipe: {} ({})\n", r.name, r.id);
            println!("Created: {}", r.created_at);
            println!("Success rate: {:.0}%", r.success_rate * 100.0);
            println!("Uses: {}", r.use_count);
            println!("\nSteps:");
            for (i, step) in r.recipe.steps.iter().enumerate() {
                println!("  {}. {}", i + 1, step.describe());
            }
            println!("\nRecipe:");
            println!("{}", r.recipe.to_json()?);
        }

        RecipeAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Recipe deleted: {}", id);
        }

        RecipeAction::Use { id, base_dir, output_dir } => {
            let stored = registry.get(&id)?.clone();
            eprintln!("📄 Using recipe: {} ({})", stored.name, stored.id);

            let mut options = RunOptions::from_env();
            if let Some(dir) = output_dir {
                options.output_dir = dir;
            }
            let mut sink = CsvDirectorySink::new(&options.output_dir).with_header(options.with_header);
            let result = run_recipe(&stored.recipe, &base_dir, &options, &mut sink, log);

            // Update stats
            let success = matches!(&result, Ok(report) if report.steps.iter().all(|s| s.error.is_none()));
            registry.update_stats(&id, success)?;

            print_report(&result?, None)?;
        }
    }

    Ok(())
}
