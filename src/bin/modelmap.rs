//! modelmap CLI - run entity conversions declared in a YAML schema
//!
//! Reads a JSON document or a URL query string, applies one of the four
//! conversions to the named entity and prints the result as JSON.

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use modelmap::runtime::{parse_query, Schema, SchemaConfig};
use modelmap::{
    FieldValue, MergeOptions, Model, ParseOptions, ReverseOptions, Storage, TracingLogger,
    TransformRegistry,
};

#[derive(Parser)]
#[command(name = "modelmap")]
#[command(version, about = "Declarative entity mapping from a YAML schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Path to the schema file
    #[arg(short, long, default_value = "schema.yaml")]
    schema: PathBuf,

    /// Entity to convert into
    #[arg(short, long)]
    entity: String,

    /// JSON input file, `-` for stdin
    #[arg(short, long, conflicts_with = "query")]
    input: Option<PathBuf>,

    /// URL query string input instead of JSON
    #[arg(short, long)]
    query: Option<String>,

    /// Log violations and keep going instead of failing
    #[arg(long)]
    lenient: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a schema and list its entities
    Check {
        #[arg(short, long, default_value = "schema.yaml")]
        schema: PathBuf,
    },

    /// Parse the input with type checks and validators
    Parse {
        #[command(flatten)]
        target: Target,

        /// Skip validators
        #[arg(long)]
        no_validate: bool,

        /// Accept missing values on every attribute
        #[arg(long)]
        nullable: bool,

        /// Do not copy unregistered keys
        #[arg(long)]
        ignore: bool,
    },

    /// Copy trusted input without checks
    Merge {
        #[command(flatten)]
        target: Target,

        /// Do not copy unregistered keys
        #[arg(long)]
        ignore: bool,
    },

    /// Restore typed fields from loosely typed input
    Recover {
        #[command(flatten)]
        target: Target,
    },

    /// Merge the input, then print the output record
    Reverse {
        #[command(flatten)]
        target: Target,

        /// Keep empty, null and missing values
        #[arg(long)]
        keep_empty: bool,

        /// Attributes to leave out
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },
}

fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { schema } => check_schema(schema),
        Commands::Parse {
            target,
            no_validate,
            nullable,
            ignore,
        } => {
            let options = ParseOptions::new()
                .validate(!no_validate)
                .nullable(nullable)
                .ignore(ignore);
            convert(&target, |model, source| {
                model.parse_with(source, &options).map(|_| ())
            })
            .and_then(|model| print_json(&model.to_json()))
        }
        Commands::Merge { target, ignore } => {
            let options = MergeOptions {
                ignore: Some(ignore),
            };
            convert(&target, |model, source| {
                model.merge_with(source, &options);
                Ok(())
            })
            .and_then(|model| print_json(&model.to_json()))
        }
        Commands::Recover { target } => {
            convert(&target, |model, source| model.recover(source).map(|_| ()))
                .and_then(|model| print_json(&model.to_json()))
        }
        Commands::Reverse {
            target,
            keep_empty,
            exclude,
        } => convert(&target, |model, source| {
            model.merge(source);
            Ok(())
        })
        .and_then(|model| {
            let mut options = ReverseOptions::new();
            if keep_empty {
                options = options.lightly(false);
            }
            options.exclusion = exclude;
            print_json(&modelmap::record_to_json(&model.reverse_with(&options)))
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Load a schema and print a summary of every entity
fn check_schema(path: PathBuf) -> Result<(), String> {
    let config = SchemaConfig::load_from_file(&path).map_err(|e| e.to_string())?;
    let schema = config
        .build(&TransformRegistry::with_builtins())
        .map_err(|e| e.to_string())?;

    println!("✓ Loaded {} entities from {}", schema.entity_names().len(), path.display());
    for name in schema.entity_names() {
        let key = schema.key(name).map_err(|e| e.to_string())?;
        let attrs = schema.storage().attrs(key);
        let names: Vec<&str> = attrs.iter().map(|attr| attr.name()).collect();
        println!("  {} ({} attributes): {}", name, attrs.len(), names.join(", "));
    }
    Ok(())
}

fn load_schema(target: &Target) -> Result<Schema, String> {
    let config = SchemaConfig::load_from_file(&target.schema).map_err(|e| e.to_string())?;

    let mut storage = Storage::new();
    if target.lenient {
        storage.set_logger(TracingLogger);
    }
    let keys = config
        .declare_into(&mut storage, &TransformRegistry::with_builtins())
        .map_err(|e| e.to_string())?;
    Ok(Schema::new(storage.into_shared(), keys))
}

fn read_source(target: &Target) -> Result<FieldValue, String> {
    if let Some(query) = &target.query {
        return Ok(FieldValue::Record(parse_query(query)));
    }

    let text = match &target.input {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .map_err(|e| format!("Failed to read input {}: {}", path.display(), e))?,
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            buffer
        }
    };

    let json: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| format!("Failed to parse JSON input: {}", e))?;
    Ok(FieldValue::from(json))
}

/// Build an empty instance of the target entity and apply `apply` to it
fn convert<F>(target: &Target, apply: F) -> Result<Model, String>
where
    F: FnOnce(&mut Model, &FieldValue) -> Result<(), modelmap::ModelError>,
{
    let schema = load_schema(target)?;
    let source = read_source(target)?;
    let mut model = schema.empty(&target.entity).map_err(|e| e.to_string())?;
    apply(&mut model, &source).map_err(|e| e.to_string())?;
    tracing::info!(entity = %target.entity, fields = model.fields().len(), "converted");
    Ok(model)
}

fn print_json(value: &serde_json::Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to render JSON: {}", e))?;
    println!("{}", text);
    Ok(())
}
