use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use warden::{source, Validator, ValidatorConfig, WardenError};

/// warden CLI: check YAML/JSON documents against a schema
#[derive(Parser)]
#[command(name = "warden", version, about)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a document and print the normalized result or the errors
    Check {
        /// Schema file (.yaml, .yml or .json)
        schema: PathBuf,
        /// Document file (.yaml, .yml or .json)
        document: PathBuf,
        /// Accept fields the schema does not declare
        #[arg(long)]
        allow_unknown: bool,
        /// Drop fields the schema does not declare
        #[arg(long)]
        purge_unknown: bool,
        /// Treat every declared field as required
        #[arg(long)]
        require_all: bool,
        /// Validator configuration file; flags above override it
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the schema that rule-sets are checked against
    Meta,
}

/// Exit status for a document that does not conform.
const EXIT_INVALID: i32 = 1;
/// Exit status for unusable input: a bad schema, config or file.
const EXIT_ERROR: i32 = 2;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(EXIT_INVALID),
        Err(e) => {
            eprintln!("ERROR:{e}");
            process::exit(EXIT_ERROR);
        }
    }
}

/// Returns whether the document conformed.
fn run(cli: Cli) -> Result<bool, WardenError> {
    match cli.command {
        Command::Check {
            schema,
            document,
            allow_unknown,
            purge_unknown,
            require_all,
            config,
        } => {
            let config = match config {
                Some(path) => ValidatorConfig::from_file(&path)?,
                None => ValidatorConfig::default(),
            };
            let schema = source::load_file(&schema)?;
            let document = source::load_file(&document)?;

            let mut validator = Validator::from_config(schema, config);
            if allow_unknown {
                validator.set_allow_unknown(true);
            }
            if purge_unknown {
                validator.set_purge_unknown(true);
            }
            if require_all {
                validator.set_require_all(true);
            }

            if validator.validate(&document)? {
                print_output(&source::yaml_to_json(validator.document()), &cli.format)?;
                Ok(true)
            } else {
                log::info!("{} error(s) found", validator.errors().len());
                let errors = serde_json::to_value(validator.errors())?;
                print_output(&serde_json::json!({ "errors": errors }), &cli.format)?;
                Ok(false)
            }
        }
        Command::Meta => {
            let validator = Validator::new();
            let meta = serde_yaml::Value::Mapping(validator.schema_of_schemas().clone());
            print_output(&source::yaml_to_json(&meta), &cli.format)?;
            Ok(true)
        }
    }
}

fn print_output(value: &serde_json::Value, format: &OutputFormat) -> Result<(), WardenError> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(value)?);
        }
    }
    Ok(())
}
