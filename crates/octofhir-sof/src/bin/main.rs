//! SQL-on-FHIR command-line interface

use anyhow::Result;
use clap::{Parser, Subcommand};
use octofhir_sof::cli::output::OutputFormat;
use octofhir_sof::cli::{ConnectionOptions, compile, execute, refresh, validate};
use std::path::PathBuf;

/// SQL-on-FHIR view tools
#[derive(Parser)]
#[command(name = "sof")]
#[command(author, version, about = "SQL-on-FHIR ViewDefinition tools", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (table, json)
    #[arg(short = 'f', long, global = true, default_value = "table")]
    format: String,

    /// Database host
    #[arg(long, global = true, default_value = "localhost")]
    host: String,

    /// Database port
    #[arg(long, global = true, default_value_t = 5432)]
    port: u16,

    /// Database name
    #[arg(long, global = true, default_value = "fhir")]
    dbname: String,

    /// Database user
    #[arg(long, global = true, default_value = "fhir")]
    user: String,

    /// Database password
    #[arg(long, global = true, default_value = "")]
    password: String,

    /// Database schema holding the resource tables and materialized views
    #[arg(long, global = true, default_value = "fhir")]
    schema: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a ViewDefinition file to SQL
    Compile {
        /// ViewDefinition JSON file
        file: PathBuf,

        /// Search constraints (name=value)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Row limit
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Execute a view query
    Execute {
        /// View name
        view: String,

        /// Directory of ViewDefinition files
        #[arg(short = 'd', long = "views", default_value = "views")]
        views_dir: PathBuf,

        /// Search constraints (name=value)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Row limit
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Count rows matching a view query
    Count {
        /// View name
        view: String,

        /// Directory of ViewDefinition files
        #[arg(short = 'd', long = "views", default_value = "views")]
        views_dir: PathBuf,

        /// Search constraints (name=value)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Print a view's column schema
    Schema {
        /// View name
        view: String,

        /// Directory of ViewDefinition files
        #[arg(short = 'd', long = "views", default_value = "views")]
        views_dir: PathBuf,
    },

    /// Refresh materialized views
    Refresh {
        /// View name (all registered views when omitted)
        view: Option<String>,

        /// Directory of ViewDefinition files
        #[arg(short = 'd', long = "views", default_value = "views")]
        views_dir: PathBuf,
    },

    /// Validate materialized-view integrity
    Validate {
        /// Directory of ViewDefinition files
        #[arg(short = 'd', long = "views", default_value = "views")]
        views_dir: PathBuf,

        /// Fail the process on any violation
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();
    env_logger::init();

    let cli = Cli::parse();
    let format: OutputFormat = cli.format.parse()?;
    let connection = ConnectionOptions {
        host: cli.host,
        port: cli.port,
        dbname: cli.dbname,
        user: cli.user,
        password: cli.password,
        schema: cli.schema,
    };

    match cli.command {
        Commands::Compile {
            file,
            params,
            limit,
        } => compile::compile(compile::CompileConfig {
            file,
            params,
            limit,
            schema: connection.schema.clone(),
            verbose: cli.verbose,
        }),
        Commands::Execute {
            view,
            views_dir,
            params,
            limit,
        } => {
            execute::execute(execute::ExecuteConfig {
                view,
                views_dir,
                params,
                limit,
                connection,
                format,
                verbose: cli.verbose,
            })
            .await
        }
        Commands::Count {
            view,
            views_dir,
            params,
        } => {
            execute::count(execute::ExecuteConfig {
                view,
                views_dir,
                params,
                limit: 0,
                connection,
                format,
                verbose: cli.verbose,
            })
            .await
        }
        Commands::Schema { view, views_dir } => {
            execute::schema(execute::ExecuteConfig {
                view,
                views_dir,
                params: Vec::new(),
                limit: 0,
                connection,
                format,
                verbose: cli.verbose,
            })
            .await
        }
        Commands::Refresh { view, views_dir } => {
            refresh::refresh(refresh::RefreshConfig {
                view,
                views_dir,
                connection,
            })
            .await
        }
        Commands::Validate { views_dir, strict } => {
            validate::validate(validate::ValidateConfig {
                views_dir,
                connection,
                format,
                strict,
            })
            .await
        }
    }
}
