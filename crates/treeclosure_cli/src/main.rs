//! Command-line surface over the closure-table core.
//!
//! # Responsibility
//! - Resolve configuration and open the configured store once per run.
//! - Map subcommands onto `TreeService` operations and print JSON results.
//! - Translate error kinds into stable exit codes.

mod args;

use args::{Cli, Commands};
use clap::Parser;
use log::debug;
use serde_json::Value;
use std::process::ExitCode;
use treeclosure_core::db::open_store;
use treeclosure_core::{
    init_from_config, ClosureError, CoreConfig, ErrorKind, SqliteTreeStore, StoreBackend,
    TreeService,
};

const EXIT_UNEXPECTED: u8 = 1;
const EXIT_NOT_FOUND: u8 = 3;
const EXIT_INVALID_OPERATION: u8 = 4;
const EXIT_CONFLICT: u8 = 5;
const EXIT_SETUP: u8 = 6;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(message) => return fail(EXIT_SETUP, &message),
    };
    if let Err(message) = init_from_config(&config.logging) {
        return fail(EXIT_SETUP, &message);
    }

    let location = match config.store.location() {
        Ok(location) => location,
        Err(err) => return fail(EXIT_SETUP, &err.to_string()),
    };
    let conn = match open_store(&location) {
        Ok(conn) => conn,
        Err(err) => return fail(EXIT_SETUP, &err.to_string()),
    };
    let store = match SqliteTreeStore::try_new(&conn) {
        Ok(store) => store,
        Err(err) => return fail(EXIT_SETUP, &err.to_string()),
    };
    let service = TreeService::new(store);

    match execute(&service, &cli.command) {
        Ok(value) => {
            println!("{value:#}");
            ExitCode::SUCCESS
        }
        Err(CommandError::Closure(err)) => {
            let (code, message) = describe_failure(&err);
            fail(code, &message)
        }
        Err(CommandError::Encode(err)) => fail(EXIT_UNEXPECTED, &err.to_string()),
    }
}

fn resolve_config(cli: &Cli) -> Result<CoreConfig, String> {
    let mut config = match &cli.config {
        Some(path) => CoreConfig::load(path).map_err(|err| err.to_string())?,
        None => CoreConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.store.backend = StoreBackend::Sqlite;
        config.store.path = Some(db.clone());
    }
    if let Some(dir) = &cli.log_dir {
        config.logging.dir = Some(dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = Some(level.clone());
    }
    Ok(config)
}

enum CommandError {
    Closure(ClosureError),
    Encode(serde_json::Error),
}

impl From<ClosureError> for CommandError {
    fn from(value: ClosureError) -> Self {
        Self::Closure(value)
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

fn execute(
    service: &TreeService<SqliteTreeStore<'_>>,
    command: &Commands,
) -> Result<Value, CommandError> {
    let value = match command {
        Commands::Tree { name } => serde_json::to_value(service.get_or_create_tree(name)?)?,
        Commands::Show { tree_id } => serde_json::to_value(service.get_tree(*tree_id)?)?,
        Commands::Create { name, parent, tree } => {
            serde_json::to_value(service.create_node(*tree, name, *parent)?)?
        }
        Commands::Delete { node_id } => serde_json::to_value(service.delete_node(*node_id)?)?,
        Commands::Rename { node_id, name } => {
            serde_json::to_value(service.rename_node(*node_id, name)?)?
        }
        Commands::Ancestors { node_id } => {
            serde_json::to_value(service.list_ancestors(*node_id)?)?
        }
    };
    Ok(value)
}

/// Service failures are already logged with their ids by the coordinator.
fn describe_failure(err: &ClosureError) -> (u8, String) {
    let kind = err.kind();
    debug!(
        "event=cli_command module=cli status=failed kind={}",
        kind.as_str()
    );
    (exit_code_for(kind), err.to_string())
}

fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::NotFound => EXIT_NOT_FOUND,
        ErrorKind::InvalidOperation => EXIT_INVALID_OPERATION,
        ErrorKind::Conflict => EXIT_CONFLICT,
        ErrorKind::Unexpected => EXIT_UNEXPECTED,
    }
}

fn fail(code: u8, message: &str) -> ExitCode {
    eprintln!("error: {message}");
    ExitCode::from(code)
}
