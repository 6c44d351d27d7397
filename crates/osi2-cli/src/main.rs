//! Command-line front end for the Osi2 control registry.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use osi2_core::config::env_vars;
use osi2_core::plugin::{self, NativePluginManager};
use osi2_core::{ControlApi, Osi2Config, StatusCode};

/// Osi2 control registry - load solver shims and probe their APIs.
#[derive(Parser, Debug)]
#[command(name = "osi2")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Print the conventional library file name for a short name.
    LibName {
        /// Short name, e.g. `clp`.
        short_name: String,
    },
    /// Load a library, create and destroy one object per API, then unload it.
    Probe {
        /// Short name to register the library under.
        short_name: String,
        /// Library file name (default: derived from the short name).
        #[arg(long)]
        lib: Option<String>,
        /// Directory holding the library (default: the configured plugin directory).
        #[arg(long)]
        dir: Option<String>,
        /// API to instantiate; may be repeated.
        #[arg(long = "api")]
        apis: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Osi2Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Osi2Config::default(),
    }
    .with_env();

    init_logging(args.verbose, config.log_json);

    match args.command {
        Command::LibName { short_name } => {
            println!("{}", ControlApi::library_file_name(&short_name));
            Ok(())
        }
        Command::Probe {
            short_name,
            lib,
            dir,
            apis,
        } => run_probe(&config, args.verbose, &short_name, lib, dir, &apis),
    }
}

fn init_logging(verbose: bool, json_logging: bool) {
    let default_filter = if verbose { "osi2=debug" } else { "osi2=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!(
        "Logging initialised (set {}=true for JSON output)",
        env_vars::LOG_JSON
    );
}

fn run_probe(
    config: &Osi2Config,
    verbose: bool,
    short_name: &str,
    lib: Option<String>,
    dir: Option<String>,
    apis: &[String],
) -> Result<()> {
    let manager = NativePluginManager::from_config(config);
    let mut control = ControlApi::from_config(config).with_plugin_manager(plugin::shared(manager));
    if verbose {
        control.set_log_level(u8::MAX);
    }

    let load = match (lib, dir) {
        (Some(lib), Some(dir)) => control.load_from(short_name, &lib, Some(&dir)),
        (Some(lib), None) => control.load_lib(short_name, &lib),
        (None, Some(dir)) => {
            let lib = ControlApi::library_file_name(short_name);
            control.load_from(short_name, &lib, Some(&dir))
        }
        (None, None) => control.load(short_name),
    };
    println!("{:<8} {:<24} {:>3}", "load", short_name, load.code());
    if let Err(e) = load {
        bail!("Failed to load \"{}\": {}", short_name, e);
    }

    if let Some(record) = control.library(short_name) {
        println!("         path: {}", record.full_path());
        println!("         id:   {}", record.unique_id());
    }

    let mut failures = 0;
    for api in apis {
        let created = control.create_object(api, Some(short_name));
        println!("{:<8} {:<24} {:>3}", "create", api, created.code());

        match created {
            Ok((object, _)) => {
                let mut slot = Some(object);
                let destroyed = control.destroy_object(&mut slot);
                println!("{:<8} {:<24} {:>3}", "destroy", api, destroyed.code());
                if let Err(e) = destroyed {
                    eprintln!("  {}", e);
                    failures += 1;
                }
            }
            Err(e) => {
                eprintln!("  {}", e);
                failures += 1;
            }
        }
    }

    let unload = control.unload(short_name);
    println!("{:<8} {:<24} {:>3}", "unload", short_name, unload.code());
    if let Err(e) = unload {
        eprintln!("  {}", e);
        failures += 1;
    }

    if failures > 0 {
        bail!("Probe of \"{}\" had {} failure(s)", short_name, failures);
    }
    Ok(())
}
