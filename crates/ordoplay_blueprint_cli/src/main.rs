// SPDX-License-Identifier: MIT OR Apache-2.0
//! `blueprint` - check and run `OrdoPlay` blueprint graph assets.
//!
//! ```text
//! blueprint check level.ron --library graphs/
//! blueprint run level.ron --library graphs/ --ticks 60 --dt 0.016 --fire Go
//! blueprint run level.ron --library graphs/ --runner worker=graphs/worker.ron
//! ```

use clap::{Parser, Subcommand};
use ordoplay_blueprint::{
    create_blueprint_registry, Blueprint, BlueprintSettings, Compilation, Compiler, Diagnostics, Graph,
    GraphLibrary, TypeRegistry,
};
use std::cell::RefCell;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "blueprint", version)]
#[command(about = "Compile and run OrdoPlay blueprint graphs")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a graph and print its diagnostics
    Check {
        /// Graph asset (.ron or .json)
        asset: PathBuf,

        /// Directory of graph assets that subgraph nodes refer to
        #[arg(short, long, value_name = "DIR")]
        library: Option<PathBuf>,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile a graph, start it and tick it
    Run {
        /// Graph asset (.ron or .json)
        asset: PathBuf,

        /// Directory of graph assets that subgraph nodes refer to
        #[arg(short, long, value_name = "DIR")]
        library: Option<PathBuf>,

        /// Settings file (RON)
        #[arg(short, long, value_name = "FILE")]
        settings: Option<PathBuf>,

        /// Host ticks to run after start
        #[arg(short, long, default_value_t = 1)]
        ticks: u32,

        /// Seconds per tick
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f32,

        /// Boundary entry to fire after start; repeatable
        #[arg(short, long = "fire", value_name = "NAME")]
        fire: Vec<String>,

        /// Run a graph asset as the external runner for compound nodes
        /// configured with this runner id; repeatable
        #[arg(short, long = "runner", value_name = "ID=ASSET", value_parser = parse_runner)]
        runners: Vec<(String, PathBuf)>,
    },
}

fn parse_runner(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((id, asset)) if !id.is_empty() && !asset.is_empty() => Ok((id.to_string(), PathBuf::from(asset))),
        _ => Err(format!("expected ID=ASSET, got {arg:?}")),
    }
}

fn load_library(path: Option<&Path>) -> Result<GraphLibrary, Box<dyn Error>> {
    match path {
        Some(path) => Ok(GraphLibrary::load_dir(path)?),
        None => Ok(GraphLibrary::new()),
    }
}

fn compile(
    asset: &Path,
    library: Option<&Path>,
    settings: &BlueprintSettings,
) -> Result<Compilation, Box<dyn Error>> {
    let graph = Graph::load(asset)?;
    let library = load_library(library)?;
    let registry = create_blueprint_registry();
    let types = TypeRegistry::new();

    let compilation = Compiler::new(&registry, &types)
        .with_library(&library)
        .with_options(settings.compile.clone())
        .compile(&graph);
    Ok(compilation)
}

fn print_diagnostics(diagnostics: &Diagnostics, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        let items: Vec<serde_json::Value> = diagnostics
            .iter()
            .map(|d| {
                serde_json::json!({
                    "severity": d.severity.to_string(),
                    "graph": d.graph,
                    "node": d.node.map(|id| id.to_string()),
                    "message": d.issue.to_string(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for diagnostic in diagnostics.iter() {
            println!("{diagnostic}");
        }
    }
    Ok(())
}

fn check(asset: &Path, library: Option<&Path>, json: bool) -> Result<ExitCode, Box<dyn Error>> {
    let compilation = compile(asset, library, &BlueprintSettings::default())?;
    print_diagnostics(&compilation.diagnostics, json)?;

    if compilation.diagnostics.has_errors() {
        return Ok(ExitCode::FAILURE);
    }
    if !json {
        println!(
            "{}: {} nodes, {} links",
            compilation.graph.name(),
            compilation.graph.len(),
            compilation.graph.link_count()
        );
    }
    Ok(ExitCode::SUCCESS)
}

struct RunOptions<'a> {
    settings: Option<&'a Path>,
    ticks: u32,
    dt: f32,
    fire: &'a [String],
    runners: &'a [(String, PathBuf)],
}

fn start_runner(
    id: &str,
    asset: &Path,
    library: Option<&Path>,
    settings: &BlueprintSettings,
) -> Result<Rc<RefCell<Blueprint>>, Box<dyn Error>> {
    let compilation = compile(asset, library, settings)?;
    print_diagnostics(&compilation.diagnostics, false)?;

    let mut runner = Blueprint::new(compilation.graph).with_config(settings.runtime.clone());
    runner.initialize()?;
    runner.start()?;
    tracing::info!("Runner {:?} started from {}", id, asset.display());
    Ok(Rc::new(RefCell::new(runner)))
}

fn run(asset: &Path, library: Option<&Path>, options: RunOptions<'_>) -> Result<ExitCode, Box<dyn Error>> {
    let settings = match options.settings {
        Some(path) => BlueprintSettings::load(path)?,
        None => BlueprintSettings::default(),
    };

    let compilation = compile(asset, library, &settings)?;
    print_diagnostics(&compilation.diagnostics, false)?;

    let mut runners = Vec::new();
    for (id, runner_asset) in options.runners {
        runners.push((id.as_str(), start_runner(id, runner_asset, library, &settings)?));
    }

    let mut blueprint = Blueprint::new(compilation.graph).with_config(settings.runtime.clone());
    blueprint.initialize()?;
    for (id, runner) in &runners {
        blueprint.attach_runner(*id, runner.clone());
    }
    blueprint.start()?;

    for name in options.fire {
        blueprint.fire_boundary(name)?;
    }
    for _ in 0..options.ticks {
        for (id, runner) in &runners {
            if let Err(e) = runner.borrow_mut().tick(options.dt) {
                tracing::error!("Runner {id:?} tick failed: {e}");
            }
        }
        if let Err(e) = blueprint.tick(options.dt) {
            tracing::error!("Tick failed: {e}");
        }
    }

    for exit in blueprint.take_boundary_exits() {
        println!("exit: {exit}");
    }
    blueprint.deinitialize();
    for (_, runner) in &runners {
        runner.borrow_mut().deinitialize();
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ordoplay_blueprint=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let result = match &args.command {
        Command::Check { asset, library, json } => check(asset, library.as_deref(), *json),
        Command::Run {
            asset,
            library,
            settings,
            ticks,
            dt,
            fire,
            runners,
        } => run(
            asset,
            library.as_deref(),
            RunOptions {
                settings: settings.as_deref(),
                ticks: *ticks,
                dt: *dt,
                fire,
                runners,
            },
        ),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_runner() {
        assert_eq!(
            parse_runner("worker=graphs/worker.ron").unwrap(),
            ("worker".to_string(), PathBuf::from("graphs/worker.ron"))
        );
        assert!(parse_runner("worker").is_err());
        assert!(parse_runner("=graphs/worker.ron").is_err());
        assert!(parse_runner("worker=").is_err());
    }

    #[test]
    fn test_run_accepts_repeated_runners() {
        let args = Args::try_parse_from([
            "blueprint", "run", "level.ron", "--runner", "a=a.ron", "-r", "b=b.ron",
        ])
        .unwrap();
        let Command::Run { runners, .. } = args.command else {
            panic!("expected run");
        };
        let ids: Vec<&str> = runners.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
