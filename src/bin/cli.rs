use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_json::Value;

use dialogue_script::dsl::compiler::{CompiledUnit, Compiler};
use dialogue_script::error::AppError;
use dialogue_script::logging;
use dialogue_script::settings::{self, CompilerSettings};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "dialoguec", about = "Dialogue script compiler", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// Log pipeline details to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a script to bytecode
    Compile {
        input: PathBuf,
        /// Output file (defaults to the input with the configured extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Key prefix for translated strings (defaults to the input file stem)
        #[arg(long)]
        i18n_prefix: Option<String>,
        /// Do not write the translation sidecar
        #[arg(long)]
        no_translations: bool,
    },
    /// Print the resolved IL of every dialogue as JSON
    Il { input: PathBuf },
    /// Write a settings file with default values
    InitConfig { path: PathBuf },
}

// ── Commands ─────────────────────────────────────────────────────

fn run(cli: &Cli) -> Result<Value, AppError> {
    let settings = match &cli.config {
        Some(path) => settings::load_settings(path)?,
        None => CompilerSettings::default(),
    };

    match &cli.command {
        Commands::Compile {
            input,
            output,
            i18n_prefix,
            no_translations,
        } => {
            let output = output.clone().unwrap_or_else(|| settings.output_for(input));
            let prefix = i18n_prefix
                .clone()
                .unwrap_or_else(|| settings.prefix_for(input));

            let mut compiler = if settings.emit_translations && !no_translations {
                Compiler::new().with_sidecar_dir(parent_dir(&output))
            } else {
                Compiler::new().without_sidecar()
            };

            let source = fs::read(input)?;
            let unit = compiler.compile(&source, &prefix)?;
            fs::write(&output, unit.to_bytes())?;
            log::info!(
                "compiled {} -> {} ({} bytes)",
                input.display(),
                output.display(),
                unit.size()
            );

            Ok(serde_json::json!({
                "output": output,
                "size": unit.size(),
                "dialogues": unit.dialogues().count(),
                "i18n": unit.i18n_enabled,
                "translations": unit.translations.as_ref().map_or(0, |t| t.rows.len()),
            }))
        }
        Commands::Il { input } => {
            let source = fs::read(input)?;
            let prefix = settings.prefix_for(input);
            let mut compiler = Compiler::new().without_sidecar();
            let unit = compiler.compile(&source, &prefix)?;
            Ok(describe_il(&compiler, &unit))
        }
        Commands::InitConfig { path } => {
            settings::save_settings(path, &CompilerSettings::default())?;
            log::info!("wrote default settings to {}", path.display());
            Ok(serde_json::json!({ "path": path }))
        }
    }
}

fn describe_il(compiler: &Compiler, unit: &CompiledUnit) -> Value {
    let symbols = &compiler.context().symbols;
    let dialogues: Vec<Value> = unit
        .dialogues()
        .map(|d| {
            serde_json::json!({
                "name": symbols.get_str(d.name),
                "mode": d.mode,
                "size": d.size,
                "commands": d.commands,
            })
        })
        .collect();
    Value::Array(dialogues)
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn print_output(output: &Value, raw_json: bool, command: &Commands) {
    if raw_json || matches!(command, Commands::Il { .. }) {
        println!("{}", serde_json::to_string_pretty(output).unwrap_or_default());
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(&cli) {
        Ok(output) => print_output(&output, cli.json, &cli.command),
        Err(e) => {
            if cli.json {
                let json = serde_json::to_string_pretty(&e).unwrap_or_default();
                println!("{json}");
            } else {
                eprintln!("Error: {e}");
            }
            process::exit(1);
        }
    }
}
