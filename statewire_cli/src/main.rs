use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use statewire::compile::{compile, write_outputs, CompileOptions};
use statewire::console::{cli, tables_from_model};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "statewire", version, about = "Exhibit state description compiler")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compile a description into firmware, surface and console sources
    Generate {
        description: PathBuf,
        /// Output root
        #[arg(long, short, default_value = "generated")]
        out: PathBuf,
        /// Deployment name; defaults to the description's file stem
        #[arg(long)]
        name: Option<String>,
        /// Primary board only, every file under the output root
        #[arg(long)]
        flat: bool,
    },
    /// Print the BuildId of a description
    BuildId { description: PathBuf },
    /// Run the maintenance console straight from a description
    Console {
        description: PathBuf,
        /// Console arguments (port, --tcp, --hardware, --tests)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn read_model(path: &Path) -> anyhow::Result<statewire::Model> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    statewire::parse_description(&text).with_context(|| path.display().to_string())
}

fn deployment_name(description: &Path, name: Option<String>) -> String {
    name.unwrap_or_else(|| {
        description
            .file_stem()
            .map_or_else(|| "Exhibit".to_string(), |s| s.to_string_lossy().into_owned())
    })
}

fn generate(description: &Path, out: &Path, name: Option<String>, flat: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(description)
        .with_context(|| format!("reading {}", description.display()))?;
    let options = CompileOptions {
        deployment: deployment_name(description, name),
        flat,
    };
    let compilation =
        compile(&text, &options).with_context(|| description.display().to_string())?;
    let written = write_outputs(&compilation, out)?;
    tracing::info!(
        files = written.len(),
        "generation finished, build id {:#010x}",
        compilation.build_id
    );
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Cmd::Generate {
            description,
            out,
            name,
            flat,
        } => generate(&description, &out, name, flat),
        Cmd::BuildId { description } => {
            let model = read_model(&description)?;
            println!("{:#010x}", statewire::build_id(&model));
            Ok(())
        }
        Cmd::Console { description, args } => {
            let model = read_model(&description)?;
            let tables = tables_from_model(&model)?;
            let argv = std::iter::once("statewire console".to_string()).chain(args);
            let code = cli::run_with_args(argv, tables, statewire::build_id(&model), Vec::new());
            std::process::exit(code);
        }
    }
}
