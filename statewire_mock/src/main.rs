use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use statewire_mock::MockController;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(about = "Mock primary controller for statewire consoles")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:5000")]
    listen: String,

    /// State description the mock implements
    #[arg(long)]
    description: PathBuf,

    /// Report this BuildId (hex) instead of the description's
    #[arg(long, value_parser = parse_hex)]
    build_id: Option<u32>,

    /// State to start in
    #[arg(long)]
    initial_state: Option<String>,
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let text = std::fs::read_to_string(&args.description)
        .with_context(|| format!("reading {}", args.description.display()))?;
    let model = statewire::parse_description(&text)?;
    let mock = MockController::from_model(&model, args.build_id)?;
    if let Some(name) = &args.initial_state {
        mock.set_state(name)?;
    }
    tracing::info!("build id {:#010x}", mock.build_id());

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    let server = mock.clone();
    tokio::spawn(async move {
        if let Err(e) = server.run_listener_on(listener).await {
            tracing::error!("listener failed: {e}");
        }
    });

    // stdin: `push NAME VALUE` or `state NAME`
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        let result = match words.as_slice() {
            ["push", name, value] => mock
                .push_text(name, value)
                .map(|n| println!("sent to {n} console(s)")),
            ["state", name] => mock.set_state(name),
            [] => Ok(()),
            _ => {
                println!("usage: push NAME VALUE | state NAME");
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("{e}");
        }
    }
    Ok(())
}
