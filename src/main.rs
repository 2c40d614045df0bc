//! Stylix Sandbox CLI
//!
//! Single-shot mode:
//!   stylix-sandbox [options] <sample.tsx> [render-expression]
//!
//! Markdown mode (render every renderable code block):
//!   stylix-sandbox [options] --markdown <page.md>
//!
//! Server mode (persistent process, reads from stdin):
//!   stylix-sandbox [options] --server
//!
//! Options:
//!   --timeout-ms <n>    per-render timeout (0 = none)
//!   --debounce-ms <n>   server mode idle window per target (default 200)
//!
//! Protocol (server mode):
//!   Request (stdin, one JSON object per line):
//!     {"target":"intro","source":"<$.div>Hi</$.div>","render":""}
//!
//!   Response (stdout), once the target's edits have settled:
//!     Status:Ok
//!     Target:intro
//!     Length:13
//!
//!     <div>Hi</div>
//!
//!   Error response:
//!     Status:Error
//!     Target:intro
//!     Length:26
//!
//!     missingName is not defined

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use stylix_sandbox::{
    load_samples, ConsoleOutput, Debouncer, MountSurface, Sandbox, SandboxConfig, SurfaceContent,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_DEBOUNCE_MS: u64 = 200;

fn print_usage() {
    eprintln!("Stylix Sandbox - live code samples for the Stylix docs");
    eprintln!();
    eprintln!("Single-shot mode:");
    eprintln!("  stylix-sandbox [options] <sample.tsx> [render-expression]");
    eprintln!();
    eprintln!("Markdown mode:");
    eprintln!("  stylix-sandbox [options] --markdown <page.md>");
    eprintln!();
    eprintln!("Server mode (persistent process):");
    eprintln!("  stylix-sandbox [options] --server");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --timeout-ms <n>    per-render timeout, 0 disables (default 5000)");
    eprintln!("  --debounce-ms <n>   server idle window per target (default {DEFAULT_DEBOUNCE_MS})");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  stylix-sandbox ./hello.tsx");
    eprintln!("  stylix-sandbox ./app.tsx '<App />'");
    eprintln!("  stylix-sandbox --markdown ./docs/intro.md");
}

#[derive(Debug, Deserialize)]
struct RenderRequest {
    target: String,
    source: String,
    #[serde(default)]
    render: String,
}

fn print_console(console: &ConsoleOutput) {
    for log in &console.logs {
        eprintln!("[LOG] {}", log);
    }
    for warn in &console.warns {
        eprintln!("[WARN] {}", warn);
    }
    for err in &console.errors {
        eprintln!("[ERROR] {}", err);
    }
}

fn is_mounted(surface: &MountSurface) -> bool {
    matches!(surface.content(), SurfaceContent::Mounted(_))
}

/// Run in single-shot mode
fn run_single_shot(config: SandboxConfig, path: &str, render_expression: &str) -> Result<()> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read '{}': {}", path, e))?;

    let mut sandbox = Sandbox::new(config)?;
    let mut surface = MountSurface::new("main");
    sandbox.render(&source, render_expression, Some(&mut surface));

    print_console(&sandbox.take_console());
    println!("{}", surface.to_html());

    if !is_mounted(&surface) {
        return Err(anyhow!("Sample failed to render"));
    }
    Ok(())
}

/// Render every renderable sample of a markdown page
fn run_markdown(config: SandboxConfig, path: &str) -> Result<()> {
    let samples = load_samples(Path::new(path))?;
    let mut sandbox = Sandbox::new(config)?;
    let mut failures = 0;

    for (index, sample) in samples.iter().enumerate() {
        if !sample.fence.render {
            continue;
        }

        let mut surface = MountSurface::new(format!("sample-{}", index));
        sandbox.render(&sample.source, &sample.fence.render_value, Some(&mut surface));
        print_console(&sandbox.take_console());

        if !is_mounted(&surface) {
            failures += 1;
        }
        println!(
            "<!-- {} ({}{}) -->",
            surface.id(),
            sample.fence.lang,
            if sample.fence.editable { ", editable" } else { "" }
        );
        println!("{}", surface.to_html());
    }

    if failures > 0 {
        return Err(anyhow!("{} sample(s) failed to render", failures));
    }
    Ok(())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Run in server mode (persistent process, reads requests from stdin)
async fn run_server(config: SandboxConfig, debounce: Duration) -> Result<()> {
    // Create the isolate ONCE at startup (V8 cold start happens here)
    let mut sandbox = Sandbox::new(config)?;
    let mut surfaces: HashMap<String, MountSurface> = HashMap::new();
    let mut pending: Debouncer<String, RenderRequest> = Debouncer::new(debounce);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    tracing::info!(debounce_ms = debounce.as_millis() as u64, "server ready, reading from stdin");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // EOF - stdin closed, flush what is pending and exit
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<RenderRequest>(line) {
                    Ok(request) => pending.push(request.target.clone(), request, Instant::now()),
                    Err(e) => {
                        write_response(&mut stdout, false, "", &format!("Invalid request JSON: {}", e))?;
                    }
                }
            }
            _ = wait_until(pending.next_deadline()) => {}
        }

        for (_, request) in pending.take_due(Instant::now()) {
            serve(&mut sandbox, &mut surfaces, request, &mut stdout)?;
        }
    }

    for (_, request) in pending.drain() {
        serve(&mut sandbox, &mut surfaces, request, &mut stdout)?;
    }

    tracing::info!("server shutting down");
    Ok(())
}

fn serve(
    sandbox: &mut Sandbox,
    surfaces: &mut HashMap<String, MountSurface>,
    request: RenderRequest,
    stdout: &mut std::io::Stdout,
) -> Result<()> {
    let surface = surfaces
        .entry(request.target.clone())
        .or_insert_with(|| MountSurface::new(request.target.clone()));

    sandbox.render(&request.source, &request.render, Some(surface));
    print_console(&sandbox.take_console());

    write_response(stdout, is_mounted(surface), surface.id(), &surface.to_html())
}

/// Write response in length-prefixed protocol
fn write_response(stdout: &mut std::io::Stdout, ok: bool, target: &str, body: &str) -> Result<()> {
    let status = if ok { "Ok" } else { "Error" };

    writeln!(stdout, "Status:{}", status)?;
    writeln!(stdout, "Target:{}", target)?;
    writeln!(stdout, "Length:{}", body.len())?;
    writeln!(stdout)?; // Empty line separator
    write!(stdout, "{}", body)?;
    stdout.flush()?;

    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("STYLIX_SANDBOX_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_millis(flag: &str, value: Option<&String>) -> Result<u64> {
    let value = value.ok_or_else(|| anyhow!("{} requires a value", flag))?;
    value
        .parse()
        .map_err(|e| anyhow!("Invalid value for {}: '{}' ({})", flag, value, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = SandboxConfig::default();
    let mut debounce = Duration::from_millis(DEFAULT_DEBOUNCE_MS);
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--timeout-ms" => {
                let ms = parse_millis(arg, iter.next())?;
                config.timeout_ms = (ms > 0).then_some(ms);
            }
            "--debounce-ms" => {
                debounce = Duration::from_millis(parse_millis(arg, iter.next())?);
            }
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            _ => positional.push(arg.as_str()),
        }
    }

    match positional.as_slice() {
        ["--server"] => run_server(config, debounce).await,
        ["--markdown", path] => run_markdown(config, path),
        ["--markdown"] => {
            print_usage();
            Err(anyhow!("Markdown mode requires a file argument"))
        }
        [path] => run_single_shot(config, path, ""),
        [path, render_expression] => run_single_shot(config, path, render_expression),
        _ => {
            print_usage();
            Err(anyhow!("Missing required arguments"))
        }
    }
}
