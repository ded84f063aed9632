//! # tracescope - Main Entry Point
//!
//! Supports two operational modes:
//! - **Live TUI** (`tracescope <SERVER_URL>`): interactive dashboard
//! - **Headless** (`--headless`): stdout logging, for scripts and CI
//!
//! Trace dispatch and stats polling run as tokio tasks; the dashboard runs on
//! its own thread and consumes their updates over a bounded channel.

use anyhow::{anyhow, Result};
use clap::Parser;
use log::info;
use std::time::{Duration, Instant};

use tracescope::app::{AppContext, Config, HeadlessPrinter};
use tracescope::cli::Args;
use tracescope::tui;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("invalid server url") || msg.contains("must be greater than") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args)?;

    let quiet = config.quiet;
    let headless = config.headless;
    let duration_limit = config.duration;

    if !quiet {
        println!("tracescope v{}", env!("CARGO_PKG_VERSION"));
        println!("server: {}", config.server_url);
    }

    // ── Tasks: trace transport + stats polling ──────────────────────────
    let (ctx, update_rx) = AppContext::new(config);
    if ctx.config.sample_messages {
        ctx.send_sample_messages();
    }
    let trace_task = ctx.spawn_trace_task();
    let poll_task = ctx.spawn_poll_task()?;

    // ── Dashboard thread: TUI or stdout ─────────────────────────────────
    let server = ctx.config.server_url.to_string();
    let dashboard = if headless {
        std::thread::spawn(move || -> Result<()> {
            HeadlessPrinter::new().run(&update_rx);
            Ok(())
        })
    } else {
        std::thread::spawn(move || tui::run_live(update_rx, &server))
    };

    // Setup Ctrl+C handler (the TUI handles its own, raw mode eats SIGINT)
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let started = Instant::now();
    let exit_reason = loop {
        if duration_limit.is_some_and(|limit| started.elapsed() >= limit) {
            break "duration limit reached";
        }
        if dashboard.is_finished() {
            break "dashboard closed";
        }

        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(100)) => {}
            _ = &mut ctrl_c => break "interrupted",
        }
    };
    info!("Shutting down: {exit_reason}");

    // Tasks hold update senders; the dashboard drains and exits once all are dropped
    trace_task.abort();
    poll_task.abort();
    let _ = trace_task.await;
    let _ = poll_task.await;
    drop(ctx);

    let result = dashboard.join().map_err(|_| anyhow!("dashboard thread panicked"))?;

    if !quiet || headless {
        eprintln!("\n{exit_reason}: {:.1}s", started.elapsed().as_secs_f64());
    }

    result
}
