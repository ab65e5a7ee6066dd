//! `memloop chat`: Interactive or single-message chat mode.

use std::io::Write;
use std::time::Instant;
use memloop_agent::{AgentSession, QueryOutcome};
use memloop_config::AppConfig;
use memloop_core::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    ANTHROPIC_API_KEY=sk-ant-...");
        eprintln!("    MEMLOOP_API_KEY=sk-ant-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let mut session = AgentSession::connect(&config)?;

    let result = match message {
        Some(msg) => single(&mut session, &msg).await,
        None => interactive(&mut session, &config).await,
    };

    session.close().await;
    result
}

async fn single(session: &mut AgentSession, msg: &str) -> Result<(), Box<dyn std::error::Error>> {
    eprint!("  Thinking...");
    let outcome = ask(session, msg).await;
    eprint!("\r              \r");
    let (outcome, _) = outcome?;
    println!("{}", outcome.answer);
    Ok(())
}

/// Run one query; Ctrl+C while it runs cancels it at the next step boundary.
async fn ask(session: &mut AgentSession, query: &str) -> Result<(QueryOutcome, f64), Error> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let started = Instant::now();
    let result = session.ask_with_cancel(query, &cancel).await;
    watcher.abort();
    result.map(|outcome| (outcome, started.elapsed().as_secs_f64()))
}

async fn interactive(
    session: &mut AgentSession,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let tool_names: Vec<String> = session
        .tool_descriptors()
        .await?
        .into_iter()
        .map(|d| d.name)
        .collect();

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          memloop — Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Window:    {} messages", config.agent.window_size);
    println!("  Depth:     {} loops per query", config.agent.max_total_loops);
    println!("  Tools:     {}", tool_names.join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Commands: /tools, /summary, /metrics. Type 'quit' to exit.");
    println!("  Ctrl+C cancels a running query; at the prompt it exits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }

        match query {
            "quit" | "exit" | "/quit" | "/exit" => break,
            "/tools" => {
                for name in &tool_names {
                    println!("  - {name}");
                }
                println!();
                continue;
            }
            "/summary" => {
                let state = session.state();
                if state.summary().is_empty() {
                    println!("  (no summary yet; {} entries logged)", state.persistent_memory().len());
                } else {
                    println!("  Summary > {}", state.summary());
                }
                println!();
                continue;
            }
            "/metrics" => {
                let metrics = session.tool_metrics();
                if metrics.is_empty() {
                    println!("  (no tool calls yet)");
                }
                for (name, stats) in metrics {
                    println!(
                        "  {name:<24} calls={} errors={} avg={:.1}ms",
                        stats.calls, stats.errors, stats.avg_response_ms
                    );
                }
                println!();
                continue;
            }
            _ => {}
        }

        eprint!("  ...");
        match ask(session, query).await {
            Ok((outcome, elapsed)) => {
                eprint!("\r     \r");
                println!();
                for line in outcome.answer.lines() {
                    println!("  Assistant > {line}");
                }
                println!();
                println!("  ({} iterations, {elapsed:.2}s)", outcome.iterations);
                println!();
            }
            Err(Error::Cancelled) => {
                eprint!("\r     \r");
                eprintln!("  [Cancelled]");
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}
