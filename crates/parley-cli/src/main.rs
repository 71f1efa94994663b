use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parley_client::{CoachClient, EndpointAdapter, ProxyConfig, SpeechAdapter, SpeechConfig};
use parley_net::NetworkMonitor;
use parley_schema::{DispatchOptions, PracticeMode};
use parley_session::{ConversationContext, DeviceProfile, ExchangeState, SessionManager};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

mod config;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "parley", version, about = "Conversation practice coach client")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.parley",
        help = "Config root directory (config.yaml, data/, logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Interactive practice session")]
    Chat {
        #[arg(long, default_value = "general", help = "Practice mode tag")]
        mode: String,
        #[arg(long, help = "Stream replies token by token")]
        stream: bool,
    },
    #[command(about = "Synthesize speech for a line of text")]
    Speak { text: String },
    #[command(about = "Show connectivity, cache, queue, and recent usage")]
    Status,
    #[command(about = "Replay queued offline requests now")]
    Drain,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Expand ~ to home directory
    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(
                cli.config_root
                    .strip_prefix("~")
                    .unwrap_or(&cli.config_root),
            );
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "parley.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let config = CliConfig::load(&cli.config_root)?;
    let data_dir = cli.config_root.join("data");
    std::fs::create_dir_all(&data_dir)?;

    let client = CoachClient::new(
        &data_dir,
        ProxyConfig::from_env(),
        SpeechConfig::from_env(),
        monitor_for(config.device_profile()),
    );

    match cli.command {
        Commands::Chat { mode, stream } => {
            run_chat(client, &config, PracticeMode::parse(&mode), stream).await?;
        }
        Commands::Speak { text } => {
            run_speak(&client, &text).await?;
            client.persist().await;
        }
        Commands::Status => {
            print_status(&client);
        }
        Commands::Drain => {
            let report = client.drain_offline().await;
            println!(
                "drained: {} delivered, {} requeued, {} dropped",
                report.delivered, report.requeued, report.dropped
            );
            client.persist().await;
        }
    }

    Ok(())
}

/// The web platform has no OS connectivity monitor; it runs permanently
/// online. Native platforms feed real connectivity events.
fn monitor_for(device: DeviceProfile) -> NetworkMonitor {
    match device {
        DeviceProfile::Web => NetworkMonitor::always_online(),
        DeviceProfile::Native { .. } => NetworkMonitor::new(),
    }
}

async fn run_chat(
    client: CoachClient,
    config: &CliConfig,
    mode: PracticeMode,
    stream: bool,
) -> Result<()> {
    let drain_handle = client.start_drain_scheduler();
    let mut manager = SessionManager::new(client, config.device_profile());
    if let Some(model) = &config.model {
        manager = manager.with_model(model);
    }
    let mut context = ConversationContext::new(mode.clone());

    println!("mode: {} (exit to quit)", mode.as_str());
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let state = if stream {
            let mut printed = 0;
            let state = manager
                .send_message_streaming(&mut context, line, |update| {
                    // Print only the tail that is new since the last snapshot.
                    let tail = &update.content[printed..];
                    print!("{tail}");
                    let _ = std::io::stdout().flush();
                    printed = update.content.len();
                })
                .await;
            println!();
            state
        } else {
            let state = manager.send_message(&mut context, line).await;
            if state == ExchangeState::Complete {
                if let Some(reply) = context.messages.last() {
                    println!("{}", reply.content);
                }
            }
            state
        };

        if state == ExchangeState::Failed {
            if let Some(error) = &context.error {
                eprintln!("error: {error}");
            }
        }
    }

    drain_handle.abort();
    manager.client().persist().await;
    Ok(())
}

async fn run_speak(client: &CoachClient, text: &str) -> Result<()> {
    let result = client
        .dispatcher
        .dispatch(
            client.speech.as_ref(),
            Uuid::new_v4(),
            SpeechAdapter::payload(text),
            DispatchOptions::default(),
        )
        .await
        .context("speech synthesis failed")?;

    match result.get("audio_path").and_then(|p| p.as_str()) {
        Some(path) => println!("{path}"),
        None => println!("{result}"),
    }
    Ok(())
}

fn print_status(client: &CoachClient) {
    let quality = client.monitor.current();
    println!(
        "network: {} ({})",
        if quality.online { "online" } else { "offline" },
        quality.speed.as_str()
    );
    println!("cache entries: {}", client.cache.len());
    println!("queued requests: {}", client.queue.len());
    println!(
        "chat configured: {}, speech configured: {}",
        client.chat.is_configured(),
        client.speech.is_configured()
    );

    let recent = client.usage.recent(5);
    if recent.is_empty() {
        println!("no recorded exchanges");
    } else {
        println!("last {} exchanges:", recent.len());
        for record in recent {
            println!(
                "  {} {} {} msgs {} ms ({})",
                record.at.format("%Y-%m-%d %H:%M:%S"),
                record.mode.as_str(),
                record.message_count,
                record.response_time_ms,
                record.speed.as_str()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_net::ConnectivityEvent;

    #[test]
    fn web_platform_gets_a_fixed_online_monitor() {
        let monitor = monitor_for(DeviceProfile::Web);
        monitor.report(ConnectivityEvent::offline());
        assert!(monitor.is_online());
    }

    #[test]
    fn native_platform_monitor_tracks_events() {
        let monitor = monitor_for(DeviceProfile::Native {
            available_memory_mb: None,
        });
        monitor.report(ConnectivityEvent::offline());
        assert!(!monitor.is_online());
    }
}
