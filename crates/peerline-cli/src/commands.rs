//! Command handlers for the Peerline CLI

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep, timeout, Duration};
use tracing::{info, warn};

use peerline_core::{AppEvent, AppEventReceiver, CallStatus, Command, LocalAddress};

use crate::app::{LaunchOptions, PeerlineApp};
use crate::cli::{Cli, Commands};
use crate::config::CliAppConfig;
use crate::display::{render, EventFormat};
use crate::error::{CliError, Result};
use crate::repl::{parse_line, ReplCommand};

/// How long the scripted tour waits for each step
const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: CliAppConfig) -> Result<()> {
        let format = if cli.json || config.cli.json_events {
            EventFormat::Json
        } else {
            EventFormat::Text
        };
        let options = LaunchOptions {
            cached_address: cli
                .address
                .as_deref()
                .map(LocalAddress::parse)
                .transpose()?,
            seed: cli.seed,
        };

        match cli.command {
            Commands::Interactive => Self::handle_interactive(config, options, format).await,
            Commands::Demo => Self::handle_demo(config, options, format).await,
            Commands::ExampleConfig => {
                println!("{}", CliAppConfig::example_config()?);
                Ok(())
            }
        }
    }

    /// Read commands from stdin until `quit` or end of input
    async fn handle_interactive(
        config: CliAppConfig,
        options: LaunchOptions,
        format: EventFormat,
    ) -> Result<()> {
        let mut app = PeerlineApp::start(&config, options).await?;
        let mut events = app.take_app_events()?;
        let printer = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                print_event(&event, format);
            }
        });

        println!(
            "Peerline interactive mode. An echo peer answers at {}. Type 'help' for commands.",
            app.echo_address()
        );
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{}", config.cli.prompt);
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            match parse_line(&line, &app.contacts()) {
                Ok(None) => {}
                Ok(Some(ReplCommand::Quit)) => break,
                Ok(Some(command)) => match app.execute(command).await {
                    Ok(Some(output)) => println!("{}", output),
                    Ok(None) => {}
                    Err(CliError::Engine(e)) if !e.is_fatal() => println!("error: {}", e),
                    Err(CliError::InvalidInput(message)) => println!("error: {}", message),
                    Err(e) => return Err(e),
                },
                Err(e) => println!("error: {}", e),
            }
        }

        app.shutdown().await?;
        if let Err(e) = printer.await {
            warn!("Event printer ended abnormally: {}", e);
        }
        Ok(())
    }

    /// Scripted tour: register, chat with the echo peer, call it, record, hang up
    async fn handle_demo(
        config: CliAppConfig,
        options: LaunchOptions,
        format: EventFormat,
    ) -> Result<()> {
        let mut app = PeerlineApp::start(&config, options).await?;
        let mut events = app.take_app_events()?;
        let echo = app.echo_address().clone();

        wait_for(&mut events, format, "registration", |e| {
            matches!(e, AppEvent::IdentityConfirmed { .. })
        })
        .await?;

        info!("Sending a message to the echo peer");
        app.execute(ReplCommand::Engine(Command::SendMessage {
            target: echo.clone(),
            text: "hello from peerline".to_string(),
        }))
        .await?;
        wait_for(&mut events, format, "echo reply", |e| {
            matches!(e, AppEvent::ChatAppended { message, .. } if !message.is_own)
        })
        .await?;

        info!("Calling the echo peer");
        app.execute(ReplCommand::Engine(Command::Dial {
            target: echo.clone(),
        }))
        .await?;
        wait_for(&mut events, format, "call connected", |e| {
            matches!(
                e,
                AppEvent::CallStateChanged { snapshot: Some(call) } if call.status == CallStatus::Connected
            )
        })
        .await?;

        app.execute(ReplCommand::Engine(Command::ToggleRecord))
            .await?;
        sleep(Duration::from_secs(2)).await;
        app.execute(ReplCommand::Engine(Command::ToggleRecord))
            .await?;
        wait_for(&mut events, format, "recording", |e| {
            matches!(e, AppEvent::RecordingCompleted { .. })
        })
        .await?;

        app.execute(ReplCommand::Engine(Command::HangUp)).await?;
        wait_for(&mut events, format, "hang up", |e| {
            matches!(e, AppEvent::CallStateChanged { snapshot: None })
        })
        .await?;

        app.execute(ReplCommand::Engine(Command::GetStatus)).await?;
        wait_for(&mut events, format, "status", |e| {
            matches!(e, AppEvent::StatusReport { .. })
        })
        .await?;

        app.shutdown().await?;
        info!("Demo finished");
        Ok(())
    }
}

/// Print events until one matches `predicate`
async fn wait_for<F>(
    events: &mut AppEventReceiver,
    format: EventFormat,
    step: &str,
    mut predicate: F,
) -> Result<AppEvent>
where
    F: FnMut(&AppEvent) -> bool,
{
    let waited = timeout(STEP_TIMEOUT, async {
        while let Some(event) = events.recv().await {
            print_event(&event, format);
            if predicate(&event) {
                return Some(event);
            }
        }
        None
    })
    .await;

    match waited {
        Ok(Some(event)) => Ok(event),
        Ok(None) => Err(CliError::Config(format!(
            "engine stopped while waiting for {}",
            step
        ))),
        Err(_) => Err(CliError::Config(format!("timed out waiting for {}", step))),
    }
}

fn print_event(event: &AppEvent, format: EventFormat) {
    match render(event, format) {
        Ok(Some(line)) => println!("{}", line),
        Ok(None) => {}
        Err(e) => warn!("Failed to render {:?}: {}", event, e),
    }
}
