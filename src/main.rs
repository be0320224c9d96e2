mod app;
mod cli;
mod config;
mod fetch;
mod gateway;
mod input;
mod model;
mod scheduler;
mod session;
mod ui;

use anyhow::{Context, Result};
use app::{ActionOutcome, App, AppCommand, summarize_error_line};
use clap::Parser;
use cli::CliArgs;
use config::Settings;
use crossterm::event::{Event, EventStream, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use fetch::FetchPayload;
use futures::StreamExt;
use gateway::{CommandGateway, GatewayError, Invocation, StreamEvent};
use input::Action;
use model::ClusterIdentity;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use scheduler::FetchTicket;
use std::fs::OpenOptions;
use std::future::Future;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Results of background work, delivered back to the event loop.
enum LoopEvent {
    Fetched {
        ticket: FetchTicket,
        payload: FetchPayload,
    },
    ActionFinished(ActionOutcome),
}

struct LoopChannels {
    loop_tx: mpsc::UnboundedSender<LoopEvent>,
    stream_tx: mpsc::UnboundedSender<StreamEvent>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;
    let settings = Settings::load(&args)?;
    info!(
        config = settings.source.as_deref().unwrap_or("none"),
        kubectl = %settings.kubectl,
        "starting minipod"
    );

    let gateway = CommandGateway::new(settings.kubectl.clone());
    let namespace = match &settings.namespace {
        Some(namespace) => namespace.clone(),
        None => fetch::fetch_current_namespace(&gateway).await,
    };

    // Resolve the identity first so the first workload fetch is not dropped as stale.
    let mut identity = ClusterIdentity::new(namespace);
    identity.merge(fetch::fetch_identity(&gateway).await);
    info!(
        context = %identity.context,
        cluster = %identity.cluster,
        namespace = %identity.namespace,
        "resolved cluster identity"
    );

    let mut app = App::new(identity, settings.exec_shell.clone(), settings.top_rows);
    run(&mut app, &gateway, &settings).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(io::sink).try_init();
        }
    }

    Ok(())
}

async fn run(app: &mut App, gateway: &CommandGateway, settings: &Settings) -> Result<()> {
    let mut terminal = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, gateway, settings).await;
    app.shutdown();
    let restore_result = restore_terminal(&mut terminal);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<TuiTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

fn delayed_interval(period: std::time::Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.reset();
    ticker
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    gateway: &CommandGateway,
    settings: &Settings,
) -> Result<()> {
    let (loop_tx, mut loop_rx) = mpsc::unbounded_channel::<LoopEvent>();
    let (stream_tx, mut stream_rx) = mpsc::unbounded_channel::<StreamEvent>();
    let channels = LoopChannels { loop_tx, stream_tx };

    let command = app.bootstrap();
    execute_app_command(app, gateway, command, &channels);

    let mut reader = EventStream::new();
    let mut refresh_ticker = delayed_interval(settings.refresh_interval);
    let mut metrics_ticker = delayed_interval(settings.metrics_interval);

    loop {
        if app.take_dirty() {
            terminal
                .draw(|frame| ui::render(frame, app))
                .context("failed to render terminal frame")?;
        }

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(app.mode(), key) {
                            debug!(?action, "key action");
                            let command = app.apply_action(action);
                            execute_app_command(app, gateway, command, &channels);
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => app.mark_dirty(),
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        warn!("terminal event stream closed");
                        app.shutdown();
                    }
                }
            }
            _ = refresh_ticker.tick() => {
                let command = app.periodic_refresh();
                execute_app_command(app, gateway, command, &channels);
            }
            _ = metrics_ticker.tick() => {
                let command = app.metrics_tick();
                execute_app_command(app, gateway, command, &channels);
            }
            Some(event) = loop_rx.recv() => {
                handle_loop_event(app, gateway, event, &channels);
            }
            Some(event) = stream_rx.recv() => {
                app.apply_stream_event(event);
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!("failed to listen for interrupt signal: {error}");
                }
                app.apply_action(Action::Interrupt);
            }
        }

        // Everything already queued lands in the same frame.
        while let Ok(event) = loop_rx.try_recv() {
            handle_loop_event(app, gateway, event, &channels);
        }
        while let Ok(event) = stream_rx.try_recv() {
            app.apply_stream_event(event);
        }
    }

    Ok(())
}

fn handle_loop_event(
    app: &mut App,
    gateway: &CommandGateway,
    event: LoopEvent,
    channels: &LoopChannels,
) {
    let command = match event {
        LoopEvent::Fetched { ticket, payload } => app.apply_fetch(ticket, payload),
        LoopEvent::ActionFinished(outcome) => app.apply_action_outcome(outcome),
    };
    execute_app_command(app, gateway, command, channels);
}

fn execute_app_command(
    app: &mut App,
    gateway: &CommandGateway,
    command: AppCommand,
    channels: &LoopChannels,
) {
    match command {
        AppCommand::None => {}
        AppCommand::Fetch(tickets) => {
            for ticket in tickets {
                let gateway = gateway.clone();
                let loop_tx = channels.loop_tx.clone();
                tokio::spawn(async move {
                    let payload = fetch::fetch_for(&gateway, ticket.kind, &ticket.scope).await;
                    let _ = loop_tx.send(LoopEvent::Fetched { ticket, payload });
                });
            }
        }
        AppCommand::SpawnStream { session, args } => {
            let handle = gateway.run_streaming(session, &args, channels.stream_tx.clone());
            app.attach_stream(session, Box::new(handle));
        }
        AppCommand::DeleteWorkload { target } => {
            let gateway = gateway.clone();
            spawn_action(channels, async move {
                let result = outcome_of(
                    gateway
                        .invoke(&Invocation::DeleteWorkload { target: &target })
                        .await,
                );
                ActionOutcome::Deleted { target, result }
            });
        }
        AppCommand::RestartWorkload { target } => {
            let gateway = gateway.clone();
            spawn_action(channels, async move {
                let result = outcome_of(
                    gateway
                        .invoke(&Invocation::RestartWorkload { target: &target })
                        .await,
                );
                ActionOutcome::Restarted { target, result }
            });
        }
        AppCommand::SwitchContext { context } => {
            let gateway = gateway.clone();
            spawn_action(channels, async move {
                let result = outcome_of(
                    gateway
                        .invoke(&Invocation::UseContext { context: &context })
                        .await,
                );
                ActionOutcome::ContextSwitched { context, result }
            });
        }
    }
}

fn spawn_action<F>(channels: &LoopChannels, task: F)
where
    F: Future<Output = ActionOutcome> + Send + 'static,
{
    let loop_tx = channels.loop_tx.clone();
    tokio::spawn(async move {
        let outcome = task.await;
        debug!(?outcome, "action finished");
        let _ = loop_tx.send(LoopEvent::ActionFinished(outcome));
    });
}

fn outcome_of<T>(result: Result<T, GatewayError>) -> Result<(), String> {
    result
        .map(|_| ())
        .map_err(|error| summarize_error_line(&error.to_string()))
}
