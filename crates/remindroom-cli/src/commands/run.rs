use remindroom_core::channel;
use remindroom_core::{
    event_channel, AlertId, App, AppEvent, Config, ControlAction, EventSender, LifecycleEvent, Runtime, TokioTimers,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::surface::{render, Shown, TerminalSurface};

const HELP: &str = "commands: ack [id], list, test, reload, start, stop, close, quit";

pub fn run(config: &Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let result = runtime.block_on(serve(config, json));
    // the stdin reader may still be parked on a blocking read
    runtime.shutdown_background();
    result
}

async fn serve(config: &Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let loader = config.rule_loader()?;
    let (tx, rx) = event_channel();

    let surface = TerminalSurface::new(tx.clone(), json);
    let shown = surface.shown();
    let app = App::new(TokioTimers::new(tx.clone()), surface, config.surface_options())
        .with_stay_resident(config.lifecycle.stay_resident);

    if !json {
        eprintln!("{HELP}");
    }
    tokio::spawn(read_commands(tx.clone(), shown, json));

    let app = Runtime::new(app, loader, tx, rx).run().await;
    info!(origin = %app.rules().origin(), "remindroom stopped");
    Ok(())
}

/// Forward stdin lines as events until EOF, then report the surface gone.
async fn read_commands(events: EventSender, shown: Shown, json: bool) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("stdin closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "failed to read from stdin");
                break;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let event = if json {
            match channel::decode(input) {
                Ok(message) => Some(AppEvent::from(message)),
                Err(e) => {
                    warn!(error = %e, "ignoring malformed surface message");
                    None
                }
            }
        } else {
            match parse_command(input, &shown) {
                Ok(Command::Event(event)) => Some(event),
                Ok(Command::List) => {
                    print_shown(&shown);
                    None
                }
                Ok(Command::Help) => {
                    eprintln!("{HELP}");
                    None
                }
                Err(message) => {
                    eprintln!("{message}");
                    None
                }
            }
        };

        if let Some(event) = event {
            if events.send(event).is_err() {
                return;
            }
        }
    }

    let _ = events.send(AppEvent::Lifecycle(LifecycleEvent::AllSurfacesClosed));
}

#[derive(Debug)]
enum Command {
    Event(AppEvent),
    List,
    Help,
}

fn parse_command(input: &str, shown: &Shown) -> Result<Command, String> {
    let mut words = input.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    match verb.as_str() {
        "ack" | "a" => {
            let id = match words.next() {
                Some(raw) => raw
                    .parse::<AlertId>()
                    .map_err(|_| format!("not an alert id: {raw}"))?,
                None => oldest_shown(shown).ok_or("nothing to acknowledge")?,
            };
            Ok(Command::Event(AppEvent::Confirmed(id)))
        }
        "list" | "ls" => Ok(Command::List),
        "close" => Ok(Command::Event(AppEvent::CloseRequested)),
        "help" | "?" => Ok(Command::Help),
        other => other
            .parse::<ControlAction>()
            .map(|action| Command::Event(AppEvent::Control(action))),
    }
}

fn oldest_shown(shown: &Shown) -> Option<AlertId> {
    shown.lock().ok()?.first().map(|alert| alert.id)
}

fn print_shown(shown: &Shown) {
    let alerts = shown.lock().map(|s| s.clone()).unwrap_or_default();
    if alerts.is_empty() {
        println!("no pending alerts");
    } else {
        print!("{}", render(&alerts));
    }
}
