//! Line-oriented front end on stdin/stdout. Notices from the controller and
//! command results are printed as one JSON object per line.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::mpsc,
    task::JoinHandle,
};

use crate::{
    collaborators::{LampDriver, Predictor},
    reconcile::{commands, ReconcileController, UiEvent},
};

const USAGE: &str =
    "commands: point <valence> <arousal> | yes | no | latest | lamp <valence> <arousal> | state | poll | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Point { valence: String, arousal: String },
    Confirm,
    Cancel,
    Latest,
    Lamp { valence: String, arousal: String },
    State,
    Poll,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let command = match parts.as_slice() {
            ["point", valence, arousal] => ConsoleCommand::Point {
                valence: valence.to_string(),
                arousal: arousal.to_string(),
            },
            ["lamp", valence, arousal] => ConsoleCommand::Lamp {
                valence: valence.to_string(),
                arousal: arousal.to_string(),
            },
            ["yes"] | ["confirm"] => ConsoleCommand::Confirm,
            ["no"] | ["cancel"] => ConsoleCommand::Cancel,
            ["latest"] => ConsoleCommand::Latest,
            ["state"] => ConsoleCommand::State,
            ["poll"] => ConsoleCommand::Poll,
            ["quit"] | ["exit"] => ConsoleCommand::Quit,
            _ => return None,
        };
        Some(command)
    }
}

/// Prints every controller notice until the channel closes.
pub fn spawn_event_printer(mut events: mpsc::UnboundedReceiver<UiEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_json(&event);
        }
    })
}

/// Runs commands from stdin until `quit` or end of input.
pub async fn run_console<P: Predictor, L: LampDriver>(
    controller: &ReconcileController<P, L>,
) -> Result<()> {
    let mut lines = BufReader::new(io::stdin()).lines();
    println!("{USAGE}");

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(command) = ConsoleCommand::parse(line) else {
            println!("{USAGE}");
            continue;
        };

        if command == ConsoleCommand::Quit {
            break;
        }
        execute(controller, command).await;
    }

    Ok(())
}

async fn execute<P: Predictor, L: LampDriver>(
    controller: &ReconcileController<P, L>,
    command: ConsoleCommand,
) {
    match command {
        ConsoleCommand::Point { valence, arousal } => {
            report(commands::select_point(controller, &valence, &arousal).await)
        }
        ConsoleCommand::Confirm => report(commands::confirm_pending(controller).await),
        ConsoleCommand::Cancel => report(commands::cancel_pending(controller).await),
        ConsoleCommand::Latest => report(commands::latest_observation(controller).await),
        ConsoleCommand::Lamp { valence, arousal } => {
            report(commands::control_lamp(controller, &valence, &arousal).await)
        }
        ConsoleCommand::State => report(commands::get_session_state(controller).await),
        ConsoleCommand::Poll => report(commands::poll_now(controller).await),
        ConsoleCommand::Quit => {}
    }
}

fn report<T: Serialize>(result: Result<T, String>) {
    match result {
        Ok(value) => print_json(&json!({ "ok": value })),
        Err(message) => print_json(&json!({ "error": message })),
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(err) => log::error!("failed to serialize console output: {err}"),
    }
}
