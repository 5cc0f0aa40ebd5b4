//! Free-text command parsing and handling.
//!
//! Commands arrive from the messaging gateway as plain chat text.
//! Everything here is stateless request/response except `/subscribe`
//! and `/unsubscribe`, which mutate the subscription store only —
//! already-pending alerts for a previous area are deliberately left
//! alone (the scheduler exposes `cancel_user` for deployments that
//! want the stricter behavior).

use tracing::warn;

use crate::state::AppState;

/// A parsed inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/search <query>` — fuzzy-match area names.
    Search(String),
    /// `/listareas` — list every known area.
    ListAreas,
    /// `/loadshedding <area>` — show the area's current outage windows.
    Schedule(String),
    /// `/subscribe <area>` — alert this user before outages in the area.
    Subscribe(String),
    /// `/unsubscribe` — stop alerting this user.
    Unsubscribe,
    /// `/help` or anything starting with `/` we don't know.
    Help,
}

/// Parse a chat message. Returns `None` for ordinary chatter that
/// isn't addressed to the bot at all.
pub fn parse(text: &str) -> Option<Command> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }
    let mut parts = text.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    let command = match (verb.as_str(), arg) {
        ("/search", Some(q)) => Command::Search(q),
        ("/listareas", _) => Command::ListAreas,
        ("/loadshedding", Some(area)) => Command::Schedule(area),
        ("/subscribe", Some(area)) => Command::Subscribe(area),
        ("/unsubscribe", _) => Command::Unsubscribe,
        _ => Command::Help,
    };
    Some(command)
}

const HELP_TEXT: &str = "Commands:\n\
/search <query> — find your area name\n\
/listareas — list all known areas\n\
/loadshedding <area> — show the schedule for an area\n\
/subscribe <area> — get alerted one hour before outages\n\
/unsubscribe — stop alerts";

/// Execute a command on behalf of `from` and produce the reply text.
pub async fn handle(command: Command, from: &str, state: &AppState) -> String {
    match command {
        Command::Search(query) => match state.source.fuzzy_search(&query).await {
            Ok(areas) if areas.is_empty() => format!("No areas matched '{}'.", query),
            Ok(areas) => format!("Areas matching '{}':\n{}", query, areas.join("\n")),
            Err(e) => source_down(&e),
        },
        Command::ListAreas => match state.source.list_areas().await {
            Ok(areas) if areas.is_empty() => "No areas are known right now.".to_string(),
            Ok(areas) => format!("Known areas:\n{}", areas.join("\n")),
            Err(e) => source_down(&e),
        },
        Command::Schedule(area) => match state.source.fetch_windows(&area).await {
            Ok(windows) if windows.is_empty() => {
                format!("No load shedding currently scheduled for {}.", area)
            }
            Ok(windows) => {
                let lines: Vec<String> = windows
                    .iter()
                    .map(|w| {
                        format!(
                            "{} — {}",
                            w.start.format("%a %d %b %H:%M"),
                            w.end.format("%H:%M UTC")
                        )
                    })
                    .collect();
                format!("Load shedding for {}:\n{}", area, lines.join("\n"))
            }
            Err(e) => source_down(&e),
        },
        Command::Subscribe(area) => match state.subscriptions.set(from, &area).await {
            Ok(()) => format!(
                "Subscribed to {}. You'll get a text before each outage window.",
                area
            ),
            Err(e) => {
                warn!(user = from, error = %e, "subscribe failed");
                "Could not save your subscription, please try again.".to_string()
            }
        },
        Command::Unsubscribe => match state.subscriptions.remove(from).await {
            Ok(true) => "Unsubscribed. No more alerts.".to_string(),
            Ok(false) => "You weren't subscribed to anything.".to_string(),
            Err(e) => {
                warn!(user = from, error = %e, "unsubscribe failed");
                "Could not remove your subscription, please try again.".to_string()
            }
        },
        Command::Help => HELP_TEXT.to_string(),
    }
}

fn source_down(error: &shed_source::SourceError) -> String {
    warn!(error = %error, "command failed against outage source");
    "The outage data service is unavailable right now, please try again later.".to_string()
}
