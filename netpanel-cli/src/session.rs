//! Terminal presentation loop over a [`Coordinator`].
//!
//! The one-shot commands wait for the event they need and return. `watch`
//! owns the loop until `quit` or end of input.

use anyhow::{Context, Result, anyhow};
use netpanel::{
    ActiveConnectionDetails, Coordinator, OperationKind, PromptReply, PromptRequest, UiEvent,
};
use std::io::Write;

use crate::file_lock::acquire_session_lock;
use crate::render;
use crate::terminal::{Entry, TerminalInput};

const HELP: &str = "\
Commands:
  list                 show the network list
  refresh              rescan now
  select <ssid>        show details for a network
  connect <ssid>       join a network
  disconnect <ssid>    leave a network
  help                 show this text
  quit                 leave";

/// An empty answer cancels the prompt.
pub fn reply_from(line: &str) -> PromptReply {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        PromptReply::Cancelled
    } else {
        PromptReply::Password(line.to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    List,
    Refresh,
    Select(String),
    Connect(String),
    Disconnect(String),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Parses one interactive command. SSIDs may contain spaces.
pub fn parse_command(line: &str) -> Input {
    let line = line.trim();
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    match (cmd, rest) {
        ("", _) => Input::Empty,
        ("list" | "ls", _) => Input::List,
        ("refresh" | "r", _) => Input::Refresh,
        ("help" | "?", _) => Input::Help,
        ("quit" | "exit" | "q", _) => Input::Quit,
        ("select", ssid) if !ssid.is_empty() => Input::Select(ssid.to_string()),
        ("connect", ssid) if !ssid.is_empty() => Input::Connect(ssid.to_string()),
        ("disconnect", ssid) if !ssid.is_empty() => Input::Disconnect(ssid.to_string()),
        _ => Input::Unknown(line.to_string()),
    }
}

fn show_prompt(prompt: &PromptRequest, input: &TerminalInput) {
    print!("Password for '{}' (empty or Esc to cancel): ", prompt.ssid);
    let _ = std::io::stdout().flush();
    input.request_secret();
}

/// Turns an input entry into a prompt answer, if it is one.
///
/// Masked answers arrive as [`Entry::Secret`]. Piped input has no masking,
/// so there the next line answers an open prompt.
fn answer_from(entry: &Entry, input: &TerminalInput) -> Option<PromptReply> {
    match entry {
        Entry::Secret(reply) => Some(reply.clone()),
        Entry::Command(line) if !input.is_terminal() => Some(reply_from(line)),
        Entry::Command(_) => None,
    }
}

/// Waits until `pick` returns a value for one of the emitted events.
async fn until<T>(
    panel: &mut Coordinator,
    mut pick: impl FnMut(&UiEvent) -> Option<Result<T>>,
) -> Result<T> {
    loop {
        let events = panel
            .next_events()
            .await
            .ok_or_else(|| anyhow!("coordinator stopped"))?;
        for event in &events {
            if let Some(done) = pick(event) {
                return done;
            }
        }
    }
}

async fn networks_loaded(panel: &mut Coordinator) -> Result<()> {
    until(panel, |e| match e {
        UiEvent::NetworksUpdated { .. } => Some(Ok(())),
        UiEvent::OperationFailed {
            kind: OperationKind::Scan,
            error,
        } => Some(Err(anyhow!("scan failed: {error}"))),
        _ => None,
    })
    .await
}

pub async fn list(panel: &mut Coordinator) -> Result<()> {
    networks_loaded(panel).await?;
    let state = panel.state();
    print!(
        "{}",
        render::network_table(&state.networks, state.selection.as_deref())
    );
    Ok(())
}

pub async fn details(panel: &mut Coordinator, ssid: Option<String>) -> Result<()> {
    networks_loaded(panel).await?;

    let Some(target) = ssid.or_else(|| panel.state().active.clone()) else {
        print!(
            "{}",
            render::details(None, None, &ActiveConnectionDetails::disconnected())
        );
        return Ok(());
    };

    panel.select_network(&target)?;
    let text = until(panel, |e| match e {
        UiEvent::DetailsUpdated {
            ssid: Some(s),
            network,
            details,
        } if *s == target => Some(Ok(render::details(Some(s), network.as_ref(), details))),
        UiEvent::OperationFailed {
            kind: OperationKind::FetchDetails,
            error,
        } => Some(Err(anyhow!("could not read details: {error}"))),
        _ => None,
    })
    .await?;
    print!("{text}");
    Ok(())
}

pub async fn password(panel: &mut Coordinator) -> Result<()> {
    let line = until(panel, |e| match e {
        UiEvent::PasswordUpdated { ssid, password } => Some(Ok(match (ssid, password) {
            (Some(s), Some(pw)) => format!("{s}: {pw}"),
            (Some(s), None) => format!("No stored password for '{s}'"),
            (None, _) => "Not connected".to_string(),
        })),
        UiEvent::OperationFailed {
            kind: OperationKind::FetchPassword,
            error,
        } => Some(Err(anyhow!("could not read password: {error}"))),
        _ => None,
    })
    .await?;
    println!("{line}");
    Ok(())
}

pub async fn connect(
    panel: &mut Coordinator,
    ssid: &str,
    password: Option<&str>,
    input: &mut TerminalInput,
) -> Result<()> {
    let submitted = match password {
        Some(pw) => panel.activate_with_password(ssid, pw),
        None => panel.activate(ssid),
    };
    submitted.with_context(|| format!("cannot connect to '{ssid}'"))?;
    println!("Connecting to '{ssid}'...");

    let mut prompt: Option<PromptRequest> = None;
    loop {
        tokio::select! {
            events = panel.next_events() => {
                let events = events.ok_or_else(|| anyhow!("coordinator stopped"))?;
                for event in events {
                    match event {
                        UiEvent::PromptRequested(p) => {
                            show_prompt(&p, input);
                            prompt = Some(p);
                        }
                        UiEvent::AttemptFinished {
                            kind: OperationKind::Connect,
                            outcome,
                            ..
                        } => {
                            input.cancel_secret();
                            return match outcome {
                                Ok(()) => {
                                    println!("Connected to '{ssid}'");
                                    Ok(())
                                }
                                Err(e) if e.is_abandonment() => {
                                    println!("Not connected: {e}");
                                    Ok(())
                                }
                                Err(e) => Err(e).with_context(|| format!("connecting to '{ssid}'")),
                            };
                        }
                        _ => {}
                    }
                }
            }
            entry = input.recv(), if prompt.is_some() => {
                let reply = match entry {
                    Some(entry) => match answer_from(&entry, input) {
                        Some(reply) => reply,
                        None => continue,
                    },
                    None => PromptReply::Cancelled,
                };
                if let Some(p) = prompt.take()
                    && !panel.supply_prompt_result(p.id, reply)
                {
                    eprintln!("Prompt expired");
                }
            }
        }
    }
}

pub async fn disconnect(panel: &mut Coordinator, ssid: &str) -> Result<()> {
    networks_loaded(panel).await?;
    panel
        .deactivate(ssid)
        .with_context(|| format!("cannot disconnect from '{ssid}'"))?;

    until(panel, |e| match e {
        UiEvent::AttemptFinished {
            kind: OperationKind::Disconnect,
            outcome,
            ..
        } => Some(
            outcome
                .clone()
                .map_err(|err| anyhow!("disconnecting from '{ssid}': {err}")),
        ),
        _ => None,
    })
    .await?;
    println!("Disconnected from '{ssid}'");
    Ok(())
}

fn report<T>(result: netpanel::Result<T>) {
    if let Err(e) = result {
        println!("error: {e}");
    }
}

/// Interactive session: prints every event and reads commands from stdin.
pub async fn watch(panel: &mut Coordinator, input: &mut TerminalInput) -> Result<()> {
    let _lock = acquire_session_lock().map_err(|e| anyhow!(e))?;
    println!("{HELP}");

    let mut prompt: Option<PromptRequest> = None;
    loop {
        tokio::select! {
            events = panel.next_events() => {
                let Some(events) = events else { break };
                for event in &events {
                    println!("{}", render::event_line(event));
                    match event {
                        UiEvent::NetworksUpdated { networks, selection } => {
                            print!("{}", render::network_table(networks, selection.as_deref()));
                        }
                        UiEvent::DetailsUpdated { ssid, network, details } => {
                            let text = render::details(ssid.as_deref(), network.as_ref(), details);
                            print!("{text}");
                        }
                        UiEvent::PromptRequested(p) => {
                            show_prompt(p, input);
                            prompt = Some(p.clone());
                        }
                        UiEvent::AttemptFinished { ssid, .. }
                            if prompt.as_ref().is_some_and(|p| p.ssid == *ssid) =>
                        {
                            input.cancel_secret();
                            prompt = None;
                        }
                        _ => {}
                    }
                }
            }
            entry = input.recv() => {
                let Some(entry) = entry else { break };

                if prompt.is_some()
                    && let Some(reply) = answer_from(&entry, input)
                {
                    if let Some(p) = prompt.take()
                        && !panel.supply_prompt_result(p.id, reply)
                    {
                        println!("Prompt expired");
                    }
                    continue;
                }
                let Entry::Command(line) = entry else { continue };

                match parse_command(&line) {
                    Input::Quit => break,
                    Input::Refresh => panel.refresh_now(),
                    Input::List => {
                        let state = panel.state();
                        let selection = state.selection.as_deref();
                        print!("{}", render::network_table(&state.networks, selection));
                    }
                    Input::Select(ssid) => report(panel.select_network(&ssid)),
                    Input::Connect(ssid) => report(panel.activate(&ssid)),
                    Input::Disconnect(ssid) => report(panel.deactivate(&ssid)),
                    Input::Help => println!("{HELP}"),
                    Input::Empty => {}
                    Input::Unknown(cmd) => println!("Unknown command '{cmd}', type 'help'"),
                }
            }
        }
    }

    panel.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands() {
        assert_eq!(parse_command("  list "), Input::List);
        assert_eq!(parse_command("connect My Home WiFi"), Input::Connect("My Home WiFi".into()));
        assert_eq!(parse_command("disconnect Cafe"), Input::Disconnect("Cafe".into()));
        assert_eq!(parse_command("select"), Input::Unknown("select".into()));
        assert_eq!(parse_command(""), Input::Empty);
        assert_eq!(parse_command("exit"), Input::Quit);
        assert_eq!(parse_command("frobnicate"), Input::Unknown("frobnicate".into()));
    }

    #[test]
    fn empty_answer_cancels() {
        assert_eq!(reply_from(""), PromptReply::Cancelled);
        assert_eq!(reply_from("\r"), PromptReply::Cancelled);
        assert_eq!(
            reply_from(" pass word "),
            PromptReply::Password(" pass word ".into())
        );
    }
}
