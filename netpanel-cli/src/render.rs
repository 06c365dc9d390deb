//! Plain-text rendering of coordinator state and events.

use netpanel::{
    ActiveConnectionDetails, AttemptStatus, NetworkSummary, OperationKind, UiEvent,
};

/// One row per network. `*` marks the active network, `>` the selection.
pub fn network_table(networks: &[NetworkSummary], selection: Option<&str>) -> String {
    if networks.is_empty() {
        return "No networks found\n".to_string();
    }

    let mut out = String::new();
    for net in networks {
        let marker = if net.is_active {
            '*'
        } else if selection == Some(net.ssid.as_str()) {
            '>'
        } else {
            ' '
        };
        out.push_str(&format!(
            "{marker} {:<32} {:>7}  {}\n",
            net.ssid,
            net.signal_label(),
            net.security
        ));
    }
    out
}

pub fn details(
    ssid: Option<&str>,
    network: Option<&NetworkSummary>,
    details: &ActiveConnectionDetails,
) -> String {
    let mut out = format!("Network:  {}\n", ssid.unwrap_or("(none)"));
    if let Some(net) = network {
        out.push_str(&format!("Signal:   {}\n", net.signal_label()));
        out.push_str(&format!("Security: {}\n", net.security));
    }
    if !details.device.is_empty() {
        out.push_str(&format!("Device:   {}\n", details.device));
    }
    out.push_str(&format!("IPv4:     {}\n", details.ipv4));
    out.push_str(&format!("IPv6:     {}\n", details.ipv6));
    out.push_str(&format!("MAC:      {}\n", details.mac));
    out
}

fn verb(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Connect => "Connecting to",
        OperationKind::Disconnect => "Disconnecting from",
        _ => "Working on",
    }
}

/// Single-line summary of an event for the interactive session.
pub fn event_line(event: &UiEvent) -> String {
    match event {
        UiEvent::NetworksUpdated { networks, selection } => {
            format!(
                "{} networks{}",
                networks.len(),
                selection
                    .as_deref()
                    .map(|s| format!(", selected '{s}'"))
                    .unwrap_or_default()
            )
        }
        UiEvent::DetailsUpdated { ssid, details, .. } => format!(
            "details for {}: {} / {} / {}",
            ssid.as_deref().unwrap_or("(none)"),
            details.ipv4,
            details.ipv6,
            details.mac
        ),
        UiEvent::PasswordUpdated { ssid, password } => match (ssid, password) {
            (Some(s), Some(_)) => format!("stored password available for '{s}'"),
            (Some(s), None) => format!("no stored password for '{s}'"),
            (None, _) => "not connected".to_string(),
        },
        UiEvent::PromptRequested(p) => format!("password required for '{}'", p.ssid),
        UiEvent::AttemptChanged(AttemptStatus::Busy { kind, ssid }) => {
            format!("{} '{ssid}'...", verb(*kind))
        }
        UiEvent::AttemptChanged(AttemptStatus::Free) => "ready".to_string(),
        UiEvent::AttemptFinished { kind, ssid, outcome } => match outcome {
            Ok(()) => format!("{kind} '{ssid}' done"),
            Err(e) if e.is_abandonment() => format!("{kind} '{ssid}' abandoned ({e})"),
            Err(e) => format!("{kind} '{ssid}' failed: {e}"),
        },
        UiEvent::OperationFailed { kind, error } => format!("error: {kind} failed: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpanel::{ConnectionError, Security};

    #[test]
    fn table_marks_active_and_selected() {
        let nets = vec![
            NetworkSummary::new("Home", Some(80), Security::Wpa2).active(),
            NetworkSummary::new("Cafe", None, Security::Open),
        ];
        let table = network_table(&nets, Some("Cafe"));
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("* Home"));
        assert!(lines[0].contains("80%"));
        assert!(lines[0].ends_with("WPA2"));
        assert!(lines[1].starts_with("> Cafe"));
        assert!(lines[1].contains("unknown"));
    }

    #[test]
    fn empty_table() {
        assert_eq!(network_table(&[], None), "No networks found\n");
    }

    #[test]
    fn details_of_inactive_network() {
        let text = details(Some("Cafe"), None, &ActiveConnectionDetails::disconnected());
        assert!(text.contains("IPv4:     Not connected"));
        assert!(text.contains("MAC:      Unknown"));
        assert!(!text.contains("Device:"));
    }

    #[test]
    fn abandonment_is_not_an_error_line() {
        let line = event_line(&UiEvent::AttemptFinished {
            kind: OperationKind::Connect,
            ssid: "Cafe".into(),
            outcome: Err(ConnectionError::PromptCancelled),
        });
        assert_eq!(line, "connect 'Cafe' abandoned (password prompt cancelled)");
    }
}
