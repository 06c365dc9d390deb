//! Merges a freshly enumerated network set into the displayed list.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::api::models::NetworkSummary;

/// The displayed list and the entry to highlight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub networks: Vec<NetworkSummary>,
    pub selection: Option<String>,
}

fn by_strength(a: &NetworkSummary, b: &NetworkSummary) -> Ordering {
    // Known signal first, strongest first, then by name.
    match (a.signal, b.signal) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.ssid.cmp(&b.ssid))
}

/// Deduplicates `fresh` by SSID and puts the active network first.
///
/// Later entries win over earlier ones with the same SSID. Entries with an
/// empty SSID are dropped. The rest is ordered by signal strength, so the
/// same input always gives the same output. The selection hint is the active
/// SSID when it is in the set.
pub fn merge(fresh: Vec<NetworkSummary>, active: Option<&str>) -> Reconciled {
    let mut unique: HashMap<String, NetworkSummary> = HashMap::with_capacity(fresh.len());
    for net in fresh {
        if net.ssid.trim().is_empty() {
            continue;
        }
        unique.insert(net.ssid.clone(), net);
    }

    let mut networks: Vec<NetworkSummary> = unique
        .into_values()
        .map(|mut net| {
            net.is_active = Some(net.ssid.as_str()) == active;
            net
        })
        .collect();
    networks.sort_by(by_strength);

    let selection = match networks.iter().position(|n| n.is_active) {
        Some(pos) => {
            let net = networks.remove(pos);
            let ssid = net.ssid.clone();
            networks.insert(0, net);
            Some(ssid)
        }
        None => None,
    };

    Reconciled {
        networks,
        selection,
    }
}
