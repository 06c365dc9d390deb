//! Adapter driving the `nmcli` command line tool.
//!
//! Used when the D-Bus path is unavailable. All listing commands run in
//! terse mode (`-t`), where fields are separated by `:` and literal colons
//! inside values are escaped as `\:`.

use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;

use super::Backend;
use crate::Result;
use crate::api::models::{
    AccessPointRef, ActiveConnectionDetails, ActiveLink, ConnectionError, NetworkSummary, Security,
};
use crate::util::utils::strip_prefix;

const NMCLI: &str = "nmcli";

const WIFI_FIELDS: &str = "IN-USE,SSID,SIGNAL,SECURITY,DEVICE,BSSID";

/// Returns `true` when an `nmcli` executable is on `PATH`.
pub fn is_available() -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(NMCLI).is_file()))
        .unwrap_or(false)
}

/// Adapter invoking `nmcli` for every call. Stateless.
#[derive(Debug, Clone)]
pub struct NmcliBackend {
    program: String,
}

impl Default for NmcliBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NmcliBackend {
    pub fn new() -> Self {
        Self {
            program: NMCLI.to_string(),
        }
    }

    /// Uses a specific executable instead of `nmcli` from `PATH`.
    pub fn with_program(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_string_lossy().into_owned(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.program)
            .args(args)
            .env("LC_ALL", "C")
            .output()
            .await
            .map_err(|e| ConnectionError::Backend(format!("failed to run {}: {e}", self.program)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{} {:?} failed: {}", self.program, args.first(), stderr.trim());
            Err(classify_failure(&stderr))
        }
    }

    async fn wifi_rows(&self, rescan: bool) -> Result<Vec<WifiRow>> {
        let rescan = if rescan { "yes" } else { "no" };
        let out = self
            .run(&["-t", "-f", WIFI_FIELDS, "device", "wifi", "list", "--rescan", rescan])
            .await?;
        Ok(parse_wifi_list(&out))
    }

    async fn has_saved_profile(&self, ssid: &str) -> Result<bool> {
        let out = self
            .run(&["-t", "-f", "NAME,TYPE", "connection", "show"])
            .await?;
        Ok(parse_profiles(&out)
            .iter()
            .any(|(name, kind)| name == ssid && kind == "802-11-wireless"))
    }
}

/// One row of `nmcli device wifi list`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WifiRow {
    in_use: bool,
    ssid: String,
    signal: Option<u8>,
    security: Security,
    device: String,
    bssid: String,
}

/// Splits one terse line into fields, honouring `\:` and `\\` escapes.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn parse_wifi_list(out: &str) -> Vec<WifiRow> {
    out.lines()
        .filter_map(|line| {
            let fields = split_terse(line);
            if fields.len() < 6 {
                debug!("Skipping malformed nmcli row: {line}");
                return None;
            }
            let ssid = fields[1].clone();
            if ssid.trim().is_empty() {
                return None;
            }
            Some(WifiRow {
                in_use: fields[0].trim() == "*",
                ssid,
                signal: fields[2].trim().parse().ok(),
                security: Security::from_nmcli(&fields[3]),
                device: fields[4].clone(),
                bssid: fields[5].clone(),
            })
        })
        .collect()
}

/// Deduplicates rows by SSID, keeping the strongest signal.
fn summarize(rows: Vec<WifiRow>) -> Vec<NetworkSummary> {
    let mut by_ssid: HashMap<String, NetworkSummary> = HashMap::new();
    for row in rows {
        let entry = NetworkSummary::new(row.ssid.clone(), row.signal, row.security);
        by_ssid
            .entry(row.ssid)
            .and_modify(|known| {
                if known.signal < entry.signal {
                    *known = entry.clone();
                }
            })
            .or_insert(entry);
    }
    by_ssid.into_values().collect()
}

fn parse_profiles(out: &str) -> Vec<(String, String)> {
    out.lines()
        .filter_map(|line| {
            let mut fields = split_terse(line).into_iter();
            Some((fields.next()?, fields.next()?))
        })
        .collect()
}

/// Parses `nmcli -t -f IP4.ADDRESS,IP6.ADDRESS,GENERAL.HWADDR device show`.
fn parse_device_show(device: &str, out: &str) -> ActiveConnectionDetails {
    let mut ipv4 = None;
    let mut ipv6 = None;
    let mut mac = None;

    for line in out.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = split_terse(value).join(":");
        let value = value.trim();
        if value.is_empty() || value == "--" {
            continue;
        }
        let key = key.split('[').next().unwrap_or(key);
        match key {
            "IP4.ADDRESS" if ipv4.is_none() => ipv4 = Some(strip_prefix(value).to_string()),
            "IP6.ADDRESS" if ipv6.is_none() => ipv6 = Some(strip_prefix(value).to_string()),
            "GENERAL.HWADDR" => mac = Some(value.to_string()),
            _ => {}
        }
    }

    ActiveConnectionDetails::new(device, ipv4, ipv6, mac)
}

/// Maps `nmcli` error output to the error taxonomy.
fn classify_failure(stderr: &str) -> ConnectionError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("secrets were required")
        || lower.contains("802-11-wireless-security.psk")
        || lower.contains("invalid password")
    {
        ConnectionError::AuthRejected
    } else if lower.contains("no network with ssid") {
        let ssid = stderr
            .split('\'')
            .nth(1)
            .unwrap_or_default()
            .to_string();
        ConnectionError::NotFound(ssid)
    } else if lower.contains("no wi-fi device") || lower.contains("no wifi device") {
        ConnectionError::NoWifiDevice
    } else {
        let msg = stderr.trim();
        let msg = msg.strip_prefix("Error: ").unwrap_or(msg);
        ConnectionError::Backend(msg.to_string())
    }
}

#[async_trait]
impl Backend for NmcliBackend {
    fn name(&self) -> &'static str {
        "nmcli"
    }

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        match self.wifi_rows(true).await {
            Ok(rows) => Ok(summarize(rows)),
            Err(ConnectionError::NoWifiDevice) => {
                warn!("No Wi-Fi device present, returning an empty list");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn active_link(&self) -> Result<Option<ActiveLink>> {
        Ok(self
            .wifi_rows(false)
            .await?
            .into_iter()
            .find(|row| row.in_use)
            .map(|row| ActiveLink {
                ssid: row.ssid,
                device: row.device,
            }))
    }

    async fn locate(&self, ssid: &str) -> Result<AccessPointRef> {
        self.wifi_rows(false)
            .await?
            .into_iter()
            .filter(|row| row.ssid == ssid)
            .max_by_key(|row| row.signal)
            .map(|row| AccessPointRef {
                ssid: row.ssid,
                device: row.device,
                locator: row.bssid,
                security: row.security,
            })
            .ok_or_else(|| ConnectionError::NotFound(ssid.to_string()))
    }

    async fn requires_secret(&self, ap: &AccessPointRef) -> Result<bool> {
        if !ap.security.is_secured() {
            return Ok(false);
        }
        Ok(!self.has_saved_profile(&ap.ssid).await?)
    }

    async fn connect(
        &self,
        ssid: &str,
        ap: &AccessPointRef,
        password: Option<&str>,
    ) -> Result<()> {
        let mut args = vec!["device", "wifi", "connect", ssid];
        if let Some(pw) = password {
            args.extend(["password", pw]);
        }
        if !ap.device.is_empty() {
            args.extend(["ifname", ap.device.as_str()]);
        }
        if !ap.locator.is_empty() {
            args.extend(["bssid", ap.locator.as_str()]);
        }
        self.run(&args).await.map(|_| ())
    }

    async fn disconnect(&self, ssid: &str) -> Result<()> {
        let link = match self.active_link().await? {
            Some(link) if link.ssid == ssid => link,
            _ => return Err(ConnectionError::NotConnected(ssid.to_string())),
        };
        self.run(&["device", "disconnect", link.device.as_str()])
            .await
            .map(|_| ())
    }

    async fn device_details(&self, device: &str) -> Result<ActiveConnectionDetails> {
        let out = self
            .run(&[
                "-t",
                "-f",
                "IP4.ADDRESS,IP6.ADDRESS,GENERAL.HWADDR",
                "device",
                "show",
                device,
            ])
            .await?;
        Ok(parse_device_show(device, &out))
    }

    async fn stored_secret(&self, ssid: &str) -> Result<Option<String>> {
        let out = match self
            .run(&[
                "-s",
                "-g",
                "802-11-wireless-security.psk",
                "connection",
                "show",
                "id",
                ssid,
            ])
            .await
        {
            Ok(out) => out,
            Err(ConnectionError::Backend(msg)) => {
                debug!("No stored secret for '{ssid}': {msg}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let psk = split_terse(out.trim_end_matches('\n')).join(":");
        Ok((!psk.is_empty()).then_some(psk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handles_escaped_colons() {
        assert_eq!(
            split_terse(r"*:Home:80:WPA2:wlan0:AA\:BB\:CC\:DD\:EE\:FF"),
            vec!["*", "Home", "80", "WPA2", "wlan0", "AA:BB:CC:DD:EE:FF"]
        );
        assert_eq!(split_terse(r"a\\b:c"), vec![r"a\b", "c"]);
        assert_eq!(split_terse(""), vec![""]);
    }

    #[test]
    fn parses_wifi_list_rows() {
        let out = concat!(
            " :Cafe:42:WPA1 WPA2:wlan0:11\\:22\\:33\\:44\\:55\\:66\n",
            "*:Home:80:WPA2:wlan0:AA\\:BB\\:CC\\:DD\\:EE\\:FF\n",
            " ::30::wlan0:00\\:00\\:00\\:00\\:00\\:01\n",
            " :Open\\:Net:--::wlan0:00\\:00\\:00\\:00\\:00\\:02\n",
            "garbage\n",
        );
        let rows = parse_wifi_list(out);
        assert_eq!(rows.len(), 3);
        assert!(!rows[0].in_use);
        assert_eq!(rows[0].security, Security::Wpa2);
        assert_eq!(rows[0].signal, Some(42));
        assert!(rows[1].in_use);
        assert_eq!(rows[1].bssid, "AA:BB:CC:DD:EE:FF");
        assert_eq!(rows[2].ssid, "Open:Net");
        assert_eq!(rows[2].signal, None);
        assert_eq!(rows[2].security, Security::Open);
    }

    #[test]
    fn summarize_keeps_strongest_duplicate() {
        let out = concat!(
            " :Cafe:40:WPA2:wlan0:01\n",
            " :Cafe:70:WPA2:wlan0:02\n",
            " :Home:55:WPA2:wlan0:03\n",
        );
        let mut nets = summarize(parse_wifi_list(out));
        nets.sort_by(|a, b| a.ssid.cmp(&b.ssid));
        assert_eq!(nets.len(), 2);
        assert_eq!(nets[0].ssid, "Cafe");
        assert_eq!(nets[0].signal, Some(70));
        assert!(nets.iter().all(|n| !n.is_active));
    }

    #[test]
    fn parses_device_show() {
        let out = concat!(
            "IP4.ADDRESS[1]:192.168.1.23/24\n",
            "IP4.ADDRESS[2]:10.0.0.9/8\n",
            "IP6.ADDRESS[1]:fe80\\:\\:1/64\n",
            "GENERAL.HWADDR:AA\\:BB\\:CC\\:DD\\:EE\\:FF\n",
        );
        let d = parse_device_show("wlan0", out);
        assert_eq!(d.device, "wlan0");
        assert_eq!(d.ipv4, "192.168.1.23");
        assert_eq!(d.ipv6, "fe80::1");
        assert_eq!(d.mac, "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn device_show_without_addresses_uses_placeholders() {
        let d = parse_device_show("wlan0", "GENERAL.HWADDR:--\n");
        assert_eq!(d.ipv4, "Not connected");
        assert_eq!(d.ipv6, "Not connected");
        assert_eq!(d.mac, "Unknown");
    }

    #[test]
    fn parses_profiles() {
        let out = "Home:802-11-wireless\nWired connection 1:802-3-ethernet\n";
        let profiles = parse_profiles(out);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0], ("Home".to_string(), "802-11-wireless".to_string()));
    }

    #[test]
    fn classifies_failures() {
        assert_eq!(
            classify_failure(
                "Error: Connection activation failed: Secrets were required, but not provided."
            ),
            ConnectionError::AuthRejected
        );
        assert_eq!(
            classify_failure("Error: No network with SSID 'Ghost' found."),
            ConnectionError::NotFound("Ghost".into())
        );
        assert_eq!(
            classify_failure("Error: NetworkManager is not running.\n"),
            ConnectionError::Backend("NetworkManager is not running.".into())
        );
    }

    #[tokio::test]
    async fn missing_program_is_backend_error() {
        let backend = NmcliBackend::with_program("/nonexistent/nmcli-for-tests");
        let err = backend.active_link().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Backend(_)));
    }
}
