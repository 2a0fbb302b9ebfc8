//! Link connectivity: carrier state, signal strength and re-association.
//!
//! [`SysfsLink`] reads the kernel's view of one interface:
//!
//! - `/sys/class/net/<if>/operstate` (`up`, `down`, `dormant`, ...)
//! - `/proc/net/wireless` for the signal level in dBm
//!
//! Reconnecting runs an operator-supplied command (e.g.
//! `["wpa_cli", "-i", "wlan0", "reassociate"]`) without waiting for it.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use netmon_core::config::LinkConfig;

/// The network link the monitor runs over.
pub trait Link: Send + 'static {
    fn is_up(&mut self) -> bool;

    /// Start a reconnect attempt. Must not block.
    fn reconnect(&mut self);

    /// Signal level in dBm, if the link is wireless and up.
    fn signal_strength(&mut self) -> Option<i32>;
}

#[derive(Debug, Clone)]
pub struct SysfsLink {
    interface: String,
    reconnect_command: Vec<String>,
    sys_class_net: PathBuf,
    proc_wireless: PathBuf,
}

impl SysfsLink {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            interface: config.interface.clone(),
            reconnect_command: config.reconnect_command.clone(),
            sys_class_net: PathBuf::from("/sys/class/net"),
            proc_wireless: PathBuf::from("/proc/net/wireless"),
        }
    }

    /// Read from alternate locations instead of `/sys` and `/proc`.
    pub fn with_roots(mut self, sys_class_net: &Path, proc_wireless: &Path) -> Self {
        self.sys_class_net = sys_class_net.to_path_buf();
        self.proc_wireless = proc_wireless.to_path_buf();
        self
    }

    fn read_attr(&self, name: &str) -> Option<String> {
        let path = self.sys_class_net.join(&self.interface).join(name);
        std::fs::read_to_string(path).ok().map(|s| s.trim().to_string())
    }
}

impl Link for SysfsLink {
    fn is_up(&mut self) -> bool {
        match self.read_attr("operstate").as_deref() {
            Some("up") => true,
            // Drivers without operstate reporting: fall back to carrier.
            Some("unknown") => self.read_attr("carrier").as_deref() == Some("1"),
            Some(_) => false,
            None => {
                debug!(interface = %self.interface, "interface not present");
                false
            }
        }
    }

    fn reconnect(&mut self) {
        let Some((program, args)) = self.reconnect_command.split_first() else {
            debug!(interface = %self.interface, "no reconnect command configured");
            return;
        };
        let spawned = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => debug!(interface = %self.interface, pid = child.id(), %program, "reconnect started"),
            Err(e) => warn!(interface = %self.interface, %program, error = %e, "reconnect command failed to start"),
        }
    }

    fn signal_strength(&mut self) -> Option<i32> {
        let table = std::fs::read_to_string(&self.proc_wireless).ok()?;
        parse_wireless_level(&table, &self.interface)
    }
}

/// Signal level for `interface` from a `/proc/net/wireless` table.
///
/// ```text
/// Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE
///  face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22
///  wlan0: 0000   54.  -56.  -256        0      0      0      0     12        0
/// ```
pub fn parse_wireless_level(table: &str, interface: &str) -> Option<i32> {
    table.lines().skip(2).find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        if name.trim() != interface {
            return None;
        }
        let level = rest.split_whitespace().nth(2)?;
        let level = level.trim_end_matches('.').parse::<f64>().ok()?;
        Some(level.round() as i32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIRELESS: &str = "Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE\n \
        face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22\n \
        wlan0: 0000   54.  -56.  -256        0      0      0      0     12        0\n";

    fn fake_link(dir: &Path, operstate: Option<&str>) -> SysfsLink {
        let net = dir.join("net");
        std::fs::create_dir_all(net.join("wlan0")).unwrap();
        if let Some(state) = operstate {
            std::fs::write(net.join("wlan0").join("operstate"), format!("{state}\n")).unwrap();
        }
        let wireless = dir.join("wireless");
        std::fs::write(&wireless, WIRELESS).unwrap();
        SysfsLink::new(&LinkConfig::default()).with_roots(&net, &wireless)
    }

    #[test]
    fn parses_level_for_interface() {
        assert_eq!(parse_wireless_level(WIRELESS, "wlan0"), Some(-56));
        assert_eq!(parse_wireless_level(WIRELESS, "wlan1"), None);
    }

    #[test]
    fn header_only_table_has_no_level() {
        let header: String = WIRELESS.lines().take(2).collect::<Vec<_>>().join("\n");
        assert_eq!(parse_wireless_level(&header, "wlan0"), None);
    }

    #[test]
    fn operstate_up_means_connected() {
        let dir = tempfile::tempdir().unwrap();
        let mut link = fake_link(dir.path(), Some("up"));
        assert!(link.is_up());
        assert_eq!(link.signal_strength(), Some(-56));
    }

    #[test]
    fn dormant_and_missing_are_down() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!fake_link(dir.path(), Some("dormant")).is_up());

        let other = tempfile::tempdir().unwrap();
        assert!(!fake_link(other.path(), None).is_up());
    }

    #[test]
    fn unknown_operstate_falls_back_to_carrier() {
        let dir = tempfile::tempdir().unwrap();
        let mut link = fake_link(dir.path(), Some("unknown"));
        assert!(!link.is_up());
        std::fs::write(dir.path().join("net/wlan0/carrier"), "1\n").unwrap();
        assert!(link.is_up());
    }

    #[tokio::test]
    async fn reconnect_without_command_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut link = fake_link(dir.path(), Some("down"));
        link.reconnect();
    }

    #[tokio::test]
    async fn reconnect_runs_configured_command() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("reconnected");
        let config = LinkConfig {
            reconnect_command: vec!["touch".to_string(), marker.display().to_string()],
            ..LinkConfig::default()
        };
        let mut link = SysfsLink::new(&config);
        link.reconnect();

        for _ in 0..50 {
            if marker.exists() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("reconnect command did not run");
    }
}
