use std::time::Duration;

use netmon_core::config::{NetmonConfig, ProbeMethod};
use netmon_core::DownPolicy;

#[test]
fn shipped_example_config_is_valid() {
    let config = NetmonConfig::from_toml(include_str!("../netmon.example.toml")).unwrap();

    assert_eq!(config.telemetry_topic(), "netmon/attic/metrics");
    assert_eq!(config.downstream.method, ProbeMethod::Tcp);
    assert_eq!(config.downstream.port, 22);
    assert_eq!(
        config.downstream.down_policy,
        DownPolicy::Staleness {
            after: Duration::from_secs(10)
        }
    );
    assert_eq!(config.upstream.down_policy, DownPolicy::Count { failures: 3 });
    assert_eq!(config.link.reconnect_command[0], "wpa_cli");
}
