//! TCP connect probe.

use std::time::Instant;

use tokio::net::TcpStream;

use super::{classify_latency, elapsed_ms, CheckResult, ProbeError};
use crate::config::Monitor;

/// Split a `host:port` target, accepting an optional `tcp://` prefix and
/// bracketed IPv6 hosts.
pub fn split_host_port(address: &str) -> Option<(&str, u16)> {
    let address = address.strip_prefix("tcp://").unwrap_or(address);
    let (host, port) = address.rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }
    let port = port.parse().ok()?;
    Some((host, port))
}

/// Run a TCP connect probe for the given monitor.
pub async fn run_tcp_probe(monitor: &Monitor) -> Result<CheckResult, ProbeError> {
    let (host, port) = split_host_port(&monitor.url)
        .ok_or_else(|| ProbeError::Config(format!("invalid tcp target: {}", monitor.url)))?;

    let start = Instant::now();
    let outcome = tokio::time::timeout(monitor.timeout_duration(), TcpStream::connect((host, port))).await;
    let latency = elapsed_ms(start);

    Ok(match outcome {
        Ok(Ok(_stream)) => classify_latency(latency, monitor.expected_latency),
        Ok(Err(e)) => CheckResult::down(latency, format!("Connection failed: {}", e)),
        Err(_) => CheckResult::down(latency, format!("Timeout after {}ms", monitor.timeout)),
    })
}
