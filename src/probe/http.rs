//! HTTP probe implementation.

use std::time::Instant;

use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::Method;

use super::{classify_latency, elapsed_ms, CheckResult, ProbeError};
use crate::config::Monitor;

/// Prefix bare hosts with `http://`.
pub fn normalize_http_url(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

/// Run an HTTP probe for the given monitor.
pub async fn run_http_probe(monitor: &Monitor) -> Result<CheckResult, ProbeError> {
    let url = normalize_http_url(&monitor.url);
    let method = Method::from_bytes(monitor.method.as_bytes())
        .map_err(|_| ProbeError::Config(format!("invalid method: {}", monitor.method)))?;
    let body_pattern = compile_body_pattern(monitor)?;

    let client = reqwest::Client::builder()
        .timeout(monitor.timeout_duration())
        .build()
        .map_err(|e| ProbeError::Client(e.to_string()))?;

    let mut request = client.request(method, &url);
    for (name, value) in &monitor.headers {
        request = request.header(name, value);
    }
    if let Some(body) = &monitor.body {
        request = request.body(body.clone());
    }

    let start = Instant::now();

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) if e.is_builder() => return Err(ProbeError::Config(e.to_string())),
        Err(e) if e.is_timeout() => {
            return Ok(CheckResult::down(
                elapsed_ms(start),
                format!("Timeout after {}ms", monitor.timeout),
            ))
        }
        Err(e) => return Ok(CheckResult::down(elapsed_ms(start), format!("Request failed: {}", e))),
    };

    let code = response.status().as_u16();
    let headers = response.headers().clone();

    // Read the full body to measure complete transfer time
    let body = match response.text().await {
        Ok(b) => b,
        Err(e) => {
            return Ok(CheckResult::down(
                elapsed_ms(start),
                format!("Failed to read body: {}", e),
            ))
        }
    };

    Ok(evaluate_response(
        monitor,
        body_pattern.as_ref(),
        code,
        &headers,
        &body,
        elapsed_ms(start),
    ))
}

fn compile_body_pattern(monitor: &Monitor) -> Result<Option<Regex>, ProbeError> {
    monitor
        .validation
        .as_ref()
        .and_then(|v| v.body_match.as_deref())
        .map(|p| Regex::new(p).map_err(|e| ProbeError::Config(format!("invalid body_match: {}", e))))
        .transpose()
}

/// Apply the monitor's validation rules to a received response.
pub fn evaluate_response(
    monitor: &Monitor,
    body_pattern: Option<&Regex>,
    code: u16,
    headers: &HeaderMap,
    body: &str,
    latency: i64,
) -> CheckResult {
    let validation = monitor.validation.as_ref();

    match validation.and_then(|v| v.status.as_ref()) {
        Some(expected) if !expected.matches(code) => {
            return CheckResult::down(latency, format!("Unexpected status code: {}", code));
        }
        None if !(200..300).contains(&code) => {
            return CheckResult::down(latency, format!("Unexpected status code: {}", code));
        }
        _ => {}
    }

    if let Some(pattern) = body_pattern {
        if !pattern.is_match(body) {
            return CheckResult::down(latency, format!("Body did not match /{}/", pattern.as_str()));
        }
    }

    if let Some(v) = validation {
        for (name, expected) in &v.headers_match {
            let actual = headers.get(name.as_str()).and_then(|h| h.to_str().ok());
            match actual {
                None => return CheckResult::down(latency, format!("Missing header: {}", name)),
                Some(actual) if !actual.contains(expected.as_str()) => {
                    return CheckResult::down(
                        latency,
                        format!("Header {} mismatch: expected '{}', got '{}'", name, expected, actual),
                    );
                }
                Some(_) => {}
            }
        }
    }

    classify_latency(latency, monitor.expected_latency)
}
