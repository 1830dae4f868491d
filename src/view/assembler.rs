//! Merges static configuration with persisted state and recent history.

use serde::Serialize;
use std::collections::HashMap;

use crate::config::{Display, Incident, Monitor, MonitorKind, StatusConfig, Tag};
use crate::db::{CheckHistoryEntry, DbError, MonitorState, StateStore};

/// Number of recent checks attached to each monitor.
pub const RECENT_WINDOW: u32 = 30;

/// Public projection of a monitor. Request headers and bodies are never exposed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MonitorKind,
    /// Target address, only when the monitor allows a public link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub expected_latency: u64,
    pub tags: Vec<Tag>,
    pub display: Display,
}

impl From<&Monitor> for MonitorInfo {
    fn from(m: &Monitor) -> Self {
        Self {
            id: m.id.clone(),
            name: m.name.clone(),
            kind: m.kind,
            url: m.display.public_link.then(|| m.url.clone()),
            expected_latency: m.expected_latency,
            tags: m.tags.clone(),
            display: m.display,
        }
    }
}

/// Placeholder for a monitor that has never been evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnknownState {
    pub status: &'static str,
    pub last_checked_at: i64,
    pub last_latency: i64,
}

impl Default for UnknownState {
    fn default() -> Self {
        Self {
            status: "UNKNOWN",
            last_checked_at: 0,
            last_latency: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateView {
    Known(MonitorState),
    Unknown(UnknownState),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorView {
    #[serde(flatten)]
    pub info: MonitorInfo,
    pub state: StateView,
    pub recent_checks: Vec<CheckHistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub id: String,
    pub name: String,
    pub monitors: Vec<MonitorView>,
}

/// Compose the status page payload in configuration order.
///
/// Every configured monitor appears, with an `UNKNOWN` placeholder when it
/// has no persisted state and an empty history when none was collected.
pub fn build_status_view(
    config: &StatusConfig,
    states: &HashMap<String, MonitorState>,
    recent: &HashMap<String, Vec<CheckHistoryEntry>>,
) -> Vec<GroupView> {
    config
        .groups
        .iter()
        .map(|group| GroupView {
            id: group.id.clone(),
            name: group.name.clone(),
            monitors: group
                .monitors
                .iter()
                .map(|monitor| MonitorView {
                    info: MonitorInfo::from(monitor),
                    state: states
                        .get(&monitor.id)
                        .cloned()
                        .map(StateView::Known)
                        .unwrap_or_else(|| StateView::Unknown(UnknownState::default())),
                    recent_checks: recent.get(&monitor.id).cloned().unwrap_or_default(),
                })
                .collect(),
        })
        .collect()
}

/// Index states by monitor id.
pub fn index_states(states: Vec<MonitorState>) -> HashMap<String, MonitorState> {
    states
        .into_iter()
        .map(|s| (s.monitor_id.clone(), s))
        .collect()
}

/// Group history by monitor, keeping the `limit` most recent entries in ascending order.
pub fn group_recent(
    entries: Vec<CheckHistoryEntry>,
    limit: usize,
) -> HashMap<String, Vec<CheckHistoryEntry>> {
    let mut grouped: HashMap<String, Vec<CheckHistoryEntry>> = HashMap::new();
    for entry in entries {
        grouped.entry(entry.monitor_id.clone()).or_default().push(entry);
    }
    for checks in grouped.values_mut() {
        checks.sort_by_key(|e| e.timestamp);
        if checks.len() > limit {
            checks.drain(..checks.len() - limit);
        }
    }
    grouped
}

/// Read the store and build the status view with the default recent window.
pub fn load_status_view(
    store: &dyn StateStore,
    config: &StatusConfig,
) -> Result<Vec<GroupView>, DbError> {
    let states = index_states(store.get_all_states()?);
    let recent = group_recent(store.get_recent_history(RECENT_WINDOW)?, RECENT_WINDOW as usize);
    Ok(build_status_view(config, &states, &recent))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicSettings {
    pub title: String,
    pub logo: Option<String>,
    pub tags: Vec<Tag>,
    pub summary_exclusion: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicGroup {
    pub id: String,
    pub name: String,
    pub monitors: Vec<MonitorInfo>,
}

/// Configuration with callback settings stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicConfig {
    pub settings: PublicSettings,
    pub groups: Vec<PublicGroup>,
    pub incidents: Vec<Incident>,
}

impl From<&StatusConfig> for PublicConfig {
    fn from(config: &StatusConfig) -> Self {
        Self {
            settings: PublicSettings {
                title: config.settings.title.clone(),
                logo: config.settings.logo.clone(),
                tags: config.settings.tags.clone(),
                summary_exclusion: config.settings.summary_exclusion.clone(),
            },
            groups: config
                .groups
                .iter()
                .map(|g| PublicGroup {
                    id: g.id.clone(),
                    name: g.name.clone(),
                    monitors: g.monitors.iter().map(MonitorInfo::from).collect(),
                })
                .collect(),
            incidents: config.incidents.clone(),
        }
    }
}
