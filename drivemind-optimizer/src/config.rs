use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// How often the optimizer recomputes congestion weights.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RefreshInterval {
    #[serde(rename = "5s")]
    FiveSeconds,
    #[default]
    #[serde(rename = "15s")]
    FifteenSeconds,
    #[serde(rename = "30s")]
    ThirtySeconds,
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
}

impl RefreshInterval {
    pub const ALL: [RefreshInterval; 5] = [
        RefreshInterval::FiveSeconds,
        RefreshInterval::FifteenSeconds,
        RefreshInterval::ThirtySeconds,
        RefreshInterval::OneMinute,
        RefreshInterval::FiveMinutes,
    ];

    pub const fn duration(self) -> Duration {
        Duration::from_secs(match self {
            RefreshInterval::FiveSeconds => 5,
            RefreshInterval::FifteenSeconds => 15,
            RefreshInterval::ThirtySeconds => 30,
            RefreshInterval::OneMinute => 60,
            RefreshInterval::FiveMinutes => 300,
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RefreshInterval::FiveSeconds => "5s",
            RefreshInterval::FifteenSeconds => "15s",
            RefreshInterval::ThirtySeconds => "30s",
            RefreshInterval::OneMinute => "1m",
            RefreshInterval::FiveMinutes => "5m",
        }
    }
}

impl Display for RefreshInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unsupported refresh interval '{s}' (expected 5s, 15s, 30s, 1m, or 5m)"))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct OptimizerConfig {
    /// Whether the periodic recomputation runs at all.
    pub enabled: bool,
    pub refresh_interval: RefreshInterval,
    /// Only events newer than this are considered.
    pub window: Duration,
    /// Age at which an event's contribution has halved.
    pub half_life: Duration,
    /// Multipliers that move by no more than this are left alone.
    pub epsilon: f64,
    /// Scales the summed event weight into a multiplier increase.
    pub gain: f64,
    pub max_multiplier: f64,
    /// Share of a node event's weight applied to each segment touching the node.
    pub near_factor: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval: RefreshInterval::default(),
            window: Duration::from_secs(900),
            half_life: Duration::from_secs(300),
            epsilon: 0.01,
            gain: 1.0,
            max_multiplier: 10.0,
            near_factor: 0.5,
        }
    }
}
