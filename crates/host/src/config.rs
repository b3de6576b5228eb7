use std::time::Duration;

use serde::Deserialize;

use crate::input::VirtualPadConfig;
use crate::runtime::{Viewport, DEFAULT_MAX_FRAME_DELTA};
use crate::script::SandboxLimits;

/// What the scheduler does after `update` or `draw` raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Stop ticking the script until the next successful load.
    #[default]
    Halt,
    /// Report the fault and keep ticking.
    Continue,
}

impl FaultPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultPolicy::Halt => "halt",
            FaultPolicy::Continue => "continue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "halt" => Some(FaultPolicy::Halt),
            "continue" => Some(FaultPolicy::Continue),
            _ => None,
        }
    }
}

/// Core runtime settings, independent of any window.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub max_frame_delta_ms: u64,
    pub fault_policy: FaultPolicy,
    /// VM instructions allowed per hook call; `0` disables the budget.
    pub instruction_budget: u64,
    pub memory_limit_bytes: usize,
    pub default_viewport: Viewport,
    /// Fixed seed for `math.random` and `Vector.random2D`.
    pub rng_seed: Option<u64>,
    pub virtual_pad: VirtualPadConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        let limits = SandboxLimits::default();
        Self {
            max_frame_delta_ms: DEFAULT_MAX_FRAME_DELTA.as_millis() as u64,
            fault_policy: FaultPolicy::default(),
            instruction_budget: limits.instruction_budget,
            memory_limit_bytes: limits.memory_limit_bytes,
            default_viewport: Viewport::FALLBACK,
            rng_seed: None,
            virtual_pad: VirtualPadConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn max_frame_delta(&self) -> Duration {
        Duration::from_millis(self.max_frame_delta_ms)
    }

    pub fn sandbox_limits(&self) -> SandboxLimits {
        SandboxLimits {
            instruction_budget: self.instruction_budget,
            memory_limit_bytes: self.memory_limit_bytes,
        }
    }
}
