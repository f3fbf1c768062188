//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Session-wide memory quota in bytes. Trackers attached under the
    /// session enforce this; operators must spill or fail once exceeded.
    pub mem_cap_bytes: usize,

    /// Directory for spill segment files.
    pub spill_dir: String,

    /// Per-store high-water mark: a row container starts spilling its oldest
    /// chunks once its in-memory bytes pass this value.
    pub spill_high_water_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mem_cap_bytes: 512 * 1024 * 1024,
            spill_dir: "/tmp/riffle-spill".to_string(),
            spill_high_water_bytes: 64 * 1024 * 1024,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `RIFFLE_MEM_CAP_BYTES`: session memory quota in bytes
    /// - `RIFFLE_SPILL_DIR`: spill scratch directory
    /// - `RIFFLE_SPILL_HIGH_WATER_BYTES`: row-container spill threshold
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("RIFFLE_MEM_CAP_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.mem_cap_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("RIFFLE_SPILL_DIR") {
            cfg.spill_dir = s;
        }

        if let Ok(s) = std::env::var("RIFFLE_SPILL_HIGH_WATER_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.spill_high_water_bytes = v;
            }
        }

        cfg
    }
}
