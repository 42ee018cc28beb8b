use serde::{Deserialize, Serialize};

/// Virtual positions per node when none (or zero) is configured.
pub const DEFAULT_REPLICAS: usize = 50;

/// Settings for building a `HashRing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Number of virtual positions generated per node. `0` selects
    /// `DEFAULT_REPLICAS`.
    pub replicas: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig {
            replicas: DEFAULT_REPLICAS,
        }
    }
}

impl RingConfig {
    pub fn new(replicas: usize) -> Self {
        RingConfig { replicas }
    }

    /// The replica count actually used by the ring.
    #[inline]
    pub fn effective_replicas(&self) -> usize {
        if self.replicas == 0 {
            DEFAULT_REPLICAS
        } else {
            self.replicas
        }
    }
}
