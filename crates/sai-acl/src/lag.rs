//! LAG membership lookup.
//!
//! Ingress LAG bind points match on the LAG's member ports, so the engine
//! asks a [`LagResolver`] for them whenever it programs or refreshes such a
//! bind point.

use std::collections::BTreeMap;

use sonic_sai::api::PortBitmap;

/// Source of LAG member ports.
pub trait LagResolver {
    /// Returns the member ports of `lag`, or `None` if the LAG is unknown.
    fn lag_members(&self, lag: u32) -> Option<PortBitmap>;
}

/// A LAG table held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticLagResolver {
    lags: BTreeMap<u32, PortBitmap>,
}

impl StaticLagResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a LAG.
    pub fn set_members(&mut self, lag: u32, ports: impl IntoIterator<Item = u32>) {
        self.lags.insert(lag, ports.into_iter().collect());
    }

    /// Removes a LAG; returns true if it existed.
    pub fn remove(&mut self, lag: u32) -> bool {
        self.lags.remove(&lag).is_some()
    }

    pub fn lags(&self) -> impl Iterator<Item = (u32, &PortBitmap)> {
        self.lags.iter().map(|(lag, ports)| (*lag, ports))
    }
}

impl LagResolver for StaticLagResolver {
    fn lag_members(&self, lag: u32) -> Option<PortBitmap> {
        self.lags.get(&lag).copied()
    }
}
