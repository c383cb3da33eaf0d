//! Routing policy names

use crate::utils::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named strategy for selecting one provider per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPolicy {
    /// Minimum list price, ties broken by registration order
    Cheapest,
    /// Smallest strictly-positive p95 latency, cheapest before any data
    FastestP95,
    /// Cheapest unless it is burning error budget, then the healthiest
    /// alternative
    SloBurnAware,
    /// Stochastic split between the two cheapest providers
    Canary,
}

impl RoutingPolicy {
    /// All known policies in wire order.
    pub const ALL: [RoutingPolicy; 4] = [
        RoutingPolicy::Cheapest,
        RoutingPolicy::FastestP95,
        RoutingPolicy::SloBurnAware,
        RoutingPolicy::Canary,
    ];

    /// Wire name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingPolicy::Cheapest => "cheapest",
            RoutingPolicy::FastestP95 => "fastest_p95",
            RoutingPolicy::SloBurnAware => "slo_burn_aware",
            RoutingPolicy::Canary => "canary",
        }
    }

    /// Parse a request-supplied policy name; unknown names fall back to
    /// [`RoutingPolicy::Cheapest`].
    pub fn parse_lossy(name: &str) -> RoutingPolicy {
        name.parse().unwrap_or(RoutingPolicy::Cheapest)
    }
}

impl fmt::Display for RoutingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingPolicy {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cheapest" => Ok(RoutingPolicy::Cheapest),
            "fastest_p95" => Ok(RoutingPolicy::FastestP95),
            "slo_burn_aware" => Ok(RoutingPolicy::SloBurnAware),
            "canary" => Ok(RoutingPolicy::Canary),
            other => Err(GatewayError::Validation(format!(
                "unknown policy: {other}"
            ))),
        }
    }
}
