use std::time::Duration;

use anyhow::{Context, Result};
use nodeset_reconcile::{BudgetRounding, DEFAULT_EXPECTATIONS_TIMEOUT, DEFAULT_RECONCILE_INTERVAL};

use crate::reconciler::ReconcilerConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub reconcile_interval: Duration,
    pub expectations_timeout: Duration,
    pub budget_rounding: BudgetRounding,
    pub dev_mode: bool,
    /// Nodes seeded into the in-memory cluster in dev mode.
    pub dev_nodes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = lookup("NODESET_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let reconcile_interval = match lookup("NODESET_RECONCILE_INTERVAL_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("invalid NODESET_RECONCILE_INTERVAL_SECS '{v}'"))?,
            ),
            None => DEFAULT_RECONCILE_INTERVAL,
        };
        if reconcile_interval.is_zero() {
            anyhow::bail!("NODESET_RECONCILE_INTERVAL_SECS must be greater than zero");
        }

        let expectations_timeout = match lookup("NODESET_EXPECTATIONS_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("invalid NODESET_EXPECTATIONS_TIMEOUT_SECS '{v}'"))?,
            ),
            None => DEFAULT_EXPECTATIONS_TIMEOUT,
        };

        let budget_rounding = match lookup("NODESET_BUDGET_ROUNDING") {
            Some(v) => v.parse().map_err(anyhow::Error::msg)?,
            None => BudgetRounding::default(),
        };

        let dev_mode = lookup("NODESET_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let dev_nodes = match lookup("NODESET_DEV_NODES") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid NODESET_DEV_NODES '{v}'"))?,
            None => 3,
        };

        Ok(Self {
            log_level,
            reconcile_interval,
            expectations_timeout,
            budget_rounding,
            dev_mode,
            dev_nodes,
        })
    }

    pub fn reconciler(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            rounding: self.budget_rounding,
            expectations_timeout: self.expectations_timeout,
        }
    }
}
