//! Prometheus counters for the service.
//!
//! Each [`Metrics`] owns its own registry, so tests never share state.

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub loans_borrowed: IntCounter,
    pub loans_returned: IntCounter,
    pub loans_extended: IntCounter,
    pub notifications_created: IntCounter,
    pub sweep_runs: IntCounter,
    pub live_connections: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let loans_borrowed = IntCounter::new("librarium_loans_borrowed_total", "Loans created")?;
        let loans_returned = IntCounter::new("librarium_loans_returned_total", "Loans returned")?;
        let loans_extended = IntCounter::new("librarium_loans_extended_total", "Loan extensions")?;
        let notifications_created = IntCounter::new(
            "librarium_notifications_created_total",
            "Notifications written (duplicates excluded)",
        )?;
        let sweep_runs = IntCounter::new("librarium_sweep_runs_total", "Overdue sweep runs")?;
        let live_connections =
            IntGauge::new("librarium_live_connections", "Open live notification sockets")?;

        registry.register(Box::new(loans_borrowed.clone()))?;
        registry.register(Box::new(loans_returned.clone()))?;
        registry.register(Box::new(loans_extended.clone()))?;
        registry.register(Box::new(notifications_created.clone()))?;
        registry.register(Box::new(sweep_runs.clone()))?;
        registry.register(Box::new(live_connections.clone()))?;

        Ok(Self {
            registry,
            loans_borrowed,
            loans_returned,
            loans_extended,
            notifications_created,
            sweep_runs,
            live_connections,
        })
    }

    /// Text exposition format
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let metrics = Metrics::new().unwrap();
        metrics.loans_borrowed.inc();
        metrics.loans_borrowed.inc();
        metrics.live_connections.set(3);

        let text = metrics.render().unwrap();
        assert!(text.contains("librarium_loans_borrowed_total 2"));
        assert!(text.contains("librarium_live_connections 3"));
        assert!(text.contains("librarium_sweep_runs_total 0"));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.sweep_runs.inc();
        assert_eq!(b.sweep_runs.get(), 0);
    }
}
