//! Prometheus text-format export

use prometheus::{Encoder, Registry, TextEncoder};

/// Export the registry's metrics in Prometheus text format
pub fn export_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EngineMetrics;

    #[test]
    fn test_export_contains_registered_metrics() {
        let registry = Registry::new();
        let metrics = EngineMetrics::new(&registry);
        metrics.loop_runs_total.inc();

        let output = export_metrics(&registry).unwrap();
        assert!(output.contains("mend_loop_runs_total"));
    }
}
