//! Metrics recorder initialization.

use {anyhow::Result, tracing::info};

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
    /// Scrape listener address (`host:port`); exporter default when unset
    pub listen: Option<String>,
    /// Global labels to add to all metrics
    pub global_labels: Vec<(String, String)>,
}

/// Initialize the metrics system.
///
/// Call once at startup from inside the tokio runtime. With the `prometheus`
/// feature this installs the global recorder and spawns the scrape listener;
/// otherwise the `metrics` macros stay no-ops.
///
/// # Errors
///
/// Returns an error if the listen address is invalid or the exporter fails
/// to install.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<()> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(());
    }

    #[cfg(feature = "prometheus")]
    {
        init_prometheus(config)?;
        info!("prometheus metrics exporter initialized");
        Ok(())
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = config;
        info!("metrics feature not enabled at compile time");
        Ok(())
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus(config: MetricsRecorderConfig) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let mut builder = PrometheusBuilder::new();
    if let Some(listen) = config.listen {
        let addr: std::net::SocketAddr = listen.parse()?;
        builder = builder.with_http_listener(addr);
    }
    for (key, value) in config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder.install()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_config_is_a_noop() {
        let config = MetricsRecorderConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(init_metrics(config).is_ok());
    }
}
