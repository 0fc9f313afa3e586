//! Metrics ingester
//!
//! Runs the per-tick health pull: bounded-concurrency fan-out across all
//! registered services with a fixed per-probe timeout. A probe failure or
//! timeout retains the previous record as stale instead of failing the
//! tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use mend_types::{MetricSample, ServiceHealthRecord, ServiceId};
use tracing::{debug, instrument, warn};

use crate::buffer::SampleBuffer;
use crate::error::{IngestError, IngestResult};
use crate::probe::{HealthProbe, ServiceDescriptor};

/// Ingester tuning knobs
#[derive(Debug, Clone)]
pub struct IngesterConfig {
    /// Maximum concurrently in-flight probes
    pub max_in_flight: usize,

    /// Per-probe timeout
    pub probe_timeout: Duration,

    /// Sample retention window per service
    pub retention: Duration,
}

impl Default for IngesterConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            probe_timeout: Duration::from_secs(10),
            retention: Duration::from_secs(3600),
        }
    }
}

/// Pulls health snapshots and maintains per-service sample buffers
pub struct MetricsIngester {
    config: IngesterConfig,

    /// Probe capability (external adapter)
    probe: Arc<dyn HealthProbe>,

    /// Registered services
    services: DashMap<ServiceId, ServiceDescriptor>,

    /// Latest record per service; retained when a probe fails
    records: DashMap<ServiceId, ServiceHealthRecord>,

    /// Per-service metric ring buffers
    buffers: DashMap<ServiceId, SampleBuffer>,
}

impl MetricsIngester {
    pub fn new(config: IngesterConfig, probe: Arc<dyn HealthProbe>) -> Self {
        Self {
            config,
            probe,
            services: DashMap::new(),
            records: DashMap::new(),
            buffers: DashMap::new(),
        }
    }

    /// Register a service for collection.
    pub fn register_service(&self, descriptor: ServiceDescriptor) {
        debug!(service_id = %descriptor.service_id, service_type = %descriptor.service_type, "Registering service");
        self.services
            .insert(descriptor.service_id.clone(), descriptor);
    }

    /// Unregister a service and drop its buffered state.
    pub fn unregister_service(&self, service_id: &ServiceId) {
        self.services.remove(service_id);
        self.records.remove(service_id);
        self.buffers.remove(service_id);
    }

    /// Registered service IDs.
    pub fn registered_services(&self) -> Vec<ServiceId> {
        self.services.iter().map(|r| r.key().clone()).collect()
    }

    /// Latest record for a service, possibly stale.
    pub fn record(&self, service_id: &ServiceId) -> Option<ServiceHealthRecord> {
        self.records.get(service_id).map(|r| r.clone())
    }

    /// Snapshot of a service's sample buffer.
    pub fn buffer(&self, service_id: &ServiceId) -> Option<SampleBuffer> {
        self.buffers.get(service_id).map(|b| b.clone())
    }

    /// Collect one snapshot per registered service.
    ///
    /// The returned vector holds the freshest record available for every
    /// service that has ever been probed successfully; services whose
    /// probe failed this tick contribute their previous (stale) record.
    /// The tick proceeds to detection only after every probe resolved or
    /// timed out.
    #[instrument(skip(self), fields(services = self.services.len()))]
    pub async fn collect_all(&self, now: DateTime<Utc>) -> Vec<ServiceHealthRecord> {
        let ids: Vec<ServiceId> = self.registered_services();

        let results: Vec<(ServiceId, IngestResult<ServiceHealthRecord>)> =
            stream::iter(ids.into_iter().map(|id| {
                let probe = self.probe.clone();
                let timeout = self.config.probe_timeout;
                async move {
                    let result = match tokio::time::timeout(timeout, probe.probe(&id)).await {
                        Ok(result) => result,
                        Err(_) => Err(IngestError::ProbeTimeout {
                            service_id: id.clone(),
                            timeout_ms: timeout.as_millis() as u64,
                        }),
                    };
                    (id, result)
                }
            }))
            .buffer_unordered(self.config.max_in_flight.max(1))
            .collect()
            .await;

        let mut records = Vec::with_capacity(results.len());
        for (service_id, result) in results {
            match result {
                Ok(record) => {
                    self.ingest_record(&record, now);
                    records.push(record);
                }
                Err(e) => {
                    warn!(service_id = %service_id, error = %e, "Probe failed, retaining stale record");
                    if let Some(stale) = self.record(&service_id) {
                        records.push(stale);
                    }
                }
            }
        }
        records
    }

    /// Collect one service's snapshot on demand.
    ///
    /// Unlike [`collect_all`](Self::collect_all) this surfaces the probe
    /// error instead of falling back to the stale record; callers that
    /// want the stale fallback read [`record`](Self::record) themselves.
    pub async fn collect_one(
        &self,
        service_id: &ServiceId,
        now: DateTime<Utc>,
    ) -> IngestResult<ServiceHealthRecord> {
        if !self.services.contains_key(service_id) {
            return Err(IngestError::UnknownService(service_id.clone()));
        }
        let record = tokio::time::timeout(self.config.probe_timeout, self.probe.probe(service_id))
            .await
            .map_err(|_| IngestError::ProbeTimeout {
                service_id: service_id.clone(),
                timeout_ms: self.config.probe_timeout.as_millis() as u64,
            })??;
        self.ingest_record(&record, now);
        Ok(record)
    }

    /// Store a fresh record and append one sample per numeric metric.
    fn ingest_record(&self, record: &ServiceHealthRecord, now: DateTime<Utc>) {
        let mut buffer = self
            .buffers
            .entry(record.service_id.clone())
            .or_insert_with(|| SampleBuffer::new(self.config.retention));

        for (metric, value) in &record.metrics {
            buffer.push(
                MetricSample::new(
                    record.service_id.clone(),
                    metric.clone(),
                    *value,
                    record.last_check,
                ),
                now,
            );
        }
        drop(buffer);

        self.records
            .insert(record.service_id.clone(), record.clone());
    }
}
