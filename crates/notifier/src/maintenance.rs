//! Idle-time maintenance: queue utilization and provider health.
//!
//! Purely observational. Invoked from the dispatcher's idle branch only.

use std::sync::Arc;

use crate::queue::RequestQueue;
use crate::service::DeliveryService;

#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceReport {
    pub queue_length: usize,
    pub queue_capacity: usize,
    pub utilization: f64,
    pub provider_healthy: bool,
}

pub struct MaintenanceReporter {
    worker_id: String,
    queue: Arc<RequestQueue>,
    service: Arc<dyn DeliveryService>,
}

impl MaintenanceReporter {
    pub fn new(
        worker_id: impl Into<String>,
        queue: Arc<RequestQueue>,
        service: Arc<dyn DeliveryService>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue,
            service,
        }
    }

    pub async fn report(&self) -> MaintenanceReport {
        let queue_length = self.queue.len();
        let queue_capacity = self.queue.capacity();
        let utilization = self.queue.utilization();

        tracing::info!(
            worker_id = %self.worker_id,
            queue_length,
            queue_capacity,
            utilization = %format!("{:.2}", utilization),
            "Queue utilization"
        );

        let provider_healthy = match self.service.health_check().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    worker_id = %self.worker_id,
                    error = %e,
                    "Delivery provider health check failed"
                );
                false
            }
        };

        MaintenanceReport {
            queue_length,
            queue_capacity,
            utilization,
            provider_healthy,
        }
    }
}
