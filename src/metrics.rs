//! prometheus meters for the webhook receiver

use prometheus::{
    exponential_buckets, histogram_opts, opts, HistogramTimer, HistogramVec, IntCounterVec,
    Registry,
};

#[derive(Debug, Clone)]
pub struct Metrics {
    /// handled webhook requests by profile and returned status code
    requests: IntCounterVec,
    /// duration of the POST to the robot webhook
    delivery_duration: HistogramVec,
}

impl Metrics {
    /// construct meters and register them at `registry`
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests = IntCounterVec::new(
            opts!("requests_total", "total number of handled webhook requests")
                .namespace("dinghook")
                .subsystem("alertmanager_webhook"),
            &["profile", "status"],
        )?;

        let delivery_duration = HistogramVec::new(
            histogram_opts!(
                "delivery_duration_seconds",
                "time spent sending a notification to dingtalk",
                exponential_buckets(0.01, 2., 12)?
            )
            .namespace("dinghook")
            .subsystem("dingtalk"),
            &["profile"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(delivery_duration.clone()))?;

        Ok(Self {
            requests,
            delivery_duration,
        })
    }

    pub fn record_request(&self, profile: &str, status: u16) {
        self.requests
            .with_label_values(&[profile, &status.to_string()])
            .inc();
    }

    /// observes the delivery duration once the timer is dropped
    pub fn delivery_timer(&self, profile: &str) -> HistogramTimer {
        self.delivery_duration
            .with_label_values(&[profile])
            .start_timer()
    }

    #[cfg(test)]
    pub fn requests(&self, profile: &str, status: u16) -> u64 {
        self.requests
            .with_label_values(&[profile, &status.to_string()])
            .get()
    }
}
