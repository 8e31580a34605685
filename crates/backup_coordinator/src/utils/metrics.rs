//! Prometheus metrics collection

use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, HistogramVec, IntCounter, IntGauge,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub struct Metrics {
    pub backups_total: CounterVec,
    pub restores_total: CounterVec,
    pub operation_duration: HistogramVec,
    pub scheduled_failures_total: IntCounter,
    pub schedule_active: IntGauge,
    pub errors_total: CounterVec,
}

impl Metrics {
    pub fn init() -> &'static Self {
        METRICS.get_or_init(|| Metrics {
            backups_total: register_counter_vec!(
                "backup_create_total",
                "Total number of backup runs",
                &["outcome", "trigger"]
            )
            .unwrap(),
            restores_total: register_counter_vec!(
                "backup_restore_total",
                "Total number of restore runs",
                &["outcome"]
            )
            .unwrap(),
            operation_duration: register_histogram_vec!(
                "backup_operation_duration_seconds",
                "Duration of dump+upload and download+restore pipelines",
                &["operation"],
                vec![1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0]
            )
            .unwrap(),
            scheduled_failures_total: register_int_counter!(
                "backup_scheduled_failures_total",
                "Scheduled backup runs that failed"
            )
            .unwrap(),
            schedule_active: register_int_gauge!(
                "backup_schedule_active",
                "1 when a recurring backup schedule is armed"
            )
            .unwrap(),
            errors_total: register_counter_vec!(
                "backup_errors_total",
                "Total number of errors by kind",
                &["type"]
            )
            .unwrap(),
        })
    }

    pub fn record_backup(&self, outcome: &str, trigger: &str, duration_secs: f64) {
        self.backups_total.with_label_values(&[outcome, trigger]).inc();
        self.operation_duration
            .with_label_values(&["backup"])
            .observe(duration_secs);
    }

    pub fn record_restore(&self, outcome: &str, duration_secs: f64) {
        self.restores_total.with_label_values(&[outcome]).inc();
        self.operation_duration
            .with_label_values(&["restore"])
            .observe(duration_secs);
    }

    pub fn record_scheduled_failure(&self) {
        self.scheduled_failures_total.inc();
    }

    pub fn set_schedule_active(&self, active: bool) {
        self.schedule_active.set(i64::from(active));
    }

    pub fn record_error(&self, error_type: &str) {
        self.errors_total.with_label_values(&[error_type]).inc();
    }
}

pub fn get_metrics() -> &'static Metrics {
    Metrics::init()
}
