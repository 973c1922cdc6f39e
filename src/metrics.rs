//! Prometheus collectors and `tracing` span helpers.
//!
//! Both halves are feature gated: `metrics` pulls in the prometheus registry
//! served on `/metrics`, `tracing` adds spans around pool, query and
//! transaction operations.

#[cfg(feature = "metrics")]
pub use self::prom::{GudangMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prom {
    use once_cell::sync::Lazy;
    use prometheus::{
        Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
    };
    use std::time::Duration;

    pub static METRICS: Lazy<GudangMetrics> = Lazy::new(GudangMetrics::init);

    pub struct GudangMetrics {
        pub registry: Registry,
        pub queries_total: IntCounter,
        pub query_errors_total: IntCounter,
        pub query_duration: Histogram,
        pub pool_wait_duration: Histogram,
        pub transactions_total: IntCounterVec,
        pub http_requests_total: IntCounterVec,
    }

    impl GudangMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();

            let queries_total =
                IntCounter::new("gudang_queries_total", "Total queries executed")
                    .expect("valid metric definition");
            let query_errors_total =
                IntCounter::new("gudang_query_errors_total", "Total queries that failed")
                    .expect("valid metric definition");
            let query_duration = Histogram::with_opts(HistogramOpts::new(
                "gudang_query_duration_seconds",
                "Duration of queries",
            ))
            .expect("valid metric definition");
            let pool_wait_duration = Histogram::with_opts(HistogramOpts::new(
                "gudang_pool_wait_seconds",
                "Time spent waiting for a pooled connection",
            ))
            .expect("valid metric definition");
            let transactions_total = IntCounterVec::new(
                Opts::new("gudang_transactions_total", "Finished transactions by outcome"),
                &["outcome"],
            )
            .expect("valid metric definition");
            let http_requests_total = IntCounterVec::new(
                Opts::new("gudang_http_requests_total", "HTTP responses by status code"),
                &["status"],
            )
            .expect("valid metric definition");

            for collector in [
                Box::new(queries_total.clone()) as Box<dyn prometheus::core::Collector>,
                Box::new(query_errors_total.clone()),
                Box::new(query_duration.clone()),
                Box::new(pool_wait_duration.clone()),
                Box::new(transactions_total.clone()),
                Box::new(http_requests_total.clone()),
            ] {
                registry
                    .register(collector)
                    .expect("metric registered once");
            }

            Self {
                registry,
                queries_total,
                query_errors_total,
                query_duration,
                pool_wait_duration,
                transactions_total,
                http_requests_total,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.inc();
            self.query_duration.observe(elapsed.as_secs_f64());
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.inc();
        }

        pub fn record_pool_wait(&self, waited: Duration) {
            self.pool_wait_duration.observe(waited.as_secs_f64());
        }

        pub fn record_transaction(&self, outcome: &str) {
            self.transactions_total.with_label_values(&[outcome]).inc();
        }

        pub fn record_http_status(&self, status: u16) {
            self.http_requests_total
                .with_label_values(&[status.to_string().as_str()])
                .inc();
        }

        /// Prometheus text exposition of every registered collector.
        pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
            let mut buffer = Vec::new();
            TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
            Ok(buffer)
        }
    }

}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    pub fn connect_span() -> Span {
        tracing::info_span!("db.connect")
    }

    pub fn acquire_connection_span() -> Span {
        tracing::debug_span!("db.pool.acquire")
    }

    pub fn execute_query_span(query: &str) -> Span {
        tracing::debug_span!("db.query", sql = query)
    }

    pub fn begin_transaction_span() -> Span {
        tracing::debug_span!("db.transaction.begin")
    }

    pub fn commit_transaction_span() -> Span {
        tracing::debug_span!("db.transaction.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        tracing::debug_span!("db.transaction.rollback")
    }

}
