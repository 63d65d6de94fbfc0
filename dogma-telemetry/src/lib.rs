// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Dogma telemetry: structured logging plus an in-process metrics
//! registry. No exporter is wired up - the OTLP/Prometheus surface that
//! would ship these numbers out of the process is out of scope, but the
//! instrumentation points themselves follow the same `opentelemetry`
//! meter API the rest of the stack is built on.

use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Metrics registry for the commit/query/watch/mirror/replication surface.
pub struct Metrics {
    pub commits_pushed: Counter<u64>,
    pub push_latency_ms: Histogram<f64>,
    pub queries_served: Counter<u64>,
    pub query_latency_ms: Histogram<f64>,
    pub watch_notifications: Counter<u64>,
    pub watch_timeouts: Counter<u64>,
    pub mirror_runs: Counter<u64>,
    pub mirror_failures: Counter<u64>,
    pub replication_commands_applied: Counter<u64>,
}

impl Metrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            commits_pushed: meter
                .u64_counter("dogma.commits.pushed")
                .with_description("Total commits successfully pushed")
                .init(),
            push_latency_ms: meter
                .f64_histogram("dogma.push.latency_ms")
                .with_description("Push latency in milliseconds")
                .init(),
            queries_served: meter
                .u64_counter("dogma.queries.served")
                .with_description("Total query requests served")
                .init(),
            query_latency_ms: meter
                .f64_histogram("dogma.query.latency_ms")
                .with_description("Query latency in milliseconds")
                .init(),
            watch_notifications: meter
                .u64_counter("dogma.watch.notifications")
                .with_description("Total watch notifications delivered")
                .init(),
            watch_timeouts: meter
                .u64_counter("dogma.watch.timeouts")
                .with_description("Total watch requests that timed out without a change")
                .init(),
            mirror_runs: meter
                .u64_counter("dogma.mirror.runs")
                .with_description("Total mirror task runs dispatched")
                .init(),
            mirror_failures: meter
                .u64_counter("dogma.mirror.failures")
                .with_description("Total mirror task runs that failed")
                .init(),
            replication_commands_applied: meter
                .u64_counter("dogma.replication.commands_applied")
                .with_description("Total replication log entries applied by this replica")
                .init(),
        }
    }

    pub fn record_push(&self, repository: &str, latency_ms: f64) {
        let attrs = [KeyValue::new("repository", repository.to_string())];
        self.commits_pushed.add(1, &attrs);
        self.push_latency_ms.record(latency_ms, &attrs);
    }

    pub fn record_query(&self, repository: &str, latency_ms: f64) {
        let attrs = [KeyValue::new("repository", repository.to_string())];
        self.queries_served.add(1, &attrs);
        self.query_latency_ms.record(latency_ms, &attrs);
    }
}

/// Install the process-wide `tracing` subscriber (`RUST_LOG`-driven
/// filter plus a formatted fmt layer) and build an in-process
/// [`Metrics`] registry. Call once, at process startup.
pub fn init_telemetry(_service_name: &str) -> Metrics {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(fmt_layer)
        .init();

    let meter_provider = SdkMeterProvider::default();
    let meter = meter_provider.meter("dogma");
    Metrics::new(&meter)
}

#[macro_export]
macro_rules! instrument_async {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
