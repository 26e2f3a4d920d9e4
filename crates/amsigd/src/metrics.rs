//! Minimal metrics registry for the bridge.
//!
//! Counters and gauges with dynamic labels backed by `DashMap`. Labels are
//! flattened into sorted key vectors to keep deterministic ordering.

use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;

type LabelKey = Vec<(String, String)>;

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn write_sample(out: &mut String, name: &str, key: &LabelKey, value: i128) {
    if key.is_empty() {
        let _ = writeln!(out, "{name} {value}");
        return;
    }
    let labels = key
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    let _ = writeln!(out, "{name}{{{labels}}} {value}");
}

/// Prometheus metric type of a sample computed at scrape time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

/// One unlabeled sample owned by another component, e.g. the connection.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeSample {
    pub name: &'static str,
    pub kind: MetricKind,
    pub value: u64,
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value, zero when the label set was never touched.
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        let mut samples: Vec<_> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        samples.sort();
        for (key, value) in &samples {
            write_sample(out, name, key, i128::from(*value));
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    pub fn set(&self, labels: &[(&str, &str)], v: i64) {
        let gauge = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0));
        gauge.store(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Drops every label set.
    pub fn clear(&self) {
        self.map.clear();
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} gauge");
        let mut samples: Vec<_> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        samples.sort();
        for (key, value) in &samples {
            write_sample(out, name, key, i128::from(*value));
        }
    }
}

#[derive(Default)]
pub struct BridgeMetrics {
    /// Labels: receiver
    pub alerts_received: CounterVec,
    /// Labels: reason (`decode`, `receiver_not_configured`, `send`)
    pub alert_errors: CounterVec,
    /// Labels: kind (`alert`, `reply`, `keepalive`)
    pub messages_sent: CounterVec,
    /// Labels: kind
    pub send_errors: CounterVec,
    /// Labels: name, version
    pub daemon_info: GaugeVec,
    /// Unix seconds of the last correlated keepalive response
    pub keepalive_last_success: GaugeVec,
}

impl BridgeMetrics {
    /// Replaces the daemon identification sample.
    pub fn set_daemon_info(&self, name: &str, version: &str) {
        self.daemon_info.clear();
        self.daemon_info.set(&[("name", name), ("version", version)], 1);
    }

    /// Render all registered metrics plus samples read from their owners at
    /// scrape time.
    pub fn render(&self, extra: &[ScrapeSample]) -> String {
        let mut out = String::new();
        self.alerts_received
            .render("amsig_alerts_received_total", &mut out);
        self.alert_errors.render("amsig_alert_errors_total", &mut out);
        self.messages_sent
            .render("amsig_messages_sent_total", &mut out);
        self.send_errors.render("amsig_send_errors_total", &mut out);
        self.daemon_info.render("amsig_daemon_info", &mut out);
        self.keepalive_last_success
            .render("amsig_keepalive_last_success_timestamp_seconds", &mut out);

        for sample in extra {
            let _ = writeln!(out, "# TYPE {} {}", sample.name, sample.kind.as_str());
            let _ = writeln!(out, "{} {}", sample.name, sample.value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_labels_are_order_independent() {
        let c = CounterVec::default();
        c.inc(&[("a", "1"), ("b", "2")]);
        c.inc(&[("b", "2"), ("a", "1")]);
        assert_eq!(c.get(&[("a", "1"), ("b", "2")]), 2);
    }

    #[test]
    fn test_render_contains_samples() {
        let m = BridgeMetrics::default();
        m.alerts_received.inc(&[("receiver", "ops")]);
        m.set_daemon_info("signald", "0.23.2");

        let out = m.render(&[]);
        assert!(out.contains("amsig_alerts_received_total{receiver=\"ops\"} 1"));
        assert!(out.contains("amsig_daemon_info{name=\"signald\",version=\"0.23.2\"} 1"));
    }

    #[test]
    fn test_scrape_samples_carry_type_lines() {
        let m = BridgeMetrics::default();
        let out = m.render(&[
            ScrapeSample {
                name: "amsig_daemon_connected",
                kind: MetricKind::Gauge,
                value: 1,
            },
            ScrapeSample {
                name: "amsig_daemon_connect_attempts_total",
                kind: MetricKind::Counter,
                value: 3,
            },
        ]);

        assert!(out.contains(
            "# TYPE amsig_daemon_connected gauge\namsig_daemon_connected 1\n"
        ));
        assert!(out.contains(
            "# TYPE amsig_daemon_connect_attempts_total counter\namsig_daemon_connect_attempts_total 3\n"
        ));
        for line in out.lines().filter(|l| !l.starts_with('#')) {
            let name = line.split(['{', ' ']).next().unwrap();
            assert!(
                out.contains(&format!("# TYPE {name} ")),
                "{name} has no TYPE line"
            );
        }
    }

    #[test]
    fn test_daemon_info_replaced() {
        let m = BridgeMetrics::default();
        m.set_daemon_info("signald", "1");
        m.set_daemon_info("signald", "2");
        let out = m.render(&[]);
        assert!(!out.contains("version=\"1\""));
        assert!(out.contains("version=\"2\""));
    }

    #[test]
    fn test_escape_label() {
        assert_eq!(escape_label("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }
}
