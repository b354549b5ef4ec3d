//! Metric family metadata.
//!
//! A [`Family`] describes one exposed metric: its exposition name, help
//! text, type, the raw source field it is resolved from, and an optional
//! transform applied to the raw value. The tables are immutable statics;
//! per-request values never live on the descriptors themselves.

/// Exposition metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// A static metric family descriptor.
#[derive(Debug)]
pub struct Family {
    pub key: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    /// Name of the raw source field this family is resolved from.
    pub source: &'static str,
    /// Optional transform applied to the raw value before emission. A
    /// transform may map a raw value to "no value present".
    pub transform: Option<fn(u64) -> Option<f64>>,
}

impl Family {
    /// Resolves the family's exposition value from a raw reading.
    pub fn resolve(&self, raw: Option<u64>) -> Option<f64> {
        match self.transform {
            Some(transform) => raw.and_then(transform),
            None => raw.map(|raw| raw as f64),
        }
    }
}

/// The kernel reports load averages as fixed-point values scaled by 256.
fn fixed_point_load(raw: u64) -> Option<f64> {
    Some(raw as f64 / 256.0)
}

/// An unlimited resource cap is reported as `u64::MAX`; mask it rather than
/// exposing the sentinel as a reading.
fn masked_cap(raw: u64) -> Option<f64> {
    if raw == u64::MAX {
        None
    } else {
        Some(raw as f64)
    }
}

pub static KERNEL_FAMILIES: &[Family] = &[
    Family {
        key: "cpu_agg_usage",
        help: "Aggregate CPU usage in nanoseconds",
        kind: MetricKind::Counter,
        source: "nsec_user",
        transform: None,
    },
    Family {
        key: "cpu_wait_time",
        help: "Aggregate CPU wait time in nanoseconds",
        kind: MetricKind::Counter,
        source: "nsec_waitrq",
        transform: None,
    },
    Family {
        key: "load_average",
        help: "One minute load average",
        kind: MetricKind::Gauge,
        source: "avenrun_1min",
        transform: Some(fixed_point_load),
    },
    Family {
        key: "mem_agg_usage",
        help: "Aggregate memory usage in bytes",
        kind: MetricKind::Gauge,
        source: "rss",
        transform: None,
    },
    Family {
        key: "mem_limit",
        help: "Memory limit in bytes",
        kind: MetricKind::Gauge,
        source: "physcap",
        transform: Some(masked_cap),
    },
    Family {
        key: "mem_swap",
        help: "Swap used in bytes",
        kind: MetricKind::Gauge,
        source: "swap",
        transform: None,
    },
    Family {
        key: "mem_swap_limit",
        help: "Swap limit in bytes",
        kind: MetricKind::Gauge,
        source: "swapcap",
        transform: Some(masked_cap),
    },
    Family {
        key: "net_agg_packets_in",
        help: "Aggregate inbound packets",
        kind: MetricKind::Counter,
        source: "ipackets64",
        transform: None,
    },
    Family {
        key: "net_agg_packets_out",
        help: "Aggregate outbound packets",
        kind: MetricKind::Counter,
        source: "opackets64",
        transform: None,
    },
    Family {
        key: "net_agg_bytes_in",
        help: "Aggregate inbound bytes",
        kind: MetricKind::Counter,
        source: "rbytes64",
        transform: None,
    },
    Family {
        key: "net_agg_bytes_out",
        help: "Aggregate outbound bytes",
        kind: MetricKind::Counter,
        source: "obytes64",
        transform: None,
    },
];

pub static FILESYSTEM_FAMILIES: &[Family] = &[
    Family {
        key: "zfs_used",
        help: "zfs space used in bytes",
        kind: MetricKind::Gauge,
        source: "used",
        transform: None,
    },
    Family {
        key: "zfs_available",
        help: "zfs space available in bytes",
        kind: MetricKind::Gauge,
        source: "available",
        transform: None,
    },
];

pub static TIME_FAMILIES: &[Family] = &[Family {
    key: "time_of_day",
    help: "System time in milliseconds since epoch",
    kind: MetricKind::Counter,
    source: "now",
    transform: None,
}];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_without_transform() {
        let family = &KERNEL_FAMILIES[0];
        assert_eq!(family.resolve(Some(1000)), Some(1000.0));
        assert_eq!(family.resolve(None), None);
    }

    #[test]
    fn test_fixed_point_load_transform() {
        let family = KERNEL_FAMILIES
            .iter()
            .find(|f| f.key == "load_average")
            .unwrap();
        assert_eq!(family.resolve(Some(1004)), Some(3.921875));
    }

    #[test]
    fn test_masked_cap_transform() {
        let family = KERNEL_FAMILIES.iter().find(|f| f.key == "mem_limit").unwrap();
        assert_eq!(family.resolve(Some(u64::MAX)), None);
        assert_eq!(family.resolve(Some(1_073_741_824)), Some(1_073_741_824.0));
    }

    #[test]
    fn test_family_keys_are_unique() {
        let mut keys: Vec<&str> = KERNEL_FAMILIES
            .iter()
            .chain(FILESYSTEM_FAMILIES)
            .chain(TIME_FAMILIES)
            .map(|f| f.key)
            .collect();
        let total = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }
}
