use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter};

pub const DEFAULT_NAMESPACE: &str = "default";
pub const NOT_AVAILABLE: &str = "n/a";
pub const UNKNOWN: &str = "unknown";

/// Identity of a workload row; carried by every panel that acts on one workload.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WorkloadRef {
    pub name: String,
    pub namespace: String,
}

impl WorkloadRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl Display for WorkloadRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PhaseClass {
    Running,
    Completed,
    Pending,
    Failed,
    Unknown,
}

impl PhaseClass {
    pub fn classify(status: &str) -> Self {
        if status.contains("Running") {
            Self::Running
        } else if status.contains("Completed") {
            Self::Completed
        } else if status.contains("Pending") {
            Self::Pending
        } else if ["Crash", "Error", "Failed"]
            .iter()
            .any(|marker| status.contains(marker))
        {
            Self::Failed
        } else {
            Self::Unknown
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct WorkloadSummary {
    pub name: String,
    pub status: String,
    pub restarts: u32,
    pub ready: usize,
    pub total: usize,
    pub created_at: Option<DateTime<Utc>>,
    pub ip: Option<String>,
    pub node: Option<String>,
    pub containers: Vec<String>,
}

impl WorkloadSummary {
    pub fn ready_ratio(&self) -> String {
        format!("{}/{}", self.ready, self.total)
    }

    pub fn phase_class(&self) -> PhaseClass {
        PhaseClass::classify(&self.status)
    }

    /// Age relative to `now`; never negative, so repeated renders never go backwards.
    pub fn age(&self, now: DateTime<Utc>) -> String {
        match self.created_at {
            Some(created_at) => format_elapsed_seconds((now - created_at).num_seconds().max(0)),
            None => "Unknown".to_string(),
        }
    }

    pub fn ip_label(&self) -> &str {
        self.ip.as_deref().unwrap_or("N/A")
    }

    pub fn node_label(&self) -> &str {
        self.node.as_deref().unwrap_or("N/A")
    }
}

/// A resource quantity as printed by the CLI, with its parsed integer value when it parses.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Quantity {
    pub raw: String,
    pub value: Option<u64>,
}

impl Quantity {
    pub fn not_available() -> Self {
        Self {
            raw: NOT_AVAILABLE.to_string(),
            value: None,
        }
    }

    pub fn cpu(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            value: parse_cpu_millicores(raw),
        }
    }

    pub fn memory(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            value: parse_memory_bytes(raw),
        }
    }

    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResourceSample {
    pub name: String,
    pub cpu: Quantity,
    pub memory: Quantity,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ClusterIdentity {
    pub context: String,
    pub cluster: String,
    pub namespace: String,
}

impl ClusterIdentity {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            context: UNKNOWN.to_string(),
            cluster: UNKNOWN.to_string(),
            namespace: namespace.into(),
        }
    }

    /// Fields the update could not resolve keep their previous value.
    pub fn merge(&mut self, update: IdentityUpdate) {
        if let Some(context) = update.context {
            self.context = context;
        }
        if let Some(cluster) = update.cluster {
            self.cluster = cluster;
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct IdentityUpdate {
    pub context: Option<String>,
    pub cluster: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Panel {
    List,
    Details(WorkloadRef),
    Logs(WorkloadRef),
    Metrics(WorkloadRef),
    Exec(WorkloadRef),
    NamespaceSelector,
    ContextSelector,
    ConfirmDelete(WorkloadRef),
}

impl Panel {
    pub fn target(&self) -> Option<&WorkloadRef> {
        match self {
            Self::Details(target)
            | Self::Logs(target)
            | Self::Metrics(target)
            | Self::Exec(target)
            | Self::ConfirmDelete(target) => Some(target),
            Self::List | Self::NamespaceSelector | Self::ContextSelector => None,
        }
    }

    /// Selectors and the delete confirmation draw over the list instead of replacing it.
    pub fn is_modal(&self) -> bool {
        matches!(
            self,
            Self::NamespaceSelector | Self::ContextSelector | Self::ConfirmDelete(_)
        )
    }

    pub fn title(&self) -> String {
        match self {
            Self::List => "Pods".to_string(),
            Self::Details(target) => format!("Details {}", target.name),
            Self::Logs(target) => format!("Logs {}", target.name),
            Self::Metrics(target) => format!("Metrics {}", target.name),
            Self::Exec(target) => format!("Exec {}", target.name),
            Self::NamespaceSelector => "Select Namespace".to_string(),
            Self::ContextSelector => "Select Context".to_string(),
            Self::ConfirmDelete(_) => "Confirm Delete".to_string(),
        }
    }
}

pub fn parse_cpu_millicores(value: &str) -> Option<u64> {
    let raw = value.trim();
    let (number, scale) = if let Some(number) = raw.strip_suffix('m') {
        (number, 1.0)
    } else if let Some(number) = raw.strip_suffix('u') {
        (number, 0.001)
    } else if let Some(number) = raw.strip_suffix('n') {
        (number, 0.000_001)
    } else {
        (raw, 1_000.0)
    };
    scaled(number, scale)
}

pub fn parse_memory_bytes(value: &str) -> Option<u64> {
    const UNITS: [(&str, f64); 12] = [
        ("Ei", 1_152_921_504_606_846_976.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ti", 1_099_511_627_776.0),
        ("Gi", 1_073_741_824.0),
        ("Mi", 1_048_576.0),
        ("Ki", 1_024.0),
        ("E", 1e18),
        ("P", 1e15),
        ("T", 1e12),
        ("G", 1e9),
        ("M", 1e6),
        ("K", 1e3),
    ];

    let raw = value.trim();
    for (suffix, scale) in UNITS {
        if let Some(number) = raw.strip_suffix(suffix) {
            return scaled(number, scale);
        }
    }
    scaled(raw, 1.0)
}

fn scaled(number: &str, scale: f64) -> Option<u64> {
    if number.is_empty() {
        return None;
    }
    let value = (number.parse::<f64>().ok()? * scale).round();
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value as u64)
}

pub fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }
    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }
    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }
    format!("{seconds}s")
}

#[cfg(test)]
mod tests {
    use super::{
        ClusterIdentity, IdentityUpdate, PhaseClass, Quantity, WorkloadSummary,
        parse_cpu_millicores, parse_memory_bytes,
    };
    use chrono::{Duration, Utc};

    #[test]
    fn status_strings_map_to_display_classes() {
        assert_eq!(PhaseClass::classify("Running"), PhaseClass::Running);
        assert_eq!(PhaseClass::classify("Completed"), PhaseClass::Completed);
        assert_eq!(PhaseClass::classify("Pending"), PhaseClass::Pending);
        assert_eq!(PhaseClass::classify("CrashLoopBackOff"), PhaseClass::Failed);
        assert_eq!(PhaseClass::classify("ImagePullError"), PhaseClass::Failed);
        assert_eq!(PhaseClass::classify("Failed"), PhaseClass::Failed);
        assert_eq!(PhaseClass::classify("ContainerCreating"), PhaseClass::Unknown);
    }

    #[test]
    fn age_uses_largest_whole_unit() {
        let now = Utc::now();
        let workload = WorkloadSummary {
            created_at: Some(now - Duration::hours(50)),
            ..WorkloadSummary::default()
        };
        assert_eq!(workload.age(now), "2d");

        let fresh = WorkloadSummary {
            created_at: Some(now - Duration::seconds(42)),
            ..WorkloadSummary::default()
        };
        assert_eq!(fresh.age(now), "42s");
    }

    #[test]
    fn age_never_goes_negative_for_future_timestamps() {
        let now = Utc::now();
        let workload = WorkloadSummary {
            created_at: Some(now + Duration::minutes(5)),
            ..WorkloadSummary::default()
        };
        assert_eq!(workload.age(now), "0s");
        assert_eq!(WorkloadSummary::default().age(now), "Unknown");
    }

    #[test]
    fn zero_containers_render_zero_ready_ratio() {
        assert_eq!(WorkloadSummary::default().ready_ratio(), "0/0");
    }

    #[test]
    fn quantities_parse_cli_suffixes() {
        assert_eq!(parse_cpu_millicores("250m"), Some(250));
        assert_eq!(parse_cpu_millicores("2"), Some(2_000));
        assert_eq!(parse_cpu_millicores("3000000n"), Some(3));
        assert_eq!(parse_memory_bytes("5Mi"), Some(5 * 1_048_576));
        assert_eq!(parse_memory_bytes("1G"), Some(1_000_000_000));
        assert_eq!(parse_memory_bytes("n/a"), None);
        assert!(!Quantity::not_available().is_available());
        assert_eq!(Quantity::cpu("10m").value, Some(10));
    }

    #[test]
    fn identity_merge_keeps_fields_that_failed_to_resolve() {
        let mut identity = ClusterIdentity::new("default");
        identity.merge(IdentityUpdate {
            context: Some("kind-dev".to_string()),
            cluster: Some("kind-dev".to_string()),
        });
        identity.merge(IdentityUpdate {
            context: None,
            cluster: Some("prod".to_string()),
        });
        assert_eq!(identity.context, "kind-dev");
        assert_eq!(identity.cluster, "prod");
        assert_eq!(identity.namespace, "default");
    }
}
