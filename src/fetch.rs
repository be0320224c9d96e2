use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::gateway::{CommandGateway, GatewayError, Invocation};
use crate::model::{
    DEFAULT_NAMESPACE, IdentityUpdate, Quantity, ResourceSample, WorkloadRef, WorkloadSummary,
};
use crate::scheduler::{FetchKind, FetchScope};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed {what} output: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed {what} output: {detail}")]
    Shape { what: &'static str, detail: String },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{0:?} fetch has no target workload")]
    NoTarget(FetchKind),
}

#[derive(Debug, Deserialize)]
struct ListDocument<T> {
    #[serde(default)]
    items: Option<Vec<T>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PodItem {
    metadata: ObjectMeta,
    spec: PodSpec,
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ObjectMeta {
    name: Option<String>,
    creation_timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PodSpec {
    node_name: Option<String>,
    containers: Vec<ContainerSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContainerSpec {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PodStatus {
    phase: Option<String>,
    #[serde(rename = "podIP")]
    pod_ip: Option<String>,
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ContainerStatus {
    ready: bool,
    restart_count: u32,
    state: ContainerState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContainerState {
    waiting: Option<WaitingState>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WaitingState {
    reason: Option<String>,
}

impl PodItem {
    fn into_summary(self) -> Result<WorkloadSummary, ParseError> {
        let name = non_empty(self.metadata.name).ok_or_else(|| ParseError::Shape {
            what: "pod list",
            detail: "item without metadata.name".to_string(),
        })?;

        let statuses = &self.status.container_statuses;
        let status = non_empty(self.status.phase.clone())
            .or_else(|| {
                statuses
                    .first()
                    .and_then(|first| first.state.waiting.as_ref())
                    .and_then(|waiting| non_empty(waiting.reason.clone()))
            })
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(WorkloadSummary {
            name,
            status,
            restarts: statuses
                .iter()
                .fold(0u32, |sum, status| sum.saturating_add(status.restart_count)),
            ready: statuses.iter().filter(|status| status.ready).count(),
            total: statuses.len(),
            created_at: self
                .metadata
                .creation_timestamp
                .as_deref()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|created| created.with_timezone(&Utc)),
            ip: non_empty(self.status.pod_ip),
            node: non_empty(self.spec.node_name),
            containers: self
                .spec
                .containers
                .into_iter()
                .map(|container| container.name)
                .collect(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamedItem {
    metadata: ObjectMeta,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// A missing or null `items` is an empty namespace, not a parse failure.
pub fn parse_workloads(raw: &str) -> Result<Vec<WorkloadSummary>, ParseError> {
    let document: ListDocument<PodItem> =
        serde_json::from_str(raw).map_err(|source| ParseError::Json {
            what: "pod list",
            source,
        })?;
    document
        .items
        .unwrap_or_default()
        .into_iter()
        .map(PodItem::into_summary)
        .collect()
}

/// Short rows keep their position, missing fields become `n/a`.
pub fn parse_top(raw: &str) -> Vec<ResourceSample> {
    raw.lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let name = tokens.next()?;
            Some(ResourceSample {
                name: name.to_string(),
                cpu: tokens
                    .next()
                    .map(Quantity::cpu)
                    .unwrap_or_else(Quantity::not_available),
                memory: tokens
                    .next()
                    .map(Quantity::memory)
                    .unwrap_or_else(Quantity::not_available),
            })
        })
        .collect()
}

pub fn parse_pod_sample(raw: &str) -> Option<ResourceSample> {
    let line = raw.lines().find(|line| !line.trim().is_empty())?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    Some(ResourceSample {
        name: tokens[0].to_string(),
        cpu: Quantity::cpu(tokens[1]),
        memory: tokens
            .get(2)
            .map(|raw| Quantity::memory(raw))
            .unwrap_or_else(Quantity::not_available),
    })
}

pub fn parse_namespaces(raw: &str) -> Result<Vec<String>, ParseError> {
    let document: ListDocument<NamedItem> =
        serde_json::from_str(raw).map_err(|source| ParseError::Json {
            what: "namespace list",
            source,
        })?;
    let items = document.items.ok_or_else(|| ParseError::Shape {
        what: "namespace list",
        detail: "missing items".to_string(),
    })?;
    Ok(items
        .into_iter()
        .filter_map(|item| non_empty(item.metadata.name))
        .collect())
}

pub fn parse_contexts(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn indent_lines(raw: &str) -> String {
    raw.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TopSnapshot {
    pub samples: Vec<ResourceSample>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub enum FetchPayload {
    Workloads(Result<Vec<WorkloadSummary>, FetchError>),
    Top(TopSnapshot),
    Identity(IdentityUpdate),
    Namespaces(Result<Vec<String>, FetchError>),
    Contexts(Result<Vec<String>, FetchError>),
    Details(Result<String, FetchError>),
    Metrics(Result<Option<ResourceSample>, FetchError>),
}

pub async fn fetch_workloads(
    gateway: &CommandGateway,
    namespace: &str,
) -> Result<Vec<WorkloadSummary>, FetchError> {
    let output = gateway
        .invoke(&Invocation::GetWorkloads { namespace })
        .await?;
    Ok(parse_workloads(&output.stdout)?)
}

/// Never fails: a broken usage listing becomes an empty snapshot with the error attached.
pub async fn fetch_top(gateway: &CommandGateway, namespace: &str) -> TopSnapshot {
    match gateway
        .invoke(&Invocation::GetResourceUsage { namespace })
        .await
    {
        Ok(output) => TopSnapshot {
            samples: parse_top(&output.stdout),
            error: None,
        },
        Err(error) => {
            debug!(namespace, "resource usage unavailable: {error}");
            TopSnapshot {
                samples: Vec::new(),
                error: Some(error.to_string()),
            }
        }
    }
}

/// Each lookup is best-effort on its own; a failed one leaves its field unresolved.
pub async fn fetch_identity(gateway: &CommandGateway) -> IdentityUpdate {
    let context = match gateway.invoke(&Invocation::GetCurrentContext).await {
        Ok(output) => non_empty(Some(output.stdout.trim().to_string())),
        Err(error) => {
            warn!("current context lookup failed: {error}");
            None
        }
    };
    let cluster = match gateway.invoke(&Invocation::GetCurrentCluster).await {
        Ok(output) => non_empty(Some(output.stdout.replace('\'', "").trim().to_string())),
        Err(error) => {
            warn!("current cluster lookup failed: {error}");
            None
        }
    };
    IdentityUpdate { context, cluster }
}

pub async fn fetch_current_namespace(gateway: &CommandGateway) -> String {
    match gateway.invoke(&Invocation::GetCurrentNamespace).await {
        Ok(output) => output
            .stdout
            .split_whitespace()
            .next()
            .unwrap_or(DEFAULT_NAMESPACE)
            .to_string(),
        Err(error) => {
            debug!("no namespace in kubeconfig, using default: {error}");
            DEFAULT_NAMESPACE.to_string()
        }
    }
}

pub async fn fetch_namespaces(gateway: &CommandGateway) -> Result<Vec<String>, FetchError> {
    let output = gateway.invoke(&Invocation::ListNamespaces).await?;
    Ok(parse_namespaces(&output.stdout)?)
}

pub async fn fetch_contexts(gateway: &CommandGateway) -> Result<Vec<String>, FetchError> {
    let output = gateway.invoke(&Invocation::ListContexts).await?;
    Ok(parse_contexts(&output.stdout))
}

pub async fn fetch_details(
    gateway: &CommandGateway,
    target: &WorkloadRef,
) -> Result<String, FetchError> {
    let output = gateway
        .invoke(&Invocation::GetWorkloadDetail { target })
        .await?;
    Ok(indent_lines(&output.stdout))
}

pub async fn fetch_pod_sample(
    gateway: &CommandGateway,
    target: &WorkloadRef,
) -> Result<Option<ResourceSample>, FetchError> {
    let output = gateway
        .invoke(&Invocation::GetWorkloadUsage { target })
        .await?;
    Ok(parse_pod_sample(&output.stdout))
}

pub async fn fetch_for(
    gateway: &CommandGateway,
    kind: FetchKind,
    scope: &FetchScope,
) -> FetchPayload {
    match kind {
        FetchKind::Workloads => {
            FetchPayload::Workloads(fetch_workloads(gateway, &scope.namespace).await)
        }
        FetchKind::Top => FetchPayload::Top(fetch_top(gateway, &scope.namespace).await),
        FetchKind::Identity => FetchPayload::Identity(fetch_identity(gateway).await),
        FetchKind::Namespaces => FetchPayload::Namespaces(fetch_namespaces(gateway).await),
        FetchKind::Contexts => FetchPayload::Contexts(fetch_contexts(gateway).await),
        FetchKind::Details => FetchPayload::Details(match &scope.target {
            Some(target) => fetch_details(gateway, target).await,
            None => Err(FetchError::NoTarget(kind)),
        }),
        FetchKind::Metrics => FetchPayload::Metrics(match &scope.target {
            Some(target) => fetch_pod_sample(gateway, target).await,
            None => Err(FetchError::NoTarget(kind)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ParseError, fetch_current_namespace, fetch_identity, fetch_top, parse_contexts,
        parse_namespaces, parse_pod_sample, parse_top, parse_workloads,
    };
    use crate::gateway::CommandGateway;
    use crate::model::NOT_AVAILABLE;

    #[test]
    fn running_pod_with_one_ready_container() {
        let raw = r#"{"items":[{"metadata":{"name":"a"},"status":{"phase":"Running","containerStatuses":[{"ready":true}]}}]}"#;
        let pods = parse_workloads(raw).expect("valid list");
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].name, "a");
        assert_eq!(pods[0].status, "Running");
        assert_eq!(pods[0].ready_ratio(), "1/1");
        assert_eq!(pods[0].restarts, 0);
    }

    #[test]
    fn full_pod_fields_are_collected() {
        let raw = r#"{
          "items": [{
            "metadata": {"name": "api-0", "creationTimestamp": "2024-05-01T10:00:00Z"},
            "spec": {"nodeName": "node-1", "containers": [{"name": "api"}, {"name": "sidecar"}]},
            "status": {
              "podIP": "10.0.0.7",
              "containerStatuses": [
                {"ready": true, "restartCount": 2, "state": {"waiting": {"reason": "CrashLoopBackOff"}}},
                {"ready": false, "restartCount": 3}
              ]
            }
          }]
        }"#;
        let pods = parse_workloads(raw).expect("valid list");
        let pod = &pods[0];
        assert_eq!(pod.status, "CrashLoopBackOff");
        assert_eq!(pod.restarts, 5);
        assert_eq!(pod.ready_ratio(), "1/2");
        assert_eq!(pod.ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(pod.node.as_deref(), Some("node-1"));
        assert_eq!(pod.containers, vec!["api", "sidecar"]);
        assert!(pod.created_at.is_some());
    }

    #[test]
    fn pod_without_phase_or_reason_is_unknown() {
        let raw = r#"{"items":[{"metadata":{"name":"b"}}]}"#;
        let pods = parse_workloads(raw).expect("valid list");
        assert_eq!(pods[0].status, "Unknown");
        assert_eq!(pods[0].ready_ratio(), "0/0");
        assert_eq!(pods[0].ip_label(), "N/A");
        assert_eq!(pods[0].node_label(), "N/A");
    }

    #[test]
    fn missing_items_is_an_empty_namespace() {
        assert!(parse_workloads(r#"{"kind":"List"}"#).expect("valid").is_empty());
        assert!(parse_workloads(r#"{"items":null}"#).expect("valid").is_empty());
    }

    #[test]
    fn malformed_listing_is_a_hard_error() {
        assert!(matches!(
            parse_workloads("error: the server doesn't have a resource type"),
            Err(ParseError::Json { .. })
        ));
        assert!(matches!(
            parse_workloads(r#"{"items":[{"metadata":{}}]}"#),
            Err(ParseError::Shape { .. })
        ));
    }

    #[test]
    fn top_rows_keep_alignment_when_short() {
        let samples = parse_top("a 10m 5Mi\nb\nc 3m\n\n");
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].name, "a");
        assert_eq!(samples[0].cpu.raw, "10m");
        assert_eq!(samples[0].memory.raw, "5Mi");
        assert_eq!(samples[1].name, "b");
        assert_eq!(samples[1].cpu.raw, NOT_AVAILABLE);
        assert_eq!(samples[1].memory.raw, NOT_AVAILABLE);
        assert_eq!(samples[2].cpu.value, Some(3));
        assert!(!samples[2].memory.is_available());
    }

    #[test]
    fn pod_sample_needs_name_and_cpu() {
        assert!(parse_pod_sample("a\n").is_none());
        assert!(parse_pod_sample("").is_none());
        let sample = parse_pod_sample("a 120m 300Mi\n").expect("sample");
        assert_eq!(sample.cpu.value, Some(120));
        assert_eq!(sample.memory.value, Some(300 * 1_048_576));
    }

    #[test]
    fn namespaces_and_contexts_are_listed_in_order() {
        let raw = r#"{"items":[{"metadata":{"name":"default"}},{"metadata":{"name":"kube-system"}}]}"#;
        assert_eq!(
            parse_namespaces(raw).expect("valid"),
            vec!["default", "kube-system"]
        );
        assert!(parse_namespaces("{}").is_err());
        assert_eq!(
            parse_contexts("kind-dev\n  prod \n\n"),
            vec!["kind-dev", "prod"]
        );
    }

    #[tokio::test]
    async fn failing_tool_degrades_instead_of_erroring() {
        let gateway = CommandGateway::new("/nonexistent/minipod-kubectl");

        let top = fetch_top(&gateway, "default").await;
        assert!(top.samples.is_empty());
        assert!(top.error.is_some());

        let identity = fetch_identity(&gateway).await;
        assert!(identity.context.is_none());
        assert!(identity.cluster.is_none());

        assert_eq!(fetch_current_namespace(&gateway).await, "default");
    }
}
