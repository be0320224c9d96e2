use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::model::{DEFAULT_NAMESPACE, WorkloadRef};

pub type SessionId = u64;

const READ_CHUNK_BYTES: usize = 4096;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    NonZeroExit {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("no output from {program}: {stderr}")]
    EmptyOutput { program: String, stderr: String },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StreamChunk {
    Stdout(String),
    Stderr(String),
}

/// Every stream yields its chunks in order and then exactly one `Closed`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StreamEvent {
    Chunk {
        session: SessionId,
        chunk: StreamChunk,
    },
    Closed {
        session: SessionId,
        status: Option<String>,
    },
}

impl StreamEvent {
    pub fn session(&self) -> SessionId {
        match self {
            Self::Chunk { session, .. } | Self::Closed { session, .. } => *session,
        }
    }
}

/// The one external command surface the dashboard uses.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Invocation<'a> {
    GetWorkloads { namespace: &'a str },
    GetResourceUsage { namespace: &'a str },
    GetWorkloadUsage { target: &'a WorkloadRef },
    GetWorkloadDetail { target: &'a WorkloadRef },
    StreamLogs { target: &'a WorkloadRef },
    ExecStream {
        target: &'a WorkloadRef,
        shell: &'a str,
        command: &'a str,
    },
    DeleteWorkload { target: &'a WorkloadRef },
    RestartWorkload { target: &'a WorkloadRef },
    GetCurrentContext,
    GetCurrentCluster,
    GetCurrentNamespace,
    UseContext { context: &'a str },
    ListNamespaces,
    ListContexts,
}

impl Invocation<'_> {
    pub fn args(&self) -> Vec<String> {
        let args: Vec<&str> = match self {
            // The default namespace is left implicit so the tool's own default applies.
            Self::GetWorkloads { namespace } => {
                let mut args = vec!["get", "pods"];
                args.extend(namespace_filter(namespace).into_iter().flatten());
                args.extend(["-o", "json"]);
                args
            }
            Self::GetResourceUsage { namespace } => {
                let mut args = vec!["top", "pods"];
                args.extend(namespace_filter(namespace).into_iter().flatten());
                args.push("--no-headers");
                args
            }
            Self::GetWorkloadUsage { target } => vec![
                "top",
                "pod",
                &target.name,
                "-n",
                &target.namespace,
                "--no-headers",
            ],
            Self::GetWorkloadDetail { target } => {
                vec!["describe", "pod", &target.name, "-n", &target.namespace]
            }
            Self::StreamLogs { target } => {
                vec!["logs", "-f", &target.name, "-n", &target.namespace]
            }
            Self::ExecStream {
                target,
                shell,
                command,
            } => vec![
                "exec",
                "-n",
                &target.namespace,
                &target.name,
                "--",
                shell,
                "-c",
                command,
            ],
            Self::DeleteWorkload { target } => {
                vec!["delete", "pod", &target.name, "-n", &target.namespace]
            }
            Self::RestartWorkload { target } => vec![
                "rollout",
                "restart",
                "pod",
                &target.name,
                "-n",
                &target.namespace,
            ],
            Self::GetCurrentContext => vec!["config", "current-context"],
            Self::GetCurrentCluster => vec![
                "config",
                "view",
                "--minify",
                "-o",
                "jsonpath={.clusters[0].name}",
            ],
            Self::GetCurrentNamespace => vec![
                "config",
                "view",
                "--minify",
                "--output",
                "jsonpath={..namespace}",
            ],
            Self::UseContext { context } => vec!["config", "use-context", context],
            Self::ListNamespaces => vec!["get", "ns", "-o", "json"],
            Self::ListContexts => vec!["config", "get-contexts", "-o", "name"],
        };
        args.into_iter().map(str::to_string).collect()
    }
}

fn namespace_filter(namespace: &str) -> Option<[&str; 2]> {
    if namespace.is_empty() || namespace == DEFAULT_NAMESPACE {
        None
    } else {
        Some(["-n", namespace])
    }
}

/// Owner of a live streaming subprocess.
pub trait StreamProcess: Send {
    /// Sends the kill signal without waiting for exit. Repeated calls are no-ops.
    fn terminate(&mut self);
}

#[derive(Debug)]
pub struct StreamHandle {
    session: SessionId,
    kill: Option<oneshot::Sender<()>>,
}

impl StreamProcess for StreamHandle {
    fn terminate(&mut self) {
        if let Some(kill) = self.kill.take() {
            debug!(session = self.session, "terminating stream process");
            let _ = kill.send(());
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[derive(Debug, Clone)]
pub struct CommandGateway {
    program: String,
}

impl CommandGateway {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub async fn invoke(&self, invocation: &Invocation<'_>) -> Result<CommandOutput, GatewayError> {
        self.run_bounded(&invocation.args()).await
    }

    pub async fn run_bounded(&self, args: &[String]) -> Result<CommandOutput, GatewayError> {
        debug!(program = %self.program, ?args, "running bounded command");
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| GatewayError::SpawnFailed {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(GatewayError::NonZeroExit {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: summarize_stderr(&stderr, "no error output"),
            });
        }
        if stdout.trim().is_empty() {
            return Err(GatewayError::EmptyOutput {
                program: self.program.clone(),
                stderr: summarize_stderr(&stderr, "command returned empty"),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }

    /// Spawn failures are reported on the event channel; the returned handle is then inert.
    pub fn run_streaming(
        &self,
        session: SessionId,
        args: &[String],
        events: mpsc::UnboundedSender<StreamEvent>,
    ) -> StreamHandle {
        debug!(program = %self.program, session, ?args, "spawning stream process");
        let spawned = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(error) => {
                warn!(program = %self.program, session, "stream spawn failed: {error}");
                let _ = events.send(StreamEvent::Chunk {
                    session,
                    chunk: StreamChunk::Stderr(format!(
                        "failed to spawn {}: {error}\n",
                        self.program
                    )),
                });
                let _ = events.send(StreamEvent::Closed {
                    session,
                    status: None,
                });
                return StreamHandle {
                    session,
                    kill: None,
                };
            }
        };

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(
                stdout,
                session,
                StreamChunk::Stdout,
                events.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(
                stderr,
                session,
                StreamChunk::Stderr,
                events.clone(),
            ));
        }

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };
            let status = match exited {
                Some(status) => status.ok(),
                None => {
                    let _ = child.start_kill();
                    child.wait().await.ok()
                }
            };
            for reader in readers {
                let _ = reader.await;
            }
            debug!(session, ?status, "stream process closed");
            let _ = events.send(StreamEvent::Closed {
                session,
                status: status.map(|status| status.to_string()),
            });
        });

        StreamHandle {
            session,
            kill: Some(kill_tx),
        }
    }
}

fn spawn_reader<R>(
    mut reader: R,
    session: SessionId,
    wrap: fn(String) -> StreamChunk,
    events: mpsc::UnboundedSender<StreamEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = [0u8; READ_CHUNK_BYTES];
        let mut pending = Vec::new();
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) => break,
                Ok(read) => {
                    pending.extend_from_slice(&buffer[..read]);
                    let text = take_utf8_prefix(&mut pending);
                    if !text.is_empty()
                        && events
                            .send(StreamEvent::Chunk {
                                session,
                                chunk: wrap(text),
                            })
                            .is_err()
                    {
                        return;
                    }
                }
                Err(error) => {
                    warn!(session, "stream read failed: {error}");
                    break;
                }
            }
        }
        if !pending.is_empty() {
            let _ = events.send(StreamEvent::Chunk {
                session,
                chunk: wrap(String::from_utf8_lossy(&pending).into_owned()),
            });
        }
    })
}

/// Drains the decodable prefix, holding back a multi-byte character split across reads.
fn take_utf8_prefix(pending: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(error) if error.error_len().is_none() => error.valid_up_to(),
        Err(_) => pending.len(),
    };
    let rest = pending.split_off(valid);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    text
}

fn summarize_stderr(stderr: &str, fallback: &str) -> String {
    stderr
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        CommandGateway, GatewayError, Invocation, StreamChunk, StreamEvent, StreamProcess,
        take_utf8_prefix,
    };
    use crate::model::WorkloadRef;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn shell(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    async fn collect_until_closed(
        rx: &mut mpsc::UnboundedReceiver<StreamEvent>,
    ) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        loop {
            let event = timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("stream did not close in time")
                .expect("event channel closed");
            let closed = matches!(event, StreamEvent::Closed { .. });
            events.push(event);
            if closed {
                return events;
            }
        }
    }

    #[test]
    fn default_namespace_is_left_implicit() {
        assert_eq!(
            Invocation::GetWorkloads {
                namespace: "default"
            }
            .args(),
            vec!["get", "pods", "-o", "json"]
        );
        assert_eq!(
            Invocation::GetWorkloads {
                namespace: "kube-system"
            }
            .args(),
            vec!["get", "pods", "-n", "kube-system", "-o", "json"]
        );
        assert_eq!(
            Invocation::GetResourceUsage { namespace: "apps" }.args(),
            vec!["top", "pods", "-n", "apps", "--no-headers"]
        );
        assert_eq!(
            Invocation::GetResourceUsage {
                namespace: "default"
            }
            .args(),
            vec!["top", "pods", "--no-headers"]
        );
    }

    #[test]
    fn workload_invocations_always_scope_namespace() {
        let target = WorkloadRef::new("api-0", "default");
        assert_eq!(
            Invocation::StreamLogs { target: &target }.args(),
            vec!["logs", "-f", "api-0", "-n", "default"]
        );
        assert_eq!(
            Invocation::ExecStream {
                target: &target,
                shell: "sh",
                command: "ls -la",
            }
            .args(),
            vec!["exec", "-n", "default", "api-0", "--", "sh", "-c", "ls -la"]
        );
        assert_eq!(
            Invocation::DeleteWorkload { target: &target }.args(),
            vec!["delete", "pod", "api-0", "-n", "default"]
        );
    }

    #[test]
    fn split_multibyte_character_waits_for_next_read() {
        let bytes = "é".as_bytes();
        let mut pending = vec![b'a', bytes[0]];
        assert_eq!(take_utf8_prefix(&mut pending), "a");
        assert_eq!(pending, vec![bytes[0]]);
        pending.push(bytes[1]);
        assert_eq!(take_utf8_prefix(&mut pending), "é");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn bounded_command_collects_stdout() {
        let gateway = CommandGateway::new("sh");
        let output = gateway
            .run_bounded(&shell("printf 'hello'; printf 'warn' >&2"))
            .await
            .expect("command should succeed");
        assert_eq!(output.stdout, "hello");
        assert_eq!(output.stderr, "warn");
    }

    #[tokio::test]
    async fn bounded_command_reports_non_zero_exit() {
        let gateway = CommandGateway::new("sh");
        let error = gateway
            .run_bounded(&shell("echo 'pods is forbidden' >&2; exit 3"))
            .await
            .expect_err("command should fail");
        match error {
            GatewayError::NonZeroExit { stderr, .. } => assert_eq!(stderr, "pods is forbidden"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bounded_command_reports_empty_output() {
        let gateway = CommandGateway::new("sh");
        let error = gateway
            .run_bounded(&shell("true"))
            .await
            .expect_err("empty output is an error");
        assert!(matches!(error, GatewayError::EmptyOutput { .. }));
    }

    #[tokio::test]
    async fn bounded_command_reports_spawn_failure() {
        let gateway = CommandGateway::new("/nonexistent/minipod-test-binary");
        let error = gateway
            .run_bounded(&[])
            .await
            .expect_err("missing binary cannot spawn");
        assert!(matches!(error, GatewayError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn stream_delivers_chunks_then_close() {
        let gateway = CommandGateway::new("sh");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = gateway.run_streaming(7, &shell("echo out; echo err >&2"), tx);

        let events = collect_until_closed(&mut rx).await;
        let mut stdout = String::new();
        let mut stderr = String::new();
        for event in &events {
            assert_eq!(event.session(), 7);
            if let StreamEvent::Chunk { chunk, .. } = event {
                match chunk {
                    StreamChunk::Stdout(text) => stdout.push_str(text),
                    StreamChunk::Stderr(text) => stderr.push_str(text),
                }
            }
        }
        assert_eq!(stdout, "out\n");
        assert_eq!(stderr, "err\n");
        assert!(matches!(events.last(), Some(StreamEvent::Closed { .. })));
    }

    #[tokio::test]
    async fn terminate_kills_long_running_stream_and_is_idempotent() {
        let gateway = CommandGateway::new("sh");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = gateway.run_streaming(1, &shell("exec sleep 30"), tx);

        handle.terminate();
        handle.terminate();

        let events = collect_until_closed(&mut rx).await;
        assert!(matches!(
            events.last(),
            Some(StreamEvent::Closed { session: 1, .. })
        ));
    }

    #[tokio::test]
    async fn stream_spawn_failure_surfaces_as_stderr_then_close() {
        let gateway = CommandGateway::new("/nonexistent/minipod-test-binary");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = gateway.run_streaming(3, &[], tx);
        handle.terminate();

        let events = collect_until_closed(&mut rx).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            StreamEvent::Chunk {
                chunk: StreamChunk::Stderr(_),
                ..
            }
        ));
    }
}
