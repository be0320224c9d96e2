use tracing::{debug, info};

use crate::gateway::{SessionId, StreamChunk, StreamEvent, StreamProcess};
use crate::model::WorkloadRef;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StreamKind {
    LogTail,
    ExecShell,
}

impl StreamKind {
    fn closed_marker(self) -> &'static str {
        match self {
            Self::LogTail => "--- Logs ended ---",
            Self::ExecShell => "--- Command finished ---",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionState {
    Idle,
    Starting,
    Attached,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LineStyle {
    Plain,
    Error,
    Notice,
    Muted,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OutputLine {
    pub text: String,
    pub style: LineStyle,
}

/// Append-only line buffer fed by stream chunks, which may split lines anywhere.
#[derive(Debug, Default, Clone)]
pub struct OutputSink {
    lines: Vec<OutputLine>,
    open: bool,
}

impl OutputSink {
    pub fn append(&mut self, text: &str, style: LineStyle) {
        let mut segments = text.split('\n').peekable();
        while let Some(segment) = segments.next() {
            let terminated = segments.peek().is_some();
            let segment = if terminated {
                segment.trim_end_matches('\r')
            } else {
                segment
            };
            if !segment.is_empty() || terminated {
                self.extend_open_line(segment, style);
            }
            if terminated {
                self.open = false;
            }
        }
    }

    fn extend_open_line(&mut self, segment: &str, style: LineStyle) {
        match self.lines.last_mut() {
            Some(last) if self.open && last.style == style => last.text.push_str(segment),
            _ => self.lines.push(OutputLine {
                text: segment.to_string(),
                style,
            }),
        }
        self.open = true;
    }

    pub fn push_line(&mut self, text: impl Into<String>, style: LineStyle) {
        self.lines.push(OutputLine {
            text: text.into(),
            style,
        });
        self.open = false;
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.open = false;
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CommandSubmission {
    /// Empty input: the session was torn down without spawning anything.
    Abort,
    Spawn { session: SessionId, command: String },
    Rejected,
}

struct ActiveSession {
    id: SessionId,
    kind: StreamKind,
    target: WorkloadRef,
    state: SessionState,
    process: Option<Box<dyn StreamProcess>>,
    awaiting_command: bool,
}

/// Owns the single streaming subprocess slot. Starting a session always tears down the previous one.
pub struct SessionManager {
    active: Option<ActiveSession>,
    next_id: SessionId,
    sink: OutputSink,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            active: None,
            next_id: 1,
            sink: OutputSink::default(),
        }
    }

    pub fn start(&mut self, kind: StreamKind, target: WorkloadRef) -> SessionId {
        self.stop();

        let id = self.next_id;
        self.next_id += 1;
        self.sink.clear();
        let header = match kind {
            StreamKind::LogTail => {
                format!("Attaching logs for {}... (Ctrl+C to stop)", target.name)
            }
            StreamKind::ExecShell => format!("Enter a command to execute in pod {}", target.name),
        };
        self.sink.push_line(header, LineStyle::Notice);

        info!(session = id, ?kind, target = %target, "starting stream session");
        self.active = Some(ActiveSession {
            id,
            kind,
            target,
            state: SessionState::Starting,
            process: None,
            awaiting_command: kind == StreamKind::ExecShell,
        });
        id
    }

    /// One command per attachment cycle.
    pub fn submit_command(&mut self, line: &str) -> CommandSubmission {
        let command = line.trim();
        let Some(active) = self.active.as_mut().filter(|active| active.awaiting_command) else {
            return CommandSubmission::Rejected;
        };
        if command.is_empty() {
            debug!(session = active.id, "empty exec submission, aborting");
            self.stop();
            return CommandSubmission::Abort;
        }

        active.awaiting_command = false;
        let session = active.id;
        self.sink.push_line(format!("$ {command}"), LineStyle::Notice);
        CommandSubmission::Spawn {
            session,
            command: command.to_string(),
        }
    }

    /// Returns false, after terminating the process, when the session was abandoned meanwhile.
    pub fn attach(&mut self, session: SessionId, mut process: Box<dyn StreamProcess>) -> bool {
        match self.active.as_mut() {
            Some(active) if active.id == session && active.state == SessionState::Starting => {
                active.process = Some(process);
                active.state = SessionState::Attached;
                true
            }
            _ => {
                debug!(session, "terminating process for abandoned session");
                process.terminate();
                false
            }
        }
    }

    pub fn on_event(&mut self, event: StreamEvent) -> bool {
        let Some(active) = self
            .active
            .as_mut()
            .filter(|active| active.id == event.session())
        else {
            debug!(session = event.session(), "dropping output of stale session");
            return false;
        };

        match event {
            StreamEvent::Chunk { chunk, .. } => match chunk {
                StreamChunk::Stdout(text) => self.sink.append(&text, LineStyle::Plain),
                StreamChunk::Stderr(text) => self.sink.append(&text, LineStyle::Error),
            },
            StreamEvent::Closed { status, .. } => {
                info!(session = active.id, ?status, "stream session closed");
                active.process = None;
                active.state = SessionState::Idle;
                self.sink
                    .push_line(active.kind.closed_marker(), LineStyle::Muted);
            }
        }
        true
    }

    /// Safe to call repeatedly.
    pub fn stop(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };
        if let Some(mut process) = active.process.take() {
            process.terminate();
        }
        info!(session = active.id, target = %active.target, "stream session stopped");
        true
    }

    pub fn state(&self) -> SessionState {
        self.active
            .as_ref()
            .map_or(SessionState::Idle, |active| active.state)
    }

    pub fn kind(&self) -> Option<StreamKind> {
        self.active.as_ref().map(|active| active.kind)
    }

    pub fn target(&self) -> Option<&WorkloadRef> {
        self.active.as_ref().map(|active| &active.target)
    }

    pub fn has_live_process(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.process.is_some())
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }
}
