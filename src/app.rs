use crate::fetch::{FetchError, FetchPayload, TopSnapshot};
use crate::gateway::{Invocation, SessionId, StreamEvent, StreamProcess};
use crate::input::Action;
use crate::model::{ClusterIdentity, Panel, ResourceSample, WorkloadRef, WorkloadSummary};
use crate::scheduler::{
    Completion, FetchKind, FetchPhase, FetchScope, FetchTicket, RefreshScheduler,
};
use crate::session::{CommandSubmission, SessionManager, StreamKind};
use chrono::{DateTime, Local};
use tracing::{debug, info};

const REFRESHING_STATUS: &str = "refreshing pods...";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Normal,
    Prompt,
    Confirm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    Fetch(Vec<FetchTicket>),
    SpawnStream {
        session: SessionId,
        args: Vec<String>,
    },
    DeleteWorkload {
        target: WorkloadRef,
    },
    RestartWorkload {
        target: WorkloadRef,
    },
    SwitchContext {
        context: String,
    },
}

/// Completion of a side-effecting command; errors are already summarized for the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Deleted {
        target: WorkloadRef,
        result: Result<(), String>,
    },
    Restarted {
        target: WorkloadRef,
        result: Result<(), String>,
    },
    ContextSwitched {
        context: String,
        result: Result<(), String>,
    },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DetailsView {
    Loading,
    Ready(String),
    Failed(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TopView {
    Loading,
    Samples(Vec<ResourceSample>),
    Unavailable,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MetricsView {
    Loading,
    Sample {
        sample: ResourceSample,
        updated: DateTime<Local>,
    },
    Unavailable,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SelectorState {
    pub items: Vec<String>,
    pub selected: usize,
    pub loading: bool,
    pub error: Option<String>,
}

impl SelectorState {
    fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    fn load(&mut self, items: Vec<String>, current: &str) {
        self.selected = items.iter().position(|item| item == current).unwrap_or(0);
        self.items = items;
        self.loading = false;
        self.error = None;
    }

    fn move_by(&mut self, delta: isize) {
        let last = self.items.len().saturating_sub(1) as isize;
        self.selected = (self.selected as isize + delta).clamp(0, last) as usize;
    }

    fn chosen(&self) -> Option<&str> {
        self.items.get(self.selected).map(String::as_str)
    }
}

pub struct App {
    running: bool,
    mode: InputMode,
    panel: Panel,
    previous: Option<Panel>,
    identity: ClusterIdentity,
    workloads: Vec<WorkloadSummary>,
    selected: usize,
    list_error: Option<String>,
    last_refresh: Option<DateTime<Local>>,
    top: TopView,
    details: DetailsView,
    metrics: MetricsView,
    selector: SelectorState,
    input: String,
    status: String,
    scroll: u16,
    follow: bool,
    view_width: u16,
    view_height: u16,
    scheduler: RefreshScheduler,
    session: SessionManager,
    exec_shell: String,
    top_rows: usize,
    dirty: bool,
}

impl App {
    pub fn new(identity: ClusterIdentity, exec_shell: impl Into<String>, top_rows: usize) -> Self {
        Self {
            running: true,
            mode: InputMode::Normal,
            panel: Panel::List,
            previous: None,
            identity,
            workloads: Vec::new(),
            selected: 0,
            list_error: None,
            last_refresh: None,
            top: TopView::Loading,
            details: DetailsView::Loading,
            metrics: MetricsView::Loading,
            selector: SelectorState::default(),
            input: String::new(),
            status: String::new(),
            scroll: 0,
            follow: false,
            view_width: 80,
            view_height: 20,
            scheduler: RefreshScheduler::new(),
            session: SessionManager::new(),
            exec_shell: exec_shell.into(),
            top_rows: top_rows.max(1),
            dirty: true,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn identity(&self) -> &ClusterIdentity {
        &self.identity
    }

    pub fn workloads(&self) -> &[WorkloadSummary] {
        &self.workloads
    }

    /// Row index into the list including its header row at 0.
    pub fn selected_row(&self) -> usize {
        self.selected
    }

    pub fn list_error(&self) -> Option<&str> {
        self.list_error.as_deref()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Local>> {
        self.last_refresh
    }

    pub fn top(&self) -> &TopView {
        &self.top
    }

    pub fn top_rows(&self) -> usize {
        self.top_rows
    }

    pub fn details(&self) -> &DetailsView {
        &self.details
    }

    pub fn metrics(&self) -> &MetricsView {
        &self.metrics
    }

    pub fn selector(&self) -> &SelectorState {
        &self.selector
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn refreshing(&self) -> bool {
        self.scheduler.phase(FetchKind::Workloads) == FetchPhase::InFlight
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = normalize_status_text(status.into());
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Consumes the pending redraw request.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn set_viewport(&mut self, width: u16, height: u16) {
        self.view_width = width.max(1);
        self.view_height = height.max(1);
    }

    pub fn bootstrap(&mut self) -> AppCommand {
        self.set_status(REFRESHING_STATUS);
        self.immediate_refresh()
    }

    pub fn periodic_refresh(&mut self) -> AppCommand {
        let tickets = [FetchKind::Workloads, FetchKind::Top, FetchKind::Identity]
            .into_iter()
            .filter_map(|kind| {
                let scope = self.current_scope(kind);
                self.scheduler.trigger_periodic(kind, scope)
            })
            .collect::<Vec<_>>();
        fetch_command(tickets)
    }

    pub fn metrics_tick(&mut self) -> AppCommand {
        if !matches!(self.panel, Panel::Metrics(_)) {
            return AppCommand::None;
        }
        let scope = self.current_scope(FetchKind::Metrics);
        fetch_command(
            self.scheduler
                .trigger_periodic(FetchKind::Metrics, scope)
                .into_iter()
                .collect(),
        )
    }

    pub fn shutdown(&mut self) {
        self.session.stop();
        self.running = false;
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        self.dirty = true;

        if action == Action::Interrupt {
            info!("interrupt received, exiting");
            self.shutdown();
            return AppCommand::None;
        }

        match self.mode {
            InputMode::Confirm => return self.apply_confirmation(action),
            InputMode::Prompt => return self.apply_prompt(action),
            InputMode::Normal => {}
        }

        match self.panel.clone() {
            Panel::List => self.apply_list_action(action),
            Panel::Details(target) => match action {
                Action::Logs => self.start_logs(target.clone(), Panel::Details(target)),
                Action::Quit | Action::Back => self.go_back(),
                other => self.apply_scroll(other),
            },
            Panel::Logs(_) | Panel::Exec(_) => match action {
                Action::Quit | Action::Back => {
                    self.session.stop();
                    self.go_back()
                }
                other => self.apply_scroll(other),
            },
            Panel::Metrics(_) => match action {
                Action::Quit | Action::Back => self.go_back(),
                _ => AppCommand::None,
            },
            Panel::NamespaceSelector | Panel::ContextSelector => self.apply_selector_action(action),
            // Confirmation panels always run in confirm mode.
            Panel::ConfirmDelete(_) => AppCommand::None,
        }
    }

    fn apply_list_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Quit => {
                info!("quit requested from pod list");
                self.shutdown();
                AppCommand::None
            }
            Action::Up => self.move_selection(-1),
            Action::Down => self.move_selection(1),
            Action::PageUp => self.move_selection(-self.page_step()),
            Action::PageDown => self.move_selection(self.page_step()),
            Action::Top => self.move_selection(-(self.workloads.len() as isize)),
            Action::Bottom => self.move_selection(self.workloads.len() as isize),
            Action::Refresh => {
                self.set_status(REFRESHING_STATUS);
                self.immediate_refresh()
            }
            Action::Namespaces => {
                self.open_secondary(Panel::NamespaceSelector);
                self.selector = SelectorState::loading();
                self.fetch_now(FetchKind::Namespaces)
            }
            Action::Contexts => {
                self.open_secondary(Panel::ContextSelector);
                self.selector = SelectorState::loading();
                self.fetch_now(FetchKind::Contexts)
            }
            Action::Open | Action::Logs | Action::Metrics | Action::Exec | Action::Delete
            | Action::Restart => {
                let Some(target) = self.selected_target() else {
                    debug!(row = self.selected, ?action, "no workload at selected row");
                    return AppCommand::None;
                };
                self.act_on_workload(action, target)
            }
            _ => AppCommand::None,
        }
    }

    fn act_on_workload(&mut self, action: Action, target: WorkloadRef) -> AppCommand {
        match action {
            Action::Open => {
                self.set_status(format!("details: {}", target.name));
                self.open_secondary(Panel::Details(target));
                self.details = DetailsView::Loading;
                self.fetch_now(FetchKind::Details)
            }
            Action::Logs => self.start_logs(target, Panel::List),
            Action::Metrics => {
                self.open_secondary(Panel::Metrics(target));
                self.metrics = MetricsView::Loading;
                self.fetch_now(FetchKind::Metrics)
            }
            Action::Exec => {
                self.session.start(StreamKind::ExecShell, target.clone());
                self.open_secondary(Panel::Exec(target));
                self.mode = InputMode::Prompt;
                self.input.clear();
                self.follow = true;
                AppCommand::None
            }
            Action::Delete => {
                self.open_secondary(Panel::ConfirmDelete(target));
                self.mode = InputMode::Confirm;
                AppCommand::None
            }
            Action::Restart => {
                self.set_status(format!("restarting pod {}...", target.name));
                AppCommand::RestartWorkload { target }
            }
            _ => AppCommand::None,
        }
    }

    fn start_logs(&mut self, target: WorkloadRef, from: Panel) -> AppCommand {
        let session = self.session.start(StreamKind::LogTail, target.clone());
        let args = Invocation::StreamLogs { target: &target }.args();
        self.set_status(format!("logs: {}", target.name));
        self.panel = Panel::Logs(target);
        self.previous = Some(from);
        self.scroll = 0;
        self.follow = true;
        AppCommand::SpawnStream { session, args }
    }

    fn apply_confirmation(&mut self, action: Action) -> AppCommand {
        let Panel::ConfirmDelete(target) = self.panel.clone() else {
            self.mode = InputMode::Normal;
            return AppCommand::None;
        };
        self.close_to_list();
        if action == Action::ConfirmYes {
            self.set_status(format!("deleting pod {}...", target.name));
            AppCommand::DeleteWorkload { target }
        } else {
            self.set_status("delete cancelled");
            AppCommand::None
        }
    }

    fn apply_prompt(&mut self, action: Action) -> AppCommand {
        match action {
            Action::InputChar(c) => {
                self.input.push(c);
                AppCommand::None
            }
            Action::Backspace => {
                self.input.pop();
                AppCommand::None
            }
            Action::SubmitInput => {
                let line = std::mem::take(&mut self.input);
                self.submit_exec(&line)
            }
            Action::CancelInput => {
                self.input.clear();
                self.submit_exec("")
            }
            _ => AppCommand::None,
        }
    }

    fn submit_exec(&mut self, line: &str) -> AppCommand {
        self.mode = InputMode::Normal;
        match self.session.submit_command(line) {
            CommandSubmission::Abort => self.go_back(),
            CommandSubmission::Spawn { session, command } => {
                let Some(target) = self.panel.target().cloned() else {
                    self.session.stop();
                    return self.go_back();
                };
                let args = Invocation::ExecStream {
                    target: &target,
                    shell: &self.exec_shell,
                    command: &command,
                }
                .args();
                self.follow = true;
                AppCommand::SpawnStream { session, args }
            }
            CommandSubmission::Rejected => AppCommand::None,
        }
    }

    fn apply_selector_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Quit | Action::Back => {
                self.close_to_list();
                AppCommand::None
            }
            Action::Up => {
                self.selector.move_by(-1);
                AppCommand::None
            }
            Action::Down => {
                self.selector.move_by(1);
                AppCommand::None
            }
            Action::PageUp => {
                self.selector.move_by(-self.page_step());
                AppCommand::None
            }
            Action::PageDown => {
                self.selector.move_by(self.page_step());
                AppCommand::None
            }
            Action::Top => {
                self.selector.selected = 0;
                AppCommand::None
            }
            Action::Bottom => {
                self.selector.selected = self.selector.items.len().saturating_sub(1);
                AppCommand::None
            }
            Action::Open => self.choose_selector_item(),
            _ => AppCommand::None,
        }
    }

    fn choose_selector_item(&mut self) -> AppCommand {
        let Some(choice) = self.selector.chosen().map(str::to_string) else {
            return AppCommand::None;
        };
        let panel = self.panel.clone();
        self.close_to_list();

        match panel {
            Panel::NamespaceSelector if choice != self.identity.namespace => {
                info!(namespace = %choice, "switching namespace");
                self.identity.namespace = choice;
                self.workloads.clear();
                self.selected = 0;
                self.list_error = None;
                self.top = TopView::Loading;
                self.set_status(format!("namespace switched to {}", self.identity.namespace));
                self.immediate_refresh()
            }
            Panel::ContextSelector if choice != self.identity.context => {
                self.set_status(format!("switching to context {choice}..."));
                AppCommand::SwitchContext { context: choice }
            }
            _ => AppCommand::None,
        }
    }

    fn apply_scroll(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Up => self.scroll_body(-1),
            Action::Down => self.scroll_body(1),
            Action::PageUp => self.scroll_body(-self.page_step()),
            Action::PageDown => self.scroll_body(self.page_step()),
            Action::Top => {
                self.scroll = 0;
                self.follow = false;
            }
            Action::Bottom => {
                self.scroll = self.max_scroll();
                self.follow = self.is_stream_panel();
            }
            _ => {}
        }
        AppCommand::None
    }

    pub fn apply_fetch(&mut self, ticket: FetchTicket, payload: FetchPayload) -> AppCommand {
        let current = self.current_scope(ticket.kind);
        if self.scheduler.complete(&ticket, &current) == Completion::Stale {
            return AppCommand::None;
        }
        self.dirty = true;

        match payload {
            FetchPayload::Workloads(Ok(workloads)) => self.replace_workloads(workloads),
            FetchPayload::Workloads(Err(error)) => {
                let summary = summarize_error(&error);
                self.set_status(format!("pod refresh failed: {summary}"));
                self.list_error = Some(summary);
            }
            FetchPayload::Top(snapshot) => self.apply_top(snapshot),
            FetchPayload::Identity(update) => self.identity.merge(update),
            FetchPayload::Namespaces(result) => {
                let current = self.identity.namespace.clone();
                self.apply_selector_items(result, &current);
            }
            FetchPayload::Contexts(result) => {
                let current = self.identity.context.clone();
                self.apply_selector_items(result, &current);
            }
            FetchPayload::Details(Ok(text)) => self.details = DetailsView::Ready(text),
            FetchPayload::Details(Err(error)) => {
                let summary = summarize_error(&error);
                self.set_status(format!("details failed: {summary}"));
                self.details = DetailsView::Failed(error.to_string());
            }
            FetchPayload::Metrics(Ok(Some(sample))) => {
                self.metrics = MetricsView::Sample {
                    sample,
                    updated: Local::now(),
                };
            }
            FetchPayload::Metrics(Ok(None)) => self.metrics = MetricsView::Unavailable,
            FetchPayload::Metrics(Err(error)) => {
                debug!("metrics unavailable: {error}");
                self.metrics = MetricsView::Unavailable;
            }
        }
        AppCommand::None
    }

    fn replace_workloads(&mut self, workloads: Vec<WorkloadSummary>) {
        let selected_name = self.selected_workload().map(|workload| workload.name.clone());
        let fallback = self.selected;
        self.workloads = workloads;
        self.last_refresh = Some(Local::now());

        let len = self.workloads.len();
        self.selected = selected_name
            .and_then(|name| {
                self.workloads
                    .iter()
                    .position(|workload| workload.name == name)
            })
            .map(|index| index + 1)
            .unwrap_or_else(|| if len == 0 { 0 } else { fallback.clamp(1, len) });

        if self.status == REFRESHING_STATUS || self.list_error.take().is_some() {
            self.set_status(format!("pods: {len}"));
        }
    }

    fn apply_top(&mut self, snapshot: TopSnapshot) {
        self.top = match snapshot.error {
            Some(error) => {
                debug!("top unavailable: {}", summarize_error_line(&error));
                TopView::Unavailable
            }
            None if snapshot.samples.is_empty() => TopView::Unavailable,
            None => TopView::Samples(snapshot.samples),
        };
    }

    fn apply_selector_items(&mut self, result: Result<Vec<String>, FetchError>, current: &str) {
        match result {
            Ok(items) => self.selector.load(items, current),
            Err(error) => {
                let summary = summarize_error(&error);
                self.set_status(format!("listing failed: {summary}"));
                self.selector.loading = false;
                self.selector.error = Some(summary);
            }
        }
    }

    pub fn attach_stream(&mut self, session: SessionId, process: Box<dyn StreamProcess>) {
        if !self.session.attach(session, process) {
            debug!(session, "stream spawned for an abandoned session");
        }
    }

    pub fn apply_stream_event(&mut self, event: StreamEvent) {
        if self.session.on_event(event) {
            self.dirty = true;
        }
    }

    pub fn apply_action_outcome(&mut self, outcome: ActionOutcome) -> AppCommand {
        self.dirty = true;
        match outcome {
            ActionOutcome::Deleted { target, result } => match result {
                Ok(()) => {
                    info!(target = %target, "pod deleted");
                    self.set_status(format!("pod {} deleted", target.name));
                    self.immediate_refresh()
                }
                Err(error) => {
                    self.set_status(format!("delete failed for {}: {error}", target.name));
                    AppCommand::None
                }
            },
            ActionOutcome::Restarted { target, result } => match result {
                Ok(()) => {
                    self.set_status(format!("rollout restart triggered for {}", target.name));
                    self.immediate_refresh()
                }
                Err(error) => {
                    self.set_status(format!("restart failed for {}: {error}", target.name));
                    AppCommand::None
                }
            },
            ActionOutcome::ContextSwitched { context, result } => match result {
                Ok(()) => {
                    info!(context = %context, "context switched");
                    self.set_status(format!("context switched to {context}"));
                    self.identity.context = context;
                    self.workloads.clear();
                    self.selected = 0;
                    self.top = TopView::Loading;
                    self.immediate_refresh()
                }
                Err(error) => {
                    self.set_status(format!("context switch to {context} failed: {error}"));
                    AppCommand::None
                }
            },
        }
    }

    pub fn current_scope(&self, kind: FetchKind) -> FetchScope {
        let target = match (kind, &self.panel) {
            (FetchKind::Details, _) => self.details_target().cloned(),
            (FetchKind::Metrics, Panel::Metrics(target)) => Some(target.clone()),
            _ => None,
        };
        let selector = match (kind, &self.panel) {
            (FetchKind::Namespaces, Panel::NamespaceSelector)
            | (FetchKind::Contexts, Panel::ContextSelector) => Some(self.panel.clone()),
            _ => None,
        };
        FetchScope {
            context: self.identity.context.clone(),
            namespace: self.identity.namespace.clone(),
            target,
            selector,
        }
    }

    /// Details stay wanted while their logs are open on top of them.
    fn details_target(&self) -> Option<&WorkloadRef> {
        match (&self.panel, &self.previous) {
            (Panel::Details(target), _) | (Panel::Logs(_), Some(Panel::Details(target))) => {
                Some(target)
            }
            _ => None,
        }
    }

    fn fetch_now(&mut self, kind: FetchKind) -> AppCommand {
        let scope = self.current_scope(kind);
        AppCommand::Fetch(vec![self.scheduler.trigger_immediate(kind, scope)])
    }

    fn immediate_refresh(&mut self) -> AppCommand {
        let tickets = [FetchKind::Workloads, FetchKind::Top, FetchKind::Identity]
            .into_iter()
            .map(|kind| {
                let scope = self.current_scope(kind);
                self.scheduler.trigger_immediate(kind, scope)
            })
            .collect();
        AppCommand::Fetch(tickets)
    }

    fn open_secondary(&mut self, panel: Panel) {
        self.previous = Some(std::mem::replace(&mut self.panel, panel));
        self.scroll = 0;
        self.follow = false;
    }

    fn go_back(&mut self) -> AppCommand {
        self.panel = self.previous.take().unwrap_or(Panel::List);
        self.mode = InputMode::Normal;
        self.scroll = 0;
        self.follow = false;
        AppCommand::None
    }

    fn close_to_list(&mut self) {
        self.panel = Panel::List;
        self.previous = None;
        self.mode = InputMode::Normal;
    }

    fn selected_workload(&self) -> Option<&WorkloadSummary> {
        self.selected
            .checked_sub(1)
            .and_then(|index| self.workloads.get(index))
    }

    fn selected_target(&self) -> Option<WorkloadRef> {
        self.selected_workload()
            .map(|workload| WorkloadRef::new(&workload.name, &self.identity.namespace))
    }

    fn move_selection(&mut self, delta: isize) -> AppCommand {
        let len = self.workloads.len() as isize;
        if len == 0 {
            self.selected = 0;
        } else {
            self.selected = (self.selected as isize + delta).clamp(1, len) as usize;
        }
        AppCommand::None
    }

    fn page_step(&self) -> isize {
        (self.view_height / 2).max(1) as isize
    }

    fn is_stream_panel(&self) -> bool {
        matches!(self.panel, Panel::Logs(_) | Panel::Exec(_))
    }

    fn body_visual_lines(&self) -> usize {
        let width = self.view_width.max(1) as usize;
        match &self.panel {
            Panel::Details(_) => match &self.details {
                DetailsView::Ready(text) | DetailsView::Failed(text) => {
                    visual_line_count(text, width)
                }
                DetailsView::Loading => 1,
            },
            Panel::Logs(_) | Panel::Exec(_) => self
                .session
                .sink()
                .lines()
                .iter()
                .map(|line| visual_line_count(&line.text, width))
                .sum(),
            _ => 0,
        }
    }

    fn max_scroll(&self) -> u16 {
        let height = self.view_height.max(1) as usize;
        self.body_visual_lines()
            .saturating_sub(height)
            .min(u16::MAX as usize) as u16
    }

    /// Effective scroll offset; stream panels stick to the bottom while following.
    pub fn body_scroll(&self) -> u16 {
        let max = self.max_scroll();
        if self.follow { max } else { self.scroll.min(max) }
    }

    fn scroll_body(&mut self, delta: isize) {
        let max = self.max_scroll() as isize;
        let next = (self.body_scroll() as isize + delta).clamp(0, max);
        self.scroll = next as u16;
        self.follow = self.is_stream_panel() && next >= max;
    }
}

fn fetch_command(tickets: Vec<FetchTicket>) -> AppCommand {
    if tickets.is_empty() {
        AppCommand::None
    } else {
        AppCommand::Fetch(tickets)
    }
}

fn visual_line_count(text: &str, width: usize) -> usize {
    let width = width.max(1);
    text.lines()
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum::<usize>()
        .max(1)
}

fn summarize_error(error: &FetchError) -> String {
    summarize_error_line(&error.to_string())
}

pub fn summarize_error_line(error: &str) -> String {
    error
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

fn normalize_status_text(status: String) -> String {
    const MAX_STATUS_LEN: usize = 180;
    let status = summarize_error_line(&status);
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}
