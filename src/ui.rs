use chrono::{DateTime, Local, Utc};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};

use crate::app::{App, DetailsView, InputMode, MetricsView, TopView};
use crate::model::{Panel, PhaseClass, Quantity, WorkloadRef};
use crate::session::{LineStyle, SessionState, StreamKind};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const CURRENT: Color = Color::Rgb(34, 211, 238);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);

const BAR_CELLS: usize = 40;
const CPU_FULL_MILLICORES: u64 = 100;
const MEMORY_FULL_BYTES: u64 = 1_000 * 1_048_576;

pub fn render(frame: &mut Frame, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_body(frame, root[1], app);
    render_footer(frame, root[2], app);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let identity = app.identity();
    let line = Line::from(vec![
        Span::styled(
            " minipod ",
            Style::default()
                .fg(Color::White)
                .bg(PL_A)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} ", identity.context),
            Style::default().fg(Color::White).bg(PL_B),
        ),
        Span::styled(
            format!(" ns:{} ", identity.namespace),
            Style::default().fg(ACCENT).bg(BG),
        ),
        Span::styled(key_hints(app), Style::default().fg(MUTED).bg(BG)),
    ]);
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(BG)), area);
}

fn key_hints(app: &App) -> &'static str {
    match (app.panel(), app.mode()) {
        (_, InputMode::Prompt) => " enter run  esc cancel",
        (_, InputMode::Confirm) => " y confirm  any other key cancels",
        (Panel::List, _) => {
            " enter details  l logs  m metrics  e exec  d delete  o restart  c ns  x ctx  r refresh  q quit"
        }
        (Panel::Details(_), _) => " l logs  j/k scroll  q back",
        (Panel::Logs(_) | Panel::Exec(_), _) => " j/k scroll  G follow  q back  ctrl+c exit",
        (Panel::Metrics(_), _) => " q back",
        (Panel::NamespaceSelector | Panel::ContextSelector, _) => " enter select  q back",
        (Panel::ConfirmDelete(_), _) => "",
    }
}

/// Text panels take the whole body; the sidebar comes back with the list.
fn shows_sidebar(panel: &Panel) -> bool {
    !matches!(panel, Panel::Details(_) | Panel::Logs(_) | Panel::Exec(_))
}

fn render_body(frame: &mut Frame, area: Rect, app: &mut App) {
    let panel = app.panel().clone();
    let main = if shows_sidebar(&panel) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
            .split(area);
        render_sidebar(frame, columns[0], app);
        columns[1]
    } else {
        area
    };

    match &panel {
        Panel::Details(target) => {
            set_text_viewport(app, main);
            render_details(frame, main, app, target);
        }
        Panel::Logs(_) | Panel::Exec(_) => {
            let (output_area, prompt_area) = if app.mode() == InputMode::Prompt {
                let split = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(3), Constraint::Length(3)])
                    .split(main);
                (split[0], Some(split[1]))
            } else {
                (main, None)
            };
            set_text_viewport(app, output_area);
            render_stream(frame, output_area, app, &panel);
            if let Some(prompt_area) = prompt_area {
                render_prompt(frame, prompt_area, app);
            }
        }
        Panel::Metrics(target) => render_metrics(frame, main, app, target),
        Panel::List => render_workloads(frame, main, app),
        modal => {
            debug_assert!(modal.is_modal());
            render_workloads(frame, main, app);
            match modal {
                Panel::ConfirmDelete(target) => render_confirm_delete(frame, target),
                selector => render_selector(frame, app, selector),
            }
        }
    }
}

fn set_text_viewport(app: &mut App, area: Rect) {
    let width = area.width.saturating_sub(2).max(1);
    let height = area.height.saturating_sub(2).max(1);
    app.set_viewport(width, height);
}

fn panel_block(title: String, border: Color) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(PANEL))
}

fn render_sidebar(frame: &mut Frame, area: Rect, app: &App) {
    let identity = app.identity();
    let label = Style::default().fg(MUTED);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Context:   ", label),
            Span::raw(identity.context.clone()),
        ]),
        Line::from(vec![
            Span::styled("Cluster:   ", label),
            Span::raw(identity.cluster.clone()),
        ]),
        Line::from(vec![
            Span::styled("Namespace: ", label),
            Span::raw(identity.namespace.clone()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Top Pods (CPU / MEM)",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
    ];

    match app.top() {
        TopView::Loading => lines.push(Line::from(Span::styled("loading...", label))),
        TopView::Unavailable => lines.push(Line::from(Span::styled("metrics unavailable", label))),
        TopView::Samples(samples) => {
            for sample in samples.iter().take(app.top_rows()) {
                lines.push(Line::from(vec![
                    Span::raw(compact_text(&sample.name, 24)),
                    Span::styled(
                        format!("  {} / {}", sample.cpu.raw, sample.memory.raw),
                        Style::default().fg(if sample.cpu.is_available() { WARN } else { MUTED }),
                    ),
                ]));
            }
        }
    }

    lines.push(Line::from(""));
    let updated = app
        .last_refresh()
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    lines.push(Line::from(Span::styled(format!("Updated: {updated}"), label)));

    let info = Paragraph::new(lines)
        .block(panel_block("Info".to_string(), MUTED))
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: true });
    frame.render_widget(info, area);
}

fn phase_color(class: PhaseClass) -> Color {
    match class {
        PhaseClass::Running => ACCENT,
        PhaseClass::Completed => MUTED,
        PhaseClass::Pending => WARN,
        PhaseClass::Failed => ERROR,
        PhaseClass::Unknown => Color::White,
    }
}

fn render_workloads(frame: &mut Frame, area: Rect, app: &App) {
    let now = Utc::now();
    let header = Row::new(
        ["POD", "READY", "STATUS", "RESTARTS", "AGE", "IP", "NODE"]
            .into_iter()
            .map(|title| Cell::from(title).style(Style::default().add_modifier(Modifier::BOLD))),
    )
    .style(Style::default().fg(ACCENT));

    // The header is row 0 so that row indices match the selection model.
    let mut rows = vec![header];
    rows.extend(app.workloads().iter().map(|workload| {
        Row::new(vec![
            Cell::from(workload.name.clone()),
            Cell::from(workload.ready_ratio()),
            Cell::from(workload.status.clone())
                .style(Style::default().fg(phase_color(workload.phase_class()))),
            Cell::from(workload.restarts.to_string()),
            Cell::from(workload.age(now)),
            Cell::from(workload.ip_label().to_string()),
            Cell::from(workload.node_label().to_string()),
        ])
        .style(Style::default().fg(Color::White))
    }));

    let (mut title, border) = match app.list_error() {
        Some(error) => (
            format!("Pods ({}) - {}", app.workloads().len(), compact_text(error, 60)),
            ERROR,
        ),
        None => (format!("Pods ({})", app.workloads().len()), ACCENT),
    };
    if app.refreshing() {
        title.push_str(" ⟳");
    }

    let widths = [
        Constraint::Percentage(28),
        Constraint::Length(6),
        Constraint::Length(18),
        Constraint::Length(9),
        Constraint::Length(6),
        Constraint::Length(16),
        Constraint::Min(8),
    ];
    let table = Table::new(rows, widths)
        .block(panel_block(title, border))
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .bg(Color::Rgb(24, 36, 58))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("› ");

    let mut state = TableState::default();
    state.select(Some(app.selected_row()));
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_details(frame: &mut Frame, area: Rect, app: &App, target: &WorkloadRef) {
    let (text, style) = match app.details() {
        DetailsView::Loading => (
            Text::from(format!("Loading details for {}...", target.name)),
            Style::default().fg(MUTED),
        ),
        DetailsView::Ready(text) => (Text::from(text.clone()), Style::default().fg(Color::White)),
        DetailsView::Failed(error) => (Text::from(error.clone()), Style::default().fg(ERROR)),
    };
    let paragraph = Paragraph::new(text)
        .block(panel_block(app.panel().title(), ACCENT))
        .style(style)
        .wrap(Wrap { trim: false })
        .scroll((app.body_scroll(), 0));
    frame.render_widget(paragraph, area);
}

fn line_style(style: LineStyle) -> Style {
    match style {
        LineStyle::Plain => Style::default().fg(Color::White),
        LineStyle::Error => Style::default().fg(ERROR),
        LineStyle::Notice => Style::default().fg(WARN).add_modifier(Modifier::BOLD),
        LineStyle::Muted => Style::default().fg(MUTED),
    }
}

fn stream_title(app: &App, panel: &Panel) -> String {
    let session = app.session();
    let (Some(kind), Some(target)) = (session.kind(), session.target()) else {
        return panel.title();
    };
    let label = match kind {
        StreamKind::LogTail => "Logs",
        StreamKind::ExecShell => "Exec",
    };
    let state = match session.state() {
        _ if session.has_live_process() => "live",
        SessionState::Starting if kind == StreamKind::ExecShell => "awaiting command",
        SessionState::Starting => "starting",
        SessionState::Attached => "live",
        SessionState::Idle => "ended",
    };
    format!("{label} {} [{state}]", target.name)
}

fn render_stream(frame: &mut Frame, area: Rect, app: &App, panel: &Panel) {
    let lines = app
        .session()
        .sink()
        .lines()
        .iter()
        .map(|line| Line::from(Span::styled(line.text.clone(), line_style(line.style))))
        .collect::<Vec<_>>();
    let paragraph = Paragraph::new(lines)
        .block(panel_block(stream_title(app, panel), ACCENT))
        .wrap(Wrap { trim: false })
        .scroll((app.body_scroll(), 0));
    frame.render_widget(paragraph, area);
}

fn render_prompt(frame: &mut Frame, area: Rect, app: &App) {
    let line = Line::from(vec![
        Span::styled("$ ", Style::default().fg(ACCENT)),
        Span::raw(app.input().to_string()),
        Span::styled("█", Style::default().fg(MUTED)),
    ]);
    let prompt = Paragraph::new(line)
        .block(panel_block("Command".to_string(), WARN))
        .style(Style::default().fg(Color::White));
    frame.render_widget(prompt, area);
}

fn usage_percent(value: Option<u64>, full: u64) -> Option<u64> {
    value.map(|value| (value.saturating_mul(100) / full.max(1)).min(100))
}

fn usage_color(percent: u64) -> Color {
    if percent < 60 {
        ACCENT
    } else if percent < 80 {
        WARN
    } else {
        ERROR
    }
}

fn usage_line(label: &str, quantity: &Quantity, full: u64) -> Line<'static> {
    let mut spans = vec![Span::styled(
        format!("{label:<4}{:>8}  ", quantity.raw),
        Style::default().fg(Color::White),
    )];
    match usage_percent(quantity.value, full) {
        Some(percent) => {
            let filled = (BAR_CELLS as u64 * percent / 100) as usize;
            spans.push(Span::styled(
                "█".repeat(filled),
                Style::default().fg(usage_color(percent)),
            ));
            spans.push(Span::styled(
                "░".repeat(BAR_CELLS - filled),
                Style::default().fg(Color::Rgb(30, 41, 59)),
            ));
            spans.push(Span::styled(
                format!(" {percent:>3}%"),
                Style::default().fg(MUTED),
            ));
        }
        None => spans.push(Span::styled("n/a", Style::default().fg(MUTED))),
    }
    Line::from(spans)
}

fn format_clock(at: DateTime<Local>) -> String {
    at.format("%H:%M:%S").to_string()
}

fn render_metrics(frame: &mut Frame, area: Rect, app: &App, target: &WorkloadRef) {
    let title = Line::from(Span::styled(
        target.name.clone(),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ));
    let lines = match app.metrics() {
        MetricsView::Loading => vec![
            title,
            Line::from(""),
            Line::from(Span::styled("Loading metrics...", Style::default().fg(MUTED))),
        ],
        MetricsView::Unavailable => vec![
            title,
            Line::from(""),
            Line::from(Span::styled(
                format!("Metrics unavailable for {}", target.name),
                Style::default().fg(ERROR),
            )),
        ],
        MetricsView::Sample { sample, updated } => vec![
            title,
            Line::from(""),
            usage_line("CPU", &sample.cpu, CPU_FULL_MILLICORES),
            usage_line("MEM", &sample.memory, MEMORY_FULL_BYTES),
            Line::from(""),
            Line::from(Span::styled(
                format!("Last updated: {}", format_clock(*updated)),
                Style::default().fg(MUTED),
            )),
        ],
    };

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(panel_block(app.panel().title(), ACCENT));
    frame.render_widget(paragraph, area);
}

fn render_selector(frame: &mut Frame, app: &App, panel: &Panel) {
    let area = centered_rect(50, 60, frame.area());
    frame.render_widget(Clear, area);

    let selector = app.selector();
    let block = panel_block(panel.title(), ACCENT);
    if selector.loading || selector.error.is_some() || selector.items.is_empty() {
        let (text, color) = match &selector.error {
            Some(error) => (error.clone(), ERROR),
            None if selector.loading => ("Loading...".to_string(), MUTED),
            None => ("Nothing to select".to_string(), MUTED),
        };
        frame.render_widget(
            Paragraph::new(text)
                .block(block)
                .style(Style::default().fg(color))
                .wrap(Wrap { trim: false }),
            area,
        );
        return;
    }

    let current = match panel {
        Panel::ContextSelector => app.identity().context.as_str(),
        _ => app.identity().namespace.as_str(),
    };
    let rows = selector.items.iter().map(|item| {
        if item == current {
            Row::new(vec![Cell::from(format!("{item} (current)"))]).style(
                Style::default()
                    .fg(CURRENT)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Row::new(vec![Cell::from(item.clone())]).style(Style::default().fg(Color::White))
        }
    });

    let table = Table::new(rows, [Constraint::Percentage(100)])
        .block(block)
        .row_highlight_style(Style::default().bg(Color::Rgb(24, 36, 58)))
        .highlight_symbol("› ");
    let mut state = TableState::default();
    state.select(Some(selector.selected));
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_confirm_delete(frame: &mut Frame, target: &WorkloadRef) {
    let area = centered_rect(50, 20, frame.area());
    frame.render_widget(Clear, area);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("Delete pod {}?", target.name),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "y / enter to confirm, any other key to cancel",
            Style::default().fg(MUTED),
        )),
    ];
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(panel_block("Confirm Delete".to_string(), WARN)),
        area,
    );
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let (mode_label, mode_bg) = match app.mode() {
        InputMode::Normal => (" nrm ", PL_A),
        InputMode::Prompt => (" cmd ", PL_B),
        InputMode::Confirm => (" ask ", WARN),
    };
    let status = app.status();
    let status_color = if status.contains("failed") {
        ERROR
    } else {
        Color::White
    };
    let line = Line::from(vec![
        Span::styled(
            mode_label,
            Style::default()
                .fg(Color::Black)
                .bg(mode_bg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            compact_text(status, area.width.saturating_sub(8).max(1) as usize),
            Style::default().fg(status_color),
        ),
    ]);
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(BG)), area);
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        ACCENT, ERROR, MEMORY_FULL_BYTES, WARN, compact_text, shows_sidebar, usage_color,
        usage_percent,
    };
    use crate::model::{Panel, WorkloadRef};

    #[test]
    fn usage_is_capped_at_full_bar() {
        assert_eq!(usage_percent(Some(50), 100), Some(50));
        assert_eq!(usage_percent(Some(250), 100), Some(100));
        assert_eq!(usage_percent(Some(MEMORY_FULL_BYTES / 2), MEMORY_FULL_BYTES), Some(50));
        assert_eq!(usage_percent(None, 100), None);
    }

    #[test]
    fn usage_color_thresholds() {
        assert_eq!(usage_color(59), ACCENT);
        assert_eq!(usage_color(60), WARN);
        assert_eq!(usage_color(80), ERROR);
    }

    #[test]
    fn text_panels_use_the_full_body() {
        let pod = WorkloadRef::new("a", "default");
        assert!(shows_sidebar(&Panel::List));
        assert!(shows_sidebar(&Panel::Metrics(pod.clone())));
        assert!(shows_sidebar(&Panel::NamespaceSelector));
        assert!(!shows_sidebar(&Panel::Details(pod.clone())));
        assert!(!shows_sidebar(&Panel::Logs(pod.clone())));
        assert!(!shows_sidebar(&Panel::Exec(pod)));
    }

    #[test]
    fn compact_text_adds_ellipsis() {
        assert_eq!(compact_text("kube-system", 20), "kube-system");
        assert_eq!(compact_text("kube-system", 5), "kube…");
    }
}
