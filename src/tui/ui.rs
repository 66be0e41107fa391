use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Dashboard, Pane};
use crate::auth::SessionState;
use crate::dashboard::status::{in_progress_count, HealthLabel};
use crate::dashboard::{EditableForm, MutationState};
use crate::error::{TransportErrorKind, ValidationErrors};
use crate::models::RunStatus;

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Status header
            Constraint::Min(0),    // Dashboard or sign-in
            Constraint::Length(1), // Key hints / notices
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    if app.auth.is_open() {
        render_dashboard(frame, app, chunks[1]);
    } else {
        render_sign_in(frame, app, chunks[1]);
    }
    render_status_line(frame, app, chunks[2]);

    if app.show_help {
        render_help(frame);
    }
}

fn border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.status();
    let label_color = match status.label {
        HealthLabel::Healthy => Color::Green,
        HealthLabel::AwaitingDraft => Color::Yellow,
    };

    let mut spans = vec![
        Span::styled(
            status.label.label(),
            Style::default().fg(label_color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::raw(status.last_run_text),
    ];
    if let Some(draft_id) = status.draft_id {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("Draft {draft_id}"),
            Style::default().fg(Color::Magenta),
        ));
    }

    let account = match app.auth.state() {
        SessionState::SignedIn { email } => format!(" {email} "),
        _ => String::new(),
    };

    let block = Block::default()
        .title(" Newsletter Pipeline ")
        .title_bottom(Line::from(account).right_aligned())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_sign_in(frame: &mut Frame, app: &App, area: Rect) {
    let area = centered_rect(60, 40, area);

    let mut lines = vec![
        Line::from("Sign in to manage the pipeline."),
        Line::from(""),
    ];
    match app.auth.state() {
        SessionState::LinkSent { email } => {
            lines.push(Line::from(format!("Link sent to {email}.")));
        }
        _ => {
            let cursor = if app.editing { "_" } else { "" };
            lines.push(Line::from(vec![
                Span::styled("Email: ", Style::default().fg(Color::Blue)),
                Span::raw(format!("{}{}", app.auth.email_input, cursor)),
            ]));
        }
    }
    lines.push(Line::from(""));
    if app.auth.is_pending() {
        lines.push(Line::styled(
            "Sending link...",
            Style::default().fg(Color::Yellow),
        ));
    } else if let Some(message) = app.auth.message() {
        lines.push(Line::styled(message, Style::default().fg(Color::Yellow)));
    } else {
        lines.push(Line::styled(
            "e:edit email  s:send magic link",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let block = Block::default()
        .title(" Sign in ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_dashboard(frame: &mut Frame, app: &App, area: Rect) {
    let Some(dashboard) = app.dashboard() else {
        return;
    };

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10), // Trigger form
            Constraint::Min(8),     // Presets
            Constraint::Length(6),  // Schedule
        ])
        .split(columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(columns[1]);

    render_trigger(frame, app, dashboard, left[0]);
    render_presets(frame, app, dashboard, left[1]);
    render_schedule(frame, app, left[2]);
    render_history(frame, app, dashboard, right[0]);
    render_draft(frame, app, dashboard, right[1]);
}

fn form_lines(form: &dyn EditableForm, active: Option<usize>, editing: bool) -> Vec<Line<'static>> {
    form.labels()
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let selected = active == Some(i);
            let marker = if selected { "> " } else { "  " };
            let cursor = if selected && editing { "_" } else { "" };
            let value_style = if selected {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(vec![
                Span::raw(marker),
                Span::styled(format!("{label}: "), Style::default().fg(Color::Blue)),
                Span::styled(format!("{}{}", form.field(i), cursor), value_style),
            ])
        })
        .collect()
}

fn outcome_line(state: &MutationState, pending: &str, succeeded: &str) -> Option<Line<'static>> {
    match state {
        MutationState::Idle => None,
        MutationState::Pending => Some(Line::styled(
            pending.to_string(),
            Style::default().fg(Color::Yellow),
        )),
        MutationState::Succeeded => Some(Line::styled(
            succeeded.to_string(),
            Style::default().fg(Color::Green),
        )),
        MutationState::Failed(message) => Some(Line::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        )),
    }
}

fn error_line(errors: &ValidationErrors) -> Option<Line<'static>> {
    (!errors.is_empty()).then(|| Line::styled(errors.to_string(), Style::default().fg(Color::Red)))
}

fn active_field(app: &App, pane: Pane) -> Option<usize> {
    (app.focus == pane).then_some(app.field_index)
}

fn render_trigger(frame: &mut Frame, app: &App, dashboard: &Dashboard, area: Rect) {
    let focused = app.focus == Pane::Trigger;
    let mut lines = form_lines(
        &dashboard.trigger.form,
        active_field(app, Pane::Trigger),
        focused && app.editing,
    );
    lines.extend(error_line(&dashboard.trigger.errors));
    let succeeded = match &dashboard.trigger.last_run_id {
        Some(id) => format!("Run queued successfully ({id})"),
        None => "Run queued successfully".to_string(),
    };
    lines.extend(outcome_line(dashboard.trigger.state(), "Queuing run...", &succeeded));

    let block = Block::default()
        .title(" Trigger run ")
        .borders(Borders::ALL)
        .border_style(border(focused));

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_presets(frame: &mut Frame, app: &App, dashboard: &Dashboard, area: Rect) {
    let focused = app.focus == Pane::Presets;
    let block = Block::default()
        .title(" Topic presets ")
        .borders(Borders::ALL)
        .border_style(border(focused));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(inner);

    let mut lines = form_lines(
        &dashboard.presets.form,
        active_field(app, Pane::Presets),
        focused && app.editing,
    );
    lines.extend(error_line(&dashboard.presets.errors));
    lines.extend(outcome_line(dashboard.presets.state(), "Saving preset...", "Preset saved"));
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), chunks[0]);

    let listing = Paragraph::new(dashboard.presets.listing())
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::TOP))
        .wrap(Wrap { trim: true });
    frame.render_widget(listing, chunks[1]);
}

fn render_schedule(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Pane::Schedule;
    let mut lines = form_lines(
        &app.schedule.note,
        active_field(app, Pane::Schedule),
        focused && app.editing,
    );
    if let Some(message) = app.schedule.message() {
        lines.push(Line::styled(
            format!("Saved! {message}"),
            Style::default().fg(Color::Green),
        ));
    }

    let block = Block::default()
        .title(" Schedule note ")
        .borders(Borders::ALL)
        .border_style(border(focused));

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn status_color(status: &RunStatus) -> Color {
    match status {
        RunStatus::Completed => Color::Green,
        RunStatus::Failed => Color::Red,
        RunStatus::Running => Color::Yellow,
        RunStatus::Queued | RunStatus::Other(_) => Color::Blue,
    }
}

fn render_history(frame: &mut Frame, app: &App, dashboard: &Dashboard, area: Rect) {
    let focused = app.focus == Pane::History;
    let state = dashboard.runs_state();
    let rows = dashboard.history_rows();

    let in_progress = in_progress_count(&rows);
    let sync = match (&state.error, state.is_fetching || state.is_stale, state.updated_at) {
        (Some(e), _, _) if e.kind == TransportErrorKind::Network => "backend unreachable".to_string(),
        (Some(e), _, _) => format!("refresh failed: {e}"),
        (None, true, _) => "syncing".to_string(),
        (None, false, Some(at)) => format!("synced {}s ago", at.elapsed().as_secs()),
        (None, false, None) => String::new(),
    };
    let mut title = " Run history".to_string();
    if in_progress > 0 {
        title.push_str(&format!(" | {in_progress} in progress"));
    }
    if !sync.is_empty() {
        title.push_str(&format!(" | {sync}"));
    }
    title.push(' ');

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border(focused));

    if rows.is_empty() {
        let placeholder = if state.data.is_none() && state.is_fetching {
            "Loading runs..."
        } else {
            "No runs yet."
        };
        let paragraph = Paragraph::new(placeholder)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| {
            let mut lines = vec![Line::from(vec![
                Span::styled(
                    format!("[{}] ", row.copy),
                    Style::default().fg(status_color(&row.status)),
                ),
                Span::styled(row.topics.clone(), Style::default().fg(Color::White)),
                Span::styled(format!("  {}", row.when), Style::default().fg(Color::DarkGray)),
            ])];
            if let Some(message) = &row.message {
                lines.push(Line::styled(
                    format!("    {message}"),
                    Style::default().fg(Color::Gray),
                ));
            }
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    if focused {
        list_state.select(Some(app.history_selected.min(rows.len() - 1)));
    }
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_draft(frame: &mut Frame, app: &App, dashboard: &Dashboard, area: Rect) {
    let focused = app.focus == Pane::Draft;
    let copy_hint = if dashboard.draft.is_copied() {
        " Copied "
    } else if dashboard.draft.can_copy() {
        " c: Copy HTML "
    } else {
        ""
    };
    let block = Block::default()
        .title(" Latest draft ")
        .title_bottom(Line::from(copy_hint).right_aligned())
        .borders(Borders::ALL)
        .border_style(border(focused));

    let state = dashboard.draft.state();
    let Some(draft) = state.data.as_deref().and_then(Option::as_ref) else {
        let placeholder = if state.data.is_none() && state.is_fetching {
            "Loading draft..."
        } else {
            "Trigger a run to generate a draft."
        };
        let paragraph = Paragraph::new(placeholder)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    };

    let mut lines = vec![Line::styled(
        format!("Run {}", draft.run_id),
        Style::default().fg(Color::Magenta),
    )];
    if let Some(hero) = &draft.hero {
        let credit = hero
            .photographer
            .as_deref()
            .map(|p| format!(" by {p}"))
            .unwrap_or_default();
        lines.push(Line::styled(
            format!("Hero: {}{} ({})", hero.url, credit, hero.attribution),
            Style::default().fg(Color::Gray),
        ));
    }
    lines.push(Line::from(""));

    for (i, section) in draft.sections.iter().enumerate() {
        let selected = focused && i == app.section_selected;
        let title_style = if selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        };
        lines.push(Line::styled(section.title.clone(), title_style));
        if !section.hook.is_empty() {
            lines.push(Line::styled(
                section.hook.clone(),
                Style::default().add_modifier(Modifier::ITALIC),
            ));
        }
        if !section.summary.is_empty() {
            lines.push(Line::from(section.summary.clone()));
        }
        if !section.call_to_action.is_empty() {
            lines.push(Line::styled(
                format!("{} -> {}", section.call_to_action, section.source_url),
                Style::default().fg(Color::Blue),
            ));
        }
        if !section.keywords.is_empty() {
            lines.push(Line::styled(
                section.keywords.join(" · "),
                Style::default().fg(Color::DarkGray),
            ));
        }
        lines.push(Line::from(""));
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_status_line(frame: &mut Frame, app: &App, area: Rect) {
    let (text, color) = if app.editing {
        ("Enter:done  Esc:cancel".to_string(), Color::Yellow)
    } else if let Some(notice) = &app.notice {
        (notice.clone(), Color::Red)
    } else if !app.auth.is_open() {
        ("e:edit  s:send link  ?:help  q:quit".to_string(), Color::DarkGray)
    } else {
        let keys = match app.focus {
            Pane::Trigger | Pane::Presets | Pane::Schedule => "Tab:pane  j/k:field  e:edit  s:submit",
            Pane::History => "Tab:pane  j/k:move  R:refresh history",
            Pane::Draft => "Tab:pane  j/k:section  c:copy HTML  o:open source",
        };
        (format!("{keys}  r:refresh  ?:help  q:quit"), Color::DarkGray)
    };

    let paragraph = Paragraph::new(text).style(Style::default().fg(color));
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame) {
    let area = centered_rect(50, 60, frame.area());

    let help_text = vec![
        "",
        " Navigation:",
        "   Tab / S-Tab  Next / previous pane",
        "   j / ↓        Move down",
        "   k / ↑        Move up",
        "",
        " Forms:",
        "   Enter / e    Edit field",
        "   s            Submit pane",
        "   Esc          Cancel edit",
        "",
        " Actions:",
        "   r            Refresh runs and draft",
        "   R            Refresh focused pane",
        "   c            Copy draft HTML",
        "   o            Open section source",
        "   x            Sign out",
        "",
        " General:",
        "   ?            Toggle this help",
        "   q            Quit",
        "",
        " Press any key to close",
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
