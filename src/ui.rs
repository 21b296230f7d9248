use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Padding, Paragraph};

use crate::app::{App, CommandSuggestion, Pane, PathPrompt};
use crate::text_layout::{hard_wrap, wrap_lines};
use crate::theme::Theme;

const MAX_INPUT_TEXT_LINES: u16 = 5;
const MAX_MODEL_LINES: u16 = 6;
const TEXT_PADDING: u16 = 1;
const STATUS_HEIGHT: u16 = 3;
const TITLE_BAR_HEIGHT: u16 = 3;
const SIDEBAR_WIDTH: u16 = 34;
const LOGS_HEIGHT: u16 = 10;
const ACTIVE_TITLE_FG: Color = Color::Black;
const ACTIONS: [(&str, &str); 7] = [
    ("Enter", "Send prompt"),
    ("Ctrl+T", "Load text file"),
    ("Ctrl+O", "Load image"),
    ("Ctrl+N", "Next model"),
    ("Ctrl+Y", "Copy last command"),
    ("Ctrl+L", "Clear session"),
    ("Ctrl+C", "Quit"),
];
const STATUS_HELP_TEXT: &str = "Tab focus | Shift+Enter newline | PgUp/PgDn scroll | / commands";

struct ScreenLayout {
    model: Rect,
    context: Rect,
    actions: Rect,
    conversation: Rect,
    logs: Rect,
    prompt: Rect,
    status: Rect,
}

/// Splits the screen into a sidebar, the main column and the status bar.
/// The prompt box grows with its content, so the layout depends on `app`.
fn screen_layout(screen: Rect, app: &App) -> ScreenLayout {
    let [body, status] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(STATUS_HEIGHT)]).areas(screen);
    let [sidebar, main] =
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)]).areas(body);

    let model_lines = (app.models().len() as u16).clamp(1, MAX_MODEL_LINES);
    let [model, context, actions] = Layout::vertical([
        Constraint::Length(TITLE_BAR_HEIGHT + model_lines + TEXT_PADDING * 2),
        Constraint::Min(0),
        Constraint::Length(TITLE_BAR_HEIGHT + ACTIONS.len() as u16 + TEXT_PADDING * 2),
    ])
    .areas(sidebar);

    let text_width = padded_width(main);
    let input_lines = hard_wrap(app.input(), text_width).len() as u16;
    let prompt_height = TITLE_BAR_HEIGHT + input_box_height(input_lines);
    let [conversation, logs, prompt] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(LOGS_HEIGHT),
        Constraint::Length(prompt_height),
    ])
    .areas(main);

    ScreenLayout {
        model,
        context,
        actions,
        conversation,
        logs,
        prompt,
        status,
    }
}

pub fn input_text_width(screen: Rect, app: &App) -> u16 {
    padded_width(screen_layout(screen, app).prompt)
}

pub fn conversation_max_scroll(screen: Rect, app: &App) -> u16 {
    let content = content_area(screen_layout(screen, app).conversation);
    let total = app.conversation_lines(padded_width(content)).len() as u16;
    total.saturating_sub(visible_lines(content))
}

pub fn logs_max_scroll(screen: Rect, app: &App) -> u16 {
    let content = content_area(screen_layout(screen, app).logs);
    let total = log_display_lines(app, padded_width(content)).len() as u16;
    total.saturating_sub(visible_lines(content))
}

pub fn context_max_scroll(screen: Rect, app: &App) -> u16 {
    let content = content_area(screen_layout(screen, app).context);
    let total = context_display_lines(app, padded_width(content)).len() as u16;
    total.saturating_sub(visible_lines(content))
}

/// Maximum scroll offset for whichever pane currently has focus.
pub fn active_max_scroll(screen: Rect, app: &App) -> u16 {
    match app.active_pane {
        Pane::Conversation => conversation_max_scroll(screen, app),
        Pane::Logs => logs_max_scroll(screen, app),
        Pane::Context => context_max_scroll(screen, app),
    }
}

pub fn pane_hit_test(screen: Rect, app: &App, x: u16, y: u16) -> Option<Pane> {
    let layout = screen_layout(screen, app);
    if point_in_rect(layout.conversation, x, y) {
        return Some(Pane::Conversation);
    }
    if point_in_rect(layout.logs, x, y) {
        return Some(Pane::Logs);
    }
    if point_in_rect(layout.context, x, y) {
        return Some(Pane::Context);
    }
    None
}

pub fn render(frame: &mut Frame, app: &App, theme: &Theme) {
    let screen = frame.area();
    let layout = screen_layout(screen, app);

    render_model_pane(frame, layout.model, app, theme);
    render_context_pane(frame, layout.context, app, theme, context_max_scroll(screen, app));
    render_actions_pane(frame, layout.actions, theme);
    render_conversation_pane(
        frame,
        layout.conversation,
        app,
        theme,
        conversation_max_scroll(screen, app),
    );
    render_logs_pane(frame, layout.logs, app, theme, logs_max_scroll(screen, app));
    render_prompt_pane(frame, layout.prompt, app, theme);
    render_command_index(
        frame,
        app.command_suggestions(),
        layout.conversation,
        layout.prompt,
        theme,
    );

    frame.render_widget(
        Paragraph::new(status_line_text(app))
            .style(Style::default().bg(theme.status_bg).fg(theme.muted_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.status_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        layout.status,
    );
}

fn render_title_bar(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    base: Color,
    active: bool,
    theme: &Theme,
) {
    let title_bg = title_bar_bg(base, active, theme);
    let title_fg = if active {
        ACTIVE_TITLE_FG
    } else {
        theme.muted_fg
    };
    frame.render_widget(
        Paragraph::new(title.to_string())
            .style(Style::default().bg(title_bg).fg(title_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(title_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        area,
    );
}

fn render_body(
    frame: &mut Frame,
    area: Rect,
    lines: Vec<Line<'static>>,
    bg: Color,
    scroll: u16,
    theme: &Theme,
) {
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().bg(bg).fg(theme.text_fg))
            .scroll((scroll, 0))
            .block(
                Block::default()
                    .style(Style::default().bg(bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        area,
    );
}

fn render_model_pane(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let [title_area, content] = split_title(area);
    render_title_bar(frame, title_area, "Model", theme.sidebar_bg, false, theme);

    let lines = app
        .models()
        .iter()
        .enumerate()
        .map(|(idx, model)| {
            if idx == app.model_index() {
                Line::from(Span::styled(
                    format!("> {model}"),
                    Style::default()
                        .fg(theme.active_fg)
                        .add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(Span::styled(
                    format!("  {model}"),
                    Style::default().fg(theme.muted_fg),
                ))
            }
        })
        .collect::<Vec<_>>();
    let selected = app.model_index() as u16;
    let visible = visible_lines(content).max(1);
    let scroll = selected.saturating_sub(visible.saturating_sub(1));
    render_body(frame, content, lines, theme.sidebar_bg, scroll, theme);
}

fn render_context_pane(frame: &mut Frame, area: Rect, app: &App, theme: &Theme, max_scroll: u16) {
    let [title_area, content] = split_title(area);
    render_title_bar(
        frame,
        title_area,
        "Context & Files",
        theme.sidebar_bg,
        app.active_pane == Pane::Context,
        theme,
    );
    let style = if app.context_labels().is_empty() {
        Style::default().fg(theme.muted_fg)
    } else {
        Style::default().fg(theme.text_fg)
    };
    let lines = context_display_lines(app, padded_width(content))
        .into_iter()
        .map(|line| Line::from(Span::styled(line, style)))
        .collect();
    render_body(
        frame,
        content,
        lines,
        theme.sidebar_bg,
        app.context_scroll().min(max_scroll),
        theme,
    );
}

fn render_actions_pane(frame: &mut Frame, area: Rect, theme: &Theme) {
    let [title_area, content] = split_title(area);
    render_title_bar(frame, title_area, "Actions", theme.sidebar_bg, false, theme);
    let lines = ACTIONS
        .iter()
        .map(|(key, action)| {
            Line::from(vec![
                Span::styled(format!("{key:<7}"), Style::default().fg(theme.active_fg)),
                Span::styled(action.to_string(), Style::default().fg(theme.muted_fg)),
            ])
        })
        .collect();
    render_body(frame, content, lines, theme.sidebar_bg, 0, theme);
}

fn render_conversation_pane(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    theme: &Theme,
    max_scroll: u16,
) {
    let [title_area, content] = split_title(area);
    let title = if app.is_busy() {
        format!("Conversation  Working {}", working_dots(app.ticks))
    } else {
        "Conversation".to_string()
    };
    render_title_bar(
        frame,
        title_area,
        &title,
        theme.conversation_bg,
        app.active_pane == Pane::Conversation,
        theme,
    );

    let lines = app
        .conversation_lines(padded_width(content))
        .into_iter()
        .map(|(kind, text)| {
            Line::from(Span::styled(
                text,
                Style::default().fg(theme.transcript_fg(kind)),
            ))
        })
        .collect();
    render_body(
        frame,
        content,
        lines,
        theme.conversation_bg,
        app.conversation_scroll(max_scroll),
        theme,
    );
}

fn render_logs_pane(frame: &mut Frame, area: Rect, app: &App, theme: &Theme, max_scroll: u16) {
    let [title_area, content] = split_title(area);
    render_title_bar(
        frame,
        title_area,
        "System Logs (stderr)",
        theme.logs_bg,
        app.active_pane == Pane::Logs,
        theme,
    );
    let lines = log_display_lines(app, padded_width(content))
        .into_iter()
        .map(|line| Line::from(Span::styled(line, Style::default().fg(theme.log_fg))))
        .collect();
    render_body(
        frame,
        content,
        lines,
        theme.logs_bg,
        app.logs_scroll().min(max_scroll),
        theme,
    );
}

fn render_prompt_pane(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let [title_area, content] = split_title(area);
    let title = match app.path_prompt() {
        Some(PathPrompt::Text) => "Text File Path",
        Some(PathPrompt::Image) => "Image Path",
        None => "Your Prompt",
    };
    render_title_bar(frame, title_area, title, theme.input_bg, true, theme);
    if content.width < 1 || content.height < 1 {
        return;
    }

    let width = padded_width(content);
    let wrapped = hard_wrap(app.input(), width);
    let (cursor_line, cursor_col) = app.cursor_line_col(width);
    let visible = visible_lines(content).max(1);
    let max_scroll = (wrapped.len() as u16).saturating_sub(visible);
    let scroll = cursor_line.saturating_sub(visible / 2).min(max_scroll);
    let lines = wrapped.into_iter().map(Line::from).collect();
    render_body(frame, content, lines, theme.input_bg, scroll, theme);

    let inner = content.inner(Margin {
        horizontal: TEXT_PADDING,
        vertical: TEXT_PADDING,
    });
    if inner.width > 0 && inner.height > 0 {
        let visible_cursor_line = cursor_line.saturating_sub(scroll);
        if visible_cursor_line < inner.height {
            frame.set_cursor_position((
                inner
                    .x
                    .saturating_add(cursor_col.min(inner.width.saturating_sub(1))),
                inner.y.saturating_add(visible_cursor_line),
            ));
        }
    }
}

fn render_command_index(
    frame: &mut Frame,
    suggestions: Vec<CommandSuggestion>,
    above: Rect,
    prompt_area: Rect,
    theme: &Theme,
) {
    if suggestions.is_empty() || above.height == 0 || prompt_area.width == 0 {
        return;
    }
    let max_items = above.height.saturating_sub(2).max(1) as usize;
    let shown = suggestions.into_iter().take(max_items).collect::<Vec<_>>();
    let overlay_height = (shown.len() as u16)
        .saturating_add(2)
        .min(above.height.max(1));
    let y = prompt_area
        .y
        .saturating_sub(overlay_height)
        .max(above.y);
    let overlay = Rect::new(prompt_area.x, y, prompt_area.width, overlay_height);

    let lines = shown
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let style = if idx == 0 {
                Style::default().fg(theme.active_fg)
            } else {
                Style::default().fg(theme.text_fg)
            };
            Line::from(vec![
                Span::styled(format!("{:<8}", item.command), style),
                Span::raw(" "),
                Span::styled(
                    item.description.to_string(),
                    Style::default().fg(theme.muted_fg),
                ),
            ])
        })
        .collect::<Vec<_>>();

    frame.render_widget(Clear, overlay);
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().bg(theme.input_bg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.input_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        overlay,
    );
}

fn status_line_text(app: &App) -> String {
    if app.is_busy() {
        format!(
            "{} {} | {}",
            app.status(),
            working_dots(app.ticks),
            STATUS_HELP_TEXT
        )
    } else {
        format!("{} | {}", app.status(), STATUS_HELP_TEXT)
    }
}

fn working_dots(ticks: u64) -> &'static str {
    const FRAMES: [&str; 6] = ["[   ]", "[.  ]", "[.. ]", "[...]", "[ ..]", "[  .]"];
    FRAMES[((ticks / 2) as usize) % FRAMES.len()]
}

fn log_display_lines(app: &App, width: u16) -> Vec<String> {
    app.log_lines()
        .iter()
        .flat_map(|line| wrap_lines(line, width))
        .collect()
}

fn context_display_lines(app: &App, width: u16) -> Vec<String> {
    if app.context_labels().is_empty() {
        return wrap_lines("No files attached.", width);
    }
    app.context_labels()
        .iter()
        .flat_map(|label| wrap_lines(label, width))
        .collect()
}

fn split_title(area: Rect) -> [Rect; 2] {
    Layout::vertical([Constraint::Length(TITLE_BAR_HEIGHT), Constraint::Min(0)]).areas(area)
}

fn content_area(pane: Rect) -> Rect {
    let [_title, content] = split_title(pane);
    content
}

fn padded_width(area: Rect) -> u16 {
    area.width.saturating_sub(TEXT_PADDING * 2).max(1)
}

fn visible_lines(content: Rect) -> u16 {
    content.height.saturating_sub(TEXT_PADDING * 2)
}

fn input_box_height(input_text_lines: u16) -> u16 {
    input_text_lines
        .clamp(1, MAX_INPUT_TEXT_LINES)
        .saturating_add(TEXT_PADDING * 2)
}

fn title_bar_bg(base: Color, active: bool, theme: &Theme) -> Color {
    if active {
        return theme.highlight_bg;
    }
    match base {
        Color::Rgb(r, g, b) => {
            let delta = -12;
            Color::Rgb(
                adjust_channel(r, delta),
                adjust_channel(g, delta),
                adjust_channel(b, delta),
            )
        }
        _ => base,
    }
}

fn point_in_rect(rect: Rect, x: u16, y: u16) -> bool {
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

fn adjust_channel(channel: u8, delta: i16) -> u8 {
    let value = channel as i16 + delta;
    value.clamp(0, 255) as u8
}

#[cfg(test)]
#[path = "../tests/unit/ui_tests.rs"]
mod tests;
