use crate::app::{AppState, Focus};
use crate::core::PlayerCore;
use crate::library;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap};
use std::time::Duration;

const APP_TITLE_WITH_VERSION: &str = concat!("TuneList v", env!("CARGO_PKG_VERSION"), "  ");

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    focus_border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    error: Color,
    playlist: Color,
    selected_bg: Color,
    popup_bg: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(10, 15, 24),
    panel_bg: Color::Rgb(19, 29, 43),
    panel_alt_bg: Color::Rgb(24, 38, 58),
    border: Color::Rgb(69, 121, 176),
    focus_border: Color::Rgb(100, 203, 184),
    text: Color::Rgb(214, 228, 248),
    muted: Color::Rgb(149, 173, 204),
    accent: Color::Rgb(100, 203, 184),
    alert: Color::Rgb(249, 174, 88),
    error: Color::Rgb(255, 122, 122),
    playlist: Color::Rgb(156, 186, 255),
    selected_bg: Color::Rgb(34, 55, 82),
    popup_bg: Color::Rgb(22, 33, 51),
};

pub fn draw(frame: &mut Frame, core: &PlayerCore, state: &AppState) {
    let colors = PALETTE;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, core, vertical[0], &colors);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(26),
            Constraint::Percentage(46),
            Constraint::Percentage(28),
        ])
        .split(vertical[1]);

    draw_playlists(frame, core, state, body[0], &colors);
    draw_queue(frame, core, state, body[1], &colors);
    draw_now_playing(frame, core, body[2], &colors);
    draw_timeline(frame, core, vertical[2], &colors);
    draw_footer(frame, state, vertical[3], &colors);

    if let Some(prompt) = state.confirm_prompt() {
        draw_confirm(frame, &prompt, &colors);
    }
}

fn draw_header(frame: &mut Frame, core: &PlayerCore, area: Rect, colors: &Palette) {
    let queue = core.queue();
    let playlist_name = core
        .current_playlist()
        .map(|playlist| playlist.name.as_str())
        .unwrap_or("-");

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE_WITH_VERSION,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(playlist_name, Style::default().fg(colors.playlist)),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Tracks {}", queue.len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            mode_label(queue.is_shuffled(), queue.repeat_one()),
            Style::default().fg(colors.alert),
        ),
    ]))
    .block(panel_block("", colors.panel_bg, colors.text, colors.border));
    frame.render_widget(header, area);
}

fn draw_playlists(
    frame: &mut Frame,
    core: &PlayerCore,
    state: &AppState,
    area: Rect,
    colors: &Palette,
) {
    let rows = core.list_playlists();
    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| {
            let marker = if row.is_current { "  * " } else { "    " };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.accent)),
                Span::styled(row.name.as_str(), Style::default().fg(colors.playlist)),
                Span::styled(
                    format!("  {}", row.track_count),
                    Style::default().fg(colors.muted),
                ),
            ]))
        })
        .collect();

    let mut list_state = ListState::default();
    list_state.select((!rows.is_empty()).then(|| state.playlist_cursor.min(rows.len() - 1)));

    let list = List::new(items)
        .block(focus_block(
            "Playlists",
            state.focus == Focus::Playlists,
            colors,
        ))
        .highlight_style(selected_style(colors))
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_queue(
    frame: &mut Frame,
    core: &PlayerCore,
    state: &AppState,
    area: Rect,
    colors: &Palette,
) {
    let queue = core.queue();
    let items: Vec<ListItem> = queue
        .tracks()
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let marker = if queue.current_index() == Some(index) {
                "  > "
            } else {
                "    "
            };
            let labels = library::track_labels(&track.name);
            let title_style = if track.is_stub() {
                Style::default().fg(colors.muted)
            } else {
                Style::default().fg(colors.text)
            };
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(colors.accent)),
                Span::styled(labels.title, title_style),
                Span::styled(
                    format!("  {}", labels.artist),
                    Style::default().fg(colors.muted),
                ),
            ];
            if track.is_stub() {
                spans.push(Span::styled(
                    "  (re-add to play)",
                    Style::default().fg(colors.alert),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let mut list_state = ListState::default();
    list_state.select(
        (!queue.is_empty()).then(|| state.queue_cursor.min(queue.len().saturating_sub(1))),
    );

    let list = List::new(items)
        .block(focus_block("Queue", state.focus == Focus::Queue, colors))
        .highlight_style(selected_style(colors))
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_now_playing(frame: &mut Frame, core: &PlayerCore, area: Rect, colors: &Palette) {
    let queue = core.queue();
    let transport = core.transport();
    let current = queue.current_track();
    let labels = current.map(|track| library::track_labels(&track.name));
    let playlist = core.current_playlist();

    let state_label = match (transport.is_loaded(), transport.is_playing()) {
        (false, _) => "Stopped",
        (true, true) => "Playing",
        (true, false) => "Paused",
    };
    let position = queue
        .current_index()
        .map(|index| format!("{}/{}", index + 1, queue.len()))
        .unwrap_or_else(|| format!("-/{}", queue.len()));

    let info = vec![
        Line::from(vec![
            Span::styled(
                "Now",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", labels.as_ref().map_or("-", |l| l.title.as_str())),
                Style::default().fg(colors.text),
            ),
        ]),
        Line::from(Span::styled(
            format!(
                "Artist  {}",
                labels.as_ref().map_or("-", |l| l.artist.as_str())
            ),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!(
                "Album   {}",
                playlist.map_or("-", |playlist| playlist.name.as_str())
            ),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("Queue   {position}"),
            Style::default().fg(colors.alert),
        )),
        Line::from(Span::styled(
            format!("State   {state_label}"),
            Style::default().fg(colors.text),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "Art     {}",
                if playlist.is_some_and(|playlist| playlist.album_art.is_some()) {
                    "set"
                } else {
                    "none"
                }
            ),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!(
                "Output  {}",
                transport.output_name().unwrap_or_else(|| String::from("-"))
            ),
            Style::default().fg(colors.muted),
        )),
    ];

    let block = Paragraph::new(info)
        .block(panel_block(
            "Now Playing",
            colors.panel_alt_bg,
            colors.text,
            colors.border,
        ))
        .wrap(Wrap { trim: true });
    frame.render_widget(block, area);
}

fn draw_timeline(frame: &mut Frame, core: &PlayerCore, area: Rect, colors: &Palette) {
    let transport = core.transport();
    let elapsed = transport.position().unwrap_or(Duration::ZERO);
    let total = transport.duration();
    let volume = transport.volume();

    let label = format!(
        "{} / {}   Vol {} {:>3}%",
        format_duration(elapsed),
        total
            .map(format_duration)
            .unwrap_or_else(|| String::from("--:--")),
        progress_bar(Some(f64::from(volume)), 10),
        (volume * 100.0).round() as u16
    );

    let gauge = Gauge::default()
        .block(panel_block(
            "Timeline",
            colors.panel_bg,
            colors.text,
            colors.border,
        ))
        .gauge_style(Style::default().fg(colors.accent).bg(colors.selected_bg))
        .ratio(progress_ratio(elapsed, total))
        .label(Span::styled(label, Style::default().fg(colors.text)));
    frame.render_widget(gauge, area);
}

fn draw_footer(frame: &mut Frame, state: &AppState, area: Rect, colors: &Palette) {
    let line = if state.command_mode {
        Line::from(vec![
            Span::styled(":", Style::default().fg(colors.accent)),
            Span::styled(
                state.command_buffer.as_str(),
                Style::default().fg(colors.text),
            ),
            Span::styled("_", Style::default().fg(colors.muted)),
        ])
    } else {
        let status_color = if state.status_is_error {
            colors.error
        } else {
            colors.text
        };
        Line::from(vec![
            Span::styled(
                "Keys: Space play, n/p next/prev, Tab pane, Enter select, d delete, s shuffle, r repeat, : command, Ctrl+C quit",
                Style::default().fg(colors.muted),
            ),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(state.status.as_str(), Style::default().fg(status_color)),
        ])
    };

    let footer = Paragraph::new(line).block(panel_block(
        "Message",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(footer, area);
}

fn draw_confirm(frame: &mut Frame, prompt: &str, colors: &Palette) {
    let popup = centered_rect(frame.area(), 50, 20);
    frame.render_widget(Clear, popup);
    let body = Paragraph::new(vec![
        Line::from(Span::styled(prompt, Style::default().fg(colors.text))),
        Line::from(""),
        Line::from(Span::styled(
            "y confirm  |  any other key cancels",
            Style::default().fg(colors.muted),
        )),
    ])
    .block(panel_block(
        "Confirm",
        colors.popup_bg,
        colors.text,
        colors.alert,
    ))
    .wrap(Wrap { trim: true });
    frame.render_widget(body, popup);
}

fn focus_block<'a>(title: &'a str, focused: bool, colors: &Palette) -> Block<'a> {
    let border = if focused {
        colors.focus_border
    } else {
        colors.border
    };
    panel_block(title, colors.panel_bg, colors.text, border)
}

fn selected_style(colors: &Palette) -> Style {
    Style::default()
        .bg(colors.selected_bg)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg));
    if title.is_empty() {
        return block;
    }
    block.title(Span::styled(
        format!(" {title} "),
        Style::default().fg(text).add_modifier(Modifier::BOLD),
    ))
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

fn mode_label(shuffle: bool, repeat_one: bool) -> String {
    format!(
        "Shuffle {}  Repeat one {}",
        if shuffle { "on" } else { "off" },
        if repeat_one { "on" } else { "off" }
    )
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

fn progress_ratio(elapsed: Duration, total: Option<Duration>) -> f64 {
    total
        .map(|total| total.as_secs_f64())
        .filter(|total_secs| *total_secs > 0.0)
        .map_or(0.0, |total_secs| {
            (elapsed.as_secs_f64() / total_secs).clamp(0.0, 1.0)
        })
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}
