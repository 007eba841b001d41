use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Wrap},
};
use crate::api::cell_text;
use crate::app::{App, ChatRole, FocusPane, InputMode};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Initial fetches still outstanding
    if app.loading {
        let loading = Paragraph::new("Loading")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        let [_, center, _] = Layout::vertical([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .areas(area);
        frame.render_widget(loading, center);
        return;
    }

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    // Sidebar with model configuration, main column with chat and tables
    let [sidebar_area, main_area] =
        Layout::horizontal([Constraint::Length(34), Constraint::Min(0)]).areas(body_area);

    render_sidebar(app, frame, sidebar_area);

    let [chat_area, input_area, tables_area] = Layout::vertical([
        Constraint::Min(8),
        Constraint::Length(3),
        Constraint::Percentage(40),
    ])
    .areas(main_area);

    render_chat(app, frame, chat_area);
    render_chat_input(app, frame, input_area);
    render_tables(app, frame, tables_area);

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (status_text, status_color) = if app.model_running {
        (" Model Running ", Color::Green)
    } else {
        (" Model Stopped ", Color::Red)
    };

    let title = Line::from(vec![
        Span::styled(" System Dashboard ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(status_text, Style::default().fg(status_color).bold()),
        Span::styled(
            if app.use_streaming { "[stream]" } else { "[one-shot]" },
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let [tone_area, training_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Min(3)]).areas(area);

    render_text_field(
        frame,
        tone_area,
        " Tone ",
        &app.tone_input,
        "e.g. Professional, Pirate, Yoda",
        app.focus == FocusPane::Tone,
        app.input_mode,
    );
    render_text_field(
        frame,
        training_area,
        " Training Data (System Instructions) ",
        &app.training_input,
        "You are a helpful assistant...",
        app.focus == FocusPane::Training,
        app.input_mode,
    );
}

fn render_text_field(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    value: &str,
    placeholder: &str,
    focused: bool,
    input_mode: InputMode,
) {
    let border_color = if focused {
        if input_mode == InputMode::Editing {
            Color::Yellow
        } else {
            Color::Cyan
        }
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title.to_string());

    let field = if value.is_empty() {
        Paragraph::new(placeholder)
            .style(Style::default().fg(Color::DarkGray))
            .block(block)
            .wrap(Wrap { trim: true })
    } else {
        Paragraph::new(value.to_string())
            .block(block)
            .wrap(Wrap { trim: true })
    };

    frame.render_widget(field, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store area for mouse hit-testing and scroll calculations
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat with Model ");

    let chat_text = if app.chat_messages.is_empty() {
        Text::from(Span::styled(
            "Type your message...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &app.chat_messages {
            let (label, color) = match msg.role {
                ChatRole::User => ("You:", Color::Cyan),
                ChatRole::Model => ("Model:", Color::Yellow),
                ChatRole::Error => ("Error:", Color::Red),
            };
            lines.push(Line::from(Span::styled(
                label,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));

            if msg.streaming && msg.content.is_empty() {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Typing{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            } else {
                for line in msg.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            lines.push(Line::default());
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_chat_input(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::ChatInput;
    let border_color = if focused && app.input_mode == InputMode::Editing {
        Color::Yellow
    } else if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(if app.chat_loading {
            " Message (waiting for reply) "
        } else {
            " Message "
        });

    // Horizontal scroll keeps the cursor visible in a long input
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.chat_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .chat_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    // Show cursor when editing the message
    if focused && app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_tables(app: &mut App, frame: &mut Frame, area: Rect) {
    app.tables_area = Some(area);

    let focused = app.focus == FocusPane::Tables;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Database Tables ({}) ", app.tables.len()));

    if app.tables.is_empty() {
        let placeholder = Paragraph::new("No tables found")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [list_area, grid_area] =
        Layout::horizontal([Constraint::Length(24), Constraint::Min(0)]).areas(inner);

    let items: Vec<ListItem> = app
        .tables
        .iter()
        .map(|(name, table)| ListItem::new(format!(" {} ({}) ", name, table.rows.len())))
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::RIGHT))
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, list_area, &mut app.table_state);

    let Some((name, table)) = app.selected_table() else {
        return;
    };

    let header = Row::new(
        table
            .columns
            .iter()
            .map(|c| Cell::from(c.clone()).style(Style::default().fg(Color::Yellow).bold())),
    );

    let visible_rows = grid_area.height.saturating_sub(1) as usize;
    let rows: Vec<Row> = table
        .rows
        .iter()
        .skip(app.row_scroll as usize)
        .take(visible_rows)
        .map(|row| Row::new(row.iter().map(|cell| Cell::from(cell_text(cell)))))
        .collect();

    let ncols = table.columns.len().max(1) as u32;
    let widths = vec![Constraint::Ratio(1, ncols); ncols as usize];

    let grid = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::NONE)
            .title(format!(" {} ", name)),
    );

    frame.render_widget(grid, grid_area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(
                if app.focus == FocusPane::ChatInput { " send " } else { " done " },
                label_style,
            ),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ],
        InputMode::Normal => {
            let mut hints = vec![
                Span::styled(" Tab ", key_style),
                Span::styled(" focus ", label_style),
            ];
            match app.focus {
                FocusPane::ChatInput | FocusPane::Tone | FocusPane::Training => {
                    hints.extend(vec![
                        Span::styled(" i ", key_style),
                        Span::styled(" edit ", label_style),
                    ]);
                }
                FocusPane::Tables => {
                    hints.extend(vec![
                        Span::styled(" j/k ", key_style),
                        Span::styled(" table ", label_style),
                        Span::styled(" ^d/^u ", key_style),
                        Span::styled(" rows ", label_style),
                    ]);
                }
                FocusPane::Chat => {
                    hints.extend(vec![
                        Span::styled(" j/k ", key_style),
                        Span::styled(" scroll ", label_style),
                        Span::styled(" g/G ", key_style),
                        Span::styled(" top/bottom ", label_style),
                    ]);
                }
            }
            hints.extend(vec![
                Span::styled(" S ", key_style),
                Span::styled(
                    if app.use_streaming { " one-shot " } else { " stream " },
                    label_style,
                ),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ]);
            hints
        }
    };

    let footer = Paragraph::new(Line::from(hints));
    frame.render_widget(footer, area);
}
