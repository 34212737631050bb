mod tui_app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use tui_app::{
    format_pct, format_ratio, format_score, format_usd, trend, truncate, AppState,
    ConnectionStatus, ProtocolResponse, Trend, NA_LABEL,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    // Server-side refresh may include a live fetch, so allow longer than a poll.
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url);

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut table_state = TableState::default();
    table_state.select(None);

    let result = run_loop(&mut terminal, &mut app, &client, &mut table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    table_state: &mut TableState,
) -> io::Result<()> {
    let poll_interval = Duration::from_secs(5);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app, table_state))?;

        let timeout = poll_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Char('R') => {
                            app.trigger_refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            let max = app.protocols.len().saturating_sub(1);
                            let next = table_state.selected().map_or(0, |i| (i + 1).min(max));
                            table_state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let prev = table_state
                                .selected()
                                .map_or(0, |i| i.saturating_sub(1));
                            table_state.select(Some(prev));
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= poll_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, table_state: &mut TableState) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, table_state, chunks[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };
    let summary = &app.summary;

    let mut first = vec![
        Span::styled(
            " Venture Scout  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} protocols", summary.protocols_scanned),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("{} dropped", summary.dropped),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("{} sectors", summary.sectors),
            Style::default().fg(Color::White),
        ),
    ];
    if summary.is_simulated() {
        first.push(Span::raw("  "));
        first.push(Span::styled(
            " SIMULATED DATA ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let pick = match &summary.top_pick {
        Some(p) => Span::styled(
            format!(
                "top pick: {} (score {:.1}, gap {})",
                truncate(&p.name, 24),
                p.score,
                format_pct(Some(p.valuation_gap)),
            ),
            Style::default().fg(Color::Green),
        ),
        None => Span::styled("top pick: none", Style::default().fg(Color::DarkGray)),
    };
    let second = vec![
        Span::raw(" "),
        pick,
        Span::raw("  │  "),
        Span::styled(
            format!("median sector P/S {}", format_ratio(summary.median_sector_ps)),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("{} incomplete", summary.incomplete_rows),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let paragraph = Paragraph::new(vec![Line::from(first), Line::from(second)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, table_state: &mut TableState, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(78), Constraint::Percentage(22)])
        .split(area);

    render_protocols_table(f, app, table_state, halves[0]);
    let selected = table_state.selected().and_then(|i| app.protocols.get(i));
    render_detail(f, selected, halves[1]);
}

fn render_protocols_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = [
        "#", "Protocol", "Sector", "Chain", "TVL", "Mcap", "Annual rev", "P/S", "Fair value", "Gap",
        "Momentum", "Score",
    ]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .protocols
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let momentum_color = match trend(p.revenue_momentum) {
                Trend::Growing => Color::Green,
                Trend::Declining => Color::Red,
                Trend::Flat => Color::White,
                Trend::Unknown => Color::DarkGray,
            };
            let gap_color = p.valuation_gap.map_or(Color::DarkGray, |g| {
                if g > 0.0 {
                    Color::Green
                } else {
                    Color::White
                }
            });
            let score_color = if p.score.value >= 70.0 {
                Color::Green
            } else if p.score.value >= 40.0 {
                Color::Yellow
            } else {
                Color::Red
            };

            Row::new(vec![
                Cell::from(format!("{}", i + 1)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&p.name, 20)),
                Cell::from(truncate(&p.sector, 14)).style(Style::default().fg(Color::Cyan)),
                Cell::from(truncate(p.chain.as_deref().unwrap_or(NA_LABEL), 10))
                    .style(Style::default().fg(Color::DarkGray)),
                Cell::from(format_usd(p.tvl)),
                Cell::from(format_usd(p.market_cap)),
                Cell::from(format_usd(p.annualized_revenue)),
                Cell::from(format_ratio(p.price_to_sales)),
                Cell::from(format_usd(p.fair_value)),
                Cell::from(format_pct(p.valuation_gap)).style(Style::default().fg(gap_color)),
                Cell::from(format_pct(p.revenue_momentum))
                    .style(Style::default().fg(momentum_color)),
                Cell::from(format_score(&p.score)).style(Style::default().fg(score_color)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Min(12),
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " VENTURE SCORES ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_detail(f: &mut Frame, selected: Option<&ProtocolResponse>, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let field = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{name:<14}"), label),
            Span::raw(value),
        ])
    };

    let lines = match selected {
        Some(p) => {
            let imputed = if p.score.imputed.is_empty() {
                "none".to_string()
            } else {
                p.score.imputed.join(", ")
            };
            vec![
                Line::from(Span::styled(
                    p.name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                field("id", p.protocol_id.clone()),
                field("symbol", p.symbol.clone().unwrap_or_else(|| NA_LABEL.to_string())),
                field("chain", p.chain.clone().unwrap_or_else(|| NA_LABEL.to_string())),
                Line::raw(""),
                field("revenue", format_usd(p.revenue_period)),
                field("rev / tvl", format_ratio(p.capital_efficiency)),
                field("sector P/S", format_ratio(p.sector_median_ps)),
                Line::raw(""),
                field("valuation", format!("{:.1}", p.score.valuation)),
                field("momentum", format!("{:.1}", p.score.momentum)),
                field("efficiency", format!("{:.1}", p.score.efficiency)),
                field("imputed", imputed),
            ]
        }
        None => vec![Line::from(Span::styled("select a protocol (j/k)", label))],
    };

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " DETAIL ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("reload  "),
        Span::styled("[R] ", Style::default().fg(Color::Yellow)),
        Span::raw("rescore  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("scroll  "),
        Span::styled("* = imputed component  ", Style::default().fg(Color::DarkGray)),
        Span::styled("auto-refresh: 5s", Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
