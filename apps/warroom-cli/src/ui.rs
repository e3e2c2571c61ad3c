use std::{
    collections::VecDeque,
    sync::{
        mpsc::{Receiver, TryRecvError},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use crossterm::{
    event::{self, Event as CEvent, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, BarChart, Block, Borders, Chart, Dataset, GraphType, List, ListItem, Paragraph,
        Sparkline, Tabs, Wrap,
    },
    Frame, Terminal,
};
use tokio::runtime::Handle;
use warroom_gateway::StatsGateway;
use warroom_poller::LiveSnapshotPoller;
use warroom_types::{
    dashboard::{DashboardData, TrendRange},
    events::{PollEvent, PollPayload},
    status::StatusTier,
};
use warroom_view::{share_percentages, DashboardMode, DashboardView, Tile};

const MAX_LOG_ENTRIES: usize = 120;

pub enum UiMessage {
    Event(PollEvent),
}

struct App {
    mode: DashboardMode,
    range: TrendRange,
    logs: VecDeque<String>,
    last_status: String,
}

impl App {
    fn push_log(&mut self, line: String) {
        if self.logs.len() == MAX_LOG_ENTRIES {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }
}

pub fn run<G: StatsGateway + 'static>(
    receiver: Receiver<UiMessage>,
    poller: Arc<LiveSnapshotPoller<G>>,
    runtime: Handle,
    data: DashboardData,
    range: TrendRange,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let res = run_loop(&mut terminal, receiver, poller, runtime, &data, range);

    terminal.show_cursor()?;
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    res
}

fn run_loop<B: ratatui::backend::Backend, G: StatsGateway + 'static>(
    terminal: &mut Terminal<B>,
    receiver: Receiver<UiMessage>,
    poller: Arc<LiveSnapshotPoller<G>>,
    runtime: Handle,
    data: &DashboardData,
    range: TrendRange,
) -> Result<()> {
    let mut app = App {
        mode: DashboardMode::default(),
        range,
        logs: VecDeque::with_capacity(MAX_LOG_ENTRIES),
        last_status: String::from("waiting for first poll"),
    };

    loop {
        loop {
            match receiver.try_recv() {
                Ok(UiMessage::Event(event)) => {
                    app.last_status = summarize_status(&event);
                    app.push_log(format_event(&event));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }

        let view = DashboardView::build(
            data,
            &poller.state(),
            app.range,
            poller.standing_warning(),
        );
        terminal.draw(|f| draw(f, &app, &view))?;

        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Tab | KeyCode::Right => app.mode = app.mode.next(),
                    KeyCode::BackTab | KeyCode::Left => app.mode = app.mode.previous(),
                    KeyCode::Char('1') => app.range = TrendRange::Week,
                    KeyCode::Char('2') => app.range = TrendRange::Month,
                    KeyCode::Char('3') => app.range = TrendRange::Quarter,
                    KeyCode::Char('r') => {
                        let poller = Arc::clone(&poller);
                        runtime.spawn(async move {
                            poller.poll_once().await;
                        });
                        app.push_log("manual refresh requested".into());
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

fn draw(f: &mut Frame, app: &App, view: &DashboardView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(7),
        ])
        .split(f.size());

    draw_header(f, chunks[0], app, view);
    draw_tiles(f, chunks[1], view);

    let titles: Vec<Line> = DashboardMode::ALL
        .iter()
        .map(|mode| Line::from(mode.label()))
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.mode.index())
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title(format!(
            "{}  [Tab] mode  [1/2/3] range  [r] refresh  [q] quit",
            app.range.label()
        )));
    f.render_widget(tabs, chunks[2]);

    match app.mode {
        DashboardMode::Overview => draw_overview(f, chunks[3], view),
        DashboardMode::Traffic => draw_traffic(f, chunks[3], view),
        DashboardMode::Content => draw_content(f, chunks[3], view),
        DashboardMode::Risks => draw_risks(f, chunks[3], view),
        DashboardMode::Plan => draw_plan(f, chunks[3], view),
    }

    let items: Vec<ListItem> = app
        .logs
        .iter()
        .rev()
        .map(|entry| ListItem::new(entry.clone()))
        .collect();
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Poller | {}", app.last_status)),
    );
    f.render_widget(list, chunks[4]);
}

fn tier_color(tier: StatusTier) -> Color {
    match tier {
        StatusTier::Healthy => Color::Green,
        StatusTier::Warning => Color::Yellow,
        StatusTier::Risk => Color::Red,
        StatusTier::Unknown => Color::DarkGray,
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App, view: &DashboardView) {
    let header = &view.header;
    let mut title = vec![
        Span::styled(
            header.title.clone(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            header.positioning.clone(),
            Style::default().fg(Color::Magenta),
        ),
    ];
    if let Some(pill) = header.live_pill {
        title.push(Span::raw("  "));
        title.push(Span::styled(
            format!(" {pill} "),
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let mut meta = vec![Span::raw(format!("{} | {}", header.platform, header.stage))];
    if let Some(followers) = &header.followers {
        meta.push(Span::raw(format!("  followers {followers}")));
    }
    if let Some(updated) = header.last_updated {
        meta.push(Span::raw(format!(
            "  updated {}",
            updated.format("%H:%M:%S")
        )));
    }

    let mut lines = vec![
        Line::from(title),
        Line::from(Span::raw(header.subtitle.clone())),
        Line::from(meta),
    ];
    if let Some(warning) = &view.standing_warning {
        lines.push(Line::from(Span::styled(
            format!("! {warning}"),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(app.mode.label());
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_tiles(f: &mut Frame, area: Rect, view: &DashboardView) {
    let count = view.tiles.len().max(1) as u32;
    let constraints: Vec<Constraint> = (0..count).map(|_| Constraint::Ratio(1, count)).collect();
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (tile, cell) in view.tiles.iter().zip(cells.iter()) {
        let color = tier_color(tile.tier());
        let (value, sub, note, highlight) = match tile {
            Tile::Kpi(kpi) => (
                kpi.value.clone(),
                kpi.unit.clone(),
                kpi.warning.clone(),
                false,
            ),
            Tile::Viewers { tile, .. } => (
                tile.value.clone(),
                tile.sub.to_string(),
                tile.advisory.map(str::to_string),
                tile.highlight,
            ),
        };

        let mut lines = vec![
            Line::from(Span::styled(
                value,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(sub, Style::default().fg(Color::Gray))),
        ];
        if let Some(note) = note {
            lines.push(Line::from(Span::styled(
                note,
                Style::default().fg(Color::Yellow),
            )));
        }

        let border = if highlight {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(tile.label().to_string());
        f.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
            *cell,
        );
    }
}

fn axis_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (min, max) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min > max {
        [0.0, 1.0]
    } else {
        [min.floor(), max.ceil().max(min.floor() + 1.0)]
    }
}

fn bound_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    vec![
        Span::raw(format!("{}", bounds[0])),
        Span::raw(format!("{}", bounds[1])),
    ]
}

fn draw_overview(f: &mut Frame, area: Rect, view: &DashboardView) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let acv: Vec<(f64, f64)> = view
        .trend
        .iter()
        .map(|p| (f64::from(p.day), p.acv as f64))
        .collect();
    let followers: Vec<(f64, f64)> = view
        .trend
        .iter()
        .map(|p| (f64::from(p.day), p.followers as f64))
        .collect();
    let x = axis_bounds(acv.iter().map(|(d, _)| *d));

    let acv_chart = Chart::new(vec![Dataset::default()
        .name("ACV")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&acv)])
    .block(Block::default().borders(Borders::ALL).title("Average concurrent viewers"))
    .x_axis(Axis::default().title("day").bounds(x).labels(bound_labels(x)))
    .y_axis({
        let y = axis_bounds(acv.iter().map(|(_, v)| *v));
        Axis::default().bounds(y).labels(bound_labels(y))
    });
    f.render_widget(acv_chart, halves[0]);

    let follower_chart = Chart::new(vec![Dataset::default()
        .name("new followers")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(&followers)])
    .block(Block::default().borders(Borders::ALL).title("Daily new followers"))
    .x_axis(Axis::default().title("day").bounds(x).labels(bound_labels(x)))
    .y_axis({
        let y = axis_bounds(followers.iter().map(|(_, v)| *v));
        Axis::default().bounds(y).labels(bound_labels(y))
    });
    f.render_widget(follower_chart, halves[1]);
}

fn draw_traffic(f: &mut Frame, area: Rect, view: &DashboardView) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let shares = share_percentages(&view.traffic);
    let bars: Vec<(&str, u64)> = shares
        .iter()
        .map(|(name, pct)| (name.as_str(), u64::from(*pct)))
        .collect();
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("Traffic sources (%)"))
        .data(bars.as_slice())
        .bar_width(12)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    f.render_widget(chart, halves[0]);

    let clips: Vec<u64> = view
        .trend
        .iter()
        .map(|p| u64::try_from(p.clips).unwrap_or(0))
        .collect();
    let sparkline = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title("Clips per day"))
        .data(&clips)
        .style(Style::default().fg(Color::Magenta));
    f.render_widget(sparkline, halves[1]);
}

fn draw_content(f: &mut Frame, area: Rect, view: &DashboardView) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    const COLORS: [Color; 4] = [Color::Cyan, Color::Green, Color::Yellow, Color::Magenta];
    let points: Vec<Vec<(f64, f64)>> = view
        .content_matrix
        .iter()
        .map(|p| vec![(f64::from(p.x), f64::from(p.y))])
        .collect();
    let datasets: Vec<Dataset> = view
        .content_matrix
        .iter()
        .zip(points.iter())
        .enumerate()
        .map(|(idx, (point, data))| {
            Dataset::default()
                .name(point.name.clone())
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(COLORS[idx % COLORS.len()]))
                .data(data)
        })
        .collect();
    let bounds = [0.0, 100.0];
    let matrix = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title("Content matrix"))
        .x_axis(
            Axis::default()
                .title("growth potential")
                .bounds(bounds)
                .labels(bound_labels(bounds)),
        )
        .y_axis(
            Axis::default()
                .title("stability")
                .bounds(bounds)
                .labels(bound_labels(bounds)),
        );
    f.render_widget(matrix, halves[0]);

    let items: Vec<ListItem> = view
        .content_mix
        .iter()
        .map(|c| {
            ListItem::new(format!(
                "{:<18} {:>3}%  stability {:>3}  growth {:>3}",
                c.kind, c.share, c.stability, c.growth
            ))
        })
        .collect();
    f.render_widget(
        List::new(items).block(Block::default().borders(Borders::ALL).title("Content mix")),
        halves[1],
    );
}

fn draw_risks(f: &mut Frame, area: Rect, view: &DashboardView) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let items: Vec<ListItem> = view
        .risks
        .iter()
        .map(|r| {
            let filled = (r.score.min(100) / 5) as usize;
            ListItem::new(Line::from(vec![
                Span::raw(format!("{:<22} {:>3} ", r.subject, r.score)),
                Span::styled(
                    "█".repeat(filled),
                    Style::default().fg(if r.score >= 70 { Color::Red } else { Color::Yellow }),
                ),
            ]))
        })
        .collect();
    f.render_widget(
        List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Risk radar | overall {}/100", view.risk_score)),
        ),
        halves[0],
    );

    let shares = share_percentages(&view.monetization);
    let bars: Vec<(&str, u64)> = shares
        .iter()
        .map(|(name, pct)| (name.as_str(), u64::from(*pct)))
        .collect();
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("Monetization mix (%)"))
        .data(bars.as_slice())
        .bar_width(10)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Yellow))
        .value_style(Style::default().fg(Color::Black).bg(Color::Yellow));
    f.render_widget(chart, halves[1]);
}

fn draw_plan(f: &mut Frame, area: Rect, view: &DashboardView) {
    let count = view.phases.len().max(1) as u32;
    let constraints: Vec<Constraint> = (0..count).map(|_| Constraint::Ratio(1, count)).collect();
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (phase, column) in view.phases.iter().zip(columns.iter()) {
        let mut lines = vec![
            Line::from(Span::styled(
                phase.goal.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];
        lines.extend(phase.bullets.iter().map(|b| Line::from(format!("- {b}"))));
        lines.push(Line::from(""));
        lines.extend(phase.kpis.iter().map(|k| {
            Line::from(Span::styled(
                format!("* {k}"),
                Style::default().fg(Color::Green),
            ))
        }));
        f.render_widget(
            Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title(phase.title.clone()))
                .wrap(Wrap { trim: true }),
            *column,
        );
    }
}

fn summarize_status(event: &PollEvent) -> String {
    match &event.payload {
        PollPayload::Started { interval_ms } => format!("polling every {}s", interval_ms / 1000),
        PollPayload::SnapshotUpdated(snapshot) if snapshot.is_live => {
            format!("live, {} viewers", snapshot.current_viewers)
        }
        PollPayload::SnapshotUpdated(_) => "channel offline".to_string(),
        PollPayload::FetchFailed(failure) => format!(
            "last fetch failed ({} in a row), showing last snapshot",
            failure.consecutive_failures
        ),
        PollPayload::Discarded => "stale result dropped".to_string(),
        PollPayload::StandingWarning { .. } => "needs attention".to_string(),
        PollPayload::Stopped => "stopped".to_string(),
    }
}

fn format_event(event: &PollEvent) -> String {
    let timestamp = event.timestamp.format("%H:%M:%S");
    match &event.payload {
        PollPayload::Started { interval_ms } => {
            format!("[{timestamp}] Started interval={interval_ms}ms")
        }
        PollPayload::SnapshotUpdated(snapshot) => format!(
            "[{timestamp}] Snapshot live={} viewers={} followers={}",
            snapshot.is_live, snapshot.current_viewers, snapshot.total_followers
        ),
        PollPayload::FetchFailed(failure) => format!(
            "[{timestamp}] FetchFailed kind={} {}",
            failure.kind.as_str(),
            failure.message
        ),
        PollPayload::Discarded => format!("[{timestamp}] Discarded result after stop"),
        PollPayload::StandingWarning { message } => format!("[{timestamp}] Warning {message}"),
        PollPayload::Stopped => format!("[{timestamp}] Stopped"),
    }
}
