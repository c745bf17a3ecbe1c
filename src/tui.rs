use anyhow::Result;
use chrono::DateTime;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    symbols,
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Clear, Dataset, GraphType,
        Paragraph, Wrap,
    },
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

use crate::analysis::{self, Comment, Tone};
use crate::coins::{self, Coin};
use crate::config::{AppConfig, Currency, MAX_DAYS, MIN_DAYS};
use crate::indicators::{self, DerivedTable};
use crate::series;
use crate::session::{Cadence, Session, ViewParams, should_refetch};

// --- App State ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    PriceVolume,
    Macd,
    Rsi,
    Returns,
    Commentary,
}

impl View {
    const ALL: [View; 5] = [
        View::PriceVolume,
        View::Macd,
        View::Rsi,
        View::Returns,
        View::Commentary,
    ];

    fn label(&self) -> &'static str {
        match self {
            View::PriceVolume => "Price & Volume",
            View::Macd => "MACD",
            View::Rsi => "RSI",
            View::Returns => "Returns Histogram",
            View::Commentary => "Commentary",
        }
    }
}

/// Result of one background load, handed back over the channel.
struct WorkerResult {
    params: ViewParams,
    coins: Option<Vec<Coin>>,
    catalog_note: Option<String>,
    result: Result<Loaded, String>,
}

struct Loaded {
    coin_name: String,
    table: DerivedTable,
    comments: Vec<Comment>,
    partial: bool,
    from_cache: bool,
}

struct App {
    session: Arc<Mutex<Session>>,
    coins: Vec<Coin>,
    coin_index: usize,
    fallback_coin_id: String,
    currency: Currency,
    days: u32,
    view_index: usize,
    table: Option<DerivedTable>,
    comments: Vec<Comment>,
    shown: Option<ViewParams>,
    shown_coin_name: String,
    status: String,
    status_tone: Tone,
    is_fetching: bool,
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new())),
            coins: Vec::new(),
            coin_index: 0,
            fallback_coin_id: config.coin_id.clone(),
            currency: config.vs_currency,
            days: config.days,
            view_index: 0,
            table: None,
            comments: Vec::new(),
            shown: None,
            shown_coin_name: config.coin_id,
            status: "Press Enter to fetch data.".to_string(),
            status_tone: Tone::Neutral,
            is_fetching: false,
        }
    }

    fn selected_coin_id(&self) -> String {
        self.coins
            .get(self.coin_index)
            .map(|c| c.id.clone())
            .unwrap_or_else(|| self.fallback_coin_id.clone())
    }

    fn current_params(&self) -> ViewParams {
        ViewParams {
            coin_id: self.selected_coin_id(),
            currency: self.currency,
            days: self.days,
        }
    }

    /// Kick off a background load for the current parameters, unless one
    /// is already in flight (the result handler catches up afterwards).
    fn trigger(&mut self, tx: &mpsc::Sender<WorkerResult>) {
        if self.is_fetching {
            return;
        }
        self.is_fetching = true;

        let params = self.current_params();
        let cadence = Cadence::for_days(params.days);
        self.status = match &self.shown {
            Some(shown) if !should_refetch(shown, &params) => {
                format!("Slicing cached data for {} days.", params.days)
            }
            _ => format!(
                "Fetching {} days of {} data for {}...",
                cadence.fetch_days(),
                cadence.label(),
                params.coin_id
            ),
        };
        self.status_tone = Tone::Neutral;

        let session = Arc::clone(&self.session);
        let tx = tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(load(session, params).await).await;
        });
    }

    fn apply(&mut self, result: WorkerResult, tx: &mpsc::Sender<WorkerResult>) {
        self.is_fetching = false;

        if let Some(coins) = result.coins {
            // Keep the selection pointing at the same coin after the list
            // (re)loads.
            let selected = self.selected_coin_id();
            self.coins = coins;
            if let Some(idx) = self.coins.iter().position(|c| c.id == selected) {
                self.coin_index = idx;
            } else {
                self.coin_index = 0;
            }
        }

        let succeeded = result.result.is_ok();
        match result.result {
            Ok(loaded) => {
                let cadence = Cadence::for_days(result.params.days);
                let mut status = if loaded.from_cache {
                    format!(
                        "Using cached {} data for {} — sliced to {} days ({} points).",
                        cadence.label(),
                        loaded.coin_name,
                        result.params.days,
                        loaded.table.len()
                    )
                } else {
                    format!(
                        "Fetched {} days of {} data for {}.",
                        cadence.fetch_days(),
                        cadence.label(),
                        loaded.coin_name
                    )
                };
                self.status_tone = Tone::Positive;
                if loaded.partial {
                    status.push_str(" Fewer hourly points than requested; showing all available.");
                    self.status_tone = Tone::Caution;
                }
                self.status = status;
                self.shown_coin_name = loaded.coin_name;
                self.table = Some(loaded.table);
                self.comments = loaded.comments;
                self.shown = Some(result.params.clone());
            }
            Err(message) => {
                self.status = format!(
                    "{message} — the public API rate limit may have been hit; wait a moment and press Enter."
                );
                self.status_tone = Tone::Negative;
            }
        }

        if let Some(note) = result.catalog_note {
            self.status = format!("{} ({note})", self.status);
        }

        // The user kept adjusting while we were busy; catch up. Failures
        // wait for an explicit retry instead of looping.
        if succeeded && self.current_params() != result.params {
            self.trigger(tx);
        }
    }
}

// --- Background Load ---

async fn load(session: Arc<Mutex<Session>>, params: ViewParams) -> WorkerResult {
    let (catalog_res, window_res) = {
        let mut session = session.lock().await;
        session.refresh(&params).await
    };

    let (coins, catalog_note) = match catalog_res {
        Ok(list) => (Some(coins::display_order(&list)), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let coin_name = coins
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .find(|c| c.id == params.coin_id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| params.coin_id.clone());

    let result = match window_res {
        Ok(window) => {
            let (prices, volumes) = series::align(&window.prices, &window.volumes);
            let table = indicators::compute_indicators(&prices, &volumes);
            if table.is_empty() {
                Err("No overlapping price/volume observations.".to_string())
            } else {
                let comments = analysis::commentary(&coin_name, &table);
                Ok(Loaded {
                    coin_name,
                    table,
                    comments,
                    partial: window.partial,
                    from_cache: window.from_cache,
                })
            }
        }
        Err(e) => Err(e.to_string()),
    };

    WorkerResult {
        params,
        coins,
        catalog_note,
        result,
    }
}

// --- TUI ---

pub async fn run_tui(config: AppConfig) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, config).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, config: AppConfig) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<WorkerResult>(8);
    let mut app = App::new(config);

    // Initial load without waiting for a keypress.
    app.trigger(&tx);

    loop {
        terminal.draw(|f| ui(f, &app))?;

        if let Ok(result) = rx.try_recv() {
            app.apply(result, &tx);
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => {
                    if !handle_key_event(key, &mut app, &tx) {
                        return Ok(());
                    }
                }
                // The next draw picks up the new size.
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }
}

fn handle_key_event(key: KeyEvent, app: &mut App, tx: &mpsc::Sender<WorkerResult>) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return false,
        KeyCode::Enter | KeyCode::F(5) => app.trigger(tx),
        KeyCode::Up => {
            if !app.coins.is_empty() {
                app.coin_index = app
                    .coin_index
                    .checked_sub(1)
                    .unwrap_or(app.coins.len() - 1);
                app.trigger(tx);
            }
        }
        KeyCode::Down => {
            if !app.coins.is_empty() {
                app.coin_index = (app.coin_index + 1) % app.coins.len();
                app.trigger(tx);
            }
        }
        KeyCode::PageUp => {
            if !app.coins.is_empty() {
                app.coin_index = app.coin_index.saturating_sub(10);
                app.trigger(tx);
            }
        }
        KeyCode::PageDown => {
            if !app.coins.is_empty() {
                app.coin_index = (app.coin_index + 10).min(app.coins.len() - 1);
                app.trigger(tx);
            }
        }
        KeyCode::Left => {
            app.days = app.days.saturating_sub(7).max(MIN_DAYS);
            app.trigger(tx);
        }
        KeyCode::Right => {
            app.days = (app.days + 7).min(MAX_DAYS);
            app.trigger(tx);
        }
        KeyCode::Char('-') => {
            app.days = app.days.saturating_sub(1).max(MIN_DAYS);
            app.trigger(tx);
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            app.days = (app.days + 1).min(MAX_DAYS);
            app.trigger(tx);
        }
        KeyCode::Char('c') => {
            app.currency = app.currency.next();
            app.trigger(tx);
        }
        KeyCode::Tab => {
            app.view_index = (app.view_index + 1) % View::ALL.len();
        }
        KeyCode::Char(c) if c.is_ascii_digit() => {
            let digit = c.to_digit(10).unwrap_or(0);
            if digit > 0 && digit <= View::ALL.len() as u32 {
                app.view_index = (digit - 1) as usize;
            }
        }
        _ => {}
    }
    true
}

// --- Rendering ---

fn ui(f: &mut Frame, app: &App) {
    let main_layout =
        Layout::horizontal([Constraint::Percentage(24), Constraint::Percentage(76)])
            .split(f.size());

    sidebar(f, app, main_layout[0]);

    let right =
        Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).split(main_layout[1]);
    status_bar(f, app, right[0]);

    match app.table.as_ref() {
        Some(table) => match View::ALL[app.view_index] {
            View::PriceVolume => price_volume_view(f, app, table, right[1]),
            View::Macd => macd_view(f, app, table, right[1]),
            View::Rsi => rsi_view(f, app, table, right[1]),
            View::Returns => returns_view(f, app, table, right[1]),
            View::Commentary => commentary_view(f, app, table, right[1]),
        },
        None => {
            f.render_widget(
                Paragraph::new("Select a coin, currency and days, then press Enter.")
                    .alignment(Alignment::Center)
                    .block(Block::default().borders(Borders::ALL)),
                right[1],
            );
        }
    }

    if app.is_fetching {
        let area = centered_rect(50, 20, main_layout[1]);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new("Loading market data...\nPlease wait.")
                .block(Block::default().title("Working").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }
}

fn sidebar(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("coindash")
        .title_alignment(Alignment::Center);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Min(3),    // coin list
        Constraint::Length(4), // settings
        Constraint::Length(6), // views
        Constraint::Length(4), // key help
    ])
    .split(inner);

    coin_list(f, app, chunks[0]);

    let cadence = Cadence::for_days(app.days);
    let settings = vec![
        Line::from(""),
        Line::from(format!("Currency: {}", app.currency.as_str().to_uppercase())),
        Line::from(format!(
            "Days: {} ({})",
            app.days,
            cadence.label()
        )),
    ];
    f.render_widget(Paragraph::new(settings), chunks[1]);

    let mut view_lines = vec![Line::from("")];
    view_lines.extend(View::ALL.iter().enumerate().map(|(i, view)| {
        let mut line = Line::from(format!("{}. {}", i + 1, view.label()));
        if i == app.view_index {
            line = line.style(Style::default().fg(Color::Yellow).bg(Color::DarkGray));
        }
        line
    }));
    f.render_widget(Paragraph::new(view_lines), chunks[2]);

    let help = vec![
        Line::from("↑/↓ coin   c currency"),
        Line::from("←/→ days ±7   +/- ±1"),
        Line::from("Tab/1-5 view"),
        Line::from("Enter fetch   q quit"),
    ];
    f.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        chunks[3],
    );
}

fn coin_list(f: &mut Frame, app: &App, area: Rect) {
    if app.coins.is_empty() {
        f.render_widget(
            Paragraph::new("Coin list unavailable.\nUsing configured coin.")
                .style(Style::default().fg(Color::DarkGray)),
            area,
        );
        return;
    }

    let height = area.height as usize;
    let start = app
        .coin_index
        .saturating_sub(height / 2)
        .min(app.coins.len().saturating_sub(height));

    let lines: Vec<Line> = app
        .coins
        .iter()
        .enumerate()
        .skip(start)
        .take(height)
        .map(|(i, coin)| {
            let text = format!("{:<6} {}", coin.symbol.to_uppercase(), coin.name);
            let mut line = Line::from(text);
            if i == app.coin_index {
                line = line.style(Style::default().fg(Color::Yellow).bg(Color::DarkGray));
            }
            line
        })
        .collect();
    f.render_widget(Paragraph::new(lines), area);
}

fn status_bar(f: &mut Frame, app: &App, area: Rect) {
    let last_updated = app
        .table
        .as_ref()
        .and_then(|t| t.timestamps_ms.last().copied())
        .map(format_timestamp)
        .unwrap_or_else(|| "Never".to_string());

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Last data point: {} UTC", last_updated));
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(
        Paragraph::new(app.status.clone()).style(Style::default().fg(tone_color(app.status_tone))),
        inner,
    );
}

fn price_volume_view(f: &mut Frame, app: &App, table: &DerivedTable, area: Rect) {
    let chunks =
        Layout::vertical([Constraint::Percentage(70), Constraint::Percentage(30)]).split(area);

    let price_points = points(&table.timestamps_ms, &table.price);
    let sma10_points = opt_points(&table.timestamps_ms, &table.sma_10);
    let sma30_points = opt_points(&table.timestamps_ms, &table.sma_30);

    let mut datasets = vec![
        Dataset::default()
            .name(format!("{} price", app.shown_coin_name))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&price_points),
    ];
    if !sma10_points.is_empty() {
        datasets.push(
            Dataset::default()
                .name("SMA 10")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow))
                .data(&sma10_points),
        );
    }
    if !sma30_points.is_empty() {
        datasets.push(
            Dataset::default()
                .name("SMA 30")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Red))
                .data(&sma30_points),
        );
    }

    let values = table
        .price
        .iter()
        .chain(table.sma_10.iter().flatten())
        .chain(table.sma_30.iter().flatten());
    let (y_min, y_max) = padded_range(values);

    let shown_days = app.shown.as_ref().map_or(app.days, |p| p.days);
    let shown_currency = app.shown.as_ref().map_or(app.currency, |p| p.currency);
    let title = format!(
        "{} price & moving averages ({} days, {})",
        app.shown_coin_name,
        shown_days,
        shown_currency.as_str().to_uppercase()
    );
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(time_axis(&table.timestamps_ms))
        .y_axis(value_axis(y_min, y_max));
    f.render_widget(chart, chunks[0]);

    volume_bars(f, table, chunks[1]);
}

fn volume_bars(f: &mut Frame, table: &DerivedTable, area: Rect) {
    let capacity = area.width.saturating_sub(2) as usize;
    let n = table.volume.len().min(capacity.max(1));
    let start = table.volume.len() - n;

    let bars: Vec<Bar> = (start..table.volume.len())
        .map(|i| {
            // Rising bars green, falling (or unknown) red.
            let rising = table.price_delta[i].map(|d| d > 0.0).unwrap_or(false);
            let color = if rising { Color::Green } else { Color::Red };
            Bar::default()
                .value(table.volume[i] as u64)
                .style(Style::default().fg(color))
                .text_value(String::new())
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Trading volume (green = price up, red = price down)"),
        )
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);
}

fn macd_view(f: &mut Frame, app: &App, table: &DerivedTable, area: Rect) {
    let chunks =
        Layout::vertical([Constraint::Percentage(60), Constraint::Percentage(40)]).split(area);

    let line_points = points(&table.timestamps_ms, &table.macd_line);
    let signal_points = points(&table.timestamps_ms, &table.macd_signal);
    let zero_line = vec![
        (table.timestamps_ms[0] as f64, 0.0),
        (*table.timestamps_ms.last().unwrap_or(&0) as f64, 0.0),
    ];

    let datasets = vec![
        Dataset::default()
            .name("MACD line")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&line_points),
        Dataset::default()
            .name("Signal")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&signal_points),
        Dataset::default()
            .name("Zero")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&zero_line),
    ];

    let (y_min, y_max) =
        padded_range(table.macd_line.iter().chain(table.macd_signal.iter()).chain([0.0].iter()));

    let mut title = format!("{} MACD (12, 26, 9)", app.shown_coin_name);
    if !table.macd_is_confident() {
        title.push_str(" — warming up, low confidence");
    }
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(time_axis(&table.timestamps_ms))
        .y_axis(value_axis(y_min, y_max));
    f.render_widget(chart, chunks[0]);

    // Histogram: sign carries the color, height the magnitude.
    let capacity = chunks[1].width.saturating_sub(2) as usize;
    let n = table.macd_histogram.len().min(capacity.max(1));
    let start = table.macd_histogram.len() - n;
    let max_abs = table.macd_histogram[start..]
        .iter()
        .fold(0.0f64, |acc, h| acc.max(h.abs()));

    let bars: Vec<Bar> = table.macd_histogram[start..]
        .iter()
        .map(|&h| {
            let color = if h >= 0.0 { Color::Green } else { Color::Red };
            let scaled = if max_abs > 0.0 {
                (h.abs() / max_abs * 100.0) as u64
            } else {
                0
            };
            Bar::default()
                .value(scaled)
                .style(Style::default().fg(color))
                .text_value(String::new())
        })
        .collect();

    let hist = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("MACD histogram (green above signal, red below)"),
        )
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    f.render_widget(hist, chunks[1]);
}

fn rsi_view(f: &mut Frame, app: &App, table: &DerivedTable, area: Rect) {
    let rsi_points = opt_points(&table.timestamps_ms, &table.rsi_14);
    let x_first = table.timestamps_ms[0] as f64;
    let x_last = *table.timestamps_ms.last().unwrap_or(&0) as f64;
    let overbought = vec![(x_first, 70.0), (x_last, 70.0)];
    let oversold = vec![(x_first, 30.0), (x_last, 30.0)];

    let mut datasets = Vec::new();
    if !rsi_points.is_empty() {
        datasets.push(
            Dataset::default()
                .name("RSI 14")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Green))
                .data(&rsi_points),
        );
    }
    datasets.push(
        Dataset::default()
            .name("Overbought (70)")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&overbought),
    );
    datasets.push(
        Dataset::default()
            .name("Oversold (30)")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Blue))
            .data(&oversold),
    );

    let title = if rsi_points.is_empty() {
        format!(
            "{} RSI (14) — not enough data",
            app.shown_coin_name
        )
    } else {
        format!("{} RSI (14)", app.shown_coin_name)
    };

    let y_axis = Axis::default()
        .bounds([0.0, 100.0])
        .labels(vec![
            Span::raw("0"),
            Span::raw("30"),
            Span::raw("70"),
            Span::raw("100"),
        ])
        .style(Style::default().fg(Color::DarkGray));

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(time_axis(&table.timestamps_ms))
        .y_axis(y_axis);
    f.render_widget(chart, area);
}

fn returns_view(f: &mut Frame, app: &App, table: &DerivedTable, area: Rect) {
    let observed: Vec<f64> = table.returns.iter().flatten().copied().collect();
    if observed.len() < 2 {
        f.render_widget(
            Paragraph::new("Not enough return observations for a histogram.")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL)),
            area,
        );
        return;
    }

    let bins = ((area.width.saturating_sub(2)) as usize / 2).clamp(10, 50);
    let (lo, hi, counts) = bin_counts(&observed, bins);

    let bars: Vec<Bar> = counts
        .iter()
        .map(|&count| {
            Bar::default()
                .value(count)
                .style(Style::default().fg(Color::Cyan))
                .text_value(String::new())
        })
        .collect();

    let title = format!(
        "{} distribution of returns (%): {:.2} to {:.2}, {} bins",
        app.shown_coin_name, lo, hi, bins
    );
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .bar_width(1)
        .bar_gap(1)
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);
}

fn commentary_view(f: &mut Frame, app: &App, table: &DerivedTable, area: Rect) {
    let mut lines = Vec::new();

    if let Some(std) = table.volatility() {
        lines.push(Line::from(format!(
            "Std deviation of returns: {std:.2}%"
        )));
    }
    if let Some(ac) = table.autocorrelation_lag1() {
        lines.push(Line::from(format!("Autocorrelation (lag 1): {ac:.4}")));
    }
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }

    let mut last_section = "";
    for comment in &app.comments {
        if comment.section != last_section {
            lines.push(
                Line::from(comment.section).style(Style::default().add_modifier(Modifier::BOLD)),
            );
            last_section = comment.section;
        }
        lines.push(
            Line::from(format!("  {}", comment.text))
                .style(Style::default().fg(tone_color(comment.tone))),
        );
    }

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} automated market analysis", app.shown_coin_name)),
        );
    f.render_widget(paragraph, area);
}

// --- Helpers ---

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Positive => Color::Green,
        Tone::Negative => Color::Red,
        Tone::Caution => Color::Yellow,
        Tone::Neutral => Color::Gray,
    }
}

fn points(timestamps_ms: &[i64], values: &[f64]) -> Vec<(f64, f64)> {
    timestamps_ms
        .iter()
        .zip(values)
        .map(|(&t, &v)| (t as f64, v))
        .collect()
}

fn opt_points(timestamps_ms: &[i64], values: &[Option<f64>]) -> Vec<(f64, f64)> {
    timestamps_ms
        .iter()
        .zip(values)
        .filter_map(|(&t, v)| v.map(|v| (t as f64, v)))
        .collect()
}

/// Min/max over the values with a little headroom so lines never sit on
/// the frame.
fn padded_range<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((max - min) * 0.03).max(max.abs() * 0.001).max(1e-9);
    (min - pad, max + pad)
}

fn time_axis(timestamps_ms: &[i64]) -> Axis<'static> {
    let first = *timestamps_ms.first().unwrap_or(&0);
    let last = *timestamps_ms.last().unwrap_or(&0);
    let mid = first + (last - first) / 2;
    Axis::default()
        .bounds([first as f64, last as f64])
        .labels(vec![
            Span::raw(format_day(first)),
            Span::raw(format_day(mid)),
            Span::raw(format_day(last)),
        ])
        .style(Style::default().fg(Color::DarkGray))
}

fn value_axis(min: f64, max: f64) -> Axis<'static> {
    let mid = (min + max) / 2.0;
    Axis::default()
        .bounds([min, max])
        .labels(vec![
            Span::raw(format!("{min:.2}")),
            Span::raw(format!("{mid:.2}")),
            Span::raw(format!("{max:.2}")),
        ])
        .style(Style::default().fg(Color::DarkGray))
}

/// Histogram bin counts over [min, max] of the observations.
fn bin_counts(values: &[f64], bins: usize) -> (f64, f64, Vec<u64>) {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut counts = vec![0u64; bins];
    if hi <= lo {
        counts[0] = values.len() as u64;
        return (lo, hi, counts);
    }
    let width = (hi - lo) / bins as f64;
    for &v in values {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    (lo, hi, counts)
}

fn format_day(ts_ms: i64) -> String {
    let seconds = ts_ms / 1000;
    DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.format("%d-%m-%y").to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn format_timestamp(ts_ms: i64) -> String {
    let seconds = ts_ms / 1000;
    let nanoseconds = (ts_ms % 1000 * 1_000_000) as u32;
    DateTime::from_timestamp(seconds, nanoseconds)
        .map(|dt| dt.format("%d-%m-%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown Time".to_string())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_counts_cover_every_observation() {
        let values = [-1.0, -0.5, 0.0, 0.5, 1.0, 1.0];
        let (lo, hi, counts) = bin_counts(&values, 4);
        assert_eq!(lo, -1.0);
        assert_eq!(hi, 1.0);
        assert_eq!(counts.iter().sum::<u64>(), values.len() as u64);
        // Max values land in the last bin, not out of range.
        assert!(counts[3] >= 2);
    }

    #[test]
    fn bin_counts_with_identical_values_fill_one_bin() {
        let (_, _, counts) = bin_counts(&[2.0, 2.0, 2.0], 5);
        assert_eq!(counts[0], 3);
        assert_eq!(counts.iter().sum::<u64>(), 3);
    }

    #[test]
    fn padded_range_is_strictly_wider_than_the_data() {
        let values = [1.0, 2.0, 3.0];
        let (lo, hi) = padded_range(values.iter());
        assert!(lo < 1.0);
        assert!(hi > 3.0);
    }

    #[test]
    fn opt_points_skip_missing_values() {
        let ts = [1, 2, 3];
        let values = [None, Some(5.0), None];
        assert_eq!(opt_points(&ts, &values), vec![(2.0, 5.0)]);
    }
}
