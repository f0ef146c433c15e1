use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dish_ledger::analysis::{BreakdownEntry, BreakdownKey, FinancialReport, LedgerTable};
use dish_ledger::entities::{Transaction, TransactionType};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Ledger,
    Breakdown,
    Transactions,
    Warnings,
}

impl Page {
    const ALL: [Page; 4] = [Page::Ledger, Page::Breakdown, Page::Transactions, Page::Warnings];

    pub fn next(&self) -> Self {
        match self {
            Page::Ledger => Page::Breakdown,
            Page::Breakdown => Page::Transactions,
            Page::Transactions => Page::Warnings,
            Page::Warnings => Page::Ledger,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Ledger => Page::Warnings,
            Page::Breakdown => Page::Ledger,
            Page::Transactions => Page::Breakdown,
            Page::Warnings => Page::Transactions,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Ledger => "Ledger",
            Page::Breakdown => "Breakdown",
            Page::Transactions => "Transactions",
            Page::Warnings => "Warnings",
        }
    }
}

pub struct App {
    pub year: i32,
    pub ledger: LedgerTable,
    pub report: FinancialReport,
    pub transactions: Vec<Transaction>,
    pub state: TableState,
    pub current_page: Page,
    pub breakdown_key: BreakdownKey,
    pub show_detail: bool,
}

impl App {
    pub fn new(
        year: i32,
        ledger: LedgerTable,
        report: FinancialReport,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut state = TableState::default();
        if !transactions.is_empty() {
            state.select(Some(0));
        }

        Self {
            year,
            ledger,
            report,
            transactions,
            state,
            current_page: Page::Ledger,
            breakdown_key: BreakdownKey::Category,
            show_detail: false,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn toggle_breakdown(&mut self) {
        self.breakdown_key = match self.breakdown_key {
            BreakdownKey::Category => BreakdownKey::Supplier,
            BreakdownKey::Supplier => BreakdownKey::Category,
        };
    }

    pub fn breakdown_entries(&self) -> &[BreakdownEntry] {
        match self.breakdown_key {
            BreakdownKey::Category => &self.report.categories,
            BreakdownKey::Supplier => &self.report.suppliers,
        }
    }

    pub fn selected_transaction(&self) -> Option<&Transaction> {
        self.state.selected().and_then(|i| self.transactions.get(i))
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next(&mut self) {
        let len = self.transactions.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.transactions.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.transactions.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 20).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(20));
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('s') if app.current_page == Page::Breakdown => app.toggle_breakdown(),
                KeyCode::Enter if app.current_page == Page::Transactions => app.toggle_detail(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => {
                    if !app.transactions.is_empty() {
                        app.state.select(Some(app.transactions.len() - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Transactions {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_transactions(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Ledger => render_ledger(f, chunks[1], app),
            Page::Breakdown => render_breakdown(f, chunks[1], app),
            Page::Transactions => render_transactions(f, chunks[1], app),
            Page::Warnings => render_warnings(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn header_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

fn balance_color(value: f64) -> Color {
    if value < 0.0 {
        Color::Red
    } else {
        Color::Green
    }
}

fn type_color(kind: TransactionType) -> Color {
    match kind {
        TransactionType::Income => Color::Green,
        TransactionType::Expense => Color::Red,
    }
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    let overview = &app.report.overview;
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Year: {}", app.year),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("↑ {}", money(overview.total_income)),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("↓ {}", money(overview.total_expense)),
        Style::default().fg(Color::Red),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("= {}", money(overview.balance)),
        Style::default().fg(balance_color(overview.balance)),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_ledger(f: &mut Frame, area: Rect, app: &App) {
    let header = Row::new(
        ["Month", "Income", "Expense", "Balance"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let mut rows: Vec<Row> = app
        .ledger
        .months
        .iter()
        .map(|m| {
            Row::new(vec![
                Cell::from(m.month.clone()),
                Cell::from(money(m.income)).style(Style::default().fg(Color::Green)),
                Cell::from(money(m.expense)).style(Style::default().fg(Color::Red)),
                Cell::from(money(m.balance)).style(Style::default().fg(balance_color(m.balance))),
            ])
        })
        .collect();

    rows.push(
        Row::new(vec![
            Cell::from("Total"),
            Cell::from(money(app.ledger.total_income)),
            Cell::from(money(app.ledger.total_expense)),
            Cell::from(money(app.ledger.total_balance))
                .style(Style::default().fg(balance_color(app.ledger.total_balance))),
        ])
        .style(Style::default().add_modifier(Modifier::BOLD)),
    );

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(16),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Ledger {} ", app.ledger.year)),
    );

    f.render_widget(table, area);
}

fn render_breakdown(f: &mut Frame, area: Rect, app: &App) {
    let (title, name_header) = match app.breakdown_key {
        BreakdownKey::Category => (" By Category ", "Category"),
        BreakdownKey::Supplier => (" By Supplier ", "Supplier"),
    };

    let header = Row::new(
        [name_header, "Income", "Expense", "Balance", "Income %", "Expense %"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.breakdown_entries().iter().map(|entry| {
        Row::new(vec![
            Cell::from(truncate(&entry.name, 20)),
            Cell::from(money(entry.income)).style(Style::default().fg(Color::Green)),
            Cell::from(money(entry.expense)).style(Style::default().fg(Color::Red)),
            Cell::from(money(entry.balance)).style(Style::default().fg(balance_color(entry.balance))),
            Cell::from(format!("{:.1}%", entry.income_percent)),
            Cell::from(format!("{:.1}%", entry.expense_percent)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(22),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    );

    f.render_widget(table, area);
}

fn render_transactions(f: &mut Frame, area: Rect, app: &mut App) {
    let header = Row::new(
        ["Date", "Type", "Amount", "Category", "Account", "Supplier"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.transactions.iter().map(|tx| {
        let color = type_color(tx.kind);
        Row::new(vec![
            Cell::from(tx.date.clone()),
            Cell::from(tx.kind.as_str()).style(Style::default().fg(color)),
            Cell::from(money(tx.amount)).style(Style::default().fg(color)),
            Cell::from(truncate(&tx.category, 16)),
            Cell::from(truncate(&tx.account, 12)),
            Cell::from(truncate(tx.supplier.as_deref().unwrap_or("-"), 20)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(18),
            Constraint::Length(14),
            Constraint::Length(22),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Transactions "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_warnings(f: &mut Frame, area: Rect, app: &App) {
    let warnings = &app.report.warnings;
    let thresholds = &app.report.thresholds;
    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let mut content = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Thresholds: ", label),
            Span::raw(format!(
                "expense > income × {:.2} | month balance < {:.2} | year balance < {:.2}",
                1.0 + thresholds.expense_threshold,
                thresholds.balance_threshold,
                thresholds.year_balance_threshold
            )),
        ]),
        Line::from(""),
    ];

    if warnings.is_empty() {
        content.push(Line::from(Span::styled(
            "  ✓ No warnings",
            Style::default().fg(Color::Green),
        )));
    }

    if let Some(year) = &warnings.year {
        content.push(Line::from(Span::styled(
            format!("  ⚠ {}", year.message),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        content.push(Line::from(""));
    }

    for alert in &warnings.expense_alerts {
        content.push(Line::from(vec![
            Span::styled(format!("  {} ", alert.month), label),
            Span::styled(
                format!(
                    "expense {} exceeds income {} by {:.1}%",
                    money(alert.expense),
                    money(alert.income),
                    alert.excess_percent
                ),
                Style::default().fg(Color::Yellow),
            ),
        ]));
    }

    for alert in &warnings.balance_alerts {
        content.push(Line::from(vec![
            Span::styled(format!("  {} ", alert.month), label),
            Span::styled(
                format!("balance {}", money(alert.balance)),
                Style::default().fg(Color::Red),
            ),
        ]));
    }

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Warnings ({}) ", warnings.count())),
    );

    f.render_widget(paragraph, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Transaction Details ");

    let Some(tx) = app.selected_transaction() else {
        f.render_widget(Paragraph::new("No transaction selected").block(block), area);
        return;
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let field = |name: &str, value: String| {
        Line::from(vec![Span::styled(format!("  {name}: "), label), Span::raw(value)])
    };

    let content = vec![
        Line::from(""),
        field("Id", tx.id.to_string()),
        field("Date", tx.date.clone()),
        Line::from(vec![
            Span::styled("  Amount: ", label),
            Span::styled(money(tx.amount), Style::default().fg(type_color(tx.kind))),
            Span::raw(format!(" ({})", tx.kind)),
        ]),
        field("Category", tx.category.clone()),
        field("Account", tx.account.clone()),
        field("Supplier", tx.supplier.clone().unwrap_or_else(|| "-".to_string())),
        field("Created", tx.created_at.clone().unwrap_or_default()),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                tx.description.clone(),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  Press Enter to close",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    match app.current_page {
        Page::Transactions => {
            let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
            status_spans.push(Span::styled(
                format!(" Row: {}/{} ", selected, app.transactions.len()),
                Style::default().fg(Color::Cyan),
            ));
            status_spans.push(Span::raw(" | "));
            status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
            status_spans.push(Span::raw(" Details | "));
            status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
            status_spans.push(Span::raw(" Nav | "));
            status_spans.push(Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)));
            status_spans.push(Span::raw(" Fast | "));
        }
        Page::Breakdown => {
            status_spans.push(Span::styled("s", Style::default().fg(Color::Yellow)));
            status_spans.push(Span::raw(" Category/Supplier | "));
        }
        Page::Ledger | Page::Warnings => {}
    }

    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

/// Character-based, so CJK names never split inside a code point
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dish_ledger::analysis::{AnalysisData, Thresholds};

    fn app(transactions: usize) -> App {
        let transactions = (0..transactions)
            .map(|i| Transaction {
                id: i as i64 + 1,
                kind: TransactionType::Expense,
                amount: 10.0,
                description: String::new(),
                date: "2024-01-01".to_string(),
                category: "食材".to_string(),
                account: "现金".to_string(),
                supplier: None,
                created_at: None,
            })
            .collect();
        let report = FinancialReport::build(&AnalysisData::default(), &Thresholds::default());
        App::new(2024, LedgerTable::build(2024, &[]), report, transactions)
    }

    #[test]
    fn test_page_cycle() {
        let mut app = app(0);
        for _ in 0..4 {
            app.next_page();
        }
        assert_eq!(app.current_page, Page::Ledger);
        app.previous_page();
        assert_eq!(app.current_page, Page::Warnings);
    }

    #[test]
    fn test_row_navigation_wraps() {
        let mut app = app(3);
        app.previous();
        assert_eq!(app.state.selected(), Some(2));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.page_down();
        assert_eq!(app.state.selected(), Some(2));
        app.page_up();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("新鲜蔬菜批发市场", 5), "新鲜...");
        assert_eq!(truncate("肉类", 5), "肉类");
    }
}
