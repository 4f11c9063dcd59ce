use std::ptr;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use super::app::{App, InputMode, Modal, View};
use super::form::{EditForm, FormModel};
use super::grouping::{group_by_date, total};
use super::notice::NoticeLevel;
use crate::api::EntityService;
use crate::models::criteria::ListCriteria;

/// Draw the whole screen for the current state.
pub fn draw(f: &mut Frame, app: &App) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(1), Constraint::Min(3), Constraint::Length(3)].as_ref())
        .split(size);

    render_notice(f, app, chunks[0]);
    match app.current_view {
        View::Expenses => render_expense_list(f, app, chunks[1]),
        View::Categories => render_category_list(f, app, chunks[1]),
    }
    render_help_panel(f, app, chunks[2]);

    for modal in &app.modals {
        match modal {
            Modal::Category(form) => render_form(f, form, size),
            Modal::Expense(form) => render_form(f, form, size),
        }
    }

    match app.input_mode {
        InputMode::Searching => render_search_prompt(f, app, size),
        InputMode::Confirming => render_confirm(f, app, size),
        InputMode::Normal | InputMode::Form => {}
    }
}

fn render_notice(f: &mut Frame, app: &App, area: Rect) {
    let line = match &app.notice {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Danger => Color::Red,
            };
            Line::from(Span::styled(
                notice.message.as_str(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))
        }
        None if app.is_loading() => Line::from(Span::styled("Loading...", Style::default().fg(Color::DarkGray))),
        None => Line::from(""),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn list_title<S: EntityService>(label: &str, list: &super::list::ListView<S>) -> String {
    let criteria = list.criteria();
    let mut title = format!(
        "{} ({} total) page {}/{} sort {}",
        label,
        list.total_elements(),
        criteria.page() + 1,
        list.page_count(),
        criteria.sort().label()
    );
    if let Some(name) = criteria.name() {
        title.push_str(&format!(" filter \"{name}\""));
    }
    title
}

pub fn render_expense_list(f: &mut Frame, app: &App, area: Rect) {
    let expenses = app.expenses.items();
    let label = format!("Expenses {} total {:.2}", app.month.label(), total(expenses));
    let title = list_title(&label, &app.expenses);

    let mut state = ListState::default();
    let items: Vec<ListItem> = if app.expenses.criteria().sort.field == "date" {
        let selected = app.expenses.selected();
        let mut items = Vec::new();
        for group in group_by_date(expenses) {
            items.push(ListItem::new(Line::from(vec![
                Span::styled(
                    group.date.format("%A, %d %B %Y").to_string(),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("  {:.2}", group.total), Style::default().fg(Color::DarkGray)),
            ])));
            for expense in group.expenses {
                if selected.is_some_and(|s| ptr::eq(s, expense)) {
                    state.select(Some(items.len()));
                }
                items.push(expense.to_list_item());
            }
        }
        items
    } else {
        state.select(app.expenses.selected_index());
        expenses.iter().map(|e| e.to_list_item()).collect()
    };

    let items = if items.is_empty() {
        vec![ListItem::new(Line::from(Span::styled(
            "No expenses found",
            Style::default().fg(Color::DarkGray),
        )))]
    } else {
        items
    };

    let list = List::new(items)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED).add_modifier(Modifier::BOLD))
        .highlight_symbol("➤ ");

    f.render_stateful_widget(list, area, &mut state);
}

pub fn render_category_list(f: &mut Frame, app: &App, area: Rect) {
    let title = list_title("Categories", &app.categories);

    let items: Vec<ListItem> = if app.categories.items().is_empty() {
        vec![ListItem::new(Line::from(Span::styled(
            "No categories found",
            Style::default().fg(Color::DarkGray),
        )))]
    } else {
        app.categories.items().iter().map(|c| c.to_list_item()).collect()
    };

    let list = List::new(items)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED).add_modifier(Modifier::BOLD))
        .highlight_symbol("➤ ");

    f.render_stateful_widget(list, area, &mut app.categories.list_state.clone());
}

pub fn render_form<S, M>(f: &mut Frame, form: &EditForm<S, M>, area: Rect)
where
    S: EntityService,
    M: FormModel<S::Entity, Upsert = S::Upsert>,
{
    let mut text = Vec::new();
    for (i, label) in form.model.labels().iter().enumerate() {
        let focused = i == form.focus;
        let value_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let cursor = if focused { "_" } else { "" };
        text.push(Line::from(vec![
            Span::raw(format!("{:<10}", format!("{label}:"))),
            Span::styled(format!("{}{}", form.model.value(i), cursor), value_style),
        ]));
        if let Some(error) = form.field_error(&label.to_lowercase()) {
            text.push(Line::from(Span::styled(
                format!("          {error}"),
                Style::default().fg(Color::Red),
            )));
        }
    }

    text.push(Line::from(""));
    if let Some(pending) = form.pending() {
        text.push(Line::from(Span::styled(pending.label(), Style::default().fg(Color::DarkGray))));
    } else if !form.error_message().is_empty() {
        text.push(Line::from(Span::styled(
            form.error_message(),
            Style::default().fg(Color::Red),
        )));
    }

    let mut hints = vec![
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" save • "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" next field • "),
        Span::styled("Esc", Style::default().fg(Color::Yellow)),
        Span::raw(" cancel"),
    ];
    if form.is_edit() {
        hints.push(Span::raw(" • "));
        hints.push(Span::styled("Ctrl-D", Style::default().fg(Color::Yellow)));
        hints.push(Span::raw(" delete"));
    }
    if form.model.labels().len() > 1 {
        hints.push(Span::raw(" • "));
        hints.push(Span::styled("←/→", Style::default().fg(Color::Yellow)));
        hints.push(Span::raw(" category • "));
        hints.push(Span::styled("Ctrl-N", Style::default().fg(Color::Yellow)));
        hints.push(Span::raw(" new category"));
    }
    text.push(Line::from(hints));

    let block = Block::default()
        .title(form.title())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: false });

    let popup_area = centered_rect(60, 50, area);
    f.render_widget(Clear, popup_area);
    f.render_widget(paragraph, popup_area);
}

fn render_search_prompt(f: &mut Frame, app: &App, area: Rect) {
    let placeholder = match app.current_view {
        View::Expenses => "Search expenses by name...",
        View::Categories => "Search categories by name...",
    };
    let text = app.search_text();

    let input = Paragraph::new(if text.is_empty() {
        Line::from(placeholder).style(Style::default().fg(Color::DarkGray))
    } else {
        Line::from(text)
    })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Search (Enter to close, Esc to clear)")
            .border_style(Style::default().fg(Color::Yellow)),
    );

    let popup_area = centered_rect(60, 10, area);
    let shadow_area = Rect::new(popup_area.x + 1, popup_area.y + 1, popup_area.width, popup_area.height)
        .intersection(area);
    f.render_widget(Clear, shadow_area);
    f.render_widget(Block::default().style(Style::default().bg(Color::DarkGray)), shadow_area);

    f.render_widget(Clear, popup_area);
    f.render_widget(input, popup_area);
}

fn render_confirm(f: &mut Frame, app: &App, area: Rect) {
    let Some(prompt) = &app.confirm else {
        return;
    };

    let text = vec![
        Line::from(prompt.message.as_str()),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::raw(" delete • "),
            Span::styled("n", Style::default().fg(Color::Yellow)),
            Span::raw(" keep"),
        ]),
    ];

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .title(prompt.header.as_str())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    let popup_area = centered_rect(50, 25, area);
    f.render_widget(Clear, popup_area);
    f.render_widget(paragraph, popup_area);
}

pub fn render_help_panel(f: &mut Frame, app: &App, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let mut spans = vec![
        key("↑/↓"),
        Span::raw(" Move • "),
        key("Tab"),
        Span::raw(" View • "),
        key("/"),
        Span::raw(" Search • "),
        key("s"),
        Span::raw(" Sort • "),
        key("a"),
        Span::raw(" Add • "),
        key("Enter"),
        Span::raw(" Edit • "),
        key("PgUp/PgDn"),
        Span::raw(" Page • "),
    ];
    if app.current_view == View::Expenses {
        spans.push(key("←/→"));
        spans.push(Span::raw(" Month • "));
    }
    spans.push(key("r"));
    spans.push(Span::raw(" Reload • "));
    spans.push(key("q"));
    spans.push(Span::raw(" Quit"));

    let help = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Help "),
        )
        .alignment(Alignment::Center);

    f.render_widget(help, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let layout = Layout::default()
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
        .split(layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::RecordingTransport;
    use crate::api::{ApiClient, CategoryService, ExpenseService};
    use crate::models::criteria::{CategoryCriteria, ExpenseCriteria};
    use ratatui::{Terminal, backend::TestBackend};
    use std::sync::Arc;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::time::{Duration, Instant};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[tokio::test]
    async fn renders_grouped_expenses_with_headers() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(
            200,
            r#"{"content": [
                {"id": 1, "name": "Coffee", "amount": 3.5, "date": "2026-10-02"},
                {"id": 2, "name": "Lunch", "amount": 12, "date": "2026-10-02"}
            ], "totalElements": 2}"#,
        );
        let client = Arc::new(ApiClient::new(transport));
        let expense_service = Arc::new(ExpenseService::new(client.clone()));
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut app = App::new(
            Arc::new(CategoryService::new(client)),
            expense_service.clone(),
            CategoryCriteria::default(),
            ExpenseCriteria::default(),
            Duration::from_millis(300),
            tx,
        );
        app.expenses.refresh(expense_service.as_ref()).await.unwrap();

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();
        let text = buffer_text(&terminal);

        assert!(text.contains("Friday, 02 October 2026"));
        assert!(text.contains("Coffee"));
        assert!(text.contains("Lunch"));
        assert!(text.contains("15.50"));
    }

    #[tokio::test]
    async fn draws_saving_state_while_request_runs() {
        let transport = Arc::new(RecordingTransport::new());
        let client = Arc::new(ApiClient::new(transport));
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut app = App::new(
            Arc::new(CategoryService::new(client.clone())),
            Arc::new(ExpenseService::new(client)),
            CategoryCriteria::default(),
            ExpenseCriteria::default(),
            Duration::from_millis(300),
            tx,
        );
        let now = Instant::now();
        app.current_view = View::Categories;
        app.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE), now);
        for c in "Food".chars() {
            app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE), now);
        }
        app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE), now);

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();

        assert!(buffer_text(&terminal).contains("Saving..."));
    }
}
