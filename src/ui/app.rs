use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc::UnboundedSender;

use super::form::{
    CategoryFields, CategoryForm, ConfirmPrompt, EXPENSE_CATEGORY_FIELD, ExpenseFields, ExpenseForm, FormModel,
    FormOutcome, INVALID_FORM_MESSAGE, Pending,
};
use super::list::{self, ListView, QueryOutcome, QueryTicket};
use super::month::MonthCursor;
use super::notice::Notice;
use crate::api::{CategoryService, EntityService, ExpenseService};
use crate::error::ApiError;
use crate::models::{
    category::Category,
    criteria::{
        AllCategoryCriteria, CATEGORY_SORTS, CategoryCriteria, EXPENSE_SORTS, ExpenseCriteria, ListCriteria, Sort,
        next_sort,
    },
    expense::Expense,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Expenses,
    Categories,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Searching,
    Form,
    Confirming,
}

pub enum Modal {
    Category(CategoryForm),
    Expense(ExpenseForm),
}

/// Backend answer for the form on top of the modal stack.
#[derive(Debug)]
pub enum FormReply<T> {
    Saved(Result<T, ApiError>),
    Deleted(Result<(), ApiError>),
}

impl<T> FormReply<T> {
    fn answers(&self) -> Pending {
        match self {
            FormReply::Saved(_) => Pending::Saving,
            FormReply::Deleted(_) => Pending::Deleting,
        }
    }
}

/// Results delivered to the UI loop by background tasks.
#[derive(Debug)]
pub enum AppMessage {
    Categories(QueryOutcome<Category>),
    Expenses(QueryOutcome<Expense>),
    CategoryOptions {
        generation: u64,
        result: Result<Vec<Category>, ApiError>,
    },
    CategoryForm(FormReply<Category>),
    ExpenseForm(FormReply<Expense>),
}

pub struct App {
    pub current_view: View,
    pub input_mode: InputMode,
    pub categories: ListView<CategoryService>,
    pub expenses: ListView<ExpenseService>,
    pub month: MonthCursor,
    pub modals: Vec<Modal>,
    pub confirm: Option<ConfirmPrompt>,
    /// Choices for the expense form's category field.
    pub category_options: Vec<Category>,
    pub notice: Option<Notice>,
    pub should_quit: bool,
    /// Only the latest options load may replace `category_options`.
    options_generation: u64,
    select_category_on_load: Option<String>,
    category_service: Arc<CategoryService>,
    expense_service: Arc<ExpenseService>,
    tx: UnboundedSender<AppMessage>,
}

impl App {
    pub fn new(
        category_service: Arc<CategoryService>,
        expense_service: Arc<ExpenseService>,
        category_criteria: CategoryCriteria,
        expense_criteria: ExpenseCriteria,
        debounce: Duration,
        tx: UnboundedSender<AppMessage>,
    ) -> Self {
        let month = MonthCursor::current();
        let mut expenses: ListView<ExpenseService> = ListView::new(expense_criteria, debounce);
        expenses.criteria_mut().year_month = Some(month.year_month());

        App {
            current_view: View::Expenses,
            input_mode: InputMode::Normal,
            categories: ListView::new(category_criteria, debounce),
            expenses,
            month,
            modals: Vec::new(),
            confirm: None,
            category_options: Vec::new(),
            notice: None,
            should_quit: false,
            options_generation: 0,
            select_category_on_load: None,
            category_service,
            expense_service,
            tx,
        }
    }

    /// Initial load of both lists.
    pub fn start(&mut self) {
        let ticket = self.categories.begin_query();
        self.spawn_categories(ticket);
        let ticket = self.expenses.begin_query();
        self.spawn_expenses(ticket);
    }

    fn spawn_categories(&self, ticket: QueryTicket<CategoryCriteria>) {
        let service = self.category_service.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = list::fetch(service.as_ref(), ticket).await;
            let _ = tx.send(AppMessage::Categories(outcome));
        });
    }

    fn spawn_expenses(&self, ticket: QueryTicket<ExpenseCriteria>) {
        let service = self.expense_service.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = list::fetch(service.as_ref(), ticket).await;
            let _ = tx.send(AppMessage::Expenses(outcome));
        });
    }

    fn load_category_options(&mut self) {
        self.options_generation += 1;
        let generation = self.options_generation;
        let service = self.category_service.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let criteria = AllCategoryCriteria { sort: Some(Sort::asc("name")), name: None };
            let result = service.list_all(&criteria).await;
            let _ = tx.send(AppMessage::CategoryOptions { generation, result });
        });
    }

    pub fn handle_message(&mut self, message: AppMessage, now: Instant) {
        match message {
            AppMessage::Categories(outcome) => {
                self.categories.apply(outcome);
            }
            AppMessage::Expenses(outcome) => {
                self.expenses.apply(outcome);
            }
            AppMessage::CategoryOptions { generation, result } => {
                if generation != self.options_generation {
                    tracing::debug!("Dropping stale category options (load {})", generation);
                    return;
                }
                self.apply_category_options(result);
            }
            AppMessage::CategoryForm(reply) => self.apply_category_reply(reply, now),
            AppMessage::ExpenseForm(reply) => self.apply_expense_reply(reply, now),
        }
    }

    fn apply_category_options(&mut self, result: Result<Vec<Category>, ApiError>) {
        match result {
            Ok(options) => {
                self.category_options = options;
                let Some(id) = self.select_category_on_load.as_deref() else {
                    return;
                };
                let chosen = self.category_options.iter().find(|c| c.id.as_deref() == Some(id)).cloned();
                if let Some(category) = chosen {
                    self.select_category_on_load = None;
                    if let Some(Modal::Expense(form)) = self.modals.last_mut() {
                        form.model.category = Some(category);
                    }
                }
            }
            Err(e) => {
                tracing::error!("Error loading categories: {}", e);
                self.category_options.clear();
                self.select_category_on_load = None;
            }
        }
    }

    fn apply_category_reply(&mut self, reply: FormReply<Category>, now: Instant) {
        let Some(Modal::Category(form)) = self.modals.last_mut() else {
            tracing::debug!("Dropping category reply with no category form open");
            return;
        };
        if form.pending() != Some(reply.answers()) {
            tracing::debug!("Dropping category reply the form is not waiting for");
            return;
        }
        let was_edit = form.is_edit();
        let outcome = match reply {
            FormReply::Saved(result) => form.finish_submit(result),
            FormReply::Deleted(result) => form.finish_delete(result),
        };
        match outcome {
            Some(outcome) => {
                self.close_modal();
                self.on_category_closed(outcome, was_edit, now);
            }
            None => {
                let message = form.error_message().to_string();
                self.report_form_error(message, now);
            }
        }
    }

    fn apply_expense_reply(&mut self, reply: FormReply<Expense>, now: Instant) {
        let Some(Modal::Expense(form)) = self.modals.last_mut() else {
            tracing::debug!("Dropping expense reply with no expense form open");
            return;
        };
        if form.pending() != Some(reply.answers()) {
            tracing::debug!("Dropping expense reply the form is not waiting for");
            return;
        }
        let outcome = match reply {
            FormReply::Saved(result) => form.finish_submit(result),
            FormReply::Deleted(result) => form.finish_delete(result),
        };
        match outcome {
            Some(outcome) => {
                self.close_modal();
                self.on_expense_closed(outcome, now);
            }
            None => {
                let message = form.error_message().to_string();
                self.report_form_error(message, now);
            }
        }
    }

    /// Advance timers: settled searches start queries, notices expire.
    pub fn tick(&mut self, now: Instant) {
        if let Some(ticket) = self.categories.tick(now) {
            self.spawn_categories(ticket);
        }
        if let Some(ticket) = self.expenses.tick(now) {
            self.spawn_expenses(ticket);
        }
        if self.notice.as_ref().is_some_and(|n| n.is_expired(now)) {
            self.notice = None;
        }
    }

    pub fn is_loading(&self) -> bool {
        match self.current_view {
            View::Expenses => self.expenses.is_loading(),
            View::Categories => self.categories.is_loading(),
        }
    }

    pub fn search_text(&self) -> &str {
        match self.current_view {
            View::Expenses => self.expenses.search_text(),
            View::Categories => self.categories.search_text(),
        }
    }

    /// True while the form on top of the stack waits on the backend.
    pub fn form_busy(&self) -> bool {
        match self.modals.last() {
            Some(Modal::Category(form)) => form.is_loading(),
            Some(Modal::Expense(form)) => form.is_loading(),
            None => false,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(key, now),
            InputMode::Searching => self.handle_search_key(key, now),
            InputMode::Form => self.handle_form_key(key, now),
            InputMode::Confirming => self.handle_confirm_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent, _now: Instant) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => {
                self.current_view = match self.current_view {
                    View::Expenses => View::Categories,
                    View::Categories => View::Expenses,
                };
            }
            KeyCode::Up => match self.current_view {
                View::Expenses => self.expenses.previous(),
                View::Categories => self.categories.previous(),
            },
            KeyCode::Down => match self.current_view {
                View::Expenses => self.expenses.next(),
                View::Categories => self.categories.next(),
            },
            KeyCode::Char('/') | KeyCode::Char('f') => self.input_mode = InputMode::Searching,
            KeyCode::Char('s') => self.cycle_sort(),
            KeyCode::Char('r') => self.reload_current(),
            KeyCode::Char('a') => self.open_add_form(),
            KeyCode::Enter | KeyCode::Char('e') => self.open_edit_form(),
            KeyCode::Left if self.current_view == View::Expenses => self.shift_month(-1),
            KeyCode::Right if self.current_view == View::Expenses => self.shift_month(1),
            KeyCode::PageDown => self.turn_page(true),
            KeyCode::PageUp => self.turn_page(false),
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent, now: Instant) {
        let mut text = self.search_text().to_string();
        match key.code {
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                return;
            }
            KeyCode::Esc => {
                text.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Backspace => {
                text.pop();
            }
            KeyCode::Char(c) => text.push(c),
            _ => return,
        }
        match self.current_view {
            View::Expenses => self.expenses.search_input(text, now),
            View::Categories => self.categories.search_input(text, now),
        }
    }

    fn cycle_sort(&mut self) {
        match self.current_view {
            View::Expenses => {
                let sort = next_sort(EXPENSE_SORTS, self.expenses.criteria().sort());
                let ticket = self.expenses.set_sort(sort);
                self.spawn_expenses(ticket);
            }
            View::Categories => {
                let sort = next_sort(CATEGORY_SORTS, self.categories.criteria().sort());
                let ticket = self.categories.set_sort(sort);
                self.spawn_categories(ticket);
            }
        }
    }

    fn reload_current(&mut self) {
        match self.current_view {
            View::Expenses => self.reload_expenses(),
            View::Categories => self.reload_categories(),
        }
    }

    fn reload_expenses(&mut self) {
        let ticket = self.expenses.reload();
        self.spawn_expenses(ticket);
    }

    fn reload_categories(&mut self) {
        let ticket = self.categories.reload();
        self.spawn_categories(ticket);
    }

    pub fn shift_month(&mut self, months: i32) {
        self.month.shift(months);
        self.expenses.criteria_mut().year_month = Some(self.month.year_month());
        let ticket = self.expenses.set_page(0);
        self.spawn_expenses(ticket);
    }

    fn turn_page(&mut self, forward: bool) {
        match self.current_view {
            View::Expenses => {
                let page = self.expenses.criteria().page();
                if forward && self.expenses.has_next_page() {
                    let ticket = self.expenses.set_page(page + 1);
                    self.spawn_expenses(ticket);
                } else if !forward && page > 0 {
                    let ticket = self.expenses.set_page(page - 1);
                    self.spawn_expenses(ticket);
                }
            }
            View::Categories => {
                let page = self.categories.criteria().page();
                if forward && self.categories.has_next_page() {
                    let ticket = self.categories.set_page(page + 1);
                    self.spawn_categories(ticket);
                } else if !forward && page > 0 {
                    let ticket = self.categories.set_page(page - 1);
                    self.spawn_categories(ticket);
                }
            }
        }
    }

    fn open_add_form(&mut self) {
        match self.current_view {
            View::Expenses => {
                self.load_category_options();
                self.modals.push(Modal::Expense(ExpenseForm::create(ExpenseFields::default())));
            }
            View::Categories => {
                self.modals.push(Modal::Category(CategoryForm::create(CategoryFields::default())));
            }
        }
        self.input_mode = InputMode::Form;
    }

    fn open_edit_form(&mut self) {
        let modal = match self.current_view {
            View::Expenses => self.expenses.selected().cloned().map(|e| Modal::Expense(ExpenseForm::edit(e))),
            View::Categories => self.categories.selected().cloned().map(|c| Modal::Category(CategoryForm::edit(c))),
        };
        if let Some(modal) = modal {
            if matches!(modal, Modal::Expense(_)) {
                self.load_category_options();
            }
            self.modals.push(modal);
            self.input_mode = InputMode::Form;
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent, now: Instant) {
        if self.form_busy() {
            return;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                let cancelled = match self.modals.last() {
                    Some(Modal::Category(form)) => form.cancel().is_some(),
                    Some(Modal::Expense(form)) => form.cancel().is_some(),
                    None => true,
                };
                if cancelled {
                    self.close_modal();
                }
            }
            KeyCode::Enter => self.submit_form(now),
            KeyCode::Char('d') if ctrl => self.request_delete(),
            KeyCode::Char('n') if ctrl => {
                if matches!(self.modals.last(), Some(Modal::Expense(_))) {
                    self.modals.push(Modal::Category(CategoryForm::create(CategoryFields::default())));
                }
            }
            KeyCode::Tab => match self.modals.last_mut() {
                Some(Modal::Category(form)) => form.focus_next(),
                Some(Modal::Expense(form)) => form.focus_next(),
                None => {}
            },
            KeyCode::BackTab => match self.modals.last_mut() {
                Some(Modal::Category(form)) => form.focus_previous(),
                Some(Modal::Expense(form)) => form.focus_previous(),
                None => {}
            },
            KeyCode::Left | KeyCode::Right => {
                let forward = key.code == KeyCode::Right;
                if let Some(Modal::Expense(form)) = self.modals.last_mut() {
                    if form.focus == EXPENSE_CATEGORY_FIELD {
                        form.model.cycle_category(&self.category_options, forward);
                    }
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = self.focused_text() {
                    text.pop();
                }
            }
            KeyCode::Char(c) if !ctrl => {
                if let Some(text) = self.focused_text() {
                    text.push(c);
                }
            }
            _ => {}
        }
    }

    fn focused_text(&mut self) -> Option<&mut String> {
        match self.modals.last_mut()? {
            Modal::Category(form) => {
                let focus = form.focus;
                form.model.text_mut(focus)
            }
            Modal::Expense(form) => {
                let focus = form.focus;
                form.model.text_mut(focus)
            }
        }
    }

    fn close_modal(&mut self) {
        self.modals.pop();
        self.confirm = None;
        self.input_mode = if self.modals.is_empty() { InputMode::Normal } else { InputMode::Form };
    }

    fn report_form_error(&mut self, message: String, now: Instant) {
        if !message.is_empty() && message != INVALID_FORM_MESSAGE {
            self.notice = Some(Notice::danger(message, now));
        }
    }

    /// Validate the top form and send it in the background. The reply
    /// arrives as an [`AppMessage`] so the screen keeps drawing meanwhile.
    fn submit_form(&mut self, now: Instant) {
        let tx = self.tx.clone();
        match self.modals.last_mut() {
            Some(Modal::Category(form)) => match form.begin_submit() {
                Some(dto) => {
                    let service = self.category_service.clone();
                    tokio::spawn(async move {
                        let result = service.upsert(&dto).await;
                        let _ = tx.send(AppMessage::CategoryForm(FormReply::Saved(result)));
                    });
                }
                None => {
                    let message = form.error_message().to_string();
                    self.report_form_error(message, now);
                }
            },
            Some(Modal::Expense(form)) => match form.begin_submit() {
                Some(dto) => {
                    let service = self.expense_service.clone();
                    tokio::spawn(async move {
                        let result = service.upsert(&dto).await;
                        let _ = tx.send(AppMessage::ExpenseForm(FormReply::Saved(result)));
                    });
                }
                None => {
                    let message = form.error_message().to_string();
                    self.report_form_error(message, now);
                }
            },
            None => {}
        }
    }

    fn request_delete(&mut self) {
        let prompt = match self.modals.last_mut() {
            Some(Modal::Category(form)) => form.request_delete(),
            Some(Modal::Expense(form)) => form.request_delete(),
            None => None,
        };
        if let Some(prompt) = prompt {
            self.confirm = Some(prompt);
            self.input_mode = InputMode::Confirming;
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => self.confirm_delete(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                match self.modals.last_mut() {
                    Some(Modal::Category(form)) => form.cancel_delete(),
                    Some(Modal::Expense(form)) => form.cancel_delete(),
                    None => {}
                }
                self.confirm = None;
                self.input_mode = InputMode::Form;
            }
            _ => {}
        }
    }

    fn confirm_delete(&mut self) {
        self.confirm = None;
        self.input_mode = InputMode::Form;
        let tx = self.tx.clone();
        match self.modals.last_mut() {
            Some(Modal::Category(form)) => {
                if let Some(id) = form.begin_delete() {
                    let service = self.category_service.clone();
                    tokio::spawn(async move {
                        let result = service.delete(&id).await;
                        let _ = tx.send(AppMessage::CategoryForm(FormReply::Deleted(result)));
                    });
                }
            }
            Some(Modal::Expense(form)) => {
                if let Some(id) = form.begin_delete() {
                    let service = self.expense_service.clone();
                    tokio::spawn(async move {
                        let result = service.delete(&id).await;
                        let _ = tx.send(AppMessage::ExpenseForm(FormReply::Deleted(result)));
                    });
                }
            }
            None => {}
        }
    }

    fn on_category_closed(&mut self, outcome: FormOutcome<Category>, was_edit: bool, now: Instant) {
        let nested = matches!(self.modals.last(), Some(Modal::Expense(_)));
        match outcome {
            FormOutcome::Saved(category) => {
                let message = if was_edit {
                    "Category updated successfully!"
                } else {
                    "Category saved successfully!"
                };
                self.notice = Some(Notice::success(message, now));
                if nested {
                    self.select_category_on_load = category.id.clone();
                    self.load_category_options();
                }
                self.reload_categories();
            }
            FormOutcome::Deleted => {
                self.notice = Some(Notice::success("Category deleted successfully!", now));
                self.reload_categories();
                self.reload_expenses();
            }
            FormOutcome::Cancelled => {}
        }
    }

    fn on_expense_closed(&mut self, outcome: FormOutcome<Expense>, now: Instant) {
        match outcome {
            FormOutcome::Saved(_) => {
                self.notice = Some(Notice::success("Expense saved successfully!", now));
                self.reload_expenses();
            }
            FormOutcome::Deleted => {
                self.notice = Some(Notice::success("Expense deleted successfully!", now));
                self.reload_expenses();
            }
            FormOutcome::Cancelled => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::api::testing::RecordingTransport;
    use crate::api::transport::Method;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use tokio::sync::mpsc;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent { modifiers: KeyModifiers::CONTROL, ..key(KeyCode::Char(c)) }
    }

    fn app() -> (Arc<RecordingTransport>, App, mpsc::UnboundedReceiver<AppMessage>) {
        let transport = Arc::new(RecordingTransport::new());
        let client = Arc::new(ApiClient::new(transport.clone()));
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(
            Arc::new(CategoryService::new(client.clone())),
            Arc::new(ExpenseService::new(client)),
            CategoryCriteria::default(),
            ExpenseCriteria::default(),
            Duration::from_millis(300),
            tx,
        );
        (transport, app, rx)
    }

    fn type_text(app: &mut App, text: &str, now: Instant) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)), now);
        }
    }

    async fn deliver_next(app: &mut App, rx: &mut mpsc::UnboundedReceiver<AppMessage>, now: Instant) {
        let message = rx.recv().await.unwrap();
        app.handle_message(message, now);
    }

    fn expense_form_category(app: &App) -> Option<Category> {
        match app.modals.last() {
            Some(Modal::Expense(form)) => form.model.category.clone(),
            _ => panic!("expense form should still be open"),
        }
    }

    #[tokio::test]
    async fn typing_a_search_queries_once_after_quiet_period() {
        let (transport, mut app, mut rx) = app();
        transport.respond(200, r#"{"content": []}"#);
        let start = Instant::now();
        app.current_view = View::Categories;

        app.handle_key(key(KeyCode::Char('/')), start);
        type_text(&mut app, "rent", start);
        app.tick(start + Duration::from_millis(100));
        app.tick(start + Duration::from_millis(300));
        app.tick(start + Duration::from_millis(600));

        deliver_next(&mut app, &mut rx, start).await;
        assert_eq!(transport.request_count(), 1);
        assert_eq!(
            transport.requests()[0].path_and_query(),
            "/api/categories/page?page=0&size=100&sort=name,asc&name=rent"
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn saving_a_category_closes_form_and_reloads() {
        let (transport, mut app, mut rx) = app();
        transport.respond(201, r#"{"id": 1, "name": "Food"}"#);
        transport.respond(200, r#"{"content": [{"id": 1, "name": "Food"}], "totalElements": 1}"#);
        let now = Instant::now();
        app.current_view = View::Categories;

        app.handle_key(key(KeyCode::Char('a')), now);
        assert_eq!(app.input_mode, InputMode::Form);
        type_text(&mut app, "Food", now);
        app.handle_key(key(KeyCode::Enter), now);
        assert!(app.form_busy());

        deliver_next(&mut app, &mut rx, now).await;
        assert!(app.modals.is_empty());
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.notice.as_ref().map(|n| n.message.as_str()), Some("Category saved successfully!"));

        deliver_next(&mut app, &mut rx, now).await;
        assert_eq!(app.categories.items(), &[Category::new("1", "Food")]);
        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[1].path, "/api/categories/page");
    }

    #[tokio::test]
    async fn keys_are_ignored_while_a_save_is_in_flight() {
        let (transport, mut app, mut rx) = app();
        transport.respond(201, r#"{"id": 1, "name": "Food"}"#);
        let now = Instant::now();
        app.current_view = View::Categories;

        app.handle_key(key(KeyCode::Char('a')), now);
        type_text(&mut app, "Food", now);
        app.handle_key(key(KeyCode::Enter), now);

        app.handle_key(key(KeyCode::Esc), now);
        type_text(&mut app, "xyz", now);
        app.handle_key(key(KeyCode::Enter), now);
        assert_eq!(app.modals.len(), 1);
        match app.modals.last() {
            Some(Modal::Category(form)) => {
                assert_eq!(form.model.name, "Food");
                assert_eq!(form.pending(), Some(Pending::Saving));
            }
            _ => panic!("category form should still be open"),
        }

        deliver_next(&mut app, &mut rx, now).await;
        assert!(app.modals.is_empty());
        assert_eq!(transport.requests().iter().filter(|r| r.method == Method::Post).count(), 1);
    }

    #[tokio::test]
    async fn declining_delete_prompt_sends_nothing() {
        let (transport, mut app, _rx) = app();
        let now = Instant::now();
        app.modals.push(Modal::Category(CategoryForm::edit(Category::new("5", "Rent"))));
        app.input_mode = InputMode::Form;

        app.handle_key(ctrl('d'), now);
        assert_eq!(app.input_mode, InputMode::Confirming);
        assert!(app.confirm.is_some());

        app.handle_key(key(KeyCode::Char('n')), now);
        assert_eq!(app.input_mode, InputMode::Form);
        assert!(app.confirm.is_none());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn confirmed_delete_closes_form_and_reloads_both_lists() {
        let (transport, mut app, mut rx) = app();
        transport.respond(204, "");
        let now = Instant::now();
        app.modals.push(Modal::Category(CategoryForm::edit(Category::new("5", "Rent"))));
        app.input_mode = InputMode::Form;

        app.handle_key(ctrl('d'), now);
        app.handle_key(key(KeyCode::Char('y')), now);
        assert!(app.form_busy());

        deliver_next(&mut app, &mut rx, now).await;
        assert!(app.modals.is_empty());
        assert_eq!(app.notice.as_ref().map(|n| n.message.as_str()), Some("Category deleted successfully!"));
        assert!(app.categories.is_loading());
        assert!(app.expenses.is_loading());
        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Delete);
        assert_eq!(requests[0].path, "/api/categories/5");
    }

    #[tokio::test]
    async fn failed_save_keeps_form_and_shows_notice() {
        let (transport, mut app, mut rx) = app();
        transport.respond(400, r#"{"message": "Duplicate name"}"#);
        let now = Instant::now();
        app.current_view = View::Categories;

        app.handle_key(key(KeyCode::Char('a')), now);
        type_text(&mut app, "Food", now);
        app.handle_key(key(KeyCode::Enter), now);
        deliver_next(&mut app, &mut rx, now).await;

        assert_eq!(app.modals.len(), 1);
        assert!(!app.form_busy());
        assert_eq!(app.notice.as_ref().map(|n| n.message.as_str()), Some("Duplicate name"));
    }

    #[tokio::test]
    async fn month_paging_requests_new_month() {
        let (transport, mut app, mut rx) = app();
        transport.respond(200, r#"{"content": []}"#);
        let before = app.month;
        let now = Instant::now();

        app.handle_key(key(KeyCode::Left), now);
        deliver_next(&mut app, &mut rx, now).await;

        let mut expected = before;
        expected.shift(-1);
        assert_eq!(app.month, expected);
        assert_eq!(transport.requests()[0].query.get("yearMonth"), Some(expected.year_month().as_str()));
    }

    #[tokio::test]
    async fn nested_category_is_selected_in_expense_form() {
        let (transport, mut app, mut rx) = app();
        let now = Instant::now();
        app.modals.push(Modal::Expense(ExpenseForm::create(ExpenseFields::default())));
        app.input_mode = InputMode::Form;

        app.handle_key(ctrl('n'), now);
        assert_eq!(app.modals.len(), 2);
        type_text(&mut app, "Pets", now);

        transport.respond(201, r#"{"id": 8, "name": "Pets"}"#);
        app.handle_key(key(KeyCode::Enter), now);
        deliver_next(&mut app, &mut rx, now).await;
        assert_eq!(app.modals.len(), 1);
        assert_eq!(app.input_mode, InputMode::Form);

        // Category options and the category list reload concurrently; deliver both.
        for _ in 0..2 {
            match rx.recv().await.unwrap() {
                AppMessage::CategoryOptions { generation, .. } => {
                    let result = Ok(vec![Category::new("2", "Food"), Category::new("8", "Pets")]);
                    app.handle_message(AppMessage::CategoryOptions { generation, result }, now);
                }
                message => app.handle_message(message, now),
            }
        }

        assert_eq!(expense_form_category(&app), Some(Category::new("8", "Pets")));
    }

    #[tokio::test]
    async fn earlier_option_load_cannot_clear_nested_selection() {
        let (transport, mut app, mut rx) = app();
        let now = Instant::now();
        transport.respond(200, r#"[{"id": 2, "name": "Food"}]"#);

        app.handle_key(key(KeyCode::Char('a')), now);
        let first_load = rx.recv().await.unwrap();

        app.handle_key(ctrl('n'), now);
        type_text(&mut app, "Pets", now);
        transport.respond(201, r#"{"id": 8, "name": "Pets"}"#);
        app.handle_key(key(KeyCode::Enter), now);
        deliver_next(&mut app, &mut rx, now).await;
        assert_eq!(app.modals.len(), 1);

        // The list opened with the form lands after the nested save started a new one.
        app.handle_message(first_load, now);
        assert!(app.category_options.is_empty());

        for _ in 0..2 {
            match rx.recv().await.unwrap() {
                AppMessage::CategoryOptions { generation, .. } => {
                    let result = Ok(vec![Category::new("2", "Food"), Category::new("8", "Pets")]);
                    app.handle_message(AppMessage::CategoryOptions { generation, result }, now);
                }
                message => app.handle_message(message, now),
            }
        }

        assert_eq!(app.category_options.len(), 2);
        assert_eq!(expense_form_category(&app), Some(Category::new("8", "Pets")));
    }

    #[tokio::test]
    async fn reply_the_form_is_not_waiting_for_is_dropped() {
        let (_transport, mut app, _rx) = app();
        let now = Instant::now();
        app.modals.push(Modal::Category(CategoryForm::edit(Category::new("5", "Rent"))));
        app.input_mode = InputMode::Form;

        app.handle_message(AppMessage::CategoryForm(FormReply::Deleted(Ok(()))), now);

        assert_eq!(app.modals.len(), 1);
        assert!(app.notice.is_none());
    }
}
