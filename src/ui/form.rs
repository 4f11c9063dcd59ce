//! Modal create/edit forms.

use std::str::FromStr;

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;

use crate::api::{CategoryService, EntityService, ExpenseService};
use crate::error::ApiError;
use crate::models::{
    Entity,
    category::{Category, CategoryUpsert},
    expense::{Expense, ExpenseUpsert},
};

pub const INVALID_FORM_MESSAGE: &str = "Please fill in all required fields correctly.";
pub const SAVE_FAILED_MESSAGE: &str = "An error occurred while saving. Please try again.";
pub const DELETE_FAILED_MESSAGE: &str = "An error occurred while deleting. Please try again.";

/// How a form was closed.
#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome<T> {
    Saved(T),
    Deleted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub header: String,
    pub message: String,
}

/// Editable fields of one entity type.
pub trait FormModel<E>: Send {
    type Upsert;

    /// Noun used in prompts, e.g. "Category".
    const NOUN: &'static str;

    fn from_entity(entity: &E) -> Self;
    fn validate(&self) -> Vec<FieldError>;
    /// Only called after `validate` returned no errors.
    fn to_upsert(&self, id: Option<String>) -> Option<Self::Upsert>;

    fn labels(&self) -> &'static [&'static str];
    fn value(&self, field: usize) -> String;
    /// Free-text fields; selection fields return `None`.
    fn text_mut(&mut self, field: usize) -> Option<&mut String>;
}

/// Request a form is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Saving,
    Deleting,
}

impl Pending {
    pub fn label(&self) -> &'static str {
        match self {
            Pending::Saving => "Saving...",
            Pending::Deleting => "Deleting...",
        }
    }
}

pub struct EditForm<S: EntityService, M> {
    pub model: M,
    original: Option<S::Entity>,
    pending: Option<Pending>,
    error_message: String,
    field_errors: Vec<FieldError>,
    delete_armed: bool,
    pub focus: usize,
}

impl<S, M> EditForm<S, M>
where
    S: EntityService,
    M: FormModel<S::Entity, Upsert = S::Upsert>,
{
    pub fn create(model: M) -> Self {
        Self {
            model,
            original: None,
            pending: None,
            error_message: String::new(),
            field_errors: Vec::new(),
            delete_armed: false,
            focus: 0,
        }
    }

    pub fn edit(entity: S::Entity) -> Self {
        let mut form = Self::create(M::from_entity(&entity));
        form.original = Some(entity);
        form
    }

    pub fn is_edit(&self) -> bool {
        self.original_id().is_some()
    }

    pub fn original(&self) -> Option<&S::Entity> {
        self.original.as_ref()
    }

    fn original_id(&self) -> Option<&str> {
        self.original.as_ref().and_then(|e| e.id())
    }

    pub fn title(&self) -> String {
        if self.is_edit() {
            format!("Edit {}", M::NOUN)
        } else {
            format!("New {}", M::NOUN)
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<Pending> {
        self.pending
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn field_error(&self, field: &str) -> Option<&'static str> {
        self.field_errors.iter().find(|e| e.field == field).map(|e| e.message)
    }

    pub fn is_delete_armed(&self) -> bool {
        self.delete_armed
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % self.model.labels().len();
    }

    pub fn focus_previous(&mut self) {
        let count = self.model.labels().len();
        self.focus = (self.focus + count - 1) % count;
    }

    /// Validate and mark the form as saving. Returns the body to send, or
    /// `None` when the form is invalid or already busy.
    pub fn begin_submit(&mut self) -> Option<S::Upsert> {
        if self.is_loading() {
            return None;
        }

        self.field_errors = self.model.validate();
        let id = self.original_id().map(|id| id.to_string());
        let dto = match self.model.to_upsert(id) {
            Some(dto) if self.field_errors.is_empty() => dto,
            _ => {
                self.error_message = INVALID_FORM_MESSAGE.to_string();
                return None;
            }
        };

        self.pending = Some(Pending::Saving);
        self.error_message.clear();
        Some(dto)
    }

    /// Apply the backend's answer to [`EditForm::begin_submit`]. Returns `None` while the form stays open.
    pub fn finish_submit(&mut self, result: Result<S::Entity, ApiError>) -> Option<FormOutcome<S::Entity>> {
        self.pending = None;
        match result {
            Ok(saved) => {
                tracing::info!("Saved {} '{}'", M::NOUN.to_lowercase(), saved.display_name());
                Some(FormOutcome::Saved(saved))
            }
            Err(e) => {
                tracing::error!("Error saving {}: {}", M::NOUN.to_lowercase(), e);
                self.error_message = e.server_message().unwrap_or(SAVE_FAILED_MESSAGE).to_string();
                None
            }
        }
    }

    /// Validate, then create or update. Returns `None` while the form stays open.
    pub async fn submit(&mut self, service: &S) -> Option<FormOutcome<S::Entity>> {
        let dto = self.begin_submit()?;
        let result = service.upsert(&dto).await;
        self.finish_submit(result)
    }

    /// Ask before deleting. `None` for new entities or while a request runs.
    pub fn request_delete(&mut self) -> Option<ConfirmPrompt> {
        if self.is_loading() || !self.is_edit() {
            return None;
        }
        let name = self.original.as_ref().map(|e| e.display_name()).unwrap_or_default();
        self.delete_armed = true;
        Some(ConfirmPrompt {
            header: format!("Delete {}", M::NOUN),
            message: format!("Are you sure you want to delete \"{name}\"? This action cannot be undone."),
        })
    }

    pub fn cancel_delete(&mut self) {
        self.delete_armed = false;
    }

    /// Mark a confirmed delete as running and return the id to delete.
    /// `None` unless [`EditForm::request_delete`] armed the form.
    pub fn begin_delete(&mut self) -> Option<String> {
        if !self.delete_armed || self.is_loading() {
            return None;
        }
        self.delete_armed = false;
        let id = self.original_id()?.to_string();
        self.pending = Some(Pending::Deleting);
        self.error_message.clear();
        Some(id)
    }

    pub fn finish_delete(&mut self, result: Result<(), ApiError>) -> Option<FormOutcome<S::Entity>> {
        self.pending = None;
        let id = self.original_id().unwrap_or_default().to_string();
        match result {
            Ok(()) => {
                tracing::info!("Deleted {} {}", M::NOUN.to_lowercase(), id);
                Some(FormOutcome::Deleted)
            }
            Err(e) => {
                tracing::error!("Error deleting {} {}: {}", M::NOUN.to_lowercase(), id, e);
                self.error_message = e.server_message().unwrap_or(DELETE_FAILED_MESSAGE).to_string();
                None
            }
        }
    }

    /// Delete the entity, only after [`EditForm::request_delete`].
    pub async fn confirm_delete(&mut self, service: &S) -> Option<FormOutcome<S::Entity>> {
        let id = self.begin_delete()?;
        let result = service.delete(&id).await;
        self.finish_delete(result)
    }

    pub fn cancel(&self) -> Option<FormOutcome<S::Entity>> {
        if self.is_loading() {
            None
        } else {
            Some(FormOutcome::Cancelled)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFields {
    pub name: String,
}

impl FormModel<Category> for CategoryFields {
    type Upsert = CategoryUpsert;
    const NOUN: &'static str = "Category";

    fn from_entity(entity: &Category) -> Self {
        Self { name: entity.name.clone() }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError { field: "name", message: "Name is required" });
        }
        errors
    }

    fn to_upsert(&self, id: Option<String>) -> Option<CategoryUpsert> {
        Some(CategoryUpsert { id, name: self.name.trim().to_string() })
    }

    fn labels(&self) -> &'static [&'static str] {
        &["Name"]
    }

    fn value(&self, _field: usize) -> String {
        self.name.clone()
    }

    fn text_mut(&mut self, _field: usize) -> Option<&mut String> {
        Some(&mut self.name)
    }
}

pub const EXPENSE_CATEGORY_FIELD: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseFields {
    pub name: String,
    pub amount: String,
    pub date: String,
    pub category: Option<Category>,
}

impl Default for ExpenseFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            amount: String::new(),
            date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
            category: None,
        }
    }
}

impl ExpenseFields {
    fn parsed_amount(&self) -> Option<Decimal> {
        Decimal::from_str(self.amount.trim().replace(',', ".").as_str()).ok()
    }

    fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()
    }

    /// Select the category after `current` in `options` (or before, when `forward` is false).
    /// Cycles through "no category" as well.
    pub fn cycle_category(&mut self, options: &[Category], forward: bool) {
        if options.is_empty() {
            self.category = None;
            return;
        }
        let current = self
            .category
            .as_ref()
            .and_then(|c| options.iter().position(|o| o.id == c.id));
        let slots = options.len() + 1;
        let slot = current.map(|i| i + 1).unwrap_or(0);
        let next = if forward { (slot + 1) % slots } else { (slot + slots - 1) % slots };
        self.category = if next == 0 { None } else { Some(options[next - 1].clone()) };
    }
}

impl FormModel<Expense> for ExpenseFields {
    type Upsert = ExpenseUpsert;
    const NOUN: &'static str = "Expense";

    fn from_entity(entity: &Expense) -> Self {
        Self {
            name: entity.name.clone(),
            amount: entity.amount.to_string(),
            date: entity.date.format("%Y-%m-%d").to_string(),
            category: entity.category.clone(),
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError { field: "name", message: "Name is required" });
        }
        match self.parsed_amount() {
            None if self.amount.trim().is_empty() => {
                errors.push(FieldError { field: "amount", message: "Amount is required" })
            }
            None => errors.push(FieldError { field: "amount", message: "Amount must be a number" }),
            Some(amount) if amount < Decimal::new(1, 2) => {
                errors.push(FieldError { field: "amount", message: "Amount must be at least 0.01" })
            }
            Some(_) => {}
        }
        if self.parsed_date().is_none() {
            errors.push(FieldError { field: "date", message: "Date must be YYYY-MM-DD" });
        }
        errors
    }

    fn to_upsert(&self, id: Option<String>) -> Option<ExpenseUpsert> {
        Some(ExpenseUpsert {
            id,
            name: self.name.trim().to_string(),
            amount: self.parsed_amount()?,
            date: self.parsed_date()?,
            category_id: self.category.as_ref().and_then(|c| c.id.clone()),
        })
    }

    fn labels(&self) -> &'static [&'static str] {
        &["Name", "Amount", "Date", "Category"]
    }

    fn value(&self, field: usize) -> String {
        match field {
            0 => self.name.clone(),
            1 => self.amount.clone(),
            2 => self.date.clone(),
            _ => self
                .category
                .as_ref()
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "(none)".to_string()),
        }
    }

    fn text_mut(&mut self, field: usize) -> Option<&mut String> {
        match field {
            0 => Some(&mut self.name),
            1 => Some(&mut self.amount),
            2 => Some(&mut self.date),
            _ => None,
        }
    }
}

pub type CategoryForm = EditForm<CategoryService, CategoryFields>;
pub type ExpenseForm = EditForm<ExpenseService, ExpenseFields>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::api::testing::RecordingTransport;
    use crate::api::transport::Method;
    use std::sync::Arc;

    fn category_service() -> (Arc<RecordingTransport>, CategoryService) {
        let transport = Arc::new(RecordingTransport::new());
        (transport.clone(), CategoryService::new(Arc::new(ApiClient::new(transport))))
    }

    fn expense_service() -> (Arc<RecordingTransport>, ExpenseService) {
        let transport = Arc::new(RecordingTransport::new());
        (transport.clone(), ExpenseService::new(Arc::new(ApiClient::new(transport))))
    }

    #[tokio::test]
    async fn invalid_form_makes_no_request() {
        let (transport, service) = category_service();
        let mut form = CategoryForm::create(CategoryFields { name: "   ".into() });

        assert_eq!(form.submit(&service).await, None);
        assert_eq!(form.error_message(), INVALID_FORM_MESSAGE);
        assert_eq!(form.field_error("name"), Some("Name is required"));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn new_entity_is_created() {
        let (transport, service) = category_service();
        transport.respond(201, r#"{"id": 4, "name": "Gifts"}"#);
        let mut form = CategoryForm::create(CategoryFields { name: " Gifts ".into() });

        let outcome = form.submit(&service).await;

        assert_eq!(outcome, Some(FormOutcome::Saved(Category::new("4", "Gifts"))));
        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body, Some(serde_json::json!({"name": "Gifts"})));
    }

    #[tokio::test]
    async fn existing_entity_is_updated_by_id() {
        let (transport, service) = category_service();
        transport.respond(200, r#"{"id": 4, "name": "Presents"}"#);
        let mut form = CategoryForm::edit(Category::new("4", "Gifts"));
        assert_eq!(form.title(), "Edit Category");
        form.model.name = "Presents".into();

        form.submit(&service).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, "/api/categories/4");
    }

    #[tokio::test]
    async fn server_error_message_keeps_form_open() {
        let (transport, service) = category_service();
        transport.respond(400, r#"{"message": "Name must be unique"}"#);
        transport.respond(500, "oops");
        let mut form = CategoryForm::create(CategoryFields { name: "Food".into() });

        assert_eq!(form.submit(&service).await, None);
        assert_eq!(form.error_message(), "Name must be unique");
        assert!(!form.is_loading());

        assert_eq!(form.submit(&service).await, None);
        assert_eq!(form.error_message(), SAVE_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn delete_without_confirmation_makes_no_request() {
        let (transport, service) = category_service();
        let mut form = CategoryForm::edit(Category::new("4", "Gifts"));

        assert_eq!(form.confirm_delete(&service).await, None);

        let prompt = form.request_delete().unwrap();
        assert_eq!(prompt.header, "Delete Category");
        assert_eq!(
            prompt.message,
            "Are you sure you want to delete \"Gifts\"? This action cannot be undone."
        );
        form.cancel_delete();
        assert_eq!(form.confirm_delete(&service).await, None);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn confirmed_delete_closes_form() {
        let (transport, service) = category_service();
        transport.respond(204, "");
        let mut form = CategoryForm::edit(Category::new("4", "Gifts"));

        form.request_delete().unwrap();
        assert_eq!(form.confirm_delete(&service).await, Some(FormOutcome::Deleted));
        let request = &transport.requests()[0];
        assert_eq!((request.method, request.path.as_str()), (Method::Delete, "/api/categories/4"));
    }

    #[tokio::test]
    async fn failed_delete_reports_message() {
        let (transport, service) = category_service();
        transport.respond(409, r#"{"message": "Category is in use"}"#);
        let mut form = CategoryForm::edit(Category::new("4", "Gifts"));

        form.request_delete().unwrap();
        assert_eq!(form.confirm_delete(&service).await, None);
        assert_eq!(form.error_message(), "Category is in use");
        assert!(!form.is_delete_armed());
    }

    #[test]
    fn new_entities_cannot_be_deleted() {
        let mut form = CategoryForm::create(CategoryFields::default());
        assert_eq!(form.request_delete(), None);
        assert_eq!(form.cancel(), Some(FormOutcome::Cancelled));
    }

    #[test]
    fn expense_validation() {
        let fields = ExpenseFields {
            name: "Lunch".into(),
            amount: "0".into(),
            date: "2026-13-01".into(),
            category: None,
        };
        let errors: Vec<_> = fields.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(errors, vec!["amount", "date"]);

        let fields = ExpenseFields { amount: "abc".into(), ..ExpenseFields::default() };
        assert_eq!(
            fields.validate(),
            vec![
                FieldError { field: "name", message: "Name is required" },
                FieldError { field: "amount", message: "Amount must be a number" },
            ]
        );
    }

    #[tokio::test]
    async fn expense_submit_sends_category_id() {
        let (transport, service) = expense_service();
        transport.respond(201, r#"{"id": 1, "name": "Lunch", "amount": 12.5, "date": "2026-10-17"}"#);
        let mut form = ExpenseForm::create(ExpenseFields {
            name: "Lunch".into(),
            amount: "12,50".into(),
            date: "2026-10-17".into(),
            category: Some(Category::new("3", "Food")),
        });

        assert!(matches!(form.submit(&service).await, Some(FormOutcome::Saved(_))));
        assert_eq!(
            transport.requests()[0].body,
            Some(serde_json::json!({"name": "Lunch", "amount": 12.5, "date": "2026-10-17", "categoryId": "3"}))
        );
    }

    #[test]
    fn category_cycle_passes_through_none() {
        let options = vec![Category::new("1", "Food"), Category::new("2", "Rent")];
        let mut fields = ExpenseFields::default();

        fields.cycle_category(&options, true);
        assert_eq!(fields.category, Some(options[0].clone()));
        fields.cycle_category(&options, true);
        assert_eq!(fields.category, Some(options[1].clone()));
        fields.cycle_category(&options, true);
        assert_eq!(fields.category, None);
        fields.cycle_category(&options, false);
        assert_eq!(fields.category, Some(options[1].clone()));
    }

    #[test]
    fn focus_cycles_over_fields() {
        let mut form = ExpenseForm::create(ExpenseFields::default());
        form.focus_previous();
        assert_eq!(form.focus, EXPENSE_CATEGORY_FIELD);
        form.focus_next();
        assert_eq!(form.focus, 0);
    }

    #[tokio::test]
    async fn edited_expense_is_updated_by_id() {
        let (transport, service) = expense_service();
        transport.respond(200, r#"{"id": 9, "name": "Dinner", "amount": 20, "date": "2026-10-03"}"#);
        let mut form = ExpenseForm::edit(Expense {
            id: Some("9".into()),
            name: "Lunch".into(),
            amount: Decimal::new(1250, 2),
            date: NaiveDate::from_ymd_opt(2026, 10, 3).unwrap(),
            category: None,
        });
        assert_eq!(form.title(), "Edit Expense");
        form.model.name = "Dinner".into();
        form.model.amount = "20".into();

        assert!(matches!(form.submit(&service).await, Some(FormOutcome::Saved(_))));
        let request = &transport.requests()[0];
        assert_eq!((request.method, request.path.as_str()), (Method::Put, "/api/expenses/9"));
        assert_eq!(
            request.body,
            Some(serde_json::json!({"id": "9", "name": "Dinner", "amount": 20.0, "date": "2026-10-03"}))
        );
    }

    #[test]
    fn pending_save_blocks_second_submit_and_cancel() {
        let mut form = CategoryForm::edit(Category::new("4", "Gifts"));

        let dto = form.begin_submit().unwrap();
        assert_eq!(dto.id.as_deref(), Some("4"));
        assert_eq!(form.pending(), Some(Pending::Saving));
        assert_eq!(form.begin_submit(), None);
        assert_eq!(form.cancel(), None);
        assert_eq!(form.request_delete(), None);

        let outcome = form.finish_submit(Err(ApiError::Timeout));
        assert_eq!(outcome, None);
        assert!(!form.is_loading());
        assert_eq!(form.error_message(), SAVE_FAILED_MESSAGE);
    }

    #[test]
    fn delete_runs_only_once_armed() {
        let mut form = CategoryForm::edit(Category::new("4", "Gifts"));
        assert_eq!(form.begin_delete(), None);

        form.request_delete().unwrap();
        assert_eq!(form.begin_delete().as_deref(), Some("4"));
        assert_eq!(form.pending().map(|p| p.label()), Some("Deleting..."));
        assert_eq!(form.finish_delete(Ok(())), Some(FormOutcome::Deleted));
    }
}
