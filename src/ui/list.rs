//! List screen state shared by categories and expenses.
//!
//! Every filter, sort or page change begins a new query. The result
//! replaces the displayed collection; results of superseded queries are
//! dropped when they arrive.

use std::time::{Duration, Instant};

use ratatui::widgets::ListState;

use super::debounce::Debouncer;
use crate::api::EntityService;
use crate::error::ApiError;
use crate::models::{criteria::ListCriteria, criteria::Sort, page::Page};

/// A query that has been started but not yet applied.
#[derive(Debug, Clone)]
pub struct QueryTicket<C> {
    pub generation: u64,
    pub criteria: C,
}

#[derive(Debug)]
pub struct QueryOutcome<T> {
    pub generation: u64,
    pub result: Result<Page<T>, ApiError>,
}

pub async fn fetch<S: EntityService>(service: &S, ticket: QueryTicket<S::Criteria>) -> QueryOutcome<S::Entity> {
    let result = service.query(&ticket.criteria).await;
    QueryOutcome { generation: ticket.generation, result }
}

pub struct ListView<S: EntityService> {
    criteria: S::Criteria,
    search_text: String,
    debouncer: Debouncer,
    items: Vec<S::Entity>,
    total_elements: u64,
    loading: bool,
    generation: u64,
    pub list_state: ListState,
}

impl<S: EntityService> ListView<S> {
    pub fn new(criteria: S::Criteria, debounce: Duration) -> Self {
        Self {
            criteria,
            search_text: String::new(),
            debouncer: Debouncer::new(debounce),
            items: Vec::new(),
            total_elements: 0,
            loading: false,
            generation: 0,
            list_state: ListState::default(),
        }
    }

    pub fn items(&self) -> &[S::Entity] {
        &self.items
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Number of pages the backend reported for the current filter.
    pub fn page_count(&self) -> u32 {
        let size = u64::from(self.criteria.size().max(1));
        self.total_elements.div_ceil(size).max(1) as u32
    }

    pub fn has_next_page(&self) -> bool {
        self.criteria.page() + 1 < self.page_count()
    }

    pub fn criteria(&self) -> &S::Criteria {
        &self.criteria
    }

    /// Mutate filters directly; follow with [`ListView::reload`].
    pub fn criteria_mut(&mut self) -> &mut S::Criteria {
        &mut self.criteria
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn search_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn selected(&self) -> Option<&S::Entity> {
        self.list_state.selected().and_then(|i| self.items.get(i))
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.list_state.selected()
    }

    pub fn search_input(&mut self, text: impl Into<String>, now: Instant) {
        self.search_text = text.into();
        self.debouncer.push(self.search_text.clone(), now);
    }

    /// Starts a query once the search text has settled on a new value.
    pub fn tick(&mut self, now: Instant) -> Option<QueryTicket<S::Criteria>> {
        let term = self.debouncer.poll(now)?;
        let name = Some(term.trim().to_string()).filter(|t| !t.is_empty());
        tracing::debug!("Search settled on {:?}", name);
        self.criteria.set_name(name);
        self.criteria.set_page(0);
        Some(self.begin_query())
    }

    pub fn set_sort(&mut self, sort: Sort) -> QueryTicket<S::Criteria> {
        self.criteria.set_sort(sort);
        self.begin_query()
    }

    pub fn set_page(&mut self, page: u32) -> QueryTicket<S::Criteria> {
        self.criteria.set_page(page);
        self.begin_query()
    }

    /// Re-run the current criteria, regardless of the search de-duplication.
    pub fn reload(&mut self) -> QueryTicket<S::Criteria> {
        self.begin_query()
    }

    pub fn begin_query(&mut self) -> QueryTicket<S::Criteria> {
        self.generation += 1;
        self.loading = true;
        QueryTicket {
            generation: self.generation,
            criteria: self.criteria.clone(),
        }
    }

    /// Apply a finished query. Returns `false` for a superseded result.
    pub fn apply(&mut self, outcome: QueryOutcome<S::Entity>) -> bool {
        if outcome.generation != self.generation {
            tracing::debug!(
                "Dropping stale result (generation {}, current {})",
                outcome.generation,
                self.generation
            );
            return false;
        }

        self.loading = false;
        match outcome.result {
            Ok(page) => {
                self.total_elements = page.total_elements.max(page.content.len() as u64);
                self.items = page.content;
            }
            Err(e) => {
                tracing::error!("Error loading list: {}", e);
                self.items.clear();
                self.total_elements = 0;
            }
        }
        self.clamp_selection();
        true
    }

    /// Begin, fetch and apply in one go.
    pub async fn refresh(&mut self, service: &S) -> Result<(), ApiError> {
        let ticket = self.begin_query();
        let outcome = fetch(service, ticket).await;
        let error = outcome.result.as_ref().err().cloned();
        self.apply(outcome);
        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn clamp_selection(&mut self) {
        if self.items.is_empty() {
            self.list_state.select(None);
        } else {
            let i = self.list_state.selected().unwrap_or(0).min(self.items.len() - 1);
            self.list_state.select(Some(i));
        }
    }

    pub fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => {
                if i >= self.items.len().saturating_sub(1) {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => {
                if i == 0 {
                    self.items.len().saturating_sub(1)
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }
}
