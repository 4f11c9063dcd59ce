use std::sync::Arc;

use async_trait::async_trait;

use super::EntityService;
use super::client::ApiClient;
use super::query::QueryParams;
use crate::error::ApiError;
use crate::models::{
    Upsert,
    criteria::ExpenseCriteria,
    expense::{Expense, ExpenseUpsert},
    page::Page,
};

const BASE_PATH: &str = "/api/expenses";

/// Upper bound on pages walked by [`ExpenseService::fetch_all`].
const MAX_PAGES: u32 = 1_000;

pub struct ExpenseService {
    client: Arc<ApiClient>,
}

impl ExpenseService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn get_expenses(&self, criteria: &ExpenseCriteria) -> Result<Page<Expense>, ApiError> {
        self.client.get(BASE_PATH, query_params(criteria)).await
    }

    /// Every expense matching `criteria`, walking pages from the first one.
    pub async fn fetch_all(&self, criteria: &ExpenseCriteria) -> Result<Vec<Expense>, ApiError> {
        let mut criteria = criteria.clone();
        criteria.page = 0;
        let mut expenses = Vec::new();

        loop {
            let page = self.get_expenses(&criteria).await?;
            let last = page.is_last();
            expenses.extend(page.content);
            if last || criteria.page + 1 >= MAX_PAGES {
                break;
            }
            criteria.page += 1;
        }

        tracing::debug!("Fetched {} expenses over {} page(s)", expenses.len(), criteria.page + 1);
        Ok(expenses)
    }
}

pub fn query_params(criteria: &ExpenseCriteria) -> QueryParams {
    let mut params = QueryParams::new()
        .set("page", criteria.page)
        .set("size", criteria.size)
        .set("sort", &criteria.sort);

    for id in &criteria.category_ids {
        params = params.append("categoryIds", id);
    }

    params
        .set_opt("name", criteria.name.as_deref().filter(|n| !n.is_empty()))
        .set_opt("yearMonth", criteria.year_month.as_deref().filter(|m| !m.is_empty()))
}

#[async_trait]
impl EntityService for ExpenseService {
    type Entity = Expense;
    type Criteria = ExpenseCriteria;
    type Upsert = ExpenseUpsert;

    async fn query(&self, criteria: &ExpenseCriteria) -> Result<Page<Expense>, ApiError> {
        self.get_expenses(criteria).await
    }

    async fn upsert(&self, dto: &ExpenseUpsert) -> Result<Expense, ApiError> {
        match dto.id() {
            Some(id) => self.client.put(&format!("{BASE_PATH}/{id}"), dto).await,
            None => self.client.post(BASE_PATH, dto).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("{BASE_PATH}/{id}")).await
    }
}
