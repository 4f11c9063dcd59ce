use std::sync::Arc;

use async_trait::async_trait;

use super::EntityService;
use super::client::ApiClient;
use super::query::QueryParams;
use crate::error::ApiError;
use crate::models::{
    Upsert,
    category::{Category, CategoryUpsert},
    criteria::{AllCategoryCriteria, CategoryCriteria},
    page::Page,
};

const BASE_PATH: &str = "/api/categories";

pub struct CategoryService {
    client: Arc<ApiClient>,
}

impl CategoryService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Unpaged list, used to fill category pickers.
    pub async fn list_all(&self, criteria: &AllCategoryCriteria) -> Result<Vec<Category>, ApiError> {
        let params = QueryParams::new()
            .set_opt("sort", criteria.sort.as_ref())
            .set_opt("name", criteria.name.as_deref().filter(|n| !n.is_empty()));
        self.client.get(BASE_PATH, params).await
    }

    pub async fn get_categories(&self, criteria: &CategoryCriteria) -> Result<Page<Category>, ApiError> {
        self.client.get(&format!("{BASE_PATH}/page"), page_params(criteria)).await
    }
}

pub fn page_params(criteria: &CategoryCriteria) -> QueryParams {
    QueryParams::new()
        .set("page", criteria.page)
        .set("size", criteria.size)
        .set("sort", &criteria.sort)
        .set_opt("name", criteria.name.as_deref().filter(|n| !n.is_empty()))
}

#[async_trait]
impl EntityService for CategoryService {
    type Entity = Category;
    type Criteria = CategoryCriteria;
    type Upsert = CategoryUpsert;

    async fn query(&self, criteria: &CategoryCriteria) -> Result<Page<Category>, ApiError> {
        self.get_categories(criteria).await
    }

    async fn upsert(&self, dto: &CategoryUpsert) -> Result<Category, ApiError> {
        match dto.id() {
            Some(id) => self.client.put(&format!("{BASE_PATH}/{id}"), dto).await,
            None => self.client.post(BASE_PATH, dto).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("{BASE_PATH}/{id}")).await
    }
}
