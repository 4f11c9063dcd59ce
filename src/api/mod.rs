pub mod auth;
pub mod category;
pub mod client;
pub mod expense;
pub mod query;
pub mod transport;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{Entity, Upsert, criteria::ListCriteria, page::Page};

pub use auth::AuthAttachment;
pub use category::CategoryService;
pub use client::ApiClient;
pub use expense::ExpenseService;

/// Paged query plus create/update/delete for one backend collection.
#[async_trait]
pub trait EntityService: Send + Sync + 'static {
    type Entity: Entity;
    type Criteria: ListCriteria;
    type Upsert: Upsert;

    async fn query(&self, criteria: &Self::Criteria) -> Result<Page<Self::Entity>, ApiError>;

    /// `POST` when the body has no id, `PUT .../{id}` when it does.
    async fn upsert(&self, dto: &Self::Upsert) -> Result<Self::Entity, ApiError>;

    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}
