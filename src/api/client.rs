use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::auth::AuthAttachment;
use super::query::QueryParams;
use super::transport::{ApiRequest, ApiResponse, Method, Transport};
use crate::error::ApiError;

/// Sends requests through a [`Transport`], attaching credentials and
/// mapping responses to typed values.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    auth: Option<AuthAttachment>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, auth: None }
    }

    pub fn with_auth(mut self, auth: AuthAttachment) -> Self {
        self.auth = Some(auth);
        self
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: QueryParams) -> Result<T, ApiError> {
        let request = ApiRequest::new(Method::Get, path).with_query(query);
        let response = self.execute(request).await?;
        decode(&response)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let request = ApiRequest::new(Method::Post, path).with_body(serde_json::to_value(body)?);
        let response = self.execute(request).await?;
        decode(&response)
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let request = ApiRequest::new(Method::Put, path).with_body(serde_json::to_value(body)?);
        let response = self.execute(request).await?;
        decode(&response)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(ApiRequest::new(Method::Delete, path)).await?;
        Ok(())
    }

    async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        if let Some(auth) = &self.auth {
            auth.attach(&mut request);
        }

        let method = request.method;
        let target = request.path_and_query();
        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!("{} {} failed: {}", method.as_str(), target, e);
            e
        })?;

        if response.is_success() {
            return Ok(response);
        }

        let message = error_message(&response.body);
        tracing::warn!(
            "{} {} returned HTTP {}{}",
            method.as_str(),
            target,
            response.status,
            message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
        );
        Err(ApiError::Status { status: response.status, message })
    }
}

fn decode<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, ApiError> {
    Ok(serde_json::from_str(&response.body)?)
}

/// Pull `message` out of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
}
