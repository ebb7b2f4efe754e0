//! Model collection accessor

use glbdash_core::{ModelFilters, ModelRecord, Result};

use crate::http::{ApiClient, ApiEnvelope, ApiRequest};

/// Fetch the model list, sending only the constraining filters.
pub async fn list_models(client: &ApiClient, filters: &ModelFilters) -> Result<Vec<ModelRecord>> {
    let request = ApiRequest::get("/models").query(filters.query_pairs());
    let envelope: ApiEnvelope<Vec<ModelRecord>> = client.request(request).await?;
    Ok(envelope
        .into_result("Failed to fetch models")?
        .unwrap_or_default())
}

/// Delete a stored model by identifier.
pub async fn delete_model(client: &ApiClient, id: &str) -> Result<()> {
    let request = ApiRequest::delete("/models").segment(id);
    let envelope: ApiEnvelope<serde_json::Value> = client.request(request).await?;
    envelope.into_result("Failed to delete model")?;
    tracing::info!(model_id = %id, "model deleted");
    Ok(())
}

/// The current model list together with its filters and fetch state.
///
/// Changing the filters through [`update_filters`](Self::update_filters)
/// re-fetches only when the merged filter set actually differs.
#[derive(Debug, Clone)]
pub struct ModelCollection {
    client: ApiClient,
    filters: ModelFilters,
    models: Vec<ModelRecord>,
    loading: bool,
    error: Option<String>,
    generation: u64,
}

/// A list request issued by [`ModelCollection::begin_fetch`].
///
/// Only the most recently issued query is applied by
/// [`ModelCollection::complete_fetch`].
#[derive(Debug, Clone)]
pub struct ModelQuery {
    client: ApiClient,
    filters: ModelFilters,
    generation: u64,
}

impl ModelQuery {
    pub fn filters(&self) -> &ModelFilters {
        &self.filters
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Perform the request.
    pub async fn send(&self) -> Result<Vec<ModelRecord>> {
        list_models(&self.client, &self.filters).await
    }
}

impl ModelCollection {
    pub fn new(client: ApiClient) -> Self {
        Self::with_filters(client, ModelFilters::new())
    }

    pub fn with_filters(client: ApiClient, filters: ModelFilters) -> Self {
        Self {
            client,
            filters,
            models: Vec::new(),
            loading: false,
            error: None,
            generation: 0,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn models(&self) -> &[ModelRecord] {
        &self.models
    }

    pub fn filters(&self) -> &ModelFilters {
        &self.filters
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Message of the last failed fetch, cleared by the next attempt
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn find(&self, id: &str) -> Option<&ModelRecord> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Merge filter changes; re-fetches if the filter set changed.
    ///
    /// Returns whether a fetch was performed.
    pub async fn update_filters(&mut self, changes: &ModelFilters) -> Result<bool> {
        if !self.filters.merge(changes) {
            tracing::debug!("filters unchanged, skipping fetch");
            return Ok(false);
        }
        self.fetch().await?;
        Ok(true)
    }

    /// Re-fetch with the current filters.
    pub async fn refresh(&mut self) -> Result<&[ModelRecord]> {
        self.fetch().await?;
        Ok(&self.models)
    }

    /// Mark the collection as loading and hand out the request to perform.
    pub fn begin_fetch(&mut self) -> ModelQuery {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        ModelQuery {
            client: self.client.clone(),
            filters: self.filters.clone(),
            generation: self.generation,
        }
    }

    /// Apply the outcome of `query`.
    ///
    /// A superseded query is dropped without touching the collection and
    /// returns `Ok(false)`. A failure keeps the previous models and records
    /// the message.
    pub fn complete_fetch(
        &mut self,
        query: &ModelQuery,
        result: Result<Vec<ModelRecord>>,
    ) -> Result<bool> {
        if query.generation != self.generation {
            tracing::debug!(generation = query.generation, "discarding stale model list");
            return Ok(false);
        }
        self.loading = false;

        match result {
            Ok(models) => {
                tracing::debug!(count = models.len(), "models fetched");
                self.models = models;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch models");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch(&mut self) -> Result<()> {
        let query = self.begin_fetch();
        let result = query.send().await;
        self.complete_fetch(&query, result)?;
        Ok(())
    }
}
