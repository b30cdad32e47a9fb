use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::{ENTITIES_RESOURCE, Transport};
use crate::error::{AppError, AppResult};
use crate::models::{Entity, Sphere};

#[derive(Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct EntityDirectory {
    entities: Vec<Entity>,
}

impl EntityDirectory {
    pub fn from_entities(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    #[tracing::instrument(
        name = "siconfi entities",
        skip(transport),
        fields(directory.items, directory.entities)
    )]
    pub async fn fetch_entities(transport: &dyn Transport, timeout: Duration) -> AppResult<Self> {
        let body = transport
            .get(ENTITIES_RESOURCE, &[], timeout)
            .await
            .map_err(|e| AppError::DirectoryFetch(e.to_string()))?;

        let response: EntitiesResponse = serde_json::from_value(body)
            .map_err(|e| AppError::DirectoryFetch(format!("unexpected payload: {e}")))?;

        let total = response.items.len();
        let entities: Vec<Entity> = response
            .items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Entity>(item) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed directory item");
                    None
                }
            })
            .collect();

        let span = tracing::Span::current();
        span.record("directory.items", total);
        span.record("directory.entities", entities.len());

        if entities.is_empty() {
            return Err(AppError::DirectoryFetch(
                "directory returned no entities".into(),
            ));
        }

        tracing::info!(entities = entities.len(), "Entity directory loaded");

        Ok(Self { entities })
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn by_sphere<'a>(&'a self, sphere: &'a Sphere) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities.iter().filter(move |e| &e.sphere == sphere)
    }

    pub fn by_codes<'a, 'c>(&'a self, codes: &'c [i64]) -> impl Iterator<Item = &'a Entity> + 'c
    where
        'a: 'c,
    {
        self.entities
            .iter()
            .filter(move |e| codes.contains(&e.entity_code))
    }

    pub fn available_regions(&self, sphere: &Sphere) -> Vec<String> {
        self.by_sphere(sphere)
            .filter_map(|e| e.region().map(str::to_string))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
