pub mod entities;
pub mod http;
pub mod reports;

use std::time::Duration;

pub use entities::EntityDirectory;
pub use http::HttpTransport;
pub use reports::{QueryOutcome, ReportQueryClient};

pub const ENTITIES_RESOURCE: &str = "entes";

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        resource: &str,
        params: &[(&'static str, String)],
        timeout: Duration,
    ) -> anyhow::Result<serde_json::Value>;
}

#[cfg(test)]
pub(crate) mod stub {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::Transport;

    #[derive(Default)]
    pub struct StubTransport {
        pub entities: Option<Value>,
        pub reports: HashMap<String, Value>,
        pub failing: Vec<String>,
        pub calls: Mutex<Vec<(String, Vec<(&'static str, String)>)>>,
    }

    impl StubTransport {
        pub fn key_for(params: &[(&'static str, String)]) -> String {
            let get = |name: &str| {
                params
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default()
            };
            format!(
                "{}|{}|{}|{}|{}",
                get("co_tipo_demonstrativo"),
                get("id_ente"),
                get("co_poder"),
                get("in_periodicidade"),
                get("nr_periodo"),
            )
        }

        pub fn with_entities(items: Value) -> Self {
            Self {
                entities: Some(json!({ "items": items })),
                ..Default::default()
            }
        }

        pub fn rows(mut self, key: &str, count: usize) -> Self {
            let items: Vec<Value> = (0..count)
                .map(|i| json!({"conta": format!("conta {i}"), "valor": i}))
                .collect();
            self.reports
                .insert(key.to_string(), json!({ "items": items }));
            self
        }

        pub fn fail(mut self, key: &str) -> Self {
            self.failing.push(key.to_string());
            self
        }

        pub fn report_calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(resource, _)| resource != super::ENTITIES_RESOURCE)
                .map(|(_, params)| Self::key_for(params))
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl Transport for StubTransport {
        async fn get(
            &self,
            resource: &str,
            params: &[(&'static str, String)],
            _timeout: Duration,
        ) -> anyhow::Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((resource.to_string(), params.to_vec()));

            if resource == super::ENTITIES_RESOURCE {
                return self
                    .entities
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("connection refused"));
            }

            let key = Self::key_for(params);
            if self.failing.contains(&key) {
                return Err(anyhow::anyhow!("SICONFI API error (503): unavailable"));
            }
            Ok(self
                .reports
                .get(&key)
                .cloned()
                .unwrap_or_else(|| json!({ "items": [] })))
        }
    }
}
