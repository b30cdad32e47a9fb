use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use serde_json::Value;

use super::Transport;
use crate::models::{QueryKey, Row, Sphere, Variant};
use crate::telemetry::metrics::{QUERY_DURATION, QUERY_ERRORS, REPORT_QUERIES};

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Data(Vec<Row>),
    NoData,
}

#[derive(Clone)]
pub struct ReportQueryClient {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl ReportQueryClient {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub async fn query(&self, key: &QueryKey, sphere: &Sphere, variant: Variant) -> QueryOutcome {
        let label = key.family.variant_label(variant);
        let params = query_params(key, sphere, label);
        let attrs = [
            KeyValue::new("report.family", key.family.code()),
            KeyValue::new("report.variant", label),
        ];

        let start = Instant::now();
        let result = self
            .transport
            .get(key.family.resource(), &params, self.timeout)
            .await;
        REPORT_QUERIES.add(1, &attrs);
        QUERY_DURATION.record(start.elapsed().as_secs_f64(), &attrs);

        match result {
            Ok(body) => {
                let rows = extract_rows(body);
                if rows.is_empty() {
                    QueryOutcome::NoData
                } else {
                    QueryOutcome::Data(rows)
                }
            }
            Err(err) => {
                QUERY_ERRORS.add(1, &attrs);
                tracing::debug!(
                    key = %key,
                    variant = label,
                    error = %err,
                    "Report query failed, treating as no data"
                );
                QueryOutcome::NoData
            }
        }
    }
}

pub fn query_params(
    key: &QueryKey,
    sphere: &Sphere,
    variant_label: &str,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("id_ente", key.entity_code.to_string()),
        ("an_exercicio", key.fiscal_year.to_string()),
    ];
    if let Some(periodicity) = key.periodicity {
        params.push(("in_periodicidade", periodicity.code().to_string()));
    }
    params.push(("nr_periodo", key.period_index.to_string()));
    params.push(("co_tipo_demonstrativo", variant_label.to_string()));
    if let Some(branch) = key.branch {
        params.push(("co_poder", branch.code().to_string()));
    }
    if key.family.scoped_by_sphere() {
        params.push(("co_esfera", sphere.code().to_string()));
    }
    params
}

fn extract_rows(body: Value) -> Vec<Row> {
    match body {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(row) => Some(row),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
