use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{FailureEntry, FamilyDescriptor, Group, ResultRecord, SphereRules};
use crate::siconfi::{EntityDirectory, ReportQueryClient, Transport};
use crate::telemetry::metrics::{EXPORT_FAILURES, GROUPS_EXPORTED, KEYS_EXHAUSTED, ROWS_RESOLVED};

use super::enumerate::{enumerate_keys, key_count};
use super::export::ExportWriter;
use super::progress::{KeyOutcome, ProgressEvent, ProgressReporter, StopSignal};
use super::resolve::{Resolution, VariantResolver};
use super::select::{ExtractionRequest, build_groups, validate_region};

pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub groups: usize,
    pub keys: usize,
    pub records: usize,
    pub rows: usize,
    pub failures: usize,
    pub archives: Vec<PathBuf>,
    pub failure_logs: Vec<PathBuf>,
    pub export_errors: usize,
    pub stopped: bool,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            groups: 0,
            keys: 0,
            records: 0,
            rows: 0,
            failures: 0,
            archives: Vec::new(),
            failure_logs: Vec::new(),
            export_errors: 0,
            stopped: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupOutcome {
    pub records: Vec<ResultRecord>,
    pub failures: Vec<FailureEntry>,
    pub keys: usize,
}

impl GroupOutcome {
    pub fn row_count(&self) -> usize {
        self.records.iter().map(|r| r.rows.len()).sum()
    }
}

pub struct Orchestrator {
    client: ReportQueryClient,
    descriptor: FamilyDescriptor,
    exporter: ExportWriter,
    request_delay: Duration,
    progress: ProgressReporter,
    stop: StopSignal,
}

impl Orchestrator {
    pub fn new(
        client: ReportQueryClient,
        descriptor: FamilyDescriptor,
        exporter: ExportWriter,
    ) -> Self {
        Self {
            client,
            descriptor,
            exporter,
            request_delay: DEFAULT_REQUEST_DELAY,
            progress: ProgressReporter::default(),
            stop: StopSignal::default(),
        }
    }

    pub fn with_request_delay(mut self, request_delay: Duration) -> Self {
        self.request_delay = request_delay;
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    #[tracing::instrument(
        name = "extraction run",
        skip_all,
        fields(
            run.id,
            run.family = %self.descriptor.family,
            run.fiscal_year = fiscal_year,
            run.groups = groups.len(),
        )
    )]
    pub async fn run(&self, groups: &[Group<'_>], fiscal_year: u16) -> RunSummary {
        let mut summary = RunSummary::new();
        tracing::Span::current().record("run.id", tracing::field::display(summary.run_id));

        self.progress.emit(ProgressEvent::RunStarted {
            run_id: summary.run_id,
            family: self.descriptor.family,
            fiscal_year,
            groups: groups.len(),
        });

        for (idx, group) in groups.iter().enumerate() {
            // Stop is honoured between groups only
            if self.stop.is_stopped() {
                summary.stopped = true;
                self.progress.emit(ProgressEvent::RunStopped {
                    skipped_groups: groups.len() - idx,
                });
                break;
            }

            let outcome = self.collect_group(group, fiscal_year).await;
            summary.groups += 1;
            summary.keys += outcome.keys;
            summary.records += outcome.records.len();
            summary.rows += outcome.row_count();
            summary.failures += outcome.failures.len();

            self.export_group(group, fiscal_year, &outcome, &mut summary);
        }

        self.progress.emit(ProgressEvent::RunFinished(summary.clone()));
        summary
    }

    #[tracing::instrument(
        name = "extraction group",
        skip_all,
        fields(
            group.name = %group.name(),
            group.entities = group.entities.len(),
            group.keys,
            group.rows,
            group.failures,
        )
    )]
    pub async fn collect_group(&self, group: &Group<'_>, fiscal_year: u16) -> GroupOutcome {
        let name = group.name();
        let total: usize = group
            .entities
            .iter()
            .map(|e| key_count(&self.descriptor, e))
            .sum();
        let attrs = [KeyValue::new("report.family", self.descriptor.family.code())];

        self.progress.emit(ProgressEvent::GroupStarted {
            group: name.clone(),
            entities: group.entities.len(),
            total,
        });

        let resolver = VariantResolver::new(&self.client, &self.descriptor);
        let mut outcome = GroupOutcome::default();

        for entity in &group.entities {
            for key in enumerate_keys(&self.descriptor, entity, fiscal_year) {
                // Pause before every key except the first of the group
                if outcome.keys > 0 && !self.request_delay.is_zero() {
                    tokio::time::sleep(self.request_delay).await;
                }

                let key_outcome = match resolver.resolve(entity, &key).await {
                    Resolution::Resolved { variant, rows, .. } => {
                        ROWS_RESOLVED.add(rows.len() as u64, &attrs);
                        outcome
                            .records
                            .push(ResultRecord::new(entity, key, variant, rows));
                        KeyOutcome::Resolved(variant)
                    }
                    Resolution::NoData { probes } => {
                        KEYS_EXHAUSTED.add(1, &attrs);
                        outcome.failures.push(FailureEntry::new(
                            entity,
                            key,
                            format!("no variant returned data ({probes} probed)"),
                        ));
                        KeyOutcome::Exhausted
                    }
                };

                outcome.keys += 1;
                self.progress.emit(ProgressEvent::KeyFinished {
                    group: name.clone(),
                    current: outcome.keys,
                    total,
                    key,
                    outcome: key_outcome,
                });
            }
        }

        let span = tracing::Span::current();
        span.record("group.keys", outcome.keys);
        span.record("group.rows", outcome.row_count());
        span.record("group.failures", outcome.failures.len());

        outcome
    }

    fn export_group(
        &self,
        group: &Group<'_>,
        fiscal_year: u16,
        outcome: &GroupOutcome,
        summary: &mut RunSummary,
    ) {
        let name = group.name();

        if outcome.records.is_empty() {
            self.progress
                .emit(ProgressEvent::GroupEmpty { group: name.clone() });
        } else {
            let stem = group.export_stem(self.descriptor.family, fiscal_year);
            match self.exporter.write_group(&outcome.records, &stem) {
                Ok(archive) => {
                    GROUPS_EXPORTED.add(1, &[]);
                    self.progress.emit(ProgressEvent::GroupExported {
                        group: name.clone(),
                        archive: archive.clone(),
                        rows: outcome.row_count(),
                    });
                    summary.archives.push(archive);
                }
                Err(e) => {
                    EXPORT_FAILURES.add(1, &[KeyValue::new("export.kind", "archive")]);
                    summary.export_errors += 1;
                    self.progress.emit(ProgressEvent::ExportFailed {
                        group: name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if outcome.failures.is_empty() {
            return;
        }
        match self.exporter.write_failure_log(
            &outcome.failures,
            &group.sphere,
            group.region.as_deref(),
        ) {
            Ok(path) => {
                self.progress.emit(ProgressEvent::FailureLogWritten {
                    group: name,
                    path: path.clone(),
                    entries: outcome.failures.len(),
                });
                summary.failure_logs.push(path);
            }
            Err(e) => {
                EXPORT_FAILURES.add(1, &[KeyValue::new("export.kind", "failure_log")]);
                summary.export_errors += 1;
                self.progress.emit(ProgressEvent::ExportFailed {
                    group: name,
                    error: e.to_string(),
                });
            }
        }
    }
}

pub async fn run_extraction(
    config: &Config,
    transport: Arc<dyn Transport>,
    request: &ExtractionRequest,
    progress: ProgressReporter,
    stop: StopSignal,
) -> AppResult<RunSummary> {
    let directory =
        EntityDirectory::fetch_entities(transport.as_ref(), config.directory_timeout).await?;
    validate_region(&directory, request)?;

    let groups = build_groups(&directory, request);
    if groups.is_empty() {
        tracing::warn!(family = %request.family, "No entities matched the selection");
        return Ok(RunSummary::new());
    }

    let descriptor = FamilyDescriptor::new(
        request.family,
        SphereRules::new(&config.single_variant_spheres),
    );
    let orchestrator = Orchestrator::new(
        ReportQueryClient::new(transport, config.query_timeout),
        descriptor,
        ExportWriter::new(&config.output_dir, request.family),
    )
    .with_request_delay(config.request_delay)
    .with_progress(progress)
    .with_stop_signal(stop);

    Ok(orchestrator.run(&groups, request.fiscal_year).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::error::AppError;
    use crate::models::{Entity, ReportFamily, Sphere, Variant};
    use crate::pipeline::progress::{ProgressReceiver, channel};
    use crate::siconfi::stub::StubTransport;
    use serde_json::json;

    fn rio() -> Entity {
        Entity {
            entity_code: 3304557,
            display_name: "Rio de Janeiro".to_string(),
            sphere: Sphere::Municipal,
            region_code: Some("RJ".to_string()),
            population: Some(6211423),
        }
    }

    fn uniao() -> Entity {
        Entity {
            entity_code: 1,
            display_name: "União".to_string(),
            sphere: Sphere::Federal,
            region_code: Some("BR".to_string()),
            population: None,
        }
    }

    fn orchestrator(transport: Arc<StubTransport>, output_dir: &std::path::Path) -> Orchestrator {
        Orchestrator::new(
            ReportQueryClient::new(transport, Duration::from_secs(60)),
            FamilyDescriptor::new(ReportFamily::Rgf, SphereRules::default()),
            ExportWriter::new(output_dir, ReportFamily::Rgf),
        )
        .with_request_delay(Duration::ZERO)
    }

    fn group<'a>(entities: Vec<&'a Entity>) -> Group<'a> {
        let first = entities[0];
        Group {
            sphere: first.sphere.clone(),
            region: first.region().map(str::to_string),
            entities,
        }
    }

    fn drain(mut rx: ProgressReceiver) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn test_config(output_dir: &std::path::Path) -> Config {
        let dir = output_dir.to_string_lossy().to_string();
        Config::from_lookup(|name| match name {
            "SICONFI_OUTPUT_DIR" => Some(dir.clone()),
            "SICONFI_REQUEST_DELAY_MS" => Some("0".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_simplified_fallback_and_failure_entry_scenario() {
        let transport =
            Arc::new(StubTransport::default().rows("RGF Simplificado|3304557|E|Q|1", 4));
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(transport.clone(), dir.path());
        let entity = rio();

        let outcome = orch.collect_group(&group(vec![&entity]), 2024).await;

        assert_eq!(outcome.keys, 10);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.variant, Variant::Simplified);
        assert_eq!(record.rows.len(), 4);
        assert_eq!(record.key.period_index, 1);
        assert_eq!(outcome.row_count(), 4);

        assert_eq!(outcome.failures.len(), 9);
        let lines: Vec<String> = outcome.failures.iter().map(ToString::to_string).collect();
        let q1 = "3304557 - Rio de Janeiro - M Executive Quarterly P1".to_string();
        assert!(!lines.contains(&q1));
        let q2 = "3304557 - Rio de Janeiro - M Executive Quarterly P2".to_string();
        assert_eq!(lines.iter().filter(|l| **l == q2).count(), 1);

        assert_eq!(transport.report_calls().len(), 20);
    }

    #[tokio::test]
    async fn test_single_variant_sphere_never_probes_simplified() {
        let transport = Arc::new(StubTransport::default());
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(transport.clone(), dir.path());
        let entity = uniao();

        let outcome = orch.collect_group(&group(vec![&entity]), 2024).await;

        assert_eq!(outcome.keys, 25);
        let calls = transport.report_calls();
        assert_eq!(calls.len(), 25);
        assert!(calls.iter().all(|c| c.starts_with("RGF|")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_delay_paces_keys_within_group() {
        let transport = Arc::new(StubTransport::default());
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(transport, dir.path()).with_request_delay(DEFAULT_REQUEST_DELAY);
        let entity = uniao();

        let start = tokio::time::Instant::now();
        let outcome = orch.collect_group(&group(vec![&entity]), 2024).await;

        assert_eq!(outcome.keys, 25);
        assert_eq!(start.elapsed(), DEFAULT_REQUEST_DELAY * 24);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_delay_spans_entity_boundaries() {
        let transport = Arc::new(StubTransport::default());
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(transport, dir.path()).with_request_delay(Duration::from_secs(1));
        let (a, b) = (rio(), uniao());

        let start = tokio::time::Instant::now();
        let summary = orch
            .run(&[group(vec![&a, &b])], 2024)
            .await;

        assert_eq!(summary.keys, 35);
        assert_eq!(start.elapsed(), Duration::from_secs(34));
    }

    #[tokio::test]
    async fn test_transport_failure_yields_one_failure_entry() {
        let transport = Arc::new(
            StubTransport::default()
                .fail("RGF|3304557|L|S|2")
                .fail("RGF Simplificado|3304557|L|S|2")
                .rows("RGF|3304557|E|Q|1", 1),
        );
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(transport, dir.path());
        let entity = rio();

        let outcome = orch.collect_group(&group(vec![&entity]), 2024).await;

        let failed: Vec<&FailureEntry> = outcome
            .failures
            .iter()
            .filter(|f| f.to_string() == "3304557 - Rio de Janeiro - M Legislative Semiannual P2")
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(outcome.records.iter().all(|r| r.key != failed[0].key));
        assert_eq!(outcome.records.len(), 1);
    }

    #[tokio::test]
    async fn test_collect_group_is_idempotent() {
        let transport = Arc::new(
            StubTransport::default()
                .rows("RGF|3304557|E|Q|1", 2)
                .rows("RGF Simplificado|3304557|L|S|1", 3)
                .rows("RGF|1|J|Q|3", 5),
        );
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(transport, dir.path());
        let (a, b) = (rio(), uniao());
        let g = Group {
            sphere: Sphere::Municipal,
            region: None,
            entities: vec![&a, &b],
        };

        let first = orch.collect_group(&g, 2024).await;
        let second = orch.collect_group(&g, 2024).await;

        assert_eq!(first, second);
        assert_eq!(first.row_count(), 10);
        assert_eq!(first.keys, 35);
    }

    #[tokio::test]
    async fn test_progress_events_cover_every_key() {
        let transport = Arc::new(StubTransport::default().rows("RGF|3304557|E|Q|1", 2));
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = channel();
        let orch = orchestrator(transport, dir.path()).with_progress(ProgressReporter::new(tx));
        let entity = rio();

        orch.run(&[group(vec![&entity])], 2024).await;
        drop(orch);

        let events = drain(rx);
        let currents: Vec<(usize, usize)> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::KeyFinished { current, total, .. } => Some((*current, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(currents, (1..=10).map(|c| (c, 10)).collect::<Vec<_>>());
        assert!(matches!(events.first(), Some(ProgressEvent::RunStarted { groups: 1, .. })));
        assert!(matches!(events.last(), Some(ProgressEvent::RunFinished(_))));
        assert!(events.iter().any(|e| matches!(e, ProgressEvent::GroupExported { rows: 2, .. })));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, ProgressEvent::FailureLogWritten { entries: 9, .. }))
        );
    }

    #[tokio::test]
    async fn test_run_exports_archive_and_failure_log_per_group() {
        let transport = Arc::new(StubTransport::default().rows("RGF|3304557|E|Q|1", 2));
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(transport, dir.path());
        let (a, b) = (rio(), uniao());
        let groups = vec![group(vec![&a]), group(vec![&b])];

        let summary = orch.run(&groups, 2024).await;

        assert_eq!(summary.groups, 2);
        assert_eq!(summary.keys, 35);
        assert_eq!(summary.records, 1);
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.failures, 9 + 25);
        assert_eq!(summary.archives.len(), 1);
        assert_eq!(summary.failure_logs.len(), 2);
        assert_eq!(summary.export_errors, 0);
        assert!(!summary.stopped);

        let archive_name = summary.archives[0].file_name().unwrap().to_str().unwrap();
        assert!(archive_name.starts_with("RGF_M_RJ_2024_"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_export_failure_does_not_stop_other_groups() {
        let transport = Arc::new(
            StubTransport::default()
                .rows("RGF|3304557|E|Q|1", 2)
                .rows("RGF|1|E|Q|1", 2),
        );
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "x").unwrap();
        let orch = orchestrator(transport, &blocker);
        let (a, b) = (rio(), uniao());

        let summary = orch
            .run(&[group(vec![&a]), group(vec![&b])], 2024)
            .await;

        assert_eq!(summary.groups, 2);
        assert_eq!(summary.keys, 35);
        assert!(summary.archives.is_empty());
        assert_eq!(summary.export_errors, 4);
    }

    #[tokio::test]
    async fn test_stop_signal_skips_remaining_groups() {
        let transport = Arc::new(StubTransport::default());
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let (tx, rx) = channel();
        let orch = orchestrator(transport.clone(), dir.path())
            .with_stop_signal(stop.clone())
            .with_progress(ProgressReporter::new(tx));
        let entity = rio();
        stop.stop();

        let summary = orch.run(&[group(vec![&entity])], 2024).await;

        assert!(summary.stopped);
        assert_eq!(summary.groups, 0);
        assert!(transport.report_calls().is_empty());
        drop(orch);
        assert!(drain(rx)
            .iter()
            .any(|e| matches!(e, ProgressEvent::RunStopped { skipped_groups: 1 })));
    }

    #[tokio::test]
    async fn test_empty_directory_aborts_before_any_query() {
        let transport = Arc::new(StubTransport::with_entities(json!([])));
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let request = ExtractionRequest::new(ReportFamily::Rgf, 2024);

        let result = run_extraction(
            &config,
            transport.clone(),
            &request,
            ProgressReporter::default(),
            StopSignal::new(),
        )
        .await;

        assert!(matches!(result, Err(AppError::DirectoryFetch(_))));
        assert!(transport.report_calls().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_extraction_end_to_end() {
        let transport = Arc::new(
            StubTransport::with_entities(json!([
                {"cod_ibge": 3304557, "ente": "Rio de Janeiro", "esfera": "M", "uf": "RJ"},
                {"cod_ibge": 3550308, "ente": "São Paulo", "esfera": "M", "uf": "SP"},
                {"cod_ibge": 1, "ente": "União", "esfera": "U", "uf": "BR"}
            ]))
            .rows("RREO Simplificado|3304557|||3", 4),
        );
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut request = ExtractionRequest::new(ReportFamily::Rreo, 2024);
        request.spheres = vec![Sphere::Municipal];
        request.region = Some("RJ".to_string());

        let summary = run_extraction(
            &config,
            transport.clone(),
            &request,
            ProgressReporter::default(),
            StopSignal::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.groups, 1);
        assert_eq!(summary.keys, 6);
        assert_eq!(summary.records, 1);
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.failures, 5);
        assert_eq!(summary.archives.len(), 1);
        assert_eq!(summary.failure_logs.len(), 1);
        // municipal entities probe both variants for every key
        assert_eq!(transport.report_calls().len(), 12);
    }

    #[tokio::test]
    async fn test_run_extraction_rejects_unknown_region() {
        let transport = Arc::new(StubTransport::with_entities(json!([
            {"cod_ibge": 3304557, "ente": "Rio de Janeiro", "esfera": "M", "uf": "RJ"}
        ])));
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut request = ExtractionRequest::new(ReportFamily::Rgf, 2024);
        request.spheres = vec![Sphere::Municipal];
        request.region = Some("ZZ".to_string());

        let result = run_extraction(
            &config,
            transport.clone(),
            &request,
            ProgressReporter::default(),
            StopSignal::new(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(transport.report_calls().is_empty());
    }
}
