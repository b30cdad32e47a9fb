use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::LazyLock;

pub static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("siconfi-extractor"));

// --- Report Query Client ---

pub static REPORT_QUERIES: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("siconfi.report.queries")
        .with_description("Number of report queries issued")
        .with_unit("{query}")
        .build()
});

pub static QUERY_ERRORS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("siconfi.report.query.errors")
        .with_description("Report queries that failed and were treated as no data")
        .with_unit("{error}")
        .build()
});

pub static QUERY_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("siconfi.report.query.duration")
        .with_description("Duration of report queries in seconds")
        .with_unit("s")
        .build()
});

// --- Orchestrator ---

pub static ROWS_RESOLVED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("extraction.rows.resolved")
        .with_description("Report rows accumulated for export")
        .with_unit("{row}")
        .build()
});

pub static KEYS_EXHAUSTED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("extraction.keys.exhausted")
        .with_description("Query keys for which no variant returned data")
        .with_unit("{key}")
        .build()
});

// --- Export Writer ---

pub static GROUPS_EXPORTED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("extraction.groups.exported")
        .with_description("Groups written to an archive")
        .with_unit("{group}")
        .build()
});

pub static EXPORT_FAILURES: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("extraction.export.failures")
        .with_description("Group archives or failure logs that could not be written")
        .with_unit("{error}")
        .build()
});
