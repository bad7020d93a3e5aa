//! Conversion behavior of types taken from a loaded snapshot.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;
use schemacast::executor::fixture::FixtureExecutor;
use schemacast::{
    CacheConfig, CastPolicy, ConversionError, HostType, QueryExecutor, SchemaCache,
    SchemaSnapshot, SizeSpec, Value,
};

use common::standard_script;

async fn loaded_snapshot() -> Arc<SchemaSnapshot> {
    let executor = Arc::new(FixtureExecutor::new("16.0.1000", standard_script()));
    let cache = SchemaCache::new(
        "mssql://reader@db1/casts",
        executor as Arc<dyn QueryExecutor>,
        CacheConfig::default(),
    );
    cache.load(false, None).await.expect("load")
}

#[tokio::test]
async fn refining_to_the_current_size_is_identity() {
    let snapshot = loaded_snapshot().await;
    let varchar = snapshot.type_by_name("varchar").expect("varchar");
    let same = varchar.refine_with_size(varchar.size());
    assert!(Arc::ptr_eq(varchar, &same));
    let sized = varchar.refine_with_size(SizeSpec::of_length(5));
    assert!(!Arc::ptr_eq(varchar, &sized));
}

#[tokio::test]
async fn truncation_policy_matrix() {
    let snapshot = loaded_snapshot().await;
    let varchar5 = snapshot
        .type_by_name("varchar")
        .expect("varchar")
        .refine_with_size(SizeSpec::of_length(5));
    let input = Value::Text("abcdefgh".to_string());

    let silent = varchar5
        .cast_host_to_native(&input, CastPolicy::Silent)
        .expect("silent converts");
    assert_eq!(silent, Value::Text("abcde".to_string()));

    let warned = varchar5
        .cast_host_to_native(&input, CastPolicy::Warn)
        .expect("warn converts");
    assert_eq!(warned, silent);

    let err = varchar5
        .cast_host_to_native(&input, CastPolicy::Error)
        .expect_err("error refuses");
    assert!(matches!(
        err,
        ConversionError::WouldTruncate {
            limit: 5,
            actual: 8,
            ..
        }
    ));
}

#[derive(Clone, Default)]
struct WarnCount(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> Layer<S> for WarnCount {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn truncation_diagnostics_follow_the_policy() {
    let snapshot = loaded_snapshot().await;
    let varchar5 = snapshot
        .type_by_name("varchar")
        .expect("varchar")
        .refine_with_size(SizeSpec::of_length(5));
    let input = Value::Text("abcdefgh".to_string());

    let warns = WarnCount::default();
    let subscriber = tracing_subscriber::registry().with(warns.clone());
    tracing::subscriber::with_default(subscriber, || {
        varchar5
            .cast_host_to_native(&input, CastPolicy::Silent)
            .expect("silent converts");
        assert_eq!(warns.0.load(Ordering::SeqCst), 0, "silent emits nothing");

        varchar5
            .cast_host_to_native(&input, CastPolicy::Warn)
            .expect("warn converts");
        assert_eq!(warns.0.load(Ordering::SeqCst), 1, "warn emits one diagnostic");
    });
}

#[tokio::test]
async fn int_round_trip_is_lossless() {
    let snapshot = loaded_snapshot().await;
    let int = snapshot.type_by_name("int").expect("int");
    assert!(int.accepts_host_type(HostType::Int32));

    let written = int
        .cast_host_to_native(&Value::Int32(-42), CastPolicy::Silent)
        .expect("write");
    let read = int
        .cast_native_to_host(&written, HostType::Int32, CastPolicy::Silent)
        .expect("read");
    assert_eq!(read, Value::Int32(-42));
}

#[tokio::test]
async fn datetime_values_clamp_to_the_kind_range() {
    let snapshot = loaded_snapshot().await;
    let datetime = snapshot.type_by_name("datetime").expect("datetime");

    let min = NaiveDate::from_ymd_opt(1753, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid");
    let before_min = NaiveDate::from_ymd_opt(1700, 6, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid");

    // Boundary values pass through unchanged under every policy.
    for policy in [CastPolicy::Silent, CastPolicy::Warn, CastPolicy::Error] {
        let out = datetime
            .cast_host_to_native(&Value::DateTime(min), policy)
            .expect("boundary");
        assert_eq!(out, Value::DateTime(min));
    }

    let clamped = datetime
        .cast_host_to_native(&Value::DateTime(before_min), CastPolicy::Silent)
        .expect("silent clamps");
    assert_eq!(clamped, Value::DateTime(min));

    let err = datetime
        .cast_host_to_native(&Value::DateTime(before_min), CastPolicy::Error)
        .expect_err("error refuses to clamp");
    assert!(matches!(err, ConversionError::OutOfRange { .. }));
}

#[tokio::test]
async fn empty_row_sets_collapse_to_the_no_rows_marker() {
    let snapshot = loaded_snapshot().await;
    let list = snapshot.type_by_name("dbo.WidgetList").expect("table type");
    assert!(list.accepts_host_type(HostType::Rows));

    let out = list
        .cast_host_to_native(&Value::Rows(Some(Vec::new())), CastPolicy::Error)
        .expect("empty input converts");
    assert_eq!(out, Value::Rows(None));
    // The marker and an empty collection stay distinguishable.
    assert_ne!(out, Value::Rows(Some(Vec::new())));
}

#[tokio::test]
async fn table_rows_cast_element_wise() {
    let snapshot = loaded_snapshot().await;
    let list = snapshot.type_by_name("dbo.WidgetList").expect("table type");

    let rows = Value::Rows(Some(vec![
        vec![Value::Int32(1), Value::Text("first".to_string())],
        // The trailing nullable column may be omitted.
        vec![Value::Int32(2)],
    ]));
    let out = list
        .cast_host_to_native(&rows, CastPolicy::Silent)
        .expect("rows convert");
    match out {
        Value::Rows(Some(converted)) => {
            assert_eq!(converted.len(), 2);
            assert_eq!(converted[0][0], Value::Int32(1));
            assert_eq!(converted[1][1], Value::Null);
        }
        other => panic!("expected rows, got {other:?}"),
    }

    // A null in the non-nullable leading column is rejected.
    let bad = Value::Rows(Some(vec![vec![Value::Null, Value::Text("x".to_string())]]));
    assert!(list.cast_host_to_native(&bad, CastPolicy::Silent).is_err());

    // Rows wider than the declared shape are rejected.
    let wide = Value::Rows(Some(vec![vec![
        Value::Int32(1),
        Value::Text("x".to_string()),
        Value::Int32(9),
    ]]));
    assert!(matches!(
        list.cast_host_to_native(&wide, CastPolicy::Silent),
        Err(ConversionError::UnsupportedConversion { .. })
    ));
}

#[tokio::test]
async fn unsupported_conversions_fail_fast_after_first_attempt() {
    let snapshot = loaded_snapshot().await;
    let int = snapshot.type_by_name("int").expect("int");
    assert!(!int.accepts_host_type(HostType::Rows));
    for _ in 0..2 {
        let err = int
            .cast_host_to_native(&Value::Rows(None), CastPolicy::Silent)
            .expect_err("rows into int");
        assert!(matches!(err, ConversionError::UnsupportedConversion { .. }));
    }
}

#[tokio::test]
async fn null_passes_through_any_type() {
    let snapshot = loaded_snapshot().await;
    for name in ["int", "varchar", "datetime", "dbo.WidgetList"] {
        let ty = snapshot.type_by_name(name).expect("type");
        let out = ty
            .cast_host_to_native(&Value::Null, CastPolicy::Error)
            .expect("null passes");
        assert_eq!(out, Value::Null);
    }
}
