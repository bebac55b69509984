use proptest::prelude::*;

use hypercore_utility::catalog::Catalog;
use hypercore_utility::command::{CopySource, Predicate, SelectQuery, Statement};
use hypercore_utility::common::{AccessMethod, RelId, Row, Value};
use hypercore_utility::engine::{HybridEngine, StatementResult};
use hypercore_utility::{ExportBehavior, UtilityConfig};

const CHUNK: &str = "_hyper_1_1_chunk";

fn rows(range: std::ops::Range<i64>) -> Vec<Row> {
    range.map(|i| vec![Value::Int(i), Value::Int(i * 2)]).collect()
}

/// Hypercore chunk：`compressed` 行在压缩段，`plain` 行在未压缩行段。
/// 返回 (engine, chunk, 内部压缩关系名)
fn hypercore_engine(behavior: ExportBehavior, plain: i64, compressed: i64) -> (HybridEngine, RelId, String) {
    let mut eng = HybridEngine::new(UtilityConfig::with_copy_to_behavior(behavior));
    let cat = eng.catalog_mut();
    let ht = cat.create_hypertable("metrics", &["time", "value"], true).unwrap();
    let chunk = cat.create_chunk(ht, CHUNK).unwrap();
    cat.insert(chunk, rows(0..compressed)).unwrap();
    let compressed_relid = cat.compress_chunk(chunk).unwrap();
    cat.set_access_method(chunk, AccessMethod::Hypercore).unwrap();
    cat.insert(chunk, rows(compressed..compressed + plain)).unwrap();
    let name = cat.relation_name(compressed_relid).unwrap();
    (eng, chunk, name)
}

#[test]
fn copy_hypercore_relation_skips_compressed_data() {
    let (mut eng, chunk, _) = hypercore_engine(ExportBehavior::SkipCompressedSegment, 3, 10);

    let exec = eng.execute(Statement::copy_to(CHUNK, "out.copy")).unwrap();

    assert_eq!(exec.result, StatementResult::Copied { rows: 3 });
    assert_eq!(exec.notices.len(), 1);
    assert_eq!(exec.notices[0].message, format!("skipping compressed data when copying \"{CHUNK}\""));
    let out = eng.file("out.copy").unwrap();
    assert_eq!(out.rows, rows(10..13));
    assert!(!out.compressed_form);
    // 开关只在本条命令内有效
    assert!(!eng.catalog().skips_compressed_data(chunk));
    assert_eq!(eng.catalog().scan(chunk).unwrap().len(), 13);
}

#[test]
fn copy_internal_relation_in_skip_mode_returns_compressed_form() {
    let (mut eng, _, compressed) = hypercore_engine(ExportBehavior::SkipCompressedSegment, 3, 2500);

    let exec = eng.execute(Statement::copy_to(&compressed, "c.copy")).unwrap();

    assert_eq!(exec.result, StatementResult::Copied { rows: 3 });
    assert!(exec.notices.is_empty());
    let out = eng.file("c.copy").unwrap();
    assert!(out.compressed_form);
    assert_eq!(out.logical_rows().unwrap(), 2500);
}

#[test]
fn copy_internal_relation_in_emit_all_mode_is_empty() {
    let (mut eng, _, compressed) = hypercore_engine(ExportBehavior::EmitAllData, 3, 10);

    let exec = eng.execute(Statement::copy_to(&compressed, "c.copy")).unwrap();

    assert_eq!(exec.result, StatementResult::Copied { rows: 0 });
    match exec.executed {
        Some(Statement::Copy(copy)) => {
            assert_eq!(
                copy.source,
                CopySource::Query(SelectQuery { from: Some(compressed.clone()), predicate: Predicate::False }),
            );
            assert_eq!(copy.file, "c.copy");
        }
        other => panic!("unexpected executed statement: {other:?}"),
    }
    assert_eq!(exec.notices.len(), 1);
    let notice = &exec.notices[0];
    assert_eq!(notice.message, format!("skipping data for internal Hypercore relation \"{compressed}\""));
    assert!(notice.detail.as_deref().unwrap().contains(&format!("\"{CHUNK}\"")));

    let out = eng.file("c.copy").unwrap();
    assert!(out.rows.is_empty());
    assert_eq!(out.columns.len(), 3);
}

#[test]
fn copy_hypercore_relation_in_emit_all_mode_returns_everything() {
    let (mut eng, _, _) = hypercore_engine(ExportBehavior::EmitAllData, 3, 10);

    let exec = eng.execute(Statement::copy_to(CHUNK, "out.copy")).unwrap();

    assert_eq!(exec.result, StatementResult::Copied { rows: 13 });
    assert!(exec.notices.is_empty());
}

#[test]
fn copy_with_column_list() {
    let (mut eng, _, _) = hypercore_engine(ExportBehavior::EmitAllData, 2, 0);
    let mut stmt = hypercore_utility::command::CopyStmt::to_file(CHUNK, "cols.copy");
    stmt.attlist = vec!["value".into()];

    eng.execute(Statement::Copy(stmt)).unwrap();

    let out = eng.file("cols.copy").unwrap();
    assert_eq!(out.columns, vec!["value".to_string()]);
    assert_eq!(out.rows, vec![vec![Value::Int(0)], vec![Value::Int(2)]]);
}

#[test]
fn copy_from_is_untouched() {
    let (mut eng, chunk, _) = hypercore_engine(ExportBehavior::SkipCompressedSegment, 0, 4);
    eng.put_file("extra.copy", hypercore_utility::engine::CopyOutput {
        columns:         vec!["time".into(), "value".into()],
        rows:            rows(100..102),
        compressed_form: false,
    });

    let exec = eng.execute(Statement::copy_from(CHUNK, "extra.copy")).unwrap();

    assert_eq!(exec.result, StatementResult::Imported { rows: 2 });
    assert!(exec.notices.is_empty());
    assert!(!eng.catalog().skips_compressed_data(chunk));
    assert_eq!(eng.catalog().select_all(chunk).unwrap().len(), 6);
}

#[test]
fn compressed_export_keeps_column_names_containing_commas() {
    let build = |rows: Vec<Row>| {
        let mut eng = HybridEngine::new(UtilityConfig::default());
        let cat = eng.catalog_mut();
        let ht = cat.create_hypertable("metrics", &["time", "a,b"], true).unwrap();
        let chunk = cat.create_chunk(ht, CHUNK).unwrap();
        cat.insert(chunk, rows).unwrap();
        let compressed = cat.compress_chunk(chunk).unwrap();
        let name = cat.relation_name(compressed).unwrap();
        (eng, chunk, name)
    };
    let (mut source, _, compressed) = build(rows(0..5));

    source.execute(Statement::copy_to(&compressed, "c.copy")).unwrap();
    let out = source.file("c.copy").unwrap().clone();
    assert_eq!(out.logical_rows().unwrap(), 5);

    let (mut target, chunk, _) = build(vec![]);
    target.put_file("c.copy", out);
    let exec = target.execute(Statement::copy_from(&compressed, "c.copy")).unwrap();
    assert_eq!(exec.result, StatementResult::Imported { rows: 5 });
    assert_eq!(target.catalog().select_all(chunk).unwrap(), rows(0..5));
}

#[test]
fn malformed_compressed_file_fails_row_count() {
    let out = hypercore_utility::engine::CopyOutput {
        columns:         vec!["_ts_meta_count".into()],
        rows:            vec![vec![Value::Int(3), Value::Text("time".into()), Value::Bytes(vec![])]],
        compressed_form: true,
    };
    assert!(out.logical_rows().is_err());
}

/// 整库导出中属于 metrics 的逻辑行数（chunk + 内部压缩关系）
fn dumped_logical_rows(eng: &mut HybridEngine, compressed: &str) -> usize {
    eng.dump_database("dump").unwrap();
    let chunk_rows = eng.file(&format!("dump/{CHUNK}.copy")).unwrap().logical_rows().unwrap();
    let compressed_rows = eng.file(&format!("dump/{compressed}.copy")).unwrap().logical_rows().unwrap();
    chunk_rows + compressed_rows
}

#[test]
fn dump_and_restore_preserve_rows_in_both_modes() {
    for behavior in [ExportBehavior::SkipCompressedSegment, ExportBehavior::EmitAllData] {
        let (mut source, _, compressed) = hypercore_engine(behavior, 5, 1200);
        source.dump_database("dump").unwrap();

        // 同样的表结构，空数据
        let (mut target, chunk, target_compressed) = hypercore_engine(behavior, 0, 0);
        assert_eq!(target_compressed, compressed);
        for name in [CHUNK, compressed.as_str()] {
            let file = format!("dump/{name}.copy");
            target.put_file(&file, source.file(&file).unwrap().clone());
            target.execute(Statement::copy_from(name, &file)).unwrap();
        }

        let mut restored = target.catalog().select_all(chunk).unwrap();
        restored.sort();
        assert_eq!(restored, rows(0..1205), "behavior {behavior}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn full_dump_never_duplicates_rows(plain in 0i64..40, compressed in 0i64..2100, emit_all in any::<bool>()) {
        let behavior = if emit_all { ExportBehavior::EmitAllData } else { ExportBehavior::SkipCompressedSegment };
        let (mut eng, _, compressed_name) = hypercore_engine(behavior, plain, compressed);

        let dumped = dumped_logical_rows(&mut eng, &compressed_name);

        prop_assert_eq!(dumped, (plain + compressed) as usize);
    }
}
