//! # hypercore-utility 完整使用案例
//!
//! 演示 DDL 拦截层的全部核心功能：
//!
//! 1. 加载配置（环境变量 / TOML）
//! 2. 创建 hypertable、chunk 并压缩
//! 3. 已压缩 chunk 快速迁移到 Hypercore
//! 4. 通用路径：Hypercore → 行存
//! 5. COPY TO 跳过压缩段 / 内部压缩关系改写
//! 6. 整库导出不重复
//! 7. 加列与连续聚合重命名

use hypercore_utility::{
    catalog::Catalog,
    command::{AlterTableCmd, AlterTableStmt, ColumnDef, Statement},
    common::Value,
    engine::HybridEngine,
    ExportBehavior, UtilityConfig,
};
use tracing_subscriber::EnvFilter;

fn main() -> hypercore_utility::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("═══════════════════════════════════════════════════════════");
    println!("   hypercore-utility 演示                                  ");
    println!("═══════════════════════════════════════════════════════════\n");

    // =========================================================================
    // 1. 配置
    // =========================================================================
    println!("【1】加载配置 ...");
    let config = UtilityConfig::from_env()?;
    println!("    copy_to_behavior = {}", config.copy_to_behavior);
    let toml = UtilityConfig::from_toml_str("copy_to_behavior = \"all_data\"")?;
    println!("    TOML 覆盖示例    = {}\n", toml.copy_to_behavior);

    let mut engine = HybridEngine::new(config);

    // =========================================================================
    // 2. hypertable + chunk
    // =========================================================================
    println!("【2】创建 hypertable `metrics` 与两个 chunk ...");
    let cat = engine.catalog_mut();
    let ht = cat.create_hypertable("metrics", &["time", "device", "value"], true)?;
    let c1 = cat.create_chunk(ht, "_hyper_1_1_chunk")?;
    let c2 = cat.create_chunk(ht, "_hyper_1_2_chunk")?;
    let row = |i: i64| vec![Value::Int(i), Value::Text(format!("dev-{}", i % 4)), Value::Int(i * 10)];
    cat.insert(c1, (0..1500).map(row).collect())?;
    cat.insert(c2, (1500..1600).map(row).collect())?;
    let compressed = cat.compress_chunk(c1)?;
    let compressed_name = cat.relation_name(compressed)?;
    println!("    {} 已压缩 → {}", cat.relation_name(c1)?, compressed_name);
    println!("    {} 保持行存\n", cat.relation_name(c2)?);

    // =========================================================================
    // 3. 快速迁移
    // =========================================================================
    println!("【3】ALTER TABLE _hyper_1_1_chunk SET ACCESS METHOD hypercore ...");
    let exec = engine.execute(Statement::set_access_method("_hyper_1_1_chunk", Some("hypercore")))?;
    println!("    结果 = {:?}（无数据重写）", exec.result);
    println!("    access method = {}\n", engine.catalog().access_method(c1)?);

    // =========================================================================
    // 4. 通用路径
    // =========================================================================
    println!("【4】_hyper_1_2_chunk: 行存 → Hypercore → 行存 ...");
    engine.execute(Statement::set_access_method("_hyper_1_2_chunk", Some("hypercore")))?;
    println!("    Hypercore 后已压缩 = {}", engine.catalog().chunk(c2).map_or(false, |c| c.compressed));
    engine.execute(Statement::set_access_method("_hyper_1_2_chunk", Some("heap")))?;
    println!("    回到行存后行数     = {}\n", engine.catalog().select_all(c2)?.len());

    // =========================================================================
    // 5. COPY TO
    // =========================================================================
    println!("【5】COPY TO ...");
    engine.catalog_mut().insert(c1, (1600..1603).map(row).collect())?;
    let exec = engine.execute(Statement::copy_to("_hyper_1_1_chunk", "c1.copy"))?;
    println!("    COPY _hyper_1_1_chunk       → {:?}", exec.result);
    for notice in &exec.notices {
        println!("      NOTICE: {notice}");
    }
    let exec = engine.execute(Statement::copy_to(&compressed_name, "compressed.copy"))?;
    println!("    COPY {compressed_name} → {:?}", exec.result);
    println!();

    // =========================================================================
    // 6. 整库导出
    // =========================================================================
    for behavior in [ExportBehavior::SkipCompressedSegment, ExportBehavior::EmitAllData] {
        println!("【6】整库导出（{behavior}）...");
        let mut engine = HybridEngine::with_catalog(
            engine.catalog().clone(),
            UtilityConfig::with_copy_to_behavior(behavior),
        );
        let dumped = engine.dump_database("dump")?
            .iter()
            .filter_map(|(file, _)| engine.file(file))
            .map(|out| out.logical_rows())
            .sum::<hypercore_utility::Result<usize>>()?;
        println!("    导出逻辑行数 = {dumped}（表内 {} 行）\n", engine.catalog().select_all(ht)?.len());
    }

    // =========================================================================
    // 7. 加列与重命名
    // =========================================================================
    println!("【7】ALTER TABLE metrics ADD COLUMN unit / 连续聚合重命名 ...");
    let add = AlterTableStmt::new(
        "metrics",
        vec![AlterTableCmd::AddColumn(ColumnDef::new("unit").with_default(Value::Text("C".into())))],
    );
    engine.execute(Statement::AlterTable(add))?;
    let id = engine.catalog().hypertable_by_relid(ht)?.map(|h| h.id).unwrap_or_default();
    println!("    压缩列 = {:?}", engine.catalog().compression_columns(id).unwrap_or_default());

    let view = engine.catalog_mut().create_continuous_agg("metrics_hourly", &["bucket", "avg"])?;
    engine.execute(Statement::rename_column("metrics_hourly", "avg", "mean"))?;
    if let Some(cagg) = engine.catalog().continuous_agg_by_relid(view)? {
        let direct = engine.catalog().relation(cagg.direct_view_relid)?;
        println!("    {} 列 = {:?}", direct.name, direct.column_names());
    }

    println!("\n═══════════════════════════════════════════════════════════");
    println!("   全部演示完成 ✓");
    println!("═══════════════════════════════════════════════════════════");
    Ok(())
}
