//! 内存版宿主：实现全部协作者接口的参考 catalog + 存储
//!
//! ```text
//!  Table            普通行存表
//!  HypertableRoot ─┬─ Chunk ──────────── rows（行段）
//!                  │    └─ compressed_relid ─▶ CompressedChunk ── batches（压缩段）
//!                  └─ Chunk ...
//!  View             连续聚合的用户视图 / 直连视图
//! ```
//!
//! 逻辑数据 = 行段 + 压缩段（按当前表结构投影）。COPY 走 [`MemoryCatalog::scan`]，
//! 由 access method 决定是否带出压缩段。

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;
use crate::catalog::{
    Catalog, Chunk, CompressionSubsystem, ContinuousAgg, ContinuousAggHandler, Hypertable,
    StorageHandler,
};
use crate::command::{ColumnDef, RenameStmt};
use crate::common::{
    AccessMethod, CaggId, ChunkId, HypercoreError, HypertableId, RelId, Result, Row, Value,
};
use crate::segment::{compress_rows, CompressedBatch};

/// Hypercore chunk 上记录内部压缩关系的存储参数
pub const COMPRESSED_RELID_OPTION: &str = "hypercore.compressed_relid";

const FIRST_RELID: RelId = 16384;

/// 内部压缩关系的列（按压缩形式导出时的表头）
const COMPRESSED_COLUMNS: [&str; 3] = ["_ts_meta_count", "_ts_meta_columns", "_ts_compressed_data"];

// ── Relation ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Table,
    HypertableRoot(HypertableId),
    Chunk,
    CompressedChunk,
    View,
}

#[derive(Debug, Clone)]
pub struct Relation {
    pub relid:      RelId,
    pub name:       String,
    pub kind:       RelationKind,
    pub am:         AccessMethod,
    pub columns:    Vec<ColumnDef>,
    /// 未压缩行段
    pub rows:       Vec<Row>,
    /// 压缩段（仅 `CompressedChunk`）
    pub batches:    Vec<CompressedBatch>,
    pub reloptions: BTreeMap<String, String>,
}

impl Relation {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns.iter().position(|c| c.name == name).ok_or_else(|| {
            HypercoreError::ColumnNotFound { relation: self.name.clone(), column: name.into() }
        })
    }
}

// ── MemoryCatalog ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    relations:           BTreeMap<RelId, Relation>,
    names:               HashMap<String, RelId>,
    hypertables:         BTreeMap<HypertableId, Hypertable>,
    chunks:              BTreeMap<RelId, Chunk>,
    caggs:               BTreeMap<RelId, ContinuousAgg>,
    /// hypertable → 参与压缩的列
    compression_columns: HashMap<HypertableId, Vec<String>>,
    /// 本条命令内跳过压缩段的关系
    skip_compressed:     HashSet<RelId>,
    next_relid:          RelId,
    next_hypertable_id:  HypertableId,
    next_chunk_id:       ChunkId,
    next_cagg_id:        CaggId,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            relations:           BTreeMap::new(),
            names:               HashMap::new(),
            hypertables:         BTreeMap::new(),
            chunks:              BTreeMap::new(),
            caggs:               BTreeMap::new(),
            compression_columns: HashMap::new(),
            skip_compressed:     HashSet::new(),
            next_relid:          FIRST_RELID,
            next_hypertable_id:  1,
            next_chunk_id:       1,
            next_cagg_id:        1,
        }
    }

    // ── 查找 ──────────────────────────────────────────────────────────────────

    pub fn relation(&self, relid: RelId) -> Result<&Relation> {
        self.relations.get(&relid).ok_or(HypercoreError::RelationIdNotFound(relid))
    }

    fn relation_mut(&mut self, relid: RelId) -> Result<&mut Relation> {
        self.relations.get_mut(&relid).ok_or(HypercoreError::RelationIdNotFound(relid))
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    pub fn chunk(&self, relid: RelId) -> Option<&Chunk> {
        self.chunks.get(&relid)
    }

    /// hypertable 根表下的全部 chunk（不含内部压缩 chunk）
    pub fn chunks_of(&self, hypertable_relid: RelId) -> Vec<RelId> {
        self.chunks.values()
            .filter(|c| c.hypertable_relid == hypertable_relid)
            .map(|c| c.relid)
            .collect()
    }

    /// hypertable 下已压缩 chunk 对应的内部压缩关系
    fn compressed_chunks_of(&self, hypertable_id: HypertableId) -> Vec<RelId> {
        self.chunks.values()
            .filter(|c| c.hypertable_id == hypertable_id)
            .filter_map(|c| c.compressed_relid)
            .collect()
    }

    pub fn compression_columns(&self, hypertable_id: HypertableId) -> Option<&[String]> {
        self.compression_columns.get(&hypertable_id).map(Vec::as_slice)
    }

    pub fn skips_compressed_data(&self, relid: RelId) -> bool {
        self.skip_compressed.contains(&relid)
    }

    /// 命令结束时清除扫描开关
    pub fn clear_scan_toggles(&mut self) {
        self.skip_compressed.clear();
    }

    // ── DDL ───────────────────────────────────────────────────────────────────

    fn alloc_relation(
        &mut self,
        name:    &str,
        kind:    RelationKind,
        am:      AccessMethod,
        columns: Vec<ColumnDef>,
    ) -> Result<RelId> {
        if self.names.contains_key(name) {
            return Err(HypercoreError::DuplicateRelation(name.into()));
        }
        let relid = self.next_relid;
        self.next_relid += 1;
        self.names.insert(name.into(), relid);
        self.relations.insert(relid, Relation {
            relid,
            name: name.into(),
            kind,
            am,
            columns,
            rows:       vec![],
            batches:    vec![],
            reloptions: BTreeMap::new(),
        });
        Ok(relid)
    }

    fn column_defs(columns: &[&str]) -> Vec<ColumnDef> {
        columns.iter().map(|c| ColumnDef::new(c)).collect()
    }

    pub fn create_table(&mut self, name: &str, columns: &[&str]) -> Result<RelId> {
        self.alloc_relation(name, RelationKind::Table, AccessMethod::RowStore, Self::column_defs(columns))
    }

    pub fn create_hypertable(
        &mut self,
        name:                &str,
        columns:             &[&str],
        compression_enabled: bool,
    ) -> Result<RelId> {
        let id = self.next_hypertable_id;
        let relid = self.alloc_relation(
            name,
            RelationKind::HypertableRoot(id),
            AccessMethod::RowStore,
            Self::column_defs(columns),
        )?;
        self.next_hypertable_id += 1;
        self.hypertables.insert(id, Hypertable {
            id,
            relid,
            name: name.into(),
            compression_enabled: false,
            compressed_hypertable_id: None,
        });
        if compression_enabled {
            self.enable_compression(relid)?;
        }
        Ok(relid)
    }

    pub fn enable_compression(&mut self, hypertable_relid: RelId) -> Result<()> {
        let columns = self.relation(hypertable_relid)?.column_names();
        let ht = self.hypertables.values_mut()
            .find(|h| h.relid == hypertable_relid)
            .ok_or(HypercoreError::RelationIdNotFound(hypertable_relid))?;
        ht.compression_enabled = true;
        self.compression_columns.entry(ht.id).or_insert(columns);
        Ok(())
    }

    /// 新 chunk 继承根表的列与 access method
    pub fn create_chunk(&mut self, hypertable_relid: RelId, name: &str) -> Result<RelId> {
        let ht = self.hypertable_by_relid(hypertable_relid)?
            .ok_or(HypercoreError::RelationIdNotFound(hypertable_relid))?;
        let root = self.relation(hypertable_relid)?;
        let (am, columns) = (root.am, root.columns.clone());

        let relid = self.alloc_relation(name, RelationKind::Chunk, am, columns)?;
        let id = self.next_chunk_id;
        self.next_chunk_id += 1;
        self.chunks.insert(relid, Chunk {
            id,
            relid,
            hypertable_id:    ht.id,
            hypertable_relid,
            compressed:       false,
            compressed_relid: None,
        });
        Ok(relid)
    }

    /// 创建连续聚合：物化 hypertable + 用户视图 + 直连视图，返回用户视图
    pub fn create_continuous_agg(&mut self, name: &str, columns: &[&str]) -> Result<RelId> {
        let id = self.next_cagg_id;
        let mat_relid = self.create_hypertable(&format!("_materialized_hypertable_{id}"), columns, false)?;
        let mat_hypertable_id = self.hypertable_by_relid(mat_relid)?
            .map(|h| h.id)
            .ok_or(HypercoreError::RelationIdNotFound(mat_relid))?;

        let user_view_relid = self.alloc_relation(
            name, RelationKind::View, AccessMethod::RowStore, Self::column_defs(columns),
        )?;
        let direct_view_relid = self.alloc_relation(
            &format!("_direct_view_{id}"), RelationKind::View, AccessMethod::RowStore, Self::column_defs(columns),
        )?;
        self.next_cagg_id += 1;
        self.caggs.insert(user_view_relid, ContinuousAgg {
            id,
            user_view_relid,
            direct_view_relid,
            mat_hypertable_id,
        });
        Ok(user_view_relid)
    }

    /// DROP：hypertable 根表连同 chunk 与压缩 chunk 一起删除
    pub fn drop_relation(&mut self, relid: RelId) -> Result<()> {
        let rel = self.relations.remove(&relid).ok_or(HypercoreError::RelationIdNotFound(relid))?;
        self.names.remove(&rel.name);
        self.skip_compressed.remove(&relid);

        if let RelationKind::HypertableRoot(id) = rel.kind {
            self.hypertables.remove(&id);
            self.compression_columns.remove(&id);
            for chunk in self.chunks_of(relid) {
                self.drop_relation(chunk)?;
            }
        }
        if let Some(chunk) = self.chunks.remove(&relid) {
            if let Some(compressed) = chunk.compressed_relid {
                self.drop_relation(compressed)?;
            }
        }
        for parent in self.chunks.values_mut().filter(|c| c.compressed_relid == Some(relid)) {
            parent.compressed_relid = None;
            parent.compressed       = false;
        }
        Ok(())
    }

    pub fn rename_relation(&mut self, relid: RelId, new_name: &str) -> Result<()> {
        if self.names.contains_key(new_name) {
            return Err(HypercoreError::DuplicateRelation(new_name.into()));
        }
        let rel = self.relation_mut(relid)?;
        let old = std::mem::replace(&mut rel.name, new_name.into());
        self.names.remove(&old);
        self.names.insert(new_name.into(), relid);
        Ok(())
    }

    /// hypertable 上的列变更同时作用于它的所有 chunk
    ///
    /// chunk 的表结构跟随 hypertable，不能单独修改
    fn column_targets(&self, relid: RelId) -> Result<Vec<RelId>> {
        let rel = self.relation(relid)?;
        if matches!(rel.kind, RelationKind::Chunk | RelationKind::CompressedChunk) {
            return Err(HypercoreError::Unsupported(format!(
                "operation not supported on chunk tables: \"{}\"", rel.name,
            )));
        }
        let mut targets = vec![relid];
        if let RelationKind::HypertableRoot(_) = rel.kind {
            targets.extend(self.chunks_of(relid));
        }
        if let Some(cagg) = self.caggs.get(&relid) {
            if let Some(mat) = self.hypertables.get(&cagg.mat_hypertable_id) {
                targets.push(mat.relid);
                targets.extend(self.chunks_of(mat.relid));
            }
        }
        Ok(targets)
    }

    pub fn alter_add_column(&mut self, relid: RelId, column: &ColumnDef) -> Result<()> {
        for target in self.column_targets(relid)? {
            let rel = self.relation_mut(target)?;
            if rel.columns.iter().any(|c| c.name == column.name) {
                return Err(HypercoreError::DuplicateColumn {
                    relation: rel.name.clone(),
                    column:   column.name.clone(),
                });
            }
            rel.columns.push(column.clone());
            for row in &mut rel.rows {
                row.push(column.default.clone());
            }
        }
        Ok(())
    }

    pub fn alter_drop_column(&mut self, relid: RelId, column: &str) -> Result<()> {
        for target in self.column_targets(relid)? {
            let rel = self.relation_mut(target)?;
            let idx = rel.column_index(column)?;
            rel.columns.remove(idx);
            for row in &mut rel.rows {
                row.remove(idx);
            }
        }
        Ok(())
    }

    /// 只改表结构；压缩段中的列名由压缩子系统维护
    pub fn alter_rename_column(&mut self, relid: RelId, old: &str, new: &str) -> Result<()> {
        for target in self.column_targets(relid)? {
            let rel = self.relation_mut(target)?;
            if rel.columns.iter().any(|c| c.name == new) {
                return Err(HypercoreError::DuplicateColumn { relation: rel.name.clone(), column: new.into() });
            }
            let idx = rel.column_index(old)?;
            rel.columns[idx].name = new.into();
        }
        Ok(())
    }

    // ── DML ───────────────────────────────────────────────────────────────────

    /// 写入行段（Hypercore chunk 的新数据同样先落在未压缩行段）
    pub fn insert(&mut self, relid: RelId, rows: Vec<Row>) -> Result<()> {
        let rel = self.relation_mut(relid)?;
        match rel.kind {
            RelationKind::Table | RelationKind::Chunk => {}
            other => return Err(HypercoreError::Unsupported(format!(
                "cannot insert directly into {other:?} \"{}\"", rel.name,
            ))),
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != rel.columns.len()) {
            return Err(HypercoreError::Unsupported(format!(
                "row has {} values, \"{}\" has {} columns", bad.len(), rel.name, rel.columns.len(),
            )));
        }
        rel.rows.extend(rows);
        Ok(())
    }

    /// 写回压缩形式的导出行（整库恢复时使用）
    pub fn restore_compressed(&mut self, relid: RelId, rows: &[Row]) -> Result<usize> {
        let batches = rows.iter()
            .map(CompressedBatch::from_export_row)
            .collect::<Result<Vec<_>>>()?;
        let rel = self.relation_mut(relid)?;
        if rel.kind != RelationKind::CompressedChunk {
            return Err(HypercoreError::Unsupported(format!("\"{}\" is not a compressed chunk", rel.name)));
        }
        let restored: usize = batches.iter().map(CompressedBatch::row_count).sum();
        rel.batches.extend(batches);
        Ok(restored)
    }

    fn ensure_compressed_hypertable(&mut self, hypertable_id: HypertableId) -> Result<HypertableId> {
        let ht = self.hypertables.get(&hypertable_id)
            .cloned()
            .ok_or_else(|| HypercoreError::CatalogInconsistent(format!("hypertable {hypertable_id} not found")))?;
        if let Some(id) = ht.compressed_hypertable_id {
            return Ok(id);
        }
        if !ht.compression_enabled {
            return Err(HypercoreError::CompressionNotEnabled(ht.name));
        }

        let columns: Vec<&str> = COMPRESSED_COLUMNS.to_vec();
        let internal_relid = self.create_hypertable(&format!("_compressed_hypertable_{}", ht.id), &columns, false)?;
        let internal_id = self.hypertable_by_relid(internal_relid)?
            .map(|h| h.id)
            .ok_or(HypercoreError::RelationIdNotFound(internal_relid))?;
        if let Some(h) = self.hypertables.get_mut(&hypertable_id) {
            h.compressed_hypertable_id = Some(internal_id);
        }
        Ok(internal_id)
    }

    /// 压缩 chunk：行段整体搬入内部压缩关系，返回压缩关系 relid
    pub fn compress_chunk(&mut self, chunk_relid: RelId) -> Result<RelId> {
        let chunk = self.chunks.get(&chunk_relid)
            .cloned()
            .ok_or_else(|| HypercoreError::Unsupported(format!("relation {chunk_relid} is not a chunk")))?;

        let compressed_relid = match chunk.compressed_relid {
            Some(relid) => relid,
            None => {
                let internal_id    = self.ensure_compressed_hypertable(chunk.hypertable_id)?;
                let internal_relid = self.hypertables.get(&internal_id)
                    .map(|h| h.relid)
                    .ok_or_else(|| HypercoreError::CatalogInconsistent(format!(
                        "compressed hypertable {internal_id} not found"
                    )))?;
                let name  = format!("compress_hyper_{internal_id}_{}_chunk", chunk.id);
                let relid = self.create_chunk(internal_relid, &name)?;
                if let Some(rel) = self.relations.get_mut(&relid) {
                    rel.kind = RelationKind::CompressedChunk;
                }
                relid
            }
        };

        let rel = self.relation_mut(chunk_relid)?;
        let columns = rel.column_names();
        let rows = std::mem::take(&mut rel.rows);
        let batches = compress_rows(&columns, &rows)?;
        debug!(chunk = chunk_relid, rows = rows.len(), batches = batches.len(), "compressed chunk");

        self.relation_mut(compressed_relid)?.batches.extend(batches);
        if let Some(c) = self.chunks.get_mut(&chunk_relid) {
            c.compressed       = true;
            c.compressed_relid = Some(compressed_relid);
        }
        Ok(compressed_relid)
    }

    // ── 扫描 ──────────────────────────────────────────────────────────────────

    fn compressed_rows(&self, rel: &Relation) -> Result<Vec<Row>> {
        let Some(compressed) = self.chunks.get(&rel.relid).and_then(|c| c.compressed_relid) else {
            return Ok(vec![]);
        };
        let mut rows = Vec::new();
        for batch in &self.relation(compressed)?.batches {
            rows.extend(batch.project(&rel.columns)?);
        }
        Ok(rows)
    }

    fn export_rows(rel: &Relation) -> Result<Vec<Row>> {
        rel.batches.iter().map(CompressedBatch::to_export_row).collect()
    }

    /// 逻辑查询（`SELECT *`）：行段 + 解压后的压缩段，与 access method 无关
    pub fn select_all(&self, relid: RelId) -> Result<Vec<Row>> {
        let rel = self.relation(relid)?;
        match rel.kind {
            RelationKind::HypertableRoot(_) => {
                let mut rows = rel.rows.clone();
                for chunk in self.chunks_of(relid) {
                    rows.extend(self.select_all(chunk)?);
                }
                Ok(rows)
            }
            RelationKind::CompressedChunk => Self::export_rows(rel),
            RelationKind::Chunk => {
                let mut rows = rel.rows.clone();
                rows.extend(self.compressed_rows(rel)?);
                Ok(rows)
            }
            RelationKind::Table | RelationKind::View => Ok(rel.rows.clone()),
        }
    }

    /// access method 驱动的扫描（COPY TO 使用）
    ///
    /// - Hypercore chunk：行段 + 压缩段，打开跳过开关时只有行段
    /// - 内部压缩关系：每个 batch 一行，压缩形式
    /// - 其他：只有行段
    pub fn scan(&self, relid: RelId) -> Result<Vec<Row>> {
        let rel = self.relation(relid)?;
        match (rel.kind, rel.am) {
            (RelationKind::CompressedChunk, _) => Self::export_rows(rel),
            (RelationKind::Chunk, AccessMethod::Hypercore) => {
                let mut rows = rel.rows.clone();
                if !self.skip_compressed.contains(&relid) {
                    rows.extend(self.compressed_rows(rel)?);
                }
                Ok(rows)
            }
            _ => Ok(rel.rows.clone()),
        }
    }

    /// 宿主的通用表重写：按当前 access method 读出全部数据，以目标 access method 写回
    pub fn rewrite_access_method(&mut self, relid: RelId, target: AccessMethod) -> Result<()> {
        let (current, kind) = {
            let rel = self.relation(relid)?;
            (rel.am, rel.kind)
        };

        if kind == RelationKind::Chunk && current.is_hypercore() {
            let rows = self.select_all(relid)?;
            if let Some(compressed) = self.chunks.get(&relid).and_then(|c| c.compressed_relid) {
                self.relation_mut(compressed)?.batches.clear();
            }
            self.relation_mut(relid)?.rows = rows;
        }

        self.relation_mut(relid)?.am = target;
        debug!(relid, from = %current, to = %target, "table rewritten");
        Ok(())
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self { Self::new() }
}

// ── Catalog ───────────────────────────────────────────────────────────────────

impl Catalog for MemoryCatalog {
    fn resolve_relation(&self, name: &str) -> Result<RelId> {
        self.names.get(name).copied().ok_or_else(|| HypercoreError::RelationNotFound(name.into()))
    }

    fn relation_name(&self, relid: RelId) -> Result<String> {
        Ok(self.relation(relid)?.name.clone())
    }

    fn access_method(&self, relid: RelId) -> Result<AccessMethod> {
        Ok(self.relation(relid)?.am)
    }

    fn set_access_method(&mut self, relid: RelId, am: AccessMethod) -> Result<()> {
        self.relation_mut(relid)?.am = am;
        Ok(())
    }

    fn chunk_by_relid(&self, relid: RelId) -> Result<Option<Chunk>> {
        Ok(self.chunks.get(&relid).cloned())
    }

    fn compressed_chunk_parent(&self, chunk: &Chunk) -> Result<Option<Chunk>> {
        Ok(self.chunks.values().find(|c| c.compressed_relid == Some(chunk.relid)).cloned())
    }

    fn hypertable_by_relid(&self, relid: RelId) -> Result<Option<Hypertable>> {
        Ok(self.hypertables.values().find(|h| h.relid == relid).cloned())
    }

    fn hypertable_by_id(&self, id: HypertableId) -> Result<Option<Hypertable>> {
        Ok(self.hypertables.get(&id).cloned())
    }

    fn continuous_agg_by_relid(&self, relid: RelId) -> Result<Option<ContinuousAgg>> {
        Ok(self.caggs.get(&relid).cloned())
    }
}

// ── StorageHandler ────────────────────────────────────────────────────────────

impl StorageHandler for MemoryCatalog {
    fn skip_compressed_data_for_relation(&mut self, relid: RelId) -> Result<()> {
        self.relation(relid)?;
        self.skip_compressed.insert(relid);
        Ok(())
    }

    fn set_hypercore_reloptions(&mut self, chunk: &Chunk) -> Result<()> {
        let compressed = chunk.compressed_relid.map(|r| r.to_string()).unwrap_or_default();
        self.relation_mut(chunk.relid)?
            .reloptions
            .insert(COMPRESSED_RELID_OPTION.into(), compressed);
        Ok(())
    }

    fn alter_access_method_begin(&mut self, relid: RelId, target: AccessMethod) -> Result<()> {
        self.relation(relid)?;
        // 转成 Hypercore 的 chunk 需要压缩配置；未启用时按当前列自动启用
        if let (AccessMethod::Hypercore, Some(chunk)) = (target, self.chunks.get(&relid).cloned()) {
            let enabled = self.hypertables.get(&chunk.hypertable_id).map(|h| h.compression_enabled);
            if enabled == Some(false) {
                self.enable_compression(chunk.hypertable_relid)?;
            }
        }
        Ok(())
    }

    fn alter_access_method_finish(&mut self, relid: RelId, target: AccessMethod) -> Result<()> {
        let Some(chunk) = self.chunks.get(&relid).cloned() else {
            return Ok(());
        };
        match target {
            AccessMethod::Hypercore => {
                if self.relation(relid)?.am.is_hypercore() {
                    self.compress_chunk(relid)?;
                    let chunk = self.chunks.get(&relid).cloned().unwrap_or(chunk);
                    self.set_hypercore_reloptions(&chunk)?;
                }
            }
            AccessMethod::RowStore => {
                if let Some(compressed) = chunk.compressed_relid {
                    self.drop_relation(compressed)?;
                }
                self.relation_mut(relid)?.reloptions.remove(COMPRESSED_RELID_OPTION);
            }
        }
        Ok(())
    }
}

// ── CompressionSubsystem / ContinuousAggHandler ───────────────────────────────

impl CompressionSubsystem for MemoryCatalog {
    fn add_column(&mut self, hypertable: &Hypertable, column: &ColumnDef) -> Result<()> {
        let columns = self.compression_columns.entry(hypertable.id).or_default();
        if !columns.contains(&column.name) {
            columns.push(column.name.clone());
        }
        Ok(())
    }

    /// 压缩段里该列的数据一并删除，之后同名新列不会读到旧值
    fn drop_column(&mut self, hypertable: &Hypertable, column: &str) -> Result<()> {
        if let Some(columns) = self.compression_columns.get_mut(&hypertable.id) {
            columns.retain(|c| c != column);
        }
        for relid in self.compressed_chunks_of(hypertable.id) {
            for batch in &mut self.relation_mut(relid)?.batches {
                batch.drop_column(column)?;
            }
        }
        Ok(())
    }

    fn rename_column(&mut self, hypertable: &Hypertable, stmt: &RenameStmt) -> Result<()> {
        let old = stmt.subname.as_deref().ok_or_else(|| {
            HypercoreError::Unsupported("column rename without a column name".into())
        })?;

        if let Some(columns) = self.compression_columns.get_mut(&hypertable.id) {
            for c in columns.iter_mut().filter(|c| *c == old) {
                *c = stmt.newname.clone();
            }
        }

        for relid in self.compressed_chunks_of(hypertable.id) {
            for batch in &mut self.relation_mut(relid)?.batches {
                batch.rename_column(old, &stmt.newname);
            }
        }
        Ok(())
    }
}

impl ContinuousAggHandler for MemoryCatalog {
    fn rename_view_columns(&mut self, cagg: &ContinuousAgg) -> Result<()> {
        let columns = self.relation(cagg.user_view_relid)?.columns.clone();
        self.relation_mut(cagg.direct_view_relid)?.columns = columns;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> (MemoryCatalog, RelId, RelId) {
        let mut cat = MemoryCatalog::new();
        let ht = cat.create_hypertable("metrics", &["time", "value"], true).unwrap();
        let chunk = cat.create_chunk(ht, "_hyper_1_1_chunk").unwrap();
        cat.insert(chunk, (0..4).map(|i| vec![Value::Int(i), Value::Int(i)]).collect()).unwrap();
        (cat, ht, chunk)
    }

    #[test]
    fn compress_chunk_moves_rows_into_compressed_segment() {
        let (mut cat, ht, chunk) = metrics();
        let compressed = cat.compress_chunk(chunk).unwrap();

        assert!(cat.relation(chunk).unwrap().rows.is_empty());
        assert_eq!(cat.relation(compressed).unwrap().kind, RelationKind::CompressedChunk);
        assert_eq!(cat.select_all(chunk).unwrap().len(), 4);
        assert_eq!(cat.select_all(ht).unwrap().len(), 4);

        let c = cat.chunk(chunk).unwrap();
        assert!(c.can_quick_migrate());
        let parent = cat.compressed_chunk_parent(&cat.chunk_by_relid(compressed).unwrap().unwrap()).unwrap();
        assert_eq!(parent.map(|p| p.relid), Some(chunk));
    }

    #[test]
    fn compress_requires_compression_enabled() {
        let mut cat = MemoryCatalog::new();
        let ht = cat.create_hypertable("plain_ht", &["a"], false).unwrap();
        let chunk = cat.create_chunk(ht, "_hyper_1_1_chunk").unwrap();
        assert!(matches!(cat.compress_chunk(chunk), Err(HypercoreError::CompressionNotEnabled(_))));
    }

    #[test]
    fn row_store_scan_omits_compressed_segment() {
        let (mut cat, _, chunk) = metrics();
        cat.compress_chunk(chunk).unwrap();
        cat.insert(chunk, vec![vec![Value::Int(9), Value::Int(9)]]).unwrap();
        assert_eq!(cat.scan(chunk).unwrap().len(), 1);

        cat.set_access_method(chunk, AccessMethod::Hypercore).unwrap();
        assert_eq!(cat.scan(chunk).unwrap().len(), 5);

        cat.skip_compressed_data_for_relation(chunk).unwrap();
        assert_eq!(cat.scan(chunk).unwrap().len(), 1);
        cat.clear_scan_toggles();
        assert_eq!(cat.scan(chunk).unwrap().len(), 5);
    }

    #[test]
    fn drop_hypertable_removes_chunks_and_segments() {
        let (mut cat, ht, chunk) = metrics();
        let compressed = cat.compress_chunk(chunk).unwrap();
        cat.drop_relation(ht).unwrap();
        assert!(cat.relation(chunk).is_err());
        assert!(cat.relation(compressed).is_err());
        assert!(cat.resolve_relation("metrics").is_err());
    }

    #[test]
    fn column_changes_reach_chunks() {
        let (mut cat, ht, chunk) = metrics();
        cat.alter_add_column(ht, &ColumnDef::new("note").with_default(Value::Text("-".into()))).unwrap();
        assert_eq!(cat.relation(chunk).unwrap().rows[0][2], Value::Text("-".into()));

        cat.alter_rename_column(ht, "note", "comment").unwrap();
        assert_eq!(cat.relation(chunk).unwrap().column_names(), vec!["time", "value", "comment"]);

        cat.alter_drop_column(ht, "value").unwrap();
        assert_eq!(cat.relation(chunk).unwrap().rows[0], vec![Value::Int(0), Value::Text("-".into())]);

        assert!(matches!(
            cat.alter_drop_column(ht, "missing"),
            Err(HypercoreError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn column_changes_on_chunks_are_rejected() {
        let (mut cat, _, chunk) = metrics();
        let compressed = cat.compress_chunk(chunk).unwrap();

        for relid in [chunk, compressed] {
            assert!(matches!(cat.alter_rename_column(relid, "value", "v"), Err(HypercoreError::Unsupported(_))));
            assert!(matches!(cat.alter_drop_column(relid, "value"), Err(HypercoreError::Unsupported(_))));
            assert!(matches!(
                cat.alter_add_column(relid, &ColumnDef::new("extra")),
                Err(HypercoreError::Unsupported(_))
            ));
        }
        assert_eq!(cat.relation(chunk).unwrap().column_names(), vec!["time", "value"]);
    }
}
