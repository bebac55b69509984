//! Catalog 元数据与外部协作者接口
//!
//! 本层只读取 catalog，所有变更都通过下列 trait 请求：
//! - [`Catalog`]：关系 / hypertable / chunk / 连续聚合查找，access method 读写
//! - [`StorageHandler`]：Hypercore 存储实现（跳过压缩数据开关、转换 begin/finish）
//! - [`CompressionSubsystem`]：列级压缩元数据维护
//! - [`ContinuousAggHandler`]：连续聚合视图列同步

use crate::command::{ColumnDef, RenameStmt};
use crate::common::{AccessMethod, CaggId, ChunkId, HypertableId, RelId, Result};

// ── 元数据记录 ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hypertable {
    pub id:                       HypertableId,
    pub relid:                    RelId,
    pub name:                     String,
    pub compression_enabled:      bool,
    /// 存放压缩 chunk 的内部 hypertable
    pub compressed_hypertable_id: Option<HypertableId>,
}

impl Hypertable {
    /// 已启用压缩或已有压缩表
    pub fn has_compression(&self) -> bool {
        self.compression_enabled || self.compressed_hypertable_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id:               ChunkId,
    pub relid:            RelId,
    pub hypertable_id:    HypertableId,
    pub hypertable_relid: RelId,
    /// 数据是否已压缩
    pub compressed:       bool,
    /// 压缩段所在的内部关系
    pub compressed_relid: Option<RelId>,
}

impl Chunk {
    /// 快速迁移前提：数据已压缩，且压缩段确实存在
    pub fn can_quick_migrate(&self) -> bool {
        self.compressed && self.compressed_relid.is_some()
    }
}

/// 内部压缩关系 → 所属 chunk → 使用 Hypercore 的父关系 的弱引用，仅用于查找
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedSegmentMapping {
    pub compressed_relid: RelId,
    pub chunk_relid:      RelId,
    /// 父 chunk 使用 Hypercore 时才有值
    pub hypercore_parent: Option<RelId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuousAgg {
    pub id:                CaggId,
    pub user_view_relid:   RelId,
    pub direct_view_relid: RelId,
    pub mat_hypertable_id: HypertableId,
}

// ── 协作者接口 ────────────────────────────────────────────────────────────────

pub trait Catalog {
    /// 按名字解析关系；不存在时报错
    fn resolve_relation(&self, name: &str) -> Result<RelId>;

    fn relation_name(&self, relid: RelId) -> Result<String>;

    fn access_method(&self, relid: RelId) -> Result<AccessMethod>;

    /// 直接改写 catalog 中的 access method（不搬运数据）
    fn set_access_method(&mut self, relid: RelId, am: AccessMethod) -> Result<()>;

    fn chunk_by_relid(&self, relid: RelId) -> Result<Option<Chunk>>;

    /// `chunk` 若是某个 chunk 的内部压缩关系，返回该父 chunk
    fn compressed_chunk_parent(&self, chunk: &Chunk) -> Result<Option<Chunk>>;

    fn hypertable_by_relid(&self, relid: RelId) -> Result<Option<Hypertable>>;

    fn hypertable_by_id(&self, id: HypertableId) -> Result<Option<Hypertable>>;

    fn continuous_agg_by_relid(&self, relid: RelId) -> Result<Option<ContinuousAgg>>;

    fn is_hypertable(&self, relid: RelId) -> Result<bool> {
        Ok(self.hypertable_by_relid(relid)?.is_some())
    }

    /// 若 `relid` 是某个 chunk 的内部压缩关系，返回映射
    fn compressed_segment_mapping(&self, relid: RelId) -> Result<Option<CompressedSegmentMapping>> {
        let Some(chunk) = self.chunk_by_relid(relid)? else {
            return Ok(None);
        };
        let Some(parent) = self.compressed_chunk_parent(&chunk)? else {
            return Ok(None);
        };
        let hypercore_parent = self
            .access_method(parent.relid)?
            .is_hypercore()
            .then_some(parent.relid);
        Ok(Some(CompressedSegmentMapping {
            compressed_relid: relid,
            chunk_relid:      parent.relid,
            hypercore_parent,
        }))
    }
}

pub trait StorageHandler {
    /// 本条命令剩余部分的扫描跳过压缩段
    fn skip_compressed_data_for_relation(&mut self, relid: RelId) -> Result<()>;

    /// 给 chunk 应用 Hypercore 专用存储参数
    fn set_hypercore_reloptions(&mut self, chunk: &Chunk) -> Result<()>;

    /// 校验前置条件并准备转换，不搬运数据
    fn alter_access_method_begin(&mut self, relid: RelId, target: AccessMethod) -> Result<()>;

    /// 通用重写完成后收尾 catalog 状态
    fn alter_access_method_finish(&mut self, relid: RelId, target: AccessMethod) -> Result<()>;
}

pub trait CompressionSubsystem {
    fn add_column(&mut self, hypertable: &Hypertable, column: &ColumnDef) -> Result<()>;

    fn drop_column(&mut self, hypertable: &Hypertable, column: &str) -> Result<()>;

    fn rename_column(&mut self, hypertable: &Hypertable, stmt: &RenameStmt) -> Result<()>;
}

pub trait ContinuousAggHandler {
    fn rename_view_columns(&mut self, cagg: &ContinuousAgg) -> Result<()>;
}

/// 钩子所需的全部协作者
pub trait Host: Catalog + StorageHandler + CompressionSubsystem + ContinuousAggHandler {}

impl<T> Host for T where T: Catalog + StorageHandler + CompressionSubsystem + ContinuousAggHandler {}
