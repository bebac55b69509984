//! 全局基础类型与错误定义

use thiserror::Error;

// ── ID 类型别名 ───────────────────────────────────────────────────────────────

/// 物理关系（表 / chunk / 内部压缩表 / 视图）标识
pub type RelId        = u32;
pub type HypertableId = i32;
pub type ChunkId      = i32;
pub type CaggId       = i32;

pub const HYPERCORE_AM_NAME: &str = "hypercore";
pub const HEAP_AM_NAME:      &str = "heap";

// ── AccessMethod ──────────────────────────────────────────────────────────────

/// 关系在 catalog 层挂载的存储方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMethod {
    /// 普通行存（heap）
    RowStore,
    /// 行段 + 内部压缩段的混合存储
    Hypercore,
}

impl AccessMethod {
    /// 由 `SET ACCESS METHOD <name>` 的名字推出目标存储方式。
    ///
    /// 只有 `hypercore` 对应 Hypercore；其余名字或缺省（`heap`）均视为行存。
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some(HYPERCORE_AM_NAME) => Self::Hypercore,
            _                       => Self::RowStore,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::RowStore  => HEAP_AM_NAME,
            Self::Hypercore => HYPERCORE_AM_NAME,
        }
    }

    pub fn is_hypercore(self) -> bool { self == Self::Hypercore }
}

impl std::fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── 行数据 ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

pub type Row = Vec<Value>;

// ── Notice ────────────────────────────────────────────────────────────────────

/// 发给客户端的提示信息（NOTICE 级别）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub detail:  Option<String>,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), detail: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NOTICE: {}", self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {detail}")?;
        }
        Ok(())
    }
}

// ── 错误 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum HypercoreError {
    #[error("hypercore access method not supported on \"{relation}\": {detail}")]
    FeatureNotSupported { relation: String, detail: String },
    #[error("relation \"{0}\" does not exist")]
    RelationNotFound(String),
    #[error("relation with id {0} does not exist")]
    RelationIdNotFound(RelId),
    #[error("relation \"{0}\" already exists")]
    DuplicateRelation(String),
    #[error("column \"{column}\" of relation \"{relation}\" does not exist")]
    ColumnNotFound { relation: String, column: String },
    #[error("column \"{column}\" of relation \"{relation}\" already exists")]
    DuplicateColumn { relation: String, column: String },
    #[error("compression not enabled on hypertable \"{0}\"")]
    CompressionNotEnabled(String),
    #[error("access method change already in progress for relation {0}")]
    TransitionInProgress(RelId),
    #[error("no access method change in progress for relation {0}")]
    TransitionNotStarted(RelId),
    #[error("access method change not finished for relations {0:?}")]
    TransitionUnsettled(Vec<RelId>),
    #[error("relation {relid} uses access method {actual}, expected {expected}")]
    AccessMethodMismatch { relid: RelId, expected: AccessMethod, actual: AccessMethod },
    #[error("catalog inconsistent: {0}")]
    CatalogInconsistent(String),
    #[error("compression error: {0}")]
    Compression(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, HypercoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_method_from_name() {
        assert_eq!(AccessMethod::from_name(Some("hypercore")), AccessMethod::Hypercore);
        assert_eq!(AccessMethod::from_name(Some("heap")), AccessMethod::RowStore);
        assert_eq!(AccessMethod::from_name(Some("brin_like")), AccessMethod::RowStore);
        assert_eq!(AccessMethod::from_name(None), AccessMethod::RowStore);
    }

    #[test]
    fn notice_display_includes_detail() {
        let n = Notice::new("hello").with_detail("world");
        assert_eq!(n.to_string(), "NOTICE: hello\nDETAIL: world");
    }
}
