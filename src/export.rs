//! COPY TO 改写器
//!
//! Hypercore 表的数据物理上分成两个关系：未压缩行段 + 内部压缩段。整库导出会
//! 分别遍历两者，若不加处理，压缩数据会导出两遍（一次经 Hypercore 扫描以解压
//! 形式，一次直接导出内部压缩关系）。两种配置：
//!
//! | 配置                      | Hypercore 关系            | 内部压缩关系            |
//! |---------------------------|---------------------------|-------------------------|
//! | `SkipCompressedSegment`   | 只导出未压缩行（扫描过滤）| 按压缩格式导出          |
//! | `EmitAllData`             | 导出全部数据              | 改写为恒假查询，0 行    |

use tracing::{debug, info};
use crate::catalog::{Catalog, StorageHandler};
use crate::command::{CopyDirection, CopySource, CopyStmt, SelectQuery};
use crate::common::{Notice, RelId, Result};
use crate::config::ExportBehavior;

/// 改写器采取的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportAction {
    /// 不处理
    Default,
    /// 已打开存储层的跳过压缩段开关
    SkipCompressed { relid: RelId },
    /// 内部压缩关系的导出被改写为空结果
    Suppressed { compressed_relid: RelId, parent_relid: RelId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRewrite {
    /// `Suppressed` 时返回替换后的新语句，否则为 `None`
    pub replacement: Option<CopyStmt>,
    pub action:      ExportAction,
    pub notice:      Option<Notice>,
}

impl ExportRewrite {
    fn unchanged() -> Self {
        Self { replacement: None, action: ExportAction::Default, notice: None }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExportRewriter {
    behavior: ExportBehavior,
}

impl ExportRewriter {
    pub fn new(behavior: ExportBehavior) -> Self { Self { behavior } }

    pub fn behavior(&self) -> ExportBehavior { self.behavior }

    pub fn rewrite<H: Catalog + StorageHandler>(&self, host: &mut H, stmt: &CopyStmt) -> Result<ExportRewrite> {
        let relation = match (&stmt.source, stmt.direction) {
            (CopySource::Relation(name), CopyDirection::To) => name,
            _ => return Ok(ExportRewrite::unchanged()),
        };

        let relid = host.resolve_relation(relation)?;

        if host.access_method(relid)?.is_hypercore() {
            return match self.behavior {
                ExportBehavior::SkipCompressedSegment => self.skip_compressed(host, relid),
                ExportBehavior::EmitAllData           => Ok(ExportRewrite::unchanged()),
            };
        }

        if self.behavior != ExportBehavior::EmitAllData {
            return Ok(ExportRewrite::unchanged());
        }

        match host.compressed_segment_mapping(relid)? {
            Some(mapping) => match mapping.hypercore_parent {
                Some(parent_relid) => self.suppress(host, stmt, relid, parent_relid),
                None               => Ok(ExportRewrite::unchanged()),
            },
            None => Ok(ExportRewrite::unchanged()),
        }
    }

    fn skip_compressed<H: Catalog + StorageHandler>(&self, host: &mut H, relid: RelId) -> Result<ExportRewrite> {
        host.skip_compressed_data_for_relation(relid)?;
        let notice = Notice::new(format!(
            "skipping compressed data when copying \"{}\"",
            host.relation_name(relid)?,
        ))
        .with_detail("Use copy_to_behavior to change this behavior.");
        info!(relid, "{}", notice.message);

        Ok(ExportRewrite {
            replacement: None,
            action:      ExportAction::SkipCompressed { relid },
            notice:      Some(notice),
        })
    }

    /// `COPY <compressed> TO` → `COPY (SELECT FROM <compressed> WHERE false) TO`
    fn suppress<H: Catalog>(
        &self,
        host:         &H,
        stmt:         &CopyStmt,
        relid:        RelId,
        parent_relid: RelId,
    ) -> Result<ExportRewrite> {
        let compressed_name = host.relation_name(relid)?;
        let parent_name     = host.relation_name(parent_relid)?;

        let replacement = CopyStmt {
            source:    CopySource::Query(SelectQuery::always_false(&compressed_name)),
            direction: stmt.direction,
            attlist:   vec![],
            file:      stmt.file.clone(),
        };
        let notice = Notice::new(format!(
            "skipping data for internal Hypercore relation \"{compressed_name}\"",
        ))
        .with_detail(format!(
            "Use COPY TO on Hypercore relation \"{parent_name}\" to return data in uncompressed form \
             or use copy_to_behavior to change this behavior.",
        ));
        debug!(relid, parent_relid, "copy of internal compressed relation rewritten");
        info!(relid, "{}", notice.message);

        Ok(ExportRewrite {
            replacement: Some(replacement),
            action:      ExportAction::Suppressed { compressed_relid: relid, parent_relid },
            notice:      Some(notice),
        })
    }
}
