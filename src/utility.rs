//! 宿主命令处理管线的四个接入点
//!
//! - [`ProcessUtility::ddl_command_start`]：命令执行前
//! - [`ProcessUtility::ddl_command_end`]：catalog 变更提交后、事务结束前
//! - [`ProcessUtility::process_altertable_cmd`]：ALTER TABLE 加列 / 删列
//! - [`ProcessUtility::process_rename_cmd`]：列重命名

use tracing::debug;
use crate::catalog::{Host, Hypertable};
use crate::classify::{Command, HookPhase, Route};
use crate::command::{AlterTableCmd, RenameObject, RenameStmt, Statement};
use crate::common::{HypercoreError, Notice, RelId, Result};
use crate::config::UtilityConfig;
use crate::export::ExportRewriter;
use crate::transition::TransitionController;

/// pre-hook 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum DdlResult {
    /// 按原语句默认执行
    Continue,
    /// 用替换后的语句默认执行
    Rewritten(Statement),
    /// 语句已完全处理，跳过默认执行
    Done,
}

pub struct ProcessUtility {
    config:      UtilityConfig,
    transitions: TransitionController,
    exports:     ExportRewriter,
    notices:     Vec<Notice>,
}

impl ProcessUtility {
    pub fn new(config: UtilityConfig) -> Self {
        let exports = ExportRewriter::new(config.copy_to_behavior);
        Self { config, transitions: TransitionController::new(), exports, notices: vec![] }
    }

    pub fn config(&self) -> &UtilityConfig { &self.config }

    pub fn transitions(&self) -> &TransitionController { &self.transitions }

    // ── 钩子 ──────────────────────────────────────────────────────────────────

    pub fn ddl_command_start<H: Host>(&mut self, host: &mut H, stmt: &Statement) -> Result<DdlResult> {
        let command = Command::classify(stmt);
        debug!(kind = ?command.kind(), tag = stmt.tag(), "ddl_command_start");

        match (command.route(HookPhase::Pre), command) {
            (Route::TransitionController, Command::AlterAccessMethod(alter)) => {
                let remaining = self.transitions.process_alter_start(host, alter)?;
                if remaining.cmds.is_empty() {
                    // 子命令全部走了快速迁移，没有必要再执行这条 ALTER
                    Ok(DdlResult::Done)
                } else if remaining.cmds.len() == alter.cmds.len() {
                    Ok(DdlResult::Continue)
                } else {
                    Ok(DdlResult::Rewritten(Statement::AlterTable(remaining)))
                }
            }
            (Route::ExportRewriter, Command::CopyExport(copy)) => {
                let rewrite = self.exports.rewrite(host, copy)?;
                self.notices.extend(rewrite.notice);
                Ok(match rewrite.replacement {
                    Some(replacement) => DdlResult::Rewritten(Statement::Copy(replacement)),
                    None              => DdlResult::Continue,
                })
            }
            _ => Ok(DdlResult::Continue),
        }
    }

    /// `stmt` 是实际执行过的语句（pre-hook 改写后的版本）
    pub fn ddl_command_end<H: Host>(&mut self, host: &mut H, stmt: &Statement) -> Result<()> {
        let command = Command::classify(stmt);
        debug!(kind = ?command.kind(), tag = stmt.tag(), "ddl_command_end");

        match (command.route(HookPhase::Post), command) {
            (Route::TransitionController, Command::AlterAccessMethod(alter)) =>
                self.transitions.process_alter_end(host, alter),
            _ => Ok(()),
        }
    }

    /// ALTER TABLE 加列 / 删列时同步压缩元数据
    pub fn process_altertable_cmd<H: Host>(
        &mut self,
        host:       &mut H,
        hypertable: &Hypertable,
        cmd:        &AlterTableCmd,
    ) -> Result<()> {
        if !hypertable.has_compression() {
            return Ok(());
        }
        match cmd {
            AlterTableCmd::AddColumn(column) => host.add_column(hypertable, column),
            AlterTableCmd::DropColumn { name } => host.drop_column(hypertable, name),
            AlterTableCmd::SetAccessMethod { .. } | AlterTableCmd::Other(_) => Ok(()),
        }
    }

    /// 列重命名：hypertable 直接处理；连续聚合转到其物化 hypertable
    pub fn process_rename_cmd<H: Host>(&mut self, host: &mut H, relid: RelId, stmt: &RenameStmt) -> Result<()> {
        if stmt.object != RenameObject::Column {
            return Ok(());
        }

        let mut hypertable = host.hypertable_by_relid(relid)?;
        if hypertable.is_none() {
            if let Some(cagg) = host.continuous_agg_by_relid(relid)? {
                let mat = host.hypertable_by_id(cagg.mat_hypertable_id)?.ok_or_else(|| {
                    HypercoreError::CatalogInconsistent(format!(
                        "materialized hypertable {} of continuous aggregate {} not found",
                        cagg.mat_hypertable_id, cagg.id,
                    ))
                })?;
                host.rename_view_columns(&cagg)?;
                hypertable = Some(mat);
            }
        }

        // 连续聚合目前不支持压缩，但检查物化 hypertable 的状态无害
        match hypertable {
            Some(ht) if ht.has_compression() => host.rename_column(&ht, stmt),
            _                                => Ok(()),
        }
    }

    // ── 事务边界 ──────────────────────────────────────────────────────────────

    /// 事务提交前：不允许遗留未 finish 的转换
    pub fn end_transaction(&mut self) -> Result<()> {
        self.transitions.ensure_settled()
    }

    pub fn abort_transaction(&mut self) {
        let dropped = self.transitions.abort();
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "discarded access method changes on abort");
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

impl Default for ProcessUtility {
    fn default() -> Self { Self::new(UtilityConfig::default()) }
}
