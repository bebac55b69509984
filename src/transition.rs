//! Access Method 转换控制器
//!
//! 单个 `SET ACCESS METHOD` 子命令在一个事务内的状态机：
//!
//! ```text
//!   当前 == 目标 ─────────────────────────────────────▶ NoOp（留给默认执行）
//!   既非 chunk 也非 hypertable ──────────────────────────▶ FeatureNotSupported
//!   chunk，行存 → Hypercore，数据已压缩 ──────────────────▶ QuickMigration
//!        └─ 改 catalog access method + 设置存储参数 + 从语句中删除该子命令
//!   其余 ─▶ begin（pre-hook，签发 Ticket）─▶ 通用表重写 ─▶ finish（post-hook，回收 Ticket）
//! ```
//!
//! Ticket 以 relid 为键：同一事务内每个关系至多一个，方向在签发时确定。

use std::collections::HashMap;
use tracing::debug;
use crate::catalog::{Catalog, Chunk, StorageHandler};
use crate::command::AlterTableStmt;
use crate::common::{AccessMethod, HypercoreError, RelId, Result};

const ELIGIBILITY_DETAIL: &str = "Hypercore access method is only supported on hypertables and chunks.";

// ── Ticket / Plan ─────────────────────────────────────────────────────────────

/// 一次进行中的 access method 变更
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionTicket {
    pub relid:  RelId,
    pub from:   AccessMethod,
    pub target: AccessMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPlan {
    NoOp,
    QuickMigration(Chunk),
    General { relid: RelId, from: AccessMethod, target: AccessMethod },
}

// ── TransitionController ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TransitionController {
    tickets: HashMap<RelId, TransitionTicket>,
}

impl TransitionController {
    pub fn new() -> Self { Self::default() }

    /// 判定子命令走哪条路径；不修改任何状态
    pub fn plan<H: Catalog>(
        &self,
        host:      &H,
        relid:     RelId,
        relation:  &str,
        requested: AccessMethod,
    ) -> Result<TransitionPlan> {
        let current = host.access_method(relid)?;
        if current == requested {
            return Ok(TransitionPlan::NoOp);
        }

        match host.chunk_by_relid(relid)? {
            Some(chunk) if requested.is_hypercore() && chunk.can_quick_migrate() =>
                Ok(TransitionPlan::QuickMigration(chunk)),
            Some(_) =>
                Ok(TransitionPlan::General { relid, from: current, target: requested }),
            None if host.is_hypertable(relid)? =>
                Ok(TransitionPlan::General { relid, from: current, target: requested }),
            None => Err(HypercoreError::FeatureNotSupported {
                relation: relation.into(),
                detail:   ELIGIBILITY_DETAIL.into(),
            }),
        }
    }

    /// 数据已在压缩段中：只改元数据，跳过整表重写
    pub fn quick_migrate<H: Catalog + StorageHandler>(&mut self, host: &mut H, chunk: &Chunk) -> Result<()> {
        debug!(relid = chunk.relid, "quick migration to hypercore");
        host.set_access_method(chunk.relid, AccessMethod::Hypercore)?;
        host.set_hypercore_reloptions(chunk)
    }

    pub fn begin<H: StorageHandler>(
        &mut self,
        host:   &mut H,
        relid:  RelId,
        from:   AccessMethod,
        target: AccessMethod,
    ) -> Result<()> {
        if self.tickets.contains_key(&relid) {
            return Err(HypercoreError::TransitionInProgress(relid));
        }
        host.alter_access_method_begin(relid, target)?;
        debug!(relid, %from, %target, "access method change started");
        self.tickets.insert(relid, TransitionTicket { relid, from, target });
        Ok(())
    }

    /// 回收 Ticket 并确认 catalog 中的 access method 已是目标值
    pub fn finish<H: Catalog + StorageHandler>(&mut self, host: &mut H, relid: RelId) -> Result<TransitionTicket> {
        let ticket = self.tickets
            .remove(&relid)
            .ok_or(HypercoreError::TransitionNotStarted(relid))?;

        host.alter_access_method_finish(relid, ticket.target)?;

        let actual = host.access_method(relid)?;
        if actual != ticket.target {
            return Err(HypercoreError::AccessMethodMismatch { relid, expected: ticket.target, actual });
        }
        debug!(relid, target = %ticket.target, "access method change finished");
        Ok(ticket)
    }

    // ── 语句级处理 ────────────────────────────────────────────────────────────

    /// pre-hook：逐个处理子命令，返回去掉快速迁移子命令后的语句
    pub fn process_alter_start<H: Catalog + StorageHandler>(
        &mut self,
        host: &mut H,
        stmt: &AlterTableStmt,
    ) -> Result<AlterTableStmt> {
        let relid = host.resolve_relation(&stmt.relation)?;
        let mut kept = Vec::with_capacity(stmt.cmds.len());

        for cmd in &stmt.cmds {
            let Some(requested) = cmd.requested_access_method() else {
                kept.push(cmd.clone());
                continue;
            };

            match self.plan(host, relid, &stmt.relation, requested)? {
                TransitionPlan::NoOp => {
                    debug!(relid, %requested, "access method unchanged");
                    kept.push(cmd.clone());
                }
                TransitionPlan::QuickMigration(chunk) => {
                    self.quick_migrate(host, &chunk)?;
                }
                TransitionPlan::General { relid, from, target } => {
                    self.begin(host, relid, from, target)?;
                    kept.push(cmd.clone());
                }
            }
        }

        Ok(AlterTableStmt { relation: stmt.relation.clone(), cmds: kept })
    }

    /// post-hook：收尾本语句签发的 Ticket
    pub fn process_alter_end<H: Catalog + StorageHandler>(
        &mut self,
        host: &mut H,
        stmt: &AlterTableStmt,
    ) -> Result<()> {
        if !stmt.has_access_method_change() {
            return Ok(());
        }
        let relid = host.resolve_relation(&stmt.relation)?;
        for cmd in &stmt.cmds {
            if cmd.requested_access_method().is_some() && self.tickets.contains_key(&relid) {
                self.finish(host, relid)?;
            }
        }
        Ok(())
    }

    // ── Ticket 查询 / 事务边界 ────────────────────────────────────────────────

    pub fn ticket(&self, relid: RelId) -> Option<&TransitionTicket> {
        self.tickets.get(&relid)
    }

    pub fn pending(&self) -> impl Iterator<Item = &TransitionTicket> {
        self.tickets.values()
    }

    pub fn has_pending(&self) -> bool { !self.tickets.is_empty() }

    /// 事务结束前调用：begin 过的关系必须都已 finish
    pub fn ensure_settled(&self) -> Result<()> {
        if self.tickets.is_empty() {
            return Ok(());
        }
        let mut relids: Vec<RelId> = self.tickets.keys().copied().collect();
        relids.sort_unstable();
        Err(HypercoreError::TransitionUnsettled(relids))
    }

    /// 事务回滚：丢弃全部 Ticket
    pub fn abort(&mut self) -> Vec<TransitionTicket> {
        self.tickets.drain().map(|(_, t)| t).collect()
    }
}
