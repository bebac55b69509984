//! # hypercore-utility
//!
//! 混合存储引擎的 DDL 拦截层：表（或其 chunk）既可以是普通行存，也可以是
//! Hypercore 布局（未压缩行段 + 内部压缩段）。本层负责：
//! - **存储方式转换**：行存 ⇄ Hypercore，已压缩 chunk 走快速迁移
//! - **COPY TO 去重**：避免整库导出时压缩数据被导出两次
//!
//! ## 整体架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ProcessUtility                        │
//! │   ddl_command_start ─┐                  ┌─ ddl_command_end   │
//! │                      ▼                  ▼                    │
//! │              ┌──────────────────────────────┐                │
//! │              │   Command::classify (分类器)  │                │
//! │              └──────┬───────────────┬───────┘                │
//! │                     │               │                        │
//! │       TransitionController     ExportRewriter                │
//! │   (NoOp / QuickMigration /   (跳过压缩段 / 恒假查询改写)      │
//! │    begin ─ Ticket ─ finish)                                  │
//! │                     │               │                        │
//! │   process_altertable_cmd / process_rename_cmd                │
//! └─────────────────────┼───────────────┼────────────────────────┘
//!                       ▼               ▼
//!        Catalog · StorageHandler · CompressionSubsystem · ContinuousAggHandler
//!                    （外部协作者，见 catalog 模块）
//!                       ▲
//!        MemoryCatalog + HybridEngine（内存参考宿主）
//! ```

// ── 核心 ─────────────────────────────────────────────────────────────────────
pub mod common;
pub mod config;
pub mod command;
pub mod classify;
pub mod catalog;
pub mod transition;
pub mod export;
pub mod utility;

// ── 参考宿主 ─────────────────────────────────────────────────────────────────
pub mod segment;
pub mod memory;
pub mod engine;

pub use common::{AccessMethod, HypercoreError, Notice, Result};
pub use config::{ExportBehavior, UtilityConfig};
pub use utility::{DdlResult, ProcessUtility};
