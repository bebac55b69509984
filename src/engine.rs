//! 顶层执行协调器：一条语句 = 一个事务
//!
//! ```text
//!  execute(stmt)
//!    ├─ 快照 catalog
//!    ├─ ddl_command_start ──▶ Continue / Rewritten(stmt') / Done
//!    ├─ 默认执行（通用表重写 / 加删改列 / COPY）
//!    ├─ ddl_command_end
//!    ├─ end_transaction（所有 Ticket 必须已回收）
//!    └─ 任一步失败 ──▶ 恢复快照 + abort_transaction
//! ```

use std::collections::BTreeMap;
use tracing::{debug, warn};
use crate::catalog::Catalog;
use crate::command::{
    AlterTableCmd, AlterTableStmt, CopyDirection, CopySource, CopyStmt, Predicate, RenameObject,
    RenameStmt, Statement,
};
use crate::common::{AccessMethod, HypercoreError, Notice, RelId, Result, Row};
use crate::config::UtilityConfig;
use crate::memory::{MemoryCatalog, RelationKind};
use crate::segment::CompressedBatch;
use crate::utility::{DdlResult, ProcessUtility};

// ── 结果类型 ──────────────────────────────────────────────────────────────────

/// COPY TO 写出的"文件"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutput {
    pub columns:         Vec<String>,
    pub rows:            Vec<Row>,
    /// 行是否为压缩形式（每行一个 batch）
    pub compressed_form: bool,
}

impl CopyOutput {
    /// 逻辑行数：压缩形式按 batch 内的行数累计，任一行无法解析即报错
    pub fn logical_rows(&self) -> Result<usize> {
        if !self.compressed_form {
            return Ok(self.rows.len());
        }
        self.rows.iter()
            .map(|r| CompressedBatch::from_export_row(r).map(|b| b.row_count()))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementResult {
    Altered,
    /// pre-hook 已完全处理，默认执行被跳过
    Skipped,
    Copied { rows: usize },
    Imported { rows: usize },
    Renamed,
    Noop,
}

#[derive(Debug, Clone)]
pub struct Execution {
    pub result:   StatementResult,
    pub notices:  Vec<Notice>,
    /// 实际交给默认执行的语句（跳过时为 `None`）
    pub executed: Option<Statement>,
}

// ── HybridEngine ──────────────────────────────────────────────────────────────

pub struct HybridEngine {
    catalog: MemoryCatalog,
    utility: ProcessUtility,
    /// COPY 读写的文件，不参与事务回滚
    files:   BTreeMap<String, CopyOutput>,
}

impl HybridEngine {
    pub fn new(config: UtilityConfig) -> Self {
        Self::with_catalog(MemoryCatalog::new(), config)
    }

    pub fn with_catalog(catalog: MemoryCatalog, config: UtilityConfig) -> Self {
        Self { catalog, utility: ProcessUtility::new(config), files: BTreeMap::new() }
    }

    pub fn catalog(&self) -> &MemoryCatalog { &self.catalog }

    pub fn catalog_mut(&mut self) -> &mut MemoryCatalog { &mut self.catalog }

    pub fn utility(&self) -> &ProcessUtility { &self.utility }

    pub fn file(&self, name: &str) -> Option<&CopyOutput> { self.files.get(name) }

    pub fn put_file(&mut self, name: &str, output: CopyOutput) {
        self.files.insert(name.into(), output);
    }

    // ── 事务 ──────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: Statement) -> Result<Execution> {
        let snapshot = self.catalog.clone();

        match self.run(stmt) {
            Ok((result, executed)) => {
                self.catalog.clear_scan_toggles();
                Ok(Execution { result, notices: self.utility.take_notices(), executed })
            }
            Err(e) => {
                warn!(error = %e, "statement aborted, rolling back");
                self.catalog = snapshot;
                self.utility.abort_transaction();
                self.utility.take_notices();
                Err(e)
            }
        }
    }

    fn run(&mut self, stmt: Statement) -> Result<(StatementResult, Option<Statement>)> {
        let stmt = match self.utility.ddl_command_start(&mut self.catalog, &stmt)? {
            DdlResult::Continue            => stmt,
            DdlResult::Rewritten(rewritten) => rewritten,
            DdlResult::Done => {
                self.utility.end_transaction()?;
                return Ok((StatementResult::Skipped, None));
            }
        };

        let result = self.execute_default(&stmt)?;
        self.utility.ddl_command_end(&mut self.catalog, &stmt)?;
        self.utility.end_transaction()?;
        Ok((result, Some(stmt)))
    }

    // ── 默认执行 ──────────────────────────────────────────────────────────────

    fn execute_default(&mut self, stmt: &Statement) -> Result<StatementResult> {
        match stmt {
            Statement::AlterTable(alter) => self.execute_alter(alter),
            Statement::Copy(copy)        => self.execute_copy(copy),
            Statement::Rename(rename)    => self.execute_rename(rename),
            Statement::Other(tag) => {
                debug!(tag = tag.as_str(), "nothing to execute");
                Ok(StatementResult::Noop)
            }
        }
    }

    fn execute_alter(&mut self, stmt: &AlterTableStmt) -> Result<StatementResult> {
        let relid = self.catalog.resolve_relation(&stmt.relation)?;

        for cmd in &stmt.cmds {
            match cmd {
                AlterTableCmd::SetAccessMethod { name } => {
                    let target = AccessMethod::from_name(name.as_deref());
                    if self.catalog.access_method(relid)? != target {
                        self.catalog.rewrite_access_method(relid, target)?;
                    }
                }
                AlterTableCmd::AddColumn(column) => {
                    self.catalog.alter_add_column(relid, column)?;
                    self.sync_compression(relid, cmd)?;
                }
                AlterTableCmd::DropColumn { name } => {
                    self.catalog.alter_drop_column(relid, name)?;
                    self.sync_compression(relid, cmd)?;
                }
                AlterTableCmd::Other(what) => debug!(relid, what = what.as_str(), "subcommand ignored"),
            }
        }
        Ok(StatementResult::Altered)
    }

    fn sync_compression(&mut self, relid: RelId, cmd: &AlterTableCmd) -> Result<()> {
        match self.catalog.hypertable_by_relid(relid)? {
            Some(ht) => self.utility.process_altertable_cmd(&mut self.catalog, &ht, cmd),
            None     => Ok(()),
        }
    }

    fn execute_rename(&mut self, stmt: &RenameStmt) -> Result<StatementResult> {
        let relid = self.catalog.resolve_relation(&stmt.relation)?;
        match stmt.object {
            RenameObject::Table => self.catalog.rename_relation(relid, &stmt.newname)?,
            RenameObject::Column => {
                let old = stmt.subname.as_deref().ok_or_else(|| {
                    HypercoreError::Unsupported("column rename without a column name".into())
                })?;
                self.catalog.alter_rename_column(relid, old, &stmt.newname)?;
                self.utility.process_rename_cmd(&mut self.catalog, relid, stmt)?;
            }
        }
        Ok(StatementResult::Renamed)
    }

    fn execute_copy(&mut self, stmt: &CopyStmt) -> Result<StatementResult> {
        match (stmt.direction, &stmt.source) {
            (CopyDirection::To, CopySource::Relation(name)) => {
                let relid = self.catalog.resolve_relation(name)?;
                let rel   = self.catalog.relation(relid)?;
                let compressed_form = rel.kind == RelationKind::CompressedChunk;
                let (columns, rows) = if compressed_form {
                    (rel.column_names(), self.catalog.scan(relid)?)
                } else {
                    project(&rel.name, &rel.column_names(), self.catalog.scan(relid)?, &stmt.attlist)?
                };
                self.write_file(stmt, CopyOutput { columns, rows, compressed_form })
            }
            (CopyDirection::To, CopySource::Query(query)) => {
                let (columns, rows, compressed_form) = match &query.from {
                    Some(name) => {
                        let relid = self.catalog.resolve_relation(name)?;
                        let rel   = self.catalog.relation(relid)?;
                        let rows  = match query.predicate {
                            Predicate::False => vec![],
                            Predicate::True  => self.catalog.select_all(relid)?,
                        };
                        (rel.column_names(), rows, rel.kind == RelationKind::CompressedChunk)
                    }
                    None => (vec![], vec![], false),
                };
                self.write_file(stmt, CopyOutput { columns, rows, compressed_form })
            }
            (CopyDirection::From, CopySource::Relation(name)) => {
                let relid = self.catalog.resolve_relation(name)?;
                let input = self.files.get(&stmt.file).cloned().ok_or_else(|| {
                    HypercoreError::Unsupported(format!("could not open file \"{}\"", stmt.file))
                })?;
                let rows = if self.catalog.relation(relid)?.kind == RelationKind::CompressedChunk {
                    self.catalog.restore_compressed(relid, &input.rows)?
                } else {
                    let n = input.rows.len();
                    self.catalog.insert(relid, input.rows)?;
                    n
                };
                Ok(StatementResult::Imported { rows })
            }
            (CopyDirection::From, CopySource::Query(_)) =>
                Err(HypercoreError::Unsupported("COPY FROM a query".into())),
        }
    }

    fn write_file(&mut self, stmt: &CopyStmt, output: CopyOutput) -> Result<StatementResult> {
        let rows = output.rows.len();
        self.files.insert(stmt.file.clone(), output);
        Ok(StatementResult::Copied { rows })
    }

    // ── 整库导出 ──────────────────────────────────────────────────────────────

    /// 逐个关系执行 `COPY <rel> TO '<dir>/<rel>.copy'`，包括内部压缩关系
    pub fn dump_database(&mut self, dir: &str) -> Result<Vec<(String, Execution)>> {
        let names: Vec<String> = self.catalog.relations()
            .filter(|r| r.kind != RelationKind::View)
            .map(|r| r.name.clone())
            .collect();

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let file = format!("{dir}/{name}.copy");
            let exec = self.execute(Statement::copy_to(&name, &file))?;
            out.push((file, exec));
        }
        Ok(out)
    }
}

/// 按列清单投影；空清单表示全部列
fn project(
    relation: &str,
    columns:  &[String],
    rows:     Vec<Row>,
    attlist:  &[String],
) -> Result<(Vec<String>, Vec<Row>)> {
    if attlist.is_empty() {
        return Ok((columns.to_vec(), rows));
    }
    let idx = attlist.iter()
        .map(|a| columns.iter().position(|c| c == a).ok_or_else(|| HypercoreError::ColumnNotFound {
            relation: relation.into(),
            column:   a.clone(),
        }))
        .collect::<Result<Vec<usize>>>()?;
    let rows = rows.into_iter()
        .map(|row| idx.iter().map(|&i| row[i].clone()).collect())
        .collect();
    Ok((attlist.to_vec(), rows))
}
