//! 被拦截命令的语法树（只保留本层关心的部分）

use crate::common::{AccessMethod, Value};

// ── Statement ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    AlterTable(AlterTableStmt),
    Copy(CopyStmt),
    Rename(RenameStmt),
    /// 与本层无关的其他语句，只保留命令标签
    Other(String),
}

impl Statement {
    /// `ALTER TABLE <relation> SET ACCESS METHOD <am>`
    pub fn set_access_method(relation: &str, am: Option<&str>) -> Self {
        Self::AlterTable(AlterTableStmt::new(
            relation,
            vec![AlterTableCmd::SetAccessMethod { name: am.map(str::to_string) }],
        ))
    }

    pub fn copy_to(relation: &str, file: &str) -> Self {
        Self::Copy(CopyStmt::to_file(relation, file))
    }

    pub fn copy_from(relation: &str, file: &str) -> Self {
        Self::Copy(CopyStmt::from_file(relation, file))
    }

    pub fn rename_column(relation: &str, column: &str, new_name: &str) -> Self {
        Self::Rename(RenameStmt {
            object:   RenameObject::Column,
            relation: relation.into(),
            subname:  Some(column.into()),
            newname:  new_name.into(),
        })
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::AlterTable(_) => "ALTER TABLE",
            Self::Copy(_)       => "COPY",
            Self::Rename(_)     => "RENAME",
            Self::Other(tag)    => tag,
        }
    }
}

// ── ALTER TABLE ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableStmt {
    pub relation: String,
    /// 子命令按原始顺序处理
    pub cmds:     Vec<AlterTableCmd>,
}

impl AlterTableStmt {
    pub fn new(relation: &str, cmds: Vec<AlterTableCmd>) -> Self {
        Self { relation: relation.into(), cmds }
    }

    pub fn has_access_method_change(&self) -> bool {
        self.cmds.iter().any(|c| c.requested_access_method().is_some())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterTableCmd {
    SetAccessMethod { name: Option<String> },
    AddColumn(ColumnDef),
    DropColumn { name: String },
    /// 其他子命令（SET (...), OWNER TO, ...），原样交给默认执行
    Other(String),
}

impl AlterTableCmd {
    pub fn requested_access_method(&self) -> Option<AccessMethod> {
        match self {
            Self::SetAccessMethod { name } => Some(AccessMethod::from_name(name.as_deref())),
            _                              => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name:    String,
    pub default: Value,
}

impl ColumnDef {
    pub fn new(name: &str) -> Self {
        Self { name: name.into(), default: Value::Null }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }
}

// ── COPY ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDirection {
    /// COPY ... TO（导出）
    To,
    /// COPY ... FROM（导入）
    From,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    True,
    False,
}

/// `SELECT * FROM <from> WHERE <predicate>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub from:      Option<String>,
    pub predicate: Predicate,
}

impl SelectQuery {
    /// 恒假查询：执行但不产出任何行
    pub fn always_false(from: &str) -> Self {
        Self { from: Some(from.into()), predicate: Predicate::False }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySource {
    Relation(String),
    Query(SelectQuery),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyStmt {
    pub source:    CopySource,
    pub direction: CopyDirection,
    pub attlist:   Vec<String>,
    /// 目标文件名（导出）或来源文件名（导入）
    pub file:      String,
}

impl CopyStmt {
    pub fn to_file(relation: &str, file: &str) -> Self {
        Self {
            source:    CopySource::Relation(relation.into()),
            direction: CopyDirection::To,
            attlist:   vec![],
            file:      file.into(),
        }
    }

    pub fn from_file(relation: &str, file: &str) -> Self {
        Self { direction: CopyDirection::From, ..Self::to_file(relation, file) }
    }

    pub fn relation(&self) -> Option<&str> {
        match &self.source {
            CopySource::Relation(name) => Some(name),
            CopySource::Query(_)       => None,
        }
    }
}

// ── RENAME ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameObject {
    Table,
    Column,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameStmt {
    pub object:   RenameObject,
    pub relation: String,
    /// 被重命名的列名（仅 `RenameObject::Column`）
    pub subname:  Option<String>,
    pub newname:  String,
}
