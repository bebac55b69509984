//! 命令分类器：把被拦截的语句一次性解码成封闭的变体类型，再按钩子阶段路由

use crate::command::{AlterTableStmt, CopyDirection, CopyStmt, Statement};

/// 钩子阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// 命令生效之前
    Pre,
    /// catalog 变更提交之后、事务结束之前
    Post,
}

/// 命令的语义类别（不携带数据，用于日志与断言）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    AlterAccessMethod,
    OtherAlterTable,
    CopyExport,
    CopyImport,
    Unrelated,
}

/// 分类后的命令，借用原语句
#[derive(Debug, Clone, Copy)]
pub enum Command<'a> {
    /// 至少包含一个 `SET ACCESS METHOD` 子命令的 ALTER TABLE
    AlterAccessMethod(&'a AlterTableStmt),
    OtherAlterTable(&'a AlterTableStmt),
    CopyExport(&'a CopyStmt),
    CopyImport(&'a CopyStmt),
    Unrelated,
}

/// 下游处理者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    TransitionController,
    ExportRewriter,
    /// 不做处理，交给默认执行
    Default,
}

impl<'a> Command<'a> {
    pub fn classify(stmt: &'a Statement) -> Self {
        match stmt {
            Statement::AlterTable(alter) if alter.has_access_method_change() =>
                Self::AlterAccessMethod(alter),
            Statement::AlterTable(alter) => Self::OtherAlterTable(alter),
            Statement::Copy(copy) => match copy.direction {
                CopyDirection::To   => Self::CopyExport(copy),
                CopyDirection::From => Self::CopyImport(copy),
            },
            Statement::Rename(_) | Statement::Other(_) => Self::Unrelated,
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Self::AlterAccessMethod(_) => CommandKind::AlterAccessMethod,
            Self::OtherAlterTable(_)   => CommandKind::OtherAlterTable,
            Self::CopyExport(_)        => CommandKind::CopyExport,
            Self::CopyImport(_)        => CommandKind::CopyImport,
            Self::Unrelated            => CommandKind::Unrelated,
        }
    }

    /// 转换控制器两个阶段都参与；导出改写只在命令执行前参与
    pub fn route(&self, phase: HookPhase) -> Route {
        match (self, phase) {
            (Self::AlterAccessMethod(_), _)      => Route::TransitionController,
            (Self::CopyExport(_), HookPhase::Pre) => Route::ExportRewriter,
            (Self::CopyExport(_), HookPhase::Post)
            | (Self::OtherAlterTable(_), _)
            | (Self::CopyImport(_), _)
            | (Self::Unrelated, _)                => Route::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{AlterTableCmd, ColumnDef};

    #[test]
    fn alter_with_access_method_is_transition() {
        let stmt = Statement::AlterTable(AlterTableStmt::new(
            "metrics",
            vec![
                AlterTableCmd::AddColumn(ColumnDef::new("note")),
                AlterTableCmd::SetAccessMethod { name: Some("hypercore".into()) },
            ],
        ));
        let cmd = Command::classify(&stmt);
        assert_eq!(cmd.kind(), CommandKind::AlterAccessMethod);
        assert_eq!(cmd.route(HookPhase::Pre), Route::TransitionController);
        assert_eq!(cmd.route(HookPhase::Post), Route::TransitionController);
    }

    #[test]
    fn plain_alter_goes_to_default() {
        let stmt = Statement::AlterTable(AlterTableStmt::new(
            "metrics",
            vec![AlterTableCmd::DropColumn { name: "note".into() }],
        ));
        let cmd = Command::classify(&stmt);
        assert_eq!(cmd.kind(), CommandKind::OtherAlterTable);
        assert_eq!(cmd.route(HookPhase::Pre), Route::Default);
    }

    #[test]
    fn copy_routes_by_direction_and_phase() {
        let export = Statement::copy_to("metrics", "out.csv");
        let import = Statement::copy_from("metrics", "in.csv");

        let cmd = Command::classify(&export);
        assert_eq!(cmd.kind(), CommandKind::CopyExport);
        assert_eq!(cmd.route(HookPhase::Pre), Route::ExportRewriter);
        assert_eq!(cmd.route(HookPhase::Post), Route::Default);

        let cmd = Command::classify(&import);
        assert_eq!(cmd.kind(), CommandKind::CopyImport);
        assert_eq!(cmd.route(HookPhase::Pre), Route::Default);
    }

    #[test]
    fn other_statements_are_unrelated() {
        for stmt in [
            Statement::Other("VACUUM".into()),
            Statement::rename_column("metrics", "a", "b"),
        ] {
            assert_eq!(Command::classify(&stmt).kind(), CommandKind::Unrelated);
        }
    }
}
