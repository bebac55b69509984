//! 进程级配置：COPY TO 在 Hypercore 关系上的行为

use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::common::{HypercoreError, Result};

/// 读取该环境变量以覆盖 `copy_to_behavior`
pub const COPY_TO_BEHAVIOR_ENV: &str = "HYPERCORE_COPY_TO_BEHAVIOR";

// ── ExportBehavior ────────────────────────────────────────────────────────────

/// COPY TO 遇到物理拆分存储时如何避免数据重复导出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportBehavior {
    /// 扫描阶段过滤：Hypercore 关系只导出未压缩行，压缩数据经内部压缩表以压缩形式导出
    #[default]
    #[serde(alias = "no_compressed_data")]
    SkipCompressedSegment,
    /// 语句阶段过滤：Hypercore 关系导出全部数据，内部压缩表导出为空
    #[serde(alias = "all_data")]
    EmitAllData,
}

impl ExportBehavior {
    pub fn name(self) -> &'static str {
        match self {
            Self::SkipCompressedSegment => "skip_compressed_segment",
            Self::EmitAllData           => "emit_all_data",
        }
    }
}

impl FromStr for ExportBehavior {
    type Err = HypercoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip_compressed_segment" | "no_compressed_data" => Ok(Self::SkipCompressedSegment),
            "emit_all_data" | "all_data"                     => Ok(Self::EmitAllData),
            other => Err(HypercoreError::Config(format!(
                "invalid value for copy_to_behavior: \"{other}\""
            ))),
        }
    }
}

impl std::fmt::Display for ExportBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── UtilityConfig ─────────────────────────────────────────────────────────────

/// 构造 `ProcessUtility` 时传入，命令处理期间只读
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilityConfig {
    pub copy_to_behavior: ExportBehavior,
}

impl UtilityConfig {
    pub fn with_copy_to_behavior(copy_to_behavior: ExportBehavior) -> Self {
        Self { copy_to_behavior }
    }

    /// 从 TOML 文本加载，缺失字段取默认值
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| HypercoreError::Config(e.to_string()))
    }

    /// 从环境变量加载；未设置时使用默认配置
    pub fn from_env() -> Result<Self> {
        match std::env::var(COPY_TO_BEHAVIOR_ENV) {
            Ok(raw)                               => Ok(Self::with_copy_to_behavior(raw.parse()?)),
            Err(std::env::VarError::NotPresent)   => Ok(Self::default()),
            Err(e)                                => Err(HypercoreError::Config(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_skips_compressed_segment() {
        assert_eq!(UtilityConfig::default().copy_to_behavior, ExportBehavior::SkipCompressedSegment);
    }

    #[test]
    fn parses_canonical_and_legacy_names() {
        assert_eq!("emit_all_data".parse::<ExportBehavior>().unwrap(), ExportBehavior::EmitAllData);
        assert_eq!("ALL_DATA".parse::<ExportBehavior>().unwrap(), ExportBehavior::EmitAllData);
        assert_eq!(
            "no_compressed_data".parse::<ExportBehavior>().unwrap(),
            ExportBehavior::SkipCompressedSegment,
        );
        assert!(matches!("sometimes".parse::<ExportBehavior>(), Err(HypercoreError::Config(_))));
    }

    #[test]
    fn loads_from_toml() {
        let cfg = UtilityConfig::from_toml_str("copy_to_behavior = \"all_data\"").unwrap();
        assert_eq!(cfg.copy_to_behavior, ExportBehavior::EmitAllData);

        let empty = UtilityConfig::from_toml_str("").unwrap();
        assert_eq!(empty, UtilityConfig::default());

        assert!(UtilityConfig::from_toml_str("copy_to_behavior = \"bogus\"").is_err());
    }

    // 进程内只有这一个测试读写该环境变量
    #[test]
    fn loads_from_environment() {
        std::env::remove_var(COPY_TO_BEHAVIOR_ENV);
        assert_eq!(UtilityConfig::from_env().unwrap(), UtilityConfig::default());

        std::env::set_var(COPY_TO_BEHAVIOR_ENV, "all_data");
        assert_eq!(UtilityConfig::from_env().unwrap().copy_to_behavior, ExportBehavior::EmitAllData);

        std::env::set_var(COPY_TO_BEHAVIOR_ENV, "bogus");
        assert!(matches!(UtilityConfig::from_env(), Err(HypercoreError::Config(_))));

        std::env::remove_var(COPY_TO_BEHAVIOR_ENV);
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for b in [ExportBehavior::SkipCompressedSegment, ExportBehavior::EmitAllData] {
            assert_eq!(b.to_string().parse::<ExportBehavior>().unwrap(), b);
        }
    }
}
