//! # 附加提取计划
//!
//! 主输出解析完成后，决定还需读取哪些附加文件。
//!
//! ## 依赖关系
//! - 被 `engine/dispatcher.rs` 使用
//! - 使用 `config.rs`, `models/result.rs`

use crate::config::{ParseSettings, ParserVariant};
use crate::models::RunResult;

/// 附加提取计划
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractionPlan {
    pub pdos: bool,
    pub cubes: bool,
}

impl ExtractionPlan {
    /// 按变体选择附加提取器；开启 SCF 检查且 SCF 未收敛时全部跳过
    pub fn decide(variant: ParserVariant, result: &RunResult, settings: &ParseSettings) -> Self {
        if settings.check_scf_convergence && result.scf_converged == Some(false) {
            return ExtractionPlan::default();
        }
        match variant {
            ParserVariant::Standard => ExtractionPlan {
                pdos: true,
                cubes: true,
            },
            ParserVariant::PartialCharges => ExtractionPlan {
                pdos: false,
                cubes: true,
            },
            ParserVariant::Trajectory => ExtractionPlan::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.pdos && !self.cubes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(scf_converged: Option<bool>) -> RunResult {
        RunResult {
            scf_converged,
            ..RunResult::default()
        }
    }

    #[test]
    fn test_variant_extractors() {
        let settings = ParseSettings::default();
        let converged = result(Some(true));

        assert_eq!(
            ExtractionPlan::decide(ParserVariant::Standard, &converged, &settings),
            ExtractionPlan { pdos: true, cubes: true }
        );
        assert_eq!(
            ExtractionPlan::decide(ParserVariant::PartialCharges, &converged, &settings),
            ExtractionPlan { pdos: false, cubes: true }
        );
        assert!(ExtractionPlan::decide(ParserVariant::Trajectory, &converged, &settings).is_empty());
    }

    #[test]
    fn test_scf_check_suppresses_extractors() {
        let check = ParseSettings {
            check_scf_convergence: true,
        };
        let unconverged = result(Some(false));

        assert!(ExtractionPlan::decide(ParserVariant::Standard, &unconverged, &check).is_empty());
        // 检查关闭时不受影响
        assert!(!ExtractionPlan::decide(ParserVariant::Standard, &unconverged, &ParseSettings::default()).is_empty());
        // 未知收敛状态不视为未收敛
        assert!(!ExtractionPlan::decide(ParserVariant::Standard, &result(None), &check).is_empty());
    }
}
