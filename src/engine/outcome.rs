//! # 运行结果分类
//!
//! 将诊断标志集合映射为唯一的结果类别，按固定优先级取第一个命中。
//!
//! ## 依赖关系
//! - 被 `engine/dispatcher.rs` 和 `commands/` 使用
//! - 使用 `models/result.rs`

use crate::models::{DiagnosticFlag, RunResult};
use serde::Serialize;
use std::fmt;

/// 运行结果类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    Success,
    OutputIncomplete,
    IncompatibleCodeVersion,
    OutputContainsAbort,
    Interrupted,
    OutOfWalltime,
    GeometryConvergenceNotReached,
    OddNrElectrons,
    NeedAddedMos,
    IllConditionedMatrix,
    BadConditionNumber,
}

impl Outcome {
    /// 宿主使用的数值退出码
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::OutputIncomplete => 303,
            Outcome::IncompatibleCodeVersion => 304,
            Outcome::OutputContainsAbort => 305,
            Outcome::Interrupted => 306,
            Outcome::OutOfWalltime => 400,
            Outcome::GeometryConvergenceNotReached => 401,
            Outcome::OddNrElectrons => 402,
            Outcome::NeedAddedMos => 403,
            Outcome::IllConditionedMatrix => 404,
            Outcome::BadConditionNumber => 405,
        }
    }

    /// 命令行进程的退出状态，保持在 0..=255 内
    ///
    /// 3xx 映射到 3..=6，4xx 映射到 40..=45。
    pub fn process_status(&self) -> i32 {
        match self.exit_code() {
            0 => 0,
            code if code < 400 => code - 300,
            code => code - 360,
        }
    }

    /// 宿主使用的退出状态名
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::OutputIncomplete => "ERROR_OUTPUT_INCOMPLETE",
            Outcome::IncompatibleCodeVersion => "ERROR_INCOMPATIBLE_CODE_VERSION",
            Outcome::OutputContainsAbort => "ERROR_OUTPUT_CONTAINS_ABORT",
            Outcome::Interrupted => "ERROR_INTERRUPTED",
            Outcome::OutOfWalltime => "ERROR_OUT_OF_WALLTIME",
            Outcome::GeometryConvergenceNotReached => "ERROR_GEOMETRY_CONVERGENCE_NOT_REACHED",
            Outcome::OddNrElectrons => "ERROR_ODD_NR_ELECTRONS",
            Outcome::NeedAddedMos => "ERROR_NEED_ADDED_MOS",
            Outcome::IllConditionedMatrix => "ERROR_ILL_CONDITIONED_MATRIX",
            Outcome::BadConditionNumber => "ERROR_BAD_CONDITION_NUMBER",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl From<DiagnosticFlag> for Outcome {
    fn from(flag: DiagnosticFlag) -> Self {
        match flag {
            DiagnosticFlag::GeoNotConverged => Outcome::GeometryConvergenceNotReached,
            DiagnosticFlag::OddNrElectrons => Outcome::OddNrElectrons,
            DiagnosticFlag::NeedAddedMos => Outcome::NeedAddedMos,
            DiagnosticFlag::CholeskyDecomposeFailed => Outcome::IllConditionedMatrix,
            DiagnosticFlag::BadConditionNumber => Outcome::BadConditionNumber,
            DiagnosticFlag::ExceededWalltime => Outcome::OutOfWalltime,
            DiagnosticFlag::Interrupted => Outcome::Interrupted,
            DiagnosticFlag::Aborted => Outcome::OutputContainsAbort,
            DiagnosticFlag::IncompatibleCode => Outcome::IncompatibleCodeVersion,
            DiagnosticFlag::Incomplete => Outcome::OutputIncomplete,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 对运行结果分类，无诊断标志即为成功
pub fn classify(result: &RunResult) -> Outcome {
    result
        .flags
        .highest_priority()
        .map(Outcome::from)
        .unwrap_or(Outcome::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserVariant;
    use crate::parsers::parse_main_log;

    fn result_with(flags: &[DiagnosticFlag]) -> RunResult {
        let mut result = RunResult::new();
        for flag in flags {
            result.flags.insert(*flag);
        }
        result
    }

    #[test]
    fn test_no_flags_is_success() {
        let outcome = classify(&RunResult::new());
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_geometry_beats_walltime() {
        let result = result_with(&[DiagnosticFlag::ExceededWalltime, DiagnosticFlag::GeoNotConverged]);
        assert_eq!(classify(&result), Outcome::GeometryConvergenceNotReached);
        assert_eq!(classify(&result).exit_code(), 401);
    }

    #[test]
    fn test_parsed_log_with_geometry_and_walltime_markers() {
        let content = "\
 CP2K| version string:                                          CP2K version 9.1
 GLOBAL| Run type                                                       GEO_OPT
 *** exceeded requested execution time: 3600.0 s ***
 *** MAXIMUM NUMBER OF OPTIMIZATION STEPS REACHED ***
  **** **** ******  **  PROGRAM ENDED AT                 2023-05-02 12:00:00.000
";
        let result = parse_main_log(content, ParserVariant::Standard).unwrap();
        let outcome = classify(&result);

        assert_eq!(outcome, Outcome::GeometryConvergenceNotReached);
        assert_eq!(outcome.exit_code(), 401);
    }

    #[test]
    fn test_process_status_fits_in_a_byte() {
        let outcomes = [
            Outcome::Success,
            Outcome::OutputIncomplete,
            Outcome::IncompatibleCodeVersion,
            Outcome::OutputContainsAbort,
            Outcome::Interrupted,
            Outcome::OutOfWalltime,
            Outcome::GeometryConvergenceNotReached,
            Outcome::OddNrElectrons,
            Outcome::NeedAddedMos,
            Outcome::IllConditionedMatrix,
            Outcome::BadConditionNumber,
        ];
        let statuses: Vec<i32> = outcomes.iter().map(Outcome::process_status).collect();
        assert_eq!(statuses, vec![0, 3, 4, 5, 6, 40, 41, 42, 43, 44, 45]);
        assert_eq!(Outcome::OutputIncomplete.exit_code(), 303);
    }

    #[test]
    fn test_priority_chain() {
        let mut flags: Vec<DiagnosticFlag> = DiagnosticFlag::ALL.to_vec();
        let expected = [
            Outcome::GeometryConvergenceNotReached,
            Outcome::OddNrElectrons,
            Outcome::NeedAddedMos,
            Outcome::IllConditionedMatrix,
            Outcome::BadConditionNumber,
            Outcome::OutOfWalltime,
            Outcome::Interrupted,
            Outcome::OutputContainsAbort,
            Outcome::IncompatibleCodeVersion,
            Outcome::OutputIncomplete,
        ];
        // 依次移除最高优先级标志，结果应沿链下移
        for outcome in expected {
            assert_eq!(classify(&result_with(&flags)), outcome);
            flags.remove(0);
        }
        assert_eq!(classify(&result_with(&flags)), Outcome::Success);
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes: std::collections::HashSet<i32> = DiagnosticFlag::ALL
            .iter()
            .map(|f| Outcome::from(*f).exit_code())
            .chain(std::iter::once(Outcome::Success.exit_code()))
            .collect();
        assert_eq!(codes.len(), 11);
    }
}
