//! # CP2K 主输出文件解析器
//!
//! 解析 CP2K 标准输出，提取能量、收敛信息、结构化子记录和诊断标志。
//!
//! ## 输出格式代际
//! - `Legacy`: 8.1 - 9.x，几何优化步信息为 `Informations at step = N` 块
//! - `Calendar`: 2022.1 起，步信息为 `OPT|` / `MD|` 前缀行
//!
//! 无法识别版本签名时直接失败，不输出部分结果。
//!
//! ## 依赖关系
//! - 被 `engine/dispatcher.rs` 使用
//! - 使用 `parsers/scanner.rs`, `models/result.rs`

use crate::config::ParserVariant;
use crate::error::{IngestError, Result};
use crate::models::{
    DiagnosticFlag, EigenvaluesInfo, KindInfo, KpointData, MotionStep, PartialCharge, RunResult,
};
use crate::parsers::scanner::{self, LineScanner};

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// 最早支持的版本
const MIN_SUPPORTED: Cp2kVersion = Cp2kVersion { major: 8, minor: 1 };

/// 正常结束标志，缺失即视为输出不完整
const END_MARKER: &str = "PROGRAM ENDED AT";

/// 诊断标志及其特征文本（相互独立，可同时命中）
const DIAGNOSTIC_MARKERS: &[(DiagnosticFlag, &str)] = &[
    (
        DiagnosticFlag::GeoNotConverged,
        "MAXIMUM NUMBER OF OPTIMIZATION STEPS REACHED",
    ),
    (
        DiagnosticFlag::OddNrElectrons,
        "Use the LSD option for an odd number of electrons",
    ),
    (
        DiagnosticFlag::NeedAddedMos,
        "Fermi-Dirac smearing includes the first MO",
    ),
    (
        DiagnosticFlag::NeedAddedMos,
        "The number of added MOs is too small",
    ),
    (
        DiagnosticFlag::CholeskyDecomposeFailed,
        "Cholesky decompose failed",
    ),
    (
        DiagnosticFlag::BadConditionNumber,
        "Bad condition number R_COND",
    ),
    (
        DiagnosticFlag::ExceededWalltime,
        "exceeded requested execution time",
    ),
    (
        DiagnosticFlag::Interrupted,
        "terminated by external request",
    ),
    (DiagnosticFlag::Interrupted, "interrupted by signal"),
    (DiagnosticFlag::Interrupted, "EXTERNAL EXIT REQUEST"),
    (DiagnosticFlag::Aborted, "[ABORT]"),
    (DiagnosticFlag::Aborted, "ABORT CP2K"),
    (DiagnosticFlag::IncompatibleCode, "unknown keyword"),
    (DiagnosticFlag::IncompatibleCode, "unknown subsection"),
];

/// CP2K 版本号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cp2kVersion {
    pub major: u32,
    pub minor: u32,
}

impl std::fmt::Display for Cp2kVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// 输出格式代际
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Legacy,
    Calendar,
}

impl Cp2kVersion {
    pub fn format(&self) -> LogFormat {
        if self.major >= 2022 {
            LogFormat::Calendar
        } else {
            LogFormat::Legacy
        }
    }
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"CP2K version (\d+)\.(\d+)").expect("valid version regex"))
}

fn kind_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\d+\.\s+Atomic kind:\s+(\S+)\s+Number of atoms:\s+(\d+)")
            .expect("valid kind regex")
    })
}

fn legacy_kpoint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*Nr\.\s+\d+\s+Spin\s+(\d+)\s+K-Point\s+(\S+)\s+(\S+)\s+(\S+)")
            .expect("valid k-point regex")
    })
}

fn table_kpoint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*#\s+Point\s+\d+\s+Spin\s+(\d+):\s+(\S+)\s+(\S+)\s+(\S+)")
            .expect("valid k-point table regex")
    })
}

/// 从全文中检测第一个版本签名
pub fn detect_version(content: &str) -> Option<Cp2kVersion> {
    let caps = version_regex().captures(content)?;
    Some(Cp2kVersion {
        major: caps[1].parse().ok()?,
        minor: caps[2].parse().ok()?,
    })
}

/// 解析 CP2K 主输出内容
pub fn parse_main_log(content: &str, variant: ParserVariant) -> Result<RunResult> {
    let version = detect_version(content).ok_or_else(|| IngestError::VersionUnsupported {
        found: "no version signature".to_string(),
    })?;
    if version < MIN_SUPPORTED {
        return Err(IngestError::VersionUnsupported {
            found: version.to_string(),
        });
    }
    debug!(%version, format = ?version.format(), "Detected CP2K output format");

    let parser = MainLogParser {
        scanner: LineScanner::new(content),
        format: version.format(),
    };
    let mut result = parser.parse_scalars();
    result.cp2k_version = Some(version.to_string());
    parser.apply_diagnostics(&mut result);

    result.kind_info = parser.parse_kind_info();
    match variant {
        ParserVariant::Standard => {
            result.kpoint_data = parser.parse_kpoints();
            result.eigenvalues_info = parser.parse_eigenvalues();
        }
        ParserVariant::PartialCharges => {
            result.mulliken = parser.parse_mulliken();
            result.hirshfeld = parser.parse_hirshfeld();
        }
        ParserVariant::Trajectory => {
            result.motion_step_info = parser.parse_motion_steps();
        }
    }

    Ok(result)
}

struct MainLogParser<'a> {
    scanner: LineScanner<'a>,
    format: LogFormat,
}

impl<'a> MainLogParser<'a> {
    /// 标量：后出现的值覆盖先出现的值
    fn parse_scalars(&self) -> RunResult {
        let mut result = RunResult::new();

        for line in self.scanner.lines() {
            if line.contains("GLOBAL| Run type") {
                result.run_type = scanner::word_after(line, "Run type").map(str::to_string);
            } else if line.contains("GLOBAL| Project name") {
                result.project_name = scanner::word_after(line, "Project name").map(str::to_string);
            } else if line.contains("ENERGY| Total FORCE_EVAL") {
                if let Some(energy) = scanner::last_float(line) {
                    result.energy = Some(energy);
                    result.energy_units = Some("a.u.".to_string());
                }
            } else if line.contains("SCF run converged in") {
                result.scf_converged = Some(true);
                result.nr_scf_steps = scanner::int_after(line, "converged in");
            } else if line.contains("SCF run NOT converged") {
                result.scf_converged = Some(false);
            } else if line.contains("GEOMETRY OPTIMIZATION COMPLETED") {
                result.geo_converged = Some(true);
            } else if line.contains("MAXIMUM NUMBER OF OPTIMIZATION STEPS REACHED") {
                result.geo_converged = Some(false);
            } else if line.contains("- Atoms:") && result.natoms.is_none() {
                result.natoms = scanner::last_int(line);
            } else if line.contains("- Atomic kinds:") && result.nkinds.is_none() {
                result.nkinds = scanner::last_int(line);
            } else if line.contains("Number of electrons:") && result.nelectrons.is_none() {
                result.nelectrons = scanner::int_after(line, "Number of electrons:");
            } else if line.contains("DFT| Spin unrestricted") {
                result.spin_polarized = Some(true);
            } else if line.contains("DFT| Spin restricted") {
                result.spin_polarized = Some(false);
            } else if line.contains("HOMO - LUMO gap") {
                result.homo_lumo_gap = scanner::last_float(line);
            } else if line.contains("Fermi energy") && !line.trim_start().starts_with("MO|") {
                result.fermi_energy = scanner::last_float(line);
            } else if line.contains("The number of warnings for this run is") {
                result.nwarnings = scanner::last_int(line);
            }
        }

        result
    }

    fn apply_diagnostics(&self, result: &mut RunResult) {
        for (flag, marker) in DIAGNOSTIC_MARKERS {
            if self.scanner.contains(marker) {
                result.flags.insert(*flag);
            }
        }
        if !self.scanner.contains(END_MARKER) {
            result.flags.insert(DiagnosticFlag::Incomplete);
        }
        if !result.flags.is_empty() {
            debug!(
                flags = ?result.flags.iter().map(|f| f.key()).collect::<Vec<_>>(),
                "Diagnostic markers found"
            );
        }
    }

    // ─────────────────────────────────────────────────────────────
    // kind 信息
    // ─────────────────────────────────────────────────────────────

    fn parse_kind_info(&self) -> Option<Vec<KindInfo>> {
        let lines = self.scanner.lines();
        let starts: Vec<(usize, String, usize)> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| {
                let caps = kind_regex().captures(line)?;
                Some((i, caps[1].to_string(), caps[2].parse().ok()?))
            })
            .collect();

        let mut kinds: Vec<KindInfo> = Vec::new();
        for (n, (start, kind, nr_atoms)) in starts.iter().enumerate() {
            // 只读取第一次打印的 kind 信息
            if kinds.iter().any(|k| &k.kind == kind) {
                break;
            }
            let end = starts
                .get(n + 1)
                .map(|(next, _, _)| *next)
                .unwrap_or(lines.len())
                .min(start + 60);

            let mut info = KindInfo {
                kind: kind.clone(),
                element: scanner::element_from_label(kind),
                nr_atoms: *nr_atoms,
                basis_set: None,
                pseudopotential: None,
                valence_electrons: None,
            };
            for line in &lines[start + 1..end] {
                if line.contains("Orbital Basis Set") {
                    info.basis_set = line.split_whitespace().last().map(str::to_string);
                } else if line.contains("Potential information for") {
                    info.pseudopotential = line.split_whitespace().last().map(str::to_string);
                } else if line.contains("Electronic configuration") {
                    if let Some(pos) = line.find("):") {
                        let total: u32 = line[pos + 2..]
                            .split_whitespace()
                            .filter_map(|w| w.parse::<u32>().ok())
                            .sum();
                        info.valence_electrons = Some(total);
                    }
                }
            }
            kinds.push(info);
        }

        if kinds.is_empty() {
            None
        } else {
            debug!(count = kinds.len(), "Parsed atomic kind information");
            Some(kinds)
        }
    }

    // ─────────────────────────────────────────────────────────────
    // 能带
    // ─────────────────────────────────────────────────────────────

    fn parse_kpoints(&self) -> Option<KpointData> {
        let start = self.scanner.find("KPOINTS| Band Structure Calculation", 0)?;
        let lines = self.scanner.lines();

        let mut data = KpointData {
            bands_unit: "eV".to_string(),
            ..KpointData::default()
        };
        let mut special: Vec<([f64; 3], String)> = Vec::new();

        let mut idx = start + 1;
        while idx < lines.len() {
            let line = lines[idx];
            if line.contains("KPOINTS| Special K-Point") || line.contains("KPOINTS| Special point") {
                let values = scanner::floats(line);
                let tokens: Vec<&str> = line.split_whitespace().collect();
                if values.len() >= 3 && !line.contains("not specified") && tokens.len() >= 4 {
                    let n = values.len();
                    let coords = [values[n - 3], values[n - 2], values[n - 1]];
                    special.push((coords, tokens[tokens.len() - 4].to_string()));
                }
                idx += 1;
            } else if let Some(caps) = legacy_kpoint_regex().captures(line) {
                let spin: usize = caps[1].parse().unwrap_or(1);
                let kpoint = parse_coords(&caps);
                let nbands = lines
                    .get(idx + 1)
                    .and_then(|l| l.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let mut energies = Vec::new();
                let mut cursor = idx + 2;
                while energies.len() < nbands && cursor < lines.len() {
                    energies.extend(scanner::floats(lines[cursor]));
                    cursor += 1;
                }
                energies.truncate(nbands);
                push_kpoint(&mut data, &special, spin, kpoint, energies, None);
                idx = cursor;
            } else if let Some(caps) = table_kpoint_regex().captures(line) {
                let spin: usize = caps[1].parse().unwrap_or(1);
                let kpoint = parse_coords(&caps);
                let rows = self.scanner.block(idx, usize::MAX, |l| {
                    let t = l.trim();
                    t.is_empty() || (t.starts_with('#') && t.contains("Point"))
                });
                let mut energies = Vec::new();
                let mut occupations = Vec::new();
                for row in rows {
                    let values = scanner::floats(row);
                    if row.trim_start().starts_with('#') || values.len() < 3 {
                        continue;
                    }
                    energies.push(values[1]);
                    occupations.push(values[2]);
                }
                idx += rows.len() + 1;
                push_kpoint(&mut data, &special, spin, kpoint, energies, Some(occupations));
            } else {
                idx += 1;
            }
        }

        if data.kpoints.is_empty() {
            warn!("Band structure section found but no k-point blocks could be read");
            return None;
        }
        debug!(nkpoints = data.kpoints.len(), "Parsed band structure");
        Some(data)
    }

    // ─────────────────────────────────────────────────────────────
    // 部分电荷
    // ─────────────────────────────────────────────────────────────

    fn parse_mulliken(&self) -> Option<Vec<PartialCharge>> {
        let start = self.scanner.find_last("Mulliken Population Analysis")?;
        let header = self.scanner.find("#  Atom  Element  Kind", start)?;
        let spin = self
            .scanner
            .line(header)
            .map(|l| l.contains("(alpha,beta)"))
            .unwrap_or(false);

        let mut charges = Vec::new();
        for row in self.scanner.block(header, usize::MAX, |l| l.contains("# Total charge")) {
            let Some((element, kind, values)) = split_charge_row(row) else {
                continue;
            };
            let charge = if spin {
                match values.as_slice() {
                    [alpha, beta, charge, moment, ..] => PartialCharge {
                        element,
                        kind,
                        reference_charge: None,
                        population: alpha + beta,
                        spin_populations: Some((*alpha, *beta)),
                        charge: *charge,
                        spin_moment: Some(*moment),
                    },
                    _ => continue,
                }
            } else {
                match values.as_slice() {
                    [population, charge, ..] => PartialCharge {
                        element,
                        kind,
                        reference_charge: None,
                        population: *population,
                        spin_populations: None,
                        charge: *charge,
                        spin_moment: None,
                    },
                    _ => continue,
                }
            };
            charges.push(charge);
        }

        (!charges.is_empty()).then_some(charges)
    }

    fn parse_hirshfeld(&self) -> Option<Vec<PartialCharge>> {
        let start = self.scanner.find_last("Hirshfeld Charges")?;
        let header = self.scanner.find("#Atom", start)?;
        let spin = self
            .scanner
            .line(header)
            .map(|l| l.contains("Spin moment"))
            .unwrap_or(false);

        let mut charges = Vec::new();
        for row in self.scanner.block(header, usize::MAX, |l| l.contains("Total Charge")) {
            let Some((element, kind, values)) = split_charge_row(row) else {
                continue;
            };
            let charge = if spin {
                match values.as_slice() {
                    [reference, alpha, beta, moment, charge, ..] => PartialCharge {
                        element,
                        kind,
                        reference_charge: Some(*reference),
                        population: alpha + beta,
                        spin_populations: Some((*alpha, *beta)),
                        charge: *charge,
                        spin_moment: Some(*moment),
                    },
                    _ => continue,
                }
            } else {
                match values.as_slice() {
                    [reference, population, charge, ..] => PartialCharge {
                        element,
                        kind,
                        reference_charge: Some(*reference),
                        population: *population,
                        spin_populations: None,
                        charge: *charge,
                        spin_moment: None,
                    },
                    _ => continue,
                }
            };
            charges.push(charge);
        }

        (!charges.is_empty()).then_some(charges)
    }

    // ─────────────────────────────────────────────────────────────
    // 本征值
    // ─────────────────────────────────────────────────────────────

    fn parse_eigenvalues(&self) -> Option<EigenvaluesInfo> {
        let info = match self.format {
            LogFormat::Calendar => self
                .parse_mo_table()
                .or_else(|| self.parse_subspace_eigenvalues()),
            LogFormat::Legacy => self
                .parse_subspace_eigenvalues()
                .or_else(|| self.parse_mo_table()),
        }?;
        debug!(nspins = info.eigenvalues.len(), unit = %info.unit, "Parsed eigenvalues");
        Some(info)
    }

    /// `MO| EIGENVALUES AND OCCUPATION NUMBERS` 表格，取最后一次打印
    fn parse_mo_table(&self) -> Option<EigenvaluesInfo> {
        let headers: Vec<usize> = self
            .scanner
            .find_all("EIGENVALUES AND OCCUPATION NUMBERS")
            .collect();
        let last = *headers.last()?;
        let is_beta = self.scanner.line(last).map(|l| l.contains("BETA")).unwrap_or(false);
        let selected: Vec<usize> = if is_beta && headers.len() >= 2 {
            vec![headers[headers.len() - 2], last]
        } else {
            vec![last]
        };

        let mut info = EigenvaluesInfo {
            unit: "eV".to_string(),
            ..EigenvaluesInfo::default()
        };
        for header in selected {
            let rows = self.scanner.block(header, usize::MAX, |l| {
                !l.trim_start().starts_with("MO|") || l.contains("EIGENVALUES AND OCCUPATION")
            });
            let mut eigenvalues = Vec::new();
            let mut occupations = Vec::new();
            for row in rows {
                let body = row.trim_start().trim_start_matches("MO|");
                if body.contains("Fermi energy [eV]") {
                    info.fermi_energy = scanner::last_float(body);
                    continue;
                }
                let tokens: Vec<&str> = body.split_whitespace().collect();
                if tokens.len() != 4 || tokens[0].parse::<usize>().is_err() {
                    continue;
                }
                if let (Some(ev), Some(occ)) =
                    (scanner::parse_float(tokens[2]), scanner::parse_float(tokens[3]))
                {
                    eigenvalues.push(ev);
                    occupations.push(occ);
                }
            }
            info.eigenvalues.push(eigenvalues);
            info.occupations.push(occupations);
        }

        let (homo, lumo) = band_edges(&info.eigenvalues, &info.occupations);
        info.homo = homo;
        info.lumo = lumo;
        (!info.eigenvalues.iter().all(Vec::is_empty)).then_some(info)
    }

    /// 旧格式：`Eigenvalues of the occupied subspace spin N`
    fn parse_subspace_eigenvalues(&self) -> Option<EigenvaluesInfo> {
        let mut occupied: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        let mut unoccupied: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        let mut fermi_energy = None;

        for (i, line) in self.scanner.lines().iter().enumerate() {
            let target = if line.contains("Eigenvalues of the occupied subspace spin") {
                &mut occupied
            } else if line.contains("Eigenvalues of the unoccupied subspace spin") {
                &mut unoccupied
            } else {
                if line.contains("Fermi Energy [eV]") {
                    fermi_energy = scanner::last_float(line);
                }
                continue;
            };
            let spin = scanner::last_int(line).unwrap_or(1);
            let values: Vec<f64> = self
                .scanner
                .block(i, usize::MAX, |l| {
                    let t = l.trim();
                    !t.is_empty()
                        && !t.starts_with("---")
                        && scanner::floats(t).len() != t.split_whitespace().count()
                })
                .iter()
                .filter(|l| !l.trim().starts_with("---"))
                .flat_map(|l| scanner::floats(l))
                .collect();
            target.insert(spin, values);
        }

        if occupied.is_empty() {
            return None;
        }

        let homo = occupied
            .values()
            .flat_map(|v| v.iter().copied())
            .fold(None, |acc: Option<f64>, e| Some(acc.map_or(e, |a| a.max(e))));
        let lumo = unoccupied
            .values()
            .flat_map(|v| v.iter().copied())
            .fold(None, |acc: Option<f64>, e| Some(acc.map_or(e, |a| a.min(e))));
        let eigenvalues = occupied
            .iter()
            .map(|(spin, occ)| {
                let mut all = occ.clone();
                if let Some(unocc) = unoccupied.get(spin) {
                    all.extend_from_slice(unocc);
                }
                all
            })
            .collect();

        Some(EigenvaluesInfo {
            unit: "a.u.".to_string(),
            eigenvalues,
            occupations: Vec::new(),
            fermi_energy,
            homo,
            lumo,
        })
    }

    // ─────────────────────────────────────────────────────────────
    // 运动步
    // ─────────────────────────────────────────────────────────────

    fn parse_motion_steps(&self) -> Option<Vec<MotionStep>> {
        let steps = match self.format {
            LogFormat::Calendar => {
                let steps = self.parse_prefixed_steps();
                if steps.is_empty() {
                    self.parse_legacy_steps()
                } else {
                    steps
                }
            }
            LogFormat::Legacy => self.parse_legacy_steps(),
        };
        if steps.is_empty() {
            None
        } else {
            debug!(nsteps = steps.len(), "Parsed motion steps");
            Some(steps)
        }
    }

    /// `OPT| Step number  N` / `MD| Step number  N` 前缀行
    fn parse_prefixed_steps(&self) -> Vec<MotionStep> {
        let mut steps = Vec::new();
        let mut current: Option<MotionStep> = None;

        for line in self.scanner.lines() {
            let trimmed = line.trim_start();
            let Some(body) = trimmed
                .strip_prefix("OPT|")
                .or_else(|| trimmed.strip_prefix("MD|"))
            else {
                continue;
            };
            let Some((key, value)) = split_key_value(body) else {
                continue;
            };
            if key.eq_ignore_ascii_case("step number") {
                if let Some(step) = current.take() {
                    steps.push(step);
                }
                current = value.parse().ok().map(|step| MotionStep {
                    step,
                    ..MotionStep::default()
                });
            } else if let Some(step) = current.as_mut() {
                apply_motion_field(step, &key, value);
            }
        }
        steps.extend(current);
        steps
    }

    /// `Informations at step = N` 块与旧版 MD 的 `STEP NUMBER = N` 块
    fn parse_legacy_steps(&self) -> Vec<MotionStep> {
        let mut steps = Vec::new();
        let mut current: Option<MotionStep> = None;

        for line in self.scanner.lines() {
            let trimmed = line.trim();
            let starts_block = line.contains("Informations at step =")
                || (trimmed.starts_with("STEP NUMBER") && trimmed.contains('='));
            if starts_block {
                if let Some(step) = current.take() {
                    steps.push(step);
                }
                current = scanner::int_after(line, "=").map(|step| MotionStep {
                    step,
                    ..MotionStep::default()
                });
                continue;
            }
            let is_rule = !trimmed.is_empty() && trimmed.chars().all(|c| c == '-' || c == '*');
            if is_rule {
                if let Some(step) = current.take() {
                    steps.push(step);
                }
                continue;
            }
            if let (Some(step), Some(pos)) = (current.as_mut(), line.find('=')) {
                let key = scanner::strip_unit(&line[..pos]);
                if let Some(value) = line[pos + 1..].split_whitespace().next() {
                    apply_motion_field(step, &key, value);
                }
            }
        }
        steps.extend(current);
        steps
    }
}

fn parse_coords(caps: &regex::Captures<'_>) -> [f64; 3] {
    [
        scanner::parse_float(&caps[2]).unwrap_or(0.0),
        scanner::parse_float(&caps[3]).unwrap_or(0.0),
        scanner::parse_float(&caps[4]).unwrap_or(0.0),
    ]
}

fn push_kpoint(
    data: &mut KpointData,
    special: &[([f64; 3], String)],
    spin: usize,
    kpoint: [f64; 3],
    energies: Vec<f64>,
    occupations: Option<Vec<f64>>,
) {
    let spin_idx = spin.saturating_sub(1).min(1);
    while data.bands.len() <= spin_idx {
        data.bands.push(Vec::new());
    }
    if spin_idx == 0 {
        let same = |a: &[f64; 3]| a.iter().zip(kpoint.iter()).all(|(x, y)| (x - y).abs() < 1e-6);
        if let Some((_, label)) = special.iter().find(|(coords, _)| same(coords)) {
            data.labels.push((data.kpoints.len(), label.clone()));
        }
        data.kpoints.push(kpoint);
    }
    data.bands[spin_idx].push(energies);
    if let Some(occ) = occupations {
        while data.occupations.len() <= spin_idx {
            data.occupations.push(Vec::new());
        }
        data.occupations[spin_idx].push(occ);
    }
}

/// 电荷表行: `序号 元素 kind 数值...`
fn split_charge_row(row: &str) -> Option<(String, usize, Vec<f64>)> {
    let tokens: Vec<&str> = row.split_whitespace().collect();
    if tokens.len() < 5 || tokens[0].parse::<usize>().is_err() {
        return None;
    }
    let kind = tokens[2].parse::<usize>().ok()?;
    let values = tokens[3..].iter().filter_map(|t| scanner::parse_float(t)).collect();
    Some((tokens[1].to_string(), kind, values))
}

/// 按占据数确定 HOMO / LUMO
fn band_edges(eigenvalues: &[Vec<f64>], occupations: &[Vec<f64>]) -> (Option<f64>, Option<f64>) {
    let mut homo: Option<f64> = None;
    let mut lumo: Option<f64> = None;
    for (evs, occs) in eigenvalues.iter().zip(occupations) {
        for (e, occ) in evs.iter().zip(occs) {
            if *occ > 1e-8 {
                homo = Some(homo.map_or(*e, |h| h.max(*e)));
            } else {
                lumo = Some(lumo.map_or(*e, |l| l.min(*e)));
            }
        }
    }
    (homo, lumo)
}

/// `键 [单位]   数值 ...`：键为首个数值/YES/NO 之前的词
fn split_key_value(body: &str) -> Option<(String, &str)> {
    let tokens: Vec<&str> = body.split_whitespace().collect();
    let pos = tokens.iter().position(|t| {
        scanner::parse_float(t).is_some() || *t == "YES" || *t == "NO"
    })?;
    let key = scanner::strip_unit(&tokens[..pos].join(" "));
    Some((key, tokens[pos]))
}

fn apply_motion_field(step: &mut MotionStep, key: &str, value: &str) {
    let key = key.trim().to_lowercase();
    if key.starts_with("convergence in") || key.starts_with("conv. in") || key.ends_with("is converged") {
        let ok = value.eq_ignore_ascii_case("YES");
        step.converged = Some(step.converged.unwrap_or(true) && ok);
        return;
    }
    let Some(number) = scanner::parse_float(value) else {
        return;
    };
    match key.as_str() {
        "total energy" | "potential energy" => step.energy = Some(number),
        "real energy change" | "effective energy change" => step.energy_change = Some(number),
        "max. step size" | "maximum step size" => step.max_step = Some(number),
        "rms step size" => step.rms_step = Some(number),
        "max. gradient" | "maximum gradient" => step.max_gradient = Some(number),
        "rms gradient" => step.rms_gradient = Some(number),
        "internal pressure" | "pressure" => step.pressure = Some(number),
        "temperature" => step.temperature = Some(number),
        "used time" => step.used_time = Some(number),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_2023: &str = "\
 DBCSR| Multiplication driver                                               BLAS
 CP2K| version string:                                          CP2K version 2023.1
 CP2K| source code revision number:                                  git:e8f0b1d
 GLOBAL| Project name                                                      aiida
 GLOBAL| Run type                                                         ENERGY
";

    const FOOTER: &str = "\
 The number of warnings for this run is : 1
 -------------------------------------------------------------------------------
  **** **** ******  **  PROGRAM ENDED AT                 2023-05-02 12:00:00.000
";

    fn log(body: &str) -> String {
        format!("{}{}{}", HEADER_2023, body, FOOTER)
    }

    #[test]
    fn test_version_detection() {
        assert_eq!(
            detect_version(" CP2K| version string:   CP2K version 9.1"),
            Some(Cp2kVersion { major: 9, minor: 1 })
        );
        assert_eq!(detect_version(HEADER_2023).unwrap().format(), LogFormat::Calendar);
        assert_eq!(
            Cp2kVersion { major: 8, minor: 2 }.format(),
            LogFormat::Legacy
        );
    }

    #[test]
    fn test_unknown_version_fails_fast() {
        let result = parse_main_log(" some unrelated program output\n", ParserVariant::Standard);
        assert!(matches!(result, Err(IngestError::VersionUnsupported { .. })));

        let old = parse_main_log(" CP2K| version string:  CP2K version 7.1\n", ParserVariant::Standard);
        match old {
            Err(IngestError::VersionUnsupported { found }) => assert_eq!(found, "7.1"),
            other => panic!("unexpected: {:?}", other),
        }

        let empty = parse_main_log("", ParserVariant::Standard);
        assert!(matches!(empty, Err(IngestError::VersionUnsupported { .. })));
    }

    #[test]
    fn test_scalars_from_successful_run() {
        let content = log(
            "\
                             - Atoms:                                          3
                             - Atomic kinds:                                   2
 DFT| Spin restricted Kohn-Sham (RKS) calculation                            RKS
 Number of electrons:                                                          8
  *** SCF run converged in    12 steps ***
 ENERGY| Total FORCE_EVAL ( QS ) energy [a.u.]:              -17.146893089646
 HOMO - LUMO gap [eV] :    6.5123
",
        );
        let result = parse_main_log(&content, ParserVariant::Standard).unwrap();

        assert_eq!(result.cp2k_version.as_deref(), Some("2023.1"));
        assert_eq!(result.run_type.as_deref(), Some("ENERGY"));
        assert_eq!(result.project_name.as_deref(), Some("aiida"));
        assert!((result.energy.unwrap() + 17.146893089646).abs() < 1e-12);
        assert_eq!(result.energy_units.as_deref(), Some("a.u."));
        assert_eq!(result.scf_converged, Some(true));
        assert_eq!(result.nr_scf_steps, Some(12));
        assert_eq!(result.natoms, Some(3));
        assert_eq!(result.nkinds, Some(2));
        assert_eq!(result.nelectrons, Some(8));
        assert_eq!(result.spin_polarized, Some(false));
        assert!((result.homo_lumo_gap.unwrap() - 6.5123).abs() < 1e-9);
        assert_eq!(result.nwarnings, Some(1));
        assert!(result.flags.is_empty());
        assert!(!result.exceeded_walltime());
    }

    #[test]
    fn test_scf_not_converged_is_not_a_sentinel() {
        let content = log("  *** SCF run NOT converged ***\n");
        let result = parse_main_log(&content, ParserVariant::Standard).unwrap();
        assert_eq!(result.scf_converged, Some(false));
        assert!(!result.flags.contains(DiagnosticFlag::GeoNotConverged));
        assert!(result.flags.is_empty());
    }

    #[test]
    fn test_multiple_diagnostics_in_one_pass() {
        let content = format!(
            "{}{}",
            HEADER_2023,
            "\
 *** MAXIMUM NUMBER OF OPTIMIZATION STEPS REACHED ***
 *** exceeded requested execution time: 3600.0 s ***
 Cholesky decompose failed: the matrix is not positive definite or ill-conditioned.
"
        );
        let result = parse_main_log(&content, ParserVariant::Standard).unwrap();

        assert!(result.flags.contains(DiagnosticFlag::GeoNotConverged));
        assert!(result.flags.contains(DiagnosticFlag::ExceededWalltime));
        assert!(result.flags.contains(DiagnosticFlag::CholeskyDecomposeFailed));
        assert!(result.flags.contains(DiagnosticFlag::Incomplete));
        assert_eq!(result.geo_converged, Some(false));
        assert!(result.exceeded_walltime());
    }

    #[test]
    fn test_kind_info() {
        let content = log(
            "\
 ATOMIC KIND INFORMATION

  1. Atomic kind: O                                     Number of atoms:       1

     Orbital Basis Set                                             DZVP-MOLOPT-SR-GTH
     GTH Potential information for                                         GTH-PBE-q6
       Electronic configuration (s p d ...):                               2    4

  2. Atomic kind: H_1                                   Number of atoms:       2

     Orbital Basis Set                                             DZVP-MOLOPT-SR-GTH
     GTH Potential information for                                         GTH-PBE-q1
       Electronic configuration (s p d ...):                                    1
",
        );
        let result = parse_main_log(&content, ParserVariant::Trajectory).unwrap();
        let kinds = result.kind_info.unwrap();

        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[0].kind, "O");
        assert_eq!(kinds[0].valence_electrons, Some(6));
        assert_eq!(kinds[0].basis_set.as_deref(), Some("DZVP-MOLOPT-SR-GTH"));
        assert_eq!(kinds[1].kind, "H_1");
        assert_eq!(kinds[1].element, "H");
        assert_eq!(kinds[1].nr_atoms, 2);
        assert_eq!(kinds[1].pseudopotential.as_deref(), Some("GTH-PBE-q1"));
    }

    #[test]
    fn test_legacy_band_structure() {
        let content = log(
            "\
 KPOINTS| Band Structure Calculation
 KPOINTS| Number of k-points in set                                            2
 KPOINTS| Special K-Point     1  GAMMA       0.0000000000    0.0000000000    0.0000000000
 KPOINTS| Special K-Point     2  not specified      0.5000000000    0.0000000000    0.5000000000
  Nr.    1    Spin 1        K-Point  0.00000000  0.00000000  0.00000000
            5
     -5.71430910     6.26409468     6.26409468     6.26409468
      8.67345123
  Nr.    2    Spin 1        K-Point  0.50000000  0.00000000  0.50000000
            5
     -3.33333333    -0.20000000     4.80000000     4.80000000
      9.10000000
",
        );
        let result = parse_main_log(&content, ParserVariant::Standard).unwrap();
        let bands = result.kpoint_data.unwrap();

        assert_eq!(bands.kpoints.len(), 2);
        assert_eq!(bands.labels, vec![(0, "GAMMA".to_string())]);
        assert_eq!(bands.bands.len(), 1);
        assert_eq!(bands.bands[0][0].len(), 5);
        assert!((bands.bands[0][1][4] - 9.1).abs() < 1e-9);
        assert_eq!(bands.bands_unit, "eV");
        assert!(bands.occupations.is_empty());
    }

    #[test]
    fn test_corrupt_band_count_reads_remaining_lines() {
        let content = log(
            "\
 KPOINTS| Band Structure Calculation
  Nr.    1    Spin 1        K-Point  0.00000000  0.00000000  0.00000000
   18446744073709551615
     -5.71430910     6.26409468
",
        );
        let result = parse_main_log(&content, ParserVariant::Standard).unwrap();
        let bands = result.kpoint_data.unwrap();

        assert_eq!(bands.kpoints.len(), 1);
        assert!(bands.bands[0][0].len() < 10);
        assert!((bands.bands[0][0][0] + 5.7143091).abs() < 1e-9);
    }

    #[test]
    fn test_tabulated_band_structure_with_spin() {
        let content = log(
            "\
 KPOINTS| Band Structure Calculation
 KPOINTS| Special K-Point     1  GAMMA       0.0000000000    0.0000000000    0.0000000000
 #  Point 1   Spin 1:    0.00000000   0.00000000   0.00000000
 #   Band    Energy [eV]     Occupation
        1     -5.71430910     1.00000000
        2      6.26409468     0.00000000
 #  Point 1   Spin 2:    0.00000000   0.00000000   0.00000000
 #   Band    Energy [eV]     Occupation
        1     -5.60000000     1.00000000
        2      6.30000000     0.00000000

",
        );
        let result = parse_main_log(&content, ParserVariant::Standard).unwrap();
        let bands = result.kpoint_data.unwrap();

        assert_eq!(bands.kpoints.len(), 1);
        assert_eq!(bands.bands.len(), 2);
        assert_eq!(bands.bands[1][0], vec![-5.6, 6.3]);
        assert_eq!(bands.occupations[0][0], vec![1.0, 0.0]);
        assert_eq!(bands.labels, vec![(0, "GAMMA".to_string())]);
    }

    #[test]
    fn test_mulliken_and_hirshfeld() {
        let content = log(
            "\
                     Mulliken Population Analysis

 #  Atom  Element  Kind  Atomic population                           Net charge
       1     O        1          6.313616                           -0.313616
       2     H        2          0.843192                            0.156808
       3     H        2          0.843192                            0.156808
 # Total charge                              8.000000                0.000000

                           Hirshfeld Charges

  #Atom  Element  Kind  Ref Charge     Population                     Net charge
      1       O      1       6.000          6.261                       -0.261
      2       H      2       1.000          0.870                        0.130
      3       H      2       1.000          0.870                        0.130

  Total Charge                                                           0.000
",
        );
        let result = parse_main_log(&content, ParserVariant::PartialCharges).unwrap();

        let mulliken = result.mulliken.unwrap();
        assert_eq!(mulliken.len(), 3);
        assert_eq!(mulliken[0].element, "O");
        assert!((mulliken[0].charge + 0.313616).abs() < 1e-9);
        assert!(mulliken[0].spin_moment.is_none());

        let hirshfeld = result.hirshfeld.unwrap();
        assert_eq!(hirshfeld.len(), 3);
        assert_eq!(hirshfeld[1].kind, 2);
        assert_eq!(hirshfeld[1].reference_charge, Some(1.0));
        assert!((hirshfeld[1].charge - 0.13).abs() < 1e-9);

        assert!(result.kpoint_data.is_none());
    }

    #[test]
    fn test_spin_polarized_mulliken() {
        let content = log(
            "\
                     Mulliken Population Analysis

 #  Atom  Element  Kind  Atomic population (alpha,beta) Net charge  Spin moment
       1     O        1          3.5          2.5         0.0         1.0
 # Total charge and spin         3.5          2.5         0.0         1.0
",
        );
        let result = parse_main_log(&content, ParserVariant::PartialCharges).unwrap();
        let mulliken = result.mulliken.unwrap();

        assert_eq!(mulliken.len(), 1);
        assert_eq!(mulliken[0].spin_populations, Some((3.5, 2.5)));
        assert_eq!(mulliken[0].spin_moment, Some(1.0));
        assert!((mulliken[0].population - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_mo_eigenvalue_table() {
        let content = log(
            "\
 MO| EIGENVALUES AND OCCUPATION NUMBERS
 MO|
 MO| # MO index          Eigenvalue [a.u.]        Eigenvalue [eV]     Occupation
 MO|
 MO|            1            -0.93286735          -25.38454291       2.00000000
 MO|            2            -0.25132779           -6.83901893       2.00000000
 MO|            3             0.02000000            0.54422770       0.00000000
 MO| Sum:                                                              4.00000000
 MO|
 MO| Fermi energy [a.u.]:                 -0.25132779
 MO| Fermi energy [eV]:                   -6.83901893
",
        );
        let result = parse_main_log(&content, ParserVariant::Standard).unwrap();
        let info = result.eigenvalues_info.unwrap();

        assert_eq!(info.unit, "eV");
        assert_eq!(info.eigenvalues.len(), 1);
        assert_eq!(info.eigenvalues[0].len(), 3);
        assert_eq!(info.occupations[0], vec![2.0, 2.0, 0.0]);
        assert!((info.fermi_energy.unwrap() + 6.83901893).abs() < 1e-9);
        assert!((info.homo.unwrap() + 6.83901893).abs() < 1e-9);
        assert!((info.lumo.unwrap() - 0.5442277).abs() < 1e-9);
        // MO| 行中的费米能不进入标量
        assert!(result.fermi_energy.is_none());
    }

    #[test]
    fn test_legacy_subspace_eigenvalues() {
        let content = format!(
            " CP2K| version string:   CP2K version 9.1\n{}{}",
            "\
 Eigenvalues of the occupied subspace spin            1
 ---------------------------------------------
      -0.93286735      -0.47964541      -0.32393046      -0.25132779
 Fermi Energy [eV] :   -6.839019

 Lowest Eigenvalues of the unoccupied subspace spin            1
 ---------------------------------------------
       0.02000000       0.10000000

",
            FOOTER
        );
        let result = parse_main_log(&content, ParserVariant::Standard).unwrap();
        let info = result.eigenvalues_info.unwrap();

        assert_eq!(info.unit, "a.u.");
        assert_eq!(info.eigenvalues[0].len(), 6);
        assert!((info.homo.unwrap() + 0.25132779).abs() < 1e-9);
        assert!((info.lumo.unwrap() - 0.02).abs() < 1e-9);
        assert!((info.fermi_energy.unwrap() + 6.839019).abs() < 1e-9);
    }

    #[test]
    fn test_calendar_motion_steps() {
        let content = log(
            "\
 OPT| Step number                                                              1
 OPT| Optimization method                                                   BFGS
 OPT| Total energy [hartree]                                      -17.1539843591
 OPT| Effective energy change [hartree]                            -0.0075953264
 OPT| Maximum step size                                             0.0322138478
 OPT| Convergence limit for maximum step size                       0.0030000000
 OPT| Maximum step size is converged                                          NO
 OPT| Maximum gradient                                              0.0060183530
 OPT| Maximum gradient is converged                                          YES
 OPT| Used time [s]                                                        1.234
 OPT| Step number                                                              2
 OPT| Total energy [hartree]                                      -17.1560000000
 OPT| Maximum step size is converged                                         YES
 OPT| Maximum gradient is converged                                          YES
",
        );
        let result = parse_main_log(&content, ParserVariant::Trajectory).unwrap();
        let steps = result.motion_step_info.unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step, 1);
        assert!((steps[0].energy.unwrap() + 17.1539843591).abs() < 1e-12);
        assert!((steps[0].max_step.unwrap() - 0.0322138478).abs() < 1e-12);
        assert!((steps[0].used_time.unwrap() - 1.234).abs() < 1e-12);
        assert_eq!(steps[0].converged, Some(false));
        assert_eq!(steps[1].converged, Some(true));
    }

    #[test]
    fn test_legacy_motion_steps() {
        let content = format!(
            " CP2K| version string:   CP2K version 8.2\n{}{}",
            "\
 --------  Informations at step =     1 ------------
  Optimization Method        =                 BFGS
  Total Energy               =       -17.1539843591
  Real energy change         =        -0.0075953264
  Conv. limit for step size  =         0.0030000000
  Max. step size             =         0.0322138478
  Convergence in step size   =                   NO
  Max. gradient              =         0.0060183530
  Conv. in gradients         =                  YES
  Used time                  =               12.345
 ---------------------------------------------------
",
            FOOTER
        );
        let result = parse_main_log(&content, ParserVariant::Trajectory).unwrap();
        let steps = result.motion_step_info.unwrap();

        assert_eq!(steps.len(), 1);
        assert!((steps[0].energy_change.unwrap() + 0.0075953264).abs() < 1e-12);
        assert!((steps[0].max_step.unwrap() - 0.0322138478).abs() < 1e-12);
        assert!((steps[0].max_gradient.unwrap() - 0.006018353).abs() < 1e-12);
        assert_eq!(steps[0].converged, Some(false));
    }
}
