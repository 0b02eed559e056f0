//! # CP2K 投影态密度 (PDOS) 解析器
//!
//! 识别临时目录中按 kind 和自旋拆分的 `.pdos` 片段，并合并为一个数据集。
//!
//! ## 文件名约定
//! ```text
//! aiida-k1-1.pdos          # kind 1，非自旋极化
//! aiida-ALPHA_k2-1.pdos    # kind 2，alpha 自旋
//! aiida-BETA_k2-1.pdos     # kind 2，beta 自旋
//! ```
//!
//! ## 片段格式
//! ```text
//! # Projected DOS for atomic kind O_1 at iteration step i = 12, E(Fermi) =    -0.175000 a.u.
//! #     MO Eigenvalue [a.u.]      Occupation                 s                py  ...
//!        1         -0.90000000         2.00000000        0.80000000        0.01  ...
//! ```
//!
//! ## 依赖关系
//! - 被 `engine/dispatcher.rs` 和 `commands/scan.rs` 使用
//! - 使用 `parsers/scanner.rs`, `models/spectral.rs`

use crate::error::{IngestError, Result};
use crate::models::{PdosDataset, PdosSeries};
use crate::parsers::scanner;

use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// 按 kind 序号、再按自旋标记分组的片段路径
pub type PdosFiles = BTreeMap<usize, BTreeMap<String, PathBuf>>;

fn file_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.]*-([A-Z]*)_*k(\d+)-\d+\.pdos$").expect("valid pdos file regex")
    })
}

/// 解码后的 PDOS 文件名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdosFileName {
    /// `ALPHA`、`BETA` 或空串
    pub spin: String,
    pub kind_index: usize,
}

impl PdosFileName {
    pub fn decode(file_name: &str) -> Option<Self> {
        let caps = file_name_regex().captures(file_name)?;
        Some(PdosFileName {
            spin: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            kind_index: caps.get(2)?.as_str().parse().ok()?,
        })
    }
}

/// 扫描目录中的 PDOS 片段，不匹配的文件名直接跳过
pub fn discover_pdos_files(dir: &Path) -> Result<PdosFiles> {
    let mut files = PdosFiles::new();
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "Temporary folder not found, skipping PDOS discovery");
        return Ok(files);
    }

    let entries = fs::read_dir(dir).map_err(|e| IngestError::FragmentUnreadable {
        path: dir.display().to_string(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| IngestError::FragmentUnreadable {
            path: dir.display().to_string(),
            source: e,
        })?;
        let name = entry.file_name();
        let Some(decoded) = name.to_str().and_then(PdosFileName::decode) else {
            continue;
        };
        files
            .entry(decoded.kind_index)
            .or_default()
            .insert(decoded.spin, entry.path());
    }
    debug!(kinds = files.len(), "Discovered PDOS fragments");
    Ok(files)
}

/// 读取并合并全部片段，无片段时返回 `None`
pub fn parse_pdos_files(files: &PdosFiles) -> Result<Option<PdosDataset>> {
    let mut parser = PdosParser::new();
    for spins in files.values() {
        // BTreeMap 迭代即按自旋标记排序
        for (spin, path) in spins {
            let content = fs::read_to_string(path).map_err(|e| IngestError::FragmentUnreadable {
                path: path.display().to_string(),
                source: e,
            })?;
            parser.parse_fragment(&content, spin, &path.display().to_string())?;
        }
    }
    Ok(parser.finish())
}

struct EnergyAxis {
    energy: Vec<f64>,
    unit: String,
    e_fermi: f64,
    occupation: Vec<f64>,
}

struct KindSeries {
    kind: String,
    orbitals: Vec<(String, Vec<f64>)>,
}

/// PDOS 片段累加器
#[derive(Default)]
pub struct PdosParser {
    axis: Option<EnergyAxis>,
    kinds: Vec<KindSeries>,
}

impl PdosParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析一个片段并累加其轨道序列
    ///
    /// 能量轴、占据数和费米能取自第一个片段，后续片段只校验行数。
    pub fn parse_fragment(&mut self, content: &str, spin: &str, source: &str) -> Result<()> {
        let fail = |reason: &str| IngestError::FragmentUnparseable {
            format: "pdos".to_string(),
            path: source.to_string(),
            reason: reason.to_string(),
        };

        let mut kind = None;
        let mut e_fermi = None;
        let mut unit = None;
        let mut orbitals: Vec<String> = Vec::new();
        let mut energy = Vec::new();
        let mut occupation = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('#') {
                if trimmed.contains("atomic kind") {
                    kind = scanner::word_after(trimmed, "atomic kind")
                        .map(|k| k.trim_end_matches(',').to_string());
                    e_fermi = scanner::float_after(trimmed, "E(Fermi) =");
                } else if trimmed.contains("Occupation") {
                    unit = bracketed(trimmed).or_else(|| Some("a.u.".to_string()));
                    orbitals = trimmed
                        .split_whitespace()
                        .skip_while(|t| *t != "Occupation")
                        .skip(1)
                        .map(str::to_string)
                        .collect();
                    columns = vec![Vec::new(); orbitals.len()];
                }
                continue;
            }

            let values = scanner::floats(trimmed);
            if values.len() < 3 + orbitals.len() {
                return Err(fail(&format!("Expected {} columns: '{}'", 3 + orbitals.len(), trimmed)));
            }
            energy.push(values[1]);
            occupation.push(values[2]);
            for (column, value) in columns.iter_mut().zip(&values[3..]) {
                column.push(*value);
            }
        }

        let kind = kind.ok_or_else(|| fail("Missing atomic kind header"))?;
        let e_fermi = e_fermi.ok_or_else(|| fail("Missing E(Fermi) in header"))?;
        if orbitals.is_empty() {
            return Err(fail("Missing column header"));
        }
        debug!(kind = %kind, spin, rows = energy.len(), "Parsed PDOS fragment");

        if let Some(axis) = &self.axis {
            // 数值不校验，但行数必须与能量轴一致
            if axis.energy.len() != energy.len() {
                return Err(fail(&format!(
                    "Expected {} rows to match the energy axis, found {}",
                    axis.energy.len(),
                    energy.len()
                )));
            }
        } else {
            self.axis = Some(EnergyAxis {
                energy,
                unit: unit.unwrap_or_else(|| "a.u.".to_string()),
                e_fermi,
                occupation,
            });
        }

        let suffix = spin.to_lowercase();
        let series = orbitals.into_iter().zip(columns).map(|(orbital, values)| {
            let label = if suffix.is_empty() {
                orbital
            } else {
                format!("{}_{}", orbital, suffix)
            };
            (label, values)
        });
        match self.kinds.iter_mut().find(|k| k.kind == kind) {
            Some(existing) => existing.orbitals.extend(series),
            None => self.kinds.push(KindSeries {
                kind,
                orbitals: series.collect(),
            }),
        }
        Ok(())
    }

    /// 按 kind 位点序号排序并生成数据集
    pub fn finish(mut self) -> Option<PdosDataset> {
        let axis = self.axis?;
        self.kinds.sort_by(|a, b| compare_kinds(&a.kind, &b.kind));

        let y_unit = format!("states/{}", axis.unit);
        let series = self
            .kinds
            .into_iter()
            .flat_map(|k| {
                let kind = k.kind;
                let unit = y_unit.clone();
                k.orbitals.into_iter().map(move |(orbital, values)| PdosSeries {
                    label: format!("{}_{}", kind, orbital),
                    unit: unit.clone(),
                    values,
                })
            })
            .collect();

        Some(PdosDataset {
            energy: axis.energy,
            energy_unit: axis.unit,
            e_fermi: axis.e_fermi,
            occupation: axis.occupation,
            series,
        })
    }
}

/// 方括号中的单位，如 `[a.u.]` -> `a.u.`
fn bracketed(line: &str) -> Option<String> {
    let start = line.find('[')?;
    let end = line[start..].find(']')? + start;
    Some(line[start + 1..end].trim().to_string())
}

/// kind 排序：末段为数字者按数值在前，其余按字典序，同序号按名称
fn compare_kinds(a: &str, b: &str) -> Ordering {
    let site = |kind: &str| -> (Option<u64>, String) {
        let last = kind.rsplit('_').next().unwrap_or(kind);
        (last.parse::<u64>().ok(), last.to_string())
    };
    let (na, sa) = site(a);
    let (nb, sb) = site(b);
    match (na, nb) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => sa.cmp(&sb),
    }
    .then_with(|| a.cmp(b))
}
