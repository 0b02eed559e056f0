//! # Gaussian cube 体数据识别与解析
//!
//! 从文件名解码体数据标签，并读取 cube 网格。
//!
//! ## 文件名约定
//! ```text
//! aiida-ELECTRON_DENSITY-1_0.cube   -> electron_density
//! aiida-WFN_00005_1-1_0.cube        -> wfn_5_1
//! run-O_1_alpha-3_2.cube            -> o_1_alpha
//! ```
//!
//! ## Cube 格式说明
//! ```text
//! comment 1
//! comment 2
//! natoms  ox oy oz        # natoms < 0 时原子块后多一行
//! nx  v1x v1y v1z         # 格点数为负表示单位为埃
//! ny  v2x v2y v2z
//! nz  v3x v3y v3z
//! Z  charge  x y z        # 共 |natoms| 行
//! values ...
//! ```
//!
//! ## 依赖关系
//! - 被 `engine/dispatcher.rs` 和 `commands/scan.rs` 使用
//! - 使用 `parsers/scanner.rs`, `models/volumetric.rs`

use crate::error::{IngestError, Result};
use crate::models::{CubeAtom, CubeGrid};
use crate::parsers::scanner;

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

fn file_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\S*-(?P<quantity>[A-Za-z]+)(?P<rest>(?:_+[A-Za-z0-9]+)*)-\d+(?:_\d+)?\.cube$")
            .expect("valid cube file regex")
    })
}

/// 标签中的一个片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelToken {
    Word(String),
    Index(u64),
}

impl fmt::Display for LabelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelToken::Word(word) => write!(f, "{}", word),
            LabelToken::Index(index) => write!(f, "{}", index),
        }
    }
}

/// 从 cube 文件名解码出的标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeLabel {
    pub quantity: String,
    pub tokens: Vec<LabelToken>,
}

impl CubeLabel {
    /// 解码文件名，不符合命名约定时返回 `None`
    pub fn decode(file_name: &str) -> Option<Self> {
        let caps = file_name_regex().captures(file_name)?;
        let quantity = caps.name("quantity")?.as_str().to_lowercase();
        let tokens = caps
            .name("rest")
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split('_')
            .filter(|t| !t.is_empty())
            .map(|t| {
                if t.bytes().all(|b| b.is_ascii_digit()) {
                    t.parse::<u64>()
                        .map(LabelToken::Index)
                        .unwrap_or_else(|_| LabelToken::Word(t.to_string()))
                } else {
                    LabelToken::Word(t.to_lowercase())
                }
            })
            .collect();
        Some(CubeLabel { quantity, tokens })
    }
}

impl fmt::Display for CubeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.quantity)?;
        for token in &self.tokens {
            write!(f, "_{}", token)?;
        }
        Ok(())
    }
}

/// 扫描目录中的 cube 文件，返回 标签 -> 路径
///
/// 同一标签出现多次时保留文件名排序最后的一个。
pub fn discover_cube_files(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "Temporary folder not found, skipping cube discovery");
        return Ok(files);
    }

    let entries = fs::read_dir(dir).map_err(|e| IngestError::FragmentUnreadable {
        path: dir.display().to_string(),
        source: e,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IngestError::FragmentUnreadable {
            path: dir.display().to_string(),
            source: e,
        })?;
        paths.push(entry.path());
    }
    paths.sort();

    for path in paths {
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(CubeLabel::decode);
        match label {
            Some(label) => {
                files.insert(label.to_string(), path);
            }
            None => continue,
        }
    }
    debug!(count = files.len(), "Discovered cube files");
    Ok(files)
}

/// 读取 cube 文件
pub fn read_cube_file(path: &Path) -> Result<CubeGrid> {
    let content = fs::read_to_string(path).map_err(|e| IngestError::FragmentUnreadable {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_cube_content(&content, &path.display().to_string())
}

/// 从字符串内容解析 cube 网格
pub fn parse_cube_content(content: &str, source: &str) -> Result<CubeGrid> {
    let fail = |reason: String| IngestError::FragmentUnparseable {
        format: "cube".to_string(),
        path: source.to_string(),
        reason,
    };

    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 6 {
        return Err(fail("File too short".to_string()));
    }

    let header = scanner::floats(lines[2]);
    if header.len() < 4 {
        return Err(fail(format!("Invalid atom count line: '{}'", lines[2])));
    }
    let natoms_signed = header[0] as i64;
    let natoms = natoms_signed.unsigned_abs() as usize;
    let origin = [header[1], header[2], header[3]];

    let mut shape = [0usize; 3];
    let mut voxel = [[0.0; 3]; 3];
    let mut angstrom = false;
    for axis in 0..3 {
        let row = scanner::floats(lines[3 + axis]);
        if row.len() < 4 {
            return Err(fail(format!("Invalid voxel line: '{}'", lines[3 + axis])));
        }
        let count = row[0] as i64;
        angstrom |= count < 0;
        shape[axis] = count.unsigned_abs() as usize;
        voxel[axis] = [row[1], row[2], row[3]];
    }

    let atom_start = 6;
    if lines.len() < atom_start + natoms {
        return Err(fail(format!("Expected {} atom lines", natoms)));
    }
    let mut atoms = Vec::with_capacity(natoms);
    for line in &lines[atom_start..atom_start + natoms] {
        let row = scanner::floats(line);
        if row.len() < 5 {
            return Err(fail(format!("Invalid atom line: '{}'", line)));
        }
        atoms.push(CubeAtom {
            atomic_number: row[0] as i32,
            charge: row[1],
            position: [row[2], row[3], row[4]],
        });
    }

    // 轨道 cube 的原子块后有一行轨道编号
    let data_start = atom_start + natoms + usize::from(natoms_signed < 0);
    let expected = shape[0]
        .checked_mul(shape[1])
        .and_then(|n| n.checked_mul(shape[2]))
        .ok_or_else(|| fail(format!("Grid shape {:?} is too large", shape)))?;
    let values: Vec<f64> = lines
        .iter()
        .skip(data_start)
        .flat_map(|line| line.split_whitespace())
        .filter_map(scanner::parse_float)
        .take(expected)
        .collect();
    if values.len() < expected {
        return Err(fail(format!(
            "Expected {} grid values, found {}",
            expected,
            values.len()
        )));
    }

    Ok(CubeGrid {
        comments: [lines[0].trim().to_string(), lines[1].trim().to_string()],
        length_unit: if angstrom { "angstrom" } else { "bohr" }.to_string(),
        origin,
        shape,
        voxel,
        atoms,
        values,
    })
}
