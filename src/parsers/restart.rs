//! # CP2K 重启文件结构解析器
//!
//! 从 `<project>-1.restart` 中读取最终几何结构。
//!
//! ## 重启文件格式说明
//! ```text
//! &FORCE_EVAL
//!   &SUBSYS
//!     &CELL
//!       A   5.43 0.0 0.0
//!       B   0.0 5.43 0.0
//!       C   0.0 0.0 5.43
//!       PERIODIC XYZ
//!     &END CELL
//!     &COORD
//!       Si    0.0 0.0 0.0
//!       Si_1  1.3575 1.3575 1.3575
//!     &END COORD
//!     &KIND Si_1
//!       ELEMENT Si
//!     &END KIND
//!   &END SUBSYS
//! &END FORCE_EVAL
//! ```
//!
//! 每个带 `&SUBSYS` 的 `&FORCE_EVAL` 为一个几何结构。
//!
//! ## 依赖关系
//! - 被 `engine/dispatcher.rs` 使用
//! - 使用 `parsers/scanner.rs`, `models/structure.rs`

use crate::error::{IngestError, Result};
use crate::models::{Atom, Lattice, StructureRecord};
use crate::parsers::scanner;

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// 重启文件名约定
pub fn restart_file_name(project: &str) -> String {
    format!("{}-1.restart", project)
}

/// 读取并解析重启文件
///
/// 文件不存在返回 `Ok(None)`（无可用结构，不是错误）。
pub fn parse_restart_file(path: &Path) -> Result<Option<StructureRecord>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No restart file available");
            return Ok(None);
        }
        Err(e) => {
            return Err(IngestError::RestartUnreadable {
                path: path.display().to_string(),
                source: e,
            })
        }
    };
    parse_restart_content(&content).map(Some)
}

/// 解析重启文件内容，目前只支持单个几何结构
pub fn parse_restart_content(content: &str) -> Result<StructureRecord> {
    let mut structures = parse_restart_structures(content)?;
    if structures.len() > 1 {
        return Err(IngestError::MultipleGeometriesUnsupported {
            count: structures.len(),
        });
    }
    structures.pop().ok_or_else(|| IngestError::RestartUnparseable {
        reason: "No &SUBSYS section found".to_string(),
    })
}

/// 解析重启文件中的全部几何结构
pub fn parse_restart_structures(content: &str) -> Result<Vec<StructureRecord>> {
    let mut stack: Vec<String> = Vec::new();
    let mut builders: Vec<SubsysBuilder> = Vec::new();

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };
        let head = first.to_uppercase();

        if head == "&END" {
            stack.pop();
            continue;
        }
        if let Some(section) = head.strip_prefix('&') {
            let section = section.to_string();
            let param = tokens.next().map(str::to_string);
            if section == "SUBSYS" && stack.last().map(String::as_str) == Some("FORCE_EVAL") {
                builders.push(SubsysBuilder::default());
            }
            if section == "KIND" && in_subsys(&stack) {
                if let (Some(builder), Some(name)) = (builders.last_mut(), param) {
                    builder.current_kind = Some(name);
                }
            }
            stack.push(section);
            continue;
        }

        let Some(builder) = builders.last_mut() else {
            continue;
        };
        match current_section(&stack) {
            Some("CELL") => builder.cell_keyword(&head, line)?,
            Some("COORD") => builder.coord_line(&head, line)?,
            Some("KIND") => {
                if head == "ELEMENT" {
                    if let (Some(kind), Some(element)) = (builder.current_kind.clone(), tokens.next()) {
                        builder.elements.insert(kind, element.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    let structures = builders
        .into_iter()
        .map(SubsysBuilder::build)
        .collect::<Result<Vec<_>>>()?;
    if structures.is_empty() {
        return Err(IngestError::RestartUnparseable {
            reason: "Missing &FORCE_EVAL/&SUBSYS block".to_string(),
        });
    }
    debug!(count = structures.len(), "Parsed restart geometries");
    Ok(structures)
}

/// 当前节名，仅当其父节为 SUBSYS 时返回（跳过 CELL_REF 等嵌套节）
fn current_section(stack: &[String]) -> Option<&str> {
    match stack {
        [.., parent, section] if parent == "SUBSYS" => Some(section.as_str()),
        _ => None,
    }
}

fn in_subsys(stack: &[String]) -> bool {
    stack.last().map(String::as_str) == Some("SUBSYS")
}

#[derive(Default)]
struct SubsysBuilder {
    vectors: [Option<[f64; 3]>; 3],
    abc: Option<[f64; 3]>,
    angles: Option<[f64; 3]>,
    pbc: Option<[bool; 3]>,
    scaled: bool,
    coords: Vec<(String, [f64; 3])>,
    elements: BTreeMap<String, String>,
    current_kind: Option<String>,
}

impl SubsysBuilder {
    fn cell_keyword(&mut self, head: &str, line: &str) -> Result<()> {
        match head {
            "A" | "B" | "C" => {
                let idx = match head {
                    "A" => 0,
                    "B" => 1,
                    _ => 2,
                };
                self.vectors[idx] = Some(three_values(line, head)?);
            }
            "ABC" => self.abc = Some(three_values(line, head)?),
            "ALPHA_BETA_GAMMA" => self.angles = Some(three_values(line, head)?),
            "PERIODIC" => {
                let value = line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("XYZ")
                    .to_uppercase();
                self.pbc = Some(if value == "NONE" {
                    [false; 3]
                } else {
                    [value.contains('X'), value.contains('Y'), value.contains('Z')]
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn coord_line(&mut self, head: &str, line: &str) -> Result<()> {
        match head {
            "SCALED" => {
                let value = line.split_whitespace().nth(1).unwrap_or(".TRUE.").to_uppercase();
                self.scaled = matches!(value.as_str(), ".TRUE." | "TRUE" | "T" | ".T." | "YES" | "ON");
            }
            "UNIT" => {}
            _ => {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                let values: Vec<f64> = tokens
                    .iter()
                    .skip(1)
                    .take(3)
                    .filter_map(|t| scanner::parse_float(t))
                    .collect();
                if values.len() < 3 {
                    return Err(IngestError::RestartUnparseable {
                        reason: format!("Invalid &COORD line: '{}'", line),
                    });
                }
                self.coords
                    .push((tokens[0].to_string(), [values[0], values[1], values[2]]));
            }
        }
        Ok(())
    }

    fn build(self) -> Result<StructureRecord> {
        let cell = match (self.vectors, self.abc) {
            ([Some(a), Some(b), Some(c)], _) => Lattice::from_vectors([a, b, c]),
            (_, Some([a, b, c])) => {
                let [alpha, beta, gamma] = self.angles.unwrap_or([90.0, 90.0, 90.0]);
                Lattice::from_parameters(a, b, c, alpha, beta, gamma)
            }
            _ => {
                return Err(IngestError::RestartUnparseable {
                    reason: "Incomplete &CELL section (need A, B, C or ABC)".to_string(),
                })
            }
        };

        if self.coords.is_empty() {
            return Err(IngestError::RestartUnparseable {
                reason: "Missing or empty &COORD section".to_string(),
            });
        }

        let atoms = self
            .coords
            .into_iter()
            .map(|(label, pos)| {
                let symbol = self
                    .elements
                    .get(&label)
                    .cloned()
                    .unwrap_or_else(|| scanner::element_from_label(&label));
                let position = if self.scaled { cell.frac_to_cart(pos) } else { pos };
                let atom = Atom::new(symbol.clone(), position);
                if label == symbol {
                    atom
                } else {
                    atom.with_kind(label)
                }
            })
            .collect();

        Ok(StructureRecord::new(cell, self.pbc.unwrap_or([true; 3]), atoms))
    }
}

/// 关键字后的三个数值，跳过 `[angstrom]` 等单位标记
fn three_values(line: &str, keyword: &str) -> Result<[f64; 3]> {
    let values: Vec<f64> = line
        .split_whitespace()
        .skip(1)
        .filter(|t| !t.starts_with('['))
        .filter_map(scanner::parse_float)
        .collect();
    match values.as_slice() {
        [x, y, z, ..] => Ok([*x, *y, *z]),
        _ => Err(IngestError::RestartUnparseable {
            reason: format!("Keyword {} needs three values: '{}'", keyword, line),
        }),
    }
}

/// 将结构写为最小重启文件片段
pub fn to_restart_string(structure: &StructureRecord) -> String {
    let mut result = String::new();
    result.push_str(" &FORCE_EVAL\n   METHOD  QS\n   &SUBSYS\n     &CELL\n");
    for (name, row) in ["A", "B", "C"].iter().zip(structure.cell.matrix.iter()) {
        result.push_str(&format!(
            "       {}    {:.16E}    {:.16E}    {:.16E}\n",
            name, row[0], row[1], row[2]
        ));
    }
    let periodic: String = ['X', 'Y', 'Z']
        .iter()
        .zip(structure.pbc.iter())
        .filter(|(_, p)| **p)
        .map(|(axis, _)| *axis)
        .collect();
    result.push_str(&format!(
        "       PERIODIC  {}\n     &END CELL\n     &COORD\n",
        if periodic.is_empty() { "NONE".to_string() } else { periodic }
    ));
    for atom in &structure.atoms {
        result.push_str(&format!(
            "{:<6} {:.16E}    {:.16E}    {:.16E}\n",
            atom.kind_name(),
            atom.position[0],
            atom.position[1],
            atom.position[2]
        ));
    }
    result.push_str("     &END COORD\n");

    let mut kinds: BTreeMap<&str, &str> = BTreeMap::new();
    for atom in &structure.atoms {
        kinds.insert(atom.kind_name(), &atom.symbol);
    }
    for (kind, element) in kinds {
        result.push_str(&format!(
            "     &KIND {}\n       ELEMENT  {}\n     &END KIND\n",
            kind, element
        ));
    }
    result.push_str("   &END SUBSYS\n &END FORCE_EVAL\n");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATER: &str = r#"
 &GLOBAL
   PROJECT_NAME aiida
   RUN_TYPE GEO_OPT
 &END GLOBAL
 &FORCE_EVAL
   METHOD  QS
   &DFT
     BASIS_SET_FILE_NAME BASIS_MOLOPT
   &END DFT
   &SUBSYS
     &CELL
       A     1.0000000000000000E+01    0.0000000000000000E+00    0.0000000000000000E+00
       B     0.0000000000000000E+00    1.0000000000000000E+01    0.0000000000000000E+00
       C     0.0000000000000000E+00    0.0000000000000000E+00    1.0000000000000000E+01
       PERIODIC  NONE
       MULTIPLE_UNIT_CELL  1 1 1
       &CELL_REF
         A  20.0 0.0 0.0
         B  0.0 20.0 0.0
         C  0.0 0.0 20.0
       &END CELL_REF
     &END CELL
     &COORD
O    5.0000000000000000E+00    5.0000000000000000E+00    5.1192000000000000E+00
H1   5.0000000000000000E+00    5.7632000000000000E+00    4.5228000000000000E+00
H1   5.0000000000000000E+00    4.2368000000000000E+00    4.5228000000000000E+00
     &END COORD
     &KIND O
       ELEMENT  O
       BASIS_SET DZVP-MOLOPT-SR-GTH
     &END KIND
     &KIND H1
       ELEMENT  H
     &END KIND
   &END SUBSYS
 &END FORCE_EVAL
"#;

    #[test]
    fn test_parse_single_geometry() {
        let structure = parse_restart_content(WATER).unwrap();

        assert_eq!(structure.len(), 3);
        assert_eq!(structure.pbc, [false, false, false]);
        assert!((structure.cell.matrix[0][0] - 10.0).abs() < 1e-9);
        assert_eq!(structure.atoms[0].symbol, "O");
        assert_eq!(structure.atoms[0].kind, None);
        assert_eq!(structure.atoms[1].symbol, "H");
        assert_eq!(structure.atoms[1].kind.as_deref(), Some("H1"));
        assert!((structure.atoms[1].position[1] - 5.7632).abs() < 1e-9);
    }

    #[test]
    fn test_multiple_force_evals_rejected() {
        let content = format!("{}{}", WATER, WATER.replace("&GLOBAL", "&EXT_RESTART").replace("&END GLOBAL", "&END EXT_RESTART"));
        let all = parse_restart_structures(&content).unwrap();
        assert_eq!(all.len(), 2);

        let result = parse_restart_content(&content);
        assert!(matches!(
            result,
            Err(IngestError::MultipleGeometriesUnsupported { count: 2 })
        ));
    }

    #[test]
    fn test_missing_layout_is_parse_error() {
        let result = parse_restart_content(" &GLOBAL\n   RUN_TYPE ENERGY\n &END GLOBAL\n");
        assert!(matches!(result, Err(IngestError::RestartUnparseable { .. })));

        let no_coords = " &FORCE_EVAL\n &SUBSYS\n &CELL\n ABC 5 5 5\n &END CELL\n &END SUBSYS\n &END FORCE_EVAL\n";
        assert!(matches!(
            parse_restart_content(no_coords),
            Err(IngestError::RestartUnparseable { .. })
        ));
    }

    #[test]
    fn test_abc_cell_with_scaled_coordinates() {
        let content = r#"
 &FORCE_EVAL
   &SUBSYS
     &CELL
       ABC [angstrom] 4.0 5.0 6.0
       ALPHA_BETA_GAMMA [deg] 90.0 90.0 90.0
       PERIODIC XY
     &END CELL
     &COORD
       SCALED .TRUE.
       Fe  0.5 0.5 0.5
     &END COORD
   &END SUBSYS
 &END FORCE_EVAL
"#;
        let structure = parse_restart_content(content).unwrap();

        assert_eq!(structure.pbc, [true, true, false]);
        assert!((structure.atoms[0].position[0] - 2.0).abs() < 1e-9);
        assert!((structure.atoms[0].position[1] - 2.5).abs() < 1e-9);
        assert!((structure.atoms[0].position[2] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_restart_round_trip() {
        let original = parse_restart_content(WATER).unwrap();
        let written = to_restart_string(&original);
        let parsed = parse_restart_content(&written).unwrap();

        assert_eq!(parsed.cell, original.cell);
        assert_eq!(parsed.pbc, original.pbc);
        assert_eq!(parsed.len(), original.len());
        for (a, b) in parsed.atoms.iter().zip(original.atoms.iter()) {
            assert_eq!(a.symbol, b.symbol);
            assert_eq!(a.kind, b.kind);
            for k in 0..3 {
                assert!((a.position[k] - b.position[k]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(restart_file_name("aiida"));
        assert!(parse_restart_file(&path).unwrap().is_none());

        std::fs::write(&path, WATER).unwrap();
        assert_eq!(parse_restart_file(&path).unwrap().unwrap().len(), 3);
    }
}
