//! # 文本扫描工具
//!
//! 所有解析器共享的按行扫描与数值提取原语，均为纯函数。
//!
//! ## 依赖关系
//! - 被 `parsers/` 下所有解析器使用
//! - 无外部模块依赖

/// 按行扫描器
pub struct LineScanner<'a> {
    lines: Vec<&'a str>,
}

impl<'a> LineScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        LineScanner {
            lines: text.lines().collect(),
        }
    }

    pub fn lines(&self) -> &[&'a str] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, idx: usize) -> Option<&'a str> {
        self.lines.get(idx).copied()
    }

    /// 从 `from` 行开始查找第一个包含关键字的行号（区分大小写）
    pub fn find(&self, keyword: &str, from: usize) -> Option<usize> {
        self.lines
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, line)| line.contains(keyword))
            .map(|(i, _)| i)
    }

    /// 最后一个包含关键字的行号
    pub fn find_last(&self, keyword: &str) -> Option<usize> {
        self.lines.iter().rposition(|line| line.contains(keyword))
    }

    /// 所有包含关键字的行号
    pub fn find_all<'s>(&'s self, keyword: &'s str) -> impl Iterator<Item = usize> + 's {
        self.lines
            .iter()
            .enumerate()
            .filter(move |(_, line)| line.contains(keyword))
            .map(|(i, _)| i)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.lines.iter().any(|line| line.contains(keyword))
    }

    /// 有界前瞻：返回 `start` 之后至多 `max_lines` 行，遇到 `stop` 为真的行即截止（不含该行）
    pub fn block<F>(&self, start: usize, max_lines: usize, stop: F) -> &[&'a str]
    where
        F: Fn(&str) -> bool,
    {
        let begin = (start + 1).min(self.lines.len());
        let limit = begin.saturating_add(max_lines).min(self.lines.len());
        let end = self.lines[begin..limit]
            .iter()
            .position(|line| stop(line))
            .map(|offset| begin + offset)
            .unwrap_or(limit);
        &self.lines[begin..end]
    }
}

/// 解析浮点数，兼容 Fortran `D` 指数
pub fn parse_float(token: &str) -> Option<f64> {
    let token = token.trim();
    token
        .parse::<f64>()
        .ok()
        .or_else(|| token.replace(['D', 'd'], "E").parse::<f64>().ok())
}

/// 提取行内全部数值
pub fn floats(line: &str) -> Vec<f64> {
    line.split_whitespace().filter_map(parse_float).collect()
}

/// 提取字符串中最后一个数字
pub fn last_float(line: &str) -> Option<f64> {
    line.split_whitespace().filter_map(parse_float).last()
}

/// 提取字符串中最后一个整数
pub fn last_int(line: &str) -> Option<usize> {
    line.split_whitespace()
        .filter_map(|w| w.parse::<usize>().ok())
        .last()
}

/// 提取指定标记之后的第一个数字
pub fn float_after(line: &str, marker: &str) -> Option<f64> {
    let pos = line.find(marker)?;
    line[pos + marker.len()..]
        .split_whitespace()
        .find_map(parse_float)
}

/// 提取指定标记之后的第一个整数
pub fn int_after(line: &str, marker: &str) -> Option<usize> {
    let pos = line.find(marker)?;
    line[pos + marker.len()..]
        .split_whitespace()
        .find_map(|w| w.parse::<usize>().ok())
}

/// 提取指定标记之后的第一个词
pub fn word_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let pos = line.find(marker)?;
    line[pos + marker.len()..].split_whitespace().next()
}

/// 去掉方括号单位，如 `Total energy [hartree]` -> `Total energy`
pub fn strip_unit(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut depth = 0usize;
    for ch in key.chars() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 从 kind 标签推断元素符号（取字母前缀并规范大小写）
///
/// `O_1` -> `O`, `Fe2` -> `Fe`, `h` -> `H`
pub fn element_from_label(label: &str) -> String {
    let prefix: String = label.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let mut chars = prefix.chars();
    match chars.next() {
        Some(first) => {
            let mut symbol = first.to_ascii_uppercase().to_string();
            // 元素符号最多两个字母
            if let Some(second) = chars.next() {
                symbol.push(second.to_ascii_lowercase());
            }
            symbol
        }
        None => label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "\
 GLOBAL| Run type                                                  GEO_OPT
 ENERGY| Total FORCE_EVAL ( QS ) energy [a.u.]:              -17.146893
 table start
   1   2.0
   2   3.0

 ENERGY| Total FORCE_EVAL ( QS ) energy [a.u.]:              -17.150001
";

    #[test]
    fn test_find_and_find_last() {
        let scanner = LineScanner::new(TEXT);
        assert_eq!(scanner.find("ENERGY|", 0), Some(1));
        assert_eq!(scanner.find("ENERGY|", 2), Some(6));
        assert_eq!(scanner.find_last("ENERGY|"), Some(6));
        assert_eq!(scanner.find_all("ENERGY|").count(), 2);
        assert!(!scanner.contains("energy|"));
    }

    #[test]
    fn test_block_stops_at_blank_line() {
        let scanner = LineScanner::new(TEXT);
        let start = scanner.find("table start", 0).unwrap();
        let rows = scanner.block(start, 10, |l| l.trim().is_empty());
        assert_eq!(rows.len(), 2);

        let bounded = scanner.block(start, 1, |l| l.trim().is_empty());
        assert_eq!(bounded.len(), 1);
    }

    #[test]
    fn test_block_at_end_of_text() {
        let scanner = LineScanner::new(TEXT);
        let rows = scanner.block(scanner.len() - 1, 5, |_| false);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_numeric_tokens() {
        assert_eq!(last_float(" ENERGY| Total energy [a.u.]:   -17.5"), Some(-17.5));
        assert_eq!(float_after("Total Energy   =   -1.25  a.u.", "="), Some(-1.25));
        assert_eq!(int_after("  *** SCF run converged in    12 steps ***", "converged in"), Some(12));
        assert_eq!(word_after(" GLOBAL| Run type   ENERGY", "Run type"), Some("ENERGY"));
        assert_eq!(parse_float("1.5D-02"), Some(0.015));
        assert_eq!(floats("   1.0  abc  -2.5E+01"), vec![1.0, -25.0]);
        assert_eq!(float_after("no equals here", "="), None);
    }

    #[test]
    fn test_strip_unit_and_element() {
        assert_eq!(strip_unit("Total energy [hartree]"), "Total energy");
        assert_eq!(strip_unit("POTENTIAL ENERGY[hartree]"), "POTENTIAL ENERGY");
        assert_eq!(element_from_label("O_1"), "O");
        assert_eq!(element_from_label("Fe2"), "Fe");
        assert_eq!(element_from_label("cl"), "Cl");
    }
}
