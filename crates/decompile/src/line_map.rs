//! Original-line to decompiled-line tables.
//!
//! Text form, one block per class in sorted order:
//!
//! ```text
//! net/example/Widget	15	9
//! 	10	3
//! 	12	5
//! 	15	9
//!
//! ```

use crate::backend::LineNumberReport;
use crate::error::{DecompileError, Result};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMap {
    classes: BTreeMap<String, BTreeMap<u32, u32>>,
}

impl LineMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the two instruction-indexed tables into original line -> decompiled line.
    ///
    /// Instructions missing from either table are skipped; when several instructions share an
    /// original line the one with the highest index wins.
    pub fn compose(report: &LineNumberReport) -> BTreeMap<u32, u32> {
        let mut lines = BTreeMap::new();
        for (instruction, dest) in &report.output_lines {
            if let Some(src) = report.class_file_lines.get(instruction) {
                lines.insert(*src, *dest);
            }
        }
        lines
    }

    pub fn insert(&mut self, class: impl Into<String>, lines: BTreeMap<u32, u32>) {
        self.classes.entry(class.into()).or_default().extend(lines);
    }

    pub fn class(&self, class: &str) -> Option<&BTreeMap<u32, u32>> {
        self.classes.get(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &BTreeMap<u32, u32>)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Decompiled line for `line` of `class`, using the nearest mapped line at or before it
    pub fn lookup(&self, class: &str, line: u32) -> Option<u32> {
        self.classes
            .get(class)?
            .range(..=line)
            .next_back()
            .map(|(_, dest)| *dest)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (class, lines) in &self.classes {
            let max_src = lines.keys().copied().max().unwrap_or(0);
            let max_dest = lines.values().copied().max().unwrap_or(0);
            out.push_str(&format!("{class}\t{max_src}\t{max_dest}\n"));
            for (src, dest) in lines {
                out.push_str(&format!("\t{src}\t{dest}\n"));
            }
            out.push('\n');
        }
        out
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut map = Self::new();
        let mut current: Option<String> = None;

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if line.is_empty() {
                current = None;
                continue;
            }

            if let Some(row) = line.strip_prefix('\t') {
                let class = current
                    .as_ref()
                    .ok_or_else(|| DecompileError::line_map(line_no, "line row outside a class"))?;
                let (src, dest) = parse_pair(row, line_no)?;
                map.classes
                    .entry(class.clone())
                    .or_default()
                    .insert(src, dest);
                continue;
            }

            let mut columns = line.split('\t');
            let class = columns.next().unwrap_or_default();
            let rest: Vec<&str> = columns.collect();
            if class.is_empty() || rest.len() != 2 {
                return Err(DecompileError::line_map(line_no, "expected `<class>\\t<max>\\t<max>`"));
            }
            parse_pair(&rest.join("\t"), line_no)?;
            map.classes.entry(class.to_string()).or_default();
            current = Some(class.to_string());
        }

        Ok(map)
    }

    pub fn read_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DecompileError::io(path, e))?;
        Self::parse(&text)
    }

    /// Write through a temporary file so readers never see a truncated map
    pub fn write_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DecompileError::io(parent, e))?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, self.to_text()).map_err(|e| DecompileError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| DecompileError::io(path, e))
    }
}

fn parse_pair(row: &str, line_no: usize) -> Result<(u32, u32)> {
    let (a, b) = row
        .split_once('\t')
        .ok_or_else(|| DecompileError::line_map(line_no, "expected two columns"))?;
    let parse = |v: &str| {
        v.parse::<u32>()
            .map_err(|e| DecompileError::line_map(line_no, format!("bad line number `{v}`: {e}")))
    };
    Ok((parse(a)?, parse(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report() -> LineNumberReport {
        LineNumberReport {
            class_file_lines: BTreeMap::from([(0, 10), (4, 12), (9, 15), (11, 15)]),
            output_lines: BTreeMap::from([(0, 3), (4, 5), (7, 6), (9, 8), (11, 9)]),
        }
    }

    #[test]
    fn composes_on_instruction_index() {
        assert_eq!(
            LineMap::compose(&report()),
            BTreeMap::from([(10, 3), (12, 5), (15, 9)])
        );
    }

    #[test]
    fn writes_sorted_blocks_with_maxima() {
        let mut map = LineMap::new();
        map.insert("net/example/Widget", LineMap::compose(&report()));
        map.insert("net/example/Alpha", BTreeMap::from([(1, 1)]));

        assert_eq!(
            map.to_text(),
            "net/example/Alpha\t1\t1\n\t1\t1\n\n\
             net/example/Widget\t15\t9\n\t10\t3\n\t12\t5\n\t15\t9\n\n"
        );
        assert_eq!(LineMap::parse(&map.to_text()).unwrap(), map);
    }

    #[test]
    fn lookup_uses_nearest_preceding_line() {
        let mut map = LineMap::new();
        map.insert("Widget", LineMap::compose(&report()));
        assert_eq!(map.lookup("Widget", 12), Some(5));
        assert_eq!(map.lookup("Widget", 14), Some(5));
        assert_eq!(map.lookup("Widget", 99), Some(9));
        assert_eq!(map.lookup("Widget", 2), None);
        assert_eq!(map.lookup("Other", 12), None);
    }

    #[test]
    fn keeps_classes_without_rows() {
        let map = LineMap::parse("Empty\t0\t0\n\n").unwrap();
        assert_eq!(map.class("Empty"), Some(&BTreeMap::new()));
    }

    #[test]
    fn rejects_malformed_rows() {
        let err = LineMap::parse("\t1\t2\n").unwrap_err();
        assert!(matches!(err, DecompileError::LineMapParse { line: 1, .. }));

        let err = LineMap::parse("Widget\t1\t1\n\t1\tx\n").unwrap_err();
        assert!(matches!(err, DecompileError::LineMapParse { line: 2, .. }));

        assert!(LineMap::parse("Widget\t1\n").is_err());
    }
}
