//! Tiny mapping document reader (v1 and v2).
//!
//! v1 is row oriented:
//!
//! ```text
//! v1	official	intermediary	named
//! CLASS	a	net/minecraft/class_1	net/minecraft/Block
//! FIELD	a	I	b	field_1	hardness
//! METHOD	a	(La;)V	c	method_1	copyFrom
//! ```
//!
//! v2 nests members under their class with tab indentation:
//!
//! ```text
//! tiny	2	0	official	intermediary	named
//! c	a	net/minecraft/class_1	net/minecraft/Block
//! 	f	I	b	field_1	hardness
//! 	m	(La;)V	c	method_1	copyFrom
//! 		p	1		other
//! ```
//!
//! Member descriptors are written in the first namespace only.

use crate::error::{MappingError, Result};
use crate::namespace::{Namespace, Namespaces};
use std::collections::HashMap;

/// Supported on-disk mapping formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingFormat {
    TinyV1,
    TinyV2,
}

/// Member row before descriptors are derived for every namespace
#[derive(Debug, Clone)]
pub(crate) struct RawMember {
    pub line: usize,
    pub descriptor: String,
    pub names: Vec<String>,
}

/// Class row with its members, in document order
#[derive(Debug, Clone)]
pub(crate) struct RawClass {
    pub line: usize,
    pub names: Vec<String>,
    pub fields: Vec<RawMember>,
    pub methods: Vec<RawMember>,
}

#[derive(Debug)]
pub(crate) struct RawDocument {
    pub format: MappingFormat,
    pub namespaces: Namespaces,
    pub classes: Vec<RawClass>,
}

/// Detect the document format from its header line
pub fn detect_format(source: &str) -> Result<MappingFormat> {
    let header = source
        .lines()
        .next()
        .ok_or_else(|| MappingError::parse(1, "empty mapping document"))?;
    let mut columns = header.split('\t');
    match columns.next() {
        Some("v1") => Ok(MappingFormat::TinyV1),
        Some("tiny") => match (columns.next(), columns.next()) {
            (Some("2"), Some(_minor)) => Ok(MappingFormat::TinyV2),
            _ => Err(MappingError::parse(1, "unsupported tiny version")),
        },
        _ => Err(MappingError::parse(
            1,
            "missing namespace header (expected `v1` or `tiny\t2\t0`)",
        )),
    }
}

pub(crate) fn parse(source: &str) -> Result<RawDocument> {
    match detect_format(source)? {
        MappingFormat::TinyV1 => parse_v1(source),
        MappingFormat::TinyV2 => parse_v2(source),
    }
}

fn header_namespaces(columns: &[&str]) -> Result<Namespaces> {
    Namespaces::new(columns.iter().map(|c| Namespace::from(*c)).collect())
}

fn parse_v1(source: &str) -> Result<RawDocument> {
    let mut lines = source.lines().enumerate();
    let (_, header) = lines
        .next()
        .ok_or_else(|| MappingError::parse(1, "empty mapping document"))?;
    let header: Vec<&str> = header.split('\t').collect();
    let namespaces = header_namespaces(&header[1..])?;
    let ns_count = namespaces.len();

    let mut classes: Vec<RawClass> = Vec::new();
    let mut class_slots: HashMap<String, usize> = HashMap::new();
    // Member rows may precede their CLASS row; attach them once every class is known.
    let mut pending: Vec<(bool, String, RawMember)> = Vec::new();

    for (idx, line) in lines {
        let line_no = idx + 1;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let columns: Vec<&str> = line.split('\t').collect();
        match columns[0] {
            "CLASS" => {
                let names = names_from(&columns[1..], ns_count, line_no)?;
                class_slots.entry(names[0].clone()).or_insert(classes.len());
                classes.push(RawClass {
                    line: line_no,
                    names,
                    fields: Vec::new(),
                    methods: Vec::new(),
                });
            }
            kind @ ("FIELD" | "METHOD") => {
                if columns.len() != 3 + ns_count {
                    return Err(MappingError::parse(
                        line_no,
                        format!(
                            "{kind} row has {} columns, expected {}",
                            columns.len(),
                            3 + ns_count
                        ),
                    ));
                }
                let owner = non_empty(columns[1], line_no, "owner")?.to_string();
                let descriptor = non_empty(columns[2], line_no, "descriptor")?.to_string();
                let names = names_from(&columns[3..], ns_count, line_no)?;
                pending.push((
                    kind == "METHOD",
                    owner,
                    RawMember {
                        line: line_no,
                        descriptor,
                        names,
                    },
                ));
            }
            other => {
                return Err(MappingError::parse(
                    line_no,
                    format!("unknown row kind `{other}`"),
                ))
            }
        }
    }

    for (is_method, owner, member) in pending {
        let slot = class_slots.get(&owner).copied().ok_or_else(|| {
            MappingError::parse(
                member.line,
                format!("member owner `{owner}` has no CLASS row"),
            )
        })?;
        let class = &mut classes[slot];
        if is_method {
            class.methods.push(member);
        } else {
            class.fields.push(member);
        }
    }

    Ok(RawDocument {
        format: MappingFormat::TinyV1,
        namespaces,
        classes,
    })
}

fn parse_v2(source: &str) -> Result<RawDocument> {
    let mut lines = source.lines().enumerate();
    let (_, header) = lines
        .next()
        .ok_or_else(|| MappingError::parse(1, "empty mapping document"))?;
    let header: Vec<&str> = header.split('\t').collect();
    if header.len() < 4 {
        return Err(MappingError::parse(1, "tiny v2 header declares no namespaces"));
    }
    let namespaces = header_namespaces(&header[3..])?;
    let ns_count = namespaces.len();

    let mut escaped_names = false;
    let mut in_header_properties = true;
    let mut classes: Vec<RawClass> = Vec::new();
    // Rows nested below a member (params, locals, comments) are skipped.
    let mut in_member = false;

    for (idx, raw) in lines {
        let line_no = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let depth = raw.chars().take_while(|c| *c == '\t').count();
        let columns: Vec<&str> = raw[depth..].split('\t').collect();

        if in_header_properties && depth == 1 {
            if columns[0] == "escaped-names" {
                escaped_names = true;
            }
            continue;
        }
        in_header_properties = false;

        match (depth, columns[0]) {
            (0, "c") => {
                let names = names_from(&columns[1..], ns_count, line_no)?;
                let names = unescape_all(names, escaped_names);
                classes.push(RawClass {
                    line: line_no,
                    names,
                    fields: Vec::new(),
                    methods: Vec::new(),
                });
                in_member = false;
            }
            (1, kind @ ("f" | "m")) => {
                let class = classes.last_mut().ok_or_else(|| {
                    MappingError::parse(line_no, "member row outside of a class")
                })?;
                if columns.len() != 2 + ns_count {
                    return Err(MappingError::parse(
                        line_no,
                        format!(
                            "member row has {} columns, expected {}",
                            columns.len(),
                            2 + ns_count
                        ),
                    ));
                }
                let descriptor = non_empty(columns[1], line_no, "descriptor")?;
                let descriptor = unescape(descriptor, escaped_names);
                let names = names_from(&columns[2..], ns_count, line_no)?;
                let member = RawMember {
                    line: line_no,
                    descriptor,
                    names: unescape_all(names, escaped_names),
                };
                if kind == "m" {
                    class.methods.push(member);
                } else {
                    class.fields.push(member);
                }
                in_member = true;
            }
            (1, "c") => {}
            (2, "p" | "v" | "c") | (3, "c") if in_member => {}
            (_, other) => {
                return Err(MappingError::parse(
                    line_no,
                    format!("unexpected `{other}` row at depth {depth}"),
                ))
            }
        }
    }

    Ok(RawDocument {
        format: MappingFormat::TinyV2,
        namespaces,
        classes,
    })
}

fn non_empty<'a>(value: &'a str, line: usize, what: &str) -> Result<&'a str> {
    if value.is_empty() {
        Err(MappingError::parse(line, format!("empty {what}")))
    } else {
        Ok(value)
    }
}

/// Read one name per namespace.
///
/// v2 allows an empty cell to mean "unchanged from the first namespace"; v1 does not.
/// One name per namespace; an empty cell is a missing name in either format
fn names_from(columns: &[&str], ns_count: usize, line: usize) -> Result<Vec<String>> {
    if columns.len() != ns_count {
        return Err(MappingError::parse(
            line,
            format!(
                "row has {} names, header declares {} namespaces",
                columns.len(),
                ns_count
            ),
        ));
    }
    columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if name.is_empty() {
                Err(MappingError::parse(
                    line,
                    format!("missing name for namespace column {}", idx + 1),
                ))
            } else {
                Ok((*name).to_string())
            }
        })
        .collect()
}

fn unescape_all(names: Vec<String>, escaped: bool) -> Vec<String> {
    if !escaped {
        return names;
    }
    names.into_iter().map(|n| unescape(&n, true)).collect()
}

fn unescape(value: &str, escaped: bool) -> String {
    if !escaped || !value.contains('\\') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_both_formats() {
        assert_eq!(detect_format("v1\ta\tb\n").unwrap(), MappingFormat::TinyV1);
        assert_eq!(
            detect_format("tiny\t2\t0\ta\tb\n").unwrap(),
            MappingFormat::TinyV2
        );
        assert!(detect_format("CLASS\ta\tb\n").is_err());
        assert!(detect_format("").is_err());
    }

    #[test]
    fn v1_attaches_members_declared_before_their_class() {
        let doc = parse("v1\tofficial\tnamed\nFIELD\ta\tI\tb\tcount\nCLASS\ta\tCounter\n").unwrap();
        assert_eq!(doc.classes.len(), 1);
        assert_eq!(doc.classes[0].fields[0].names, vec!["b", "count"]);
    }

    #[test]
    fn v1_rejects_short_rows() {
        let err = parse("v1\tofficial\tnamed\nCLASS\ta\n").unwrap_err();
        assert!(matches!(err, MappingError::ParseError { line: 2, .. }), "{err}");
    }

    #[test]
    fn v1_rejects_orphan_members() {
        let err = parse("v1\tofficial\tnamed\nMETHOD\tz\t()V\ta\trun\n").unwrap_err();
        assert!(err.to_string().contains("`z`"), "{err}");
    }

    #[test]
    fn v2_skips_parameters_and_comments() {
        let source = "tiny\t2\t0\tofficial\tnamed\n\
                      c\ta\tWidget\n\
                      \tc\ta widget\n\
                      \tm\t(I)V\tb\tresize\n\
                      \t\tp\t1\t\tsize\n\
                      \t\tc\tresizes the widget\n\
                      \tf\tI\tc\twidth\n";
        let doc = parse(source).unwrap();
        let class = &doc.classes[0];
        assert_eq!(class.names, vec!["a", "Widget"]);
        assert_eq!(class.methods[0].descriptor, "(I)V");
        assert_eq!(class.fields[0].names, vec!["c", "width"]);
    }

    #[test]
    fn v2_empty_cell_is_a_missing_name() {
        let err = parse("tiny\t2\t0\tofficial\tnamed\nc\ta\t\n").unwrap_err();
        assert!(matches!(err, MappingError::ParseError { line: 2, .. }), "{err}");
        assert!(err.to_string().contains("namespace column 2"), "{err}");
    }

    #[test]
    fn v2_unescapes_names_when_requested() {
        let doc = parse("tiny\t2\t0\tofficial\tnamed\n\tescaped-names\nc\ta\tweird\\tname\n")
            .unwrap();
        assert_eq!(doc.classes[0].names[1], "weird\tname");
    }

    #[test]
    fn v2_rejects_unknown_rows_and_bad_member_columns() {
        assert!(parse("tiny\t2\t0\tofficial\tnamed\nx\ta\tb\n").is_err());
        let err = parse("tiny\t2\t0\tofficial\tnamed\nc\ta\tb\n\tm\t()V\tc\n").unwrap_err();
        assert!(matches!(err, MappingError::ParseError { line: 3, .. }), "{err}");
    }
}
