//! Access-override file format.
//!
//! ```text
//! accessWidener	v1	named
//! # comment
//! public	class	net/example/Widget
//! protected	method	net/example/Widget	resize	(II)V
//! public	field	net/example/Widget	size	I
//! ```

use crate::error::{AccessError, Result};
use crate::types::{AccessLevel, AccessSpecification, MemberRef};
use std::path::Path;

const HEADER_WORDS: [&str; 2] = ["accessWidener", "accessEscalator"];
const FORMAT_VERSION: &str = "v1";

impl AccessSpecification {
    /// Parse an access-override document; duplicate rows merge like [`AccessSpecification::add_class`]
    pub fn parse(source: &str) -> Result<Self> {
        let mut lines = source.lines().enumerate();
        let mut spec = loop {
            let Some((idx, line)) = lines.next() else {
                return Err(AccessError::parse(1, "missing access header"));
            };
            let line = strip_comment(line);
            if line.is_empty() {
                continue;
            }
            break parse_header(idx + 1, line)?;
        };

        for (idx, raw) in lines {
            let line_no = idx + 1;
            let line = strip_comment(raw);
            if line.is_empty() {
                continue;
            }
            let columns: Vec<&str> = line.split_whitespace().collect();
            let level: AccessLevel = columns[0]
                .parse()
                .map_err(|e: String| AccessError::parse(line_no, e))?;

            match (columns.get(1).copied(), columns.len()) {
                (Some("class"), 3) => spec.add_class(columns[2], level)?,
                (Some("method"), 5) => spec.add_method(member(&columns), level)?,
                (Some("field"), 5) => spec.add_field(member(&columns), level)?,
                (Some(kind @ ("class" | "method" | "field")), n) => {
                    return Err(AccessError::parse(
                        line_no,
                        format!("`{kind}` entry has {n} columns"),
                    ))
                }
                (kind, _) => {
                    return Err(AccessError::parse(
                        line_no,
                        format!("unknown entry kind `{}`", kind.unwrap_or("")),
                    ))
                }
            }
        }

        log::debug!(
            "Parsed access specification in `{}` with {} entries",
            spec.namespace(),
            spec.len()
        );
        Ok(spec)
    }

    pub fn read_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| AccessError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&source)
    }

    /// Serialize in canonical (sorted) order
    pub fn to_document(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{}\t{}\t{}\n",
            HEADER_WORDS[0],
            FORMAT_VERSION,
            self.namespace()
        ));
        for (name, level) in self.classes() {
            out.push_str(&format!("{level}\tclass\t{name}\n"));
        }
        for (m, level) in self.methods() {
            out.push_str(&format!(
                "{level}\tmethod\t{}\t{}\t{}\n",
                m.owner, m.name, m.descriptor
            ));
        }
        for (m, level) in self.fields() {
            out.push_str(&format!(
                "{level}\tfield\t{}\t{}\t{}\n",
                m.owner, m.name, m.descriptor
            ));
        }
        out
    }

    pub fn write_path(&self, path: &Path) -> Result<()> {
        let io_err = |source| AccessError::Io {
            path: path.display().to_string(),
            source,
        };
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, self.to_document()).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)
    }
}

fn parse_header(line_no: usize, line: &str) -> Result<AccessSpecification> {
    let columns: Vec<&str> = line.split_whitespace().collect();
    match columns.as_slice() {
        [word, version, namespace] if HEADER_WORDS.contains(word) => {
            if *version != FORMAT_VERSION {
                return Err(AccessError::parse(
                    line_no,
                    format!("unsupported access format version `{version}`"),
                ));
            }
            Ok(AccessSpecification::new(*namespace))
        }
        _ => Err(AccessError::parse(
            line_no,
            "expected `accessWidener\tv1\t<namespace>` header",
        )),
    }
}

fn member(columns: &[&str]) -> MemberRef {
    MemberRef::new(columns[2], columns[3], columns[4])
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = "# overrides for the widget toolkit\n\
                       accessWidener\tv1\tnamed\n\
                       public\tclass\tnet/example/Widget\n\
                       protected\tmethod\tnet/example/Widget\tresize\t(II)V # keep\n\
                       public\tfield\tnet/example/Widget\tsize\tI\n\
                       public\tclass\tnet/example/Widget\n";

    #[test]
    fn parses_all_entry_kinds() {
        let spec = AccessSpecification::parse(DOC).unwrap();
        assert_eq!(spec.namespace(), "named");
        assert_eq!(spec.len(), 3);
        assert_eq!(
            spec.class_access("net/example/Widget"),
            Some(AccessLevel::Public)
        );
        assert_eq!(
            spec.method_access(&MemberRef::new("net/example/Widget", "resize", "(II)V")),
            Some(AccessLevel::Protected)
        );
    }

    #[test]
    fn accepts_legacy_header() {
        let spec = AccessSpecification::parse("accessEscalator\tv1\tintermediary\n").unwrap();
        assert_eq!(spec.namespace(), "intermediary");
        assert!(spec.is_empty());
    }

    #[test]
    fn conflicting_rows_fail() {
        let doc = "accessWidener\tv1\tnamed\npublic\tclass\tA\nprivate\tclass\tA\n";
        let err = AccessSpecification::parse(doc).unwrap_err();
        assert!(matches!(err, AccessError::Conflict { .. }), "{err}");
    }

    #[test]
    fn reports_bad_rows_with_line_numbers() {
        let doc = "accessWidener\tv1\tnamed\npublic\tmethod\tA\tb\n";
        let err = AccessSpecification::parse(doc).unwrap_err();
        assert!(matches!(err, AccessError::ParseError { line: 2, .. }), "{err}");

        let err = AccessSpecification::parse("public\tclass\tA\n").unwrap_err();
        assert!(matches!(err, AccessError::ParseError { line: 1, .. }), "{err}");
    }

    #[test]
    fn document_round_trips_canonically() {
        let spec = AccessSpecification::parse(DOC).unwrap();
        let text = spec.to_document();
        assert_eq!(AccessSpecification::parse(&text).unwrap(), spec);
        assert!(text.starts_with("accessWidener\tv1\tnamed\n"));
    }
}
