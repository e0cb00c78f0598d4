//! JVM field and method descriptors.
//!
//! Descriptors embed class names (`Lnet/example/Foo;`), so moving a member between namespaces
//! means translating every class reference inside its descriptor.

use crate::error::{MappingError, Result};

/// Rewrite every class reference in `descriptor` through `map_class`.
///
/// Classes for which `map_class` returns `None` are kept verbatim (library types such as
/// `java/lang/String` are not part of any mapping document).
pub fn remap_descriptor<'a, F>(descriptor: &str, mut map_class: F) -> Result<String>
where
    F: FnMut(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(descriptor.len());
    let mut rest = descriptor;

    while let Some(idx) = rest.find('L') {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];
        let end = after
            .find(';')
            .ok_or_else(|| MappingError::descriptor(descriptor, "unterminated class reference"))?;
        let class = &after[..end];
        if class.is_empty() {
            return Err(MappingError::descriptor(descriptor, "empty class reference"));
        }
        out.push('L');
        match map_class(class) {
            Some(mapped) => out.push_str(mapped),
            None => out.push_str(class),
        }
        out.push(';');
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Class names referenced by `descriptor`, in order of appearance
pub fn referenced_classes(descriptor: &str) -> Result<Vec<&str>> {
    let mut classes = Vec::new();
    let mut rest = descriptor;
    while let Some(idx) = rest.find('L') {
        let after = &rest[idx + 1..];
        let end = after
            .find(';')
            .ok_or_else(|| MappingError::descriptor(descriptor, "unterminated class reference"))?;
        classes.push(&after[..end]);
        rest = &after[end + 1..];
    }
    Ok(classes)
}

/// Whether `descriptor` is a method descriptor (`(args)ret`)
pub fn is_method_descriptor(descriptor: &str) -> bool {
    descriptor.starts_with('(') && descriptor.contains(')')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn remaps_every_class_reference() {
        let names: HashMap<&str, &str> = [("a", "net/example/Alpha"), ("b", "net/example/Beta")]
            .into_iter()
            .collect();
        let out = remap_descriptor("(La;ILjava/lang/String;[Lb;)La;", |c| {
            names.get(c).copied()
        })
        .unwrap();
        assert_eq!(
            out,
            "(Lnet/example/Alpha;ILjava/lang/String;[Lnet/example/Beta;)Lnet/example/Alpha;"
        );
    }

    #[test]
    fn primitive_descriptors_pass_through() {
        assert_eq!(remap_descriptor("(IJZ)V", |_| None).unwrap(), "(IJZ)V");
        assert_eq!(remap_descriptor("[[D", |_| None).unwrap(), "[[D");
    }

    #[test]
    fn rejects_unterminated_reference() {
        let err = remap_descriptor("(La", |_| None).unwrap_err();
        assert!(matches!(err, MappingError::InvalidDescriptor { .. }));
    }

    #[test]
    fn lists_referenced_classes() {
        assert_eq!(
            referenced_classes("(La;[Lb/c;)V").unwrap(),
            vec!["a", "b/c"]
        );
        assert!(is_method_descriptor("()V"));
        assert!(!is_method_descriptor("I"));
    }
}
