use crate::descriptor::remap_descriptor;
use crate::error::{MappingError, Result};
use crate::namespace::{NamespaceId, Namespaces};
use crate::tiny::{self, MappingFormat, RawClass, RawMember};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

/// Entity carrying one name per namespace
pub trait Named {
    fn names(&self) -> &[String];

    /// Name in the namespace at `ns`
    fn name(&self, ns: NamespaceId) -> &str {
        &self.names()[ns.index()]
    }
}

/// Kind of class member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Method,
}

/// Field or method with a name and descriptor per namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDef {
    kind: MemberKind,
    names: Vec<String>,
    descriptors: Vec<String>,
}

impl MemberDef {
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Descriptor with class references written in the namespace at `ns`
    pub fn descriptor(&self, ns: NamespaceId) -> &str {
        &self.descriptors[ns.index()]
    }
}

impl Named for MemberDef {
    fn names(&self) -> &[String] {
        &self.names
    }
}

/// Class with one name per namespace and its mapped members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    names: Vec<String>,
    fields: Vec<MemberDef>,
    methods: Vec<MemberDef>,
}

impl ClassDef {
    pub fn fields(&self) -> &[MemberDef] {
        &self.fields
    }

    pub fn methods(&self) -> &[MemberDef] {
        &self.methods
    }
}

impl Named for ClassDef {
    fn names(&self) -> &[String] {
        &self.names
    }
}

/// Immutable, namespace-indexed view of one mapping document.
///
/// Classes and members keep document order so every iteration is reproducible.
#[derive(Debug, Clone)]
pub struct Store {
    format: MappingFormat,
    namespaces: Namespaces,
    classes: Vec<ClassDef>,
    fingerprint: String,
}

impl Store {
    /// Load a mapping document, detecting its format from the header
    pub fn load(source: &str) -> Result<Self> {
        let raw = tiny::parse(source)?;
        let fingerprint = hex_sha256(source.as_bytes());
        let store = Self::build(raw.format, raw.namespaces, raw.classes, fingerprint)?;
        log::debug!(
            "Loaded {:?} mappings: {} namespaces, {} classes, {} fields, {} methods",
            store.format,
            store.namespaces.len(),
            store.class_count(),
            store.field_count(),
            store.method_count()
        );
        Ok(store)
    }

    /// Load a mapping document from disk
    pub fn load_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| MappingError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load(&source)
    }

    fn build(
        format: MappingFormat,
        namespaces: Namespaces,
        raw_classes: Vec<RawClass>,
        fingerprint: String,
    ) -> Result<Self> {
        let merged = merge_duplicate_classes(&namespaces, raw_classes)?;

        // Descriptors are declared in the first namespace; derive the rest from class names.
        let tables: Vec<HashMap<String, String>> = (0..namespaces.len())
            .map(|ns| {
                merged
                    .iter()
                    .map(|c| (c.names[0].clone(), c.names[ns].clone()))
                    .collect()
            })
            .collect();

        let mut classes = Vec::with_capacity(merged.len());
        for raw in merged {
            let fields = build_members(MemberKind::Field, raw.fields, &tables)?;
            let methods = build_members(MemberKind::Method, raw.methods, &tables)?;
            classes.push(ClassDef {
                names: raw.names,
                fields,
                methods,
            });
        }

        Ok(Self {
            format,
            namespaces,
            classes,
            fingerprint,
        })
    }

    pub fn format(&self) -> MappingFormat {
        self.format
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Resolve a namespace label declared by this document
    pub fn namespace(&self, name: &str) -> Result<NamespaceId> {
        self.namespaces.resolve(name)
    }

    /// All classes in document order
    pub fn classes(&self) -> &[ClassDef] {
        &self.classes
    }

    pub fn fields_of<'s>(&self, class: &'s ClassDef) -> &'s [MemberDef] {
        class.fields()
    }

    pub fn methods_of<'s>(&self, class: &'s ClassDef) -> &'s [MemberDef] {
        class.methods()
    }

    /// Name of `entity` in `namespace`
    pub fn name<'e, T: Named>(&self, entity: &'e T, namespace: &str) -> Result<&'e str> {
        let ns = self.namespace(namespace)?;
        Ok(entity.name(ns))
    }

    /// Find a class by its name in `ns`
    pub fn find_class(&self, ns: NamespaceId, name: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|c| c.name(ns) == name)
    }

    /// Class name translation table between two namespaces
    pub fn class_names(&self, from: NamespaceId, to: NamespaceId) -> HashMap<&str, &str> {
        self.classes
            .iter()
            .map(|c| (c.name(from), c.name(to)))
            .collect()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn field_count(&self) -> usize {
        self.classes.iter().map(|c| c.fields.len()).sum()
    }

    pub fn method_count(&self) -> usize {
        self.classes.iter().map(|c| c.methods.len()).sum()
    }

    /// Classes plus fields plus methods
    pub fn entity_count(&self) -> usize {
        self.class_count() + self.field_count() + self.method_count()
    }

    /// SHA-256 of the source document, hex encoded
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn merge_duplicate_classes(
    namespaces: &Namespaces,
    raw_classes: Vec<RawClass>,
) -> Result<Vec<RawClass>> {
    let mut merged: Vec<RawClass> = Vec::with_capacity(raw_classes.len());
    let mut slots: HashMap<String, usize> = HashMap::new();

    for class in raw_classes {
        let Some(&slot) = slots.get(&class.names[0]) else {
            slots.insert(class.names[0].clone(), merged.len());
            merged.push(class);
            continue;
        };
        let existing = &mut merged[slot];
        ensure_same_names(namespaces, &existing.names, &class.names, class.line, "class")?;
        existing.fields.extend(class.fields);
        existing.methods.extend(class.methods);
    }

    for class in &mut merged {
        let fields = std::mem::take(&mut class.fields);
        class.fields = dedup_members(namespaces, fields, "field")?;
        let methods = std::mem::take(&mut class.methods);
        class.methods = dedup_members(namespaces, methods, "method")?;
    }

    Ok(merged)
}

/// Collapse identical redeclarations; conflicting ones are a parse error.
fn dedup_members(
    namespaces: &Namespaces,
    members: Vec<RawMember>,
    kind: &str,
) -> Result<Vec<RawMember>> {
    let mut out: Vec<RawMember> = Vec::with_capacity(members.len());
    let mut slots: HashMap<(String, String), usize> = HashMap::new();
    for member in members {
        let key = (member.names[0].clone(), member.descriptor.clone());
        match slots.get(&key) {
            Some(&slot) => {
                ensure_same_names(namespaces, &out[slot].names, &member.names, member.line, kind)?;
            }
            None => {
                slots.insert(key, out.len());
                out.push(member);
            }
        }
    }
    Ok(out)
}

fn ensure_same_names(
    namespaces: &Namespaces,
    existing: &[String],
    incoming: &[String],
    line: usize,
    kind: &str,
) -> Result<()> {
    for (idx, (a, b)) in existing.iter().zip(incoming).enumerate() {
        if a != b {
            return Err(MappingError::parse(
                line,
                format!(
                    "conflicting declarations for {kind} `{}` in namespace `{}`: `{a}` vs `{b}`",
                    existing[0],
                    namespaces.get(NamespaceId(idx))
                ),
            ));
        }
    }
    Ok(())
}

fn build_members(
    kind: MemberKind,
    raw: Vec<RawMember>,
    tables: &[HashMap<String, String>],
) -> Result<Vec<MemberDef>> {
    raw.into_iter()
        .map(|member| {
            let descriptors = tables
                .iter()
                .map(|table| {
                    remap_descriptor(&member.descriptor, |class| {
                        table.get(class).map(String::as_str)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(MemberDef {
                kind,
                names: member.names,
                descriptors,
            })
        })
        .collect()
}

fn hex_sha256(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const V1: &str = "v1\tofficial\tintermediary\tnamed\n\
                      CLASS\ta\tnet/minecraft/class_1\tnet/minecraft/Block\n\
                      CLASS\tb\tnet/minecraft/class_2\tnet/minecraft/Item\n\
                      FIELD\ta\tLb;\tc\tfield_1\tdropItem\n\
                      METHOD\ta\t(Lb;I)La;\td\tmethod_1\twithItem\n";

    #[test]
    fn derives_descriptors_for_every_namespace() {
        let store = Store::load(V1).unwrap();
        let named = store.namespace("named").unwrap();
        let inter = store.namespace("intermediary").unwrap();
        let method = &store.classes()[0].methods()[0];
        assert_eq!(
            method.descriptor(named),
            "(Lnet/minecraft/Item;I)Lnet/minecraft/Block;"
        );
        assert_eq!(
            method.descriptor(inter),
            "(Lnet/minecraft/class_2;I)Lnet/minecraft/class_1;"
        );
    }

    #[test]
    fn names_are_stable_across_queries() {
        let store = Store::load(V1).unwrap();
        let class = &store.classes()[1];
        let first = store.name(class, "named").unwrap();
        let second = store.name(class, "named").unwrap();
        assert_eq!(first, "net/minecraft/Item");
        assert_eq!(first, second);
        assert!(store.name(class, "mojang").is_err());
    }

    #[test]
    fn keeps_document_order_and_counts() {
        let store = Store::load(V1).unwrap();
        let official = store.namespace("official").unwrap();
        let order: Vec<&str> = store.classes().iter().map(|c| c.name(official)).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(store.entity_count(), 4);
        assert_eq!(store.fields_of(&store.classes()[0]).len(), 1);
    }

    #[test]
    fn identical_redeclaration_is_merged() {
        let doc = "v1\tofficial\tnamed\nCLASS\ta\tAlpha\nCLASS\ta\tAlpha\n";
        let store = Store::load(doc).unwrap();
        assert_eq!(store.class_count(), 1);
    }

    #[test]
    fn conflicting_redeclaration_is_rejected() {
        let doc = "v1\tofficial\tnamed\nCLASS\ta\tAlpha\nCLASS\ta\tBeta\n";
        let err = Store::load(doc).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 3"), "{message}");
        assert!(message.contains("`named`"), "{message}");
    }

    #[test]
    fn conflicting_member_redeclaration_is_rejected() {
        let doc = "v1\tofficial\tnamed\nCLASS\ta\tAlpha\n\
                   FIELD\ta\tI\tb\tcount\nFIELD\ta\tI\tb\ttotal\n";
        assert!(Store::load(doc).is_err());
    }

    #[test]
    fn missing_name_in_any_namespace_is_rejected() {
        let class = "tiny\t2\t0\tofficial\tintermediary\tnamed\nc\ta\t\tWidget\n";
        let err = Store::load(class).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");

        let field = "tiny\t2\t0\tofficial\tnamed\nc\ta\tWidget\n\tf\tI\tb\t\n";
        let err = Store::load(field).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn fingerprint_tracks_document_content() {
        let a = Store::load(V1).unwrap();
        let b = Store::load(&V1.replace("dropItem", "dropStack")).unwrap();
        assert_eq!(a.fingerprint().len(), 64);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
