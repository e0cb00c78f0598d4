use crate::error::Result;
use crate::namespace::NamespacePair;
use crate::store::{Named, Store};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Member identity inside its owning class: name plus descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberKey {
    pub name: String,
    pub descriptor: String,
}

impl MemberKey {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// Rename entries for one class and its members
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassMapping {
    pub deobfuscated: String,
    pub fields: BTreeMap<MemberKey, String>,
    pub methods: BTreeMap<MemberKey, String>,
}

/// Resolved rename table consumed by binary and source rewriters.
///
/// Keys are identities in the source namespace; values are display names in the target
/// namespace. Iteration is sorted by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSet {
    pair: NamespacePair,
    classes: BTreeMap<String, ClassMapping>,
}

impl MappingSet {
    pub fn new(pair: NamespacePair) -> Self {
        Self {
            pair,
            classes: BTreeMap::new(),
        }
    }

    /// Direct projection of a store between two of its namespaces
    pub fn from_store(store: &Store, from: &str, to: &str) -> Result<Self> {
        let src = store.namespace(from)?;
        let dst = store.namespace(to)?;
        let mut set = Self::new(NamespacePair::new(from, to));

        for class in store.classes() {
            let mapping = set.class_mut(class.name(src), class.name(dst));
            for field in class.fields() {
                mapping.fields.insert(
                    MemberKey::new(field.name(src), field.descriptor(src)),
                    field.name(dst).to_string(),
                );
            }
            for method in class.methods() {
                mapping.methods.insert(
                    MemberKey::new(method.name(src), method.descriptor(src)),
                    method.name(dst).to_string(),
                );
            }
        }

        log::debug!(
            "Resolved {} mapping set with {} entries",
            set.pair,
            set.entry_count()
        );
        Ok(set)
    }

    pub fn pair(&self) -> &NamespacePair {
        &self.pair
    }

    /// Get or create the entry for `obfuscated`, setting its target name
    pub fn class_mut(&mut self, obfuscated: &str, deobfuscated: &str) -> &mut ClassMapping {
        let entry = self
            .classes
            .entry(obfuscated.to_string())
            .or_insert_with(ClassMapping::default);
        entry.deobfuscated = deobfuscated.to_string();
        entry
    }

    pub fn set_field(&mut self, owner: &str, key: MemberKey, target: impl Into<String>) {
        let class = self
            .classes
            .entry(owner.to_string())
            .or_insert_with(|| ClassMapping {
                deobfuscated: owner.to_string(),
                ..ClassMapping::default()
            });
        class.fields.insert(key, target.into());
    }

    pub fn set_method(&mut self, owner: &str, key: MemberKey, target: impl Into<String>) {
        let class = self
            .classes
            .entry(owner.to_string())
            .or_insert_with(|| ClassMapping {
                deobfuscated: owner.to_string(),
                ..ClassMapping::default()
            });
        class.methods.insert(key, target.into());
    }

    pub fn class(&self, obfuscated: &str) -> Option<&ClassMapping> {
        self.classes.get(obfuscated)
    }

    /// Target name of a class, if mapped
    pub fn class_name(&self, obfuscated: &str) -> Option<&str> {
        self.classes.get(obfuscated).map(|c| c.deobfuscated.as_str())
    }

    pub fn field_name(&self, owner: &str, name: &str, descriptor: &str) -> Option<&str> {
        self.classes
            .get(owner)?
            .fields
            .get(&MemberKey::new(name, descriptor))
            .map(String::as_str)
    }

    pub fn method_name(&self, owner: &str, name: &str, descriptor: &str) -> Option<&str> {
        self.classes
            .get(owner)?
            .methods
            .get(&MemberKey::new(name, descriptor))
            .map(String::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &ClassMapping)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Classes plus fields plus methods
    pub fn entry_count(&self) -> usize {
        self.classes
            .values()
            .map(|c| 1 + c.fields.len() + c.methods.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "tiny\t2\t0\tintermediary\tnamed\n\
                       c\tclass_1\tBlock\n\
                       \tf\tLclass_1;\tfield_1\tparent\n\
                       \tm\t(I)Lclass_1;\tmethod_1\tgetNeighbor\n";

    #[test]
    fn projects_store_between_namespaces() {
        let store = Store::load(DOC).unwrap();
        let set = MappingSet::from_store(&store, "intermediary", "named").unwrap();
        assert_eq!(set.class_name("class_1"), Some("Block"));
        assert_eq!(
            set.field_name("class_1", "field_1", "Lclass_1;"),
            Some("parent")
        );
        assert_eq!(
            set.method_name("class_1", "method_1", "(I)Lclass_1;"),
            Some("getNeighbor")
        );
        assert_eq!(set.entry_count(), 3);
    }

    #[test]
    fn reverse_projection_uses_target_descriptors() {
        let store = Store::load(DOC).unwrap();
        let set = MappingSet::from_store(&store, "named", "intermediary").unwrap();
        assert_eq!(
            set.method_name("Block", "getNeighbor", "(I)LBlock;"),
            Some("method_1")
        );
    }

    #[test]
    fn unknown_namespace_fails() {
        let store = Store::load(DOC).unwrap();
        assert!(MappingSet::from_store(&store, "official", "named").is_err());
    }

    #[test]
    fn member_for_unmapped_owner_keeps_owner_name() {
        let mut set = MappingSet::new(NamespacePair::new("a", "b"));
        set.set_method("Foo", MemberKey::new("run", "()V"), "execute");
        assert_eq!(set.class_name("Foo"), Some("Foo"));
        assert_eq!(set.method_name("Foo", "run", "()V"), Some("execute"));
    }
}
