use crate::error::{AccessError, Result};
use crate::types::{AccessSpecification, MemberRef};
use mapweave_mappings::{remap_descriptor, MemberDef, Named, NamespaceId, Store};
use std::collections::HashMap;

/// Source-namespace member identity to target-namespace member identity
type MemberTable = HashMap<MemberRef, MemberRef>;

/// Translates access overrides between two namespaces of one [`Store`].
///
/// Class, field and method tables are built once in [`AccessRemapper::new`].
pub struct AccessRemapper<'a> {
    from_name: String,
    to_name: String,
    classes: HashMap<&'a str, &'a str>,
    fields: MemberTable,
    methods: MemberTable,
}

impl<'a> AccessRemapper<'a> {
    pub fn new(store: &'a Store, from: &str, to: &str) -> Result<Self> {
        let src = store.namespace(from)?;
        let dst = store.namespace(to)?;

        let mut fields = MemberTable::new();
        let mut methods = MemberTable::new();
        for class in store.classes() {
            let (owner_from, owner_to) = (class.name(src), class.name(dst));
            for def in class.fields() {
                fields.insert(member_ref(owner_from, def, src), member_ref(owner_to, def, dst));
            }
            for def in class.methods() {
                methods.insert(member_ref(owner_from, def, src), member_ref(owner_to, def, dst));
            }
        }

        Ok(Self {
            from_name: from.to_string(),
            to_name: to.to_string(),
            classes: store.class_names(src, dst),
            fields,
            methods,
        })
    }

    pub fn remap(&self, spec: &AccessSpecification) -> Result<AccessSpecification> {
        if spec.namespace() != self.from_name {
            return Err(AccessError::NamespaceMismatch {
                expected: self.from_name.clone(),
                found: spec.namespace().to_string(),
            });
        }

        let mut out = AccessSpecification::new(self.to_name.as_str());
        for (name, level) in spec.classes() {
            out.add_class(self.class(name)?, level)?;
        }
        for (member, level) in spec.methods() {
            out.add_method(self.member(&self.methods, member)?, level)?;
        }
        for (member, level) in spec.fields() {
            out.add_field(self.member(&self.fields, member)?, level)?;
        }

        log::debug!(
            "Remapped {} access entries {} -> {}",
            out.len(),
            self.from_name,
            self.to_name
        );
        Ok(out)
    }

    fn class(&self, name: &str) -> Result<&'a str> {
        self.classes
            .get(name)
            .copied()
            .ok_or_else(|| AccessError::unresolved(name, &self.from_name, &self.to_name))
    }

    /// Members absent from the store keep their name; owner and descriptor still translate
    fn member(&self, table: &MemberTable, member: &MemberRef) -> Result<MemberRef> {
        if let Some(target) = table.get(member) {
            return Ok(target.clone());
        }
        let owner = self.class(&member.owner)?;
        let descriptor =
            remap_descriptor(&member.descriptor, |class| self.classes.get(class).copied())?;
        Ok(MemberRef::new(owner, member.name.as_str(), descriptor))
    }
}

fn member_ref(owner: &str, def: &MemberDef, ns: NamespaceId) -> MemberRef {
    MemberRef::new(owner, def.name(ns), def.descriptor(ns))
}

/// Re-key `spec` into namespace `target` using the class and member tables of `store`.
///
/// Returns a copy of `spec` when it is already in `target`.
pub fn remap(spec: &AccessSpecification, store: &Store, target: &str) -> Result<AccessSpecification> {
    if spec.namespace() == target {
        return Ok(spec.clone());
    }
    log::info!(":remapping access specification {} -> {}", spec.namespace(), target);
    AccessRemapper::new(store, spec.namespace(), target)?.remap(spec)
}
