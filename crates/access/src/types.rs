use crate::error::{AccessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Requested visibility for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Public,
    Protected,
    Private,
    /// Package-private
    Default,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Private => "private",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "protected" => Ok(Self::Protected),
            "private" => Ok(Self::Private),
            "default" | "package" => Ok(Self::Default),
            other => Err(format!("unknown access level `{other}`")),
        }
    }
}

/// (owner, name, descriptor) identity of a field or method
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// Access overrides keyed by symbol identity in one fixed namespace.
///
/// Adding the level a symbol already has is a no-op; adding a different one fails with
/// [`AccessError::Conflict`], whatever the insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSpecification {
    namespace: String,
    classes: BTreeMap<String, AccessLevel>,
    methods: BTreeMap<MemberRef, AccessLevel>,
    fields: BTreeMap<MemberRef, AccessLevel>,
}

impl AccessSpecification {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            classes: BTreeMap::new(),
            methods: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn add_class(&mut self, name: impl Into<String>, level: AccessLevel) -> Result<()> {
        merge_entry(&mut self.classes, name.into(), level, |n| format!("class {n}"))
    }

    pub fn add_method(&mut self, member: MemberRef, level: AccessLevel) -> Result<()> {
        merge_entry(&mut self.methods, member, level, |m| format!("method {m}"))
    }

    pub fn add_field(&mut self, member: MemberRef, level: AccessLevel) -> Result<()> {
        merge_entry(&mut self.fields, member, level, |m| format!("field {m}"))
    }

    /// Merge every entry of `other` into `self`; both must share a namespace
    pub fn merge(&mut self, other: &AccessSpecification) -> Result<()> {
        if other.namespace != self.namespace {
            return Err(AccessError::NamespaceMismatch {
                expected: self.namespace.clone(),
                found: other.namespace.clone(),
            });
        }
        for (name, level) in &other.classes {
            self.add_class(name.clone(), *level)?;
        }
        for (member, level) in &other.methods {
            self.add_method(member.clone(), *level)?;
        }
        for (member, level) in &other.fields {
            self.add_field(member.clone(), *level)?;
        }
        Ok(())
    }

    pub fn class_access(&self, name: &str) -> Option<AccessLevel> {
        self.classes.get(name).copied()
    }

    pub fn method_access(&self, member: &MemberRef) -> Option<AccessLevel> {
        self.methods.get(member).copied()
    }

    pub fn field_access(&self, member: &MemberRef) -> Option<AccessLevel> {
        self.fields.get(member).copied()
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, AccessLevel)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn methods(&self) -> impl Iterator<Item = (&MemberRef, AccessLevel)> {
        self.methods.iter().map(|(k, v)| (k, *v))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&MemberRef, AccessLevel)> {
        self.fields.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.classes.len() + self.methods.len() + self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn merge_entry<K, F>(
    map: &mut BTreeMap<K, AccessLevel>,
    key: K,
    level: AccessLevel,
    describe: F,
) -> Result<()>
where
    K: Ord,
    F: FnOnce(&K) -> String,
{
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(level);
            Ok(())
        }
        Entry::Occupied(slot) if *slot.get() == level => Ok(()),
        Entry::Occupied(slot) => Err(AccessError::Conflict {
            symbol: describe(slot.key()),
            existing: *slot.get(),
            requested: level,
        }),
    }
}
