use crate::error::Result;
use crate::mapping_set::{MappingSet, MemberKey};
use crate::namespace::{NamespaceId, NamespacePair};
use crate::store::{ClassDef, MemberDef, Named, Store};
use std::collections::HashMap;

/// Derives a rename table between two mapping documents that share one stable namespace.
///
/// Say `source` maps `intermediary -> named` and `target` maps `intermediary -> named2`. The
/// joiner does not produce `intermediary -> named2`: it maps every `named` identity of `source`
/// to the `named2` name that `target` gives the same `intermediary` symbol.
///
/// Members are matched by their shared-namespace name only, never by descriptor. Shared names
/// are expected to be unique across the whole document, which lets a method migrate even when
/// its signature changed between the two mapping versions. Two overloads that happen to share a
/// shared-namespace name collide into the last indexed match.
///
/// Entities with no counterpart in `target` map to their own `source` name, so the output always
/// has one entry per `source` entity.
pub struct MappingsJoiner<'a> {
    source: &'a Store,
    target: &'a Store,
    shared: String,
    source_to: String,
    target_to: String,
}

/// Counters describing one join
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub matched: usize,
    pub unmatched: usize,
}

impl<'a> MappingsJoiner<'a> {
    /// Join through `shared`, reading the `to` namespace on both sides
    pub fn new(source: &'a Store, target: &'a Store, shared: &str, to: &str) -> Self {
        Self {
            source,
            target,
            shared: shared.to_string(),
            source_to: to.to_string(),
            target_to: to.to_string(),
        }
    }

    /// Read target names from a differently-labelled namespace of the target store
    pub fn with_target_namespace(mut self, namespace: &str) -> Self {
        self.target_to = namespace.to_string();
        self
    }

    pub fn join(&self) -> Result<MappingSet> {
        self.join_with_stats().map(|(set, _)| set)
    }

    pub fn join_with_stats(&self) -> Result<(MappingSet, JoinStats)> {
        let src_shared = self.source.namespace(&self.shared)?;
        let src_to = self.source.namespace(&self.source_to)?;
        let tgt_shared = self.target.namespace(&self.shared)?;
        let tgt_to = self.target.namespace(&self.target_to)?;

        log::info!(
            ":joining mappings through `{}` ({} -> {})",
            self.shared,
            self.source_to,
            self.target_to
        );

        let index = TargetIndex::build(self.target, tgt_shared);
        let mut set = MappingSet::new(NamespacePair::new(
            self.source_to.as_str(),
            self.target_to.as_str(),
        ));
        let mut stats = JoinStats::default();

        for class in self.source.classes() {
            let source_name = class.name(src_to);
            let target_name = match index.classes.get(class.name(src_shared)) {
                Some(matched) => {
                    stats.matched += 1;
                    matched.name(tgt_to)
                }
                None => {
                    stats.unmatched += 1;
                    log::warn!("No target mapping for class {source_name}, keeping name");
                    source_name
                }
            };
            set.class_mut(source_name, target_name);

            for field in class.fields() {
                let (key, name) =
                    join_member(field, &index.fields, src_shared, src_to, tgt_to, &mut stats);
                if name.is_none() {
                    log::warn!(
                        "No target mapping for field {source_name}.{}, keeping name",
                        key.name
                    );
                }
                let name = name.unwrap_or_else(|| key.name.clone());
                set.set_field(source_name, key, name);
            }
            for method in class.methods() {
                let (key, name) =
                    join_member(method, &index.methods, src_shared, src_to, tgt_to, &mut stats);
                if name.is_none() {
                    log::warn!(
                        "No target mapping for method {source_name}.{}{}, keeping name",
                        key.name,
                        key.descriptor
                    );
                }
                let name = name.unwrap_or_else(|| key.name.clone());
                set.set_method(source_name, key, name);
            }
        }

        log::info!(
            "Joined {} entities ({} matched, {} kept their own name)",
            stats.matched + stats.unmatched,
            stats.matched,
            stats.unmatched
        );
        Ok((set, stats))
    }
}

/// Source key and the matched target name, `None` when `target` has no counterpart
fn join_member(
    member: &MemberDef,
    index: &HashMap<&str, &MemberDef>,
    src_shared: NamespaceId,
    src_to: NamespaceId,
    tgt_to: NamespaceId,
    stats: &mut JoinStats,
) -> (MemberKey, Option<String>) {
    let key = MemberKey::new(member.name(src_to), member.descriptor(src_to));
    let name = index.get(member.name(src_shared)).map(|matched| matched.name(tgt_to).to_string());
    match name {
        Some(_) => stats.matched += 1,
        None => stats.unmatched += 1,
    }
    (key, name)
}

/// Target entities keyed by their shared-namespace name
struct TargetIndex<'t> {
    classes: HashMap<&'t str, &'t ClassDef>,
    fields: HashMap<&'t str, &'t MemberDef>,
    methods: HashMap<&'t str, &'t MemberDef>,
}

impl<'t> TargetIndex<'t> {
    fn build(store: &'t Store, shared: NamespaceId) -> Self {
        let mut classes = HashMap::with_capacity(store.class_count());
        let mut fields = HashMap::with_capacity(store.field_count());
        let mut methods = HashMap::with_capacity(store.method_count());

        for class in store.classes() {
            classes.insert(class.name(shared), class);
            for field in class.fields() {
                if fields.insert(field.name(shared), field).is_some() {
                    log::debug!("Field name {} is not unique; last one wins", field.name(shared));
                }
            }
            for method in class.methods() {
                if methods.insert(method.name(shared), method).is_some() {
                    log::debug!("Method name {} is not unique; last one wins", method.name(shared));
                }
            }
        }

        Self {
            classes,
            fields,
            methods,
        }
    }
}

/// Join `source` and `target` through `shared`, reading `to` on both sides
pub fn join_mappings(
    source: &Store,
    target: &Store,
    shared: &str,
    to: &str,
) -> Result<MappingSet> {
    MappingsJoiner::new(source, target, shared, to).join()
}
