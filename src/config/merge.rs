//! Deep merge of configuration nodes.
//!
//! Merging walks the source's fields in order:
//! - Key missing in the target: assigned
//! - Both sides hold nodes: merged recursively, in place
//! - Anything else (scalars, tuples, node vs scalar): source value replaces the target's
//!
//! A mapping source is first built into a scratch node carrying the target's
//! key filter, so both source shapes follow the same precedence rules.
//!
//! The whole merge is planned before the first write. A merge rejected for
//! any reason leaves every node it touches as it was.

use crate::error::{ConfigError, Result};
use crate::node::{ConfigNode, NodeId, PendingEdges};
use crate::value::{Input, Value};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Merge `source` (a node or a mapping) into `target`.
pub(crate) fn update(target: &ConfigNode, source: Input) -> Result<()> {
    match source {
        Input::Node(source) => update_from_node(target, &source),
        Input::Map(entries) => update_from_map(target, entries),
        other => Err(ConfigError::InvalidUpdateSource(other.kind_name())),
    }
}

fn update_from_map(target: &ConfigNode, entries: Vec<(String, Input)>) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let scratch = ConfigNode::new(target.key_filter());
    for (key, value) in entries {
        scratch.set(&key, value)?;
    }
    update_from_node(target, &scratch)
}

fn update_from_node(target: &ConfigNode, source: &ConfigNode) -> Result<()> {
    let mut plan = MergePlan::default();
    plan.ensure_disjoint(target, source)?;
    plan.merge(target, source)?;
    plan.apply()
}

/// Writes of one merge, staged and cycle-checked before any is applied.
///
/// Reads go through the staged values and reachability follows the staged
/// references, so later steps see the tree as earlier steps left it.
#[derive(Default)]
struct MergePlan {
    writes: Vec<(ConfigNode, String, Value)>,
    staged: HashMap<(NodeId, String), Value>,
    pending: PendingEdges,
}

impl MergePlan {
    /// Neither node may be reachable from the other.
    fn ensure_disjoint(&self, target: &ConfigNode, source: &ConfigNode) -> Result<()> {
        if target.would_create_cycle_with(source, &self.pending)
            || source.would_create_cycle_with(target, &self.pending)
        {
            return Err(ConfigError::recursive_update());
        }
        Ok(())
    }

    fn field(&self, node: &ConfigNode, key: &str) -> Option<Value> {
        self.staged
            .get(&(node.id(), key.to_string()))
            .cloned()
            .or_else(|| node.get(key))
    }

    /// Fields of `node` as they will read once the staged writes land.
    fn fields(&self, node: &ConfigNode) -> Vec<(String, Value)> {
        let mut fields: IndexMap<String, Value> = node.iter().collect();
        for (owner, key, value) in &self.writes {
            if owner.ptr_eq(node) {
                fields.insert(key.clone(), value.clone());
            }
        }
        fields.into_iter().collect()
    }

    fn merge(&mut self, target: &ConfigNode, source: &ConfigNode) -> Result<()> {
        for (key, value) in self.fields(source) {
            let current = self.field(target, &key);
            if let (Some(Value::Node(existing)), Value::Node(incoming)) = (&current, &value) {
                // Merging a node into itself changes nothing.
                if !existing.ptr_eq(incoming) {
                    self.ensure_disjoint(existing, incoming)?;
                    self.merge(existing, incoming)?;
                }
                continue;
            }
            self.stage(target, key, value)?;
        }
        Ok(())
    }

    fn stage(&mut self, target: &ConfigNode, key: String, value: Value) -> Result<()> {
        if !target.admits(&key)? {
            return Ok(());
        }
        let mut nodes = Vec::new();
        value.collect_nodes(&mut nodes);
        if nodes
            .iter()
            .any(|node| target.would_create_cycle_with(node, &self.pending))
        {
            return Err(ConfigError::recursive(&key));
        }
        for node in &nodes {
            self.pending.add(target, node);
        }
        self.staged.insert((target.id(), key.clone()), value.clone());
        self.writes.push((target.clone(), key, value));
        Ok(())
    }

    /// Every staged reference was checked against a superset of the real
    /// graph, so the writes below cannot close a cycle.
    fn apply(self) -> Result<()> {
        for (target, key, value) in self.writes {
            target.set_value(&key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::validate::{allow_all, allow_upper};

    fn node() -> ConfigNode {
        ConfigNode::new(allow_all())
    }

    fn node_with(entries: &[(&str, i64)]) -> ConfigNode {
        let n = node();
        for (k, v) in entries {
            n.set(k, *v).unwrap();
        }
        n
    }

    #[test]
    fn test_merge_into_empty() {
        let source = node_with(&[("a", 1), ("b", 2)]);
        let target = node();
        update(&target, Input::from(&source)).unwrap();
        assert_eq!(target.get("a"), Some(Value::Int(1)));
        assert_eq!(target.get("b"), Some(Value::Int(2)));
    }

    #[test]
    fn test_scalar_override() {
        let source = node_with(&[("a", 1), ("b", 2)]);
        let target = node_with(&[("a", 2)]);
        update(&target, Input::from(&source)).unwrap();
        assert_eq!(target.get("a"), Some(Value::Int(1)));
    }

    #[test]
    fn test_disjoint_union_keeps_order() {
        let target = node_with(&[("x", 1), ("y", 2)]);
        let source = node_with(&[("z", 3)]);
        update(&target, Input::from(&source)).unwrap();
        assert_eq!(target.keys(), vec!["x", "y", "z"]);
        assert_eq!(target.get("x"), Some(Value::Int(1)));
        assert_eq!(target.get("z"), Some(Value::Int(3)));
    }

    #[test]
    fn test_nested_nodes_deep_merge() {
        let target = node();
        target.set("a", Input::map([("b", 1)])).unwrap();
        let before = target.get("a").unwrap();
        let source = node();
        source.set("a", Input::map([("c", 2)])).unwrap();

        update(&target, Input::from(&source)).unwrap();

        let after = target.get("a").unwrap();
        // Merged in place: same sub-node, both keys visible.
        assert_eq!(before, after);
        let sub = after.as_node().unwrap();
        assert_eq!(sub.get("b"), Some(Value::Int(1)));
        assert_eq!(sub.get("c"), Some(Value::Int(2)));
    }

    #[test]
    fn test_tuples_replaced_not_merged() {
        let target = node();
        target.set("items", vec![1, 2, 3]).unwrap();
        let source = node();
        source.set("items", vec![4]).unwrap();
        update(&target, Input::from(&source)).unwrap();
        assert_eq!(target.get("items"), Some(Value::Tuple(vec![Value::Int(4)])));
    }

    #[test]
    fn test_node_replaces_scalar_and_back() {
        let target = node_with(&[("a", 1)]);
        let sub = node_with(&[("b", 1)]);
        update(&target, Input::map([("a", &sub)])).unwrap();
        assert_eq!(target.get("a"), Some(Value::Node(sub.clone())));
        assert_eq!(target.contained_count(&sub), 1);

        update(&target, Input::map([("a", 1)])).unwrap();
        assert_eq!(target.get("a"), Some(Value::Int(1)));
        assert_eq!(target.contained_count(&sub), 0);
    }

    #[test]
    fn test_update_from_nested_mapping() {
        let target = node();
        update(&target, Input::map([("a", Input::map([("b", 1)]))])).unwrap();
        let a = target.get("a").unwrap();
        assert_eq!(a.as_node().unwrap().get("b"), Some(Value::Int(1)));
    }

    #[test]
    fn test_empty_mapping_is_noop() {
        let target = node_with(&[("a", 1)]);
        update(&target, Input::Map(vec![])).unwrap();
        assert_eq!(target.len(), 1);
    }

    #[test]
    fn test_invalid_source() {
        let target = node();
        let err = update(&target, Input::Int(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        let err = update(&target, Input::list([1])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn test_source_containing_target_rejected() {
        let c = node();
        let d = node();
        d.set("m", &c).unwrap();
        let err = update(&c, Input::from(&d)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recursion);
    }

    #[test]
    fn test_source_containing_target_in_tuple_rejected() {
        let c = node();
        let d = node();
        let e = node();
        e.set("m", &c).unwrap();
        d.set("m", (e.clone(),)).unwrap();
        let err = update(&c, Input::from(&d)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recursion);
        assert!(c.is_empty());
    }

    #[test]
    fn test_target_containing_source_rejected() {
        let c = node();
        let d = node();
        c.set("m", &d).unwrap();
        let err = update(&c, Input::from(&d)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recursion);
    }

    #[test]
    fn test_self_merge_rejected() {
        let c = node_with(&[("a", 1)]);
        let err = update(&c, Input::from(&c)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recursion);
    }

    #[test]
    fn test_nested_cycle_rejected_before_any_write() {
        // target.a = y, source.a = x, x.b = y: merging x into y would loop.
        let y = node();
        let x = node();
        x.set("b", &y).unwrap();
        let target = node();
        target.set("a", &y).unwrap();
        let source = node();
        source.set("first", 1).unwrap();
        source.set("a", &x).unwrap();

        let err = update(&target, Input::from(&source)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recursion);
        assert!(!target.contains("first"));
        assert!(y.is_empty());
    }

    #[test]
    fn test_cycle_formed_by_sibling_writes_leaves_tree_unchanged() {
        // Writing e2 under e1 and then e1 under e2 would close a loop.
        let e1 = node();
        let e2 = node();
        let target = node();
        target.set("k1", &e1).unwrap();
        target.set("k2", &e2).unwrap();
        let source = node();
        source.set("k1", Input::map([("f", &e2)])).unwrap();
        source.set("k2", Input::map([("g", &e1)])).unwrap();

        let err = update(&target, Input::from(&source)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recursion);
        assert!(!e1.contains("f"));
        assert!(!e2.contains("g"));
        assert_eq!(e1.contained_count(&e2), 0);
        assert_eq!(target.keys(), vec!["k1", "k2"]);
    }

    #[test]
    fn test_later_step_sees_earlier_writes() {
        // Both keys reach the same sub-node: the second merge lands on the
        // node the first one assigned.
        let shared = node();
        let target = node();
        target.set("a", &shared).unwrap();
        target.set("b", &shared).unwrap();
        let source = node();
        source.set("a", Input::map([("x", Input::map([("p", 1)]))])).unwrap();
        source.set("b", Input::map([("x", Input::map([("q", 2)]))])).unwrap();

        update(&target, Input::from(&source)).unwrap();

        let x = shared.get("x").unwrap();
        let x = x.as_node().unwrap();
        assert_eq!(x.get("p"), Some(Value::Int(1)));
        assert_eq!(x.get("q"), Some(Value::Int(2)));
        assert_eq!(shared.contained_count(x), 1);
    }

    #[test]
    fn test_invalid_key_in_source_mapping_rejected_before_write() {
        let target = node_with(&[("a", 1)]);
        let err = update(&target, Input::map([("b", Input::Int(2)), ("1bad", Input::Int(3))]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Name);
        assert!(!target.contains("b"));
    }

    #[test]
    fn test_shared_sub_node_merges_as_noop() {
        let shared = node_with(&[("v", 1)]);
        let target = node();
        target.set("s", &shared).unwrap();
        let source = node();
        source.set("s", &shared).unwrap();
        update(&target, Input::from(&source)).unwrap();
        assert_eq!(target.get("s"), Some(Value::Node(shared.clone())));
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn test_target_filter_applies_to_mapping_source() {
        let target = ConfigNode::new(allow_upper());
        update(
            &target,
            Input::map([
                ("KEEP", Input::Int(1)),
                ("drop", Input::Int(2)),
                ("SUB", Input::map([("INNER", 1), ("inner", 2)])),
            ]),
        )
        .unwrap();
        assert!(target.contains("KEEP"));
        assert!(!target.contains("drop"));
        let sub = target.get("SUB").unwrap();
        let sub = sub.as_node().unwrap();
        assert!(sub.contains("INNER"));
        assert!(!sub.contains("inner"));
    }
}
