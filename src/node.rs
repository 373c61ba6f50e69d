//! The configuration node.
//!
//! A [`ConfigNode`] is a shared handle to an ordered map of fields plus the
//! bookkeeping needed to keep the tree acyclic. Handles are cheap to clone
//! and compare by identity: two handles are equal only when they refer to
//! the same node.
//!
//! Each node keeps a ledger of the nodes referenced from its fields (at any
//! tuple depth), counted once per field path, plus itself. Reachability is
//! answered by walking ledgers, so every mutation path below keeps the
//! ledger exact.
//!
//! Nodes are single-threaded (`Rc`/`RefCell`); callers needing shared
//! access across threads must serialize it themselves.

use crate::error::{ConfigError, Result};
use crate::validate::{KeyFilter, ensure_key};
use crate::value::{Input, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

type Shared = Rc<RefCell<NodeState>>;

/// Identity of a node (address of its shared state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

/// Ledger entry: how many field paths of the owner reference `node`.
struct Contained {
    node: Weak<RefCell<NodeState>>,
    count: usize,
}

struct NodeState {
    fields: IndexMap<String, Value>,
    contained: HashMap<NodeId, Contained>,
    key_filter: KeyFilter,
}

impl NodeState {
    fn retain(&mut self, node: &ConfigNode) {
        match self.contained.entry(node.id()) {
            Entry::Occupied(mut entry) => entry.get_mut().count += 1,
            Entry::Vacant(entry) => {
                entry.insert(Contained {
                    node: Rc::downgrade(&node.state),
                    count: 1,
                });
            }
        }
    }

    fn release(&mut self, node: &ConfigNode) {
        if let Entry::Occupied(mut entry) = self.contained.entry(node.id()) {
            entry.get_mut().count -= 1;
            if entry.get().count == 0 {
                entry.remove();
            }
        }
    }
}

/// References a multi-step mutation will add, keyed by the node receiving
/// them. Lets a batch of writes be cycle-checked before any is applied.
#[derive(Default)]
pub(crate) struct PendingEdges {
    edges: HashMap<NodeId, Vec<ConfigNode>>,
}

impl PendingEdges {
    pub(crate) fn add(&mut self, parent: &ConfigNode, child: &ConfigNode) {
        self.edges.entry(parent.id()).or_default().push(child.clone());
    }

    fn below(&self, parent: NodeId) -> &[ConfigNode] {
        self.edges.get(&parent).map(Vec::as_slice).unwrap_or_default()
    }
}

/// A configuration tree node.
///
/// Created through [`Config`](crate::Config); fields are read and written
/// through the accessor methods below.
#[derive(Clone)]
pub struct ConfigNode {
    state: Shared,
}

impl ConfigNode {
    pub(crate) fn new(key_filter: KeyFilter) -> Self {
        let node = Self {
            state: Rc::new(RefCell::new(NodeState {
                fields: IndexMap::new(),
                contained: HashMap::new(),
                key_filter,
            })),
        };
        // A node always contains itself.
        node.state.borrow_mut().retain(&node);
        node
    }

    pub(crate) fn id(&self) -> NodeId {
        NodeId(Rc::as_ptr(&self.state) as *const () as usize)
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &ConfigNode) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// The key filter this node (and sub-nodes it creates) applies.
    pub fn key_filter(&self) -> KeyFilter {
        Rc::clone(&self.state.borrow().key_filter)
    }

    /// Number of field paths referencing `node` from this node, counting
    /// the implicit self entry.
    pub fn contained_count(&self, node: &ConfigNode) -> usize {
        self.state
            .borrow()
            .contained
            .get(&node.id())
            .map_or(0, |entry| entry.count)
    }

    /// Whether assigning `candidate` into this node would close a cycle,
    /// i.e. this node is already reachable from `candidate`.
    pub fn would_create_cycle(&self, candidate: &ConfigNode) -> bool {
        self.would_create_cycle_with(candidate, &PendingEdges::default())
    }

    /// Same as [`would_create_cycle`](Self::would_create_cycle), also
    /// following references that `pending` has not written yet.
    pub(crate) fn would_create_cycle_with(
        &self,
        candidate: &ConfigNode,
        pending: &PendingEdges,
    ) -> bool {
        let target = self.id();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<ConfigNode> = VecDeque::new();
        queue.push_back(candidate.clone());

        while let Some(current) = queue.pop_front() {
            let current_id = current.id();
            if current_id == target {
                return true;
            }
            if !visited.insert(current_id) {
                continue;
            }

            let state = current.state.borrow();
            for (id, entry) in &state.contained {
                if *id == current_id || visited.contains(id) {
                    continue;
                }
                if let Some(state) = entry.node.upgrade() {
                    queue.push_back(ConfigNode { state });
                }
            }
            for node in pending.below(current_id) {
                if !visited.contains(&node.id()) {
                    queue.push_back(node.clone());
                }
            }
        }

        false
    }

    /// Validate `key` and consult the key filter.
    ///
    /// Returns `Ok(false)` when the filter drops the key.
    pub(crate) fn admits(&self, key: &str) -> Result<bool> {
        ensure_key(key)?;
        // The filter may touch this node, so no borrow is held across the call.
        let filter = self.key_filter();
        let accepted = filter(key);
        if !accepted {
            trace!(key, "key rejected by filter");
        }
        Ok(accepted)
    }

    /// Assign `value` to `key`.
    ///
    /// Lists become tuples and mappings become sub-nodes built with this
    /// node's key filter. Fails without mutating when the key is invalid,
    /// the value kind is unsupported, or the assignment would make this
    /// node reachable from itself. A key rejected by the filter is ignored.
    pub fn set(&self, key: &str, value: impl Into<Input>) -> Result<()> {
        if !self.admits(key)? {
            return Ok(());
        }
        let value = self.coerce(value.into())?;
        self.store(key, value)
    }

    /// Assign an already coerced value.
    pub(crate) fn set_value(&self, key: &str, value: Value) -> Result<()> {
        if !self.admits(key)? {
            return Ok(());
        }
        self.store(key, value)
    }

    fn coerce(&self, input: Input) -> Result<Value> {
        Ok(match input {
            Input::None => Value::None,
            Input::Bool(b) => Value::Bool(b),
            Input::Int(i) => Value::Int(i),
            Input::Float(f) => Value::Float(f),
            Input::Str(s) => Value::Str(s),
            Input::Bytes(b) => Value::Bytes(b),
            Input::List(items) | Input::Tuple(items) => Value::Tuple(
                items
                    .into_iter()
                    .map(|item| self.coerce(item))
                    .collect::<Result<_>>()?,
            ),
            Input::Map(entries) => {
                let node = ConfigNode::new(self.key_filter());
                for (key, value) in entries {
                    node.set(&key, value)?;
                }
                Value::Node(node)
            }
            Input::Node(node) => Value::Node(node),
            Input::Unsupported(type_name) => return Err(ConfigError::UnsupportedType(type_name)),
        })
    }

    fn store(&self, key: &str, value: Value) -> Result<()> {
        let mut nodes = Vec::new();
        value.collect_nodes(&mut nodes);
        if nodes.iter().any(|node| self.would_create_cycle(node)) {
            return Err(ConfigError::recursive(key));
        }

        let mut state = self.state.borrow_mut();
        for node in &nodes {
            state.retain(node);
        }
        if let Some(previous) = state.fields.insert(key.to_string(), value) {
            let mut released = Vec::new();
            previous.collect_nodes(&mut released);
            for node in &released {
                state.release(node);
            }
        }
        Ok(())
    }

    /// Remove `key`, releasing the nodes its value referenced.
    pub fn pop(&self, key: &str) -> Option<Value> {
        let mut state = self.state.borrow_mut();
        let previous = state.fields.shift_remove(key)?;
        let mut released = Vec::new();
        previous.collect_nodes(&mut released);
        for node in &released {
            state.release(node);
        }
        Some(previous)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.borrow().fields.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.borrow().fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().fields.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.borrow().fields.keys().cloned().collect()
    }

    /// Snapshot of `(key, value)` pairs in field order.
    pub fn iter(&self) -> std::vec::IntoIter<(String, Value)> {
        self.state
            .borrow()
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Run `f` over the fields without cloning them.
    pub(crate) fn with_fields<R>(&self, f: impl FnOnce(&IndexMap<String, Value>) -> R) -> R {
        f(&self.state.borrow().fields)
    }
}

impl PartialEq for ConfigNode {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ConfigNode {}

impl fmt::Debug for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_fields(|fields| f.debug_map().entries(fields.iter()).finish())
    }
}

impl IntoIterator for &ConfigNode {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
