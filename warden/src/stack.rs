//! Position tracking for the recursive walk.
//!
//! The validator keeps two independent `NodeStack`s: one over schema
//! nodes and one over document nodes. The document stack also records
//! how each frame was reached so errors can be reported with a
//! root-relative path like `^user.addresses[0].city`, and so that
//! cross-field references (`dependencies`, `excludes`) can be resolved.

use crate::node::{child_by_index, child_by_key, set_key, untag};
use serde_yaml::{Mapping, Value};

/// One step from a parent node to a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

impl PathStep {
    fn render(&self, prefix: &mut String) {
        match self {
            PathStep::Key(key) => {
                if prefix.as_str() != "^" {
                    prefix.push('.');
                }
                prefix.push_str(key);
            }
            PathStep::Index(i) => {
                prefix.push_str(&format!("[{i}]"));
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    node: Option<Value>,
    step: Option<PathStep>,
    /// Whether popping with `pop_into_parent` writes the node back.
    attached: bool,
}

/// A stack of nodes mirroring the recursion depth.
///
/// Not strictly a stack: `peek(level)` reaches below the top.
#[derive(Debug, Clone, Default)]
pub struct NodeStack {
    frames: Vec<Frame>,
}

impl NodeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the stack and start over at `node`.
    pub fn reset(&mut self, node: Option<Value>) {
        self.frames.clear();
        self.frames.push(Frame {
            node,
            step: None,
            attached: false,
        });
    }

    /// Descend into the current mapping under `key`. A missing key yields
    /// an undefined placeholder.
    pub fn push_key(&mut self, key: &str) {
        let node = child_by_key(self.peek(0), key).cloned();
        self.frames.push(Frame {
            node,
            step: Some(PathStep::Key(key.to_string())),
            attached: true,
        });
    }

    /// Descend into the current sequence at `index`.
    pub fn push_index(&mut self, index: usize) {
        let node = child_by_index(self.peek(0), index).cloned();
        self.frames.push(Frame {
            node,
            step: Some(PathStep::Index(index)),
            attached: true,
        });
    }

    /// Push a node that does not live in the parent (a mapping key being
    /// validated as a value, or a schema fragment).
    pub fn push_node(&mut self, node: Option<Value>, step: Option<PathStep>) {
        self.frames.push(Frame {
            node,
            step,
            attached: false,
        });
    }

    /// Pop the top frame and hand back its node.
    pub fn pop(&mut self) -> Option<Value> {
        self.frames.pop().and_then(|frame| frame.node)
    }

    /// Pop the top frame and store its (possibly rewritten) node back
    /// into the parent at the step it was reached by.
    pub fn pop_into_parent(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let (Some(node), Some(step), true) = (frame.node, frame.step, frame.attached) else {
            return;
        };
        let Some(parent) = self.frames.last_mut() else {
            return;
        };
        match step {
            PathStep::Key(key) => {
                if matches!(parent.node, None | Some(Value::Null)) {
                    parent.node = Some(Value::Mapping(Mapping::new()));
                }
                if let Some(Value::Mapping(map)) = parent.node.as_mut() {
                    set_key(map, &key, node);
                }
            }
            PathStep::Index(i) => {
                if let Some(Value::Sequence(items)) = parent.node.as_mut() {
                    if let Some(slot) = items.get_mut(i) {
                        *slot = node;
                    }
                }
            }
        }
    }

    /// The node `level` frames below the top (0 = current).
    pub fn peek(&self, level: usize) -> Option<&Value> {
        self.frame(level).and_then(|frame| frame.node.as_ref())
    }

    /// Mutable access to the node slot `level` frames below the top.
    pub fn peek_mut(&mut self, level: usize) -> Option<&mut Option<Value>> {
        let len = self.frames.len();
        if level >= len {
            return None;
        }
        Some(&mut self.frames[len - 1 - level].node)
    }

    /// Replace the node at the top of the stack.
    pub fn replace_top(&mut self, node: Option<Value>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.node = node;
        }
    }

    pub fn root(&self) -> Option<&Value> {
        self.frames.first().and_then(|frame| frame.node.as_ref())
    }

    /// Take the root node out, leaving an undefined root behind.
    pub fn take_root(&mut self) -> Option<Value> {
        self.frames.first_mut().and_then(|frame| frame.node.take())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Render the accumulated steps, prefixed by the root marker `^`.
    pub fn string_path(&self) -> String {
        let mut path = String::from("^");
        for step in self.frames.iter().filter_map(|frame| frame.step.as_ref()) {
            step.render(&mut path);
        }
        path
    }

    /// Resolve a cross-field reference relative to the node `level`
    /// frames below the top.
    ///
    /// `^a.b` restarts at the document root, `a.b` descends into mappings,
    /// `[2]` descends into a sequence and an empty key returns the start node.
    pub fn path_lookup(&self, key: &str, level: usize) -> Option<&Value> {
        self.resolve(key, self.peek(level))
    }

    fn frame(&self, level: usize) -> Option<&Frame> {
        let len = self.frames.len();
        if level >= len {
            return None;
        }
        self.frames.get(len - 1 - level)
    }

    fn resolve<'a>(&'a self, key: &str, node: Option<&'a Value>) -> Option<&'a Value> {
        if let Some(rest) = key.strip_prefix('^') {
            return self.resolve(rest, self.root());
        }
        if key.is_empty() {
            return node.map(untag);
        }
        if let Some(rest) = key.strip_prefix('[') {
            let close = rest.find(']')?;
            let index = rest[..close].parse::<usize>().ok()?;
            let tail = &rest[close + 1..];
            let tail = tail.strip_prefix('.').unwrap_or(tail);
            return self.resolve(tail, child_by_index(node, index));
        }
        match key.find(|c| c == '.' || c == '[') {
            Some(pos) => {
                let (head, tail) = key.split_at(pos);
                let tail = tail.strip_prefix('.').unwrap_or(tail);
                self.resolve(tail, child_by_key(node, head))
            }
            None => child_by_key(node, key),
        }
    }
}
