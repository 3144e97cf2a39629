//! # Node Tree
//!
//! An in-memory `NodeGraph`: nodes keyed by path, each with a table of named
//! methods backed by closures.
//!
//! Paths are relative to the tree root and carry no leading `/`.
//!
//! `NodeTree` has no loop of its own, so `InvokeMode::Deferred` runs the method
//! inline and discards its result. Wrap the tree in `Deferred` to queue those
//! calls for the host loop instead.

use std::sync::Arc;

use dashmap::DashMap;
use flexrpc::Value;

use crate::graph::DispatchError;
use crate::graph::InvokeMode;
use crate::graph::NodeGraph;
use crate::graph::Result;

type Method = Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;

/// One addressable node and its methods.
pub struct SceneNode {
    path: String,
    methods: DashMap<String, Method>,
}

impl SceneNode {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Registers `method`, replacing any method with the same name.
    pub fn method<F>(&self, name: impl Into<String>, f: F) -> &Self
    where
        F: Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
        self
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        // Clone the handler out so the shard lock is not held while it runs.
        let handler = self
            .methods
            .get(method)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DispatchError::MethodNotFound {
                path: self.path.clone(),
                method: method.to_string(),
            })?;
        handler(args)
    }
}

#[derive(Default)]
pub struct NodeTree {
    nodes: DashMap<String, Arc<SceneNode>>,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty node at `path`, or returns the node already there.
    pub fn add_node(&self, path: impl Into<String>) -> Arc<SceneNode> {
        let path = path.into();
        self.nodes
            .entry(path.clone())
            .or_insert_with(|| {
                Arc::new(SceneNode {
                    path,
                    methods: DashMap::new(),
                })
            })
            .value()
            .clone()
    }

    pub fn remove_node(&self, path: &str) -> Option<Arc<SceneNode>> {
        self.nodes.remove(path).map(|(_, node)| node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeGraph for NodeTree {
    type Node = Arc<SceneNode>;

    fn resolve(&self, path: &str) -> Result<Self::Node> {
        self.nodes
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DispatchError::NodeNotFound(path.to_string()))
    }

    fn invoke(&self, node: &Self::Node, method: &str, args: Vec<Value>, mode: InvokeMode) -> Result<Value> {
        match mode {
            InvokeMode::Immediate => node.call(method, args),
            InvokeMode::Deferred => node.call(method, args).map(|_| Value::Nil),
        }
    }
}
