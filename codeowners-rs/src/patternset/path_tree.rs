use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NodeId(pub(crate) usize);

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) children: HashMap<String, NodeId>,
    // Full paths that end at this node
    pub(crate) paths: Vec<String>,
}

impl Node {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            paths: Vec::new(),
        }
    }
}

/// Trie of `/`-separated repository paths, keyed by segment.
#[derive(Debug)]
pub(crate) struct PathTree {
    nodes: Vec<Node>,
}

impl PathTree {
    pub(crate) const ROOT: NodeId = NodeId(0);

    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node::new()],
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn insert(&mut self, path: &str) {
        let mut current = Self::ROOT;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = match self.nodes[current.0].children.get(segment) {
                Some(&child) => child,
                None => {
                    let child = NodeId(self.nodes.len());
                    self.nodes.push(Node::new());
                    self.nodes[current.0]
                        .children
                        .insert(segment.to_owned(), child);
                    child
                }
            };
        }
        self.nodes[current.0].paths.push(path.to_owned());
    }
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}
