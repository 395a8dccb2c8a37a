use crate::normalize::dedupe;
use serde::{Deserialize, Serialize};

/// Index of a node inside its [`PageTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// One fetched and parsed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageNode {
    pub url: String,
    pub depth_budget: usize,
    #[serde(skip)]
    pub raw_html: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub outbound_urls: Vec<String>,
    pub children: Vec<NodeId>,
    pub rank: Option<f64>,
    pub aggregated_urls: Vec<String>,
}

impl PageNode {
    /// Outbound links that did not become a child, either because their build
    /// failed or because the page budget ran out first.
    pub fn unexpanded_count(&self) -> usize {
        if self.depth_budget == 0 {
            0
        } else {
            self.outbound_urls.len().saturating_sub(self.children.len())
        }
    }
}

/// Arena of every node built from one seed URL. The root is always index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawPageTree")]
pub struct PageTree {
    nodes: Vec<PageNode>,
}

#[derive(Deserialize)]
struct RawPageTree {
    nodes: Vec<PageNode>,
}

impl TryFrom<RawPageTree> for PageTree {
    type Error = String;

    /// Children must point forward to an existing node, as `push_child` does.
    fn try_from(raw: RawPageTree) -> Result<Self, Self::Error> {
        if raw.nodes.is_empty() {
            return Err("page tree has no root node".to_string());
        }
        for (index, node) in raw.nodes.iter().enumerate() {
            if let Some(child) = node
                .children
                .iter()
                .find(|child| child.0 <= index || child.0 >= raw.nodes.len())
            {
                return Err(format!(
                    "node {} has invalid child index {}",
                    index, child.0
                ));
            }
        }
        Ok(Self { nodes: raw.nodes })
    }
}

impl PageTree {
    pub(crate) fn with_root(root: PageNode) -> Self {
        Self { nodes: vec![root] }
    }

    pub(crate) fn push_child(&mut self, parent: NodeId, child: PageNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(child);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Fills `aggregated_urls` of every node from its direct children.
    pub(crate) fn aggregate(&mut self) {
        for index in 0..self.nodes.len() {
            let node = &self.nodes[index];
            let merged = node.outbound_urls.iter().chain(
                node.children
                    .iter()
                    .flat_map(|child| self.nodes[child.0].outbound_urls.iter()),
            );
            let aggregated = dedupe(merged.cloned());
            self.nodes[index].aggregated_urls = aggregated;
        }
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root(&self) -> &PageNode {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> Option<&PageNode> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &PageNode> {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|child| &self.nodes[child.0])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order walk yielding `(level, node)`, root at level 0.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: vec![(0, self.root_id())],
        }
    }

    /// Unexpanded outbound links across the whole tree.
    pub fn unexpanded_count(&self) -> usize {
        self.nodes.iter().map(PageNode::unexpanded_count).sum()
    }
}

pub struct DepthFirst<'a> {
    tree: &'a PageTree,
    stack: Vec<(usize, NodeId)>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a PageNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (level, id) = self.stack.pop()?;
        let node = self.tree.get(id)?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (level + 1, *child)));
        Some((level, node))
    }
}
