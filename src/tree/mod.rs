//! Hierarchical view index for the currently displayed image.
//!
//! The tree mirrors the displayed image's shape list: top-level category
//! nodes group shape nodes in first-seen category order, and each shape
//! node's nested parts are grouped into nested category nodes the same
//! way. The index is rebuilt (or patched) whenever the displayed image
//! changes and is authoritative only for that image;
//! [`ObjectTree::extract_shapes`] is the exact inverse of
//! [`ObjectTree::rebuild_for_image`] and is the write-back path to the
//! data model.
//!
//! Nodes live in an index arena, so reparenting is pointer surgery on
//! child lists rather than moves of owned subtrees. Slots of removed
//! nodes are tombstoned; a rebuild resets the arena.

use crate::model::ShapeData;

/// Index of a node in the tree's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Why a drag-and-drop reparent was rejected. No mutation occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReparentRejection {
    /// Drops land on shape nodes or on the root, never on category nodes.
    TargetIsCategory,
    /// A node cannot be dropped onto itself.
    TargetIsDragged,
    /// A node cannot be dropped into its own subtree.
    TargetInsideDragged,
    /// The drop would recreate the current structure.
    NoOpDrop,
    /// The dragged or target node does not exist (already removed).
    UnknownNode,
}

/// A comparable structural view of the tree, used to check the
/// reconstruction round-trip property.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeSnapshot {
    Category {
        name: String,
        children: Vec<TreeSnapshot>,
    },
    Shape {
        category: String,
        sequence_id: usize,
        toggled_on: bool,
        children: Vec<TreeSnapshot>,
    },
}

#[derive(Clone, Debug)]
enum NodeKind {
    Category {
        name: String,
    },
    Shape {
        /// The shape record, with `parts` held as child nodes instead.
        shape: ShapeData,
        sequence_id: usize,
        toggled_on: bool,
    },
}

#[derive(Clone, Debug)]
struct Node {
    /// `None` means the node hangs off the (invisible) root.
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// The view index itself.
#[derive(Clone, Debug, Default)]
pub struct ObjectTree {
    nodes: Vec<Option<Node>>,
    root_children: Vec<NodeId>,
}

impl ObjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the tree from an image's shape list.
    ///
    /// Shapes are grouped by category in order of each category's first
    /// occurrence; sequence ids are assigned 1-based per group; nested
    /// parts build nested category groups recursively. All nodes attach
    /// toggled on.
    pub fn rebuild_for_image(&mut self, shapes: &[ShapeData]) {
        self.nodes.clear();
        self.root_children.clear();
        for shape in shapes {
            self.attach_shape(None, shape);
        }
    }

    /// Reassembles the displayed image's shape list from the tree.
    ///
    /// The inverse of [`rebuild_for_image`](Self::rebuild_for_image):
    /// rebuilding from the extracted list reproduces the tree exactly.
    pub fn extract_shapes(&self) -> Vec<ShapeData> {
        let mut shapes = Vec::new();
        for &category_id in &self.root_children {
            for &shape_id in &self.node(category_id).children {
                shapes.push(self.extract_shape(shape_id));
            }
        }
        shapes
    }

    /// Inserts a newly committed shape, finding or creating its top-level
    /// category group. Returns the new shape node.
    pub fn insert_shape(&mut self, shape: &ShapeData) -> NodeId {
        self.attach_shape(None, shape)
    }

    /// Detaches a node (and its subtree). Removing the last shape node of
    /// a category group removes the group itself, recursively collapsing
    /// empty ancestors; remaining siblings are renumbered contiguously.
    pub fn remove_node(&mut self, id: NodeId) {
        let parent = self.node(id).parent;
        self.detach(id);
        self.free_subtree(id);
        self.collapse_and_renumber(parent);
    }

    /// The drag-and-drop contract as a pure structural operation.
    ///
    /// Dropping a shape node onto another shape node nests it under a
    /// found-or-created category group of the target; dropping onto the
    /// root (`None`) makes it top-level. Dropping a category node moves
    /// all its children, merging into an existing same-name group at the
    /// destination. Returns the node to select: the dragged shape node,
    /// or the destination category group for category drags.
    pub fn reparent(
        &mut self,
        dragged: NodeId,
        target: Option<NodeId>,
    ) -> Result<NodeId, ReparentRejection> {
        if !self.is_live(dragged) || target.is_some_and(|t| !self.is_live(t)) {
            return Err(ReparentRejection::UnknownNode);
        }
        if let Some(target_id) = target {
            if target_id == dragged {
                return Err(ReparentRejection::TargetIsDragged);
            }
            if matches!(self.node(target_id).kind, NodeKind::Category { .. }) {
                return Err(ReparentRejection::TargetIsCategory);
            }
            if self.is_descendant_of(target_id, dragged) {
                return Err(ReparentRejection::TargetInsideDragged);
            }
        }

        match self.node(dragged).kind {
            NodeKind::Shape { .. } => self.reparent_shape(dragged, target),
            NodeKind::Category { .. } => self.reparent_category(dragged, target),
        }
    }

    /// Sets a node's visibility toggle, cascading downward to every
    /// descendant shape node. Category nodes have no stored state; their
    /// on/off state is derived, so the upward "recompute" is implicit.
    pub fn set_toggle(&mut self, id: NodeId, on: bool) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let NodeKind::Shape { toggled_on, .. } = &mut self.node_mut(current).kind {
                *toggled_on = on;
            }
            stack.extend(self.node(current).children.iter().copied());
        }
    }

    /// A shape node's own toggle, or a category node's derived state
    /// (on iff at least one child shape node is on).
    pub fn is_toggled_on(&self, id: NodeId) -> bool {
        match &self.node(id).kind {
            NodeKind::Shape { toggled_on, .. } => *toggled_on,
            NodeKind::Category { .. } => self
                .node(id)
                .children
                .iter()
                .any(|&child| self.is_toggled_on(child)),
        }
    }

    pub fn root_children(&self) -> &[NodeId] {
        &self.root_children
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// The category name of a category node, or of a shape node's shape.
    pub fn category_name(&self, id: NodeId) -> &str {
        match &self.node(id).kind {
            NodeKind::Category { name } => name,
            NodeKind::Shape { shape, .. } => &shape.category,
        }
    }

    /// The shape held by a shape node (`None` for category nodes).
    pub fn shape(&self, id: NodeId) -> Option<&ShapeData> {
        match &self.node(id).kind {
            NodeKind::Shape { shape, .. } => Some(shape),
            NodeKind::Category { .. } => None,
        }
    }

    pub fn is_shape_node(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Shape { .. })
    }

    /// Rewrites a shape node's category name. Returns false for category
    /// nodes. The caller regroups (rebuilds) afterwards; the stored shape
    /// is authoritative, node grouping is derived.
    pub fn set_shape_category(&mut self, id: NodeId, category: &str) -> bool {
        match &mut self.node_mut(id).kind {
            NodeKind::Shape { shape, .. } => {
                shape.category = category.to_string();
                true
            }
            NodeKind::Category { .. } => false,
        }
    }

    /// 1-based position among sibling shape nodes (`None` for category
    /// nodes).
    pub fn sequence_id(&self, id: NodeId) -> Option<usize> {
        match self.node(id).kind {
            NodeKind::Shape { sequence_id, .. } => Some(sequence_id),
            NodeKind::Category { .. } => None,
        }
    }

    /// The top-level category group with the given name, if present.
    pub fn top_level_category(&self, name: &str) -> Option<NodeId> {
        self.find_category(&self.root_children, name)
    }

    /// Comparable structural view, for the reconstruction property.
    pub fn snapshot(&self) -> Vec<TreeSnapshot> {
        self.root_children
            .iter()
            .map(|&id| self.snapshot_node(id))
            .collect()
    }

    // ---- internals ----

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0].as_ref().expect("live tree node")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0].as_mut().expect("live tree node")
    }

    fn is_live(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(Option::is_some)
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(node));
        id
    }

    fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.node(id).parent;
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.node(node).parent;
        }
        false
    }

    /// Finds or creates (appending, preserving first-seen order) the
    /// category group named `name` under `container` (`None` = root).
    fn category_group(&mut self, container: Option<NodeId>, name: &str) -> NodeId {
        let siblings = match container {
            Some(id) => &self.node(id).children,
            None => &self.root_children,
        };
        if let Some(found) = self.find_category(siblings, name) {
            return found;
        }

        let group = self.alloc(Node {
            parent: container,
            children: Vec::new(),
            kind: NodeKind::Category {
                name: name.to_string(),
            },
        });
        match container {
            Some(id) => self.node_mut(id).children.push(group),
            None => self.root_children.push(group),
        }
        group
    }

    fn find_category(&self, siblings: &[NodeId], name: &str) -> Option<NodeId> {
        siblings.iter().copied().find(|&id| {
            matches!(&self.node(id).kind, NodeKind::Category { name: n } if n == name)
        })
    }

    /// Builds a shape node (and its part subtree) under `container`.
    fn attach_shape(&mut self, container: Option<NodeId>, shape: &ShapeData) -> NodeId {
        let group = self.category_group(container, &shape.category);

        let mut stored = shape.clone();
        let parts = std::mem::take(&mut stored.parts);

        let sequence_id = self.node(group).children.len() + 1;
        let shape_id = self.alloc(Node {
            parent: Some(group),
            children: Vec::new(),
            kind: NodeKind::Shape {
                shape: stored,
                sequence_id,
                toggled_on: true,
            },
        });
        self.node_mut(group).children.push(shape_id);

        for part in &parts {
            self.attach_shape(Some(shape_id), part);
        }
        shape_id
    }

    fn extract_shape(&self, shape_id: NodeId) -> ShapeData {
        let NodeKind::Shape { shape, .. } = &self.node(shape_id).kind else {
            unreachable!("shape node expected");
        };
        let mut extracted = shape.clone();
        for &group_id in &self.node(shape_id).children {
            for &part_id in &self.node(group_id).children {
                extracted.parts.push(self.extract_shape(part_id));
            }
        }
        extracted
    }

    /// Unlinks `id` from its parent's child list without freeing it.
    fn detach(&mut self, id: NodeId) {
        match self.node(id).parent {
            Some(parent) => self.node_mut(parent).children.retain(|&child| child != id),
            None => self.root_children.retain(|&child| child != id),
        }
        self.node_mut(id).parent = None;
    }

    fn free_subtree(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[id.0] = None;
    }

    /// After a removal at `location` (the old parent): drop category
    /// groups that became childless, walking up, then renumber the
    /// nearest surviving group's shape children.
    fn collapse_and_renumber(&mut self, location: Option<NodeId>) {
        let mut current = location;
        while let Some(id) = current {
            let node = self.node(id);
            let is_empty_category =
                matches!(node.kind, NodeKind::Category { .. }) && node.children.is_empty();
            if !is_empty_category {
                break;
            }
            let parent = node.parent;
            self.detach(id);
            self.free_subtree(id);
            current = parent;
        }
        if let Some(id) = current {
            if matches!(self.node(id).kind, NodeKind::Category { .. }) {
                self.renumber(id);
            }
        }
    }

    /// Reassigns contiguous 1-based sequence ids to a category group's
    /// shape children.
    fn renumber(&mut self, group: NodeId) {
        let children = self.node(group).children.clone();
        for (index, child) in children.into_iter().enumerate() {
            if let NodeKind::Shape { sequence_id, .. } = &mut self.node_mut(child).kind {
                *sequence_id = index + 1;
            }
        }
    }

    fn reparent_shape(
        &mut self,
        dragged: NodeId,
        target: Option<NodeId>,
    ) -> Result<NodeId, ReparentRejection> {
        // A shape node's parent is always a category group; the drop is a
        // no-op if that group already sits at the destination.
        let old_group = self.node(dragged).parent.expect("shape node has a group");
        if self.node(old_group).parent == target {
            return Err(ReparentRejection::NoOpDrop);
        }

        self.detach(dragged);
        self.collapse_and_renumber(Some(old_group));

        let category = self.node(dragged).kind_category_name().to_string();
        let group = self.category_group(target, &category);
        let sequence_id = self.node(group).children.len() + 1;
        self.node_mut(group).children.push(dragged);
        self.node_mut(dragged).parent = Some(group);
        if let NodeKind::Shape { sequence_id: seq, .. } = &mut self.node_mut(dragged).kind {
            *seq = sequence_id;
        }
        Ok(dragged)
    }

    fn reparent_category(
        &mut self,
        dragged: NodeId,
        target: Option<NodeId>,
    ) -> Result<NodeId, ReparentRejection> {
        if self.node(dragged).parent == target {
            return Err(ReparentRejection::NoOpDrop);
        }

        self.detach(dragged);

        let name = self.node(dragged).kind_category_name().to_string();
        let siblings = match target {
            Some(id) => &self.node(id).children,
            None => &self.root_children,
        };
        let existing = self
            .find_category(siblings, &name)
            .filter(|&found| found != dragged);

        let destination = if let Some(existing) = existing {
            // Merge: append all children into the destination group.
            let moved = std::mem::take(&mut self.node_mut(dragged).children);
            for &child in &moved {
                self.node_mut(child).parent = Some(existing);
            }
            self.node_mut(existing).children.extend(moved);
            self.nodes[dragged.0] = None;
            existing
        } else {
            match target {
                Some(id) => self.node_mut(id).children.push(dragged),
                None => self.root_children.push(dragged),
            }
            self.node_mut(dragged).parent = target;
            dragged
        };

        self.renumber(destination);
        Ok(destination)
    }

    fn snapshot_node(&self, id: NodeId) -> TreeSnapshot {
        let children = self
            .node(id)
            .children
            .iter()
            .map(|&child| self.snapshot_node(child))
            .collect();
        match &self.node(id).kind {
            NodeKind::Category { name } => TreeSnapshot::Category {
                name: name.clone(),
                children,
            },
            NodeKind::Shape {
                shape,
                sequence_id,
                toggled_on,
            } => TreeSnapshot::Shape {
                category: shape.category.clone(),
                sequence_id: *sequence_id,
                toggled_on: *toggled_on,
                children,
            },
        }
    }
}

impl Node {
    fn kind_category_name(&self) -> &str {
        match &self.kind {
            NodeKind::Category { name } => name,
            NodeKind::Shape { shape, .. } => &shape.category,
        }
    }
}
