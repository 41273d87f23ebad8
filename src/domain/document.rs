//! Arena-based document tree.
//!
//! All blocks live in one generational arena owned by the [`Document`].
//! Sections own their children through an ordered key map; the `parent`
//! index stored on each block is a back-reference used for navigation only
//! (pruning, path reconstruction) and never controls lifetime.

use generational_arena::{Arena, Index};
use indexmap::IndexMap;
use serde_yaml::Value;
use tracing::{instrument, trace};

use crate::domain::comment::Comments;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::path::{Key, Path};

/// Handle of a block inside a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Index);

/// Document boundary markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    DocumentStart,
    DocumentEnd,
}

/// Variant payload of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// Ordered, uniquely keyed children.
    Section(IndexMap<Key, NodeId>),
    /// Scalar or structured value.
    Mapping(Value),
    /// Dangling comment; its lines live in the block's comment slots.
    Comment,
    /// Format directive such as `%YAML 1.2`.
    Directive(String),
    Indicator(Indicator),
}

impl BlockKind {
    fn is_metadata(&self) -> bool {
        matches!(
            self,
            BlockKind::Comment | BlockKind::Directive(_) | BlockKind::Indicator(_)
        )
    }
}

/// Node stored in the arena.
#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    pub comments: Comments,
    key: Option<Key>,
    parent: Option<NodeId>,
}

impl Block {
    fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            comments: Comments::default(),
            key: None,
            parent: None,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_section(&self) -> bool {
        matches!(self.kind, BlockKind::Section(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            BlockKind::Mapping(value) => Some(value),
            _ => None,
        }
    }
}

/// Where a metadata block is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Header,
    Footer,
}

/// Rooted tree of blocks with per-block comments.
#[derive(Debug)]
pub struct Document {
    arena: Arena<Block>,
    root: NodeId,
    header: Vec<NodeId>,
    footer: Vec<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document consisting of the root section.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = NodeId(arena.insert(Block::new(BlockKind::Section(IndexMap::new()))));
        Self {
            arena,
            root,
            header: Vec::new(),
            footer: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live blocks, root and metadata included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries(self.root).map_or(true, IndexMap::is_empty)
    }

    pub fn block(&self, id: NodeId) -> Option<&Block> {
        self.arena.get(id.0)
    }

    pub fn block_mut(&mut self, id: NodeId) -> Option<&mut Block> {
        self.arena.get_mut(id.0)
    }

    pub fn is_section(&self, id: NodeId) -> bool {
        self.block(id).is_some_and(Block::is_section)
    }

    pub fn value(&self, id: NodeId) -> Option<&Value> {
        self.block(id).and_then(Block::value)
    }

    pub fn comments(&self, id: NodeId) -> Option<&Comments> {
        self.block(id).map(|b| &b.comments)
    }

    pub fn comments_mut(&mut self, id: NodeId) -> Option<&mut Comments> {
        self.block_mut(id).map(|b| &mut b.comments)
    }

    /// Child map of a section, `None` for other blocks.
    pub fn entries(&self, section: NodeId) -> Option<&IndexMap<Key, NodeId>> {
        match &self.block(section)?.kind {
            BlockKind::Section(children) => Some(children),
            _ => None,
        }
    }

    pub fn keys(&self, section: NodeId) -> Vec<Key> {
        self.entries(section)
            .map(|children| children.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn entries_mut(&mut self, section: NodeId) -> DomainResult<&mut IndexMap<Key, NodeId>> {
        let block = self
            .arena
            .get_mut(section.0)
            .ok_or(DomainError::DetachedNode)?;
        let describe = block.key.as_ref().map(ToString::to_string);
        match &mut block.kind {
            BlockKind::Section(children) => Ok(children),
            _ => Err(DomainError::NotASection(describe.unwrap_or_default())),
        }
    }

    /// Allocate a detached block; attach it with [`Document::set`].
    pub fn alloc(&mut self, kind: BlockKind) -> NodeId {
        NodeId(self.arena.insert(Block::new(kind)))
    }

    pub fn new_section(&mut self) -> NodeId {
        self.alloc(BlockKind::Section(IndexMap::new()))
    }

    pub fn new_value(&mut self, value: Value) -> NodeId {
        self.alloc(BlockKind::Mapping(value))
    }

    /// Insert or replace the child at `key`.
    ///
    /// A node still attached elsewhere is detached first. A different block
    /// previously stored at `key` is discarded together with its subtree.
    #[instrument(level = "trace", skip(self))]
    pub fn set(&mut self, section: NodeId, key: Key, node: NodeId) -> DomainResult<()> {
        let block = self.block(node).ok_or(DomainError::DetachedNode)?;
        if block.parent == Some(section) && block.key.as_ref() == Some(&key) {
            return Ok(());
        }
        if self.is_ancestor_or_self(node, section) {
            return Err(DomainError::CyclicPlacement);
        }
        // validate before detaching so a failed set leaves the tree untouched
        self.entries_mut(section)?;
        self.detach(node);

        let previous = self.entries_mut(section)?.insert(key.clone(), node);
        if let Some(block) = self.arena.get_mut(node.0) {
            block.parent = Some(section);
            block.key = Some(key);
        }
        if let Some(old) = previous.filter(|old| *old != node) {
            if let Some(block) = self.arena.get_mut(old.0) {
                block.parent = None;
            }
            self.discard(old);
        }
        Ok(())
    }

    /// Convenience: attach a new value block under `section`.
    pub fn insert_value(
        &mut self,
        section: NodeId,
        key: impl Into<Key>,
        value: impl Into<Value>,
    ) -> DomainResult<NodeId> {
        let node = self.new_value(value.into());
        self.attach_new(section, key.into(), node)
    }

    /// Convenience: attach a new empty section under `section`.
    pub fn insert_section(&mut self, section: NodeId, key: impl Into<Key>) -> DomainResult<NodeId> {
        let node = self.new_section();
        self.attach_new(section, key.into(), node)
    }

    fn attach_new(&mut self, section: NodeId, key: Key, node: NodeId) -> DomainResult<NodeId> {
        if let Err(e) = self.set(section, key, node) {
            self.discard(node);
            return Err(e);
        }
        Ok(node)
    }

    pub fn get_block_safe(&self, section: NodeId, key: &Key) -> Option<NodeId> {
        self.entries(section)?.get(key).copied()
    }

    /// Block at `path` below the root.
    pub fn get(&self, path: &Path) -> Option<NodeId> {
        self.get_from(self.root, path)
    }

    /// Block at `path` below `section`; absent when any segment is missing
    /// or an intermediate block is not a section.
    pub fn get_from(&self, section: NodeId, path: &Path) -> Option<NodeId> {
        let mut current = section;
        for key in path {
            current = self.get_block_safe(current, key)?;
        }
        Some(current)
    }

    /// Existing section that directly contains the terminal key of `path`.
    /// Never creates structure.
    pub fn get_parent(&self, path: &Path) -> Option<NodeId> {
        let mut current = self.root;
        for key in &path.keys()[..path.len() - 1] {
            current = self.get_block_safe(current, key)?;
            if !self.is_section(current) {
                return None;
            }
        }
        Some(current)
    }

    /// Detach and return the child at `key`. The block stays allocated until
    /// it is re-attached or discarded.
    pub fn remove(&mut self, section: NodeId, key: &Key) -> Option<NodeId> {
        let removed = match &mut self.arena.get_mut(section.0)?.kind {
            BlockKind::Section(children) => children.shift_remove(key)?,
            _ => return None,
        };
        if let Some(block) = self.arena.get_mut(removed.0) {
            block.parent = None;
        }
        Some(removed)
    }

    /// Detach and remove the block at `path`.
    pub fn remove_path(&mut self, path: &Path) -> Option<NodeId> {
        let parent = self.get_parent(path)?;
        self.remove(parent, path.last())
    }

    /// Detach `node` from its parent, if it has one.
    pub fn detach(&mut self, node: NodeId) {
        let (parent, key) = match self.block(node) {
            Some(Block {
                parent: Some(parent),
                key: Some(key),
                ..
            }) => (*parent, key.clone()),
            _ => return,
        };
        if let Ok(children) = self.entries_mut(parent) {
            if children.get(&key) == Some(&node) {
                children.shift_remove(&key);
            }
        }
        if let Some(block) = self.arena.get_mut(node.0) {
            block.parent = None;
        }
    }

    /// Detach `node` and free it with its whole subtree.
    pub fn discard(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        self.detach(node);
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(block) = self.arena.remove(id.0) {
                if let BlockKind::Section(children) = block.kind {
                    stack.extend(children.into_values());
                }
            }
        }
        self.header.retain(|id| *id != node);
        self.footer.retain(|id| *id != node);
    }

    /// True when the section has no children and, if requested, no comments.
    /// Non-section blocks are never empty.
    pub fn is_empty_section(&self, section: NodeId, include_comments: bool) -> bool {
        match self.block(section) {
            Some(Block {
                kind: BlockKind::Section(children),
                comments,
                ..
            }) => children.is_empty() && (!include_comments || comments.is_empty()),
            _ => false,
        }
    }

    /// Walk from the root along `path`, creating missing sections. A
    /// non-section block in the way is replaced by a new section.
    #[instrument(level = "trace", skip(self))]
    pub fn create_section(&mut self, path: &Path) -> DomainResult<NodeId> {
        let mut current = self.root;
        for key in path {
            current = match self.get_block_safe(current, key) {
                Some(child) if self.is_section(child) => child,
                existing => {
                    if existing.is_some() {
                        trace!(%key, "replacing value with section");
                    }
                    let section = self.new_section();
                    self.set(current, key.clone(), section)?;
                    section
                }
            };
        }
        Ok(current)
    }

    /// Attach `node` at `path`, creating intermediate sections.
    pub fn set_path(&mut self, path: &Path, node: NodeId) -> DomainResult<()> {
        let section = match path.parent() {
            Ok(parent) => self.create_section(&parent)?,
            Err(_) => self.root,
        };
        self.set(section, path.last().clone(), node)
    }

    /// Reorder a section: keys listed in `order` first, in that order, the
    /// remaining keys after them in their current order.
    pub fn reorder(&mut self, section: NodeId, order: &[Key]) -> DomainResult<()> {
        let children = self.entries_mut(section)?;
        let mut sorted = IndexMap::with_capacity(children.len());
        for key in order {
            if let Some(id) = children.shift_remove(key) {
                sorted.insert(key.clone(), id);
            }
        }
        sorted.extend(children.drain(..));
        *children = sorted;
        Ok(())
    }

    /// Rebuild the path of an attached block from its parent references.
    pub fn path_of(&self, node: NodeId) -> Option<Path> {
        let mut keys = Vec::new();
        let mut current = node;
        while current != self.root {
            let block = self.block(current)?;
            keys.push(block.key.clone()?);
            current = block.parent?;
        }
        keys.reverse();
        Path::new(keys).ok()
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.block(id).and_then(Block::parent);
        }
        false
    }

    /// Copy the subtree at `node` of `other` into this arena, detached.
    pub fn deep_copy_from(&mut self, other: &Document, node: NodeId) -> Option<NodeId> {
        let source = other.block(node)?;
        let kind = match &source.kind {
            BlockKind::Section(_) => BlockKind::Section(IndexMap::new()),
            kind => kind.clone(),
        };
        let copy = self.alloc(kind);
        if let Some(block) = self.block_mut(copy) {
            block.comments = source.comments.clone();
        }
        if let BlockKind::Section(children) = &source.kind {
            for (key, child) in children {
                if let Some(child_copy) = self.deep_copy_from(other, *child) {
                    // copy is a fresh section, so set cannot fail
                    let _ = self.set(copy, key.clone(), child_copy);
                }
            }
        }
        Some(copy)
    }

    /// Add a comment, directive or indicator block to the header or footer.
    pub fn push_meta(&mut self, placement: Placement, kind: BlockKind) -> DomainResult<NodeId> {
        if !kind.is_metadata() {
            return Err(DomainError::NotMetadata);
        }
        let id = self.alloc(kind);
        match placement {
            Placement::Header => self.header.push(id),
            Placement::Footer => self.footer.push(id),
        }
        Ok(id)
    }

    pub fn header(&self) -> &[NodeId] {
        &self.header
    }

    pub fn footer(&self) -> &[NodeId] {
        &self.footer
    }

    /// Pre-order traversal of the addressable tree, root first.
    pub fn iter(&self) -> DocumentIter<'_> {
        DocumentIter::new(self)
    }

    /// Paths of every non-section block, in document order.
    pub fn leaf_paths(&self) -> Vec<Path> {
        self.iter()
            .filter(|(_, block)| !block.is_section())
            .filter_map(|(id, _)| self.path_of(id))
            .collect()
    }
}

pub struct DocumentIter<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> DocumentIter<'a> {
    fn new(document: &'a Document) -> Self {
        Self {
            document,
            stack: vec![document.root],
        }
    }
}

impl<'a> Iterator for DocumentIter<'a> {
    type Item = (NodeId, &'a Block);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(block) = self.document.block(current) {
                if let BlockKind::Section(children) = &block.kind {
                    // reverse push for left-to-right traversal
                    self.stack.extend(children.values().rev().copied());
                }
                return Some((current, block));
            }
        }
        None
    }
}
