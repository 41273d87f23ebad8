//! Comment slots attached to document blocks.
//!
//! Every addressable block carries six independent slots:
//! `{key, value} x {before, inline, after}`. A slot is either absent or a
//! non-empty ordered list of lines.

/// How a comment line was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentKind {
    /// Full-line comment.
    Block,
    /// Comment trailing content on the same line.
    Inline,
    /// Preserved empty line.
    BlankLine,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommentLine {
    pub text: String,
    pub kind: CommentKind,
}

impl CommentLine {
    pub fn block(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: CommentKind::Block,
        }
    }

    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: CommentKind::Inline,
        }
    }

    pub fn blank() -> Self {
        Self {
            text: String::new(),
            kind: CommentKind::BlankLine,
        }
    }
}

/// Which part of a key/value pair a comment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Key,
    Value,
}

/// Placement relative to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Before,
    Inline,
    After,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Slots {
    before: Option<Vec<CommentLine>>,
    inline: Option<Vec<CommentLine>>,
    after: Option<Vec<CommentLine>>,
}

impl Slots {
    fn slot(&self, position: Position) -> &Option<Vec<CommentLine>> {
        match position {
            Position::Before => &self.before,
            Position::Inline => &self.inline,
            Position::After => &self.after,
        }
    }

    fn slot_mut(&mut self, position: Position) -> &mut Option<Vec<CommentLine>> {
        match position {
            Position::Before => &mut self.before,
            Position::Inline => &mut self.inline,
            Position::After => &mut self.after,
        }
    }

    fn is_empty(&self) -> bool {
        self.before.is_none() && self.inline.is_none() && self.after.is_none()
    }
}

/// The six comment slots of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    key: Slots,
    value: Slots,
}

impl Comments {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self, role: NodeRole) -> &Slots {
        match role {
            NodeRole::Key => &self.key,
            NodeRole::Value => &self.value,
        }
    }

    fn slots_mut(&mut self, role: NodeRole) -> &mut Slots {
        match role {
            NodeRole::Key => &mut self.key,
            NodeRole::Value => &mut self.value,
        }
    }

    pub fn get(&self, role: NodeRole, position: Position) -> Option<&[CommentLine]> {
        self.slots(role).slot(position).as_deref()
    }

    /// Replace a slot. An empty list clears it.
    pub fn set(&mut self, role: NodeRole, position: Position, lines: Vec<CommentLine>) {
        *self.slots_mut(role).slot_mut(position) = if lines.is_empty() {
            None
        } else {
            Some(lines)
        };
    }

    /// Append lines to a slot, creating it if needed.
    pub fn add(&mut self, role: NodeRole, position: Position, lines: Vec<CommentLine>) {
        if lines.is_empty() {
            return;
        }
        self.slots_mut(role)
            .slot_mut(position)
            .get_or_insert_with(Vec::new)
            .extend(lines);
    }

    pub fn remove(&mut self, role: NodeRole, position: Position) -> Option<Vec<CommentLine>> {
        self.slots_mut(role).slot_mut(position).take()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.value.is_empty()
    }
}
