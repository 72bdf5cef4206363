//! Contracts between the editor core and a document rendering surface.
//!
//! The rendering engine owns the document tree and may rebuild every node on
//! each keystroke. The core only reads structure through [`DocumentTree`],
//! reads geometry through [`ScrollViewport`], and writes visual state through
//! exactly one positional rule per [`StyleHost`]. A browser binding implements
//! these over the DOM; [`crate::headless::HeadlessSurface`] implements them in
//! memory.

use crate::focus::PositionalRule;
use thiserror::Error;

/// Error type for rendering-surface operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("surface is not mounted")]
    NotMounted,
    #[error("unknown style slot {0:?}")]
    UnknownSlot(StyleSlot),
    #[error("surface rejected the operation: {0}")]
    Rejected(String),
}

/// Inline formatting that can wrap the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InlineFormat {
    Bold,
    Italic,
    Code,
    Strikethrough,
    Link,
}

/// Recognized top-level block kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    Quote,
    ListItem,
    CodeBlock,
    Rule,
}

/// Structural role of a node in the rendered tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The editor root container.
    Root,
    Block(BlockKind),
    Inline(InlineFormat),
    Text,
    /// Anything the core does not recognize (widgets, decorations).
    Other,
}

/// Read-only structural view of the rendered document.
pub trait DocumentTree {
    /// Opaque node handle. Handles from a previous render may be stale; a
    /// stale handle simply has no parent.
    type Node: Copy + Eq + std::fmt::Debug;

    /// The root container, or `None` when nothing is mounted.
    fn root(&self) -> Option<Self::Node>;

    /// The node holding the selection focus (caret), if any.
    fn selection_anchor(&self) -> Option<Self::Node>;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    fn kind(&self, node: Self::Node) -> NodeKind;

    /// Ordinal position of `node` among its parent's children.
    fn sibling_index(&self, node: Self::Node) -> Option<usize>;
}

/// Caret geometry relative to the scrollable viewport's top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorRect {
    pub top: f32,
    pub height: f32,
}

impl CursorRect {
    pub fn new(top: f32, height: f32) -> Self {
        Self { top, height }
    }

    /// Collapsed or non-finite rects cannot be used for centering.
    pub fn is_measurable(&self) -> bool {
        self.top.is_finite() && self.height.is_finite() && self.height > 0.0
    }

    /// Vertical midpoint of the caret.
    pub fn center_y(&self) -> f32 {
        self.top + self.height / 2.0
    }
}

/// Scroll geometry of the viewport hosting the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    pub height: f32,
    pub scroll_top: f32,
    pub max_scroll_top: f32,
}

impl ViewportMetrics {
    pub fn is_measurable(&self) -> bool {
        self.height.is_finite()
            && self.height > 0.0
            && self.scroll_top.is_finite()
            && self.max_scroll_top.is_finite()
    }

    pub fn center_y(&self) -> f32 {
        self.height / 2.0
    }

    pub fn clamp_scroll(&self, offset: f32) -> f32 {
        offset.clamp(0.0, self.max_scroll_top.max(0.0))
    }
}

/// Scrollable container around the surface.
pub trait ScrollViewport {
    /// Current geometry, or `None` when it cannot be measured.
    fn viewport_metrics(&self) -> Option<ViewportMetrics>;

    fn set_scroll_top(&mut self, offset: f32);
}

/// Handle for one injected style rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StyleSlot(pub u64);

/// Injection point for positional style rules scoped to the root container.
pub trait StyleHost {
    fn install_rule(&mut self, rule: &PositionalRule) -> Result<StyleSlot, SurfaceError>;

    /// Replace the rule text held by `slot` in place.
    fn replace_rule(&mut self, slot: StyleSlot, rule: &PositionalRule) -> Result<(), SurfaceError>;

    /// Remove the rule. Releasing an unknown slot is a no-op.
    fn release_rule(&mut self, slot: StyleSlot);
}

/// Mount/destroy hooks for one document at a time.
pub trait SurfaceLifecycle {
    fn mount(&mut self, document_id: &str, content: &str) -> Result<(), SurfaceError>;

    /// Tear the surface down. Repeated calls must be harmless.
    fn destroy(&mut self);

    fn mounted_document(&self) -> Option<&str>;
}

/// Everything the editor session needs from a rendering surface.
pub trait RenderSurface: DocumentTree + ScrollViewport + StyleHost + SurfaceLifecycle {}

impl<T> RenderSurface for T where T: DocumentTree + ScrollViewport + StyleHost + SurfaceLifecycle {}

/// Notifications emitted by the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Selection or caret moved; the payload is read back from the tree.
    SelectionChanged,
    /// The document was edited; carries the serialized text.
    ContentChanged { content: String },
    /// Caret geometry after layout. `instant` requests a jump instead of an
    /// animated scroll.
    CursorMoved {
        rect: Option<CursorRect>,
        instant: bool,
    },
    /// The user scrolled the viewport by hand.
    Scrolled,
}
