//! In-memory rendering surface.
//!
//! Behaves like a live-preview markdown editor: every edit rebuilds the whole
//! node tree, so node handles from before an edit are stale afterwards. Each
//! non-blank line renders as one top-level block; `**bold**`, `*italic*`,
//! `` `code` `` and `~~strike~~` spans become nested inline nodes. Geometry
//! is deterministic: fixed line height, with half a viewport of padding above
//! and below the text so any line can be centered.

use crate::focus::PositionalRule;
use crate::surface::{
    BlockKind, CursorRect, DocumentTree, InlineFormat, NodeKind, ScrollViewport, StyleHost,
    StyleSlot, SurfaceError, SurfaceEvent, SurfaceLifecycle, ViewportMetrics,
};
use std::collections::BTreeMap;
use std::ops::Range;

pub const DEFAULT_LINE_HEIGHT: f32 = 24.0;
pub const DEFAULT_VIEWPORT_HEIGHT: f32 = 480.0;
/// Selector the focus rule is scoped to.
pub const ROOT_SELECTOR: &str = ".hushpad-editor";

/// Handle into one render generation of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    generation: u32,
    index: u32,
}

#[derive(Debug, Clone)]
struct HeadlessNode {
    parent: Option<usize>,
    kind: NodeKind,
    sibling_index: usize,
    child_count: usize,
}

#[derive(Debug, Clone)]
struct LineLayout {
    start: usize,
    end: usize,
    block: Option<usize>,
    /// Absolute char ranges and the leaf node rendering each.
    segments: Vec<(Range<usize>, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
struct Segment {
    range: Range<usize>,
    formats: Vec<InlineFormat>,
}

/// Headless [`crate::surface::RenderSurface`] used by the CLI and tests.
#[derive(Debug)]
pub struct HeadlessSurface {
    viewport_height: f32,
    line_height: f32,
    scroll_top: f32,
    document_id: Option<String>,
    content: String,
    cursor: usize,
    generation: u32,
    nodes: Vec<HeadlessNode>,
    lines: Vec<LineLayout>,
    rules: BTreeMap<StyleSlot, PositionalRule>,
    next_slot: u64,
    renders: u64,
    fail_style_install: bool,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWPORT_HEIGHT, DEFAULT_LINE_HEIGHT)
    }
}

impl HeadlessSurface {
    pub fn new(viewport_height: f32, line_height: f32) -> Self {
        Self {
            viewport_height,
            line_height,
            scroll_top: 0.0,
            document_id: None,
            content: String::new(),
            cursor: 0,
            generation: 0,
            nodes: Vec::new(),
            lines: Vec::new(),
            rules: BTreeMap::new(),
            next_slot: 0,
            renders: 0,
            fail_style_install: false,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Caret position as a char offset into the content.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn scroll_top(&self) -> f32 {
        self.scroll_top
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    pub fn block_count(&self) -> usize {
        self.lines.iter().filter(|line| line.block.is_some()).count()
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Effective opacity of the top-level block at `index` under all
    /// installed rules.
    pub fn block_opacity(&self, index: usize) -> f32 {
        self.rules
            .values()
            .map(|rule| rule.opacity_for(index))
            .fold(1.0, f32::min)
    }

    /// Concatenated stylesheet text of every installed rule.
    pub fn stylesheet(&self) -> String {
        self.rules
            .values()
            .map(|rule| rule.to_css(ROOT_SELECTOR))
            .collect()
    }

    /// Make subsequent rule installs fail.
    pub fn set_fail_style_install(&mut self, fail: bool) {
        self.fail_style_install = fail;
    }

    pub fn is_mounted(&self) -> bool {
        self.document_id.is_some()
    }

    fn ensure_mounted(&self) -> Result<(), SurfaceError> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(SurfaceError::NotMounted)
        }
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_offset(&self, char_offset: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_offset)
            .map(|(byte, _)| byte)
            .unwrap_or(self.content.len())
    }

    fn cursor_line(&self) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.start <= self.cursor && self.cursor <= line.end)
    }

    /// Caret geometry relative to the viewport top.
    pub fn cursor_rect(&self) -> Option<CursorRect> {
        if !self.is_mounted() {
            return None;
        }
        let line = self.cursor_line()?;
        let document_y = self.viewport_height / 2.0 + line as f32 * self.line_height;
        Some(CursorRect::new(
            document_y - self.scroll_top,
            self.line_height,
        ))
    }

    fn max_scroll_top(&self) -> f32 {
        self.lines.len() as f32 * self.line_height
    }

    fn caret_events(&self, instant: bool) -> Vec<SurfaceEvent> {
        vec![
            SurfaceEvent::SelectionChanged,
            SurfaceEvent::CursorMoved {
                rect: self.cursor_rect(),
                instant,
            },
        ]
    }

    fn edit_events(&self, instant: bool) -> Vec<SurfaceEvent> {
        let mut events = vec![SurfaceEvent::ContentChanged {
            content: self.content.clone(),
        }];
        events.extend(self.caret_events(instant));
        events
    }

    /// Type `text` at the caret.
    ///
    /// Multi-character insertions behave like a paste and request an instant
    /// scroll.
    pub fn insert_text(&mut self, text: &str) -> Result<Vec<SurfaceEvent>, SurfaceError> {
        self.ensure_mounted()?;
        let at = self.byte_offset(self.cursor);
        self.content.insert_str(at, text);
        self.cursor += text.chars().count();
        self.render();
        Ok(self.edit_events(text.chars().count() > 1))
    }

    /// Delete the character before the caret.
    pub fn delete_backward(&mut self) -> Result<Vec<SurfaceEvent>, SurfaceError> {
        self.ensure_mounted()?;
        if self.cursor == 0 {
            return Ok(Vec::new());
        }
        let start = self.byte_offset(self.cursor - 1);
        let end = self.byte_offset(self.cursor);
        self.content.replace_range(start..end, "");
        self.cursor -= 1;
        self.render();
        Ok(self.edit_events(false))
    }

    /// Replace the whole text, keeping the caret where it still fits.
    pub fn replace_content(&mut self, content: &str) -> Result<Vec<SurfaceEvent>, SurfaceError> {
        self.ensure_mounted()?;
        self.content = content.to_string();
        self.cursor = self.cursor.min(self.char_len());
        self.render();
        Ok(self.edit_events(true))
    }

    /// Move the caret to char offset `offset` (clamped).
    pub fn set_cursor(&mut self, offset: usize) -> Result<Vec<SurfaceEvent>, SurfaceError> {
        self.ensure_mounted()?;
        self.cursor = offset.min(self.char_len());
        Ok(self.caret_events(false))
    }

    /// Scroll as if the user dragged the scrollbar.
    pub fn scroll_by(&mut self, delta: f32) -> SurfaceEvent {
        let max = self.max_scroll_top();
        self.scroll_top = (self.scroll_top + delta).clamp(0.0, max);
        SurfaceEvent::Scrolled
    }

    fn push_node(&mut self, parent: Option<usize>, kind: NodeKind) -> usize {
        let sibling_index = match parent {
            Some(parent) => {
                let node = &mut self.nodes[parent];
                node.child_count += 1;
                node.child_count - 1
            }
            None => 0,
        };
        self.nodes.push(HeadlessNode {
            parent,
            kind,
            sibling_index,
            child_count: 0,
        });
        self.nodes.len() - 1
    }

    fn render(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.renders += 1;
        self.nodes.clear();
        self.lines.clear();
        let root = self.push_node(None, NodeKind::Root);

        let content = std::mem::take(&mut self.content);
        let mut offset = 0;
        for line in content.split('\n') {
            let len = line.chars().count();
            let mut layout = LineLayout {
                start: offset,
                end: offset + len,
                block: None,
                segments: Vec::new(),
            };
            if !line.trim().is_empty() {
                let (kind, prefix) = classify_block(line);
                let block = self.push_node(Some(root), NodeKind::Block(kind));
                layout.block = Some(block);
                for segment in block_segments(line, kind, prefix) {
                    let mut parent = block;
                    for format in &segment.formats {
                        parent = self.push_node(Some(parent), NodeKind::Inline(*format));
                    }
                    let leaf = self.push_node(Some(parent), NodeKind::Text);
                    let range = offset + segment.range.start..offset + segment.range.end;
                    layout.segments.push((range, leaf));
                }
            }
            self.lines.push(layout);
            offset += len + 1;
        }
        self.content = content;
        self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll_top());
    }

    fn node_id(&self, index: usize) -> NodeId {
        NodeId {
            generation: self.generation,
            index: index as u32,
        }
    }

    fn live_node(&self, node: NodeId) -> Option<&HeadlessNode> {
        if node.generation != self.generation {
            return None;
        }
        self.nodes.get(node.index as usize)
    }
}

fn classify_block(line: &str) -> (BlockKind, usize) {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) && line[hashes..].starts_with(' ') {
        return (BlockKind::Heading(hashes as u8), hashes + 1);
    }
    if line.starts_with("```") {
        return (BlockKind::CodeBlock, 0);
    }
    if matches!(line.trim(), "---" | "***" | "___") {
        return (BlockKind::Rule, 0);
    }
    if line.starts_with("> ") {
        return (BlockKind::Quote, 2);
    }
    if ["- ", "* ", "+ "].iter().any(|marker| line.starts_with(marker)) {
        return (BlockKind::ListItem, 2);
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && line[digits..].starts_with(". ") {
        return (BlockKind::ListItem, digits + 2);
    }
    (BlockKind::Paragraph, 0)
}

fn block_segments(line: &str, kind: BlockKind, prefix: usize) -> Vec<Segment> {
    let len = line.chars().count();
    if matches!(kind, BlockKind::CodeBlock | BlockKind::Rule) {
        return vec![Segment {
            range: 0..len,
            formats: Vec::new(),
        }];
    }
    let mut segments = Vec::new();
    if prefix > 0 {
        segments.push(Segment {
            range: 0..prefix,
            formats: Vec::new(),
        });
    }
    let body: String = line.chars().skip(prefix).collect();
    segments.extend(parse_inline(&body).into_iter().map(|segment| Segment {
        range: segment.range.start + prefix..segment.range.end + prefix,
        formats: segment.formats,
    }));
    segments
}

/// Split one line into runs of uniform inline formatting.
///
/// Markers belong to the run they open or close. Unclosed spans extend to the
/// end of the line, and nothing inside a code span is interpreted.
fn parse_inline(text: &str) -> Vec<Segment> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut stack: Vec<InlineFormat> = Vec::new();
    let mut run_start = 0;

    let mut i = 0;
    while i < chars.len() {
        let next = chars.get(i + 1).copied();
        let (format, width) = match (chars[i], next) {
            // `***` closing an italic inside bold: the first star ends italic.
            ('*', Some('*')) if stack.last() == Some(&InlineFormat::Italic) => {
                (Some(InlineFormat::Italic), 1)
            }
            ('*', Some('*')) => (Some(InlineFormat::Bold), 2),
            ('~', Some('~')) => (Some(InlineFormat::Strikethrough), 2),
            ('*', _) => (Some(InlineFormat::Italic), 1),
            ('`', _) => (Some(InlineFormat::Code), 1),
            _ => (None, 1),
        };
        let Some(format) = format else {
            i += width;
            continue;
        };
        let in_code = stack.last() == Some(&InlineFormat::Code);
        if stack.last() == Some(&format) {
            push_segment(&mut segments, run_start..i + width, &stack);
            stack.pop();
            run_start = i + width;
        } else if !in_code && !stack.contains(&format) {
            push_segment(&mut segments, run_start..i, &stack);
            stack.push(format);
            run_start = i;
        }
        i += width;
    }
    push_segment(&mut segments, run_start..chars.len(), &stack);
    segments
}

fn push_segment(segments: &mut Vec<Segment>, range: Range<usize>, formats: &[InlineFormat]) {
    if !range.is_empty() {
        segments.push(Segment {
            range,
            formats: formats.to_vec(),
        });
    }
}

impl DocumentTree for HeadlessSurface {
    type Node = NodeId;

    fn root(&self) -> Option<NodeId> {
        if self.is_mounted() && !self.nodes.is_empty() {
            Some(self.node_id(0))
        } else {
            None
        }
    }

    fn selection_anchor(&self) -> Option<NodeId> {
        if !self.is_mounted() {
            return None;
        }
        let line = &self.lines[self.cursor_line()?];
        let block = line.block?;
        let leaf = line
            .segments
            .iter()
            .find(|(range, _)| range.contains(&self.cursor))
            .or_else(|| line.segments.last())
            .map(|(_, leaf)| *leaf)
            .unwrap_or(block);
        Some(self.node_id(leaf))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.live_node(node)?.parent?;
        Some(self.node_id(parent))
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        self.live_node(node)
            .map(|node| node.kind)
            .unwrap_or(NodeKind::Other)
    }

    fn sibling_index(&self, node: NodeId) -> Option<usize> {
        self.live_node(node).map(|node| node.sibling_index)
    }
}

impl ScrollViewport for HeadlessSurface {
    fn viewport_metrics(&self) -> Option<ViewportMetrics> {
        if !self.is_mounted() {
            return None;
        }
        Some(ViewportMetrics {
            height: self.viewport_height,
            scroll_top: self.scroll_top,
            max_scroll_top: self.max_scroll_top(),
        })
    }

    fn set_scroll_top(&mut self, offset: f32) {
        if !self.is_mounted() || !offset.is_finite() {
            return;
        }
        self.scroll_top = offset.clamp(0.0, self.max_scroll_top());
    }
}

impl StyleHost for HeadlessSurface {
    fn install_rule(&mut self, rule: &PositionalRule) -> Result<StyleSlot, SurfaceError> {
        if self.fail_style_install {
            return Err(SurfaceError::Rejected("style injection disabled".to_string()));
        }
        self.next_slot += 1;
        let slot = StyleSlot(self.next_slot);
        self.rules.insert(slot, *rule);
        Ok(slot)
    }

    fn replace_rule(&mut self, slot: StyleSlot, rule: &PositionalRule) -> Result<(), SurfaceError> {
        let entry = self
            .rules
            .get_mut(&slot)
            .ok_or(SurfaceError::UnknownSlot(slot))?;
        *entry = *rule;
        Ok(())
    }

    fn release_rule(&mut self, slot: StyleSlot) {
        self.rules.remove(&slot);
    }
}

impl SurfaceLifecycle for HeadlessSurface {
    fn mount(&mut self, document_id: &str, content: &str) -> Result<(), SurfaceError> {
        self.document_id = Some(document_id.to_string());
        self.content = content.to_string();
        self.cursor = self.char_len();
        self.scroll_top = 0.0;
        self.render();
        Ok(())
    }

    fn destroy(&mut self) {
        if self.document_id.take().is_none() {
            return;
        }
        self.generation = self.generation.wrapping_add(1);
        self.content.clear();
        self.cursor = 0;
        self.nodes.clear();
        self.lines.clear();
        self.scroll_top = 0.0;
    }

    fn mounted_document(&self) -> Option<&str> {
        self.document_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::resolve_selection;

    fn mounted(content: &str) -> HeadlessSurface {
        let mut surface = HeadlessSurface::default();
        surface.mount("doc-1", content).expect("mount");
        surface
    }

    #[test]
    fn blank_lines_do_not_render_blocks() {
        let surface = mounted("# Title\n\nfirst\n\n- item\n");
        assert_eq!(surface.block_count(), 3);
    }

    #[test]
    fn inline_runs_split_on_markers() {
        let segments = parse_inline("a **b *c*** `*d*`");
        let formats: Vec<Vec<InlineFormat>> = segments.iter().map(|s| s.formats.clone()).collect();
        assert_eq!(
            formats,
            vec![
                vec![],
                vec![InlineFormat::Bold],
                vec![InlineFormat::Bold, InlineFormat::Italic],
                vec![InlineFormat::Bold],
                vec![],
                vec![InlineFormat::Code],
            ]
        );
        assert_eq!(segments.last().map(|s| s.range.clone()), Some(12..17));
    }

    #[test]
    fn block_classification() {
        assert_eq!(classify_block("## Two"), (BlockKind::Heading(2), 3));
        assert_eq!(classify_block("#hashtag").0, BlockKind::Paragraph);
        assert_eq!(classify_block("> said").0, BlockKind::Quote);
        assert_eq!(classify_block("12. twelfth"), (BlockKind::ListItem, 4));
        assert_eq!(classify_block("---").0, BlockKind::Rule);
        assert_eq!(classify_block("```rust").0, BlockKind::CodeBlock);
    }

    #[test]
    fn caret_resolves_to_block_and_formats() {
        let mut surface = mounted("intro\n\nplain **bold *both*** tail");
        let body_start = "intro\n\n".chars().count();
        surface
            .set_cursor(body_start + "plain **bold *bo".chars().count())
            .expect("cursor");
        let snapshot = resolve_selection(&surface);
        assert_eq!(snapshot.active_block_index, Some(1));
        assert!(snapshot.has_format(InlineFormat::Bold));
        assert!(snapshot.has_format(InlineFormat::Italic));

        surface.set_cursor(body_start + 2).expect("cursor");
        let snapshot = resolve_selection(&surface);
        assert_eq!(snapshot.active_block_index, Some(1));
        assert!(snapshot.formatting.is_empty());
    }

    #[test]
    fn caret_on_blank_line_has_no_block() {
        let mut surface = mounted("one\n\ntwo");
        surface.set_cursor(4).expect("cursor");
        assert_eq!(resolve_selection(&surface).active_block_index, None);
    }

    #[test]
    fn edits_invalidate_old_node_handles() {
        let mut surface = mounted("hello");
        let before = surface.selection_anchor().expect("anchor");
        assert!(surface.parent(before).is_some());
        surface.insert_text("!").expect("type");
        assert!(surface.parent(before).is_none());
        assert_eq!(surface.kind(before), NodeKind::Other);
        assert!(surface.selection_anchor().is_some());
        assert_eq!(surface.render_count(), 2);
    }

    #[test]
    fn typing_emits_content_selection_and_caret_events() {
        let mut surface = mounted("");
        let events = surface.insert_text("a").expect("type");
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            SurfaceEvent::ContentChanged {
                content: "a".to_string()
            }
        );
        assert!(matches!(events[2], SurfaceEvent::CursorMoved { instant: false, .. }));

        let events = surface.insert_text("pasted\nblock").expect("paste");
        assert!(matches!(events[2], SurfaceEvent::CursorMoved { instant: true, .. }));
        assert_eq!(surface.content(), "apasted\nblock");
    }

    #[test]
    fn delete_backward_handles_multibyte_text() {
        let mut surface = mounted("héllo ✓");
        surface.delete_backward().expect("delete");
        assert_eq!(surface.content(), "héllo ");
        surface.set_cursor(2).expect("cursor");
        surface.delete_backward().expect("delete");
        assert_eq!(surface.content(), "hllo ");
    }

    #[test]
    fn geometry_allows_centering_every_line() {
        let mut surface = mounted("a\nb\nc");
        let rect = surface.cursor_rect().expect("rect");
        assert_eq!(rect.top, DEFAULT_VIEWPORT_HEIGHT / 2.0 + 2.0 * DEFAULT_LINE_HEIGHT);

        let metrics = surface.viewport_metrics().expect("metrics");
        assert_eq!(metrics.max_scroll_top, 3.0 * DEFAULT_LINE_HEIGHT);
        surface.set_scroll_top(10_000.0);
        assert_eq!(surface.scroll_top(), metrics.max_scroll_top);
        surface.set_scroll_top(-5.0);
        assert_eq!(surface.scroll_top(), 0.0);
    }

    #[test]
    fn unmounted_surface_reports_nothing() {
        let mut surface = HeadlessSurface::default();
        assert!(surface.root().is_none());
        assert!(surface.viewport_metrics().is_none());
        assert!(surface.cursor_rect().is_none());
        assert_eq!(surface.insert_text("x"), Err(SurfaceError::NotMounted));
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut surface = mounted("text");
        surface.destroy();
        surface.destroy();
        assert!(surface.mounted_document().is_none());
        assert_eq!(surface.block_count(), 0);
    }

    #[test]
    fn style_rules_control_block_opacity() {
        let mut surface = mounted("a\nb\nc");
        let slot = surface
            .install_rule(&PositionalRule::new(0.3, Some(1)))
            .expect("install");
        assert_eq!(surface.block_opacity(0), 0.3);
        assert_eq!(surface.block_opacity(1), 1.0);
        assert!(surface.stylesheet().contains("nth-child(2)"));

        surface
            .replace_rule(slot, &PositionalRule::new(0.3, Some(2)))
            .expect("replace");
        assert_eq!(surface.block_opacity(1), 0.3);
        surface.release_rule(slot);
        surface.release_rule(slot);
        assert_eq!(surface.rule_count(), 0);
        assert_eq!(
            surface.replace_rule(slot, &PositionalRule::new(0.3, None)),
            Err(SurfaceError::UnknownSlot(slot))
        );
    }
}
