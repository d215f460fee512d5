//! Parsing indented sitemap text into a tree, and rendering it back out.

use serde::{Deserialize, Serialize};

const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, itself included.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(OutlineNode::len).sum::<usize>()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Parse an indented outline. The first non-blank line is the root; every
/// later line hangs under the nearest preceding line that is indented less.
///
/// Tabs and spaces may be mixed (a tab counts as four columns); only the
/// relative indentation of lines matters. Returns `None` for blank input.
pub fn parse_outline(text: &str) -> Option<OutlineNode> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let root = OutlineNode::new(strip_bullet(lines.next()?.trim()));

    // (indent, path of child positions from the root)
    let mut stack: Vec<(usize, Vec<usize>)> = vec![(0, Vec::new())];
    let mut tree = root;

    for line in lines {
        let indent = indent_width(line);
        while stack.len() > 1 && stack.last().is_some_and(|(level, _)| *level >= indent) {
            stack.pop();
        }

        let parent_path = stack.last().map(|(_, path)| path.clone()).unwrap_or_default();
        let parent = node_at_mut(&mut tree, &parent_path);
        parent.children.push(OutlineNode::new(strip_bullet(line.trim())));

        let mut path = parent_path;
        path.push(parent.children.len() - 1);
        stack.push((indent, path));
    }

    Some(tree)
}

fn node_at_mut<'a>(root: &'a mut OutlineNode, path: &[usize]) -> &'a mut OutlineNode {
    let mut node = root;
    for &position in path {
        node = &mut node.children[position];
    }
    node
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

fn strip_bullet(line: &str) -> String {
    line.trim_start_matches(['-', '*', '•'])
        .trim()
        .to_string()
}

/// Render as a box-drawing tree for terminals.
pub fn render_tree(root: &OutlineNode) -> String {
    let mut out = format!("{}\n", root.name);
    render_children(&root.children, "", &mut out);
    out
}

fn render_children(children: &[OutlineNode], prefix: &str, out: &mut String) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        out.push_str(prefix);
        out.push_str(if last { "└── " } else { "├── " });
        out.push_str(&child.name);
        out.push('\n');
        let next_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
        render_children(&child.children, &next_prefix, out);
    }
}

/// Render as a nested markdown bullet list.
pub fn render_markdown(root: &OutlineNode) -> String {
    let mut out = String::new();
    push_markdown(root, 0, &mut out);
    out
}

fn push_markdown(node: &OutlineNode, level: usize, out: &mut String) {
    out.push_str(&"  ".repeat(level));
    out.push_str("- ");
    out.push_str(&node.name);
    out.push('\n');
    for child in &node.children {
        push_markdown(child, level + 1, out);
    }
}
