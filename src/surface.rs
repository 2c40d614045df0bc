//! Mount surfaces and the node trees mounted into them.
//!
//! A surface is a single-slot register: it holds one mounted instance, one
//! block of text (an error message), or nothing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tags that never have children or a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A resolved UI node, as produced by the sandbox runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Element {
        tag: String,
        #[serde(default)]
        attrs: Vec<(String, String)>,
        /// Inline declarations, in the order the props were written.
        #[serde(default)]
        style: Vec<(String, String)>,
        #[serde(default)]
        media: Vec<MediaRule>,
        #[serde(default)]
        children: Vec<Node>,
    },
    Text {
        text: String,
    },
}

/// Declarations that only apply under a media query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRule {
    pub query: String,
    pub style: Vec<(String, String)>,
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text { text } => out.push_str(text),
            Node::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    pub fn write_html(&self, out: &mut String) {
        match self {
            Node::Text { text } => out.push_str(&html_escape::encode_text(text)),
            Node::Element {
                tag,
                attrs,
                style,
                media,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    write_attr(out, name, value);
                }
                if !style.is_empty() {
                    write_attr(out, "style", &declarations(style));
                }
                if !media.is_empty() {
                    let rules: Vec<String> = media
                        .iter()
                        .map(|rule| format!("@media {} {{ {} }}", rule.query, declarations(&rule.style)))
                        .collect();
                    write_attr(out, "data-stylix-media", &rules.join(" "));
                }
                out.push('>');

                if VOID_TAGS.contains(&tag.as_str()) {
                    return;
                }
                for child in children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn declarations(style: &[(String, String)]) -> String {
    style
        .iter()
        .map(|(property, value)| format!("{}: {}", property, value))
        .collect::<Vec<_>>()
        .join("; ")
}

fn write_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&html_escape::encode_double_quoted_attribute(value));
    out.push('"');
}

/// A live render occupying a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedInstance {
    /// Increments on every mount into the same surface.
    pub generation: u64,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SurfaceContent {
    #[default]
    Empty,
    Mounted(MountedInstance),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("cannot unmount from surface '{id}': it is detached")]
    Detached { id: String },
}

/// The target a sample renders into.
#[derive(Debug, Clone)]
pub struct MountSurface {
    id: String,
    attached: bool,
    content: SurfaceContent,
    generation: u64,
}

impl MountSurface {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attached: true,
            content: SurfaceContent::Empty,
            generation: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Take the surface out of the page. Teardown of a live instance will
    /// report an error until it is attached again.
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn attach(&mut self) {
        self.attached = true;
    }

    pub fn content(&self) -> &SurfaceContent {
        &self.content
    }

    /// Number of live mounted instances: always 0 or 1.
    pub fn live_instances(&self) -> usize {
        match self.content {
            SurfaceContent::Mounted(_) => 1,
            _ => 0,
        }
    }

    /// Tear down the mounted instance, if any.
    ///
    /// Returns whether an instance was removed. Text content is left in
    /// place; it is not a mounted instance. The slot is cleared even when an
    /// error is returned, so a failed teardown never leaves a live instance.
    pub fn unmount(&mut self) -> Result<bool, SurfaceError> {
        if !matches!(self.content, SurfaceContent::Mounted(_)) {
            return Ok(false);
        }
        self.content = SurfaceContent::Empty;
        if !self.attached {
            return Err(SurfaceError::Detached {
                id: self.id.clone(),
            });
        }
        Ok(true)
    }

    /// Mount a node tree, replacing whatever the slot holds.
    pub fn mount(&mut self, nodes: Vec<Node>) -> u64 {
        self.generation += 1;
        self.content = SurfaceContent::Mounted(MountedInstance {
            generation: self.generation,
            nodes,
        });
        self.generation
    }

    /// Replace the content with plain text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.content = SurfaceContent::Text(text.into());
    }

    pub fn text_content(&self) -> String {
        match &self.content {
            SurfaceContent::Empty => String::new(),
            SurfaceContent::Text(text) => text.clone(),
            SurfaceContent::Mounted(instance) => {
                instance.nodes.iter().map(Node::text_content).collect()
            }
        }
    }

    /// The surface's inner HTML.
    pub fn to_html(&self) -> String {
        match &self.content {
            SurfaceContent::Empty => String::new(),
            SurfaceContent::Text(text) => html_escape::encode_text(text).into_owned(),
            SurfaceContent::Mounted(instance) => {
                let mut out = String::new();
                for node in &instance.nodes {
                    node.write_html(&mut out);
                }
                out
            }
        }
    }
}
