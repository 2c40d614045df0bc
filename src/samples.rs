//! Code samples embedded in documentation markdown.

use crate::fence::CodeFence;
use anyhow::{anyhow, Context, Result};
use markdown::mdast::Node;
use markdown::ParseOptions;
use std::path::Path;

/// A fenced code block with its parsed annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSample {
    pub fence: CodeFence,
    /// Block contents, trimmed.
    pub source: String,
}

/// Every annotated fenced code block in `markdown`, in document order.
pub fn extract_samples(markdown: &str) -> Result<Vec<CodeSample>> {
    let tree = markdown::to_mdast(markdown, &ParseOptions::gfm())
        .map_err(|e| anyhow!("Invalid markdown: {}", e))?;

    let mut samples = Vec::new();
    collect(&tree, &mut samples);
    Ok(samples)
}

/// Read a markdown file and extract its samples.
pub fn load_samples(path: &Path) -> Result<Vec<CodeSample>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    extract_samples(&text)
}

fn collect(node: &Node, samples: &mut Vec<CodeSample>) {
    if let Node::Code(code) = node {
        if let Some(fence) = code.lang.as_deref().and_then(CodeFence::parse) {
            samples.push(CodeSample {
                fence,
                source: code.value.trim().to_string(),
            });
        }
        return;
    }

    if let Some(children) = node.children() {
        for child in children {
            collect(child, samples);
        }
    }
}
