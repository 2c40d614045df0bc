//! Code fence annotations.
//!
//! Documentation code blocks carry their sample flags in the info string:
//! `language-<lang>[-render][-readonly][-render-app]`, e.g. `tsx-render` or
//! `language-tsx-render-app`.

/// What a fenced block asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFence {
    /// Highlighting language (`sh` is reported as `bash`).
    pub lang: String,
    /// Whether the block is rendered next to the editor.
    pub render: bool,
    /// Whether the rendered block can be edited.
    pub editable: bool,
    /// Expression to render after the source; empty means the last expression.
    pub render_value: String,
}

impl CodeFence {
    /// Parse an info string or a `language-…` class name.
    ///
    /// Returns `None` when there is no language at all.
    pub fn parse(annotation: &str) -> Option<Self> {
        let annotation = annotation.split_whitespace().next()?;
        let annotation = annotation.strip_prefix("language-").unwrap_or(annotation);

        let lang = annotation.split('-').next().unwrap_or_default();
        if lang.is_empty() {
            return None;
        }

        let render = has_flag(annotation, "-render");
        let editable = render && !has_flag(annotation, "-readonly");
        let render_value = if annotation.ends_with("-render-app") {
            "<App />".to_string()
        } else {
            String::new()
        };

        Some(Self {
            lang: if lang == "sh" { "bash".to_string() } else { lang.to_string() },
            render,
            editable,
            render_value,
        })
    }

    /// Find the `language-…` class among an element's classes.
    pub fn from_class_list(classes: &str) -> Option<Self> {
        classes
            .split_whitespace()
            .find(|class| class.starts_with("language-"))
            .and_then(Self::parse)
    }
}

/// `flag` followed by a word boundary.
fn has_flag(annotation: &str, flag: &str) -> bool {
    annotation.match_indices(flag).any(|(index, _)| {
        annotation[index + flag.len()..]
            .chars()
            .next()
            .map_or(true, |next| !(next.is_alphanumeric() || next == '_'))
    })
}
