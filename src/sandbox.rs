//! The sample renderer: source text in, mounted nodes (or error text) out.

use crate::error::SandboxError;
use crate::runtime::{self, ConsoleOutput, SandboxConfig};
use crate::surface::{MountSurface, Node};
use crate::transpile;
use anyhow::Error;
use deno_core::JsRuntime;

/// Owns one isolate and renders samples into surfaces.
///
/// The library globals are installed once when the runtime is created and
/// are never written again; every render reuses them.
pub struct Sandbox {
    runtime: JsRuntime,
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Result<Self, Error> {
        let runtime = runtime::create_runtime(&config)?;
        Ok(Self { runtime, config })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Render `source` into `target`.
    ///
    /// `render_expression`, when non-empty, is appended as the final
    /// statement and its value is what gets mounted; otherwise the source's
    /// own last expression is used. Every call fully replaces what the
    /// previous call left in `target`. Failures are written into `target`
    /// as text, or logged when `target` is `None`; nothing is returned.
    pub fn render(
        &mut self,
        source: &str,
        render_expression: &str,
        target: Option<&mut MountSurface>,
    ) {
        // Console output is kept for one render only
        runtime::take_console(&mut self.runtime);
        let outcome = self.build(source, render_expression);
        self.log_console();

        let Some(target) = target else {
            match outcome {
                Ok(_) => tracing::warn!(
                    error = %SandboxError::TargetMissing,
                    "sample compiled but has nothing to mount into"
                ),
                Err(error) => tracing::error!(kind = error.kind(), %error, "sample render failed"),
            }
            return;
        };

        unmount_quietly(target);
        match outcome {
            Ok(nodes) => {
                let generation = target.mount(nodes);
                tracing::debug!(surface = target.id(), generation, "sample mounted");
            }
            Err(error) => {
                tracing::debug!(surface = target.id(), kind = error.kind(), %error, "sample failed");
                target.set_text(error.to_string());
            }
        }
    }

    fn build(&mut self, source: &str, render_expression: &str) -> Result<Vec<Node>, SandboxError> {
        let code = transpile::compile(source, render_expression)?;
        runtime::evaluate(&mut self.runtime, &code, &self.config)
    }

    /// Console output of the last render. A second call returns nothing.
    pub fn take_console(&mut self) -> ConsoleOutput {
        runtime::take_console(&mut self.runtime)
    }

    fn log_console(&mut self) {
        let state = self.runtime.op_state();
        let state = state.borrow();
        let console = state.borrow::<ConsoleOutput>();
        for line in &console.logs {
            tracing::debug!(line = %line, "sample console.log");
        }
        for line in &console.warns {
            tracing::debug!(line = %line, "sample console.warn");
        }
        for line in &console.errors {
            tracing::debug!(line = %line, "sample console.error");
        }
    }
}

/// Teardown must never block the next mount; a failure is only logged.
fn unmount_quietly(target: &mut MountSurface) {
    if let Err(error) = target.unmount() {
        tracing::warn!(surface = target.id(), %error, "unmount before remount failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceContent;

    fn sandbox() -> Sandbox {
        Sandbox::new(SandboxConfig::default()).unwrap()
    }

    fn error_text(surface: &MountSurface) -> String {
        match surface.content() {
            SurfaceContent::Text(text) => text.clone(),
            other => panic!("expected error text, got {other:?}"),
        }
    }

    #[test]
    fn test_renders_simple_element() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render("<$.div>Hi</$.div>", "", Some(&mut surface));

        assert_eq!(surface.live_instances(), 1);
        assert_eq!(surface.text_content(), "Hi");
        assert_eq!(surface.to_html(), "<div>Hi</div>");
    }

    #[test]
    fn test_rendering_twice_keeps_one_instance() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render("<$.div>Hi</$.div>", "", Some(&mut surface));
        let once = surface.to_html();
        sandbox.render("<$.div>Hi</$.div>", "", Some(&mut surface));

        assert_eq!(surface.live_instances(), 1);
        assert_eq!(surface.to_html(), once);
        match surface.content() {
            SurfaceContent::Mounted(instance) => assert_eq!(instance.generation, 2),
            other => panic!("expected mounted instance, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_syntax_shows_error_and_clears_previous() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render("<$.div>Hi</$.div>", "", Some(&mut surface));
        sandbox.render("const x: = 1", "", Some(&mut surface));

        assert_eq!(surface.live_instances(), 0);
        assert!(!error_text(&surface).is_empty());
        assert!(!surface.to_html().contains("<div>"));
    }

    #[test]
    fn test_disallowed_import_names_specifier() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render("import fs from 'fs'; <$.div/>", "", Some(&mut surface));

        assert!(error_text(&surface).contains("fs"));
    }

    #[test]
    fn test_runtime_require_is_checked_too() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render(
            "const cp = require('child_process'); <$.div/>",
            "",
            Some(&mut surface),
        );

        assert!(error_text(&surface).contains("child_process"));
    }

    #[test]
    fn test_runtime_error_message_is_verbatim() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render("<$.div>{missingName}</$.div>", "", Some(&mut surface));

        assert_eq!(error_text(&surface), "missingName is not defined");
    }

    #[test]
    fn test_last_call_wins() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render("<$.b>A</$.b>", "", Some(&mut surface));
        sandbox.render("throw new Error('B failed')", "", Some(&mut surface));
        assert_eq!(error_text(&surface), "B failed");

        sandbox.render("throw new Error('A failed')", "", Some(&mut surface));
        sandbox.render("<$.b>B</$.b>", "", Some(&mut surface));
        assert_eq!(surface.to_html(), "<b>B</b>");
    }

    #[test]
    fn test_render_expression_names_component() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render(
            "import $ from '@stylix/core';\n\
             function App() {\n  return <$.span font-weight=\"bold\">App</$.span>;\n}",
            "<App />",
            Some(&mut surface),
        );

        assert_eq!(
            surface.to_html(),
            "<span style=\"font-weight: bold\">App</span>"
        );
    }

    #[test]
    fn test_style_props_resolve() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render(
            "<$.div id=\"box\" color=\"red\" margin={4} opacity={0.5} onClick={() => {}}>x</$.div>",
            "",
            Some(&mut surface),
        );

        assert_eq!(
            surface.to_html(),
            "<div id=\"box\" style=\"color: red; margin: 4px; opacity: 0.5\">x</div>"
        );
    }

    #[test]
    fn test_tiny_props_plugin() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render(
            "import { StylixProvider } from '@stylix/core';\n\
             import tinyProps from '@stylix/tinyprops';\n\
             <StylixProvider plugins={[tinyProps]}><$.div bg=\"blue\" mx={2} /></StylixProvider>",
            "",
            Some(&mut surface),
        );

        assert_eq!(
            surface.to_html(),
            "<div style=\"background: blue; margin-left: 2px; margin-right: 2px\"></div>"
        );
    }

    #[test]
    fn test_array_values_follow_media_breakpoints() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render("<$.p font-size={[20, 16, 12]}>t</$.p>", "", Some(&mut surface));

        match surface.content() {
            SurfaceContent::Mounted(instance) => match &instance.nodes[0] {
                Node::Element { style, media, .. } => {
                    assert_eq!(style, &vec![("font-size".to_string(), "20px".to_string())]);
                    let queries: Vec<_> = media.iter().map(|rule| rule.query.as_str()).collect();
                    assert_eq!(queries, vec!["(max-width: 1200px)", "(max-width: 768px)"]);
                }
                other => panic!("expected element, got {other:?}"),
            },
            other => panic!("expected mounted instance, got {other:?}"),
        }
    }

    #[test]
    fn test_null_target_never_panics() {
        let mut sandbox = sandbox();

        sandbox.render("<$.div>Hi</$.div>", "", None);
        sandbox.render("const x: = 1", "", None);
        sandbox.render("import fs from 'fs'; 1", "", None);
    }

    #[test]
    fn test_detached_target_still_mounts() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render("<$.i>one</$.i>", "", Some(&mut surface));
        surface.detach();
        sandbox.render("<$.i>two</$.i>", "", Some(&mut surface));

        assert_eq!(surface.live_instances(), 1);
        assert_eq!(surface.text_content(), "two");
    }

    #[test]
    fn test_hooks_and_fragments_render_statically() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render(
            "function Counter() {\n\
               const [count] = React.useState(3);\n\
               return <><$.span>{count}</$.span><$.span>!</$.span></>;\n\
             }",
            "<Counter />",
            Some(&mut surface),
        );

        assert_eq!(surface.to_html(), "<span>3</span><span>!</span>");
    }

    #[test]
    fn test_console_is_available_to_caller() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render("console.log('hello'); <$.div/>", "", Some(&mut surface));

        assert_eq!(sandbox.take_console().logs, vec!["hello".to_string()]);
        assert!(sandbox.take_console().is_empty());
    }

    #[test]
    fn test_console_holds_only_last_render() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render("console.log('first'); <$.div/>", "", Some(&mut surface));
        sandbox.render(
            "console.warn('second'); throw new Error('boom')",
            "",
            Some(&mut surface),
        );

        let console = sandbox.take_console();
        assert!(console.logs.is_empty());
        assert_eq!(console.warns, vec!["second".to_string()]);
    }

    #[test]
    fn test_dynamic_import_names_specifier() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render("import('fs'); <$.div>Hi</$.div>", "", Some(&mut surface));
        assert_eq!(surface.live_instances(), 0);
        assert!(error_text(&surface).contains("fs"));

        sandbox.render(
            "const name = ['child', 'process'].join('_');\nimport(name);\n<$.div>Hi</$.div>",
            "",
            Some(&mut surface),
        );
        assert!(error_text(&surface).contains("child_process"));
    }

    #[test]
    fn test_sanctioned_dynamic_import_still_mounts() {
        let mut sandbox = sandbox();
        let mut surface = MountSurface::new("demo");

        sandbox.render(
            "import('@stylix/tinyprops').then(() => {}); <$.div>ok</$.div>",
            "",
            Some(&mut surface),
        );

        assert_eq!(surface.to_html(), "<div>ok</div>");
    }
}
