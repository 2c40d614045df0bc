//! # Stylix Sandbox
//!
//! Live code samples for the Stylix documentation: TSX source is
//! transpiled, evaluated in a V8 isolate against a closed set of imports,
//! and mounted into a surface. Every render replaces the previous one.
//!
//! ## Sandbox Guarantees
//!
//! - **Closed imports**: only `@stylix/core` and `@stylix/tinyprops` resolve;
//!   static imports, `require()` and `import()` all answer from one table
//! - **No system access**: no fs, net, env or process APIs exist in the isolate
//! - **No stale output**: a failed render clears the previous mount and shows
//!   the error text instead
//! - **Never throws**: compile, import, evaluation and missing-target failures
//!   all stop at [`Sandbox::render`]
//! - **Bounded**: heap limit and a per-render timeout
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stylix_sandbox::{MountSurface, Sandbox, SandboxConfig};
//!
//! let mut sandbox = Sandbox::new(SandboxConfig::default()).unwrap();
//! let mut surface = MountSurface::new("intro");
//!
//! sandbox.render("<$.div color=\"SkyBlue\">Hi</$.div>", "", Some(&mut surface));
//! println!("{}", surface.to_html());
//! ```

mod debounce;
mod error;
mod fence;
mod loader;
mod modules;
mod runtime;
mod samples;
mod sandbox;
mod surface;
mod transpile;

pub use debounce::Debouncer;
pub use error::SandboxError;
pub use fence::CodeFence;
pub use loader::AllowListLoader;
pub use modules::{SanctionedModule, ALLOW_LIST};
pub use runtime::{ConsoleOutput, SandboxConfig};
pub use samples::{extract_samples, load_samples, CodeSample};
pub use sandbox::Sandbox;
pub use surface::{MediaRule, MountSurface, MountedInstance, Node, SurfaceContent, SurfaceError};
pub use transpile::compile;
