//! Module loader that only knows the sanctioned Stylix modules.
//! Blocks every other specifier: files, network, bare packages, data URLs.

use crate::modules;
use deno_core::{
    anyhow::{anyhow, Error},
    ModuleLoadResponse, ModuleLoader, ModuleSource, ModuleSourceCode, ModuleSpecifier,
    ModuleType, RequestedModuleType, ResolutionKind,
};

/// A module loader backed by the allow-list in [`crate::modules`].
///
/// Security guarantees:
/// - No filesystem access (nothing is ever read from disk)
/// - No network access (no URL scheme besides `stylix:` resolves)
/// - The module object handed out is the one bootstrap.js installed
#[derive(Debug, Default)]
pub struct AllowListLoader;

impl AllowListLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for AllowListLoader {
    fn resolve(
        &self,
        specifier: &str,
        _referrer: &str,
        _kind: ResolutionKind,
    ) -> Result<ModuleSpecifier, Error> {
        // Already resolved (e.g. re-entrant resolution of our own URL)
        if let Some(module) = modules::lookup_url(specifier) {
            return ModuleSpecifier::parse(module.url)
                .map_err(|e| anyhow!("Invalid module URL '{}': {}", module.url, e));
        }

        let module = modules::check(specifier).map_err(|e| anyhow!("{}", e))?;
        ModuleSpecifier::parse(module.url)
            .map_err(|e| anyhow!("Invalid module URL '{}': {}", module.url, e))
    }

    fn load(
        &self,
        module_specifier: &ModuleSpecifier,
        _maybe_referrer: Option<&ModuleSpecifier>,
        _is_dyn_import: bool,
        _requested_module_type: RequestedModuleType,
    ) -> ModuleLoadResponse {
        // Re-check: resolve() is not the only way a specifier reaches load()
        let Some(module) = modules::lookup_url(module_specifier.as_str()) else {
            return ModuleLoadResponse::Sync(Err(anyhow!(
                "Access denied: {}",
                module_specifier
            )));
        };

        ModuleLoadResponse::Sync(Ok(ModuleSource::new(
            ModuleType::JavaScript,
            ModuleSourceCode::String(module.esm_source().into()),
            module_specifier,
            None,
        )))
    }
}
