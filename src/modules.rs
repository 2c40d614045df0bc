//! The closed table of modules a code sample may import.
//!
//! Both the static import check in [`crate::transpile`] and the runtime
//! resolvers (`__sandbox_require__` in bootstrap.js and
//! [`AllowListLoader`](crate::AllowListLoader)) answer from this table.

use crate::error::SandboxError;

/// A module a sample is allowed to import.
#[derive(Debug)]
pub struct SanctionedModule {
    /// Exact import specifier, e.g. `@stylix/core`.
    pub specifier: &'static str,
    /// URL the module loader hands to V8 for `import()`.
    pub url: &'static str,
    /// Named exports besides `default`.
    pub named_exports: &'static [&'static str],
}

pub static ALLOW_LIST: &[SanctionedModule] = &[
    SanctionedModule {
        specifier: "@stylix/core",
        url: "stylix:core",
        named_exports: &["StylixProvider", "StylixContext", "useStylixContext"],
    },
    SanctionedModule {
        specifier: "@stylix/tinyprops",
        url: "stylix:tinyprops",
        named_exports: &[],
    },
];

/// Look up a module by its import specifier.
pub fn lookup(specifier: &str) -> Option<&'static SanctionedModule> {
    ALLOW_LIST.iter().find(|m| m.specifier == specifier)
}

/// Look up a module by the URL the loader resolved it to.
pub fn lookup_url(url: &str) -> Option<&'static SanctionedModule> {
    ALLOW_LIST.iter().find(|m| m.url == url)
}

/// Accept a sanctioned specifier, reject anything else by name.
pub fn check(specifier: &str) -> Result<&'static SanctionedModule, SandboxError> {
    lookup(specifier).ok_or_else(|| SandboxError::ImportViolation {
        specifier: specifier.to_string(),
    })
}

impl SanctionedModule {
    /// ES module text re-exporting the runtime's module object, so that
    /// `import()` sees the same instance as `__sandbox_require__`.
    pub fn esm_source(&self) -> String {
        let specifier = serde_json::to_string(self.specifier).unwrap_or_default();
        let mut code = format!(
            "const m = globalThis.__sandbox_require__({});\nexport default m.default;\n",
            specifier
        );
        for name in self.named_exports {
            code.push_str(&format!("export const {name} = m.{name};\n"));
        }
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_is_exactly_two_modules() {
        let specifiers: Vec<_> = ALLOW_LIST.iter().map(|m| m.specifier).collect();
        assert_eq!(specifiers, vec!["@stylix/core", "@stylix/tinyprops"]);
    }

    #[test]
    fn test_check_rejects_by_name() {
        assert!(check("@stylix/core").is_ok());
        assert!(check("@stylix/tinyprops").is_ok());

        for bad in ["fs", "react", "@stylix/core/internal", "./local.js", "@STYLIX/core"] {
            match check(bad) {
                Err(SandboxError::ImportViolation { specifier }) => assert_eq!(specifier, bad),
                other => panic!("expected violation for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_esm_source_reexports_named() {
        let core = lookup("@stylix/core").unwrap();
        let code = core.esm_source();
        assert!(code.contains("__sandbox_require__(\"@stylix/core\")"));
        assert!(code.contains("export default m.default;"));
        assert!(code.contains("export const StylixProvider = m.StylixProvider;"));
    }

    #[test]
    fn test_lookup_url() {
        assert_eq!(lookup_url("stylix:tinyprops").unwrap().specifier, "@stylix/tinyprops");
        assert!(lookup_url("file:///etc/passwd").is_none());
    }
}
