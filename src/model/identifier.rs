//! Stable string identities for modules and source nodes.
//!
//! Numeric ids are only meaningful inside one `GlobalIndex` instance. The
//! identities here are the portable form: they survive across independent
//! profiling runs and are the keys the merge engine matches on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::config::{LANG_INTERNAL_MODULE_NAME, SELF_MODULE_NAME};

/// Identity of a module: a third-party dependency (`name@version`) or one of
/// the reserved identities for own code and runtime internals
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleIdentity {
    pub name: String,
    pub version: String,
}

impl ModuleIdentity {
    /// Identity of a third-party module
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Reserved identity for the profiled project's own source code
    pub fn own_code() -> Self {
        Self {
            name: SELF_MODULE_NAME.to_string(),
            version: String::new(),
        }
    }

    /// Reserved identity for language/runtime-internal files
    pub fn lang_internal() -> Self {
        Self {
            name: LANG_INTERNAL_MODULE_NAME.to_string(),
            version: String::new(),
        }
    }

    pub fn is_own_code(&self) -> bool {
        self.name == SELF_MODULE_NAME
    }

    pub fn is_lang_internal(&self) -> bool {
        self.name == LANG_INTERNAL_MODULE_NAME
    }

    /// Portable identifier string: `name@version`, or the bare reserved name
    pub fn identifier(&self) -> String {
        if self.version.is_empty() {
            self.name.clone()
        } else {
            format!("{}@{}", self.name, self.version)
        }
    }

    /// Parse an identifier produced by [`Self::identifier`].
    ///
    /// The version is everything after the last `@`, so scoped names like
    /// `@scope/pkg@1.2.3` survive the round trip.
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier.rsplit_once('@') {
            // a leading @ belongs to the scope, not the version separator
            Some((name, version)) if !name.is_empty() => Self::new(name, version),
            _ => Self::new(identifier, ""),
        }
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// The portable identity triple of one source node: which module, which file
/// and which nested scope inside that file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceNodeIdentity {
    /// Module the file belongs to
    pub module: ModuleIdentity,

    /// File path, relative to the module or execution root
    pub path: String,

    /// Canonical nested scope identifier, e.g. `{root}.{class:X}.{method:y}`
    pub identifier: String,
}

impl SourceNodeIdentity {
    pub fn new(
        module: ModuleIdentity,
        path: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            module,
            path: path.into(),
            identifier: identifier.into(),
        }
    }

    /// A scope inside the project's own source code
    pub fn own_code(path: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::new(ModuleIdentity::own_code(), path, identifier)
    }

    /// A scope inside a language/runtime-internal file
    pub fn lang_internal(path: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::new(ModuleIdentity::lang_internal(), path, identifier)
    }

    /// The global identifier string the merge engine groups on
    pub fn global_identifier(&self) -> String {
        format!("{}|{}|{}", self.module.identifier(), self.path, self.identifier)
    }
}

impl fmt::Display for SourceNodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.global_identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_identifier_round_trip() {
        let module = ModuleIdentity::new("left-pad", "1.3.0");
        assert_eq!(module.identifier(), "left-pad@1.3.0");
        assert_eq!(ModuleIdentity::from_identifier("left-pad@1.3.0"), module);
    }

    #[test]
    fn test_scoped_module_identifier_round_trip() {
        let module = ModuleIdentity::new("@scope/pkg", "2.0.1");
        assert_eq!(module.identifier(), "@scope/pkg@2.0.1");
        assert_eq!(ModuleIdentity::from_identifier("@scope/pkg@2.0.1"), module);
    }

    #[test]
    fn test_reserved_identities() {
        assert!(ModuleIdentity::own_code().is_own_code());
        assert!(ModuleIdentity::lang_internal().is_lang_internal());
        assert_eq!(ModuleIdentity::own_code().identifier(), "{self}");
        assert_eq!(
            ModuleIdentity::from_identifier("{self}"),
            ModuleIdentity::own_code()
        );
    }

    #[test]
    fn test_global_identifier_combines_all_three_parts() {
        let identity =
            SourceNodeIdentity::own_code("./src/app.ts", "{root}.{class:App}.{method:run}");
        assert_eq!(
            identity.global_identifier(),
            "{self}|./src/app.ts|{root}.{class:App}.{method:run}"
        );
    }
}
