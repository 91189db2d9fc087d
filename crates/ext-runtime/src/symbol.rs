//! Symbols: named entries materialized from an extension archive.
//!
//! A symbol named `acme.audit.Sink` lives at `acme/audit/Sink.sym` inside
//! its archive and belongs to the namespace `acme.audit`.

use std::fmt;
use std::path::PathBuf;

/// File suffix of symbol entries inside an archive.
pub const SYMBOL_SUFFIX: &str = ".sym";

/// A symbol read from an extension archive.
///
/// Symbols are immutable and shared through `Arc`; two lookups that return
/// the same allocation (`Arc::ptr_eq`) observed the same definition.
#[derive(Debug, PartialEq, Eq)]
pub struct Symbol {
    name: String,
    namespace: Option<String>,
    origin: String,
    bytes: Vec<u8>,
}

impl Symbol {
    pub(crate) fn new(name: &str, origin: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace_of(name).map(str::to_string),
            origin: origin.to_string(),
            bytes,
        }
    }

    /// Fully qualified dotted name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Containing namespace, `None` for top-level names.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Name of the extension whose archive defined this symbol.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Raw entry bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Entry bytes as UTF-8 text, if they are valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (from {})", self.name, self.origin)
    }
}

/// Attributes a loader attaches to every namespace it defines.
///
/// Defining the same namespace twice with equal attributes is a no-op;
/// different attributes are a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub extension: String,
    pub version: String,
    pub source: PathBuf,
}

/// Archive entry path for a dotted symbol name.
pub fn entry_path(name: &str) -> String {
    format!("{}{}", name.replace('.', "/"), SYMBOL_SUFFIX)
}

/// Dotted symbol name for an archive entry path; `None` for entries that
/// are not symbols.
pub fn symbol_name(entry: &str) -> Option<String> {
    entry
        .strip_suffix(SYMBOL_SUFFIX)
        .filter(|stem| !stem.is_empty())
        .map(|stem| stem.replace('/', "."))
}

/// Dotted prefix of `name`, if any.
pub fn namespace_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(namespace, _)| namespace)
}

/// Whether `name` is `namespace` itself or lives underneath it.
pub fn in_namespace(name: &str, namespace: &str) -> bool {
    if namespace.is_empty() {
        return false;
    }
    name == namespace
        || name
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with('.'))
}
