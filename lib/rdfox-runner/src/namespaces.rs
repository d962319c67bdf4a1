use oxiri::{Iri, IriParseError};
use oxrdf::NamedNode;
use std::collections::BTreeMap;
use std::fmt::Write;

/// A set of prefix declarations shared by the engine script and every query.
///
/// Prefixes are kept sorted so rendered declarations are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    prefixes: BTreeMap<String, String>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a prefix. The empty prefix is the default namespace (`:`).
    pub fn insert(
        &mut self,
        prefix: impl Into<String>,
        iri: impl Into<String>,
    ) -> Result<(), IriParseError> {
        let iri = Iri::parse(iri.into())?;
        self.prefixes.insert(prefix.into(), iri.into_inner());
        Ok(())
    }

    /// Adds a prefix, skipping it with a debug message if `iri` is not absolute.
    #[must_use]
    pub fn with(mut self, prefix: &str, iri: &str) -> Self {
        if let Err(error) = self.insert(prefix, iri) {
            tracing::debug!(prefix, iri, %error, "Skipping invalid namespace");
        }
        self
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes
            .iter()
            .map(|(prefix, iri)| (prefix.as_str(), iri.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Expands `prefix:local` or `<iri>` into a named node.
    ///
    /// Returns [`None`] if the prefix is unknown or the result is not a valid IRI.
    pub fn resolve(&self, name: &str) -> Option<NamedNode> {
        if let Some(iri) = name.strip_prefix('<').and_then(|n| n.strip_suffix('>')) {
            return NamedNode::new(iri).ok();
        }
        let (prefix, local) = name.split_once(':')?;
        let namespace = self.prefixes.get(prefix)?;
        NamedNode::new(format!("{namespace}{local}")).ok()
    }

    /// Renders the declarations as engine shell commands.
    pub fn shell_declarations(&self) -> String {
        let mut out = String::new();
        for (prefix, iri) in self.iter() {
            let _ = writeln!(out, "prefix {prefix}: <{iri}>");
        }
        out
    }

    /// Renders the declarations as a SPARQL prologue.
    pub fn sparql_prologue(&self) -> String {
        let mut out = String::new();
        for (prefix, iri) in self.iter() {
            let _ = writeln!(out, "PREFIX {prefix}: <{iri}>");
        }
        out
    }
}
