use crate::error::ConfigurationError;
use oxrdf::NamedNode;
use rdfox_runner::Namespaces;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

pub const PROBS_NAMESPACE: &str = "https://ukfires.org/probs/ontology/";
pub const SYSTEM_NAMESPACE: &str = "https://ukfires.org/probs/system/";
const RDF_NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const RDFS_NAMESPACE: &str = "http://www.w3.org/2000/01/rdf-schema#";

#[allow(clippy::expect_used, reason = "constant pattern")]
static PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Prefix\(\s*([A-Za-z_][\w.-]*)?:=\s*<([^>]*)>\s*\)").expect("valid pattern")
});

#[allow(clippy::expect_used, reason = "constant pattern")]
static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Declaration\(\s*(?:Class|ObjectProperty|DataProperty|AnnotationProperty|NamedIndividual|Datatype)\(\s*(<[^>]*>|[A-Za-z_]?[\w.-]*:[^\s()]*)\s*\)\s*\)",
    )
    .expect("valid pattern")
});

/// The prefixes used in every PRObs script and query.
pub fn probs_namespaces() -> Namespaces {
    Namespaces::new()
        .with("", PROBS_NAMESPACE)
        .with("sys", SYSTEM_NAMESPACE)
        .with("rdf", RDF_NAMESPACE)
        .with("rdfs", RDFS_NAMESPACE)
}

/// The concepts datasource mappings may refer to.
///
/// Concepts in a namespace owned by the ontology must be declared by it. Concepts from other
/// vocabularies (`rdfs:label`, ...) only need a known prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    namespaces: Namespaces,
    owned: Vec<String>,
    declared: BTreeSet<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(probs_namespaces())
    }
}

impl Vocabulary {
    /// A vocabulary that accepts every concept with a known prefix.
    pub fn new(namespaces: Namespaces) -> Self {
        Self {
            namespaces,
            owned: Vec::new(),
            declared: BTreeSet::new(),
        }
    }

    /// Reads the prefixes and entity declarations of an ontology in OWL functional syntax.
    pub fn from_ontology(text: &str) -> Self {
        let mut local = Namespaces::new();
        for captures in PREFIX.captures_iter(text) {
            let prefix = captures.get(1).map_or("", |m| m.as_str());
            if let Err(error) = local.insert(prefix, &captures[2]) {
                tracing::debug!(prefix, %error, "Ignoring invalid ontology prefix");
            }
        }

        let mut namespaces = probs_namespaces();
        for (prefix, iri) in local.iter() {
            if namespaces.get(prefix).is_none() {
                namespaces = namespaces.with(prefix, iri);
            }
        }

        let declared: BTreeSet<String> = DECLARATION
            .captures_iter(text)
            .filter_map(|captures| local.resolve(&captures[1]))
            .map(NamedNode::into_string)
            .collect();
        tracing::debug!(count = declared.len(), "Read ontology declarations");

        let owned = if declared.is_empty() {
            Vec::new()
        } else {
            local
                .get("")
                .map_or_else(|| vec![PROBS_NAMESPACE.to_owned()], |iri| vec![iri.to_owned()])
        };
        Self {
            namespaces,
            owned,
            declared,
        }
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Whether the vocabulary knows `iri`.
    pub fn is_declared(&self, iri: &str) -> bool {
        self.declared.contains(iri)
            || !self
                .owned
                .iter()
                .any(|namespace| iri.starts_with(namespace.as_str()))
    }

    /// Expands a concept written as `prefix:local` or `<iri>` and checks it is declared.
    pub fn resolve(&self, concept: &str) -> Result<NamedNode, ConfigurationError> {
        let node = self
            .namespaces
            .resolve(concept)
            .ok_or_else(|| ConfigurationError::UnknownPrefix(concept.to_owned()))?;
        if self.is_declared(node.as_str()) {
            Ok(node)
        } else {
            Err(ConfigurationError::UndeclaredConcept(concept.to_owned()))
        }
    }
}
