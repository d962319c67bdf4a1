use oxrdf::vocab::xsd;
use oxrdf::{Literal, NamedNode, NamedNodeRef, Term};
use oxsdatatypes::{Boolean, Double, Integer};
use std::fmt;
use std::str::FromStr;

/// A single value of a query answer.
///
/// Literals of the common XSD datatypes are turned into native values, everything else keeps
/// its RDF form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Iri(NamedNode),
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    /// A literal with a language tag, an unknown datatype or an invalid lexical form.
    Literal(Literal),
    /// A blank node (or a quoted triple).
    Other(Term),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            Self::Iri(node) => Some(node.as_str()),
            _ => None,
        }
    }

    /// The value as a number, integers included.
    #[allow(clippy::cast_precision_loss, reason = "Answers are compared as doubles")]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_iri(&self) -> Option<NamedNodeRef<'_>> {
        match self {
            Self::Iri(node) => Some(node.as_ref()),
            _ => None,
        }
    }
}

impl From<Term> for Value {
    fn from(term: Term) -> Self {
        match term {
            Term::NamedNode(node) => Self::Iri(node),
            Term::Literal(literal) => literal.into(),
            other => Self::Other(other),
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        if literal.language().is_some() {
            return Self::Literal(literal);
        }
        let datatype = literal.datatype();
        let native = if datatype == xsd::STRING {
            Some(Self::String(literal.value().to_owned()))
        } else if is_integer_type(datatype) {
            Integer::from_str(literal.value())
                .ok()
                .map(|value| Self::Integer(value.into()))
        } else if datatype == xsd::DOUBLE || datatype == xsd::FLOAT || datatype == xsd::DECIMAL {
            Double::from_str(literal.value())
                .ok()
                .map(|value| Self::Double(value.into()))
        } else if datatype == xsd::BOOLEAN {
            Boolean::from_str(literal.value())
                .ok()
                .map(|value| Self::Boolean(value.into()))
        } else {
            None
        };
        native.unwrap_or(Self::Literal(literal))
    }
}

fn is_integer_type(datatype: NamedNodeRef<'_>) -> bool {
    [
        xsd::INTEGER,
        xsd::LONG,
        xsd::INT,
        xsd::SHORT,
        xsd::BYTE,
        xsd::NON_NEGATIVE_INTEGER,
        xsd::NON_POSITIVE_INTEGER,
        xsd::NEGATIVE_INTEGER,
        xsd::POSITIVE_INTEGER,
        xsd::UNSIGNED_LONG,
        xsd::UNSIGNED_INT,
        xsd::UNSIGNED_SHORT,
        xsd::UNSIGNED_BYTE,
    ]
    .contains(&datatype)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(node) => f.write_str(node.as_str()),
            Self::String(value) => f.write_str(value),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Literal(literal) => write!(f, "{literal}"),
            Self::Other(term) => write!(f, "{term}"),
        }
    }
}
