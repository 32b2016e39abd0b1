//! The XML event stream consumed and produced by the coder (Spec 4).
//!
//! This is the caller-facing model: an in-order sequence of document
//! events. The grammar-internal event kinds live in [`crate::grammar`].

use std::rc::Rc;

use crate::qname::QName;
use crate::typed_value::Value;

/// Content of a namespace-declaration event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsContent {
    /// The declared namespace URI, empty to rescind a binding.
    pub uri: Rc<str>,
    /// The bound prefix, empty for the default namespace.
    pub prefix: Rc<str>,
    /// True when this declaration supplies the namespace of the
    /// enclosing start-element.
    pub local_element_ns: bool,
}

/// Content of a processing-instruction event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiContent {
    /// The PI target.
    pub target: Rc<str>,
    /// The PI data, possibly empty.
    pub data: Rc<str>,
}

/// Content of a DOCTYPE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctypeContent {
    pub name: Rc<str>,
    pub public_id: Rc<str>,
    pub system_id: Rc<str>,
    /// The internal subset, possibly empty.
    pub text: Rc<str>,
}

/// One in-order XML event (Spec 4, Table 4-1).
#[derive(Debug, Clone, PartialEq)]
pub enum ExiEvent {
    StartDocument,
    EndDocument,
    /// Begins an element. The prefix inside the qname is only meaningful
    /// when prefixes are preserved.
    StartElement(Rc<QName>),
    EndElement,
    /// An attribute with its (possibly typed) value.
    Attribute { qname: Rc<QName>, value: Value },
    /// Character content, typed under schema-informed grammars.
    Characters(Value),
    NamespaceDeclaration(NsContent),
    Comment(Rc<str>),
    ProcessingInstruction(PiContent),
    Doctype(DoctypeContent),
    /// An unexpanded entity reference.
    EntityReference(Rc<str>),
    /// Marks a self-contained subtree.
    SelfContained,
}

impl ExiEvent {
    /// Convenience constructor for a start-element without namespace.
    pub fn start_element(local_name: &str) -> Self {
        Self::StartElement(Rc::new(QName::new("", local_name)))
    }

    /// Convenience constructor for string character content.
    pub fn characters(text: &str) -> Self {
        Self::Characters(Value::string(text))
    }

    /// Convenience constructor for a string-valued attribute.
    pub fn attribute(qname: QName, value: &str) -> Self {
        Self::Attribute {
            qname: Rc::new(qname),
            value: Value::string(value),
        }
    }
}
