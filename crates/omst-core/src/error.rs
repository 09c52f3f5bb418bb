//! # Error Types: Document Structure and Codec Failures
//!
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Structural errors name the parent element and the offending child or
//!   attribute, so a step failure message points at the exact spot in the
//!   scenario file.
//! - Codec errors carry the byte position reported by the XML reader.

use thiserror::Error;

/// Error raised by the document tree or the XML codec.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    /// More than one direct child carries a name the format allows only once.
    #[error("expected <{parent}> to have at most one <{name}> element, found {count}")]
    DuplicateChild {
        /// Name of the parent element.
        parent: String,
        /// Name of the duplicated child.
        name: String,
        /// Number of matching children.
        count: usize,
    },

    /// A required child element is absent.
    #[error("<{parent}> has no <{name}> element")]
    MissingElement {
        /// Name of the parent element.
        parent: String,
        /// Name of the missing child.
        name: String,
    },

    /// A required attribute is absent.
    #[error("<{element}> has no attribute '{name}'")]
    MissingAttribute {
        /// Name of the element.
        element: String,
        /// Name of the missing attribute.
        name: String,
    },

    /// An attribute or text value cannot be interpreted.
    #[error("<{element}> {field}=\"{value}\": {reason}")]
    InvalidValue {
        /// Name of the element.
        element: String,
        /// Attribute name, or `#text` for text content.
        field: String,
        /// Raw value found in the document.
        value: String,
        /// Why the value is unusable.
        reason: String,
    },

    /// The handle does not refer to an element (text, comment, CDATA).
    #[error("node {0} is not an element")]
    NotAnElement(usize),

    /// A structural edit would make a node its own ancestor.
    #[error("cannot move <{node}> beneath itself")]
    CyclicMove {
        /// Name of the node being moved.
        node: String,
    },

    /// A positional reference node is not a child of the target parent.
    #[error("<{reference}> is not a child of <{parent}>")]
    NotAChild {
        /// Name of the intended parent.
        parent: String,
        /// Name of the reference node.
        reference: String,
    },

    /// The input is not well-formed XML.
    #[error("XML parse error at byte {position}: {reason}")]
    Parse {
        /// Byte offset reported by the reader.
        position: u64,
        /// Reader diagnostic.
        reason: String,
    },

    /// The input parsed but has no single root element.
    #[error("document has no root element")]
    NoRoot,
}
