//! Element and attribute names shared across the translator crates.

/// Root element of every scenario document.
pub const SCENARIO: &str = "scenario";

/// Root attribute holding the integer schema version.
pub const SCHEMA_VERSION: &str = "schemaVersion";

/// Root attribute naming the schema file the document conforms to.
pub const SCHEMA_LOCATION: &str = "xsi:noNamespaceSchemaLocation";

/// Namespace declaration required by [`SCHEMA_LOCATION`].
pub const XMLNS_XSI: &str = "xmlns:xsi";

/// Value of [`XMLNS_XSI`].
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Root attribute holding the work-unit identifier.
pub const WU_ID: &str = "wuID";

/// Root attribute holding the assimilation mode (removed in version 24).
pub const ASSIM_MODE: &str = "assimMode";

/// Parameters element (a direct child of the root).
pub const PARAMETERS: &str = "parameters";

/// Placeholder some scenario templates carry instead of a parameters block.
pub const PARAMETERS_PLACEHOLDER: &str = "@parameters@";
