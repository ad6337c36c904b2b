//! Operation configuration

use crate::dom::WriteOptions;

/// What to do with references whose keys match no object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePolicy {
    /// Fail the unmarshal call with `OxmError::UnresolvedReferences`
    Strict,
    /// Log each one and report them alongside the result
    Lenient,
}

/// Unmarshal options. There is no `Default`; the reference policy is always
/// chosen by the caller.
#[derive(Debug, Clone)]
pub struct UnmarshalConfig {
    pub reference_policy: ReferencePolicy,
}

impl UnmarshalConfig {
    pub fn new(reference_policy: ReferencePolicy) -> Self {
        UnmarshalConfig { reference_policy }
    }
}

/// Marshal options
#[derive(Debug, Clone)]
pub struct MarshalConfig {
    pub formatted_output: bool,
    pub indent: String,
    pub xml_declaration: bool,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        MarshalConfig {
            formatted_output: false,
            indent: "  ".to_string(),
            xml_declaration: true,
        }
    }
}

impl MarshalConfig {
    pub fn formatted(mut self, formatted: bool) -> Self {
        self.formatted_output = formatted;
        self
    }

    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.xml_declaration = declaration;
        self
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            xml_declaration: self.xml_declaration,
            formatted: self.formatted_output,
            indent: self.indent.clone(),
        }
    }
}
