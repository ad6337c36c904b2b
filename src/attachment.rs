//! Attachment transport
//!
//! Binary mappings hand byte storage to an attachment marshaller when the
//! output is an XOP package or a SwaRef is configured. The engine calls
//! these synchronously and only once per value; retry and I/O policy belong
//! to the transport.

use indexmap::IndexMap;

use crate::error::{OxmError, Result};
use crate::object::{ObjectGraph, ObjectId};
use crate::qname::QName;
use crate::value::{DataHandle, Value};

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Marshal-side transport
pub trait AttachmentMarshaller {
    /// Store an MTOM part; returns the href written into `xop:Include`
    fn add_mtom_attachment(&mut self, data: &[u8], mime_type: &str, element: &QName) -> Result<String>;

    /// Store a SwaRef part; returns the content id written as text
    fn add_swa_ref_attachment(&mut self, data: &[u8], mime_type: &str) -> Result<String>;

    fn is_xop_package(&self) -> bool;
}

/// Unmarshal-side transport
pub trait AttachmentUnmarshaller {
    fn get_attachment_as_bytes(&self, id: &str) -> Result<Vec<u8>>;

    fn get_attachment_as_handle(&self, id: &str) -> Result<DataHandle>;

    fn is_xop_package(&self) -> bool;
}

/// Where a binary value's mime type comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeTypePolicy {
    Fixed(String),
    /// Read from the named attribute of the owning object
    Attribute(String),
}

impl Default for MimeTypePolicy {
    fn default() -> Self {
        MimeTypePolicy::Fixed(DEFAULT_MIME_TYPE.to_string())
    }
}

impl MimeTypePolicy {
    /// Mime type for `value` owned by `owner`. A data handle carries its own.
    pub fn mime_type(&self, graph: &ObjectGraph, owner: ObjectId, value: &Value) -> String {
        if let Value::DataHandle(handle) = value {
            if !handle.content_type.is_empty() {
                return handle.content_type.clone();
            }
        }
        match self {
            MimeTypePolicy::Fixed(mime) => mime.clone(),
            MimeTypePolicy::Attribute(attribute) => graph
                .attribute(owner, attribute)
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_string(),
        }
    }
}

/// In-memory transport for both directions
#[derive(Debug, Clone, Default)]
pub struct InMemoryAttachments {
    xop: bool,
    parts: IndexMap<String, DataHandle>,
}

impl InMemoryAttachments {
    pub fn new(xop: bool) -> Self {
        InMemoryAttachments {
            xop,
            parts: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&DataHandle> {
        self.parts.get(content_id(id))
    }

    /// Store a part under an explicit id, as a receiving transport would
    pub fn insert(&mut self, id: &str, handle: DataHandle) {
        self.parts.insert(content_id(id).to_string(), handle);
    }

    fn store(&mut self, data: &[u8], mime_type: &str) -> String {
        let id = format!("{}@rustyoxm", self.parts.len() + 1);
        self.parts
            .insert(id.clone(), DataHandle::new(mime_type, data.to_vec()));
        format!("cid:{}", id)
    }
}

/// Strip a `cid:` scheme
fn content_id(id: &str) -> &str {
    id.strip_prefix("cid:").unwrap_or(id)
}

impl AttachmentMarshaller for InMemoryAttachments {
    fn add_mtom_attachment(&mut self, data: &[u8], mime_type: &str, _element: &QName) -> Result<String> {
        Ok(self.store(data, mime_type))
    }

    fn add_swa_ref_attachment(&mut self, data: &[u8], mime_type: &str) -> Result<String> {
        Ok(self.store(data, mime_type))
    }

    fn is_xop_package(&self) -> bool {
        self.xop
    }
}

impl AttachmentUnmarshaller for InMemoryAttachments {
    fn get_attachment_as_bytes(&self, id: &str) -> Result<Vec<u8>> {
        Ok(self.get_attachment_as_handle(id)?.content)
    }

    fn get_attachment_as_handle(&self, id: &str) -> Result<DataHandle> {
        self.get(id)
            .cloned()
            .ok_or_else(|| OxmError::Attachment(format!("no attachment with id '{}'", id)))
    }

    fn is_xop_package(&self) -> bool {
        self.xop
    }
}
