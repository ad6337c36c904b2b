//! Binary and Binary-Collection mappings.
//!
//! Per value the write side picks one of three encodings, in order:
//! a SwaRef content id (when configured and a transport is present), an
//! `xop:Include` element (when the transport packages XOP and the mapping
//! is not forced inline), else inline base64 text. Reads accept any of
//! the three.

use crate::attachment::{AttachmentUnmarshaller, MimeTypePolicy, DEFAULT_MIME_TYPE};
use crate::container::ContainerPolicy;
use crate::context::{MarshalContext, UnmarshalContext};
use crate::convert::ScalarType;
use crate::dom::namespace::{ns, prefix};
use crate::dom::NodeId;
use crate::error::{OxmError, Result};
use crate::object::ObjectId;
use crate::path::Path;
use crate::qname::QName;
use crate::record::{ReadRecord, WriteRecord};
use crate::value::{DataHandle, Value};

#[derive(Debug, Clone, Default)]
pub struct BinaryMapping {
    pub mime_type: MimeTypePolicy,
    pub swa_ref: bool,
    /// Never externalize as an XOP attachment
    pub should_inline: bool,
    /// Materialize as `Value::DataHandle` instead of `Value::Bytes`
    pub as_data_handle: bool,
    pub container: ContainerPolicy,
}

impl BinaryMapping {
    fn fetch(&self, transport: &dyn AttachmentUnmarshaller, id: &str) -> Result<Value> {
        if self.as_data_handle {
            Ok(Value::DataHandle(transport.get_attachment_as_handle(id)?))
        } else {
            Ok(Value::Bytes(transport.get_attachment_as_bytes(id)?))
        }
    }

    fn read_node(
        &self,
        path: &Path,
        rec: &ReadRecord<'_>,
        node: NodeId,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value> {
        let tree = rec.tree();
        if !path.is_attribute() {
            let include = tree
                .element_children(node)
                .into_iter()
                .find(|&c| tree.matches(c, Some(ns::XOP), "Include"));
            if let Some(include) = include {
                let href = tree
                    .attribute(include, None, "href")
                    .ok_or_else(|| OxmError::Attachment("xop:Include without href".to_string()))?;
                let transport = ctx.attachments.ok_or_else(|| {
                    OxmError::Attachment(format!("no attachment unmarshaller to fetch '{}'", href))
                })?;
                return self.fetch(transport, href);
            }
        }

        let text = rec.value_at(node, path).unwrap_or_default();
        if self.swa_ref {
            if let Some(transport) = ctx.attachments {
                return self.fetch(transport, text.trim());
            }
        }
        let bytes = match ctx.conversion.from_text(&text, ScalarType::Base64Binary)? {
            Value::Bytes(bytes) => bytes,
            other => return Err(OxmError::conversion(other.type_label(), ScalarType::Base64Binary)),
        };
        if self.as_data_handle {
            let mime = match &self.mime_type {
                MimeTypePolicy::Fixed(mime) => mime.as_str(),
                MimeTypePolicy::Attribute(_) => DEFAULT_MIME_TYPE,
            };
            return Ok(Value::DataHandle(DataHandle::new(mime, bytes)));
        }
        Ok(Value::Bytes(bytes))
    }

    pub fn read_object(
        &self,
        path: &Path,
        rec: &ReadRecord<'_>,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Option<Value>> {
        let Some(&node) = rec.get_nodes(path).first() else {
            return Ok(None);
        };
        if path.is_attribute() && rec.value_at(node, path).is_none() {
            return Ok(None);
        }
        self.read_node(path, rec, node, ctx).map(Some)
    }

    pub fn read_collection(
        &self,
        path: &Path,
        rec: &ReadRecord<'_>,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value> {
        let nodes = rec.get_nodes(path);
        let mut container = self.container.sized(nodes.len());
        for node in nodes {
            let value = self.read_node(path, rec, node, ctx)?;
            self.container.add(&mut container, value, ctx.graph())?;
        }
        Ok(container)
    }

    fn write_value(
        &self,
        path: &Path,
        value: &Value,
        owner: ObjectId,
        append: bool,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        let bytes = value
            .as_bytes()
            .ok_or_else(|| OxmError::conversion(value.type_label(), ScalarType::Base64Binary))?;
        let mime = self.mime_type.mime_type(ctx.graph, owner, value);
        let locate = |rec: &mut WriteRecord<'_>| {
            if append {
                rec.add_nested(path)
            } else {
                rec.create_nested(path)
            }
        };

        if self.swa_ref {
            if let Some(transport) = ctx.attachments.as_deref_mut() {
                let cid = transport.add_swa_ref_attachment(bytes, &mime)?;
                let node = locate(rec);
                rec.write_value(node, path, &cid, false);
                return Ok(());
            }
        }

        if !self.should_inline && !path.is_attribute() {
            let xop = ctx.attachments.as_deref_mut().filter(|t| t.is_xop_package());
            if let Some(transport) = xop {
                let element = path
                    .last_element()
                    .map(|f| f.qname())
                    .unwrap_or_else(|| QName::local(""));
                let href = transport.add_mtom_attachment(bytes, &mime, &element)?;
                let node = locate(rec);
                let include = rec.create_child(node, Some(ns::XOP), "Include", prefix::XOP);
                rec.set_attribute(include, &QName::local("href"), "", &href);
                return Ok(());
            }
        }

        let text = ctx.conversion.to_text(value, ScalarType::Base64Binary)?;
        let node = locate(rec);
        rec.write_value(node, path, &text, false);
        Ok(())
    }

    pub fn write_object(
        &self,
        path: &Path,
        value: &Value,
        owner: ObjectId,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.write_value(path, value, owner, false, rec, ctx)
    }

    pub fn write_collection(
        &self,
        path: &Path,
        value: &Value,
        owner: ObjectId,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        for item in self.container.iter(value)? {
            if !item.is_null() {
                self.write_value(path, item, owner, true, rec, ctx)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::InMemoryAttachments;
    use crate::config::{MarshalConfig, ReferencePolicy, UnmarshalConfig};
    use crate::context::XmlContext;
    use crate::descriptor::{Descriptor, DescriptorRegistry};
    use crate::mapping::Mapping;
    use crate::object::ObjectGraph;

    fn mail() -> XmlContext {
        let registry = DescriptorRegistry::new().with(
            Descriptor::new("Mail")
                .with_default_root("mail")
                .with_mapping(
                    Mapping::binary("photo", "photo")
                        .swa_ref()
                        .with_mime_type(MimeTypePolicy::Fixed("image/png".to_string())),
                )
                .with_mapping(Mapping::binary("thumb", "thumb").inline())
                .with_mapping(Mapping::binary("scan", "scan").as_data_handle()),
        );
        XmlContext::new(registry).unwrap()
    }

    #[test]
    fn test_swa_ref_and_forced_inline() {
        let ctx = mail();
        let mut graph = ObjectGraph::new();
        let id = graph.create("Mail");
        graph.set_attribute(id, "photo", Value::Bytes(b"png".to_vec()));
        graph.set_attribute(id, "thumb", Value::Bytes(b"hi".to_vec()));

        let mut transport = InMemoryAttachments::new(true);
        let xml = ctx
            .marshal_to_string_with_attachments(
                &graph,
                &Value::Object(id),
                &MarshalConfig::default().with_declaration(false),
                &mut transport,
            )
            .unwrap();
        assert_eq!(xml, "<mail><photo>cid:1@rustyoxm</photo><thumb>aGk=</thumb></mail>");
        assert_eq!(transport.len(), 1);
        let stored = transport.get("cid:1@rustyoxm").unwrap();
        assert_eq!(stored.content, b"png".to_vec());
        assert_eq!(stored.content_type, "image/png");

        let mut back = ObjectGraph::new();
        let out = ctx
            .unmarshal_str_with_attachments(
                &xml,
                &mut back,
                &UnmarshalConfig::new(ReferencePolicy::Strict),
                &transport,
            )
            .unwrap();
        let mail = out.object().unwrap();
        assert_eq!(back.attribute(mail, "photo"), Some(&Value::Bytes(b"png".to_vec())));
        assert_eq!(back.attribute(mail, "thumb"), Some(&Value::Bytes(b"hi".to_vec())));
    }

    #[test]
    fn test_swa_ref_unknown_content_id() {
        let ctx = mail();
        let transport = InMemoryAttachments::new(false);
        let mut graph = ObjectGraph::new();
        let result = ctx.unmarshal_str_with_attachments(
            "<mail><photo>cid:missing</photo></mail>",
            &mut graph,
            &UnmarshalConfig::new(ReferencePolicy::Strict),
            &transport,
        );
        assert!(matches!(result, Err(OxmError::Attachment(_))));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_inline_data_handle() {
        let ctx = mail();
        let mut graph = ObjectGraph::new();
        let out = ctx
            .unmarshal_str(
                "<mail><scan>aGk=</scan></mail>",
                &mut graph,
                &UnmarshalConfig::new(ReferencePolicy::Strict),
            )
            .unwrap();
        let Some(Value::DataHandle(handle)) = graph.attribute(out.object().unwrap(), "scan") else {
            panic!("scan is not a data handle");
        };
        assert_eq!(handle.content, b"hi".to_vec());
        assert_eq!(handle.content_type, DEFAULT_MIME_TYPE);
    }
}
