//! Shared fixtures for unit tests

use crate::convert::ScalarType;
use crate::descriptor::{Descriptor, DescriptorRegistry, InheritancePolicy};
use crate::mapping::{ChoiceTarget, Mapping};

pub const EMP_NS: &str = "urn:example:employees";

/// The fixture descriptors, not yet initialized
pub fn descriptors() -> DescriptorRegistry {
    DescriptorRegistry::new()
        .with(
            Descriptor::new("Address")
                .with_namespace("e", EMP_NS)
                .with_schema_type("e:Address")
                .with_mapping(Mapping::direct("street", "street/text()"))
                .with_mapping(Mapping::direct("city", "city/text()")),
        )
        .with(
            Descriptor::new("Employee")
                .with_namespace("e", EMP_NS)
                .with_default_root("e:employee")
                .with_schema_type("e:Employee")
                .with_primary_key("@id")
                .with_mapping(Mapping::direct("id", "@id"))
                .with_mapping(Mapping::direct("name", "e:name/text()"))
                .with_mapping(Mapping::composite("address", "address", "Address"))
                .with_mapping(Mapping::object_reference("lead", "Employee", "@lead"))
                .with_mapping(Mapping::any_collection("extra")),
        )
        .with(
            Descriptor::new("Manager")
                .with_parent("Employee")
                .with_default_root("e:manager")
                .with_schema_type("e:Manager")
                .with_mapping(
                    Mapping::collection_reference("reports", "Employee", "reports/text()").single_node(),
                ),
        )
        .with(
            Descriptor::new("Department")
                .with_namespace("e", EMP_NS)
                .with_default_root("e:department")
                .with_mapping(Mapping::composite_collection("employees", "e:employee", "Employee")),
        )
        .with(
            Descriptor::new("Bag").with_default_root("bag").with_mapping(
                Mapping::choice_collection("items")
                    .with_choice("a/text()", ChoiceTarget::Scalar(ScalarType::String))
                    .with_choice("b", ChoiceTarget::Type("Address".to_string())),
            ),
        )
        .with(
            Descriptor::new("Doc")
                .with_default_root("doc")
                .with_mapping(Mapping::binary("data", "data")),
        )
        .with(
            Descriptor::new("Shape")
                .abstract_type()
                .with_default_root("shape")
                .with_inheritance(
                    InheritancePolicy::field("kind/text()")
                        .with_indicator_value("circle", "Circle")
                        .with_indicator_value("square", "Square"),
                ),
        )
        .with(
            Descriptor::new("Circle")
                .with_parent("Shape")
                .with_mapping(Mapping::direct("radius", "radius/text()").with_scalar(ScalarType::Int)),
        )
        .with(
            Descriptor::new("Square")
                .with_parent("Shape")
                .with_mapping(Mapping::direct("side", "side/text()").with_scalar(ScalarType::Int)),
        )
        .with(
            Descriptor::new("Contact")
                .with_default_root("contact")
                .with_mapping(Mapping::direct("name", "name/text()"))
                .with_mapping(Mapping::direct("email", "@email"))
                .with_mapping(Mapping::composite("address", "address", "Address"))
                .with_mapping(Mapping::direct("age", "age/text()").with_scalar(ScalarType::Int)),
        )
}

/// The fixture descriptors, initialized
pub fn registry() -> DescriptorRegistry {
    let mut registry = descriptors();
    registry
        .initialize()
        .unwrap_or_else(|e| panic!("fixture registry: {}", e));
    registry
}
