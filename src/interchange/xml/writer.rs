//! ECSchema XML writer.
//!
//! Writes any generation from 2.0 to 3.2. Older targets drop what they
//! cannot express: 2.0 has no enumerations, kinds of quantity or categories,
//! and nothing before 3.2 has unit or format items, so their references are
//! stripped and kinds of quantity fall back to the legacy `UNIT(FORMAT)` form.

use tracing::debug;

use crate::base::{EcVersion, ItemRef, SchemaKey};
use crate::interchange::assemble::primitive_element_name;
use crate::interchange::{WriteError, WriteOptions};
use crate::schema::standard::{
    APPLIES_TO_ENTITY_CLASS, CORE_SCHEMA_ALIAS, CORE_SCHEMA_NAME, core_custom_attributes, is_mixin_class,
};
use crate::schema::{
    ArrayBounds, ClassModifier, ClassType, CustomAttribute, CustomAttributes, EcClass, EcProperty, Enumeration,
    Format, FormatOverride, InstanceValue, ItemInfo, KindOfQuantity, PrimitiveTypeRef, PropertyKind,
    RelationshipConstraint, Schema, SchemaItem, Unit, UnitKind,
};

use super::dom::XmlElement;

/// Standard unit and format schemas, stripped from pre-3.2 documents.
const UNITS_SCHEMA_NAME: &str = "Units";
const FORMATS_SCHEMA_NAME: &str = "Formats";

pub(crate) fn write_document(schema: &Schema, options: &WriteOptions) -> Result<Vec<u8>, WriteError> {
    let writer = DocumentWriter {
        schema,
        version: options.ec_version,
    };
    writer.root().to_document()
}

struct DocumentWriter<'a> {
    schema: &'a Schema,
    version: EcVersion,
}

impl DocumentWriter<'_> {
    fn is_ec2(&self) -> bool {
        self.version == EcVersion::V2_0
    }

    fn root(&self) -> XmlElement {
        let schema = self.schema;
        let mut root = XmlElement::new("ECSchema").with_attr("schemaName", schema.name());
        if self.is_ec2() {
            root.push_attr("nameSpacePrefix", schema.alias());
            root.push_attr("version", schema.version().to_legacy_string());
        } else {
            root.push_attr("alias", schema.alias());
            root.push_attr("version", schema.version().to_string());
        }
        push_info(&mut root, schema.info());
        root.push_attr("xmlns", self.version.namespace());

        self.push_references(&mut root);
        if let Some(cas) = self.custom_attributes(&schema.custom_attributes) {
            root.push_child(cas);
        }
        for item in schema.items_in_write_order() {
            if let Some(el) = self.item(item) {
                root.push_child(el);
            }
        }
        root
    }

    fn push_references(&self, root: &mut XmlElement) {
        for reference in self.schema.reference_entries() {
            let name = reference.schema.name();
            if !self.version.supports_units()
                && (name.eq_ignore_ascii_case(UNITS_SCHEMA_NAME) || name.eq_ignore_ascii_case(FORMATS_SCHEMA_NAME))
            {
                debug!(schema = self.schema.name(), reference = name, version = %self.version, "stripping reference");
                continue;
            }
            root.push_child(self.reference_element(name, &reference.schema.key(), &reference.alias));
        }
        let has_mixins = self.schema.classes().any(EcClass::is_mixin);
        if has_mixins && !self.is_ec2() && self.schema.get_referenced_schema(CORE_SCHEMA_NAME).is_none() {
            let core = core_custom_attributes();
            root.push_child(self.reference_element(CORE_SCHEMA_NAME, &core.key(), CORE_SCHEMA_ALIAS));
        }
    }

    fn reference_element(&self, name: &str, key: &SchemaKey, alias: &str) -> XmlElement {
        let el = XmlElement::new("ECSchemaReference").with_attr("name", name);
        if self.is_ec2() {
            el.with_attr("version", key.version.to_legacy_string())
                .with_attr("prefix", alias)
        } else {
            el.with_attr("version", key.version.to_string())
                .with_attr("alias", alias)
        }
    }

    /// `alias:Name`, or the bare name for local items.
    fn qualify(&self, r: &ItemRef) -> String {
        if r.is_in(self.schema.name()) {
            return r.name.clone();
        }
        let alias = self
            .schema
            .alias_of(&r.schema)
            .or_else(|| r.is_in(CORE_SCHEMA_NAME).then_some(CORE_SCHEMA_ALIAS))
            .unwrap_or(r.schema.as_str());
        format!("{alias}:{}", r.name)
    }

    fn item(&self, item: &SchemaItem) -> Option<XmlElement> {
        let ec3 = !self.is_ec2();
        let units = self.version.supports_units();
        match item {
            SchemaItem::Class(class) => Some(self.class(class)),
            SchemaItem::Enumeration(e) if ec3 => Some(self.enumeration(e)),
            SchemaItem::KindOfQuantity(koq) if ec3 => Some(self.kind_of_quantity(koq)),
            SchemaItem::PropertyCategory(category) if ec3 => {
                let mut el = named("PropertyCategory", &category.info);
                el.push_attr("priority", category.priority.to_string());
                Some(el)
            }
            SchemaItem::UnitSystem(system) if units => Some(named("UnitSystem", &system.info)),
            SchemaItem::Phenomenon(phenomenon) if units => {
                let mut el = named("Phenomenon", &phenomenon.info);
                el.push_attr("definition", phenomenon.definition.as_str());
                Some(el)
            }
            SchemaItem::Unit(unit) if units => Some(self.unit(unit)),
            SchemaItem::Format(format) if units => Some(self.format(format)),
            other => {
                debug!(item = other.name(), version = %self.version, "item kind not written for this version");
                None
            }
        }
    }

    // ========================================================================
    // CLASSES
    // ========================================================================

    fn class(&self, class: &EcClass) -> XmlElement {
        let mut el = if self.is_ec2() {
            self.legacy_class_element(class)
        } else {
            self.class_element(class)
        };

        for base in class.base_classes() {
            el.push_child(XmlElement::new("BaseClass").with_text(self.qualify(base)));
        }
        if let Some(rel) = class.relationship() {
            el.push_child(self.constraint("Source", &rel.source));
            el.push_child(self.constraint("Target", &rel.target));
        }
        for property in class.properties() {
            if let Some(p) = self.property(property) {
                el.push_child(p);
            }
        }

        let mixin_marker = match &class.class_type {
            ClassType::Mixin { applies_to } if !self.is_ec2() => {
                let mut marker = CustomAttribute::new(is_mixin_class());
                if let Some(target) = applies_to {
                    marker = marker.with_value(APPLIES_TO_ENTITY_CLASS, self.qualify(target));
                }
                Some(marker)
            }
            _ => None,
        };
        let mut cas = self.custom_attributes(&class.custom_attributes);
        if let Some(marker) = mixin_marker {
            cas.get_or_insert_with(|| XmlElement::new("ECCustomAttributes"))
                .children
                .insert(0, self.custom_attribute(&marker));
        }
        if let Some(cas) = cas {
            el.push_child(cas);
        }
        el
    }

    fn class_element(&self, class: &EcClass) -> XmlElement {
        let (tag, modifier) = match &class.class_type {
            ClassType::Entity => ("ECEntityClass", class.modifier),
            ClassType::Mixin { .. } => ("ECEntityClass", ClassModifier::Abstract),
            ClassType::Struct => ("ECStructClass", class.modifier),
            ClassType::CustomAttribute { .. } => ("ECCustomAttributeClass", class.modifier),
            ClassType::Relationship(_) => ("ECRelationshipClass", class.modifier),
        };
        let mut el = named(tag, &class.info);
        el.push_attr("modifier", modifier.as_str());
        match &class.class_type {
            ClassType::CustomAttribute { applies_to } => el.push_opt_attr("appliesTo", applies_to.as_deref()),
            ClassType::Relationship(rel) => {
                el.push_attr("strength", rel.strength.as_str());
                el.push_attr("strengthDirection", rel.direction.as_str());
            }
            _ => {}
        }
        el
    }

    /// 2.0 `ECClass` with its type flags.
    fn legacy_class_element(&self, class: &EcClass) -> XmlElement {
        let tag = if class.relationship().is_some() {
            "ECRelationshipClass"
        } else {
            "ECClass"
        };
        let mut el = named(tag, &class.info);
        let is_domain = match class.class_type {
            ClassType::Entity | ClassType::Relationship(_) => class.modifier != ClassModifier::Abstract,
            _ => false,
        };
        el.push_attr("isDomainClass", bool_text(is_domain));
        if class.is_struct() {
            el.push_attr("isStruct", "True");
        }
        if class.is_custom_attribute_class() {
            el.push_attr("isCustomAttributeClass", "True");
        }
        if let Some(rel) = class.relationship() {
            el.push_attr("strength", rel.strength.as_str());
            el.push_attr("strengthDirection", rel.direction.as_str());
        }
        el
    }

    fn constraint(&self, tag: &str, constraint: &RelationshipConstraint) -> XmlElement {
        let mut el = XmlElement::new(tag);
        if self.is_ec2() {
            el.push_attr("cardinality", constraint.multiplicity.to_legacy_string());
        } else {
            el.push_attr("multiplicity", constraint.multiplicity.to_string());
        }
        el.push_attr("roleLabel", constraint.role_label.as_str());
        el.push_attr("polymorphic", bool_text(constraint.is_polymorphic).to_ascii_lowercase());
        if self.version >= EcVersion::V3_1 {
            el.push_opt_attr("abstractConstraint", constraint.abstract_constraint.as_ref().map(|r| self.qualify(r)));
        }
        if let Some(cas) = self.custom_attributes(&constraint.custom_attributes) {
            el.push_child(cas);
        }
        for class in &constraint.constraint_classes {
            el.push_child(XmlElement::new("Class").with_attr("class", self.qualify(class)));
        }
        el
    }

    // ========================================================================
    // PROPERTIES
    // ========================================================================

    fn property(&self, property: &EcProperty) -> Option<XmlElement> {
        let ec2 = self.is_ec2();
        let mut el = match &property.kind {
            PropertyKind::Primitive { ty } => {
                XmlElement::new("ECProperty").with_attr("typeName", self.primitive_type(ty))
            }
            PropertyKind::Struct { struct_class } => {
                XmlElement::new("ECStructProperty").with_attr("typeName", self.qualify(struct_class))
            }
            PropertyKind::PrimitiveArray { ty, bounds } => {
                let mut el = XmlElement::new("ECArrayProperty").with_attr("typeName", self.primitive_type(ty));
                push_bounds(&mut el, bounds);
                el
            }
            PropertyKind::StructArray { struct_class, bounds } => {
                let mut el = if ec2 {
                    XmlElement::new("ECArrayProperty")
                        .with_attr("typeName", self.qualify(struct_class))
                        .with_attr("isStruct", "True")
                } else {
                    XmlElement::new("ECStructArrayProperty").with_attr("typeName", self.qualify(struct_class))
                };
                push_bounds(&mut el, bounds);
                el
            }
            PropertyKind::Navigation { relationship, direction } => {
                if self.version < EcVersion::V3_1 {
                    debug!(property = property.name(), version = %self.version, "navigation property not written");
                    return None;
                }
                XmlElement::new("ECNavigationProperty")
                    .with_attr("relationshipName", self.qualify(relationship))
                    .with_attr("direction", direction.as_str())
            }
        };
        // propertyName leads the attribute list.
        el.attributes.insert(0, ("propertyName".to_string(), property.name().to_string()));
        el.push_opt_attr("displayLabel", property.display_label.as_deref());
        if !property.description.is_empty() {
            el.push_attr("description", property.description.as_str());
        }
        if property.is_readonly {
            el.push_attr("readOnly", "true");
        }
        if property.priority != 0 {
            el.push_attr("priority", property.priority.to_string());
        }
        if !ec2 {
            el.push_opt_attr("category", property.category.as_ref().map(|r| self.qualify(r)));
            el.push_opt_attr("kindOfQuantity", property.kind_of_quantity.as_ref().map(|r| self.qualify(r)));
        }
        el.push_opt_attr("extendedTypeName", property.extended_type.as_deref());
        el.push_opt_attr("minimumLength", property.min_length.map(|v| v.to_string()));
        el.push_opt_attr("maximumLength", property.max_length.map(|v| v.to_string()));
        el.push_opt_attr("minimumValue", property.min_value.map(|v| v.to_string()));
        el.push_opt_attr("maximumValue", property.max_value.map(|v| v.to_string()));
        if let Some(cas) = self.custom_attributes(&property.custom_attributes) {
            el.push_child(cas);
        }
        Some(el)
    }

    fn primitive_type(&self, ty: &PrimitiveTypeRef) -> String {
        match ty {
            PrimitiveTypeRef::Enumeration(r) if !self.is_ec2() => self.qualify(r),
            _ => primitive_element_name(self.schema, ty),
        }
    }

    // ========================================================================
    // ENUMERATIONS AND QUANTITIES
    // ========================================================================

    fn enumeration(&self, enumeration: &Enumeration) -> XmlElement {
        let mut el = named("ECEnumeration", &enumeration.info);
        el.push_attr("backingTypeName", enumeration.backing_type.primitive().type_name());
        el.push_attr("isStrict", bool_text(enumeration.is_strict).to_ascii_lowercase());
        for enumerator in enumeration.enumerators() {
            let mut child = XmlElement::new("ECEnumerator");
            if self.version >= EcVersion::V3_1 {
                child.push_attr("name", enumerator.name());
            }
            child.push_attr("value", enumerator.value.to_text());
            child.push_opt_attr("displayLabel", enumerator.display_label.as_deref());
            if !enumerator.description.is_empty() {
                child.push_attr("description", enumerator.description.as_str());
            }
            el.push_child(child);
        }
        el
    }

    fn kind_of_quantity(&self, koq: &KindOfQuantity) -> XmlElement {
        let mut el = named("KindOfQuantity", &koq.info);
        if self.version.supports_units() {
            el.push_opt_attr("persistenceUnit", koq.persistence_unit.as_ref().map(|r| self.qualify(r)));
            let formats: Vec<String> = koq
                .presentation_formats
                .iter()
                .map(|f| f.to_format_string(&|r: &ItemRef| self.prefix(r)))
                .collect();
            if !formats.is_empty() {
                el.push_attr("presentationUnits", formats.join(";"));
            }
        } else {
            el.push_opt_attr("persistenceUnit", koq.persistence_unit.as_ref().map(|r| r.name.clone()));
            let legacy: Vec<String> = koq
                .presentation_formats
                .iter()
                .filter_map(|f| legacy_presentation(f, koq.persistence_unit.as_ref()))
                .collect();
            if !legacy.is_empty() {
                el.push_attr("presentationUnits", legacy.join(";"));
            }
        }
        el.push_attr("relativeError", koq.relative_error.to_string());
        el
    }

    fn prefix(&self, r: &ItemRef) -> Option<String> {
        if r.is_in(self.schema.name()) {
            return None;
        }
        Some(self.schema.alias_of(&r.schema).unwrap_or(r.schema.as_str()).to_string())
    }

    // ========================================================================
    // UNITS AND FORMATS
    // ========================================================================

    fn unit(&self, unit: &Unit) -> XmlElement {
        let tag = match unit.kind {
            UnitKind::Regular => "Unit",
            UnitKind::Constant => "Constant",
            UnitKind::Inverted { .. } => "InvertedUnit",
        };
        let mut el = named(tag, &unit.info);
        if let Some(inverts) = unit.inverts() {
            el.push_attr("invertsUnit", self.qualify(inverts));
        }
        el.push_opt_attr("phenomenon", unit.phenomenon.as_ref().map(|r| self.qualify(r)));
        el.push_opt_attr("unitSystem", unit.unit_system.as_ref().map(|r| self.qualify(r)));
        el.push_opt_attr("definition", unit.definition.as_deref());
        el.push_opt_attr("numerator", unit.numerator.map(|v| v.to_string()));
        el.push_opt_attr("denominator", unit.denominator.map(|v| v.to_string()));
        el.push_opt_attr("offset", unit.offset.map(|v| v.to_string()));
        el
    }

    fn format(&self, format: &Format) -> XmlElement {
        let mut el = named("Format", &format.info);
        el.push_attr("type", format.format_type.as_str().to_ascii_lowercase());
        el.push_opt_attr("precision", format.precision.map(|v| v.to_string()));
        el.push_opt_attr("roundFactor", format.round_factor.map(|v| v.to_string()));
        el.push_opt_attr("minWidth", format.min_width.map(|v| v.to_string()));
        el.push_opt_attr("showSignOption", format.show_sign_option.as_deref());
        if !format.format_traits.is_empty() {
            el.push_attr("formatTraits", format.format_traits.join("|"));
        }
        el.push_opt_attr("decimalSeparator", format.decimal_separator.as_deref());
        el.push_opt_attr("thousandSeparator", format.thousand_separator.as_deref());
        el.push_opt_attr("uomSeparator", format.uom_separator.as_deref());
        el.push_opt_attr("scientificType", format.scientific_type.as_deref());
        el.push_opt_attr("stationOffsetSize", format.station_offset_size.map(|v| v.to_string()));
        el.push_opt_attr("stationSeparator", format.station_separator.as_deref());
        if let Some(composite) = &format.composite {
            let mut c = XmlElement::new("Composite");
            c.push_opt_attr("spacer", composite.spacer.as_deref());
            c.push_opt_attr("includeZero", composite.include_zero.map(|b| b.to_string()));
            for unit in &composite.units {
                let mut u = XmlElement::new("Unit").with_text(self.qualify(&unit.unit));
                u.push_opt_attr("label", unit.label.as_deref());
                c.push_child(u);
            }
            el.push_child(c);
        }
        el
    }

    // ========================================================================
    // CUSTOM ATTRIBUTES
    // ========================================================================

    fn custom_attributes(&self, cas: &CustomAttributes) -> Option<XmlElement> {
        if cas.is_empty() {
            return None;
        }
        let mut el = XmlElement::new("ECCustomAttributes");
        for ca in cas {
            el.push_child(self.custom_attribute(ca));
        }
        Some(el)
    }

    fn custom_attribute(&self, ca: &CustomAttribute) -> XmlElement {
        let namespace = match self.schema.resolve_schema(&ca.class.schema) {
            Some(owner) if self.is_ec2() => owner.key().legacy_full_name(),
            Some(owner) => owner.full_name(),
            None if ca.class.is_in(CORE_SCHEMA_NAME) => core_custom_attributes().full_name(),
            None => ca.class.schema.clone(),
        };
        let mut el = XmlElement::new(ca.class.name.as_str()).with_attr("xmlns", namespace);
        for (name, value) in &ca.values {
            el.push_child(instance_element(name, value));
        }
        el
    }
}

fn instance_element(tag: &str, value: &InstanceValue) -> XmlElement {
    match value {
        InstanceValue::Primitive(text) => XmlElement::new(tag).with_text(text.as_str()),
        InstanceValue::Array(members) => {
            let mut el = XmlElement::new(tag);
            for (member, v) in members {
                el.push_child(instance_element(member, v));
            }
            el
        }
        InstanceValue::Struct(map) => {
            let mut el = XmlElement::new(tag);
            for (member, v) in map {
                el.push_child(instance_element(member, v));
            }
            el
        }
    }
}

/// Element with `typeName`, `displayLabel` and `description`.
fn named(tag: &str, info: &ItemInfo) -> XmlElement {
    let mut el = XmlElement::new(tag).with_attr("typeName", info.name());
    push_info(&mut el, info);
    el
}

fn push_info(el: &mut XmlElement, info: &ItemInfo) {
    el.push_opt_attr("displayLabel", info.display_label.as_deref());
    if !info.description.is_empty() {
        el.push_attr("description", info.description.as_str());
    }
}

fn push_bounds(el: &mut XmlElement, bounds: &ArrayBounds) {
    el.push_attr("minOccurs", bounds.min_occurs.to_string());
    el.push_attr(
        "maxOccurs",
        bounds.max_occurs.map_or_else(|| "unbounded".to_string(), |m| m.to_string()),
    );
}

fn bool_text(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// `UNIT(FORMAT)` for 3.0 and 3.1 documents.
fn legacy_presentation(format: &FormatOverride, persistence: Option<&ItemRef>) -> Option<String> {
    let unit = format.units.first().map(|u| &u.unit).or(persistence)?;
    Some(format!("{}({})", unit.name, format.format.name))
}
