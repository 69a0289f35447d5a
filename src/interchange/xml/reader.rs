//! ECSchema XML reader.
//!
//! Reads every document generation from 2.0 to 3.2 into a [`SchemaDraft`];
//! the generation is taken from the root element's namespace. Differences
//! between generations are absorbed here (legacy class flags, cardinalities,
//! unnamed enumerators) so assembly only sees the current model.

use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{trace, warn};

use crate::base::{EcVersion, ItemRef, SchemaKey, SchemaVersion, is_valid_name};
use crate::context::ReadContext;
use crate::interchange::assemble::{KoqText, RefStyle, ReferenceDecl, SchemaDraft, assemble, raw_ref};
use crate::interchange::{DocumentFormat, ReadError};
use crate::schema::{
    ArrayBounds, ClassModifier, ClassType, CompositeSpec, CustomAttribute, CustomAttributes, EcClass,
    EcProperty, EnumBackingType, EnumValue, Enumeration, Format, FormatType, InstanceValue, ItemInfo,
    KindOfQuantity, Multiplicity, NavigationDirection, Phenomenon, PrimitiveType, PrimitiveTypeRef,
    PropertyCategory, PropertyKind, RelationshipConstraint, RelationshipInfo, Schema, SchemaItem,
    StrengthDirection, StrengthType, Unit, UnitKind, UnitLabel, UnitSystem,
};

use super::dom::XmlElement;

const FORMAT: DocumentFormat = DocumentFormat::Xml;

/// Read a schema document and register it in `ctx`.
pub(crate) fn read_document(input: &[u8], ctx: &mut ReadContext) -> Result<Arc<Schema>, ReadError> {
    let root = XmlElement::parse(input)?;
    let draft = DocumentReader::read(&root)?;
    assemble(draft, ctx)
}

/// Name and version from the root element, without reading the rest.
pub(crate) fn peek_schema_key(input: &[u8]) -> Option<SchemaKey> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).ok()? {
            Event::Start(e) | Event::Empty(e) => {
                let mut name = None;
                let mut version = None;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().ok()?.to_string();
                    match attr.key.local_name().as_ref() {
                        b"schemaName" => name = Some(value),
                        b"version" => version = SchemaVersion::parse(&value),
                        _ => {}
                    }
                }
                return Some(SchemaKey::from_version(
                    name?,
                    version.unwrap_or(SchemaVersion::new(1, 0, 0)),
                ));
            }
            Event::Eof => return None,
            _ => {}
        }
        buf.clear();
    }
}

struct DocumentReader {
    ec_version: EcVersion,
    draft: SchemaDraft,
}

impl DocumentReader {
    fn read(root: &XmlElement) -> Result<SchemaDraft, ReadError> {
        let mut reader = Self::read_header(root)?;
        for child in &root.children {
            reader.read_child(child)?;
        }
        Ok(reader.draft)
    }

    // ========================================================================
    // HEADER
    // ========================================================================

    fn read_header(root: &XmlElement) -> Result<Self, ReadError> {
        if root.local_name() != "ECSchema" {
            return Err(ReadError::invalid(
                FORMAT,
                format!("root element must be ECSchema, found '{}'", root.name),
            ));
        }
        let ec_version = root
            .attributes
            .iter()
            .filter(|(k, _)| k == "xmlns" || k.starts_with("xmlns:"))
            .find_map(|(_, v)| EcVersion::from_namespace(v))
            .ok_or_else(|| ReadError::invalid(FORMAT, "ECSchema has no recognized ECXML namespace"))?;

        let name = root
            .attr("schemaName")
            .ok_or_else(|| ReadError::missing_attribute(FORMAT, "ECSchema", "schemaName"))?
            .trim()
            .to_string();
        let version = match root.attr("version").and_then(SchemaVersion::parse) {
            Some(v) => v,
            None => {
                warn!(schema = %name, version = ?root.attr("version"), "invalid schema version; using 01.00.00");
                SchemaVersion::new(1, 0, 0)
            }
        };
        let alias = if ec_version.is_ec3() {
            root.non_empty_attr("alias")
                .ok_or_else(|| ReadError::missing_attribute(FORMAT, "ECSchema", "alias"))?
                .trim()
                .to_string()
        } else {
            root.non_empty_attr("nameSpacePrefix").unwrap_or(&name).trim().to_string()
        };

        let mut draft = SchemaDraft::new(FORMAT, ec_version, RefStyle::Alias, name, alias, version);
        draft.display_label = root.attr("displayLabel").map(str::to_string);
        draft.description = root.attr("description").unwrap_or_default().to_string();
        Ok(Self { ec_version, draft })
    }

    fn read_child(&mut self, el: &XmlElement) -> Result<(), ReadError> {
        let item = match el.local_name() {
            "ECSchemaReference" => {
                let reference = self.read_reference(el)?;
                self.draft.references.push(reference);
                return Ok(());
            }
            "ECCustomAttributes" => {
                self.draft.custom_attributes = read_custom_attributes(el);
                return Ok(());
            }
            "ECClass" => self.read_legacy_class(el)?,
            "ECEntityClass" => self.read_class(el, ClassType::Entity)?,
            "ECStructClass" => self.read_class(el, ClassType::Struct)?,
            "ECCustomAttributeClass" => self.read_class(
                el,
                ClassType::CustomAttribute {
                    applies_to: el.non_empty_attr("appliesTo").map(str::to_string),
                },
            )?,
            "ECRelationshipClass" => self.read_relationship(el)?,
            "ECEnumeration" => self.read_enumeration(el)?,
            "KindOfQuantity" => self.read_kind_of_quantity(el)?,
            "PropertyCategory" => {
                let mut category = PropertyCategory::new(required_name(el, "typeName")?);
                read_info(&mut category.info, el);
                category.priority = parse_attr(el, "priority").unwrap_or(0);
                category.into()
            }
            "UnitSystem" => {
                let mut system = UnitSystem::new(required_name(el, "typeName")?);
                read_info(&mut system.info, el);
                system.into()
            }
            "Phenomenon" => {
                let definition = required_attr(el, "definition")?;
                let mut phenomenon = Phenomenon::new(required_name(el, "typeName")?, definition);
                read_info(&mut phenomenon.info, el);
                phenomenon.into()
            }
            "Unit" | "Constant" | "InvertedUnit" => read_unit(el)?,
            "Format" => read_format(el)?,
            other => {
                trace!(element = other, "ignoring unknown schema child element");
                return Ok(());
            }
        };
        self.draft.push_item(item)
    }

    fn read_reference(&self, el: &XmlElement) -> Result<ReferenceDecl, ReadError> {
        let name = required_attr(el, "name")?.trim().to_string();
        let version_text = required_attr(el, "version")?;
        let version = SchemaVersion::parse(version_text).ok_or_else(|| {
            ReadError::invalid(
                FORMAT,
                format!("reference to '{name}' has invalid version '{version_text}'"),
            )
        })?;
        let alias_attr = if self.ec_version.is_ec3() { "alias" } else { "prefix" };
        Ok(ReferenceDecl {
            name,
            version,
            alias: el.non_empty_attr(alias_attr).map(|a| a.trim().to_string()),
        })
    }

    // ========================================================================
    // CLASSES
    // ========================================================================

    fn read_class(&self, el: &XmlElement, class_type: ClassType) -> Result<SchemaItem, ReadError> {
        let mut class = EcClass::new(required_name(el, "typeName")?, class_type);
        read_info(&mut class.info, el);
        if let Some(text) = el.non_empty_attr("modifier") {
            match ClassModifier::parse(text) {
                Some(modifier) => class.modifier = modifier,
                None => warn!(class = class.name(), modifier = text, "unknown class modifier; using None"),
            }
        }
        self.read_class_body(&mut class, el)?;
        Ok(class.into())
    }

    fn read_class_body(&self, class: &mut EcClass, el: &XmlElement) -> Result<(), ReadError> {
        for child in &el.children {
            match child.local_name() {
                "BaseClass" => class.base_classes.push(raw_ref(&child.text, RefStyle::Alias)),
                "ECCustomAttributes" => class.custom_attributes = read_custom_attributes(child),
                _ => {
                    if let Some(property) = self.read_property(child)? {
                        class.insert_property_raw(property);
                    }
                }
            }
        }
        Ok(())
    }

    /// 2.0 `ECClass`: the class type comes from its flags, and a class that
    /// is neither a domain class nor a struct is abstract.
    fn read_legacy_class(&self, el: &XmlElement) -> Result<SchemaItem, ReadError> {
        let is_domain = bool_attr(el, "isDomainClass").unwrap_or(false);
        let is_struct = bool_attr(el, "isStruct").unwrap_or(false);
        let is_custom_attribute = bool_attr(el, "isCustomAttributeClass").unwrap_or(false);
        if el.child("Source").is_some() || el.child("Target").is_some() {
            return self.read_relationship(el);
        }
        let class_type = if is_custom_attribute {
            ClassType::CustomAttribute { applies_to: None }
        } else if is_struct && !is_domain {
            ClassType::Struct
        } else {
            ClassType::Entity
        };
        let abstract_entity = matches!(class_type, ClassType::Entity) && !is_domain && !is_struct;
        let mut item = self.read_class(el, class_type)?;
        if let (true, Some(class)) = (abstract_entity, item.as_class_mut()) {
            class.modifier = ClassModifier::Abstract;
        }
        Ok(item)
    }

    fn read_relationship(&self, el: &XmlElement) -> Result<SchemaItem, ReadError> {
        let name = required_name(el, "typeName")?;
        let strength = match el.non_empty_attr("strength") {
            None => StrengthType::default(),
            Some(text) => StrengthType::parse(text).ok_or_else(|| {
                ReadError::invalid(FORMAT, format!("relationship '{name}' has invalid strength '{text}'"))
            })?,
        };
        let direction = match el.non_empty_attr("strengthDirection") {
            None => StrengthDirection::default(),
            Some(text) => StrengthDirection::parse(text).ok_or_else(|| {
                ReadError::invalid(
                    FORMAT,
                    format!("relationship '{name}' has invalid strength direction '{text}'"),
                )
            })?,
        };
        let info = RelationshipInfo {
            strength,
            direction,
            source: self.read_constraint(el.child("Source"), &name, "Source")?,
            target: self.read_constraint(el.child("Target"), &name, "Target")?,
        };
        self.read_class(el, ClassType::Relationship(Box::new(info)))
    }

    fn read_constraint(
        &self,
        el: Option<&XmlElement>,
        relationship: &str,
        end: &str,
    ) -> Result<RelationshipConstraint, ReadError> {
        let mut constraint = RelationshipConstraint {
            is_polymorphic: true,
            ..RelationshipConstraint::default()
        };
        let Some(el) = el else {
            warn!(relationship, end, "relationship has no constraint element");
            return Ok(constraint);
        };
        let element = format!("{relationship}.{end}");
        constraint.role_label = el.attr("roleLabel").unwrap_or_default().to_string();

        if self.ec_version >= EcVersion::V3_1 {
            let polymorphic = el
                .non_empty_attr("polymorphic")
                .ok_or_else(|| ReadError::missing_attribute(FORMAT, &element, "polymorphic"))?;
            constraint.is_polymorphic = parse_bool(polymorphic).ok_or_else(|| {
                ReadError::invalid(FORMAT, format!("{element} has invalid polymorphic value '{polymorphic}'"))
            })?;
            let multiplicity = el
                .non_empty_attr("multiplicity")
                .ok_or_else(|| ReadError::missing_attribute(FORMAT, &element, "multiplicity"))?;
            constraint.multiplicity = Multiplicity::parse(multiplicity).ok_or_else(|| {
                ReadError::invalid(FORMAT, format!("{element} has invalid multiplicity '{multiplicity}'"))
            })?;
            constraint.abstract_constraint = el
                .non_empty_attr("abstractConstraint")
                .map(|text| raw_ref(text, RefStyle::Alias));
        } else {
            constraint.is_polymorphic = bool_attr(el, "polymorphic").unwrap_or(true);
            let parsed = el
                .non_empty_attr("multiplicity")
                .and_then(Multiplicity::parse)
                .or_else(|| el.non_empty_attr("cardinality").and_then(Multiplicity::parse_legacy));
            match parsed {
                Some(multiplicity) => constraint.multiplicity = multiplicity,
                None if el.has_attr("multiplicity") || el.has_attr("cardinality") => {
                    warn!(constraint = %element, "unreadable cardinality; using (0..1)");
                }
                None => {}
            }
        }

        for child in &el.children {
            match child.local_name() {
                "Class" => {
                    let class = child
                        .non_empty_attr("class")
                        .ok_or_else(|| ReadError::missing_attribute(FORMAT, &format!("{element}.Class"), "class"))?;
                    constraint.constraint_classes.push(raw_ref(class, RefStyle::Alias));
                }
                "ECCustomAttributes" => constraint.custom_attributes = read_custom_attributes(child),
                _ => {}
            }
        }
        Ok(constraint)
    }

    // ========================================================================
    // PROPERTIES
    // ========================================================================

    fn read_property(&self, el: &XmlElement) -> Result<Option<EcProperty>, ReadError> {
        let kind = match el.local_name() {
            "ECProperty" => PropertyKind::Primitive {
                ty: primitive_type_ref(required_attr(el, "typeName")?),
            },
            "ECArrayProperty" => {
                let type_name = required_attr(el, "typeName")?;
                let bounds = array_bounds(el);
                if bool_attr(el, "isStruct").unwrap_or(false) {
                    PropertyKind::StructArray {
                        struct_class: raw_ref(type_name, RefStyle::Alias),
                        bounds,
                    }
                } else {
                    PropertyKind::PrimitiveArray {
                        ty: primitive_type_ref(type_name),
                        bounds,
                    }
                }
            }
            "ECStructProperty" => PropertyKind::Struct {
                struct_class: raw_ref(required_attr(el, "typeName")?, RefStyle::Alias),
            },
            "ECStructArrayProperty" => PropertyKind::StructArray {
                struct_class: raw_ref(required_attr(el, "typeName")?, RefStyle::Alias),
                bounds: array_bounds(el),
            },
            "ECNavigationProperty" => PropertyKind::Navigation {
                relationship: raw_ref(required_attr(el, "relationshipName")?, RefStyle::Alias),
                direction: el
                    .non_empty_attr("direction")
                    .and_then(NavigationDirection::parse)
                    .unwrap_or_default(),
            },
            _ => return Ok(None),
        };

        let name = el
            .attr("propertyName")
            .ok_or_else(|| ReadError::missing_attribute(FORMAT, el.local_name(), "propertyName"))?;
        if name.trim().is_empty() {
            return Err(ReadError::invalid(FORMAT, format!("{} has an empty propertyName", el.local_name())));
        }
        let mut property = EcProperty::new(name.trim(), kind);
        property.display_label = el.attr("displayLabel").map(str::to_string);
        property.description = el.attr("description").unwrap_or_default().to_string();
        property.is_readonly = bool_attr(el, "readOnly").unwrap_or(false);
        property.priority = parse_attr(el, "priority").unwrap_or(0);
        property.category = el.non_empty_attr("category").map(|t| raw_ref(t, RefStyle::Alias));
        property.kind_of_quantity = el.non_empty_attr("kindOfQuantity").map(|t| raw_ref(t, RefStyle::Alias));
        property.extended_type = el.non_empty_attr("extendedTypeName").map(str::to_string);
        property.min_length = parse_attr(el, "minimumLength");
        property.max_length = parse_attr(el, "maximumLength");
        property.min_value = parse_attr(el, "minimumValue");
        property.max_value = parse_attr(el, "maximumValue");
        if let Some(cas) = el.child("ECCustomAttributes") {
            property.custom_attributes = read_custom_attributes(cas);
        }
        Ok(Some(property))
    }

    // ========================================================================
    // ENUMERATIONS AND QUANTITIES
    // ========================================================================

    fn read_enumeration(&self, el: &XmlElement) -> Result<SchemaItem, ReadError> {
        let name = required_name(el, "typeName")?;
        let backing_text = required_attr(el, "backingTypeName")?;
        let backing = PrimitiveType::from_type_name(backing_text)
            .and_then(EnumBackingType::from_primitive)
            .ok_or_else(|| {
                ReadError::invalid(
                    FORMAT,
                    format!("enumeration '{name}' has unsupported backing type '{backing_text}'"),
                )
            })?;
        let mut enumeration = Enumeration::new(&name, backing);
        read_info(&mut enumeration.info, el);
        enumeration.is_strict = bool_attr(el, "isStrict").unwrap_or(true);

        for child in el.children_named("ECEnumerator") {
            let value_text = required_attr(child, "value")?;
            let value = EnumValue::parse(value_text, backing).ok_or_else(|| {
                ReadError::invalid(
                    FORMAT,
                    format!("enumerator value '{value_text}' of '{name}' does not match its backing type"),
                )
            })?;
            let enumerator_name = match child.attr("name") {
                Some(n) => n.trim().to_string(),
                None if self.ec_version < EcVersion::V3_1 => legacy_enumerator_name(&name, &value),
                None => return Err(ReadError::missing_attribute(FORMAT, "ECEnumerator", "name")),
            };
            let enumerator = enumeration
                .add_enumerator(&enumerator_name, value)
                .map_err(|e| ReadError::from_model(FORMAT, format!("enumeration '{name}'"), e))?;
            enumerator.display_label = child.attr("displayLabel").map(str::to_string);
            enumerator.description = child.attr("description").unwrap_or_default().to_string();
        }
        Ok(enumeration.into())
    }

    fn read_kind_of_quantity(&mut self, el: &XmlElement) -> Result<SchemaItem, ReadError> {
        let name = required_name(el, "typeName")?;
        let mut koq = KindOfQuantity::new(&name);
        read_info(&mut koq.info, el);
        if let Some(error) = parse_attr(el, "relativeError") {
            koq.relative_error = error;
        }
        self.draft.koq_texts.push(KoqText {
            koq: name,
            persistence_unit: el.non_empty_attr("persistenceUnit").map(|t| t.trim().to_string()),
            presentation_units: el
                .non_empty_attr("presentationUnits")
                .map(split_presentation_units)
                .unwrap_or_default(),
        });
        Ok(koq.into())
    }
}

// ============================================================================
// UNITS AND FORMATS
// ============================================================================

fn read_unit(el: &XmlElement) -> Result<SchemaItem, ReadError> {
    let name = required_name(el, "typeName")?;
    let element = el.local_name();
    let required_ref = |attr: &str| -> Result<ItemRef, ReadError> {
        Ok(raw_ref(required_attr(el, attr)?, RefStyle::Alias))
    };
    let mut unit = match element {
        "InvertedUnit" => Unit::inverted(&name, required_ref("invertsUnit")?, required_ref("unitSystem")?),
        "Constant" => Unit::constant(
            &name,
            required_ref("phenomenon")?,
            required_attr(el, "definition")?,
            parse_attr(el, "numerator").unwrap_or(1.0),
        ),
        _ => Unit::new(
            &name,
            required_ref("phenomenon")?,
            required_ref("unitSystem")?,
            required_attr(el, "definition")?,
        ),
    };
    read_info(&mut unit.info, el);
    match unit.kind {
        UnitKind::Inverted { .. } => {}
        UnitKind::Constant => unit.denominator = parse_attr(el, "denominator"),
        UnitKind::Regular => {
            unit.numerator = parse_attr(el, "numerator");
            unit.denominator = parse_attr(el, "denominator");
            unit.offset = parse_attr(el, "offset");
        }
    }
    Ok(unit.into())
}

fn read_format(el: &XmlElement) -> Result<SchemaItem, ReadError> {
    let name = required_name(el, "typeName")?;
    let type_text = required_attr(el, "type")?;
    let format_type = FormatType::parse(type_text)
        .ok_or_else(|| ReadError::invalid(FORMAT, format!("format '{name}' has unknown type '{type_text}'")))?;
    let mut format = Format::new(&name, format_type);
    read_info(&mut format.info, el);
    format.precision = parse_attr(el, "precision");
    format.round_factor = parse_attr(el, "roundFactor");
    format.min_width = parse_attr(el, "minWidth");
    format.show_sign_option = el.attr("showSignOption").map(str::to_string);
    format.format_traits = el
        .attr("formatTraits")
        .map(|t| {
            t.split(['|', ','])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    format.decimal_separator = el.attr("decimalSeparator").map(str::to_string);
    format.thousand_separator = el.attr("thousandSeparator").map(str::to_string);
    format.uom_separator = el.attr("uomSeparator").map(str::to_string);
    format.scientific_type = el.attr("scientificType").map(str::to_string);
    format.station_offset_size = parse_attr(el, "stationOffsetSize");
    format.station_separator = el.attr("stationSeparator").map(str::to_string);

    if let Some(composite) = el.child("Composite") {
        format.composite = Some(CompositeSpec {
            spacer: composite.attr("spacer").map(str::to_string),
            include_zero: composite.attr("includeZero").and_then(parse_bool),
            units: composite
                .children_named("Unit")
                .map(|u| UnitLabel {
                    unit: raw_ref(&u.text, RefStyle::Alias),
                    label: u.attr("label").map(str::to_string),
                })
                .collect(),
        });
    }
    Ok(format.into())
}

// ============================================================================
// CUSTOM ATTRIBUTES
// ============================================================================

/// Instances under `ECCustomAttributes`. The class's schema comes from the
/// instance's `xmlns` (`Schema.RR.WW.MM`); without one the class is local.
fn read_custom_attributes(el: &XmlElement) -> CustomAttributes {
    let mut attributes = CustomAttributes::new();
    for instance in &el.children {
        let schema = instance.non_empty_attr("xmlns").map(namespace_schema).unwrap_or_default();
        let mut attribute = CustomAttribute::new(ItemRef::new(schema, instance.local_name()));
        for member in &instance.children {
            attribute
                .values
                .insert(member.local_name().to_string(), instance_value(member));
        }
        attributes.set(attribute);
    }
    attributes
}

fn namespace_schema(namespace: &str) -> String {
    SchemaKey::parse_full_name(namespace).map_or_else(
        || namespace.split('.').next().unwrap_or_default().to_string(),
        |key| key.name,
    )
}

/// Leaf elements are primitive; elements with children keep their members
/// tagged so struct and array values can be told apart once the class is known.
fn instance_value(el: &XmlElement) -> InstanceValue {
    if el.children.is_empty() {
        return InstanceValue::Primitive(el.text.clone());
    }
    InstanceValue::Array(
        el.children
            .iter()
            .map(|c| (c.local_name().to_string(), instance_value(c)))
            .collect(),
    )
}

// ============================================================================
// ATTRIBUTE HELPERS
// ============================================================================

fn required_attr<'a>(el: &'a XmlElement, name: &str) -> Result<&'a str, ReadError> {
    el.attr(name)
        .ok_or_else(|| ReadError::missing_attribute(FORMAT, el.local_name(), name))
}

/// A required, non-empty item name.
fn required_name(el: &XmlElement, attr: &str) -> Result<String, ReadError> {
    let name = required_attr(el, attr)?.trim();
    if name.is_empty() {
        return Err(ReadError::invalid(FORMAT, format!("{} has an empty {attr}", el.local_name())));
    }
    Ok(name.to_string())
}

fn read_info(info: &mut ItemInfo, el: &XmlElement) {
    info.display_label = el.attr("displayLabel").map(str::to_string);
    info.description = el.attr("description").unwrap_or_default().to_string();
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn bool_attr(el: &XmlElement, name: &str) -> Option<bool> {
    el.attr(name).and_then(parse_bool)
}

/// Parse an optional attribute; unparseable values are logged and ignored.
fn parse_attr<T: std::str::FromStr>(el: &XmlElement, name: &str) -> Option<T> {
    let text = el.non_empty_attr(name)?.trim();
    let parsed = text.parse().ok();
    if parsed.is_none() {
        warn!(element = el.local_name(), attribute = name, value = text, "ignoring unparseable attribute");
    }
    parsed
}

fn array_bounds(el: &XmlElement) -> ArrayBounds {
    let max_occurs = match el.non_empty_attr("maxOccurs") {
        Some(text) if text.trim().eq_ignore_ascii_case("unbounded") => None,
        Some(_) => parse_attr(el, "maxOccurs"),
        None => None,
    };
    ArrayBounds {
        min_occurs: parse_attr(el, "minOccurs").unwrap_or(0),
        max_occurs,
    }
}

/// A primitive type name, or an enumeration reference for anything else.
fn primitive_type_ref(type_name: &str) -> PrimitiveTypeRef {
    match PrimitiveType::from_type_name(type_name) {
        Some(primitive) => PrimitiveTypeRef::Primitive(primitive),
        None => PrimitiveTypeRef::Enumeration(raw_ref(type_name, RefStyle::Alias)),
    }
}

/// Split `;`-separated presentation units, ignoring separators inside `[...]`
/// label overrides.
fn split_presentation_units(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                out.push(text[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(text[start..].trim().to_string());
    out.retain(|s| !s.is_empty());
    out
}

/// 3.0 enumerators carry no name; derive one from the value.
fn legacy_enumerator_name(enumeration: &str, value: &EnumValue) -> String {
    match value {
        EnumValue::Integer(i) => format!("{enumeration}{i}"),
        EnumValue::String(s) if is_valid_name(s) => s.clone(),
        EnumValue::String(s) => encode_name(s),
    }
}

/// Replace characters not allowed in names with `__x{hex}__`.
fn encode_name(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        let allowed = c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit());
        if allowed {
            out.push(c);
        } else {
            out.push_str(&format!("__x{:04X}__", c as u32));
        }
    }
    if out.is_empty() { "__x__".to_string() } else { out }
}
