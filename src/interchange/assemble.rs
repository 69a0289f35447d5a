//! Assembly of a parsed document into a schema.
//!
//! Readers turn a document into a [`SchemaDraft`]: items whose references are
//! still spelled the way the document spelled them (`alias:Name` in XML,
//! `Schema.Name` in JSON). Assembly then runs the same steps for every format:
//!
//! 1. locate referenced schemas through the read context, skipping pruned ones
//! 2. resolve the references of non-class items and insert them
//! 3. insert class shells, then attach base classes and properties bases-first
//!    through the conflict resolver
//! 4. resolve custom attributes and shape their values by their class
//! 5. convert legacy constructs, validate and freeze
//!
//! Anything that depends on a pruned schema is dropped on the way.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::base::{EcVersion, ItemRef, NameKey, SchemaKey, SchemaMatchType, SchemaVersion};
use crate::context::ReadContext;
use crate::schema::standard::{APPLIES_TO_ENTITY_CLASS, CORE_SCHEMA_NAME, is_mixin_class};
use crate::schema::{
    ClassType, ConflictPolicy, CustomAttribute, CustomAttributes, EcClass, EcProperty, Enumeration,
    FormatOverride, InstanceValue, ItemKind, KindOfQuantity, PrimitiveType, PrimitiveTypeRef,
    PropertyKind, RelationshipConstraint, Schema, SchemaItem, UnitLabel,
};

use super::error::{DocumentFormat, ReadError};

/// Format legacy presentation units fall back to when they name none.
const DEFAULT_LEGACY_FORMAT: &str = "DefaultRealU";

/// How a document spells the schema part of a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RefStyle {
    /// `alias:Name`; an empty or own alias means local.
    Alias,
    /// `Schema.Name`; an empty or own schema name means local.
    SchemaName,
}

impl RefStyle {
    fn separator(self) -> char {
        match self {
            Self::Alias => ':',
            Self::SchemaName => '.',
        }
    }
}

/// Split a reference as written into its schema part (possibly empty) and name.
pub(crate) fn raw_ref(text: &str, style: RefStyle) -> ItemRef {
    let text = text.trim();
    match text.split_once(style.separator()) {
        Some((schema, name)) => ItemRef::new(schema.trim(), name.trim()),
        None => ItemRef::new("", text),
    }
}

/// A schema reference as declared by a document.
#[derive(Clone, Debug)]
pub(crate) struct ReferenceDecl {
    pub name: String,
    pub version: SchemaVersion,
    pub alias: Option<String>,
}

/// Unit and format strings of a kind of quantity, kept as written until the
/// schemas they point into are known.
#[derive(Clone, Debug, Default)]
pub(crate) struct KoqText {
    pub koq: String,
    pub persistence_unit: Option<String>,
    pub presentation_units: Vec<String>,
}

/// A document read into model types, with references not yet resolved.
#[derive(Debug)]
pub(crate) struct SchemaDraft {
    pub format: DocumentFormat,
    pub ec_version: EcVersion,
    pub style: RefStyle,
    pub name: String,
    pub alias: String,
    pub version: SchemaVersion,
    pub display_label: Option<String>,
    pub description: String,
    pub references: Vec<ReferenceDecl>,
    pub items: Vec<SchemaItem>,
    pub koq_texts: Vec<KoqText>,
    pub custom_attributes: CustomAttributes,
}

impl SchemaDraft {
    pub fn new(
        format: DocumentFormat,
        ec_version: EcVersion,
        style: RefStyle,
        name: impl Into<String>,
        alias: impl Into<String>,
        version: SchemaVersion,
    ) -> Self {
        Self {
            format,
            ec_version,
            style,
            name: name.into(),
            alias: alias.into(),
            version,
            display_label: None,
            description: String::new(),
            references: Vec::new(),
            items: Vec::new(),
            koq_texts: Vec::new(),
            custom_attributes: CustomAttributes::new(),
        }
    }

    pub fn key(&self) -> SchemaKey {
        SchemaKey::from_version(&self.name, self.version)
    }

    /// Add an item as read. A repeated name fails with `DuplicateTypeName`,
    /// except in 2.0 documents where the later definition replaces the earlier.
    pub fn push_item(&mut self, item: SchemaItem) -> Result<(), ReadError> {
        let key = NameKey::new(item.name());
        let Some(idx) = self.items.iter().position(|i| NameKey::new(i.name()) == key) else {
            self.items.push(item);
            return Ok(());
        };
        if self.ec_version != EcVersion::V2_0 {
            return Err(ReadError::DuplicateTypeName {
                schema: self.name.clone(),
                name: item.name().to_string(),
            });
        }
        warn!(schema = %self.name, item = item.name(), "duplicate type name; keeping the later definition");
        self.koq_texts.retain(|k| NameKey::new(&k.koq) != key);
        self.items[idx] = item;
        Ok(())
    }
}

/// Assemble `draft` and register the result in `ctx`.
pub(crate) fn assemble(draft: SchemaDraft, ctx: &mut ReadContext) -> Result<Arc<Schema>, ReadError> {
    let key = draft.key();
    ctx.begin_read(&key)?;
    let result = Assembler::build(draft, ctx);
    ctx.end_read(&key);
    let schema = result?.into_shared();
    ctx.add_schema(Arc::clone(&schema))?;
    debug!(schema = %schema.full_name(), items = schema.item_count(), "read schema");
    Ok(schema)
}

// ============================================================================
// ASSEMBLER
// ============================================================================

enum Resolved {
    Found(ItemRef),
    Pruned,
    Unknown,
}

/// Where a custom attribute read from the document belongs.
enum CaTarget {
    Schema,
    Class(String),
    Property(String, String),
    Constraint(String, bool),
}

struct ClassParts {
    name: String,
    bases: Vec<ItemRef>,
    properties: Vec<EcProperty>,
}

struct Assembler {
    format: DocumentFormat,
    ec_version: EcVersion,
    style: RefStyle,
    schema: Schema,
    /// `(alias, name)` of every reference dropped by pruning.
    pruned: Vec<(String, String)>,
    local_kinds: FxHashMap<NameKey, ItemKind>,
    policy: ConflictPolicy,
    pending: Vec<(CaTarget, CustomAttributes)>,
}

impl Assembler {
    fn build(draft: SchemaDraft, ctx: &mut ReadContext) -> Result<Schema, ReadError> {
        let SchemaDraft {
            format,
            ec_version,
            style,
            name,
            alias,
            version,
            display_label,
            description,
            references,
            items,
            koq_texts,
            custom_attributes,
        } = draft;

        let mut schema = Schema::with_version(&name, &alias, version)
            .map_err(|e| ReadError::from_model(format, "ECSchema", e))?;
        schema.set_display_label(display_label);
        schema.set_description(description);
        schema.original_ec_version = ec_version;
        schema.preserve_element_order = ctx.preserve_element_order();

        let resolve = ctx.resolve_conflicts();
        let mut asm = Assembler {
            format,
            ec_version,
            style,
            schema,
            pruned: Vec::new(),
            local_kinds: items
                .iter()
                .map(|i| (NameKey::new(i.name()), i.kind()))
                .collect(),
            policy: ConflictPolicy {
                rename_incompatible: resolve,
                adopt_base_casing: resolve || ec_version == EcVersion::V2_0,
            },
            pending: Vec::new(),
        };

        asm.add_references(references, ctx)?;
        let document_order: Vec<String> = items.iter().map(|i| i.name().to_string()).collect();
        let mut classes = Vec::new();
        for item in items {
            match item {
                SchemaItem::Class(class) => classes.push(class),
                other => asm.add_plain_item(other)?,
            }
        }
        asm.apply_koq_texts(koq_texts)?;

        let mut parts = Vec::with_capacity(classes.len());
        for class in classes {
            parts.push(asm.add_class_shell(class)?);
        }
        for part in asm.bases_first(parts) {
            asm.attach_class(part)?;
        }

        asm.pending.push((CaTarget::Schema, custom_attributes));
        asm.apply_custom_attributes();
        asm.convert_mixins();
        asm.schema.reorder_items(&document_order);
        asm.finish()
    }

    // ========================================================================
    // REFERENCES
    // ========================================================================

    fn add_references(&mut self, references: Vec<ReferenceDecl>, ctx: &mut ReadContext) -> Result<(), ReadError> {
        for decl in references {
            if ctx.is_pruned(&decl.name) {
                debug!(schema = self.schema.name(), pruned = %decl.name, "pruning schema reference");
                let alias = decl.alias.unwrap_or_else(|| decl.name.clone());
                self.pruned.push((alias, decl.name));
                continue;
            }
            let key = SchemaKey::from_version(&decl.name, decl.version);
            let Some(found) = ctx.locate_schema(&key, SchemaMatchType::LatestWriteCompatible) else {
                return Err(ReadError::ReferencedSchemaNotFound {
                    schema: self.schema.full_name(),
                    referenced: key.full_name(),
                });
            };
            let alias = decl.alias.unwrap_or_else(|| found.alias().to_string());
            self.schema
                .add_referenced_schema_with_alias(found, &alias)
                .map_err(|e| ReadError::from_model(self.format, format!("reference to '{key}'"), e))?;
        }
        Ok(())
    }

    fn resolve(&self, raw: &ItemRef) -> Resolved {
        self.resolve_in(raw, self.style)
    }

    fn resolve_in(&self, raw: &ItemRef, style: RefStyle) -> Resolved {
        let prefix = raw.schema.trim();
        let own = match style {
            RefStyle::Alias => self.schema.alias(),
            RefStyle::SchemaName => self.schema.name(),
        };
        if prefix.is_empty() || prefix.eq_ignore_ascii_case(own) {
            return Resolved::Found(self.schema.item_ref(&raw.name));
        }
        let pruned = self.pruned.iter().any(|(alias, name)| {
            let spelled = match style {
                RefStyle::Alias => alias,
                RefStyle::SchemaName => name,
            };
            spelled.eq_ignore_ascii_case(prefix)
        });
        if pruned {
            return Resolved::Pruned;
        }
        let target = match style {
            RefStyle::Alias => self.schema.resolve_alias(prefix).map(str::to_string),
            RefStyle::SchemaName => self
                .schema
                .get_referenced_schema(prefix)
                .map(|s| s.name().to_string()),
        };
        match target {
            Some(schema) => Resolved::Found(ItemRef::new(schema, raw.name.clone())),
            None => Resolved::Unknown,
        }
    }

    /// Resolve and check that the target exists as an item of `kind`.
    fn resolve_kind(&self, raw: &ItemRef, kind: ItemKind) -> Resolved {
        match self.resolve(raw) {
            Resolved::Found(r) if self.exists(&r, kind) => Resolved::Found(r),
            Resolved::Found(_) => Resolved::Unknown,
            other => other,
        }
    }

    fn exists(&self, r: &ItemRef, kind: ItemKind) -> bool {
        if r.is_in(self.schema.name()) {
            return self.local_kinds.get(&r.key()) == Some(&kind);
        }
        self.schema.resolve_item(r).is_some_and(|i| i.kind() == kind)
    }

    fn is_pruned_schema(&self, name: &str) -> bool {
        self.pruned.iter().any(|(_, n)| n.eq_ignore_ascii_case(name))
    }

    /// Schema name an alias stands for, including pruned aliases.
    fn alias_target(&self, alias: &str) -> Option<String> {
        if let Some((_, name)) = self.pruned.iter().find(|(a, _)| a.eq_ignore_ascii_case(alias)) {
            return Some(name.clone());
        }
        self.schema.resolve_alias(alias).map(str::to_string)
    }

    fn unresolved(&self, what: &str, raw: &ItemRef, owner: &str) -> ReadError {
        let spelled = if raw.schema.is_empty() {
            raw.name.clone()
        } else {
            format!("{}{}{}", raw.schema, self.style.separator(), raw.name)
        };
        ReadError::invalid(self.format, format!("{what} '{spelled}' of '{owner}' cannot be resolved"))
    }

    /// A class reference that must resolve unless its schema was pruned.
    fn required_class(&self, raw: &ItemRef, owner: &str, what: &str) -> Result<Option<ItemRef>, ReadError> {
        match self.resolve_kind(raw, ItemKind::Class) {
            Resolved::Found(r) => Ok(Some(r)),
            Resolved::Pruned => {
                debug!(owner, dropped = %raw.name, what, "dropping reference into a pruned schema");
                Ok(None)
            }
            Resolved::Unknown => Err(self.unresolved(what, raw, owner)),
        }
    }

    fn optional_ref(
        &self,
        raw: Option<ItemRef>,
        kind: ItemKind,
        owner: &str,
    ) -> Result<Option<ItemRef>, ReadError> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        match self.resolve_kind(&raw, kind) {
            Resolved::Found(r) => Ok(Some(r)),
            Resolved::Pruned => Ok(None),
            Resolved::Unknown => Err(self.unresolved(kind.as_str(), &raw, owner)),
        }
    }

    // ========================================================================
    // NON-CLASS ITEMS
    // ========================================================================

    fn add_plain_item(&mut self, mut item: SchemaItem) -> Result<(), ReadError> {
        let name = item.name().to_string();
        let mut failed: Option<ItemRef> = None;
        item.visit_refs_mut(&mut |r| match self.resolve(r) {
            Resolved::Found(found) => *r = found,
            Resolved::Pruned | Resolved::Unknown => {
                failed.get_or_insert_with(|| r.clone());
            }
        });
        if let Some(raw) = failed {
            return Err(self.unresolved("reference", &raw, &name));
        }
        self.schema
            .insert_item_raw(item)
            .map_err(|e| ReadError::from_model(self.format, format!("item '{name}'"), e))
    }

    fn apply_koq_texts(&mut self, texts: Vec<KoqText>) -> Result<(), ReadError> {
        let legacy = self.format == DocumentFormat::Xml && self.ec_version < EcVersion::V3_2;
        for text in texts {
            let persistence = match text.persistence_unit.as_deref() {
                None => None,
                Some(raw) if legacy => self.legacy_unit(&text.koq, raw),
                Some(raw) => self.optional_ref(Some(raw_ref(raw, self.style)), ItemKind::Unit, &text.koq)?,
            };
            let mut formats = Vec::new();
            for entry in text.presentation_units.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
                let parsed = if legacy {
                    self.legacy_format(&text.koq, entry)
                } else {
                    self.format_override(&text.koq, entry)?
                };
                formats.extend(parsed);
            }
            if let Some(koq) = self.schema.get_mut::<KindOfQuantity>(&text.koq) {
                koq.persistence_unit = persistence;
                koq.presentation_formats = formats;
            }
        }
        Ok(())
    }

    fn format_override(&self, koq: &str, entry: &str) -> Result<Option<FormatOverride>, ReadError> {
        let parsed = match self.style {
            RefStyle::Alias => FormatOverride::parse(entry, &|alias: &str| self.alias_target(alias)),
            RefStyle::SchemaName => FormatOverride::parse_full_names(entry, self.schema.name()),
        }
        .map_err(|msg| ReadError::invalid(self.format, format!("presentation format of '{koq}': {msg}")))?;

        let refs: Vec<&ItemRef> = std::iter::once(&parsed.format)
            .chain(parsed.units.iter().map(|u| &u.unit))
            .collect();
        if refs.iter().any(|r| self.is_pruned_schema(&r.schema)) {
            debug!(koq, entry, "dropping presentation format from a pruned schema");
            return Ok(None);
        }
        if let Some(bad) = refs.iter().find(|r| !self.schema.is_referenceable(r)) {
            return Err(ReadError::invalid(
                self.format,
                format!("presentation format of '{koq}' refers to '{bad}' outside the referenced schemas"),
            ));
        }
        Ok(Some(parsed))
    }

    /// Find an item by plain name, locally first and then in each direct reference.
    fn find_by_name(&self, text: &str, kind: ItemKind) -> Option<ItemRef> {
        let raw = raw_ref(text, RefStyle::Alias);
        if !raw.schema.is_empty() {
            return match self.resolve_kind(&raw, kind) {
                Resolved::Found(r) => Some(r),
                _ => None,
            };
        }
        if self.local_kinds.get(&raw.key()) == Some(&kind) {
            return Some(self.schema.item_ref(&raw.name));
        }
        self.schema.referenced_schemas().find_map(|s| {
            s.get_item(&raw.name)
                .filter(|i| i.kind() == kind)
                .map(|i| s.item_ref(i.name()))
        })
    }

    /// `UNIT(FORMAT)` as written by 3.0 and 3.1 documents; the format is ignored.
    fn legacy_unit(&self, koq: &str, entry: &str) -> Option<ItemRef> {
        let (unit, _) = split_legacy(entry);
        let found = self.find_by_name(unit, ItemKind::Unit);
        if found.is_none() {
            warn!(schema = self.schema.name(), koq, unit, "legacy persistence unit not found; dropping it");
        }
        found
    }

    fn legacy_format(&self, koq: &str, entry: &str) -> Option<FormatOverride> {
        let (unit, format) = split_legacy(entry);
        let unit_ref = self.find_by_name(unit, ItemKind::Unit);
        let format_ref = self.find_by_name(format.unwrap_or(DEFAULT_LEGACY_FORMAT), ItemKind::Format);
        match (unit_ref, format_ref) {
            (Some(unit), Some(format)) => {
                let mut converted = FormatOverride::new(format);
                converted.units.push(UnitLabel::new(unit));
                Some(converted)
            }
            _ => {
                warn!(schema = self.schema.name(), koq, entry, "legacy presentation unit not found; dropping it");
                None
            }
        }
    }

    // ========================================================================
    // CLASSES
    // ========================================================================

    fn add_class_shell(&mut self, mut class: EcClass) -> Result<ClassParts, ReadError> {
        let name = class.name().to_string();
        let bases = std::mem::take(&mut class.base_classes);
        let properties: Vec<EcProperty> = std::mem::take(&mut class.properties).into_values().collect();
        let cas = std::mem::take(&mut class.custom_attributes);
        self.pending.push((CaTarget::Class(name.clone()), cas));

        match &mut class.class_type {
            ClassType::Mixin { applies_to } => {
                if let Some(raw) = applies_to.take() {
                    *applies_to = self.required_class(&raw, &name, "mixin applies-to class")?;
                }
            }
            ClassType::Relationship(info) => {
                let info: &mut crate::schema::RelationshipInfo = info;
                for (is_source, constraint) in [(true, &mut info.source), (false, &mut info.target)] {
                    self.resolve_constraint(&name, constraint)?;
                    let cas = std::mem::take(&mut constraint.custom_attributes);
                    self.pending.push((CaTarget::Constraint(name.clone(), is_source), cas));
                }
            }
            _ => {}
        }

        self.schema
            .insert_item_raw(SchemaItem::Class(class))
            .map_err(|e| ReadError::from_model(self.format, format!("class '{name}'"), e))?;
        Ok(ClassParts {
            name,
            bases,
            properties,
        })
    }

    fn resolve_constraint(&self, owner: &str, constraint: &mut RelationshipConstraint) -> Result<(), ReadError> {
        if let Some(raw) = constraint.abstract_constraint.take() {
            constraint.abstract_constraint = self.required_class(&raw, owner, "abstract constraint")?;
        }
        let mut resolved = Vec::with_capacity(constraint.constraint_classes.len());
        for raw in &constraint.constraint_classes {
            resolved.extend(self.required_class(raw, owner, "relationship endpoint")?);
        }
        constraint.constraint_classes = resolved;
        Ok(())
    }

    /// Order classes so every local base class comes before its derived classes.
    fn bases_first(&self, parts: Vec<ClassParts>) -> Vec<ClassParts> {
        let index: FxHashMap<NameKey, usize> = parts
            .iter()
            .enumerate()
            .map(|(i, p)| (NameKey::new(&p.name), i))
            .collect();
        let mut visited = vec![false; parts.len()];
        let mut order = Vec::with_capacity(parts.len());
        for i in 0..parts.len() {
            self.visit_bases(i, &parts, &index, &mut visited, &mut order);
        }
        let mut slots: Vec<Option<ClassParts>> = parts.into_iter().map(Some).collect();
        order.into_iter().filter_map(|i| slots[i].take()).collect()
    }

    fn visit_bases(
        &self,
        i: usize,
        parts: &[ClassParts],
        index: &FxHashMap<NameKey, usize>,
        visited: &mut [bool],
        order: &mut Vec<usize>,
    ) {
        if visited[i] {
            return;
        }
        visited[i] = true;
        for base in &parts[i].bases {
            let Resolved::Found(r) = self.resolve(base) else {
                continue;
            };
            if !r.is_in(self.schema.name()) {
                continue;
            }
            if let Some(&j) = index.get(&r.key()) {
                self.visit_bases(j, parts, index, visited, order);
            }
        }
        order.push(i);
    }

    fn attach_class(&mut self, part: ClassParts) -> Result<(), ReadError> {
        let ClassParts {
            name,
            bases,
            properties,
        } = part;
        for raw in &bases {
            let Some(base) = self.required_class(raw, &name, "base class")? else {
                continue;
            };
            self.schema
                .add_base_class_with(&name, &base, self.policy)
                .map_err(|e| ReadError::from_model(self.format, format!("class '{name}'"), e))?;
        }
        for property in properties {
            let Some(mut property) = self.resolve_property(&name, property)? else {
                continue;
            };
            let cas = std::mem::take(&mut property.custom_attributes);
            let property_name = property.name().to_string();
            let added = self
                .schema
                .add_property_with(&name, property, self.policy)
                .map_err(|e| ReadError::from_model(self.format, format!("property '{name}.{property_name}'"), e))?;
            let final_name = added.name().to_string();
            self.pending.push((CaTarget::Property(name.clone(), final_name), cas));
        }
        Ok(())
    }

    /// Resolve a property's type and links. `None` drops a property whose type
    /// lives in a pruned schema.
    fn resolve_property(&self, class: &str, mut property: EcProperty) -> Result<Option<EcProperty>, ReadError> {
        let owner = format!("{class}.{}", property.name());
        match &mut property.kind {
            PropertyKind::Primitive { ty } | PropertyKind::PrimitiveArray { ty, .. } => {
                let resolved = match &*ty {
                    PrimitiveTypeRef::Enumeration(raw) => Some(self.resolve_kind(raw, ItemKind::Enumeration)),
                    PrimitiveTypeRef::Primitive(_) => None,
                };
                match resolved {
                    None => {}
                    Some(Resolved::Found(r)) => *ty = PrimitiveTypeRef::Enumeration(r),
                    Some(Resolved::Pruned) => {
                        debug!(property = %owner, "dropping property typed by a pruned schema");
                        return Ok(None);
                    }
                    Some(Resolved::Unknown) => {
                        warn!(property = %owner, "unknown property type; reading it as string");
                        *ty = PrimitiveTypeRef::Primitive(PrimitiveType::String);
                    }
                }
            }
            PropertyKind::Struct { struct_class } | PropertyKind::StructArray { struct_class, .. } => {
                match self.resolve_kind(struct_class, ItemKind::Class) {
                    Resolved::Found(r) => *struct_class = r,
                    Resolved::Pruned => {
                        debug!(property = %owner, "dropping property typed by a pruned schema");
                        return Ok(None);
                    }
                    Resolved::Unknown => return Err(self.unresolved("struct class", struct_class, &owner)),
                }
            }
            PropertyKind::Navigation { relationship, .. } => match self.resolve_kind(relationship, ItemKind::Class) {
                Resolved::Found(r) => *relationship = r,
                Resolved::Pruned => {
                    debug!(property = %owner, "dropping navigation property into a pruned schema");
                    return Ok(None);
                }
                Resolved::Unknown => return Err(self.unresolved("relationship", relationship, &owner)),
            },
        }
        property.category = self.optional_ref(property.category.take(), ItemKind::PropertyCategory, &owner)?;
        property.kind_of_quantity =
            self.optional_ref(property.kind_of_quantity.take(), ItemKind::KindOfQuantity, &owner)?;
        Ok(Some(property))
    }

    // ========================================================================
    // CUSTOM ATTRIBUTES
    // ========================================================================

    fn apply_custom_attributes(&mut self) {
        for (target, raw) in std::mem::take(&mut self.pending) {
            for attribute in raw {
                if let Some(resolved) = self.resolve_custom_attribute(attribute) {
                    self.set_custom_attribute(&target, resolved);
                }
            }
        }
    }

    /// Custom attribute classes are always named by schema name, never alias.
    fn resolve_custom_attribute(&self, raw: CustomAttribute) -> Option<CustomAttribute> {
        let class = match self.resolve_in(&raw.class, RefStyle::SchemaName) {
            Resolved::Found(r) => r,
            Resolved::Pruned => {
                debug!(class = %raw.class.name, "dropping custom attribute from a pruned schema");
                return None;
            }
            Resolved::Unknown => {
                warn!(
                    schema = self.schema.name(),
                    class = %raw.class,
                    "dropping custom attribute whose schema is not referenced"
                );
                return None;
            }
        };
        let Some((owner, definition)) = self.schema.resolve_class_with_owner(&class) else {
            warn!(schema = self.schema.name(), class = %class, "dropping custom attribute of an unknown class");
            return None;
        };
        if !definition.is_custom_attribute_class() {
            warn!(schema = self.schema.name(), class = %class, "dropping custom attribute of a non custom attribute class");
            return None;
        }
        let values = raw
            .values
            .into_iter()
            .map(|(name, value)| {
                let shaped = shape_member(owner, definition, &name, value);
                (name, shaped)
            })
            .collect();
        Some(CustomAttribute { class, values })
    }

    fn set_custom_attribute(&mut self, target: &CaTarget, attribute: CustomAttribute) {
        match target {
            CaTarget::Schema => self.schema.custom_attributes.set(attribute),
            CaTarget::Class(class) => {
                if let Some(c) = self.schema.get_class_mut(class) {
                    c.custom_attributes.set(attribute);
                }
            }
            CaTarget::Property(class, property) => {
                if let Some(p) = self
                    .schema
                    .get_class_mut(class)
                    .and_then(|c| c.local_property_mut(property))
                {
                    p.custom_attributes.set(attribute);
                }
            }
            CaTarget::Constraint(class, is_source) => {
                if let Some(rel) = self.schema.get_class_mut(class).and_then(EcClass::relationship_mut) {
                    let end = if *is_source { &mut rel.source } else { &mut rel.target };
                    end.custom_attributes.set(attribute);
                }
            }
        }
    }

    /// Entity classes marked with `CoreCustomAttributes:IsMixin` become mixins.
    fn convert_mixins(&mut self) {
        let marker = is_mixin_class();
        let marked: Vec<(String, Option<String>)> = self
            .schema
            .classes()
            .filter(|c| matches!(c.class_type, ClassType::Entity))
            .filter_map(|c| {
                let ca = c.custom_attributes.get(&marker)?;
                let applies_to = ca
                    .get(APPLIES_TO_ENTITY_CLASS)
                    .and_then(InstanceValue::as_str)
                    .map(str::to_string);
                Some((c.name().to_string(), applies_to))
            })
            .collect();
        if marked.is_empty() {
            return;
        }
        for (name, applies_text) in marked {
            let applies_to = applies_text.and_then(|text| match self.resolve_kind(&raw_ref(&text, self.style), ItemKind::Class) {
                Resolved::Found(r) => Some(r),
                _ => None,
            });
            if applies_to.is_none() {
                warn!(schema = self.schema.name(), class = %name, "mixin has no resolvable applies-to class");
            }
            if let Some(class) = self.schema.get_class_mut(&name) {
                debug!(class = %name, "converting entity class to mixin");
                class.custom_attributes.remove(&marker);
                class.class_type = ClassType::Mixin { applies_to };
            }
        }
        if !self.schema.uses_schema(CORE_SCHEMA_NAME) {
            let _ = self.schema.remove_referenced_schema(CORE_SCHEMA_NAME);
        }
    }

    // ========================================================================
    // CONVERSION AND VALIDATION
    // ========================================================================

    /// Older documents may leave role labels empty; default them from the
    /// relationship's label.
    fn default_role_labels(&mut self) {
        for item in self.schema.items_mut() {
            let Some(class) = item.as_class_mut() else {
                continue;
            };
            let label = class.info.display_label().to_string();
            let Some(rel) = class.relationship_mut() else {
                continue;
            };
            if rel.source.role_label.trim().is_empty() {
                rel.source.role_label = label.clone();
            }
            if rel.target.role_label.trim().is_empty() {
                rel.target.role_label = format!("{label} (Reversed)");
            }
        }
    }

    /// Validate. Only a complete 3.2 document fails on errors; older documents
    /// and pruned reads stay usable at a lower compatibility level.
    fn finish(mut self) -> Result<Schema, ReadError> {
        if self.ec_version < EcVersion::V3_2 {
            self.default_role_labels();
        }
        let report = self.schema.validate();
        if self.ec_version == EcVersion::V3_2 && self.pruned.is_empty() {
            if let Some(error) = report.errors().next() {
                return Err(ReadError::invalid(self.format, error.to_string()));
            }
        }
        if !report.is_ec3_2_compatible() {
            debug!(schema = self.schema.name(), issues = report.issues.len(), "schema read below the latest validation level");
        }
        Ok(self.schema)
    }
}

fn split_legacy(entry: &str) -> (&str, Option<&str>) {
    match entry.split_once('(') {
        Some((unit, rest)) => (unit.trim(), Some(rest.trim_end_matches(')').trim())),
        None => (entry.trim(), None),
    }
}

// ============================================================================
// VALUE SHAPING
// ============================================================================

/// Reshape a raw value by the property it is written for.
///
/// Readers produce generic nesting: XML gives a tagged member list for any
/// element with children, JSON gives untagged arrays. Struct values become
/// `Struct`, array members get element names.
fn shape_member(owner: &Schema, class: &EcClass, member: &str, value: InstanceValue) -> InstanceValue {
    match owner.find_property(class.name(), member, true) {
        Some(property) => shape_value(owner, &property.kind, value),
        None => value,
    }
}

fn shape_value(owner: &Schema, kind: &PropertyKind, value: InstanceValue) -> InstanceValue {
    match kind {
        PropertyKind::Struct { struct_class } => shape_struct(owner, struct_class, value),
        PropertyKind::StructArray { struct_class, .. } => InstanceValue::Array(
            into_members(value)
                .into_iter()
                .map(|(tag, member)| {
                    let tag = if tag.is_empty() { struct_class.name.clone() } else { tag };
                    (tag, shape_struct(owner, struct_class, member))
                })
                .collect(),
        ),
        PropertyKind::PrimitiveArray { ty, .. } => {
            let element = primitive_element_name(owner, ty);
            InstanceValue::Array(
                into_members(value)
                    .into_iter()
                    .map(|(tag, member)| (if tag.is_empty() { element.clone() } else { tag }, member))
                    .collect(),
            )
        }
        PropertyKind::Primitive { .. } | PropertyKind::Navigation { .. } => value,
    }
}

fn shape_struct(owner: &Schema, struct_class: &ItemRef, value: InstanceValue) -> InstanceValue {
    let definition = owner.resolve_class_with_owner(struct_class);
    InstanceValue::Struct(
        into_members(value)
            .into_iter()
            .map(|(name, member)| {
                let member = match definition {
                    Some((schema, class)) => shape_member(schema, class, &name, member),
                    None => member,
                };
                (name, member)
            })
            .collect(),
    )
}

fn into_members(value: InstanceValue) -> Vec<(String, InstanceValue)> {
    match value {
        InstanceValue::Array(members) => members,
        InstanceValue::Struct(map) => map.into_iter().collect(),
        InstanceValue::Primitive(text) if text.trim().is_empty() => Vec::new(),
        InstanceValue::Primitive(text) => vec![(String::new(), InstanceValue::Primitive(text))],
    }
}

pub(crate) fn primitive_element_name(owner: &Schema, ty: &PrimitiveTypeRef) -> String {
    match ty {
        PrimitiveTypeRef::Primitive(p) => p.type_name().to_string(),
        PrimitiveTypeRef::Enumeration(r) => owner
            .resolve::<Enumeration>(r)
            .map_or(PrimitiveType::String, |e| e.backing_type.primitive())
            .type_name()
            .to_string(),
    }
}
