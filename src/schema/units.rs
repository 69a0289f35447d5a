//! Units, phenomena, unit systems, formats and kinds of quantity.
//!
//! Unit conversion math is not modelled: a unit's `definition` is an opaque
//! expression string kept verbatim, and its numeric factors are plain values.

use crate::base::ItemRef;

use super::item::ItemInfo;

// ============================================================================
// PHENOMENON / UNIT SYSTEM
// ============================================================================

/// A measurable quantity (length, angle, ...). `definition` is an opaque formula.
#[derive(Clone, Debug, PartialEq)]
pub struct Phenomenon {
    pub info: ItemInfo,
    pub definition: String,
}

impl Phenomenon {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            info: ItemInfo::new(name),
            definition: definition.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnitSystem {
    pub info: ItemInfo,
}

impl UnitSystem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: ItemInfo::new(name),
        }
    }
}

// ============================================================================
// UNIT
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum UnitKind {
    Regular,
    Constant,
    /// Reciprocal of another unit of the same phenomenon.
    Inverted { inverts: ItemRef },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    pub info: ItemInfo,
    pub kind: UnitKind,
    pub phenomenon: Option<ItemRef>,
    pub unit_system: Option<ItemRef>,
    pub definition: Option<String>,
    pub numerator: Option<f64>,
    pub denominator: Option<f64>,
    pub offset: Option<f64>,
}

impl Unit {
    pub fn new(name: impl Into<String>, phenomenon: ItemRef, unit_system: ItemRef, definition: impl Into<String>) -> Self {
        Self {
            info: ItemInfo::new(name),
            kind: UnitKind::Regular,
            phenomenon: Some(phenomenon),
            unit_system: Some(unit_system),
            definition: Some(definition.into()),
            numerator: None,
            denominator: None,
            offset: None,
        }
    }

    pub fn constant(name: impl Into<String>, phenomenon: ItemRef, definition: impl Into<String>, numerator: f64) -> Self {
        Self {
            info: ItemInfo::new(name),
            kind: UnitKind::Constant,
            phenomenon: Some(phenomenon),
            unit_system: None,
            definition: Some(definition.into()),
            numerator: Some(numerator),
            denominator: None,
            offset: None,
        }
    }

    pub fn inverted(name: impl Into<String>, inverts: ItemRef, unit_system: ItemRef) -> Self {
        Self {
            info: ItemInfo::new(name),
            kind: UnitKind::Inverted { inverts },
            phenomenon: None,
            unit_system: Some(unit_system),
            definition: None,
            numerator: None,
            denominator: None,
            offset: None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, UnitKind::Constant)
    }

    pub fn inverts(&self) -> Option<&ItemRef> {
        match &self.kind {
            UnitKind::Inverted { inverts } => Some(inverts),
            _ => None,
        }
    }

    pub fn visit_refs(&self, f: &mut dyn FnMut(&ItemRef)) {
        if let Some(r) = &self.phenomenon {
            f(r);
        }
        if let Some(r) = &self.unit_system {
            f(r);
        }
        if let UnitKind::Inverted { inverts } = &self.kind {
            f(inverts);
        }
    }

    pub fn visit_refs_mut(&mut self, f: &mut dyn FnMut(&mut ItemRef)) {
        if let Some(r) = &mut self.phenomenon {
            f(r);
        }
        if let Some(r) = &mut self.unit_system {
            f(r);
        }
        if let UnitKind::Inverted { inverts } = &mut self.kind {
            f(inverts);
        }
    }
}

// ============================================================================
// FORMAT
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FormatType {
    #[default]
    Decimal,
    Fractional,
    Scientific,
    Station,
}

impl FormatType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decimal => "Decimal",
            Self::Fractional => "Fractional",
            Self::Scientific => "Scientific",
            Self::Station => "Station",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "decimal" => Some(Self::Decimal),
            "fractional" => Some(Self::Fractional),
            "scientific" => Some(Self::Scientific),
            "station" => Some(Self::Station),
            _ => None,
        }
    }
}

/// A unit with an optional label override. `Some("")` suppresses the label.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitLabel {
    pub unit: ItemRef,
    pub label: Option<String>,
}

impl UnitLabel {
    pub fn new(unit: ItemRef) -> Self {
        Self { unit, label: None }
    }

    pub fn with_label(unit: ItemRef, label: impl Into<String>) -> Self {
        Self {
            unit,
            label: Some(label.into()),
        }
    }
}

/// Up to four units a quantity is broken into (e.g. feet and inches).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompositeSpec {
    pub spacer: Option<String>,
    pub include_zero: Option<bool>,
    pub units: Vec<UnitLabel>,
}

pub const MAX_COMPOSITE_UNITS: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct Format {
    pub info: ItemInfo,
    pub format_type: FormatType,
    pub precision: Option<u32>,
    pub round_factor: Option<f64>,
    pub min_width: Option<u32>,
    pub show_sign_option: Option<String>,
    pub format_traits: Vec<String>,
    pub decimal_separator: Option<String>,
    pub thousand_separator: Option<String>,
    pub uom_separator: Option<String>,
    pub scientific_type: Option<String>,
    pub station_offset_size: Option<u32>,
    pub station_separator: Option<String>,
    pub composite: Option<CompositeSpec>,
}

impl Format {
    pub fn new(name: impl Into<String>, format_type: FormatType) -> Self {
        Self {
            info: ItemInfo::new(name),
            format_type,
            precision: None,
            round_factor: None,
            min_width: None,
            show_sign_option: None,
            format_traits: Vec::new(),
            decimal_separator: None,
            thousand_separator: None,
            uom_separator: None,
            scientific_type: None,
            station_offset_size: None,
            station_separator: None,
            composite: None,
        }
    }

    pub fn has_composite(&self) -> bool {
        self.composite.as_ref().is_some_and(|c| !c.units.is_empty())
    }

    pub fn visit_refs(&self, f: &mut dyn FnMut(&ItemRef)) {
        if let Some(composite) = &self.composite {
            for u in &composite.units {
                f(&u.unit);
            }
        }
    }

    pub fn visit_refs_mut(&mut self, f: &mut dyn FnMut(&mut ItemRef)) {
        if let Some(composite) = &mut self.composite {
            for u in &mut composite.units {
                f(&mut u.unit);
            }
        }
    }
}

// ============================================================================
// KIND OF QUANTITY
// ============================================================================

/// A presentation format as used by a kind of quantity, with optional precision
/// and unit overrides.
///
/// Text form: `f:DefaultRealU(4)[u:M|m][u:CM]`.
#[derive(Clone, Debug, PartialEq)]
pub struct FormatOverride {
    pub format: ItemRef,
    pub precision: Option<u32>,
    pub units: Vec<UnitLabel>,
}

impl FormatOverride {
    pub fn new(format: ItemRef) -> Self {
        Self {
            format,
            precision: None,
            units: Vec::new(),
        }
    }

    /// Parse the text form. `resolve` maps an alias (empty for unqualified names)
    /// to the schema name the item lives in.
    pub fn parse(text: &str, resolve: &dyn Fn(&str) -> Option<String>) -> Result<Self, String> {
        Self::parse_with(text, ':', resolve)
    }

    /// Parse the form JSON documents use, where references are `Schema.Item`.
    pub fn parse_full_names(text: &str, local_schema: &str) -> Result<Self, String> {
        Self::parse_with(text, '.', &|schema: &str| {
            if schema.is_empty() {
                Some(local_schema.to_string())
            } else {
                Some(schema.to_string())
            }
        })
    }

    fn parse_with(text: &str, separator: char, resolve: &dyn Fn(&str) -> Option<String>) -> Result<Self, String> {
        let text = text.trim();
        let name_end = text.find(['(', '[']).unwrap_or(text.len());
        let format = qualified_ref(&text[..name_end], separator, resolve)?;
        let mut rest = &text[name_end..];

        let mut precision = None;
        if let Some(after) = rest.strip_prefix('(') {
            let close = after
                .find(')')
                .ok_or_else(|| format!("unterminated precision in '{text}'"))?;
            let value = after[..close].trim();
            precision = Some(
                value
                    .parse()
                    .map_err(|_| format!("invalid precision '{value}' in '{text}'"))?,
            );
            rest = &after[close + 1..];
        }

        let mut units = Vec::new();
        while let Some(after) = rest.strip_prefix('[') {
            let close = after
                .find(']')
                .ok_or_else(|| format!("unterminated unit override in '{text}'"))?;
            let body = &after[..close];
            let unit_label = match body.split_once('|') {
                Some((unit, label)) => UnitLabel::with_label(qualified_ref(unit, separator, resolve)?, label),
                None => UnitLabel::new(qualified_ref(body, separator, resolve)?),
            };
            units.push(unit_label);
            rest = &after[close + 1..];
        }
        if !rest.trim().is_empty() {
            return Err(format!("unexpected trailing text in '{text}'"));
        }
        if units.len() > MAX_COMPOSITE_UNITS {
            return Err(format!("more than {MAX_COMPOSITE_UNITS} unit overrides in '{text}'"));
        }
        Ok(Self {
            format,
            precision,
            units,
        })
    }

    /// Render the text form. `qualify` returns the prefix (alias) for a reference,
    /// or `None` to write it unqualified.
    pub fn to_format_string(&self, qualify: &dyn Fn(&ItemRef) -> Option<String>) -> String {
        self.render(':', qualify)
    }

    /// Render with every reference written as `Schema.Item`.
    pub fn to_full_name_string(&self) -> String {
        self.render('.', &|r: &ItemRef| Some(r.schema.clone()))
    }

    fn render(&self, separator: char, qualify: &dyn Fn(&ItemRef) -> Option<String>) -> String {
        let write_ref = |r: &ItemRef| match qualify(r) {
            Some(prefix) => format!("{prefix}{separator}{}", r.name),
            None => r.name.clone(),
        };
        let mut out = write_ref(&self.format);
        if let Some(p) = self.precision {
            out.push_str(&format!("({p})"));
        }
        for u in &self.units {
            out.push('[');
            out.push_str(&write_ref(&u.unit));
            if let Some(label) = &u.label {
                out.push('|');
                out.push_str(label);
            }
            out.push(']');
        }
        out
    }
}

fn qualified_ref(text: &str, separator: char, resolve: &dyn Fn(&str) -> Option<String>) -> Result<ItemRef, String> {
    let text = text.trim();
    let (alias, name) = text.split_once(separator).unwrap_or(("", text));
    if name.is_empty() {
        return Err(format!("missing item name in '{text}'"));
    }
    let schema = resolve(alias).ok_or_else(|| format!("cannot resolve alias '{alias}' in '{text}'"))?;
    Ok(ItemRef::new(schema, name))
}

/// Associates a property with a persistence unit and presentation formats.
#[derive(Clone, Debug, PartialEq)]
pub struct KindOfQuantity {
    pub info: ItemInfo,
    pub persistence_unit: Option<ItemRef>,
    pub relative_error: f64,
    pub presentation_formats: Vec<FormatOverride>,
}

impl KindOfQuantity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: ItemInfo::new(name),
            persistence_unit: None,
            relative_error: 1.0,
            presentation_formats: Vec::new(),
        }
    }

    pub fn default_presentation_format(&self) -> Option<&FormatOverride> {
        self.presentation_formats.first()
    }

    pub fn visit_refs(&self, f: &mut dyn FnMut(&ItemRef)) {
        if let Some(r) = &self.persistence_unit {
            f(r);
        }
        for fmt in &self.presentation_formats {
            f(&fmt.format);
            for u in &fmt.units {
                f(&u.unit);
            }
        }
    }

    pub fn visit_refs_mut(&mut self, f: &mut dyn FnMut(&mut ItemRef)) {
        if let Some(r) = &mut self.persistence_unit {
            f(r);
        }
        for fmt in &mut self.presentation_formats {
            f(&mut fmt.format);
            for u in &mut fmt.units {
                f(&mut u.unit);
            }
        }
    }
}
