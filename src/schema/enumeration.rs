//! Enumerations: named value sets backed by `int` or `string`.

use crate::base::is_valid_name;
use crate::error::{EcError, EcResult};

use super::item::ItemInfo;
use super::property::PrimitiveType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnumBackingType {
    Integer,
    String,
}

impl EnumBackingType {
    pub fn primitive(self) -> PrimitiveType {
        match self {
            Self::Integer => PrimitiveType::Integer,
            Self::String => PrimitiveType::String,
        }
    }

    pub fn from_primitive(ty: PrimitiveType) -> Option<Self> {
        match ty {
            PrimitiveType::Integer => Some(Self::Integer),
            PrimitiveType::String => Some(Self::String),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EnumValue {
    Integer(i32),
    String(String),
}

impl EnumValue {
    pub fn backing_type(&self) -> EnumBackingType {
        match self {
            Self::Integer(_) => EnumBackingType::Integer,
            Self::String(_) => EnumBackingType::String,
        }
    }

    /// Invariant text form, as written to documents.
    pub fn to_text(&self) -> String {
        match self {
            Self::Integer(i) => i.to_string(),
            Self::String(s) => s.clone(),
        }
    }

    pub fn parse(text: &str, backing: EnumBackingType) -> Option<Self> {
        match backing {
            EnumBackingType::Integer => text.trim().parse().ok().map(Self::Integer),
            EnumBackingType::String => Some(Self::String(text.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Enumerator {
    name: String,
    pub value: EnumValue,
    pub display_label: Option<String>,
    pub description: String,
}

impl Enumerator {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_label(&self) -> &str {
        self.display_label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Enumeration {
    pub info: ItemInfo,
    pub backing_type: EnumBackingType,
    pub is_strict: bool,
    enumerators: Vec<Enumerator>,
}

impl Enumeration {
    pub fn new(name: impl Into<String>, backing_type: EnumBackingType) -> Self {
        Self {
            info: ItemInfo::new(name),
            backing_type,
            is_strict: true,
            enumerators: Vec::new(),
        }
    }

    /// Add an enumerator. Names and values must both be unique; the value must
    /// match the backing type.
    pub fn add_enumerator(&mut self, name: &str, value: EnumValue) -> EcResult<&mut Enumerator> {
        if !is_valid_name(name) {
            return Err(EcError::invalid_name(name));
        }
        if value.backing_type() != self.backing_type {
            return Err(EcError::mismatch(format!(
                "enumerator '{name}' value does not match backing type of '{}'",
                self.info.name()
            )));
        }
        if self.find_enumerator(name).is_some() || self.find_by_value(&value).is_some() {
            return Err(EcError::already_exists(self.info.name(), name));
        }
        self.enumerators.push(Enumerator {
            name: name.to_string(),
            value,
            display_label: None,
            description: String::new(),
        });
        let last = self.enumerators.len() - 1;
        Ok(&mut self.enumerators[last])
    }

    pub fn find_enumerator(&self, name: &str) -> Option<&Enumerator> {
        self.enumerators
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn find_by_value(&self, value: &EnumValue) -> Option<&Enumerator> {
        self.enumerators.iter().find(|e| &e.value == value)
    }

    pub fn enumerators(&self) -> &[Enumerator] {
        &self.enumerators
    }

    pub fn remove_enumerator(&mut self, name: &str) -> Option<Enumerator> {
        let idx = self
            .enumerators
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))?;
        Some(self.enumerators.remove(idx))
    }
}
