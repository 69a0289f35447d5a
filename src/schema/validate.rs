//! Schema validation.
//!
//! Two levels are checked. Errors make the schema invalid; latest-level issues
//! only clear [`Schema::is_ec3_2_compatible`], so a schema converted from an
//! older document can still be used at a lower compatibility level.

use std::collections::VecDeque;
use std::fmt;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::base::{ItemRef, NameKey};

use super::class::{ClassType, EcClass, RelationshipConstraint};
use super::conflict::are_compatible;
use super::hierarchy::visible_properties;
use super::item::SchemaItem;
use super::Schema;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IssueLevel {
    /// The schema is invalid.
    Error,
    /// The schema is usable but does not meet the latest validation level.
    Latest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    /// Qualified name of the offending item.
    pub item: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.message)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn is_ec3_2_compatible(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.level == IssueLevel::Error)
    }

    fn error(&mut self, item: impl fmt::Display, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            level: IssueLevel::Error,
            item: item.to_string(),
            message: message.into(),
        });
    }

    fn latest(&mut self, item: impl fmt::Display, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            level: IssueLevel::Latest,
            item: item.to_string(),
            message: message.into(),
        });
    }
}

impl Schema {
    /// Validate the schema, inferring missing abstract constraints first.
    ///
    /// Records the outcome in [`Schema::is_ec3_2_compatible`].
    pub fn validate(&mut self) -> ValidationReport {
        self.infer_abstract_constraints();
        let report = self.check();
        self.ec3_2_compatible = report.is_ec3_2_compatible();
        for issue in &report.issues {
            match issue.level {
                IssueLevel::Error => warn!(schema = self.name(), %issue, "schema validation error"),
                IssueLevel::Latest => debug!(schema = self.name(), %issue, "schema below latest validation level"),
            }
        }
        report
    }

    /// Fill in abstract constraints left implicit by older documents.
    ///
    /// With several constraint classes the abstract constraint is their
    /// nearest common base class. Returns false when some constraint had no
    /// common base.
    pub(crate) fn infer_abstract_constraints(&mut self) -> bool {
        let mut inferred: Vec<(String, bool, ItemRef)> = Vec::new();
        let mut all_ok = true;
        for class in self.classes() {
            let Some(rel) = class.relationship() else {
                continue;
            };
            for (is_source, constraint) in [(true, &rel.source), (false, &rel.target)] {
                if constraint.abstract_constraint.is_some() || constraint.constraint_classes.len() < 2 {
                    continue;
                }
                match self.common_base_class(&constraint.constraint_classes) {
                    Some(common) => inferred.push((class.name().to_string(), is_source, common)),
                    None => all_ok = false,
                }
            }
        }
        for (class, is_source, common) in inferred {
            debug!(class = %class, abstract_constraint = %common, "inferred abstract constraint");
            if let Some(rel) = self.get_class_mut(&class).and_then(EcClass::relationship_mut) {
                let constraint = if is_source { &mut rel.source } else { &mut rel.target };
                constraint.abstract_constraint = Some(common);
            }
        }
        all_ok
    }

    /// Nearest class every entry of `classes` is, or derives from.
    ///
    /// Candidates are the first class and its ancestors in breadth-first order.
    pub(crate) fn common_base_class(&self, classes: &[ItemRef]) -> Option<ItemRef> {
        let (first, rest) = classes.split_first()?;
        let mut queue = VecDeque::from([first.clone()]);
        let mut seen = FxHashSet::default();
        while let Some(candidate) = queue.pop_front() {
            if !seen.insert(candidate.clone()) {
                continue;
            }
            if rest.iter().all(|c| self.is_a(c, &candidate)) {
                return Some(candidate);
            }
            if let Some(c) = self.resolve_class(&candidate) {
                queue.extend(c.base_classes().iter().cloned());
            }
        }
        None
    }

    fn check(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        for item in self.items() {
            let qualified = self.item_ref(item.name());
            item.visit_refs(&mut |r| {
                if self.resolve_item(r).is_none() {
                    report.error(&qualified, format!("reference to '{r}' cannot be resolved"));
                }
            });
            match item {
                SchemaItem::Class(class) => self.check_class(class, &qualified, &mut report),
                SchemaItem::KindOfQuantity(koq) if koq.persistence_unit.is_none() => {
                    report.error(&qualified, "kind of quantity has no persistence unit");
                }
                _ => {}
            }
        }
        report
    }

    fn check_class(&self, class: &EcClass, qualified: &ItemRef, report: &mut ValidationReport) {
        let inherited = visible_properties(self, class, false);
        for property in class.properties() {
            let Some(base) = inherited.get(&NameKey::new(property.name())) else {
                continue;
            };
            if !are_compatible(self, base.property, property) {
                report.error(
                    qualified,
                    format!(
                        "property '{}' overrides '{}.{}' with an incompatible type",
                        property.name(),
                        base.declaring_class(),
                        base.property.name()
                    ),
                );
            }
        }

        if let ClassType::Mixin { applies_to: Some(applies_to) } = &class.class_type {
            for base in class.base_classes() {
                let base_applies = self
                    .resolve_class(base)
                    .and_then(|b| match &b.class_type {
                        ClassType::Mixin { applies_to } => applies_to.clone(),
                        _ => None,
                    });
                if let Some(base_applies) = base_applies {
                    if !self.is_a(applies_to, &base_applies) {
                        report.error(
                            qualified,
                            format!("mixin applies to '{applies_to}' which is not a '{base_applies}'"),
                        );
                    }
                }
            }
        }

        let Some(rel) = class.relationship() else {
            return;
        };
        for (end, constraint) in [("source", &rel.source), ("target", &rel.target)] {
            self.check_constraint(qualified, end, constraint, report);
        }
        for base in class.base_classes() {
            let Some(base_rel) = self.resolve_class(base).and_then(EcClass::relationship) else {
                continue;
            };
            for (end, derived, inherited) in [
                ("source", &rel.source, &base_rel.source),
                ("target", &rel.target, &base_rel.target),
            ] {
                if !derived.multiplicity.is_narrower_or_equal(&inherited.multiplicity) {
                    report.latest(
                        qualified,
                        format!(
                            "{end} multiplicity {} is wider than {} on base '{base}'",
                            derived.multiplicity, inherited.multiplicity
                        ),
                    );
                }
            }
        }
    }

    fn check_constraint(
        &self,
        qualified: &ItemRef,
        end: &str,
        constraint: &RelationshipConstraint,
        report: &mut ValidationReport,
    ) {
        if constraint.constraint_classes.is_empty() {
            report.error(qualified, format!("{end} constraint has no constraint classes"));
            return;
        }
        for c in &constraint.constraint_classes {
            if let Some(class) = self.resolve_class(c) {
                if class.is_struct() || class.is_custom_attribute_class() {
                    report.error(
                        qualified,
                        format!("{end} constraint class '{c}' is a {} class", class.class_type.type_name()),
                    );
                }
            }
        }
        match &constraint.abstract_constraint {
            Some(abstract_constraint) => {
                for c in &constraint.constraint_classes {
                    if !self.is_a(c, abstract_constraint) {
                        report.error(
                            qualified,
                            format!("{end} constraint class '{c}' is not a '{abstract_constraint}'"),
                        );
                    }
                }
            }
            None if constraint.constraint_classes.len() > 1 => {
                report.latest(qualified, format!("{end} constraint classes have no common base class"));
            }
            None => {}
        }
        if constraint.role_label.is_empty() {
            report.latest(qualified, format!("{end} constraint has no role label"));
        }
    }
}
