//! Device category detection from free-text item names
//!
//! Rules are an ordered list of case-insensitive patterns; the first pattern
//! that matches decides the category and whether the item needs an address.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::core::error::{ProvisionError, Result};
use crate::entities::bom::DeviceCategory;

/// A rule as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRuleSpec {
    pub pattern: String,
    pub category: DeviceCategory,
    #[serde(default)]
    pub requires_ip: bool,
}

/// Built-in rules, most specific first
const BUILTIN_RULES: &[(&str, DeviceCategory, bool)] = &[
    (
        r"\b(mount|mounting|bracket|adapter|housing|pole|junction box|wall arm)\b",
        DeviceCategory::Accessory,
        false,
    ),
    (
        r"\b(cable|patch|cat ?5e?|cat ?6a?|cat ?7|fib(er|re)|connector|rj-?45|sfp)\b",
        DeviceCategory::Cable,
        false,
    ),
    (r"\b(hdd|ssd|hard ?disk|disk|drive)\b", DeviceCategory::Storage, false),
    (r"\b(nvr|dvr|recorder|vms)\b", DeviceCategory::Recorder, true),
    (
        r"\b(camera|cam|kamera|ptz|dome|bullet|turret)\b",
        DeviceCategory::Camera,
        true,
    ),
    (r"\b(switch|poe switch)\b", DeviceCategory::Switch, true),
    (r"\b(router|lte|modem)\b", DeviceCategory::Router, true),
    (r"\b(firewall|utm)\b", DeviceCategory::Firewall, true),
    (
        r"\b(access control|door controller|controller)\b",
        DeviceCategory::AccessController,
        true,
    ),
    (r"\b(card ?reader|reader)\b", DeviceCategory::CardReader, false),
    (r"\b(intercom|door station)\b", DeviceCategory::Intercom, true),
    (r"\b(server)\b", DeviceCategory::Server, true),
    (r"\b(workstation|client pc|pc|laptop)\b", DeviceCategory::Workstation, true),
    (r"\b(ups)\b", DeviceCategory::Ups, true),
    (
        r"\b(sensor|detector|pir|contact|siren)\b",
        DeviceCategory::Sensor,
        false,
    ),
];

/// Compiled rule
#[derive(Debug, Clone)]
pub struct CategoryRule {
    regex: Regex,
    pub category: DeviceCategory,
    pub requires_ip: bool,
}

impl CategoryRule {
    pub fn new(pattern: &str, category: DeviceCategory, requires_ip: bool) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                ProvisionError::Config(format!("invalid category pattern '{}': {}", pattern, e))
            })?;
        Ok(Self {
            regex,
            category,
            requires_ip,
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Outcome of classifying one item name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: DeviceCategory,
    pub requires_ip: bool,
}

/// Ordered first-match-wins rule set
#[derive(Debug, Clone)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl CategoryRules {
    /// Built-in rules only
    pub fn builtin() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .filter_map(|(p, c, ip)| CategoryRule::new(p, *c, *ip).ok())
            .collect();
        Self { rules }
    }

    /// Custom rules evaluated before the built-in ones
    pub fn with_overrides(custom: &[CategoryRuleSpec]) -> Result<Self> {
        let mut rules = Vec::with_capacity(custom.len() + BUILTIN_RULES.len());
        for spec in custom {
            rules.push(CategoryRule::new(&spec.pattern, spec.category, spec.requires_ip)?);
        }
        rules.extend(Self::builtin().rules);
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn classify(&self, name: &str) -> Classification {
        self.rules
            .iter()
            .find(|r| r.matches(name))
            .map(|r| Classification {
                category: r.category,
                requires_ip: r.requires_ip,
            })
            .unwrap_or(Classification {
                category: DeviceCategory::Other,
                requires_ip: false,
            })
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::builtin()
    }
}
