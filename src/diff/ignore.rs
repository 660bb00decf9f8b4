use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Sub-comparisons that can be switched off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IgnoreCategory {
    Comments,
    Attributes,
    ValueTables,
    Defines,
}

impl FromStr for IgnoreCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comment" | "comments" => Ok(IgnoreCategory::Comments),
            "attribute" | "attributes" => Ok(IgnoreCategory::Attributes),
            "valuetable" | "valuetables" | "value_table" | "value_tables" => {
                Ok(IgnoreCategory::ValueTables)
            }
            "define" | "defines" => Ok(IgnoreCategory::Defines),
            other => Err(format!("Unknown ignore category '{}'", other)),
        }
    }
}

/// How one [`IgnoreCategory`] is treated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum IgnoreRule {
    #[default]
    Off,
    /// Skip the category everywhere.
    All,
    /// Skip the category for the named entries only: frame, signal or ECU names for
    /// comments and attributes, define keys for defines, table names for value tables.
    Entities(BTreeSet<String>),
}

/// Per-call configuration of the diff engine.
///
/// An ignored sub-comparison is not run at all, so it neither shows up in the tree nor
/// marks its ancestors as changed.
///
/// Attribute keys live in their own namespace: [`IgnoreFilter::ignore_attribute_key`]
/// drops one key on every owner, while `ignore_entity(Attributes, ..)` drops all
/// attributes of one frame, signal or ECU.
///
/// ```
/// use can_matrix::diff::{IgnoreCategory, IgnoreFilter};
///
/// let filter = IgnoreFilter::new()
///     .ignore_all(IgnoreCategory::Comments)
///     .ignore_entity(IgnoreCategory::Attributes, "Engine_01")
///     .ignore_attribute_key("GenMsgCycleTime");
/// assert!(filter.skips(IgnoreCategory::Comments, "Engine"));
/// assert!(filter.skips(IgnoreCategory::Attributes, "Engine_01"));
/// assert!(!filter.skips(IgnoreCategory::Attributes, "GenMsgCycleTime"));
/// assert!(filter.skips_attribute_key("GenMsgCycleTime"));
/// assert!(!filter.skips_attribute_key("GenMsgSendType"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IgnoreFilter {
    rules: BTreeMap<IgnoreCategory, IgnoreRule>,
    attribute_keys: BTreeSet<String>,
}

impl IgnoreFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_all(mut self, category: IgnoreCategory) -> Self {
        self.rules.insert(category, IgnoreRule::All);
        self
    }

    /// Adds `name` to the entities ignored for `category`. No effect if the whole
    /// category is already ignored.
    pub fn ignore_entity(mut self, category: IgnoreCategory, name: &str) -> Self {
        let rule: &mut IgnoreRule = self.rules.entry(category).or_default();
        match rule {
            IgnoreRule::All => {}
            IgnoreRule::Entities(names) => {
                names.insert(name.to_string());
            }
            IgnoreRule::Off => {
                *rule = IgnoreRule::Entities(BTreeSet::from([name.to_string()]));
            }
        }
        self
    }

    /// Skips attribute `key` wherever it appears.
    pub fn ignore_attribute_key(mut self, key: &str) -> Self {
        self.attribute_keys.insert(key.to_string());
        self
    }

    pub fn rule(&self, category: IgnoreCategory) -> &IgnoreRule {
        const OFF: &IgnoreRule = &IgnoreRule::Off;
        self.rules.get(&category).unwrap_or(OFF)
    }

    /// `true` when the category is ignored everywhere.
    pub fn skips_all(&self, category: IgnoreCategory) -> bool {
        matches!(self.rule(category), IgnoreRule::All)
    }

    /// `true` when the category is ignored for the entry `name`.
    pub fn skips(&self, category: IgnoreCategory, name: &str) -> bool {
        match self.rule(category) {
            IgnoreRule::Off => false,
            IgnoreRule::All => true,
            IgnoreRule::Entities(names) => names.contains(name),
        }
    }

    /// `true` when attribute `key` is ignored, either by key or because the whole
    /// attributes category is.
    pub fn skips_attribute_key(&self, key: &str) -> bool {
        self.skips_all(IgnoreCategory::Attributes) || self.attribute_keys.contains(key)
    }
}
