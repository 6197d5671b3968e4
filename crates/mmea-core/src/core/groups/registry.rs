use crate::core::chem::smarts::{SmartsError, SmartsPattern, parse_smarts};
use crate::core::models::element::Element;
use crate::core::models::topology::BondOrder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::debug;

const DEFAULT_GROUPS_TOML: &str = include_str!("../../../data/functional_groups.toml");

static DEFAULT_REGISTRY: OnceLock<FunctionalGroupRegistry> = OnceLock::new();

/// A functional group known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionalGroupInfo {
    name: String,
    pattern: SmartsPattern,
    target: Element,
    heavy: Element,
}

impl FunctionalGroupInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parsed substructure pattern.
    pub fn pattern(&self) -> &SmartsPattern {
        &self.pattern
    }

    /// The element replaced inside each pattern match.
    pub fn target(&self) -> Element {
        self.target
    }

    /// The placeholder element substituted for the target.
    pub fn heavy(&self) -> Element {
        self.heavy
    }

    /// The group name as used in derived file names (spaces become `_`).
    pub fn file_token(&self) -> String {
        self.name.replace(' ', "_")
    }

    /// The full definition as a comparable value. Two registries that define a
    /// group under the same name but with a different pattern or element give
    /// different keys.
    pub fn key(&self) -> GroupKey {
        GroupKey {
            name: self.name.clone(),
            pattern: self.pattern.as_str().to_string(),
            target: self.target,
            heavy: self.heavy,
        }
    }
}

/// Value form of a [`FunctionalGroupInfo`], used in unit identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub name: String,
    pub pattern: String,
    pub target: Element,
    pub heavy: Element,
}

/// Outcome of matching a source identifier against the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupResolution {
    /// The first matching group in registry order.
    pub chosen: Option<Arc<FunctionalGroupInfo>>,
    /// Names of every other group whose name also occurs in the identifier.
    pub others: Vec<String>,
}

/// Strategy used by structural units to find their functional group.
pub trait GroupResolver: Send + Sync {
    fn resolve(&self, identifier: &str) -> GroupResolution;

    /// Exact lookup by group name.
    fn by_name(&self, name: &str) -> Option<Arc<FunctionalGroupInfo>>;

    /// The group whose placeholder element is `heavy`, if any.
    fn by_heavy(&self, heavy: Element) -> Option<Arc<FunctionalGroupInfo>>;

    /// Bond order used when joining two placeholder atoms.
    fn bond_order(&self, a: Element, b: Element) -> BondOrder;
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Group '{group}' uses unknown element symbol '{symbol}'")]
    UnknownElement { group: String, symbol: String },
    #[error("Group '{group}' has an invalid pattern: {source}")]
    InvalidPattern { group: String, source: SmartsError },
    #[error("Group name '{0}' is defined more than once")]
    DuplicateName(String),
    #[error("Heavy element {heavy} is used by both '{first}' and '{second}'")]
    DuplicateHeavyElement {
        heavy: String,
        first: String,
        second: String,
    },
    #[error("Group '{0}' replaces its target element with itself")]
    HeavyEqualsTarget(String),
    #[error("Double bond rule names '{0}', which is not a registered heavy element")]
    UnknownDoubleBondElement(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    double_bonds: Vec<[String; 2]>,
    #[serde(rename = "group", default)]
    groups: Vec<GroupEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupEntry {
    name: String,
    pattern: String,
    target: String,
    heavy: String,
}

/// The ordered catalog of functional groups and double-bond pairing rules.
#[derive(Debug, Clone, Default)]
pub struct FunctionalGroupRegistry {
    groups: Vec<Arc<FunctionalGroupInfo>>,
    double_bonds: Vec<(Element, Element)>,
}

fn unordered(a: Element, b: Element) -> (Element, Element) {
    if a <= b { (a, b) } else { (b, a) }
}

impl FunctionalGroupRegistry {
    /// The registry built from the embedded group table, parsed once per process.
    pub fn default_registry() -> &'static FunctionalGroupRegistry {
        DEFAULT_REGISTRY.get_or_init(|| {
            Self::parse(DEFAULT_GROUPS_TOML, "<embedded>")
                .expect("Failed to parse embedded functional group table. This is a library bug.")
        })
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, RegistryError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(content).map_err(|e| RegistryError::Toml {
            path: origin.to_string(),
            source: e,
        })?;

        let mut groups: Vec<Arc<FunctionalGroupInfo>> = Vec::with_capacity(file.groups.len());
        let mut names = HashSet::new();
        for entry in file.groups {
            let element = |symbol: &str| {
                Element::from_symbol(symbol).ok_or_else(|| RegistryError::UnknownElement {
                    group: entry.name.clone(),
                    symbol: symbol.to_string(),
                })
            };
            let target = element(&entry.target)?;
            let heavy = element(&entry.heavy)?;
            if target == heavy {
                return Err(RegistryError::HeavyEqualsTarget(entry.name));
            }
            if let Some(first) = groups.iter().find(|g| g.heavy == heavy) {
                return Err(RegistryError::DuplicateHeavyElement {
                    heavy: heavy.symbol().to_string(),
                    first: first.name.clone(),
                    second: entry.name,
                });
            }
            if !names.insert(entry.name.clone()) {
                return Err(RegistryError::DuplicateName(entry.name));
            }
            let pattern =
                parse_smarts(&entry.pattern).map_err(|source| RegistryError::InvalidPattern {
                    group: entry.name.clone(),
                    source,
                })?;
            groups.push(Arc::new(FunctionalGroupInfo {
                name: entry.name,
                pattern,
                target,
                heavy,
            }));
        }

        let heavy_element = |symbol: &str| {
            Element::from_symbol(symbol)
                .filter(|e| groups.iter().any(|g| g.heavy == *e))
                .ok_or_else(|| RegistryError::UnknownDoubleBondElement(symbol.to_string()))
        };
        let double_bonds = file
            .double_bonds
            .iter()
            .map(|[a, b]| Ok(unordered(heavy_element(a)?, heavy_element(b)?)))
            .collect::<Result<Vec<_>, RegistryError>>()?;

        debug!(
            origin,
            groups = groups.len(),
            double_bonds = double_bonds.len(),
            "Loaded functional group registry."
        );
        Ok(Self {
            groups,
            double_bonds,
        })
    }

    pub fn groups(&self) -> &[Arc<FunctionalGroupInfo>] {
        &self.groups
    }

    pub fn double_bond_rules(&self) -> &[(Element, Element)] {
        &self.double_bonds
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns the first group, in registry order, whose name occurs in `identifier`.
    pub fn find_group_for_identifier(&self, identifier: &str) -> Option<&FunctionalGroupInfo> {
        self.groups
            .iter()
            .find(|g| identifier.contains(g.name.as_str()))
            .map(Arc::as_ref)
    }

    pub fn is_double_bond(&self, a: Element, b: Element) -> bool {
        self.double_bonds.contains(&unordered(a, b))
    }
}

impl GroupResolver for FunctionalGroupRegistry {
    fn resolve(&self, identifier: &str) -> GroupResolution {
        let mut matching = self
            .groups
            .iter()
            .filter(|g| identifier.contains(g.name.as_str()));
        let chosen = matching.next().cloned();
        let others = matching.map(|g| g.name.clone()).collect();
        GroupResolution { chosen, others }
    }

    fn by_name(&self, name: &str) -> Option<Arc<FunctionalGroupInfo>> {
        self.groups.iter().find(|g| g.name == name).cloned()
    }

    fn by_heavy(&self, heavy: Element) -> Option<Arc<FunctionalGroupInfo>> {
        self.groups.iter().find(|g| g.heavy == heavy).cloned()
    }

    fn bond_order(&self, a: Element, b: Element) -> BondOrder {
        if self.is_double_bond(a, b) {
            BondOrder::Double
        } else {
            BondOrder::Single
        }
    }
}
