//! Deployment templates and the resource graph they are built from
//!
//! Resources declared in one deployment may reference each other. The
//! resource manager only re-applies a template reliably when every referenced
//! resource is declared before the resource referencing it, so
//! [`ResourceGraph`] keeps explicit dependency edges and emits resources in
//! topological order.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const DEPLOYMENT_TEMPLATE_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2015-01-01/deploymentTemplate.json#";
pub const CONTENT_VERSION: &str = "1.0.0.0";

/// Identity of a resource inside a template: its type and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    pub resource_type: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// `[resourceId('type', 'segment', ...)]` expression, one argument per
    /// name segment
    pub fn expression(&self) -> String {
        let segments = self
            .name
            .split('/')
            .map(|s| format!("'{}'", s))
            .collect::<Vec<_>>()
            .join(", ");
        format!("[resourceId('{}', {})]", self.resource_type, segments)
    }

    fn parse_expression(expr: &str) -> Option<Self> {
        let args = expr.strip_prefix("[resourceId(")?.strip_suffix(")]")?;
        let mut parts = args
            .split(',')
            .map(|p| p.trim().trim_matches('\'').to_string());
        let resource_type = parts.next()?;
        let name = parts.collect::<Vec<_>>().join("/");
        if name.is_empty() {
            return None;
        }
        Some(Self { resource_type, name })
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.name)
    }
}

impl Serialize for ResourceRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.expression())
    }
}

impl<'de> Deserialize<'de> for ResourceRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let expr = String::deserialize(deserializer)?;
        ResourceRef::parse_expression(&expr).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid resourceId expression: {}", expr))
        })
    }
}

/// One target resource in a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,

    pub name: String,

    pub api_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub properties: serde_json::Value,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ResourceRef>,
}

impl Resource {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            api_version: api_version.into(),
            location: None,
            sku: None,
            kind: None,
            zones: Vec::new(),
            tags: BTreeMap::new(),
            properties: serde_json::Value::Null,
            depends_on: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_sku(mut self, sku: serde_json::Value) -> Self {
        self.sku = Some(sku);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }

    pub fn depends_on(mut self, dependency: ResourceRef) -> Self {
        self.depends_on.push(dependency);
        self
    }

    pub fn key(&self) -> ResourceRef {
        ResourceRef::new(&self.resource_type, &self.name)
    }
}

/// Resources plus template metadata, as submitted to the deployment API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(rename = "$schema")]
    pub schema: String,

    pub content_version: String,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: serde_json::Map<String, serde_json::Value>,

    pub resources: Vec<Resource>,
}

impl Template {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self {
            schema: DEPLOYMENT_TEMPLATE_SCHEMA.to_string(),
            content_version: CONTENT_VERSION.to_string(),
            parameters: serde_json::Map::new(),
            resources,
        }
    }

    /// Resources of one type, in template order
    pub fn by_type(&self, resource_type: &str) -> Vec<&Resource> {
        self.resources
            .iter()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }
}

/// Declaration-ordered resource set with dependency edges
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: Vec<Resource>,
    index: HashMap<ResourceRef, usize>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Resource) -> Result<()> {
        let key = resource.key();
        if self.index.contains_key(&key) {
            return Err(CloudError::DuplicateResource(key.to_string()));
        }
        self.index.insert(key, self.nodes.len());
        self.nodes.push(resource);
        Ok(())
    }

    pub fn contains(&self, key: &ResourceRef) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.nodes.iter()
    }

    /// Topologically ordered resources.
    ///
    /// Kahn's algorithm, always taking the earliest-declared ready resource,
    /// so a graph already in dependency order comes out unchanged.
    pub fn sorted(self) -> Result<Vec<Resource>> {
        let count = self.nodes.len();
        let mut pending = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

        for (i, resource) in self.nodes.iter().enumerate() {
            for dependency in &resource.depends_on {
                let j = *self
                    .index
                    .get(dependency)
                    .ok_or_else(|| CloudError::UnknownDependency {
                        resource: resource.key().to_string(),
                        dependency: dependency.to_string(),
                    })?;
                pending[i] += 1;
                dependents[j].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &d in &dependents[i] {
                pending[d] -= 1;
                if pending[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        if order.len() < count {
            let stuck = (0..count)
                .filter(|&i| pending[i] > 0)
                .map(|i| self.nodes[i].key().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CloudError::DependencyCycle(stuck));
        }

        let mut slots: Vec<Option<Resource>> = self.nodes.into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect())
    }

    pub fn into_template(self) -> Result<Template> {
        tracing::debug!("Sorting {} resources into template", self.nodes.len());
        Ok(Template::new(self.sorted()?))
    }
}
