use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::domain::archimate::{ElementType, Layer, RelationshipType};

/// One architecture concept, as declared by an element file.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// The element ID. Unique within a registry.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// The declared element type, e.g. `application-component`.
    pub element_type: String,
    /// The declared layer, e.g. `application`.
    pub layer: String,
    /// Free-form scalar properties such as `owner` or `status`.
    pub properties: BTreeMap<String, String>,
    /// Tags, de-duplicated, in declaration order.
    pub tags: Vec<String>,
    /// Outgoing relationships, in declaration order.
    pub relationships: Vec<Relationship>,
    /// The markdown body.
    pub documentation: String,
    /// Front-matter keys the toolchain does not interpret.
    pub extra: BTreeMap<String, Value>,
}

/// A directed, typed edge owned by its source element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// The type exactly as written in the file.
    pub declared_type: String,
    /// The normalised type, if the declared one is in the vocabulary.
    pub kind: Option<RelationshipType>,
    /// The ID of the element this relationship points at.
    pub target: String,
    /// Optional free text.
    pub description: Option<String>,
}

impl Relationship {
    /// The canonical type name, or the declared one if it is not recognised.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self.kind {
            Some(kind) => kind.name(),
            None => &self.declared_type,
        }
    }
}

impl Element {
    /// Builds an element from parsed front matter and the document body.
    ///
    /// Relationship entries without a target are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if a mandatory field (`id`, `name`, `type`, `layer`)
    /// is absent or empty, or a known field has the wrong shape.
    pub fn from_front_matter(front_matter: &Mapping, body: &str) -> Result<Self, FieldError> {
        let raw: RawElement = serde_yaml::from_value(Value::Mapping(front_matter.clone()))
            .map_err(FieldError::Invalid)?;

        let id = required(raw.id, "id")?;
        let name = required(raw.name, "name")?;
        let element_type = required(raw.element_type, "type")?;
        let layer = required(raw.layer, "layer")?;

        let relationships = raw
            .relationships
            .unwrap_or_default()
            .into_iter()
            .filter_map(|relationship| {
                let Some(target) = relationship.target.filter(|t| !t.is_empty()) else {
                    tracing::warn!("{id}: ignoring relationship without a target");
                    return None;
                };
                let declared_type = relationship
                    .kind
                    .unwrap_or_else(|| RelationshipType::Association.name().to_string());
                Some(Relationship {
                    kind: RelationshipType::normalize(&declared_type),
                    declared_type,
                    target,
                    description: relationship.description,
                })
            })
            .collect();

        let properties = raw
            .properties
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, value)| {
                let key = scalar_to_string(&key)?;
                match scalar_to_string(&value) {
                    Some(value) => Some((key, value)),
                    None => {
                        tracing::debug!("{id}: ignoring non-scalar property '{key}'");
                        None
                    }
                }
            })
            .collect();

        let mut tags: Vec<String> = Vec::new();
        for tag in raw.tags.map(Tags::into_vec).unwrap_or_default() {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Ok(Self {
            id,
            name,
            element_type,
            layer,
            properties,
            tags,
            relationships,
            documentation: body.to_string(),
            extra: raw.extra,
        })
    }

    /// The declared layer, if it is one of the seven.
    #[must_use]
    pub fn layer(&self) -> Option<Layer> {
        self.layer.parse().ok()
    }

    /// The declared element type, if it is known.
    #[must_use]
    pub fn element_type(&self) -> Option<&'static ElementType> {
        ElementType::by_name(&self.element_type)
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, FieldError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(FieldError::MissingField(field))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

/// Why front matter does not describe an element.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// A mandatory field is absent or empty.
    #[error("missing mandatory field '{0}'")]
    MissingField(&'static str),
    /// A known field has the wrong shape.
    #[error("invalid element fields: {0}")]
    Invalid(#[source] serde_yaml::Error),
}

#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, rename = "type")]
    element_type: Option<String>,
    #[serde(default)]
    layer: Option<String>,
    #[serde(default)]
    properties: Option<Mapping>,
    #[serde(default)]
    tags: Option<Tags>,
    #[serde(default)]
    relationships: Option<Vec<RawRelationship>>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Tags may be written as a list or as one comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Tags {
    List(Vec<String>),
    Csv(String),
}

impl Tags {
    fn into_vec(self) -> Vec<String> {
        let tags = match self {
            Self::List(list) => list,
            Self::Csv(csv) => csv.split(',').map(ToString::to_string).collect(),
        };
        tags.into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// Accepts numbers and booleans where a string is expected, since YAML
/// authors rarely quote names like `2024`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}
