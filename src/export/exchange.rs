use std::{collections::BTreeMap, fmt};

use crate::domain::{Element, Registry, RelationshipType};

const NAMESPACE: &str = "http://www.opengroup.org/xsd/archimate/3.0/";
const SCHEMA_LOCATION: &str = "http://www.opengroup.org/xsd/archimate/3.1/archimate3_Model.xsd";
const DOCUMENTATION_LIMIT: usize = 500;

/// Properties every model defines, with their exchange data types.
const STANDARD_PROPERTIES: [(&str, &str); 12] = [
    ("owner", "string"),
    ("status", "string"),
    ("criticality", "string"),
    ("cost", "currency"),
    ("complexity", "string"),
    ("lifecycle-phase", "string"),
    ("version", "string"),
    ("last-updated", "date"),
    ("source", "string"),
    ("urgency", "string"),
    ("trend", "string"),
    ("maturity-level", "string"),
];

/// Renders a registry as an ArchiMate 3.1 Model Exchange document.
///
/// Relationships to unknown elements are left out. Relationship identifiers
/// are assigned sequentially, `rel_0000` onwards, in element load order.
#[derive(Debug)]
pub struct Exchange<'a>(pub &'a Registry);

impl Exchange<'_> {
    /// How many relationships the document contains.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.relationships().count()
    }

    fn relationships(&self) -> impl Iterator<Item = (&Element, &Element, &crate::domain::Relationship)> {
        let registry = self.0;
        registry.elements().flat_map(move |source| {
            source.relationships.iter().filter_map(move |relationship| {
                registry
                    .get(&relationship.target)
                    .map(|target| (source, target, relationship))
            })
        })
    }

    fn property_definitions(&self) -> BTreeMap<String, &'static str> {
        let mut definitions: BTreeMap<String, &'static str> = STANDARD_PROPERTIES
            .iter()
            .map(|&(name, kind)| (name.to_string(), kind))
            .collect();
        for element in self.0.elements() {
            for key in element.properties.keys() {
                definitions.entry(property_key(key)).or_insert("string");
            }
        }
        definitions
    }
}

impl fmt::Display for Exchange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            f,
            r#"<model xmlns="{NAMESPACE}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="{NAMESPACE} {SCHEMA_LOCATION}" identifier="model-1" version="1.0">"#
        )?;
        writeln!(f, "  <name>Enterprise Architecture Model</name>")?;
        writeln!(
            f,
            "  <documentation>Enterprise Architecture Model generated from markdown elements</documentation>"
        )?;
        writeln!(f, "  <metadata>")?;
        writeln!(f, "    <schemaInfo>")?;
        writeln!(f, "      <schema>{NAMESPACE}</schema>")?;
        writeln!(f, "      <schemaversion>3.1</schemaversion>")?;
        writeln!(f, "    </schemaInfo>")?;
        writeln!(f, "  </metadata>")?;

        writeln!(f, "  <elements>")?;
        for element in self.0.elements() {
            write_element(f, element)?;
        }
        writeln!(f, "  </elements>")?;

        let mut relationships = self.relationships().peekable();
        if relationships.peek().is_some() {
            writeln!(f, "  <relationships>")?;
            for (index, (source, target, relationship)) in relationships.enumerate() {
                let kind = relationship
                    .kind
                    .map_or("Association", RelationshipType::exchange_name);
                write!(
                    f,
                    r#"    <relationship identifier="rel_{index:04}" source="{}" target="{}" xsi:type="{kind}""#,
                    escape(&source.id),
                    escape(&target.id)
                )?;
                match relationship.description.as_deref().filter(|d| !d.is_empty()) {
                    Some(description) => {
                        writeln!(f, ">")?;
                        writeln!(f, r#"      <name xml:lang="en">{}</name>"#, escape(description))?;
                        writeln!(f, "    </relationship>")?;
                    }
                    None => writeln!(f, "/>")?,
                }
            }
            writeln!(f, "  </relationships>")?;
        }

        writeln!(f, "  <propertyDefinitions>")?;
        for (name, kind) in self.property_definitions() {
            writeln!(
                f,
                r#"    <propertyDefinition identifier="propdef-{}" type="{kind}">"#,
                escape(&name)
            )?;
            writeln!(f, "      <name>{}</name>", escape(&name))?;
            writeln!(f, "    </propertyDefinition>")?;
        }
        writeln!(f, "  </propertyDefinitions>")?;

        writeln!(f, "</model>")
    }
}

fn write_element(f: &mut fmt::Formatter<'_>, element: &Element) -> fmt::Result {
    let kind = element
        .element_type()
        .map_or("BusinessObject", |t| t.exchange_name);
    writeln!(
        f,
        r#"    <element identifier="{}" xsi:type="{kind}">"#,
        escape(&element.id)
    )?;
    writeln!(f, r#"      <name xml:lang="en">{}</name>"#, escape(&element.name))?;

    if let Some(line) = element
        .documentation
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
    {
        let line: String = line.chars().take(DOCUMENTATION_LIMIT).collect();
        writeln!(f, "      <documentation>{}</documentation>", escape(&line))?;
    }

    let properties: Vec<_> = element
        .properties
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .collect();
    if !properties.is_empty() {
        writeln!(f, "      <properties>")?;
        for (key, value) in properties {
            writeln!(
                f,
                r#"        <property propertyDefinitionRef="propdef-{}">"#,
                escape(&property_key(key))
            )?;
            writeln!(f, "          <value>{}</value>", escape(value))?;
            writeln!(f, "        </property>")?;
        }
        writeln!(f, "      </properties>")?;
    }

    writeln!(f, "    </element>")
}

/// Property keys are lowercased, with underscores and spaces as hyphens.
fn property_key(key: &str) -> String {
    key.to_lowercase().replace(['_', ' '], "-")
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
