//! The fixed ArchiMate 3.2 vocabulary.
//!
//! Layers, element types and relationship types are closed sets. Each entry
//! carries the short codes used in canonical IDs and the names used by the
//! exporters, so that every lookup in the crate goes through one table.

use std::{fmt, str::FromStr};

/// One of the seven ArchiMate layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    /// Capabilities, resources, value streams.
    Strategy,
    /// Actors, processes, services and business objects.
    Business,
    /// Application components, services and data.
    Application,
    /// Nodes, devices, system software and artifacts.
    Technology,
    /// Equipment, facilities and materials.
    Physical,
    /// Stakeholders, drivers, goals and requirements.
    Motivation,
    /// Work packages, deliverables, plateaus and gaps.
    Implementation,
}

impl Layer {
    /// Every layer, in the order diagrams present them.
    pub const ALL: [Self; 7] = [
        Self::Strategy,
        Self::Business,
        Self::Application,
        Self::Technology,
        Self::Physical,
        Self::Motivation,
        Self::Implementation,
    ];

    /// The lowercase layer name as written in front matter.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Strategy => "strategy",
            Self::Business => "business",
            Self::Application => "application",
            Self::Technology => "technology",
            Self::Physical => "physical",
            Self::Motivation => "motivation",
            Self::Implementation => "implementation",
        }
    }

    /// The three letter code that prefixes canonical IDs.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Strategy => "str",
            Self::Business => "bus",
            Self::Application => "app",
            Self::Technology => "tec",
            Self::Physical => "phy",
            Self::Motivation => "mot",
            Self::Implementation => "imp",
        }
    }

    /// Fill colour used by the diagram exporters.
    #[must_use]
    pub const fn colour(self) -> &'static str {
        match self {
            Self::Strategy => "#FFF4E6",
            Self::Business => "#FFF9E6",
            Self::Application => "#E6F3FF",
            Self::Technology => "#E6FFE6",
            Self::Physical => "#F0F0F0",
            Self::Motivation => "#FFE6F0",
            Self::Implementation => "#F5E6FF",
        }
    }

    /// Looks up a layer by its three letter code.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|layer| layer.code() == code)
    }

    /// The element types that belong to this layer.
    pub fn element_types(self) -> impl Iterator<Item = &'static ElementType> {
        ELEMENT_TYPES.iter().filter(move |t| t.layer == self)
    }

    /// Whether `type_code` names an element type of this layer.
    #[must_use]
    pub fn permits_type_code(self, type_code: &str) -> bool {
        self.element_types().any(|t| t.code == type_code)
    }

    /// Title-cased name, used in diagram section headings.
    #[must_use]
    pub fn title(self) -> String {
        let name = self.name();
        let mut chars = name.chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_ascii_uppercase().to_string() + chars.as_str()
        })
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string is not one of the seven layer names.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown layer '{0}'")]
pub struct UnknownLayer(pub String);

impl FromStr for Layer {
    type Err = UnknownLayer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|layer| layer.name() == s)
            .ok_or_else(|| UnknownLayer(s.to_string()))
    }
}

/// Node shape used when drawing an element type in Mermaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `id["name"]`
    Rect,
    /// `id("name")`
    Rounded,
    /// `id(["name"])`
    Stadium,
    /// `id[("name")]`
    Cylinder,
    /// `id(("name"))`
    Circle,
    /// `id{{"name"}}`
    Hexagon,
    /// `id[/"name"/]`
    Trapezoid,
    /// `id[["name"]]`
    Subroutine,
}

/// A row of the element type table.
#[derive(Debug, PartialEq, Eq)]
pub struct ElementType {
    /// The type name as written in front matter, e.g. `application-component`.
    pub name: &'static str,
    /// The layer this type belongs to.
    pub layer: Layer,
    /// The code used in canonical IDs, e.g. `comp`.
    pub code: &'static str,
    /// The `xsi:type` used in the Model Exchange format.
    pub exchange_name: &'static str,
    /// Shape used by the Mermaid exporter.
    pub shape: Shape,
}

impl ElementType {
    /// Looks up an element type by its front-matter name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<&'static Self> {
        ELEMENT_TYPES.iter().find(|t| t.name == name)
    }
}

macro_rules! element_types {
    ($($name:literal, $layer:ident, $code:literal, $exchange:literal, $shape:ident;)*) => {
        /// Every ArchiMate element type known to the toolchain.
        pub static ELEMENT_TYPES: &[ElementType] = &[
            $(ElementType {
                name: $name,
                layer: Layer::$layer,
                code: $code,
                exchange_name: $exchange,
                shape: Shape::$shape,
            },)*
        ];
    };
}

element_types! {
    "resource", Strategy, "rsrc", "Resource", Hexagon;
    "capability", Strategy, "capa", "Capability", Hexagon;
    "value-stream", Strategy, "vstr", "ValueStream", Hexagon;
    "course-of-action", Strategy, "cact", "CourseOfAction", Hexagon;

    "business-actor", Business, "actr", "BusinessActor", Rounded;
    "business-role", Business, "role", "BusinessRole", Rounded;
    "business-collaboration", Business, "colab", "BusinessCollaboration", Rounded;
    "business-interface", Business, "intf", "BusinessInterface", Rounded;
    "business-process", Business, "proc", "BusinessProcess", Rounded;
    "business-function", Business, "func", "BusinessFunction", Rounded;
    "business-interaction", Business, "intr", "BusinessInteraction", Rounded;
    "business-event", Business, "evnt", "BusinessEvent", Rounded;
    "business-service", Business, "srvc", "BusinessService", Rounded;
    "business-object", Business, "objt", "BusinessObject", Cylinder;
    "contract", Business, "cntr", "Contract", Rect;
    "representation", Business, "repr", "Representation", Rect;
    "product", Business, "prod", "Product", Rounded;

    "application-component", Application, "comp", "ApplicationComponent", Rect;
    "application-collaboration", Application, "colab", "ApplicationCollaboration", Rect;
    "application-interface", Application, "intf", "ApplicationInterface", Rect;
    "application-function", Application, "func", "ApplicationFunction", Rect;
    "application-interaction", Application, "intr", "ApplicationInteraction", Rect;
    "application-process", Application, "proc", "ApplicationProcess", Rect;
    "application-event", Application, "evnt", "ApplicationEvent", Rect;
    "application-service", Application, "srvc", "ApplicationService", Rect;
    "data-object", Application, "data", "DataObject", Cylinder;

    "node", Technology, "node", "Node", Stadium;
    "device", Technology, "devc", "Device", Stadium;
    "system-software", Technology, "sysw", "SystemSoftware", Stadium;
    "technology-collaboration", Technology, "colab", "TechnologyCollaboration", Stadium;
    "technology-interface", Technology, "intf", "TechnologyInterface", Stadium;
    "path", Technology, "path", "Path", Stadium;
    "communication-network", Technology, "netw", "CommunicationNetwork", Stadium;
    "technology-function", Technology, "func", "TechnologyFunction", Stadium;
    "technology-process", Technology, "proc", "TechnologyProcess", Stadium;
    "technology-interaction", Technology, "intr", "TechnologyInteraction", Stadium;
    "technology-event", Technology, "evnt", "TechnologyEvent", Stadium;
    "technology-service", Technology, "srvc", "TechnologyService", Stadium;
    "artifact", Technology, "artf", "Artifact", Rect;

    "equipment", Physical, "equi", "Equipment", Trapezoid;
    "facility", Physical, "faci", "Facility", Trapezoid;
    "distribution-network", Physical, "dist", "DistributionNetwork", Trapezoid;
    "material", Physical, "matr", "Material", Cylinder;

    "stakeholder", Motivation, "stkh", "Stakeholder", Circle;
    "driver", Motivation, "drvr", "Driver", Rounded;
    "assessment", Motivation, "asmt", "Assessment", Rounded;
    "goal", Motivation, "goal", "Goal", Rounded;
    "outcome", Motivation, "outc", "Outcome", Rounded;
    "principle", Motivation, "prin", "Principle", Rounded;
    "requirement", Motivation, "reqt", "Requirement", Rounded;
    "constraint", Motivation, "cnst", "Constraint", Rounded;
    "meaning", Motivation, "mean", "Meaning", Rounded;
    "value", Motivation, "valu", "Value", Rounded;

    "work-package", Implementation, "work", "WorkPackage", Subroutine;
    "deliverable", Implementation, "delv", "Deliverable", Subroutine;
    "implementation-event", Implementation, "evnt", "ImplementationEvent", Subroutine;
    "plateau", Implementation, "plat", "Plateau", Subroutine;
    "gap", Implementation, "gaps", "Gap", Subroutine;
}

/// The relationship vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelationshipType {
    /// Whole-part, the part cannot exist alone.
    Composition,
    /// Whole-part, the part may be shared.
    Aggregation,
    /// Allocation of responsibility or behaviour.
    Assignment,
    /// An element realises a more abstract one.
    Realization,
    /// An element provides its functionality to another.
    Serving,
    /// Behaviour reads or writes a passive element.
    Access,
    /// An element affects a motivation element.
    Influence,
    /// Unspecified relationship.
    Association,
    /// Temporal or causal ordering of behaviour.
    Triggering,
    /// Transfer from one behaviour to another.
    Flow,
    /// An element is a kind of another.
    Specialization,
    /// Connector joining relationships of the same type.
    Junction,
}

impl RelationshipType {
    /// The whole vocabulary in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Composition,
        Self::Aggregation,
        Self::Assignment,
        Self::Realization,
        Self::Serving,
        Self::Access,
        Self::Influence,
        Self::Association,
        Self::Triggering,
        Self::Flow,
        Self::Specialization,
        Self::Junction,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Composition => "composition",
            Self::Aggregation => "aggregation",
            Self::Assignment => "assignment",
            Self::Realization => "realization",
            Self::Serving => "serving",
            Self::Access => "access",
            Self::Influence => "influence",
            Self::Association => "association",
            Self::Triggering => "triggering",
            Self::Flow => "flow",
            Self::Specialization => "specialization",
            Self::Junction => "junction",
        }
    }

    /// The `xsi:type` used in the Model Exchange format.
    ///
    /// Junctions are not relationships in the exchange schema and are
    /// exported as associations.
    #[must_use]
    pub const fn exchange_name(self) -> &'static str {
        match self {
            Self::Composition => "Composition",
            Self::Aggregation => "Aggregation",
            Self::Assignment => "Assignment",
            Self::Realization => "Realization",
            Self::Serving => "Serving",
            Self::Access => "Access",
            Self::Influence => "Influence",
            Self::Association | Self::Junction => "Association",
            Self::Triggering => "Triggering",
            Self::Flow => "Flow",
            Self::Specialization => "Specialization",
        }
    }

    /// Mermaid edge syntax.
    #[must_use]
    pub const fn mermaid_arrow(self) -> &'static str {
        match self {
            Self::Assignment | Self::Influence => "-.->",
            Self::Realization => "==>",
            Self::Association => "---",
            _ => "-->",
        }
    }

    /// Mermaid `linkStyle` declaration.
    #[must_use]
    pub const fn mermaid_style(self) -> &'static str {
        match self {
            Self::Composition => "stroke:#333,stroke-width:2.5px",
            Self::Assignment => "stroke:#333,stroke-dasharray:4 4",
            Self::Realization => "stroke:#333,stroke-width:2px,stroke-dasharray:6 4",
            Self::Influence => "stroke:#666,stroke-dasharray:2 2",
            Self::Association => "stroke:#999,stroke-dasharray:5 5",
            _ => "stroke:#333,stroke-width:2px",
        }
    }

    /// PlantUML edge syntax.
    #[must_use]
    pub const fn plantuml_arrow(self) -> &'static str {
        match self {
            Self::Composition => "*--",
            Self::Aggregation => "o--",
            Self::Assignment => "..",
            Self::Realization => "..|>",
            Self::Access | Self::Flow => "-->",
            Self::Influence => "..>",
            Self::Triggering => "->",
            Self::Specialization => "--|>",
            Self::Serving | Self::Association | Self::Junction => "--",
        }
    }

    /// Normalises a declared relationship type.
    ///
    /// Matching is case-insensitive and accepts the aliases found in older
    /// element files (`realizationOf`, `influences`, `supports`).
    #[must_use]
    pub fn normalize(declared: &str) -> Option<Self> {
        let lowered = declared.trim().to_ascii_lowercase();
        let canonical = match lowered.as_str() {
            "realizationof" | "realizes" => "realization",
            "influences" => "influence",
            "supports" | "serves" => "serving",
            "triggers" => "triggering",
            other => other,
        };
        Self::ALL.into_iter().find(|t| t.name() == canonical)
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn layer_codes_round_trip() {
        for layer in Layer::ALL {
            assert_eq!(Layer::from_code(layer.code()), Some(layer));
            assert_eq!(layer.name().parse::<Layer>(), Ok(layer));
        }
    }

    #[test]
    fn unknown_layer_name_is_rejected() {
        assert_eq!(
            "other".parse::<Layer>(),
            Err(UnknownLayer("other".to_string()))
        );
    }

    #[test]
    fn every_type_code_fits_the_id_grammar() {
        for element_type in ELEMENT_TYPES {
            let len = element_type.code.len();
            assert!((4..=5).contains(&len), "{}", element_type.code);
            assert!(element_type.code.chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn type_codes_are_unique_within_a_layer() {
        for layer in Layer::ALL {
            let mut codes: Vec<_> = layer.element_types().map(|t| t.code).collect();
            let total = codes.len();
            codes.sort_unstable();
            codes.dedup();
            assert_eq!(codes.len(), total, "duplicate code in {layer}");
        }
    }

    #[test]
    fn shared_codes_are_layer_scoped() {
        assert!(Layer::Business.permits_type_code("colab"));
        assert!(Layer::Technology.permits_type_code("colab"));
        assert!(!Layer::Strategy.permits_type_code("colab"));
        assert!(!Layer::Application.permits_type_code("node"));
    }

    #[test_case("realizationOf", RelationshipType::Realization)]
    #[test_case("influences", RelationshipType::Influence)]
    #[test_case("supports", RelationshipType::Serving)]
    #[test_case("Serving", RelationshipType::Serving)]
    #[test_case("  FLOW ", RelationshipType::Flow)]
    #[test_case("junction", RelationshipType::Junction)]
    fn relationship_aliases_normalize(declared: &str, expected: RelationshipType) {
        assert_eq!(RelationshipType::normalize(declared), Some(expected));
    }

    #[test]
    fn unknown_relationship_type_does_not_normalize() {
        assert_eq!(RelationshipType::normalize("depends-on"), None);
    }

    #[test]
    fn layer_title() {
        assert_eq!(Layer::Application.title(), "Application");
    }
}
