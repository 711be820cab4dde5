use std::{fmt, ops::Deref, str::FromStr, sync::LazyLock};

use non_empty_string::NonEmptyString;
use regex::Regex;

use crate::domain::archimate::{ElementType, Layer};

/// `layer-type-###-slug`
static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z]{3})-([a-z]{4,5})-(\d{3})-([a-z0-9-]+)$").expect("valid regex")
});

/// `layer-type-slug-###`
static LEGACY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z]{3})-([a-z]{4,5})-([a-z0-9-]+)-(\d{3})$").expect("valid regex")
});

/// Looser form used only to recover a sequence number, e.g. `app-component-007-x`.
static PARTIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{3}-[a-z]{4,}-(\d{3})-").expect("valid regex"));

/// Highest sequence number that fits the three digit field.
pub const MAX_SEQUENCE: u16 = 999;

/// Maximum number of hyphen separated words in a derived slug.
const SLUG_MAX_WORDS: usize = 4;

/// Maximum length of a derived slug.
const SLUG_MAX_LEN: usize = 40;

/// A validated descriptive fragment of an ID.
///
/// Lowercase ASCII letters, digits and single hyphens; never starts or ends
/// with a hyphen.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slug(NonEmptyString);

impl Slug {
    /// Creates a new `Slug`.
    ///
    /// # Errors
    ///
    /// Returns the first defect found in the string.
    pub fn new(s: String) -> Result<Self, SlugDefect> {
        check_slug(&s)?;
        let inner = NonEmptyString::new(s).map_err(|_| SlugDefect::Empty)?;
        Ok(Self(inner))
    }

    /// Derives a slug from a human-readable element name.
    ///
    /// The name is lowercased, stripped to alphanumerics and hyphens, runs of
    /// whitespace and hyphens collapse to one hyphen, and the result is capped
    /// at four words and forty characters.
    ///
    /// # Errors
    ///
    /// Returns [`SlugDefect::Empty`] if nothing usable is left of the name.
    pub fn from_name(name: &str) -> Result<Self, SlugDefect> {
        let lowered = name.to_lowercase();
        let words: Vec<String> = lowered
            .split(|c: char| c.is_whitespace() || c == '-')
            .map(|word| {
                word.chars()
                    .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                    .collect::<String>()
            })
            .filter(|word| !word.is_empty())
            .take(SLUG_MAX_WORDS)
            .collect();

        let mut slug = words.join("-");
        if slug.len() > SLUG_MAX_LEN {
            slug.truncate(SLUG_MAX_LEN);
            let trimmed_len = slug.trim_end_matches('-').len();
            slug.truncate(trimmed_len);
        }

        Self::new(slug)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Slug {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn check_slug(s: &str) -> Result<(), SlugDefect> {
    if s.is_empty() {
        return Err(SlugDefect::Empty);
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(SlugDefect::InvalidCharacters);
    }
    if s.starts_with('-') || s.ends_with('-') {
        return Err(SlugDefect::EdgeHyphen);
    }
    if s.contains("--") {
        return Err(SlugDefect::DoubledHyphen);
    }
    Ok(())
}

/// Why a slug is malformed.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum SlugDefect {
    /// Nothing left after normalisation.
    #[error("Descriptive name is empty")]
    Empty,
    /// Something other than `[a-z0-9-]`.
    #[error("Descriptive name contains invalid characters")]
    InvalidCharacters,
    /// Leading or trailing hyphen.
    #[error("Descriptive name cannot start or end with hyphen")]
    EdgeHyphen,
    /// Two hyphens in a row.
    #[error("Descriptive name cannot contain consecutive hyphens")]
    DoubledHyphen,
}

/// The four components of a canonical element ID.
///
/// Format: `{layer_code}-{type_code}-{sequence:03}-{slug}`, for example
/// `app-comp-001-customer-portal`.
///
/// Parsing only checks the grammar. Whether the codes are known, and agree
/// with the element's declared layer, is the job of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalId {
    layer_code: String,
    type_code: String,
    sequence: u16,
    slug: String,
}

impl CanonicalId {
    /// Assembles an ID from validated parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence number needs more than three digits.
    pub fn new(layer: Layer, element_type: &ElementType, sequence: u16, slug: &Slug) -> Result<Self, DeriveError> {
        if sequence > MAX_SEQUENCE {
            return Err(DeriveError::SequenceOverflow(u32::from(sequence)));
        }
        Ok(Self {
            layer_code: layer.code().to_string(),
            type_code: element_type.code.to_string(),
            sequence,
            slug: slug.to_string(),
        })
    }

    /// Parses the canonical grammar, returning `None` if it does not match.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        let captures = CANONICAL.captures(id)?;
        Some(Self {
            layer_code: captures[1].to_string(),
            type_code: captures[2].to_string(),
            sequence: captures[3].parse().ok()?,
            slug: captures[4].to_string(),
        })
    }

    /// The three letter layer code.
    #[must_use]
    pub fn layer_code(&self) -> &str {
        &self.layer_code
    }

    /// The four or five letter type code.
    #[must_use]
    pub fn type_code(&self) -> &str {
        &self.type_code
    }

    /// The sequence number within the `(layer_code, type_code)` group.
    #[must_use]
    pub const fn sequence(&self) -> u16 {
        self.sequence
    }

    /// The descriptive fragment.
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// The `(layer_code, type_code)` pair that scopes sequence numbers.
    #[must_use]
    pub fn group(&self) -> (&str, &str) {
        (&self.layer_code, &self.type_code)
    }

    /// Returns a copy with a different sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence number needs more than three digits.
    pub fn with_sequence(&self, sequence: u16) -> Result<Self, DeriveError> {
        if sequence > MAX_SEQUENCE {
            return Err(DeriveError::SequenceOverflow(u32::from(sequence)));
        }
        Ok(Self {
            sequence,
            ..self.clone()
        })
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:03}-{}",
            self.layer_code, self.type_code, self.sequence, self.slug
        )
    }
}

impl FromStr for CanonicalId {
    type Err = IdViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(IdViolation::Pattern)
    }
}

/// An ID in the superseded `layer-type-slug-###` format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyId {
    layer_code: String,
    type_code: String,
    slug: String,
    sequence: u16,
}

impl LegacyId {
    /// Parses the legacy grammar.
    ///
    /// IDs that also satisfy the canonical grammar (for example
    /// `app-comp-001-top-100`) are not treated as legacy.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        if CANONICAL.is_match(id) {
            return None;
        }
        let captures = LEGACY.captures(id)?;
        Some(Self {
            layer_code: captures[1].to_string(),
            type_code: captures[2].to_string(),
            slug: captures[3].to_string(),
            sequence: captures[4].parse().ok()?,
        })
    }

    /// The sequence number.
    #[must_use]
    pub const fn sequence(&self) -> u16 {
        self.sequence
    }

    /// The descriptive fragment.
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Moves the sequence number into third position, keeping every
    /// component unchanged.
    #[must_use]
    pub fn to_canonical(&self) -> CanonicalId {
        CanonicalId {
            layer_code: self.layer_code.clone(),
            type_code: self.type_code.clone(),
            sequence: self.sequence,
            slug: self.slug.clone(),
        }
    }
}

impl fmt::Display for LegacyId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{:03}",
            self.layer_code, self.type_code, self.slug, self.sequence
        )
    }
}

/// The reasons an ID can fail validation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum IdViolation {
    /// No `id` field, or an empty one.
    #[error("Missing ID")]
    Missing,
    /// Not of the form `layer-type-###-name`.
    #[error("Does not match format [layer]-[type]-[###]-[name]")]
    Pattern,
    /// The first component is not a known layer code.
    #[error("Invalid layer code '{0}'")]
    UnknownLayerCode(String),
    /// The layer code disagrees with the element's declared layer.
    #[error("Layer code '{code}' doesn't match layer '{layer}'")]
    LayerMismatch {
        /// The code found in the ID.
        code: String,
        /// The layer declared by the element.
        layer: String,
    },
    /// The type code is not one of the layer's codes.
    #[error("Invalid type code '{code}' for layer '{layer}'")]
    InvalidTypeCode {
        /// The code found in the ID.
        code: String,
        /// The layer implied by the layer code.
        layer: Layer,
    },
    /// The descriptive fragment is malformed.
    #[error(transparent)]
    Slug(#[from] SlugDefect),
}

/// Validates an ID against the canonical format.
///
/// `expected_layer` is the layer declared by the element, if any; when given,
/// the layer code must map to it.
///
/// # Errors
///
/// Returns the first violation found, checking in order: presence, grammar,
/// layer code, layer agreement, type code, slug.
pub fn validate(id: Option<&str>, expected_layer: Option<&str>) -> Result<CanonicalId, IdViolation> {
    let id = id.filter(|id| !id.is_empty()).ok_or(IdViolation::Missing)?;
    let parsed = CanonicalId::parse(id).ok_or(IdViolation::Pattern)?;

    let layer = Layer::from_code(parsed.layer_code())
        .ok_or_else(|| IdViolation::UnknownLayerCode(parsed.layer_code().to_string()))?;

    if let Some(expected) = expected_layer.filter(|l| !l.is_empty() && *l != layer.name()) {
        return Err(IdViolation::LayerMismatch {
            code: parsed.layer_code().to_string(),
            layer: expected.to_string(),
        });
    }

    if !layer.permits_type_code(parsed.type_code()) {
        return Err(IdViolation::InvalidTypeCode {
            code: parsed.type_code().to_string(),
            layer,
        });
    }

    check_slug(parsed.slug())?;

    Ok(parsed)
}

/// Why a canonical ID could not be derived for an element.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DeriveError {
    /// The declared layer is not one of the seven layers.
    #[error("unknown layer '{0}'")]
    UnknownLayer(String),
    /// The declared type has no type code.
    #[error("unknown element type '{0}'")]
    UnknownType(String),
    /// The element name yields no usable slug.
    #[error("cannot derive a descriptive name from '{name}': {defect}")]
    Slug {
        /// The element name.
        name: String,
        /// What went wrong.
        defect: SlugDefect,
    },
    /// The sequence number needs more than three digits.
    #[error("sequence number {0} does not fit in three digits")]
    SequenceOverflow(u32),
}

/// Recovers the sequence number of an existing ID in any recognised form.
#[must_use]
pub fn existing_sequence(id: &str) -> Option<u16> {
    CanonicalId::parse(id)
        .map(|c| c.sequence())
        .or_else(|| LegacyId::parse(id).map(|l| l.sequence()))
        .or_else(|| {
            PARTIAL
                .captures(id)
                .and_then(|captures| captures[1].parse().ok())
        })
}

/// Derives the canonical ID for an element.
///
/// The slug comes from `name`, the codes from the fixed tables. When
/// `preserve_sequence` is set and `existing_id` carries a sequence number in
/// canonical or legacy form, that number is reused; otherwise the sequence
/// is `001`.
///
/// The layer code is taken from `layer`, not from the type, so a type
/// declared under the wrong layer yields an ID that [`validate`] rejects.
///
/// # Errors
///
/// Returns an error if the layer or type is unknown, or the name has no
/// usable characters.
pub fn derive(
    name: &str,
    layer: &str,
    element_type: &str,
    existing_id: Option<&str>,
    preserve_sequence: bool,
) -> Result<CanonicalId, DeriveError> {
    let layer = Layer::from_str(layer).map_err(|e| DeriveError::UnknownLayer(e.0))?;
    let element_type = ElementType::by_name(element_type)
        .ok_or_else(|| DeriveError::UnknownType(element_type.to_string()))?;
    let slug = Slug::from_name(name).map_err(|defect| DeriveError::Slug {
        name: name.to_string(),
        defect,
    })?;

    let sequence = existing_id
        .filter(|_| preserve_sequence)
        .and_then(existing_sequence)
        .unwrap_or(1);

    CanonicalId::new(layer, element_type, sequence, &slug)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn parse_canonical_components() {
        let id = CanonicalId::parse("app-comp-001-customer-portal").unwrap();
        assert_eq!(id.layer_code(), "app");
        assert_eq!(id.type_code(), "comp");
        assert_eq!(id.sequence(), 1);
        assert_eq!(id.slug(), "customer-portal");
        assert_eq!(id.group(), ("app", "comp"));
    }

    #[test_case("app-comp-001-customer-portal")]
    #[test_case("bus-colab-042-sales-team")]
    #[test_case("mot-goal-999-x")]
    #[test_case("tec-node-010-db-2")]
    fn canonical_display_round_trip(id: &str) {
        assert_eq!(CanonicalId::parse(id).unwrap().to_string(), id);
    }

    #[test_case("app-comp-customer-portal-001"; "legacy order")]
    #[test_case("app-comp-01-portal"; "two digit sequence")]
    #[test_case("App-comp-001-portal"; "uppercase")]
    #[test_case("ap-comp-001-portal"; "short layer code")]
    #[test_case("app-component-001-portal"; "long type code")]
    #[test_case("app-comp-001-"; "empty slug")]
    #[test_case(""; "empty")]
    fn non_canonical_ids_do_not_parse(id: &str) {
        assert!(CanonicalId::parse(id).is_none());
    }

    #[test]
    fn parse_legacy_components() {
        let id = LegacyId::parse("app-comp-customer-portal-001").unwrap();
        assert_eq!(id.sequence(), 1);
        assert_eq!(id.slug(), "customer-portal");
        assert_eq!(id.to_string(), "app-comp-customer-portal-001");
    }

    #[test]
    fn legacy_conversion_keeps_slug_and_sequence() {
        let legacy = LegacyId::parse("tec-sysw-postgres-cluster-017").unwrap();
        let canonical = legacy.to_canonical();
        assert_eq!(canonical.to_string(), "tec-sysw-017-postgres-cluster");
        assert_eq!(canonical.slug(), legacy.slug());
        assert_eq!(canonical.sequence(), legacy.sequence());
    }

    #[test]
    fn canonical_ids_ending_in_digits_are_not_legacy() {
        assert!(LegacyId::parse("app-comp-001-top-100").is_none());
    }

    #[test]
    fn missing_id() {
        assert_eq!(validate(None, Some("application")), Err(IdViolation::Missing));
        assert_eq!(validate(Some(""), None), Err(IdViolation::Missing));
        assert_eq!(IdViolation::Missing.to_string(), "Missing ID");
    }

    #[test]
    fn valid_id_passes() {
        let id = validate(Some("app-comp-001-customer-portal"), Some("application")).unwrap();
        assert_eq!(id.sequence(), 1);
    }

    #[test]
    fn validation_without_declared_layer_skips_layer_check() {
        assert!(validate(Some("app-comp-001-customer-portal"), None).is_ok());
    }

    #[test]
    fn wrong_pattern() {
        assert_eq!(
            validate(Some("app-comp-customer-portal-001"), None),
            Err(IdViolation::Pattern)
        );
    }

    #[test]
    fn unknown_layer_code() {
        assert_eq!(
            validate(Some("xyz-comp-001-portal"), None),
            Err(IdViolation::UnknownLayerCode("xyz".to_string()))
        );
    }

    #[test]
    fn layer_mismatch() {
        let err = validate(Some("app-comp-001-portal"), Some("business")).unwrap_err();
        assert_eq!(
            err,
            IdViolation::LayerMismatch {
                code: "app".to_string(),
                layer: "business".to_string()
            }
        );
        assert_eq!(
            err.to_string(),
            "Layer code 'app' doesn't match layer 'business'"
        );
    }

    #[test]
    fn type_code_not_in_layer() {
        let err = validate(Some("app-node-001-server"), None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid type code 'node' for layer 'application'");
    }

    #[test_case("app-comp-001--portal", SlugDefect::EdgeHyphen; "leading hyphen")]
    #[test_case("app-comp-001-portal-", SlugDefect::EdgeHyphen; "trailing hyphen")]
    #[test_case("app-comp-001-customer--portal", SlugDefect::DoubledHyphen; "doubled hyphen")]
    fn malformed_slug(id: &str, defect: SlugDefect) {
        assert_eq!(validate(Some(id), None), Err(IdViolation::Slug(defect)));
    }

    #[test_case("Customer Portal", "customer-portal")]
    #[test_case("  Order -- Management  ", "order-management")]
    #[test_case("CRM (Legacy) System v2", "crm-legacy-system-v2")]
    #[test_case("One Two Three Four Five", "one-two-three-four")]
    #[test_case("Über Straße", "ber-strae")]
    fn slug_from_name(name: &str, expected: &str) {
        assert_eq!(Slug::from_name(name).unwrap().as_str(), expected);
    }

    #[test]
    fn slug_is_capped_at_forty_characters() {
        let slug = Slug::from_name("internationalisation localisation-management orchestration").unwrap();
        assert!(slug.len() <= SLUG_MAX_LEN);
        assert!(!slug.ends_with('-'));
        assert_eq!(slug.as_str(), "internationalisation-localisation-manage");
    }

    #[test]
    fn slug_from_punctuation_is_empty() {
        assert_eq!(Slug::from_name("???"), Err(SlugDefect::Empty));
    }

    #[test]
    fn derive_from_legacy_preserves_sequence() {
        let id = derive(
            "Customer Portal",
            "application",
            "application-component",
            Some("app-comp-customer-portal-001"),
            true,
        )
        .unwrap();
        assert_eq!(id.to_string(), "app-comp-001-customer-portal");
    }

    #[test]
    fn derive_preserves_canonical_sequence() {
        let id = derive(
            "Billing Engine",
            "application",
            "application-component",
            Some("app-comp-017-billing"),
            true,
        )
        .unwrap();
        assert_eq!(id.to_string(), "app-comp-017-billing-engine");
    }

    #[test]
    fn derive_recovers_sequence_from_loose_form() {
        let id = derive(
            "Billing",
            "application",
            "application-component",
            Some("app-component-023-billing"),
            true,
        )
        .unwrap();
        assert_eq!(id.sequence(), 23);
    }

    #[test]
    fn derive_without_preserving_defaults_to_one() {
        let id = derive(
            "Billing",
            "application",
            "application-component",
            Some("app-comp-017-billing"),
            false,
        )
        .unwrap();
        assert_eq!(id.to_string(), "app-comp-001-billing");
    }

    #[test]
    fn derive_reconstructs_a_canonical_id_from_its_components() {
        for original in ["app-comp-004-customer-portal", "mot-goal-120-reduce-churn", "imp-gaps-002-skills"] {
            let parsed = CanonicalId::parse(original).unwrap();
            let layer = Layer::from_code(parsed.layer_code()).unwrap();
            let element_type = layer
                .element_types()
                .find(|t| t.code == parsed.type_code())
                .unwrap();
            let derived = derive(parsed.slug(), layer.name(), element_type.name, Some(original), true).unwrap();
            assert_eq!(derived.to_string(), original);
        }
    }

    #[test]
    fn derive_rejects_unknown_layer_and_type() {
        assert_eq!(
            derive("x", "other", "node", None, true),
            Err(DeriveError::UnknownLayer("other".to_string()))
        );
        assert_eq!(
            derive("x", "technology", "server", None, true),
            Err(DeriveError::UnknownType("server".to_string()))
        );
    }

    #[test]
    fn sequence_overflow() {
        let id = CanonicalId::parse("app-comp-999-x").unwrap();
        assert!(id.with_sequence(999).is_ok());
        assert_eq!(id.with_sequence(1000), Err(DeriveError::SequenceOverflow(1000)));
    }

    #[test]
    fn sequence_is_zero_padded() {
        let id = CanonicalId::parse("app-comp-100-x").unwrap().with_sequence(7).unwrap();
        assert_eq!(id.to_string(), "app-comp-007-x");
    }
}
