//! Core data models for lexis.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::Error;

// =============================================================================
// ATTRIBUTE VALUES
// =============================================================================

/// A scalar value stored in an entity's free-form attribute map.
///
/// Serialized untagged: text, numbers and booleans as plain JSON scalars,
/// dates as `{"date": "YYYY-MM-DD"}` so that date intent survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Boolean(bool),
    Number(f64),
    Date { date: NaiveDate },
    Text(String),
}

impl AttributeValue {
    /// Create a text value.
    pub fn text(value: impl Into<String>) -> Self {
        AttributeValue::Text(value.into())
    }

    /// Create a date value.
    pub fn date(date: NaiveDate) -> Self {
        AttributeValue::Date { date }
    }

    /// Blank text is the only empty value; `false` and `0` are real answers.
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Borrow the value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value type this scalar carries.
    pub fn value_type(&self) -> ValueType {
        match self {
            AttributeValue::Boolean(_) => ValueType::Boolean,
            AttributeValue::Number(_) => ValueType::Number,
            AttributeValue::Date { .. } => ValueType::Date,
            AttributeValue::Text(_) => ValueType::Text,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Boolean(b) => write!(f, "{}", b),
            AttributeValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Date { date } => write!(f, "{}", date.format("%Y-%m-%d")),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

impl From<NaiveDate> for AttributeValue {
    fn from(date: NaiveDate) -> Self {
        AttributeValue::Date { date }
    }
}

// =============================================================================
// ATTRIBUTE MAP
// =============================================================================

/// Insertion-ordered association of attribute keys to values.
///
/// Keys are unique. Order carries no meaning for comparisons but is kept so
/// that "first key wins" rules and rendered output are stable. Lookups are
/// linear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: Vec<(String, AttributeValue)>,
}

impl AttributeMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Insert a value. An existing key is replaced in place and its previous
    /// value returned; a new key is appended.
    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) -> Option<AttributeValue> {
        let key = key.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Remove a key, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, AttributeValue)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (K, AttributeValue)>>(iter: I) -> Self {
        let mut map = AttributeMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for AttributeMap {
    type Item = (String, AttributeValue);
    type IntoIter = std::vec::IntoIter<(String, AttributeValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for AttributeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AttributeMapVisitor;

        impl<'de> Visitor<'de> for AttributeMapVisitor {
            type Value = AttributeMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of attribute names to scalar values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<AttributeMap, A::Error> {
                let mut map = AttributeMap::new();
                while let Some((key, value)) = access.next_entry::<String, AttributeValue>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(AttributeMapVisitor)
    }
}

// =============================================================================
// VALUE TYPES
// =============================================================================

/// Declared type of a template field or suggested attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Text,
    Number,
    Date,
    Boolean,
    Email,
    Phone,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Text => "text",
            ValueType::Number => "number",
            ValueType::Date => "date",
            ValueType::Boolean => "boolean",
            ValueType::Email => "email",
            ValueType::Phone => "phone",
        };
        f.write_str(s)
    }
}

impl FromStr for ValueType {
    type Err = Error;

    /// Accepts the English names and the Spanish labels used by template authors.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "texto" | "string" => Ok(ValueType::Text),
            "number" | "numero" | "número" | "numeric" => Ok(ValueType::Number),
            "date" | "fecha" => Ok(ValueType::Date),
            "boolean" | "bool" | "booleano" => Ok(ValueType::Boolean),
            "email" | "correo" => Ok(ValueType::Email),
            "phone" | "telefono" | "teléfono" => Ok(ValueType::Phone),
            other => Err(Error::validation(format!("Unknown value type: {}", other))),
        }
    }
}

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// Fixed, strongly-typed attributes every third-party record may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardAttribute {
    LegalName,
    IdentificationNumber,
    IdentificationType,
    Email,
    Phone,
    Address,
    City,
    Country,
    LegalRepresentative,
}

impl StandardAttribute {
    /// Every standard attribute, in extraction order.
    pub const ALL: [StandardAttribute; 9] = [
        StandardAttribute::LegalName,
        StandardAttribute::IdentificationNumber,
        StandardAttribute::IdentificationType,
        StandardAttribute::Email,
        StandardAttribute::Phone,
        StandardAttribute::Address,
        StandardAttribute::City,
        StandardAttribute::Country,
        StandardAttribute::LegalRepresentative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StandardAttribute::LegalName => "legal_name",
            StandardAttribute::IdentificationNumber => "identification_number",
            StandardAttribute::IdentificationType => "identification_type",
            StandardAttribute::Email => "email",
            StandardAttribute::Phone => "phone",
            StandardAttribute::Address => "address",
            StandardAttribute::City => "city",
            StandardAttribute::Country => "country",
            StandardAttribute::LegalRepresentative => "legal_representative",
        }
    }
}

impl fmt::Display for StandardAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StandardAttribute {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StandardAttribute::ALL
            .iter()
            .find(|a| a.as_str() == s)
            .copied()
            .ok_or_else(|| Error::validation(format!("Unknown standard attribute: {}", s)))
    }
}

/// Values of the fixed attributes of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identification_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identification_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_representative: Option<String>,
}

impl StandardAttributes {
    /// Read one fixed attribute.
    pub fn get(&self, attribute: StandardAttribute) -> Option<&str> {
        let value = match attribute {
            StandardAttribute::LegalName => &self.legal_name,
            StandardAttribute::IdentificationNumber => &self.identification_number,
            StandardAttribute::IdentificationType => &self.identification_type,
            StandardAttribute::Email => &self.email,
            StandardAttribute::Phone => &self.phone,
            StandardAttribute::Address => &self.address,
            StandardAttribute::City => &self.city,
            StandardAttribute::Country => &self.country,
            StandardAttribute::LegalRepresentative => &self.legal_representative,
        };
        value.as_deref()
    }

    /// Write one fixed attribute.
    pub fn set(&mut self, attribute: StandardAttribute, value: Option<String>) {
        let slot = match attribute {
            StandardAttribute::LegalName => &mut self.legal_name,
            StandardAttribute::IdentificationNumber => &mut self.identification_number,
            StandardAttribute::IdentificationType => &mut self.identification_type,
            StandardAttribute::Email => &mut self.email,
            StandardAttribute::Phone => &mut self.phone,
            StandardAttribute::Address => &mut self.address,
            StandardAttribute::City => &mut self.city,
            StandardAttribute::Country => &mut self.country,
            StandardAttribute::LegalRepresentative => &mut self.legal_representative,
        };
        *slot = value;
    }
}

/// A third-party record (supplier, client, employee, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub company_id: Uuid,
    pub third_party_type: String,
    #[serde(flatten)]
    pub standard: StandardAttributes,
    /// Free-form attributes with no schema.
    #[serde(default)]
    pub attributes: AttributeMap,
    /// Optimistic-lock version, bumped by every successful save.
    #[serde(default)]
    pub version: i64,
    #[serde(default = "Utc::now")]
    pub created_at_utc: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at_utc: DateTime<Utc>,
}

impl Entity {
    /// Create a new, unsaved entity.
    pub fn new(company_id: Uuid, third_party_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            company_id,
            third_party_type: third_party_type.into(),
            standard: StandardAttributes::default(),
            attributes: AttributeMap::new(),
            version: 0,
            created_at_utc: now,
            updated_at_utc: now,
        }
    }

    /// Builder helper: set a fixed attribute.
    pub fn with_standard(mut self, attribute: StandardAttribute, value: impl Into<String>) -> Self {
        self.standard.set(attribute, Some(value.into()));
        self
    }

    /// Builder helper: add a free-form attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key, value.into());
        self
    }
}

// =============================================================================
// TEMPLATE TYPES
// =============================================================================

/// A field a document template expects an entity to supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateField {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub mandatory: bool,
}

impl TemplateField {
    pub fn new(name: impl Into<String>, value_type: ValueType, mandatory: bool) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            value_type,
            mandatory,
        }
    }

    /// Display label, falling back to the raw name.
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// A contract template declaring fields for one third-party type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub third_party_type: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub fields: Vec<TemplateField>,
}

fn default_true() -> bool {
    true
}

impl Template {
    pub fn new(company_id: Uuid, name: impl Into<String>, third_party_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            company_id,
            name: name.into(),
            third_party_type: third_party_type.into(),
            active: true,
            fields: Vec::new(),
        }
    }

    /// Builder helper: declare a field.
    pub fn with_field(mut self, field: TemplateField) -> Self {
        self.fields.push(field);
        self
    }
}

// =============================================================================
// RECONCILIATION TYPES
// =============================================================================

/// A field requirement aggregated across all templates of a third-party type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub canonical_name: String,
    pub label: String,
    pub value_type: ValueType,
    /// True if any contributing template marks the field required.
    pub mandatory: bool,
    /// Templates that declare this field, sorted by id.
    pub source_templates: Vec<Uuid>,
}

/// Where an extracted field came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Standard,
    Custom,
}

/// One entry of an entity's uniform `canonical name → value` view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: AttributeValue,
    pub source: FieldSource,
    /// Raw key (custom) or attribute name (standard) the value was read from.
    pub original_key: String,
}

/// Which matching tier paired a requirement with an entity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Compact,
    Synonym,
    Fuzzy,
}

/// A requirement paired with the entity attribute judged equivalent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub requirement: Requirement,
    pub matched_key: String,
    pub value: AttributeValue,
    pub match_kind: MatchKind,
}

/// Completion analysis of one entity against a requirement set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub matched: Vec<MatchResult>,
    pub missing: Vec<Requirement>,
    pub completion_percentage: u8,
    /// Missing requirements flagged mandatory.
    pub mandatory_missing: usize,
    /// Custom attributes hidden from the analysis by a same-named key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collisions: Vec<CollisionWarning>,
}

impl ReconciliationReport {
    pub fn new(matched: Vec<MatchResult>, missing: Vec<Requirement>) -> Self {
        let completion_percentage = completion_percentage(matched.len(), missing.len());
        let mandatory_missing = missing.iter().filter(|r| r.mandatory).count();
        Self {
            matched,
            missing,
            completion_percentage,
            mandatory_missing,
            collisions: Vec::new(),
        }
    }

    /// Number of requirements analysed.
    pub fn total(&self) -> usize {
        self.matched.len() + self.missing.len()
    }
}

/// `round(100 * matched / (matched + missing))`, 100 when there is nothing to satisfy.
pub fn completion_percentage(matched: usize, missing: usize) -> u8 {
    let total = matched + missing;
    if total == 0 {
        return 100;
    }
    (100.0 * matched as f64 / total as f64).round() as u8
}

// =============================================================================
// MIGRATION TYPES
// =============================================================================

/// One key rename staged by a migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenamedKey {
    pub old_key: String,
    pub new_key: String,
    pub value: AttributeValue,
}

/// An attribute dropped because another key claimed the same canonical name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedAttribute {
    pub key: String,
    pub value: AttributeValue,
}

/// Non-fatal report of distinct keys normalizing to one canonical key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionWarning {
    pub canonical_key: String,
    pub kept_key: String,
    pub kept_value: AttributeValue,
    pub dropped: Vec<DroppedAttribute>,
}

/// Result of migrating one attribute map to canonical keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationOutcome {
    pub attributes: AttributeMap,
    pub diff: Vec<RenamedKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collisions: Vec<CollisionWarning>,
    /// Keys left untouched because they have no canonical form.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl MigrationOutcome {
    /// True when the input was already canonical.
    pub fn is_noop(&self) -> bool {
        self.diff.is_empty() && self.collisions.is_empty()
    }
}

/// Aggregate result of migrating every entity of a cohort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub total: usize,
    pub processed: usize,
    pub migrated: usize,
    pub unchanged: usize,
    pub renamed_keys: usize,
    pub collisions: usize,
    /// Entities left unmigrated because the collision policy rejected them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<Uuid>,
    pub dry_run: bool,
    pub cancelled: bool,
}

// =============================================================================
// SUGGESTION TYPES
// =============================================================================

/// A field the cohort commonly carries and the entity lacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub canonical_name: String,
    pub frequency: usize,
    pub cohort_size: usize,
    pub percentage: u8,
    pub sample_values: Vec<AttributeValue>,
    pub recommended: bool,
    pub value_type: ValueType,
}

// =============================================================================
// MERGE TYPES
// =============================================================================

fn default_remove_originals() -> bool {
    true
}

/// Consolidate several keys of one entity into a single canonical key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub keys: Vec<String>,
    pub target_name: String,
    /// Explicit value for the merged field; otherwise the first non-empty source value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<AttributeValue>,
    #[serde(default = "default_remove_originals")]
    pub remove_originals: bool,
}

/// Consolidate keys across every entity of a cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkMergeRequest {
    pub company_id: Uuid,
    pub third_party_type: String,
    /// Raw names; each member's keys are compared after normalization.
    pub raw_names: Vec<String>,
    pub target_name: String,
    #[serde(default = "default_remove_originals")]
    pub remove_originals: bool,
}

/// Aggregate result of a cohort-wide merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkMergeSummary {
    pub total: usize,
    pub processed: usize,
    pub merged: usize,
    /// Members with fewer than two matching keys.
    pub skipped: usize,
    pub merged_entities: Vec<Uuid>,
    pub cancelled: bool,
}

// =============================================================================
// COHORT COMPLETION TYPES
// =============================================================================

/// Completion of one entity within a cohort overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCompletion {
    pub entity_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    pub completion_percentage: u8,
    pub missing_count: usize,
    pub mandatory_missing: usize,
}

/// Completion overview of every entity of a third-party type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortCompletion {
    pub third_party_type: String,
    pub requirement_count: usize,
    pub entities: Vec<EntityCompletion>,
    /// Mean completion, 100 for an empty cohort.
    pub average_completion: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_map_preserves_insertion_order() {
        let mut map = AttributeMap::new();
        map.insert("zeta", "1".into());
        map.insert("alpha", "2".into());
        map.insert("mid", "3".into());
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_attribute_map_insert_replaces_in_place() {
        let mut map: AttributeMap = [("a", AttributeValue::text("1")), ("b", AttributeValue::text("2"))]
            .into_iter()
            .collect();
        let previous = map.insert("a", "updated".into());
        assert_eq!(previous, Some(AttributeValue::text("1")));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&AttributeValue::text("updated")));
    }

    #[test]
    fn test_attribute_map_remove_keeps_order() {
        let mut map: AttributeMap = [
            ("a", AttributeValue::text("1")),
            ("b", AttributeValue::text("2")),
            ("c", AttributeValue::text("3")),
        ]
        .into_iter()
        .collect();
        assert!(map.remove("b").is_some());
        assert!(map.remove("missing").is_none());
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_attribute_map_json_keeps_document_order() {
        let json = r#"{"Número de Identificación": "900123456", "activo": true, "cupo": 1500, "inicio": {"date": "2024-02-01"}}"#;
        let map: AttributeMap = serde_json::from_str(json).unwrap();
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            vec!["Número de Identificación", "activo", "cupo", "inicio"]
        );
        assert_eq!(map.get("activo"), Some(&AttributeValue::Boolean(true)));
        assert_eq!(map.get("cupo"), Some(&AttributeValue::Number(1500.0)));
        assert_eq!(
            map.get("inicio"),
            Some(&AttributeValue::date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()))
        );

        let back: AttributeMap = serde_json::from_str(&serde_json::to_string(&map).unwrap()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_attribute_value_emptiness() {
        assert!(AttributeValue::text("   ").is_empty());
        assert!(!AttributeValue::text("x").is_empty());
        assert!(!AttributeValue::Boolean(false).is_empty());
        assert!(!AttributeValue::Number(0.0).is_empty());
    }

    #[test]
    fn test_attribute_value_display() {
        assert_eq!(AttributeValue::Number(900123456.0).to_string(), "900123456");
        assert_eq!(AttributeValue::Number(2.5).to_string(), "2.5");
        assert_eq!(
            AttributeValue::date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()).to_string(),
            "2023-12-31"
        );
    }

    #[test]
    fn test_value_type_from_str_accepts_spanish_labels() {
        assert_eq!("fecha".parse::<ValueType>().unwrap(), ValueType::Date);
        assert_eq!("Número".parse::<ValueType>().unwrap(), ValueType::Number);
        assert_eq!("email".parse::<ValueType>().unwrap(), ValueType::Email);
        assert!("blob".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_completion_percentage() {
        assert_eq!(completion_percentage(0, 0), 100);
        assert_eq!(completion_percentage(1, 1), 50);
        assert_eq!(completion_percentage(2, 1), 67);
        assert_eq!(completion_percentage(0, 3), 0);
    }

    #[test]
    fn test_entity_json_flattens_standard_attributes() {
        let company = Uuid::nil();
        let entity = Entity::new(company, "proveedor")
            .with_standard(StandardAttribute::LegalName, "Acme SA")
            .with_attribute("banco", "Bancolombia");
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["legal_name"], "Acme SA");
        assert_eq!(json["attributes"]["banco"], "Bancolombia");
        assert!(json.get("email").is_none());

        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn test_standard_attribute_round_trip() {
        for attribute in StandardAttribute::ALL {
            assert_eq!(attribute.as_str().parse::<StandardAttribute>().unwrap(), attribute);
        }
    }

    #[test]
    fn test_merge_request_defaults_remove_originals() {
        let req: MergeRequest =
            serde_json::from_str(r#"{"keys": ["a", "b"], "target_name": "c"}"#).unwrap();
        assert!(req.remove_originals);
        assert!(req.target_value.is_none());
    }
}
