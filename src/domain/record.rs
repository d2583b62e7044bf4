//! Package record as served by `GET /get_package/{id}`
//!
//! The backend joins several collections into one document and is loose
//! about types: leaves can arrive as strings, numbers or `null`, nested
//! blocks can be missing entirely. Leaves go through `lenient_text`, nested
//! blocks through `lenient`, and sequences through `lenient_seq`, so a
//! malformed branch degrades to "unknown" instead of failing the record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Marker the backend writes for a value it does not have
pub const ABSENT_MARKER: &str = "-";

/// Text the backend produces when it stringifies a missing label
const STRINGIFIED_NONE: &str = "None";

/// Render a JSON leaf as text. Containers and `null` carry no text.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_text(&value))
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}

/// Optional nested block: `null` or a value of the wrong shape is `None`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

/// Required nested block: anything unreadable becomes the all-unknown default
fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Ordered sequence. Elements are never dropped; an unreadable element is
/// kept as its all-unknown default so positions stay stable.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_labels<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => Some(items.iter().filter_map(value_text).collect()),
        _ => None,
    })
}

/// A concept named in two languages (English plus Sanskrit on the wire)
///
/// Accepts `{"english": .., "sanskrit": ..}` or a bare string, which is
/// taken as the primary text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DualLabel {
    pub primary: Option<String>,
    pub vernacular: Option<String>,
}

impl DualLabel {
    fn normalize(text: Option<String>) -> Option<String> {
        text.filter(|t| {
            let t = t.trim();
            !t.is_empty() && t != ABSENT_MARKER && t != STRINGIFIED_NONE
        })
    }
}

impl<'de> Deserialize<'de> for DualLabel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let (primary, vernacular) = match &value {
            Value::Object(map) => (
                map.get("english").and_then(value_text),
                map.get("sanskrit").and_then(value_text),
            ),
            other => (value_text(other), None),
        };
        Ok(Self { primary: Self::normalize(primary), vernacular: Self::normalize(vernacular) })
    }
}

/// Full traceability document for one package
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PackageRecord {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub package_details: PackageDetails,
    #[serde(default, deserialize_with = "lenient")]
    pub retailer_details: Option<RetailerDetails>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub ingredients: Vec<Ingredient>,
}

impl PackageRecord {
    /// Read a record out of already-parsed JSON. Never fails: a document
    /// that is not an object yields an all-unknown record.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PackageDetails {
    #[serde(default, deserialize_with = "lenient_text")]
    pub package_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub brand: Option<String>,
    #[serde(default)]
    pub packaging_type: DualLabel,
    #[serde(default, deserialize_with = "lenient_text")]
    pub packaging_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub expiry_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub packaging_unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub quantity_units: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub quality_check: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RetailerDetails {
    #[serde(default, deserialize_with = "lenient")]
    pub retailer: Option<Retailer>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date_received: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Retailer {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub license: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub location: Option<String>,
}

/// One herb batch contributing to a package
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Ingredient {
    #[serde(default, deserialize_with = "lenient_text")]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub form: DualLabel,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub herb_details: HerbDetails,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub farm_details: FarmDetails,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub processing_details: Vec<ProcessingStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HerbDetails {
    #[serde(default, deserialize_with = "lenient_text")]
    pub herb_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub scientific_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FarmDetails {
    #[serde(default, deserialize_with = "lenient")]
    pub farmer: Option<Farmer>,
    #[serde(default, deserialize_with = "lenient")]
    pub farm_location: Option<FarmLocation>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sowing_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub harvest_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub yield_quantity_kg: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub quality_check: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Farmer {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_labels")]
    pub certifications: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FarmLocation {
    #[serde(default, deserialize_with = "lenient_text")]
    pub village: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub state: Option<String>,
}

/// One processing operation applied to a batch
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProcessingStep {
    #[serde(default, deserialize_with = "lenient_text")]
    pub process_type: Option<String>,
    #[serde(default)]
    pub output_form: DualLabel,
    #[serde(default, deserialize_with = "lenient")]
    pub unit: Option<ProcessingUnit>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub equipment: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub operator: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub quality_check: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProcessingUnit {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_record() {
        let record = PackageRecord::from_value(json!({
            "package_details": {
                "package_id": "PKG-001",
                "product_name": "Triphala Churna",
                "packaging_type": {"english": "Pouch", "sanskrit": "Kosha"},
                "quantity_units": 12,
                "quality_check": "Passed"
            },
            "retailer_details": {
                "retailer": {"name": "Veda Stores", "license": "LIC-9", "location": "Pune"},
                "date_received": "2024-04-01"
            },
            "ingredients": [{
                "batch_id": "B-1",
                "form": "Powder",
                "herb_details": {"herb_name": "Amla"},
                "farm_details": {
                    "farmer": {"name": "Ravi", "certifications": ["Organic"]},
                    "yield_quantity_kg": 120.5
                },
                "processing_details": [{"process_type": "Drying"}, {"process_type": "Grinding"}]
            }]
        }));

        let details = &record.package_details;
        assert_eq!(details.package_id.as_deref(), Some("PKG-001"));
        assert_eq!(details.quantity_units.as_deref(), Some("12"));
        assert_eq!(details.packaging_type.primary.as_deref(), Some("Pouch"));
        assert_eq!(details.packaging_type.vernacular.as_deref(), Some("Kosha"));

        let retailer = record.retailer_details.as_ref().and_then(|r| r.retailer.as_ref());
        assert_eq!(retailer.and_then(|r| r.name.as_deref()), Some("Veda Stores"));

        let ingredient = &record.ingredients[0];
        assert_eq!(ingredient.form.primary.as_deref(), Some("Powder"));
        assert_eq!(ingredient.form.vernacular, None);
        assert_eq!(ingredient.farm_details.yield_quantity_kg, Some(120.5));
        let steps: Vec<_> =
            ingredient.processing_details.iter().map(|s| s.process_type.as_deref()).collect();
        assert_eq!(steps, vec![Some("Drying"), Some("Grinding")]);
    }

    #[test]
    fn test_missing_blocks_are_unknown() {
        let record = PackageRecord::from_value(json!({"package_details": {}}));
        assert_eq!(record.retailer_details, None);
        assert!(record.ingredients.is_empty());

        let record = PackageRecord::from_value(json!({"retailer_details": null}));
        assert_eq!(record.package_details, PackageDetails::default());
        assert_eq!(record.retailer_details, None);
    }

    #[test]
    fn test_wrong_shapes_degrade() {
        let record = PackageRecord::from_value(json!({
            "package_details": "garbage",
            "retailer_details": 42,
            "ingredients": [
                "not an object",
                {"batch_id": "B-2", "farm_details": [], "processing_details": {"x": 1}}
            ]
        }));

        assert_eq!(record.package_details, PackageDetails::default());
        assert_eq!(record.retailer_details, None);
        // Positions are kept even for unreadable elements
        assert_eq!(record.ingredients.len(), 2);
        assert_eq!(record.ingredients[0], Ingredient::default());
        assert_eq!(record.ingredients[1].batch_id.as_deref(), Some("B-2"));
        assert_eq!(record.ingredients[1].farm_details, FarmDetails::default());
        assert!(record.ingredients[1].processing_details.is_empty());
    }

    #[test]
    fn test_non_object_document() {
        assert_eq!(PackageRecord::from_value(json!([1, 2, 3])), PackageRecord::default());
    }

    #[test]
    fn test_dual_label_markers() {
        let label: DualLabel =
            serde_json::from_value(json!({"english": "Tablet", "sanskrit": "-"})).unwrap();
        assert_eq!(label.primary.as_deref(), Some("Tablet"));
        assert_eq!(label.vernacular, None);

        // The backend stringifies a missing form as "None"
        let label: DualLabel =
            serde_json::from_value(json!({"english": "None", "sanskrit": "-"})).unwrap();
        assert_eq!(label, DualLabel::default());
    }

    #[test]
    fn test_yield_from_string() {
        let farm: FarmDetails =
            serde_json::from_value(json!({"yield_quantity_kg": " 75 "})).unwrap();
        assert_eq!(farm.yield_quantity_kg, Some(75.0));

        let farm: FarmDetails =
            serde_json::from_value(json!({"yield_quantity_kg": "lots"})).unwrap();
        assert_eq!(farm.yield_quantity_kg, None);
    }

    #[test]
    fn test_certifications_keep_order() {
        let farmer: Farmer = serde_json::from_value(json!({
            "certifications": ["Organic", null, "FairTrade"]
        }))
        .unwrap();
        assert_eq!(
            farmer.certifications,
            Some(vec!["Organic".to_string(), "FairTrade".to_string()])
        );
    }
}
