//! Display-ready fields produced from a package record

use serde::Serialize;
use std::fmt;

/// Placeholder shown for any value the record does not carry
pub const NOT_SPECIFIED: &str = "Not specified";

/// Placeholder for an ingredient whose herb could not be joined
pub const UNKNOWN_HERB: &str = "Unknown Herb";

/// Where a field belongs. Ingredient and step indices are zero-based
/// positions in the record's own order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Section {
    Package,
    Retailer,
    Ingredient { index: usize },
    Farm { ingredient: usize },
    ProcessingStep { ingredient: usize, step: usize },
}

impl Section {
    pub fn title(&self) -> String {
        match self {
            Section::Package => "Package Details".to_string(),
            Section::Retailer => "Retailer Information".to_string(),
            Section::Ingredient { index } => format!("Ingredient {}", index + 1),
            Section::Farm { .. } => "Farm Origin".to_string(),
            Section::ProcessingStep { step, .. } => format!("Processing Step {}", step + 1),
        }
    }

    /// Nesting level used by renderers
    pub fn depth(&self) -> usize {
        match self {
            Section::Package | Section::Retailer | Section::Ingredient { .. } => 0,
            Section::Farm { .. } | Section::ProcessingStep { .. } => 1,
        }
    }
}

/// Tri-state quality classification plus "no status at all"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Positive,
    Negative,
    Neutral,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    /// Unordered badge-style labels (certifications)
    Labels(Vec<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Labels(labels) => f.write_str(&labels.join(", ")),
        }
    }
}

/// Identifies one displayable value of the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    // Package
    PackageId,
    ProductName,
    Brand,
    PackagingType,
    PackagedOn,
    ExpiryDate,
    Unit,
    Quantity,
    /// Quantity and unit on one row ("10 g")
    QuantityWithUnit,
    PackageQuality,
    // Retailer
    RetailerName,
    RetailerLicense,
    RetailerLocation,
    DateReceived,
    // Ingredient
    HerbName,
    ScientificName,
    Form,
    BatchId,
    // Farm
    Farmer,
    Certifications,
    FarmLocation,
    SowingDate,
    HarvestDate,
    Yield,
    FarmQuality,
    // Processing step
    ProcessType,
    ProcessDate,
    OutputForm,
    ProcessingUnit,
    Equipment,
    Operator,
    ProcessQuality,
}

impl FieldKey {
    pub fn default_label(&self) -> &'static str {
        match self {
            FieldKey::PackageId => "Package ID",
            FieldKey::ProductName => "Product Name",
            FieldKey::Brand => "Brand",
            FieldKey::PackagingType => "Packaging Type",
            FieldKey::PackagedOn => "Packaged On",
            FieldKey::ExpiryDate => "Expiry Date",
            FieldKey::Unit => "Unit",
            FieldKey::Quantity | FieldKey::QuantityWithUnit => "Quantity",
            FieldKey::PackageQuality | FieldKey::FarmQuality | FieldKey::ProcessQuality => {
                "Quality Check"
            }
            FieldKey::RetailerName => "Retailer Name",
            FieldKey::RetailerLicense => "License Number",
            FieldKey::RetailerLocation => "Location",
            FieldKey::DateReceived => "Date Received",
            FieldKey::HerbName => "Herb",
            FieldKey::ScientificName => "Scientific Name",
            FieldKey::Form => "Form",
            FieldKey::BatchId => "Batch ID",
            FieldKey::Farmer => "Farmer",
            FieldKey::Certifications => "Certifications",
            FieldKey::FarmLocation => "Farm Location",
            FieldKey::SowingDate => "Sowing Date",
            FieldKey::HarvestDate => "Harvest Date",
            FieldKey::Yield => "Yield",
            FieldKey::ProcessType => "Process",
            FieldKey::ProcessDate => "Date",
            FieldKey::OutputForm => "Output Form",
            FieldKey::ProcessingUnit => "Processing Unit",
            FieldKey::Equipment => "Equipment Used",
            FieldKey::Operator => "Operator",
        }
    }
}

/// One labelled value ready for a UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayField {
    pub section: Section,
    pub key: FieldKey,
    pub label: String,
    pub value: FieldValue,
    /// Set only for quality-check fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}
