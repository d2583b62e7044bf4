//! Record projector - nested package record to flat display fields
//!
//! Output shape depends only on the schema and on how many ingredients and
//! processing steps the record has. Missing values never remove a field;
//! they render as `NOT_SPECIFIED`.

use crate::domain::display::{
    DisplayField, FieldKey, FieldValue, Section, Severity, NOT_SPECIFIED, UNKNOWN_HERB,
};
use crate::domain::record::{
    DualLabel, FarmDetails, Ingredient, PackageDetails, PackageRecord, ProcessingStep,
    RetailerDetails, ABSENT_MARKER,
};
use crate::infra::config::Layout;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;

/// Checked first, so a status matching both sets is positive
const POSITIVE_KEYWORDS: [&str; 3] = ["pass", "approved", "good"];
const NEGATIVE_KEYWORDS: [&str; 3] = ["fail", "rejected", "poor"];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Long-form English rendering, e.g. "March 15, 2024"
const LONG_DATE_FORMAT: &str = "%B %-d, %Y";

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty() && *v != ABSENT_MARKER)
}

fn or_placeholder(value: Option<&str>) -> String {
    present(value).unwrap_or(NOT_SPECIFIED).to_string()
}

fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    // Keep the date as written in its own offset, no conversion
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.date());
        }
    }
    NaiveDate::parse_from_str(text, "%Y/%m/%d").ok()
}

/// Render a date-like value for display.
///
/// Absent, blank, or `"-"` gives `"Not specified"`. Values that parse as a
/// calendar date render long-form; anything else is returned unchanged.
pub fn format_date(value: Option<&str>) -> String {
    let Some(text) = present(value) else {
        return NOT_SPECIFIED.to_string();
    };
    match parse_calendar_date(text) {
        Some(date) => date.format(LONG_DATE_FORMAT).to_string(),
        None => value.unwrap_or_default().to_string(),
    }
}

/// Classify a free-text quality-check status.
///
/// Case-insensitive substring match, positive keywords before negative.
/// No status at all is `Unknown`; a status matching neither set is `Neutral`.
pub fn classify_status(value: Option<&str>) -> Severity {
    let Some(status) = present(value) else {
        return Severity::Unknown;
    };
    let status = status.to_lowercase();
    if POSITIVE_KEYWORDS.iter().any(|k| status.contains(k)) {
        Severity::Positive
    } else if NEGATIVE_KEYWORDS.iter().any(|k| status.contains(k)) {
        Severity::Negative
    } else {
        Severity::Neutral
    }
}

fn dual_label(label: &DualLabel) -> String {
    match (present(label.primary.as_deref()), present(label.vernacular.as_deref())) {
        (Some(primary), Some(vernacular)) => format!("{primary} ({vernacular})"),
        (Some(text), None) | (None, Some(text)) => text.to_string(),
        (None, None) => NOT_SPECIFIED.to_string(),
    }
}

/// "a, b" when both halves exist, whichever exists otherwise
fn joined_pair(first: Option<&str>, second: Option<&str>) -> String {
    match (present(first), present(second)) {
        (Some(a), Some(b)) => format!("{a}, {b}"),
        (Some(text), None) | (None, Some(text)) => text.to_string(),
        (None, None) => NOT_SPECIFIED.to_string(),
    }
}

/// Which fields each section shows, in order, and under what labels
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    package: Vec<FieldKey>,
    retailer: Vec<FieldKey>,
    ingredient: Vec<FieldKey>,
    farm: Vec<FieldKey>,
    processing: Vec<FieldKey>,
    labels: HashMap<FieldKey, String>,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::web()
    }
}

impl FieldSchema {
    /// Build a schema from per-section field lists. Keys that do not belong
    /// to a section are skipped when projecting that section.
    pub fn new(
        package: Vec<FieldKey>,
        retailer: Vec<FieldKey>,
        ingredient: Vec<FieldKey>,
        farm: Vec<FieldKey>,
        processing: Vec<FieldKey>,
    ) -> Self {
        Self { package, retailer, ingredient, farm, processing, labels: HashMap::new() }
    }

    /// Layout of the web page: every field on its own row
    pub fn web() -> Self {
        use FieldKey::*;
        Self::new(
            vec![
                PackageId,
                ProductName,
                Brand,
                PackagingType,
                PackagedOn,
                ExpiryDate,
                Unit,
                Quantity,
                PackageQuality,
            ],
            vec![RetailerName, RetailerLicense, RetailerLocation, DateReceived],
            vec![HerbName, ScientificName, Form, BatchId],
            vec![Farmer, Certifications, FarmLocation, SowingDate, HarvestDate, Yield, FarmQuality],
            vec![
                ProcessType,
                ProcessDate,
                OutputForm,
                ProcessingUnit,
                Equipment,
                Operator,
                ProcessQuality,
            ],
        )
    }

    /// Layout of the mobile app: quantity and unit share a row, short labels
    pub fn mobile() -> Self {
        use FieldKey::*;
        Self::new(
            vec![
                PackageId,
                ProductName,
                Brand,
                PackagingType,
                PackagedOn,
                ExpiryDate,
                QuantityWithUnit,
                PackageQuality,
            ],
            vec![RetailerName, RetailerLicense, RetailerLocation, DateReceived],
            vec![HerbName, ScientificName, Form, BatchId],
            vec![Farmer, Certifications, FarmLocation, SowingDate, HarvestDate, Yield, FarmQuality],
            vec![
                ProcessType,
                ProcessDate,
                OutputForm,
                ProcessingUnit,
                Equipment,
                Operator,
                ProcessQuality,
            ],
        )
        .with_label(ProductName, "Product")
        .with_label(RetailerName, "Retailer")
        .with_label(RetailerLicense, "License")
        .with_label(FarmLocation, "Location")
        .with_label(ProcessingUnit, "Unit")
        .with_label(Equipment, "Equipment")
    }

    pub fn for_layout(layout: Layout) -> Self {
        match layout {
            Layout::Web => Self::web(),
            Layout::Mobile => Self::mobile(),
        }
    }

    pub fn with_label(mut self, key: FieldKey, label: impl Into<String>) -> Self {
        self.labels.insert(key, label.into());
        self
    }

    pub fn label(&self, key: FieldKey) -> &str {
        self.labels.get(&key).map(String::as_str).unwrap_or_else(|| key.default_label())
    }
}

/// Projected value of one field
struct Cell {
    value: FieldValue,
    severity: Option<Severity>,
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Self { value: FieldValue::text(value), severity: None }
    }

    fn optional(value: Option<&str>) -> Self {
        Self::text(or_placeholder(value))
    }

    fn date(value: Option<&str>) -> Self {
        Self::text(format_date(value))
    }

    fn status(value: Option<&str>) -> Self {
        Self { value: FieldValue::text(or_placeholder(value)), severity: Some(classify_status(value)) }
    }
}

fn package_cell(key: FieldKey, details: &PackageDetails) -> Option<Cell> {
    let cell = match key {
        FieldKey::PackageId => Cell::optional(details.package_id.as_deref()),
        FieldKey::ProductName => Cell::optional(details.product_name.as_deref()),
        FieldKey::Brand => Cell::optional(details.brand.as_deref()),
        FieldKey::PackagingType => Cell::text(dual_label(&details.packaging_type)),
        FieldKey::PackagedOn => Cell::date(details.packaging_date.as_deref()),
        FieldKey::ExpiryDate => Cell::date(details.expiry_date.as_deref()),
        FieldKey::Unit => Cell::optional(details.packaging_unit.as_deref()),
        FieldKey::Quantity => Cell::optional(details.quantity_units.as_deref()),
        FieldKey::QuantityWithUnit => {
            let quantity = present(details.quantity_units.as_deref());
            let unit = present(details.packaging_unit.as_deref());
            match (quantity, unit) {
                (Some(quantity), Some(unit)) => Cell::text(format!("{quantity} {unit}")),
                (Some(quantity), None) => Cell::text(quantity),
                (None, _) => Cell::text(NOT_SPECIFIED),
            }
        }
        FieldKey::PackageQuality => Cell::status(details.quality_check.as_deref()),
        _ => return None,
    };
    Some(cell)
}

fn retailer_cell(key: FieldKey, details: Option<&RetailerDetails>) -> Option<Cell> {
    let retailer = details.and_then(|d| d.retailer.as_ref());
    let cell = match key {
        FieldKey::RetailerName => Cell::optional(retailer.and_then(|r| r.name.as_deref())),
        FieldKey::RetailerLicense => Cell::optional(retailer.and_then(|r| r.license.as_deref())),
        FieldKey::RetailerLocation => Cell::optional(retailer.and_then(|r| r.location.as_deref())),
        FieldKey::DateReceived => Cell::date(details.and_then(|d| d.date_received.as_deref())),
        _ => return None,
    };
    Some(cell)
}

fn ingredient_cell(key: FieldKey, ingredient: &Ingredient) -> Option<Cell> {
    let herb = &ingredient.herb_details;
    let cell = match key {
        FieldKey::HerbName => {
            Cell::text(present(herb.herb_name.as_deref()).unwrap_or(UNKNOWN_HERB))
        }
        FieldKey::ScientificName => Cell::optional(herb.scientific_name.as_deref()),
        FieldKey::Form => Cell::text(dual_label(&ingredient.form)),
        FieldKey::BatchId => Cell::optional(ingredient.batch_id.as_deref()),
        _ => return None,
    };
    Some(cell)
}

fn farm_cell(key: FieldKey, farm: &FarmDetails) -> Option<Cell> {
    let farmer = farm.farmer.as_ref();
    let location = farm.farm_location.as_ref();
    let cell = match key {
        FieldKey::Farmer => Cell::optional(farmer.and_then(|f| f.name.as_deref())),
        FieldKey::Certifications => {
            match farmer.and_then(|f| f.certifications.as_ref()).filter(|c| !c.is_empty()) {
                Some(labels) => Cell { value: FieldValue::Labels(labels.clone()), severity: None },
                None => Cell::text(NOT_SPECIFIED),
            }
        }
        FieldKey::FarmLocation => Cell::text(format!(
            "{}, {}",
            or_placeholder(location.and_then(|l| l.village.as_deref())),
            or_placeholder(location.and_then(|l| l.state.as_deref()))
        )),
        FieldKey::SowingDate => Cell::date(farm.sowing_date.as_deref()),
        FieldKey::HarvestDate => Cell::date(farm.harvest_date.as_deref()),
        FieldKey::Yield => match farm.yield_quantity_kg {
            Some(kg) => Cell::text(format!("{kg} kg")),
            None => Cell::text(NOT_SPECIFIED),
        },
        FieldKey::FarmQuality => Cell::status(farm.quality_check.as_deref()),
        _ => return None,
    };
    Some(cell)
}

fn step_cell(key: FieldKey, step: &ProcessingStep) -> Option<Cell> {
    let unit = step.unit.as_ref();
    let cell = match key {
        FieldKey::ProcessType => Cell::optional(step.process_type.as_deref()),
        FieldKey::ProcessDate => Cell::date(step.timestamp.as_deref()),
        FieldKey::OutputForm => Cell::text(dual_label(&step.output_form)),
        FieldKey::ProcessingUnit => Cell::text(joined_pair(
            unit.and_then(|u| u.name.as_deref()),
            unit.and_then(|u| u.location.as_deref()),
        )),
        FieldKey::Equipment => Cell::optional(step.equipment.as_deref()),
        FieldKey::Operator => Cell::optional(step.operator.as_deref()),
        FieldKey::ProcessQuality => Cell::status(step.quality_check.as_deref()),
        _ => return None,
    };
    Some(cell)
}

fn emit<F>(
    fields: &mut Vec<DisplayField>,
    schema: &FieldSchema,
    section: Section,
    keys: &[FieldKey],
    cell: F,
) where
    F: Fn(FieldKey) -> Option<Cell>,
{
    for &key in keys {
        if let Some(Cell { value, severity }) = cell(key) {
            fields.push(DisplayField {
                section,
                key,
                label: schema.label(key).to_string(),
                value,
                severity,
            });
        }
    }
}

/// Project a record into display fields.
///
/// Order: package, retailer, then for each ingredient in record order its
/// own fields, its farm fields, and each processing step in record order.
pub fn project(record: &PackageRecord, schema: &FieldSchema) -> Vec<DisplayField> {
    let mut fields = Vec::new();

    emit(&mut fields, schema, Section::Package, &schema.package, |key| {
        package_cell(key, &record.package_details)
    });

    let retailer = record.retailer_details.as_ref();
    emit(&mut fields, schema, Section::Retailer, &schema.retailer, |key| {
        retailer_cell(key, retailer)
    });

    for (index, ingredient) in record.ingredients.iter().enumerate() {
        emit(&mut fields, schema, Section::Ingredient { index }, &schema.ingredient, |key| {
            ingredient_cell(key, ingredient)
        });
        emit(&mut fields, schema, Section::Farm { ingredient: index }, &schema.farm, |key| {
            farm_cell(key, &ingredient.farm_details)
        });
        for (step_index, step) in ingredient.processing_details.iter().enumerate() {
            let section = Section::ProcessingStep { ingredient: index, step: step_index };
            emit(&mut fields, schema, section, &schema.processing, |key| step_cell(key, step));
        }
    }

    fields
}
