//! Search filters collected from the user.
//!
//! [`FilterInput`] is the raw, unchecked form/JSON payload. [`FilterInput::validate`]
//! turns it into an immutable [`FilterSet`] or a list of per-field errors; the
//! pipeline only ever sees a validated set.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Sectors of Pereira offered by the form.
pub const SECTOR_CATALOG: &[&str] = &[
    "Centro",
    "Cuba",
    "Pinares",
    "Ciudad Jardín",
    "Villa Santana",
    "Álamos",
    "Parque Industrial",
];

/// Socioeconomic strata (estratos) that can be selected.
pub const STRATA_CATALOG: &[u8] = &[2, 3, 4, 5, 6];

pub const PROPERTY_TYPE_CATALOG: &[&str] = &["Casa", "Apartamento", "Apartaestudio", "Terreno"];

/// Form field a validation error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Price,
    Area,
    Sectors,
    Strata,
    PropertyTypes,
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: FilterField,
    pub message: String,
}

impl FieldError {
    fn new(field: FilterField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Unvalidated filter values as submitted.
///
/// When deserialized, missing ranges take the form defaults. Missing
/// selections stay empty, matching a form submitted with nothing selected.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterInput {
    #[serde(default = "default_price_min")]
    pub price_min: i64,
    #[serde(default = "default_price_max")]
    pub price_max: i64,
    #[serde(default = "default_area_min")]
    pub area_min: i64,
    #[serde(default = "default_area_max")]
    pub area_max: i64,
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default)]
    pub strata: Vec<u8>,
    #[serde(default)]
    pub property_types: Vec<String>,

    /// Fields that could not be parsed from a form submission.
    #[serde(skip)]
    parse_errors: Vec<FieldError>,
}

fn default_price_min() -> i64 {
    200_000_000
}

fn default_price_max() -> i64 {
    600_000_000
}

fn default_area_min() -> i64 {
    80
}

fn default_area_max() -> i64 {
    150
}

/// The form's initial state, including its pre-selected values.
impl Default for FilterInput {
    fn default() -> Self {
        Self {
            price_min: default_price_min(),
            price_max: default_price_max(),
            area_min: default_area_min(),
            area_max: default_area_max(),
            sectors: ["Cuba", "Pinares", "Ciudad Jardín", "Álamos"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            strata: vec![3, 4, 5],
            property_types: vec!["Casa".to_string(), "Apartamento".to_string()],
            parse_errors: Vec::new(),
        }
    }
}

impl FilterInput {
    /// Build from urlencoded form pairs; multi-selects arrive as repeated keys.
    ///
    /// Multi-select fields absent from the submission are empty, not defaulted.
    pub fn from_form_pairs(pairs: &[(String, String)]) -> Self {
        let mut input = Self {
            sectors: Vec::new(),
            strata: Vec::new(),
            property_types: Vec::new(),
            ..Self::default()
        };

        for (key, value) in pairs {
            let value = value.trim();
            match key.as_str() {
                "price_min" => input.set_number(FilterField::Price, value, |i, n| i.price_min = n),
                "price_max" => input.set_number(FilterField::Price, value, |i, n| i.price_max = n),
                "area_min" => input.set_number(FilterField::Area, value, |i, n| i.area_min = n),
                "area_max" => input.set_number(FilterField::Area, value, |i, n| i.area_max = n),
                "sectors" => input.sectors.push(value.to_string()),
                "strata" => match value.parse() {
                    Ok(level) => input.strata.push(level),
                    Err(_) => input.parse_errors.push(FieldError::new(
                        FilterField::Strata,
                        format!("Estrato inválido: {}", value),
                    )),
                },
                "property_types" => input.property_types.push(value.to_string()),
                _ => {}
            }
        }
        input
    }

    fn set_number(&mut self, field: FilterField, raw: &str, apply: impl FnOnce(&mut Self, i64)) {
        match parse_integer(raw) {
            Some(n) => apply(self, n),
            None => self.parse_errors.push(FieldError::new(
                field,
                format!("Valor numérico inválido: {}", raw),
            )),
        }
    }

    /// Check every field and produce an immutable [`FilterSet`].
    ///
    /// # Errors
    ///
    /// Returns one message per failing check, grouped by field in form order.
    pub fn validate(&self) -> Result<FilterSet, Vec<FieldError>> {
        let mut errors = self.parse_errors.clone();

        if self.price_min < 0 || self.price_max < 0 {
            errors.push(FieldError::new(
                FilterField::Price,
                "⚠️ Los precios no pueden ser negativos.",
            ));
        } else if self.price_min > self.price_max {
            errors.push(FieldError::new(
                FilterField::Price,
                "⚠️ El precio mínimo no puede ser mayor que el precio máximo.",
            ));
        }

        let area = (u32::try_from(self.area_min), u32::try_from(self.area_max));
        if self.area_min < 0 || self.area_max < 0 {
            errors.push(FieldError::new(
                FilterField::Area,
                "⚠️ El área no puede ser negativa.",
            ));
        } else if area.0.is_err() || area.1.is_err() {
            errors.push(FieldError::new(
                FilterField::Area,
                format!("⚠️ El área no puede superar {} m².", thousands(u32::MAX.into())),
            ));
        } else if self.area_min > self.area_max {
            errors.push(FieldError::new(
                FilterField::Area,
                "⚠️ El área mínima no puede ser mayor que el área máxima.",
            ));
        }

        let sectors = dedup(&self.sectors);
        if sectors.is_empty() {
            errors.push(FieldError::new(
                FilterField::Sectors,
                "⚠️ Por favor selecciona al menos un sector de interés.",
            ));
        }
        for sector in sectors.iter().filter(|s| !SECTOR_CATALOG.contains(&s.as_str())) {
            errors.push(FieldError::new(
                FilterField::Sectors,
                format!("⚠️ Sector desconocido: {}", sector),
            ));
        }

        let strata: BTreeSet<u8> = self.strata.iter().copied().collect();
        if strata.is_empty() {
            errors.push(FieldError::new(
                FilterField::Strata,
                "⚠️ Por favor selecciona al menos un estrato.",
            ));
        }
        for level in strata.iter().filter(|l| !STRATA_CATALOG.contains(*l)) {
            errors.push(FieldError::new(
                FilterField::Strata,
                format!("⚠️ Estrato fuera de rango (2-6): {}", level),
            ));
        }

        let property_types = dedup(&self.property_types);
        if property_types.is_empty() {
            errors.push(FieldError::new(
                FilterField::PropertyTypes,
                "⚠️ Por favor selecciona al menos un tipo de propiedad.",
            ));
        }
        for kind in property_types
            .iter()
            .filter(|t| !PROPERTY_TYPE_CATALOG.contains(&t.as_str()))
        {
            errors.push(FieldError::new(
                FilterField::PropertyTypes,
                format!("⚠️ Tipo de propiedad desconocido: {}", kind),
            ));
        }

        match area {
            (Ok(area_min), Ok(area_max)) if errors.is_empty() => Ok(FilterSet {
                // Prices were checked non-negative above.
                price_min: self.price_min.unsigned_abs(),
                price_max: self.price_max.unsigned_abs(),
                area_min,
                area_max,
                sectors,
                strata,
                property_types,
            }),
            _ => {
                errors.sort_by_key(|e| e.field as u8);
                Err(errors)
            }
        }
    }
}

/// Validated search filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSet {
    price_min: u64,
    price_max: u64,
    area_min: u32,
    area_max: u32,
    sectors: Vec<String>,
    strata: BTreeSet<u8>,
    property_types: Vec<String>,
}

impl FilterSet {
    pub fn price_range(&self) -> (u64, u64) {
        (self.price_min, self.price_max)
    }

    pub fn area_range(&self) -> (u32, u32) {
        (self.area_min, self.area_max)
    }

    pub fn sectors(&self) -> &[String] {
        &self.sectors
    }

    pub fn strata(&self) -> &BTreeSet<u8> {
        &self.strata
    }

    pub fn property_types(&self) -> &[String] {
        &self.property_types
    }

    /// Template variables interpolated into the stage descriptions.
    pub fn to_inputs(&self) -> BTreeMap<String, String> {
        let strata = self
            .strata
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        BTreeMap::from([
            ("precio_min".to_string(), thousands(self.price_min)),
            ("precio_max".to_string(), thousands(self.price_max)),
            ("area_min".to_string(), self.area_min.to_string()),
            ("area_max".to_string(), self.area_max.to_string()),
            ("sectores".to_string(), self.sectors.join(", ")),
            ("estratos".to_string(), strata),
            ("tipos_propiedad".to_string(), self.property_types.join(", ")),
        ])
    }

    /// Headline metrics shown above the report.
    pub fn summary(&self) -> FilterSummary {
        FilterSummary {
            investment_range: format!(
                "${:.0}M - ${:.0}M COP",
                self.price_min as f64 / 1_000_000.0,
                self.price_max as f64 / 1_000_000.0
            ),
            area_range: format!("{} - {} m²", self.area_min, self.area_max),
            sectors: format!("{} seleccionados", self.sectors.len()),
            strata: format!("{} estratos", self.strata.len()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterSummary {
    pub investment_range: String,
    pub area_range: String,
    pub sectors: String,
    pub strata: String,
}

/// Format with `,` thousands separators: `200000000` -> `200,000,000`.
pub fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Parse an integer typed by a person.
///
/// Spaces and `_` are ignored. `,` and `.` are accepted only as thousands
/// separators, so `200.000.000` parses while `80.5` does not.
fn parse_integer(raw: &str) -> Option<i64> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '_' | ' ')).collect();
    let groups: Vec<&str> = cleaned.split([',', '.']).collect();

    if let Some((first, rest)) = groups.split_first().filter(|(_, rest)| !rest.is_empty()) {
        let lead = first.trim_start_matches('-').len();
        if !(1..=3).contains(&lead) || rest.iter().any(|g| g.len() != 3) {
            return None;
        }
    }
    groups.concat().parse().ok()
}

fn dedup(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if !out.iter().any(|existing| existing == value) {
            out.push(value.to_string());
        }
    }
    out
}
