//! The structured farm-data record built up across batches.
//!
//! Every scalar is a [`Slot`]: either [`Slot::NotAvailable`] (the model never
//! reported the field, or reported it as unknown) or [`Slot::Known`] holding
//! whatever the model said, including zero or an empty string. The merge and
//! completeness rules ask [`Slot::is_populated`] rather than matching on the
//! variant, so "said zero hectares" and "said nothing" stay distinguishable
//! in the record while both count as missing for fill-forward purposes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An optional field with an explicit "not available" state.
///
/// Serialises as `null` when not available and as the bare value otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    /// Never seen, or explicitly reported as unknown.
    NotAvailable,
    /// Reported by the source (may still be zero or empty).
    Known(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::NotAvailable
    }
}

impl<T> Slot<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Slot::Known(v) => Some(v),
            Slot::NotAvailable => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Slot::Known(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Slot::Known(v) => Some(v),
            Slot::NotAvailable => None,
        }
    }
}

impl<T: Populated> Slot<T> {
    /// `true` when the slot holds a non-empty, non-zero value.
    pub fn is_populated(&self) -> bool {
        matches!(self, Slot::Known(v) if v.is_populated())
    }
}

impl<T> From<Option<T>> for Slot<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Slot::Known(v),
            None => Slot::NotAvailable,
        }
    }
}

impl<T: Serialize> Serialize for Slot<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Slot::Known(v) => serializer.serialize_some(v),
            Slot::NotAvailable => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Slot<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Slot::from)
    }
}

/// Whether a value carries information for merge purposes.
pub trait Populated {
    fn is_populated(&self) -> bool;
}

impl Populated for String {
    fn is_populated(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Populated for f64 {
    fn is_populated(&self) -> bool {
        self.is_finite() && *self > 0.0
    }
}

impl Populated for i32 {
    fn is_populated(&self) -> bool {
        *self > 0
    }
}

/// One crop grown in the target year.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Culture {
    pub name: String,
    pub hectares: Slot<f64>,
    /// Tonnes per hectare.
    pub yield_per_hectare: Slot<f64>,
    /// HUF per tonne.
    pub price_per_tonne: Slot<f64>,
    pub revenue: Slot<f64>,
}

impl Culture {
    pub fn new(name: impl Into<String>, hectares: f64) -> Self {
        Self {
            name: name.into(),
            hectares: Slot::Known(hectares),
            ..Default::default()
        }
    }
}

/// One flattened row of the historical crop table (year × culture).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CropYearRecord {
    pub year: i32,
    pub culture: String,
    pub hectares: Slot<f64>,
    pub yield_per_hectare: Slot<f64>,
}

/// Where the terminal record's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    /// Every populated field was read from the document.
    #[default]
    Extracted,
    /// Extracted fields were kept and gaps filled with placeholder data.
    Augmented,
    /// Nothing usable was extracted; the record is entirely placeholder data.
    Synthetic,
}

/// Fields the underwriting flow cannot proceed without.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequiredField {
    ApplicantName,
    SubmitterId,
    ApplicantId,
    BlockIds,
    Hectares,
    Cultures,
}

impl RequiredField {
    pub const ALL: [RequiredField; 6] = [
        RequiredField::ApplicantName,
        RequiredField::SubmitterId,
        RequiredField::ApplicantId,
        RequiredField::BlockIds,
        RequiredField::Hectares,
        RequiredField::Cultures,
    ];

    /// Wire name, matching the record's JSON keys.
    pub fn key(self) -> &'static str {
        match self {
            RequiredField::ApplicantName => "applicantName",
            RequiredField::SubmitterId => "submitterId",
            RequiredField::ApplicantId => "applicantId",
            RequiredField::BlockIds => "blockIds",
            RequiredField::Hectares => "hectares",
            RequiredField::Cultures => "cultures",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The structured record extracted from one SAPS document.
///
/// The same type is produced per batch by the parser and, after merging and
/// finalisation, once per document. The provenance fields at the bottom are
/// only set during finalisation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionFieldSet {
    pub applicant_name: Slot<String>,
    pub submitter_id: Slot<String>,
    pub applicant_id: Slot<String>,
    pub document_id: Slot<String>,
    pub submission_date: Slot<String>,
    pub region: Slot<String>,
    pub target_year: Slot<i32>,
    pub hectares: Slot<f64>,
    pub cultures: Vec<Culture>,
    pub block_ids: Vec<String>,
    pub crop_history: Vec<CropYearRecord>,
    /// Computed during finalisation; never taken from model output.
    pub total_revenue: Slot<f64>,

    pub origin: DataOrigin,
    pub data_unavailable: bool,
    pub error_message: Option<String>,
    pub missing_required: Vec<RequiredField>,
    pub synthesized_fields: Vec<String>,
}

impl ExtractionFieldSet {
    /// `true` when no field carries any information.
    pub fn is_blank(&self) -> bool {
        !self.applicant_name.is_populated()
            && !self.submitter_id.is_populated()
            && !self.applicant_id.is_populated()
            && !self.document_id.is_populated()
            && !self.submission_date.is_populated()
            && !self.region.is_populated()
            && !self.target_year.is_populated()
            && !self.hectares.is_populated()
            && self.cultures.is_empty()
            && self.block_ids.is_empty()
            && self.crop_history.is_empty()
    }

    /// `true` when the record came entirely or partly from placeholder data.
    pub fn is_synthetic(&self) -> bool {
        self.origin != DataOrigin::Extracted
    }

    /// Sum of hectares over cultures that report them.
    pub fn culture_hectares(&self) -> f64 {
        self.cultures
            .iter()
            .filter_map(|c| c.hectares.known().copied())
            .filter(|h| h.is_populated())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_known_but_not_populated() {
        let s = Slot::Known(0.0);
        assert!(s.is_known());
        assert!(!s.is_populated());
        assert!(!Slot::<f64>::NotAvailable.is_populated());
        assert!(Slot::Known(12.5).is_populated());
    }

    #[test]
    fn blank_string_is_not_populated() {
        assert!(!Slot::Known("   ".to_string()).is_populated());
        assert!(Slot::Known("Kovács János".to_string()).is_populated());
    }

    #[test]
    fn slot_serialises_as_nullable_value() {
        let rec = ExtractionFieldSet {
            applicant_name: Slot::Known("Teszt Gazda".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["applicantName"], "Teszt Gazda");
        assert!(json["submitterId"].is_null());
        assert!(json["hectares"].is_null());
    }

    #[test]
    fn missing_keys_deserialise_as_not_available() {
        let rec: ExtractionFieldSet =
            serde_json::from_str(r#"{"hectares": 0, "region": null}"#).unwrap();
        assert_eq!(rec.hectares, Slot::Known(0.0));
        assert_eq!(rec.region, Slot::NotAvailable);
        assert_eq!(rec.applicant_name, Slot::NotAvailable);
    }

    #[test]
    fn default_record_is_blank() {
        assert!(ExtractionFieldSet::default().is_blank());
        let rec = ExtractionFieldSet {
            block_ids: vec!["K1234567".into()],
            ..Default::default()
        };
        assert!(!rec.is_blank());
    }

    #[test]
    fn culture_hectares_skips_unknown() {
        let mut rec = ExtractionFieldSet::default();
        rec.cultures.push(Culture::new("Búza", 30.0));
        rec.cultures.push(Culture {
            name: "Kukorica".into(),
            ..Default::default()
        });
        rec.cultures.push(Culture::new("Repce", 12.5));
        assert!((rec.culture_hectares() - 42.5).abs() < 1e-9);
    }

    #[test]
    fn required_field_display_uses_wire_key() {
        assert_eq!(RequiredField::SubmitterId.to_string(), "submitterId");
        assert_eq!(RequiredField::ALL.len(), 6);
    }
}
