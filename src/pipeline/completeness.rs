//! Completeness checks on the combined record.

use crate::record::{ExtractionFieldSet, RequiredField};

/// Every required field is populated, so remaining batches can be skipped.
pub fn is_complete(record: &ExtractionFieldSet) -> bool {
    missing_required(record).is_empty()
}

/// Required fields that are still missing, in [`RequiredField::ALL`] order.
pub fn missing_required(record: &ExtractionFieldSet) -> Vec<RequiredField> {
    RequiredField::ALL
        .into_iter()
        .filter(|field| !has_field(record, *field))
        .collect()
}

/// Enough data to price the application: positive area and at least one crop.
pub fn has_usable_data(record: &ExtractionFieldSet) -> bool {
    record.hectares.is_populated() && !record.cultures.is_empty()
}

fn has_field(record: &ExtractionFieldSet, field: RequiredField) -> bool {
    match field {
        RequiredField::ApplicantName => record.applicant_name.is_populated(),
        RequiredField::SubmitterId => record.submitter_id.is_populated(),
        RequiredField::ApplicantId => record.applicant_id.is_populated(),
        RequiredField::BlockIds => !record.block_ids.is_empty(),
        RequiredField::Hectares => record.hectares.is_populated(),
        RequiredField::Cultures => !record.cultures.is_empty(),
    }
}
