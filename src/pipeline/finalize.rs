//! Finalizing: turn the merged record into the terminal record.
//!
//! Steps, in order:
//! 1. Derive total hectares from the cultures when the model gave none.
//! 2. If the record still lacks area or crops, replace it with placeholder
//!    data (blank record) or fill only its gaps (partial record).
//! 3. Spread unassigned area over cultures with unknown hectares and fill in
//!    yield, price and revenue from the crop reference table.
//! 4. Sum total revenue and audit the required fields.

use crate::crops;
use crate::output::FallbackReason;
use crate::pipeline::completeness::{has_usable_data, missing_required};
use crate::pipeline::fallback::FallbackSynthesizer;
use crate::pipeline::input::DocumentRef;
use crate::record::{DataOrigin, ExtractionFieldSet, Populated, Slot};
use tracing::{info, warn};

/// Finalize `combined` for `doc`.
///
/// `reason` is the coordinator's reason for expecting a fallback (empty
/// document, every batch failed). It is only used when the record turns out
/// not to be usable. Returns the record and the fallback reason that applied.
pub fn finalize(
    mut combined: ExtractionFieldSet,
    doc: &DocumentRef,
    reason: Option<FallbackReason>,
    synthesizer: &FallbackSynthesizer,
) -> (ExtractionFieldSet, Option<FallbackReason>) {
    if !combined.hectares.is_populated() {
        let sum = combined.culture_hectares();
        if sum > 0.0 {
            combined.hectares = Slot::Known(round_tenth(sum));
        }
    }

    let applied = if has_usable_data(&combined) {
        None
    } else {
        Some(reason.unwrap_or(FallbackReason::IncompleteExtraction))
    };

    let mut record = match applied {
        None => combined,
        Some(reason) if combined.is_blank() => {
            warn!("Using placeholder record for {}: {}", doc.id, reason.describe());
            let mut rec = synthesizer.synthesize(&doc.user_id, &doc.file_name, doc.file_size);
            rec.error_message = Some(format!(
                "Placeholder data: {}; no values were extracted",
                reason.describe()
            ));
            rec
        }
        Some(reason) => {
            let placeholder = synthesizer.synthesize(&doc.user_id, &doc.file_name, doc.file_size);
            let mut rec = fill_missing(combined, placeholder, &doc.user_id, synthesizer);
            warn!(
                "Filled {} fields of {} with placeholder data: {}",
                rec.synthesized_fields.len(),
                doc.id,
                reason.describe()
            );
            rec.error_message = Some(format!(
                "Placeholder data used for {}: {}",
                rec.synthesized_fields.join(", "),
                reason.describe()
            ));
            rec
        }
    };

    assign_unknown_hectares(&mut record);
    for culture in &mut record.cultures {
        crops::fill_financials(culture);
    }

    if !record.total_revenue.is_populated() {
        let revenues: Vec<f64> = record
            .cultures
            .iter()
            .filter_map(|c| c.revenue.known().copied())
            .collect();
        if !revenues.is_empty() {
            record.total_revenue = Slot::Known(revenues.iter().sum());
        }
    }

    record.missing_required = missing_required(&record);
    if !record.missing_required.is_empty() {
        let keys: Vec<&str> = record.missing_required.iter().map(|f| f.key()).collect();
        info!("Required fields still missing for {}: {}", doc.id, keys.join(", "));
        if record.error_message.is_none() {
            record.error_message = Some(format!(
                "Required fields still missing: {}",
                keys.join(", ")
            ));
        }
    }

    (record, applied)
}

/// Keep every extracted value and take the rest from `placeholder`.
///
/// Lists are only taken when the extracted list is empty. Placeholder
/// cultures are rescaled to the extracted area when one is known.
fn fill_missing(
    mut real: ExtractionFieldSet,
    placeholder: ExtractionFieldSet,
    user_id: &str,
    synthesizer: &FallbackSynthesizer,
) -> ExtractionFieldSet {
    let mut filled: Vec<String> = Vec::new();

    macro_rules! take {
        ($field:ident, $key:literal) => {
            if !real.$field.is_populated() {
                real.$field = placeholder.$field.clone();
                filled.push($key.to_string());
            }
        };
    }
    take!(applicant_name, "applicantName");
    take!(submitter_id, "submitterId");
    take!(applicant_id, "applicantId");
    take!(document_id, "documentId");
    take!(submission_date, "submissionDate");
    take!(region, "region");
    take!(target_year, "targetYear");

    if real.cultures.is_empty() {
        real.cultures = match real.hectares.known().copied().filter(|h| h.is_populated()) {
            Some(ha) => synthesizer.cultures_for(user_id, ha),
            None => placeholder.cultures.clone(),
        };
        filled.push("cultures".to_string());
    }
    take!(hectares, "hectares");
    if real.block_ids.is_empty() {
        real.block_ids = placeholder.block_ids.clone();
        filled.push("blockIds".to_string());
    }

    real.origin = DataOrigin::Augmented;
    real.synthesized_fields = filled;
    real
}

/// Split area not covered by known culture hectares evenly across cultures
/// whose hectares are unknown.
fn assign_unknown_hectares(record: &mut ExtractionFieldSet) {
    let Some(total) = record.hectares.known().copied() else {
        return;
    };
    let unknown = record
        .cultures
        .iter()
        .filter(|c| !c.hectares.is_populated())
        .count();
    let remaining = total - record.culture_hectares();
    if unknown == 0 || remaining <= 0.0 {
        return;
    }
    let share = round_tenth(remaining / unknown as f64);
    for culture in record.cultures.iter_mut().filter(|c| !c.hectares.is_populated()) {
        culture.hectares = Slot::Known(share);
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
