//! Fill-forward merge of per-batch records.
//!
//! A scalar already holding real data is never replaced, so the first batch
//! that reports a field wins. Lists are unions that keep first-seen order.
//! Provenance fields belong to finalisation and are not merged.

use crate::record::{ExtractionFieldSet, Populated, Slot};

/// Merge `incoming` into `combined`, returning the new combined record.
pub fn merge(
    mut combined: ExtractionFieldSet,
    incoming: &ExtractionFieldSet,
) -> ExtractionFieldSet {
    fill(&mut combined.applicant_name, &incoming.applicant_name);
    fill(&mut combined.submitter_id, &incoming.submitter_id);
    fill(&mut combined.applicant_id, &incoming.applicant_id);
    fill(&mut combined.document_id, &incoming.document_id);
    fill(&mut combined.submission_date, &incoming.submission_date);
    fill(&mut combined.region, &incoming.region);
    fill(&mut combined.target_year, &incoming.target_year);
    fill(&mut combined.hectares, &incoming.hectares);

    for id in &incoming.block_ids {
        if !combined.block_ids.contains(id) {
            combined.block_ids.push(id.clone());
        }
    }

    for culture in &incoming.cultures {
        if !combined.cultures.iter().any(|c| c.name == culture.name) {
            combined.cultures.push(culture.clone());
        }
    }

    for row in &incoming.crop_history {
        let seen = combined
            .crop_history
            .iter()
            .any(|r| r.year == row.year && r.culture == row.culture);
        if !seen {
            combined.crop_history.push(row.clone());
        }
    }

    combined
}

fn fill<T: Populated + Clone>(current: &mut Slot<T>, incoming: &Slot<T>) {
    if !current.is_populated() && incoming.is_populated() {
        *current = incoming.clone();
    }
}
