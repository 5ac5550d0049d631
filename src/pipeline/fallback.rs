//! Deterministic placeholder records.
//!
//! When a document yields nothing usable, downstream underwriting still needs a
//! structurally complete record. Every value here is derived from SHA-256
//! digests of the caller's identifiers, so the same user and file always get
//! the same placeholder. The record is flagged as synthetic and must never be
//! mistaken for extracted data.

use crate::crops::{self, CROPS};
use crate::record::{Culture, DataOrigin, ExtractionFieldSet, Slot};
use sha2::{Digest, Sha256};

/// Applicant name used in every placeholder record.
pub const PLACEHOLDER_NAME: &str = "Minta Gazdálkodó";

const COUNTIES: &[&str] = &[
    "Bács-Kiskun",
    "Baranya",
    "Békés",
    "Borsod-Abaúj-Zemplén",
    "Csongrád-Csanád",
    "Fejér",
    "Győr-Moson-Sopron",
    "Hajdú-Bihar",
    "Heves",
    "Jász-Nagykun-Szolnok",
    "Komárom-Esztergom",
    "Nógrád",
    "Pest",
    "Somogy",
    "Szabolcs-Szatmár-Bereg",
    "Tolna",
    "Vas",
    "Veszprém",
    "Zala",
];

/// Area split between placeholder cultures, in percent.
const SHARES_TWO: [u64; 2] = [60, 40];
const SHARES_THREE: [u64; 3] = [50, 30, 20];

const BLOCK_COUNT: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct FallbackSynthesizer {
    reference_year: i32,
}

impl FallbackSynthesizer {
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    /// Build a complete placeholder record for one upload.
    pub fn synthesize(&self, user_id: &str, file_name: &str, file_size: u64) -> ExtractionFieldSet {
        let user = digest(&["user", user_id]);
        let document = digest(&["document", user_id, file_name, &file_size.to_string()]);

        // 20.0 to 219.9 hectares, kept in tenths so culture shares sum exactly.
        let tenths = 200 + u64::from(u16::from_be_bytes([user[0], user[1]])) % 2000;
        let hectares = tenths as f64 / 10.0;
        let cultures = self.cultures_for(user_id, hectares);
        let total_revenue: f64 = cultures.iter().filter_map(|c| c.revenue.known()).sum();

        let block_ids = (0..BLOCK_COUNT)
            .map(|i| {
                let d = digest(&["block", user_id, &i.to_string()]);
                format!("K{:07}", leading_u64(&d) % 10_000_000)
            })
            .collect();

        ExtractionFieldSet {
            applicant_name: Slot::Known(PLACEHOLDER_NAME.to_string()),
            submitter_id: Slot::Known(ten_digits(&digest(&["submitter", user_id]))),
            applicant_id: Slot::Known(ten_digits(&digest(&["applicant", user_id]))),
            document_id: Slot::Known(format!(
                "SAPS-{}-{:02x}{:02x}{:02x}{:02x}",
                self.reference_year, document[0], document[1], document[2], document[3]
            )),
            submission_date: Slot::Known(format!("{}-05-15", self.reference_year)),
            region: Slot::Known(COUNTIES[user[2] as usize % COUNTIES.len()].to_string()),
            target_year: Slot::Known(self.reference_year),
            hectares: Slot::Known(hectares),
            cultures,
            block_ids,
            crop_history: Vec::new(),
            total_revenue: Slot::Known(total_revenue),
            origin: DataOrigin::Synthetic,
            data_unavailable: true,
            error_message: Some(
                "No data could be extracted from the document; all values are placeholders"
                    .to_string(),
            ),
            missing_required: Vec::new(),
            synthesized_fields: Vec::new(),
        }
    }

    /// Two or three placeholder cultures whose areas sum to `hectares`.
    ///
    /// Yield, price and revenue come from the crop reference table.
    pub fn cultures_for(&self, user_id: &str, hectares: f64) -> Vec<Culture> {
        let d = digest(&["cultures", user_id]);
        let shares: &[u64] = if d[0] % 2 == 0 { &SHARES_TWO } else { &SHARES_THREE };
        let offset = d[1] as usize % CROPS.len();

        let total_tenths = (hectares * 10.0).round().max(0.0) as u64;
        let mut assigned = 0;
        shares
            .iter()
            .enumerate()
            .map(|(i, share)| {
                let tenths = if i + 1 == shares.len() {
                    total_tenths - assigned
                } else {
                    // Never exceeds total_tenths, so the narrowing is lossless.
                    (u128::from(total_tenths) * u128::from(*share) / 100) as u64
                };
                assigned += tenths;
                let reference = &CROPS[(offset + i) % CROPS.len()];
                let mut culture = Culture::new(reference.name, tenths as f64 / 10.0);
                crops::fill_financials(&mut culture);
                culture
            })
            .collect()
    }
}

fn digest(parts: &[&str]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn leading_u64(d: &[u8; 32]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&d[..8]);
    u64::from_be_bytes(bytes)
}

fn ten_digits(d: &[u8; 32]) -> String {
    // Leading digit 1-9 so the ID never looks zero-padded.
    let n = 1_000_000_000 + leading_u64(d) % 9_000_000_000;
    n.to_string()
}
