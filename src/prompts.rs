//! Instructions sent to the vision model.
//!
//! Prompts are versioned constants: a request built from the same batch and
//! the same [`PROMPT_VERSION`] is byte-identical, which keeps extraction runs
//! reproducible and lets tests pin the exact request body.
//!
//! The system prompt asks for the native-language JSON layout (schema A in
//! [`crate::pipeline::parse`]). Older prompt revisions produced the flat
//! camelCase layout (schema B), and models still fall back to it
//! occasionally, so the parser accepts both.

/// Version tag of [`SYSTEM_PROMPT`]. Bump whenever the prompt text changes.
pub const PROMPT_VERSION: &str = "saps-extract/3";

/// System instruction for SAPS (Single Area Payment Scheme) documents.
pub const SYSTEM_PROMPT: &str = r#"You are an expert at reading Hungarian agricultural subsidy applications (SAPS / egységes kérelem). You receive scanned pages of ONE application as images, in page order. Extract the data below and answer with ONE JSON object and nothing else.

Use exactly this structure and these keys:

{
  "adminisztrativ_adatok": {
    "kerelmezo_neve": "applicant full name",
    "bekuldo_azonosito": "submitter (beküldő) client ID",
    "ugyfel_azonosito": "applicant (ügyfél) client ID",
    "iratazonosito": "document / iktatószám ID",
    "beadas_datuma": "submission date, YYYY-MM-DD",
    "regio": "county or region",
    "targyev": 2024
  },
  "terulet_adatok": {
    "osszes_terulet_ha": 0.0,
    "blokkazonositok": ["MePAR block IDs, e.g. K1234567"]
  },
  "kulturak": [
    { "nev": "crop name in Hungarian", "terulet_ha": 0.0 }
  ],
  "tortenelmi_adatok": [
    { "ev": 2023, "kulturak": [ { "nev": "crop", "terulet_ha": 0.0, "termesatlag_t_ha": 0.0 } ] }
  ]
}

Rules:
1. Copy names and IDs exactly as printed. Do not translate crop names.
2. Areas are hectares with a decimal point (12.34), never a comma.
3. If a value is not visible on these pages, use null. Never guess.
4. List every distinct block ID once, in the order it appears.
5. "kulturak" lists the crops declared for the target year; earlier years go to "tortenelmi_adatok".
6. Do not compute revenues or totals that are not printed.
7. Output ONLY the JSON object: no markdown fences, no commentary."#;

/// User-turn text accompanying the images of one batch.
pub fn batch_instruction(
    batch_index: usize,
    total_batches: usize,
    first_page: usize,
    image_count: usize,
) -> String {
    let last_page = first_page + image_count.saturating_sub(1);
    format!(
        "Batch {batch_index} of {total_batches}: pages {first_page}–{last_page} of the application. \
Extract every field visible on these pages; other batches cover the remaining pages."
    )
}
