//! Response parsing: find the JSON record embedded in a model reply.
//!
//! Replies are free text that should contain one JSON object, but models wrap
//! it in fences, prepend commentary, or fall back to an older key layout.
//! Parsing therefore runs an ordered chain of schema strategies over every
//! top-level JSON object found in the text:
//!
//! 1. [`SchemaKind::Native`]: Hungarian keys, anchored on the
//!    `adminisztrativ_adatok` block, with nested area, crop and history data.
//! 2. [`SchemaKind::Legacy`]: flat camelCase keys (`applicantName`, …).
//!
//! The first strategy that both matches and maps wins. Results from two
//! schemas are never combined in one parse. If nothing matches, one repair
//! pass strips trailing commas and the chain runs again. A reply with no
//! usable object yields `None`, never an error.

use crate::record::{Culture, CropYearRecord, ExtractionFieldSet, Slot};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

type Object = Map<String, Value>;

/// Which response layout a record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    Native,
    Legacy,
}

/// A successfully parsed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub schema: SchemaKind,
    pub record: ExtractionFieldSet,
}

/// Parse a raw model reply into a record, or `None` if no schema matches.
pub fn parse_response(raw: &str) -> Option<ParsedResponse> {
    if let Some(parsed) = run_strategies(&embedded_objects(raw)) {
        return Some(parsed);
    }

    let repaired = RE_TRAILING_COMMA.replace_all(raw, "$1");
    if repaired != raw {
        debug!("Retrying parse after trailing-comma repair");
        return run_strategies(&embedded_objects(&repaired));
    }
    None
}

fn run_strategies(objects: &[Object]) -> Option<ParsedResponse> {
    for strategy in STRATEGIES {
        for obj in objects.iter().filter(|o| strategy.matches(o)) {
            match strategy.map(obj) {
                Ok(record) => {
                    return Some(ParsedResponse {
                        schema: strategy.kind(),
                        record,
                    })
                }
                Err(reason) => debug!("{:?} schema rejected object: {}", strategy.kind(), reason),
            }
        }
    }
    None
}

/// Every top-level JSON object in `text`, in order of appearance.
fn embedded_objects(text: &str) -> Vec<Object> {
    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find('{') {
        let start = cursor + offset;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => {
                cursor = start + stream.byte_offset();
                out.push(map);
            }
            _ => cursor = start + 1,
        }
    }
    out
}

static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

// ── Strategy chain ───────────────────────────────────────────────────────

trait SchemaStrategy {
    fn kind(&self) -> SchemaKind;
    fn matches(&self, obj: &Object) -> bool;
    fn map(&self, obj: &Object) -> Result<ExtractionFieldSet, String>;
}

const STRATEGIES: &[&dyn SchemaStrategy] = &[&NativeSchema, &LegacySchema];

// ── Schema A: native Hungarian layout ────────────────────────────────────

const ADMIN_KEYS: &[&str] = &["adminisztrativ_adatok", "adminisztratív_adatok"];
const AREA_KEYS: &[&str] = &["terulet_adatok", "területi_adatok", "teruleti_adatok"];
const CULTURE_KEYS: &[&str] = &[
    "kulturak",
    "kultúrák",
    "novenykulturak",
    "növénykultúrák",
    "cultures",
];
const HISTORY_KEYS: &[&str] = &["tortenelmi_adatok", "történeti_adatok", "torteneti_adatok"];

struct NativeSchema;

impl SchemaStrategy for NativeSchema {
    fn kind(&self) -> SchemaKind {
        SchemaKind::Native
    }

    fn matches(&self, obj: &Object) -> bool {
        ADMIN_KEYS.iter().any(|k| obj.contains_key(*k))
    }

    fn map(&self, obj: &Object) -> Result<ExtractionFieldSet, String> {
        let admin = lookup(obj, ADMIN_KEYS)
            .and_then(Value::as_object)
            .ok_or("administrative block is not an object")?;

        let mut rec = ExtractionFieldSet {
            applicant_name: text(lookup(
                admin,
                &["kerelmezo_neve", "kérelmező_neve", "ugyfel_neve", "ügyfél_neve", "nev", "név"],
            )),
            submitter_id: text(lookup(
                admin,
                &["bekuldo_azonosito", "beküldő_azonosító", "bekuldo_ugyfel_azonosito"],
            )),
            applicant_id: text(lookup(
                admin,
                &["ugyfel_azonosito", "ügyfél_azonosító", "kerelmezo_azonosito"],
            )),
            document_id: text(lookup(
                admin,
                &["iratazonosito", "iratazonosító", "dokumentum_azonosito", "iktatoszam"],
            )),
            submission_date: text(lookup(admin, &["beadas_datuma", "beadás_dátuma", "datum"])),
            region: text(lookup(admin, &["regio", "régió", "megye"])),
            target_year: year(lookup(admin, &["targyev", "tárgyév", "ev", "év"])),
            ..Default::default()
        };

        if let Some(area) = lookup(obj, AREA_KEYS) {
            let area = area.as_object().ok_or("area block is not an object")?;
            rec.hectares = area_value(lookup(
                area,
                &["osszes_terulet_ha", "összes_terület_ha", "osszes_terulet", "terulet_ha"],
            ));
            rec.block_ids = string_list(lookup(area, &["blokkazonositok", "blokkazonosítók"]))?;
        }
        if rec.block_ids.is_empty() {
            rec.block_ids = string_list(lookup(obj, &["blokkazonositok", "blokkazonosítók"]))?;
        }

        rec.cultures = cultures(lookup(obj, CULTURE_KEYS))?;
        rec.crop_history = history(lookup(obj, HISTORY_KEYS))?;

        if rec.cultures.is_empty() && !rec.crop_history.is_empty() {
            let target = rec
                .target_year
                .known()
                .copied()
                .filter(|y| rec.crop_history.iter().any(|r| r.year == *y))
                .or_else(|| rec.crop_history.iter().map(|r| r.year).max());
            if let Some(y) = target {
                rec.cultures = rec
                    .crop_history
                    .iter()
                    .filter(|r| r.year == y)
                    .map(|r| Culture {
                        name: r.culture.clone(),
                        hectares: r.hectares.clone(),
                        ..Default::default()
                    })
                    .collect();
            }
        }

        Ok(rec)
    }
}

// ── Schema B: legacy flat layout ─────────────────────────────────────────

const LEGACY_ANCHOR: &str = "applicantName";
const LEGACY_KEYS: &[&str] = &[
    "submitterId",
    "applicantId",
    "documentId",
    "region",
    "hectares",
    "cultures",
    "blockIds",
];

struct LegacySchema;

impl SchemaStrategy for LegacySchema {
    fn kind(&self) -> SchemaKind {
        SchemaKind::Legacy
    }

    /// The anchor key alone, or at least two other legacy keys. A single
    /// shared key such as `hectares` also appears in nested crop objects.
    fn matches(&self, obj: &Object) -> bool {
        obj.contains_key(LEGACY_ANCHOR)
            || LEGACY_KEYS.iter().filter(|k| obj.contains_key(**k)).count() >= 2
    }

    fn map(&self, obj: &Object) -> Result<ExtractionFieldSet, String> {
        Ok(ExtractionFieldSet {
            applicant_name: text(obj.get(LEGACY_ANCHOR)),
            submitter_id: text(obj.get("submitterId")),
            applicant_id: text(obj.get("applicantId")),
            document_id: text(obj.get("documentId")),
            submission_date: text(obj.get("submissionDate")),
            region: text(obj.get("region")),
            target_year: year(lookup(obj, &["targetYear", "year"])),
            hectares: area_value(lookup(obj, &["hectares", "totalHectares"])),
            cultures: cultures(obj.get("cultures"))?,
            block_ids: string_list(obj.get("blockIds"))?,
            ..Default::default()
        })
    }
}

// ── Lenient value helpers ────────────────────────────────────────────────

/// Values the model uses for "not visible on these pages".
const PLACEHOLDERS: &[&str] = &[
    "ismeretlen",
    "nem elérhető",
    "nem elerheto",
    "nincs adat",
    "nincs",
    "n/a",
    "na",
    "null",
    "none",
    "unknown",
    "-",
    "–",
    "?",
];

fn is_placeholder(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    PLACEHOLDERS.contains(&lower.as_str())
}

/// First non-null value under any of `keys`.
fn lookup<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn text(v: Option<&Value>) -> Slot<String> {
    match v {
        Some(Value::String(s)) if is_placeholder(s) => Slot::NotAvailable,
        Some(Value::String(s)) => Slot::Known(s.trim().to_string()),
        Some(Value::Number(n)) => Slot::Known(n.to_string()),
        _ => Slot::NotAvailable,
    }
}

static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:[.,]\d+)?").unwrap());
static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:19|20)\d{2}").unwrap());

/// Accepts JSON numbers and strings like `"50,5 ha"` or `"1 234.5"`.
fn number(v: Option<&Value>) -> Slot<f64> {
    match v {
        Some(Value::Number(n)) => n.as_f64().into(),
        Some(Value::String(s)) if is_placeholder(s) => Slot::NotAvailable,
        Some(Value::String(s)) => {
            let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
            RE_NUMBER
                .find(&compact)
                .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
                .into()
        }
        _ => Slot::NotAvailable,
    }
}

/// Areas above this are misreads (larger than the country) and are dropped.
const MAX_AREA_HECTARES: f64 = 10_000_000.0;

fn area_value(v: Option<&Value>) -> Slot<f64> {
    match number(v) {
        Slot::Known(ha) if ha > MAX_AREA_HECTARES => Slot::NotAvailable,
        other => other,
    }
}

fn year(v: Option<&Value>) -> Slot<i32> {
    let y = match v {
        Some(Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(Value::String(s)) => RE_YEAR.find(s).and_then(|m| m.as_str().parse().ok()),
        _ => None,
    };
    y.filter(|y| (1900..=2200).contains(y)).into()
}

/// Array of strings, or one delimited string. Deduplicated, order kept.
fn string_list(v: Option<&Value>) -> Result<Vec<String>, String> {
    let items: Vec<String> = match v {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| text(Some(i)).into_option())
            .collect(),
        Some(Value::String(s)) => s
            .split([',', ';', '\n'])
            .filter_map(|part| text(Some(&Value::String(part.to_string()))).into_option())
            .collect(),
        Some(other) => return Err(format!("expected a list of strings, got {other}")),
    };

    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    Ok(out)
}

const NAME_KEYS: &[&str] = &["nev", "név", "kultura", "kultúra", "name"];
const HECTARE_KEYS: &[&str] = &["terulet_ha", "terület_ha", "terulet", "hectares", "area"];
const YIELD_KEYS: &[&str] = &["termesatlag_t_ha", "termésátlag_t_ha", "termesatlag", "yield"];

fn culture_name(v: &Value) -> Option<String> {
    let name = match v {
        Value::Object(o) => text(lookup(o, NAME_KEYS)).into_option(),
        Value::String(_) => text(Some(v)).into_option(),
        _ => None,
    };
    name.filter(|n| !n.is_empty())
}

fn cultures(v: Option<&Value>) -> Result<Vec<Culture>, String> {
    let items = match v {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => return Err(format!("expected a culture list, got {other}")),
    };

    let mut out: Vec<Culture> = Vec::with_capacity(items.len());
    for item in items {
        let Some(name) = culture_name(item) else { continue };
        if out.iter().any(|c| c.name == name) {
            continue;
        }
        let hectares = match item {
            Value::Object(o) => area_value(lookup(o, HECTARE_KEYS)),
            _ => Slot::NotAvailable,
        };
        out.push(Culture {
            name,
            hectares,
            ..Default::default()
        });
    }
    Ok(out)
}

/// Flatten per-year crop tables into one row per (year, culture).
///
/// Accepts `[{"ev": 2023, "kulturak": [...]}]`, flat rows
/// `[{"ev": 2023, "nev": "Búza", ...}]`, or `{"2023": [...]}`.
fn history(v: Option<&Value>) -> Result<Vec<CropYearRecord>, String> {
    let mut rows: Vec<CropYearRecord> = Vec::new();
    match v {
        None => {}
        Some(Value::Array(entries)) => {
            for entry in entries {
                let Some(o) = entry.as_object() else { continue };
                let Some(y) = year(lookup(o, &["ev", "év", "year"])).into_option() else {
                    continue;
                };
                match lookup(o, CULTURE_KEYS) {
                    Some(crops) => push_year_rows(&mut rows, y, crops),
                    None => push_year_rows(&mut rows, y, &Value::Array(vec![entry.clone()])),
                }
            }
        }
        Some(Value::Object(by_year)) => {
            for (key, crops) in by_year {
                let Some(y) = year(Some(&Value::String(key.clone()))).into_option() else {
                    continue;
                };
                let crops = match crops {
                    Value::Object(o) => lookup(o, CULTURE_KEYS),
                    other => Some(other),
                };
                if let Some(crops) = crops {
                    push_year_rows(&mut rows, y, crops);
                }
            }
        }
        Some(other) => return Err(format!("expected crop history, got {other}")),
    }
    Ok(rows)
}

fn push_year_rows(rows: &mut Vec<CropYearRecord>, year: i32, crops: &Value) {
    let Some(items) = crops.as_array() else { return };
    for item in items {
        let Some(culture) = culture_name(item) else { continue };
        if rows.iter().any(|r| r.year == year && r.culture == culture) {
            continue;
        }
        let (hectares, yield_per_hectare) = match item {
            Value::Object(o) => (
                area_value(lookup(o, HECTARE_KEYS)),
                number(lookup(o, YIELD_KEYS)),
            ),
            _ => (Slot::NotAvailable, Slot::NotAvailable),
        };
        rows.push(CropYearRecord {
            year,
            culture,
            hectares,
            yield_per_hectare,
        });
    }
}
