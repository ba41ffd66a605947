//! Raw persisted record to [`Cultivar`].
//!
//! Mapping never fails: absent fields get defaults, legacy fields are
//! upgraded, malformed values are dropped. Mapping an already normalized
//! record yields the same entity.

use super::models::*;
use super::timestamp::{format_timestamp, normalize_timestamp, parse_timestamp};
use serde_json::{Map, Value};

/// Lenient number read: numbers and numeric strings.
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn objects(value: Option<&Value>) -> impl Iterator<Item = &Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn range(value: Option<&Value>) -> Range {
    match value {
        Some(Value::Object(obj)) => Range::new(number(obj.get("min")), number(obj.get("max"))),
        _ => Range::default(),
    }
}

const CANNABINOID_FIELDS: &[&str] = &["thc", "cbd", "cbc", "cbg", "cbn", "thcv"];

/// The legacy key that `field` supersedes once it is written in its current
/// shape.
pub fn superseded_legacy_field(field: &str) -> Option<String> {
    match field {
        "images" => Some("imageUrl".to_string()),
        f if CANNABINOID_FIELDS.contains(&f) => Some(format!("{}Level", f)),
        _ => None,
    }
}

/// A cannabinoid range, falling back to the legacy scalar `{name}Level`.
fn cannabinoid(raw: &Map<String, Value>, field: &str) -> Range {
    if let Some(value @ Value::Object(_)) = raw.get(field) {
        return range(Some(value));
    }
    match number(raw.get(&format!("{}Level", field))) {
        Some(level) => Range::new(Some(level), Some(level)),
        None => Range::default(),
    }
}

fn pricing(value: Option<&Value>) -> Pricing {
    match value {
        Some(Value::Object(obj)) => Pricing {
            min: number(obj.get("min")),
            max: number(obj.get("max")),
            avg: number(obj.get("avg")),
        },
        _ => Pricing::default(),
    }
}

fn plant_characteristics(value: Option<&Value>) -> PlantCharacteristics {
    let Some(Value::Object(obj)) = value else {
        return PlantCharacteristics::default();
    };
    PlantCharacteristics {
        height: range(obj.get("height")),
        moisture: range(obj.get("moisture")),
        yield_per_plant: range(obj.get("yieldPerPlant")),
        yield_per_watt: range(obj.get("yieldPerWatt")),
        yield_per_m2: range(obj.get("yieldPerM2")),
    }
}

fn terpenes(value: Option<&Value>) -> Vec<Terpene> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| match item {
            Value::String(name) => Some(Terpene {
                name: name.clone(),
                percentage: None,
                description: None,
            }),
            Value::Object(obj) => {
                let name = string(obj.get("name"));
                if name.trim().is_empty() {
                    return None;
                }
                Some(Terpene {
                    name,
                    percentage: number(obj.get("percentage")),
                    description: optional_string(obj.get("description")),
                })
            }
            _ => None,
        })
        .collect()
}

fn images(raw: &Map<String, Value>, name: &str) -> Vec<CultivarImage> {
    if raw.get("images").is_none() {
        // Legacy single image.
        return match raw.get("imageUrl").and_then(Value::as_str) {
            Some(url) if !url.trim().is_empty() => vec![CultivarImage {
                id: "legacy-image".to_string(),
                url: url.to_string(),
                alt: name.to_string(),
                data_ai_hint: None,
            }],
            _ => Vec::new(),
        };
    }
    objects(raw.get("images"))
        .enumerate()
        .filter_map(|(i, obj)| {
            let url = string(obj.get("url"));
            if url.is_empty() {
                return None;
            }
            let id = optional_string(obj.get("id")).unwrap_or_else(|| format!("image-{}", i));
            Some(CultivarImage {
                id,
                url,
                alt: string(obj.get("alt")),
                data_ai_hint: optional_string(obj.get("dataAiHint")),
            })
        })
        .collect()
}

fn additional_info(value: Option<&Value>) -> AdditionalInfo {
    let mut info = AdditionalInfo::default();
    let Some(Value::Object(obj)) = value else {
        return info;
    };
    for category in InfoCategory::ALL {
        let files = objects(obj.get(category.as_str()))
            .enumerate()
            .filter_map(|(i, file)| {
                let url = string(file.get("url"));
                if url.is_empty() {
                    return None;
                }
                Some(AdditionalFile {
                    id: optional_string(file.get("id"))
                        .unwrap_or_else(|| format!("{}-{}", category.as_str(), i)),
                    name: string(file.get("name")),
                    url,
                    file_type: string(file.get("fileType")),
                    category,
                })
            })
            .collect();
        *info.files_mut(category) = files;
    }
    info
}

fn reviews(value: Option<&Value>) -> Vec<Review> {
    objects(value)
        .enumerate()
        .map(|(i, obj)| Review {
            id: optional_string(obj.get("id")).unwrap_or_else(|| format!("review-{}", i)),
            author: string(obj.get("author")),
            rating: number(obj.get("rating"))
                .map(|r| r.round().clamp(1.0, 5.0) as u8)
                .unwrap_or(1),
            text: string(obj.get("text")),
            sentiment_score: number(obj.get("sentimentScore")),
            created_at: normalize_timestamp(obj.get("createdAt")),
        })
        .collect()
}

/// History timestamps: strings are kept verbatim, other representations are
/// converted when parsable.
fn history_timestamp(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => parse_timestamp(other)
            .map(format_timestamp)
            .unwrap_or_default(),
        None => String::new(),
    }
}

fn history(value: Option<&Value>) -> Vec<HistoryEntry> {
    objects(value)
        .map(|obj| HistoryEntry {
            timestamp: history_timestamp(obj.get("timestamp")),
            event: optional_string(obj.get("event")).unwrap_or_default(),
            user_id: optional_string(obj.get("userId")).filter(|id| !id.is_empty()),
            details: obj
                .get("details")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
        .collect()
}

/// Parse the editable part of a record.
pub fn map_profile(raw: &Map<String, Value>) -> CultivarProfile {
    let name = string(raw.get("name"));
    CultivarProfile {
        genetics: raw.get("genetics").and_then(Value::as_str).and_then(Genetics::parse),
        status: raw
            .get("status")
            .and_then(Value::as_str)
            .and_then(CultivarStatus::parse)
            .unwrap_or_default(),
        description: string(raw.get("description")),
        source: string(raw.get("source")),
        supplier_url: string(raw.get("supplierUrl")),
        thc: cannabinoid(raw, "thc"),
        cbd: cannabinoid(raw, "cbd"),
        cbc: cannabinoid(raw, "cbc"),
        cbg: cannabinoid(raw, "cbg"),
        cbn: cannabinoid(raw, "cbn"),
        thcv: cannabinoid(raw, "thcv"),
        plant_characteristics: plant_characteristics(raw.get("plantCharacteristics")),
        pricing: pricing(raw.get("pricing")),
        effects: string_list(raw.get("effects")),
        medical_effects: string_list(raw.get("medicalEffects")),
        flavors: string_list(raw.get("flavors")),
        terpene_profile: terpenes(raw.get("terpeneProfile")),
        images: images(raw, &name),
        additional_info: additional_info(raw.get("additionalInfo")),
        parents: string_list(raw.get("parents")),
        children: string_list(raw.get("children")),
        name,
    }
}

/// Map a persisted record to a [`Cultivar`].
pub fn map_to_entity(id: &str, raw: &Map<String, Value>) -> Cultivar {
    Cultivar {
        id: id.to_string(),
        profile: map_profile(raw),
        reviews: reviews(raw.get("reviews")),
        history: history(raw.get("history")),
        created_at: normalize_timestamp(raw.get("createdAt")),
        updated_at: normalize_timestamp(raw.get("updatedAt")),
    }
}
