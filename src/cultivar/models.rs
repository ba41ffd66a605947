//! Cultivar catalog models.
//!
//! Field names serialize in camelCase, matching the persisted document shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// Enumerations
// =============================================================================

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Genetics {
    Sativa,
    Indica,
    Hybrid,
    Ruderalis,
}

impl Genetics {
    pub const ALL: [Genetics; 4] = [
        Genetics::Sativa,
        Genetics::Indica,
        Genetics::Hybrid,
        Genetics::Ruderalis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genetics::Sativa => "Sativa",
            Genetics::Indica => "Indica",
            Genetics::Hybrid => "Hybrid",
            Genetics::Ruderalis => "Ruderalis",
        }
    }

    /// Case-insensitive parse.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s))
    }
}

/// Lifecycle / visibility tag of a cultivar.
///
/// Any status may move to any other one: there is no transition graph.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CultivarStatus {
    #[default]
    #[serde(rename = "recentlyAdded")]
    RecentlyAdded,
    #[serde(rename = "verified")]
    Verified,
    #[serde(rename = "archived")]
    Archived,
    #[serde(rename = "Live")]
    Live,
    #[serde(rename = "featured")]
    Featured,
    #[serde(rename = "User Submitted")]
    UserSubmitted,
    #[serde(rename = "Hide")]
    Hide,
}

impl CultivarStatus {
    pub const ALL: [CultivarStatus; 7] = [
        CultivarStatus::RecentlyAdded,
        CultivarStatus::Verified,
        CultivarStatus::Archived,
        CultivarStatus::Live,
        CultivarStatus::Featured,
        CultivarStatus::UserSubmitted,
        CultivarStatus::Hide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CultivarStatus::RecentlyAdded => "recentlyAdded",
            CultivarStatus::Verified => "verified",
            CultivarStatus::Archived => "archived",
            CultivarStatus::Live => "Live",
            CultivarStatus::Featured => "featured",
            CultivarStatus::UserSubmitted => "User Submitted",
            CultivarStatus::Hide => "Hide",
        }
    }

    /// Exact match first, then case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|status| status.as_str().eq_ignore_ascii_case(s))
            })
    }
}

impl fmt::Display for CultivarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of an additional info file.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InfoCategory {
    GeneticCertificate,
    PlantPicture,
    CannabinoidInfo,
    TerpeneInfo,
}

impl InfoCategory {
    pub const ALL: [InfoCategory; 4] = [
        InfoCategory::GeneticCertificate,
        InfoCategory::PlantPicture,
        InfoCategory::CannabinoidInfo,
        InfoCategory::TerpeneInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InfoCategory::GeneticCertificate => "geneticCertificate",
            InfoCategory::PlantPicture => "plantPicture",
            InfoCategory::CannabinoidInfo => "cannabinoidInfo",
            InfoCategory::TerpeneInfo => "terpeneInfo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

// =============================================================================
// Profiles
// =============================================================================

/// A min/max range. Either bound may be unknown.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Range {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlantCharacteristics {
    pub height: Range,
    pub moisture: Range,
    pub yield_per_plant: Range,
    pub yield_per_watt: Range,
    pub yield_per_m2: Range,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Terpene {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CultivarImage {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_ai_hint: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalFile {
    pub id: String,
    pub name: String,
    pub url: String,
    pub file_type: String,
    pub category: InfoCategory,
}

/// Additional info files, grouped by category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdditionalInfo {
    pub genetic_certificate: Vec<AdditionalFile>,
    pub plant_picture: Vec<AdditionalFile>,
    pub cannabinoid_info: Vec<AdditionalFile>,
    pub terpene_info: Vec<AdditionalFile>,
}

impl AdditionalInfo {
    pub fn files(&self, category: InfoCategory) -> &Vec<AdditionalFile> {
        match category {
            InfoCategory::GeneticCertificate => &self.genetic_certificate,
            InfoCategory::PlantPicture => &self.plant_picture,
            InfoCategory::CannabinoidInfo => &self.cannabinoid_info,
            InfoCategory::TerpeneInfo => &self.terpene_info,
        }
    }

    pub fn files_mut(&mut self, category: InfoCategory) -> &mut Vec<AdditionalFile> {
        match category {
            InfoCategory::GeneticCertificate => &mut self.genetic_certificate,
            InfoCategory::PlantPicture => &mut self.plant_picture,
            InfoCategory::CannabinoidInfo => &mut self.cannabinoid_info,
            InfoCategory::TerpeneInfo => &mut self.terpene_info,
        }
    }
}

/// User review. Never edited after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub author: String,
    pub rating: u8,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
    pub created_at: String,
}

/// An audit record appended to a cultivar. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: String,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

// =============================================================================
// Cultivar
// =============================================================================

/// Field names of [`CultivarProfile`] as persisted, i.e. the fields a caller
/// may edit. Bookkeeping fields are not part of it.
pub const EDITABLE_FIELDS: &[&str] = &[
    "name",
    "genetics",
    "status",
    "description",
    "source",
    "supplierUrl",
    "thc",
    "cbd",
    "cbc",
    "cbg",
    "cbn",
    "thcv",
    "plantCharacteristics",
    "pricing",
    "effects",
    "medicalEffects",
    "flavors",
    "terpeneProfile",
    "images",
    "additionalInfo",
    "parents",
    "children",
];

/// The editable part of a cultivar.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CultivarProfile {
    pub name: String,
    pub genetics: Option<Genetics>,
    pub status: CultivarStatus,
    pub description: String,
    pub source: String,
    pub supplier_url: String,

    pub thc: Range,
    pub cbd: Range,
    pub cbc: Range,
    pub cbg: Range,
    pub cbn: Range,
    pub thcv: Range,

    pub plant_characteristics: PlantCharacteristics,
    pub pricing: Pricing,

    pub effects: Vec<String>,
    pub medical_effects: Vec<String>,
    pub flavors: Vec<String>,
    pub terpene_profile: Vec<Terpene>,
    pub images: Vec<CultivarImage>,
    pub additional_info: AdditionalInfo,

    /// Parent cultivar names. Weak references, never resolved.
    pub parents: Vec<String>,
    /// Child cultivar names. Weak references, never resolved.
    pub children: Vec<String>,
}

impl CultivarProfile {
    /// The persisted representation of every editable field.
    pub fn to_record(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct of plain data always serializes to an object.
            _ => Map::new(),
        }
    }

    pub fn cannabinoids(&self) -> [(&'static str, &Range); 6] {
        [
            ("thc", &self.thc),
            ("cbd", &self.cbd),
            ("cbc", &self.cbc),
            ("cbg", &self.cbg),
            ("cbn", &self.cbn),
            ("thcv", &self.thcv),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cultivar {
    pub id: String,
    #[serde(flatten)]
    pub profile: CultivarProfile,
    pub reviews: Vec<Review>,
    pub history: Vec<HistoryEntry>,
    pub created_at: String,
    pub updated_at: String,
}

impl Cultivar {
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn status(&self) -> CultivarStatus {
        self.profile.status
    }

    /// The full persisted representation, without the id.
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        record.remove("id");
        record
    }
}
