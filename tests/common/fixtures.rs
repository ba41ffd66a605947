//! Test fixtures: users and seed records
//!
//! The seed mirrors what an exported catalog looks like, legacy fields
//! included, so the normalization path is exercised on every spawn.

use super::constants::*;
use cultivar_catalog_server::identity::UserIdentity;
use serde_json::{json, Map, Value};

/// Token table of the static identity provider.
pub fn test_users() -> Vec<(String, UserIdentity)> {
    vec![
        (
            ADMIN_TOKEN.to_string(),
            UserIdentity {
                id: ADMIN_ID.to_string(),
                email: Some(ADMIN_EMAIL.to_string()),
                display_name: Some("Admin".to_string()),
            },
        ),
        (
            EDITOR_TOKEN.to_string(),
            UserIdentity {
                id: EDITOR_ID.to_string(),
                email: None,
                display_name: Some(EDITOR_NAME.to_string()),
            },
        ),
    ]
}

fn as_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("Seed fixture must be an object"),
    }
}

/// Raw seed records. The last one has no name and is rejected.
pub fn seed_records() -> Vec<Map<String, Value>> {
    let records = vec![
        json!({
            "name": CULTIVAR_1_NAME,
            "genetics": "hybrid",
            "status": "Live",
            "description": "A balanced classic.",
            "thc": {"min": 17, "max": 24},
            "cbd": {"min": 0.1, "max": 0.2},
            "effects": ["Relaxed", "Happy"],
            "flavors": ["Berry"],
            "imageUrl": "https://img.example/blue-dream.png",
            "parents": ["Blueberry", "Haze"],
            "reviews": [{
                "author": "Old Timer",
                "rating": 5,
                "text": "Great.",
                "createdAt": "2023-05-02T09:00:00.000Z"
            }],
            "history": [{
                "timestamp": CULTIVAR_1_LEGACY_TIMESTAMP,
                "event": "Cultivar Created by Admin",
                "userId": "legacy-admin",
                "details": {"userEmail": "legacy@example.com"}
            }]
        }),
        json!({
            "name": CULTIVAR_2_NAME,
            "genetics": "Indica",
            "thcLevel": 18,
            "effects": ["Sleepy"]
        }),
        json!({
            "name": "   ",
            "genetics": "Sativa"
        }),
    ];
    records.into_iter().map(as_object).collect()
}
