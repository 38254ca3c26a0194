//! Test data builders.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use sync_core::{normalize, CanonicalRecord, RawRecord};

/// Fixed reference instant plus `secs` seconds.
pub fn at(secs: i64) -> DateTime<Utc> {
    let base = Utc
        .with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
        .single()
        .expect("valid fixture timestamp");
    base + Duration::seconds(secs)
}

/// Source row for `email` as the legacy application writes it.
pub fn raw_at(email: &str, updated_at: DateTime<Utc>) -> RawRecord {
    RawRecord {
        nom: "martin".into(),
        prenom: "SOPHIE".into(),
        email: email.into(),
        telephone: Some("06.12.34.56.78".into()),
        adresse: Some("3 place Bellecour".into()),
        ville: Some("lyon".into()),
        code_postal: Some("69002".into()),
        date_naissance: NaiveDate::from_ymd_opt(1990, 6, 15),
        statut: None,
        updated_at: Some(updated_at),
    }
}

/// `count` source rows modified within the last minute.
pub fn recent_raws(count: usize) -> Vec<RawRecord> {
    let now = Utc::now();
    (0..count)
        .map(|i| raw_at(&format!("Client{i}@Example.com"), now - Duration::seconds(30)))
        .collect()
}

/// The reference record from the source application's seed data.
pub fn dupont_raw(updated_at: DateTime<Utc>) -> RawRecord {
    RawRecord {
        nom: "dupont".into(),
        prenom: "JEAN".into(),
        email: "Jean.Dupont@X.com".into(),
        telephone: Some("01-23-45-67-89".into()),
        adresse: Some("12 rue de Rivoli".into()),
        ville: Some("paris".into()),
        code_postal: Some("75001".into()),
        date_naissance: NaiveDate::from_ymd_opt(1985, 4, 12),
        statut: None,
        updated_at: Some(updated_at),
    }
}

/// Canonical record with a given `nom`, for version-ordering tests.
pub fn canonical(
    email: &str,
    nom: &str,
    updated_at: Option<DateTime<Utc>>,
) -> CanonicalRecord {
    let mut record = normalize(RawRecord {
        nom: nom.into(),
        prenom: "test".into(),
        email: email.into(),
        updated_at,
        ..Default::default()
    });
    record.nom = nom.into();
    record
}

/// Valid body for `POST /v1/clients`.
pub fn client_payload(email: &str) -> Value {
    json!({
        "nom": "durand",
        "prenom": "CLAIRE",
        "email": email,
        "telephone": "0487654321",
        "ville": "marseille",
        "code_postal": "13001",
        "statut": "active"
    })
}
