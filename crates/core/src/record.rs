//! Client record shapes: as read from the source, as normalized, as stored.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Status given to records that arrive without one.
pub const DEFAULT_STATUS: &str = "active";

/// Status of a disabled client.
pub const INACTIVE_STATUS: &str = "inactive";

/// A client row exactly as stored in the source database.
///
/// Casing and formatting are whatever the upstream application wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub nom: String,
    pub prenom: String,
    pub email: String,
    pub telephone: Option<String>,
    pub adresse: Option<String>,
    pub ville: Option<String>,
    pub code_postal: Option<String>,
    pub date_naissance: Option<NaiveDate>,
    pub statut: Option<String>,
    /// Last modification time at the source.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A normalized client record, keyed by lower-cased email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub nom: String,
    pub prenom: String,
    pub email: String,
    pub telephone: Option<String>,
    pub adresse: Option<String>,
    pub ville: Option<String>,
    pub code_postal: Option<String>,
    pub date_naissance: Option<NaiveDate>,
    pub statut: String,
    /// Source modification time, carried through to order same-email jobs.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A client row in the target store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: i64,
    pub nom: String,
    pub prenom: String,
    pub email: String,
    pub telephone: Option<String>,
    pub adresse: Option<String>,
    pub ville: Option<String>,
    pub code_postal: Option<String>,
    pub date_naissance: Option<NaiveDate>,
    pub statut: String,
    /// Version of the last job applied to this row.
    pub source_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Tombstone. Set by delete jobs, cleared by a newer upsert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TargetRecord {
    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Client payload accepted by the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientInput {
    #[validate(length(min = 1, max = 255))]
    pub nom: String,
    #[validate(length(min = 1, max = 255))]
    pub prenom: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 20))]
    pub telephone: Option<String>,
    #[validate(length(max = 500))]
    pub adresse: Option<String>,
    #[validate(length(max = 100))]
    pub ville: Option<String>,
    #[validate(length(max = 10))]
    pub code_postal: Option<String>,
    pub date_naissance: Option<NaiveDate>,
    #[validate(custom(function = "validate_status"))]
    pub statut: Option<String>,
}

fn validate_status(statut: &str) -> Result<(), ValidationError> {
    match statut {
        DEFAULT_STATUS | INACTIVE_STATUS => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_status");
            err.message = Some(format!("statut must be '{DEFAULT_STATUS}' or '{INACTIVE_STATUS}'").into());
            Err(err)
        }
    }
}

impl ClientInput {
    /// Converts the request into a raw record stamped with `at`.
    pub fn into_raw(self, at: DateTime<Utc>) -> RawRecord {
        RawRecord {
            nom: self.nom,
            prenom: self.prenom,
            email: self.email,
            telephone: self.telephone,
            adresse: self.adresse,
            ville: self.ville,
            code_postal: self.code_postal,
            date_naissance: self.date_naissance,
            statut: self.statut,
            updated_at: Some(at),
        }
    }
}

/// Partial client payload for updates. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ClientUpdate {
    #[validate(length(min = 1, max = 255))]
    pub nom: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub prenom: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub telephone: Option<String>,
    #[validate(length(max = 500))]
    pub adresse: Option<String>,
    #[validate(length(max = 100))]
    pub ville: Option<String>,
    #[validate(length(max = 10))]
    pub code_postal: Option<String>,
    pub date_naissance: Option<NaiveDate>,
    #[validate(custom(function = "validate_status"))]
    pub statut: Option<String>,
}

impl ClientUpdate {
    /// Overlays the provided fields on `current`, stamped with `at`.
    pub fn merge_into(self, current: TargetRecord, at: DateTime<Utc>) -> RawRecord {
        RawRecord {
            nom: self.nom.unwrap_or(current.nom),
            prenom: self.prenom.unwrap_or(current.prenom),
            email: self.email.unwrap_or(current.email),
            telephone: self.telephone.or(current.telephone),
            adresse: self.adresse.or(current.adresse),
            ville: self.ville.or(current.ville),
            code_postal: self.code_postal.or(current.code_postal),
            date_naissance: self.date_naissance.or(current.date_naissance),
            statut: Some(self.statut.unwrap_or(current.statut)),
            updated_at: Some(at),
        }
    }
}

/// Aggregate counts over the target store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub recent_24h: u64,
    pub tombstoned: u64,
}

/// Listing filter and paging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientQuery {
    pub statut: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl ClientQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

/// One page of clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPage {
    pub data: Vec<TargetRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}
