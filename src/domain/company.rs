//! Legal companies standing behind merchants and service providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::CompanyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "text", rename_all = "snake_case")
)]
pub enum CompanyKind {
    ServiceProvider,
    Merchant,
}

/// Registration data, rewritten wholesale on recommit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDetails {
    pub name: String,
    pub country: String,
    pub city: String,
    pub address: String,
    pub email: String,
    pub description: String,
    pub social_credit_code: String,
    pub legal_person_name: String,
    pub legal_person_card_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub kind: CompanyKind,
    pub details: CompanyDetails,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn create(kind: CompanyKind, details: CompanyDetails, now: DateTime<Utc>) -> Self {
        Self {
            id: CompanyId::new(),
            kind,
            details,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
