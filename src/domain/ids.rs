//! Identifier newtypes.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Deref for $name {
            type Target = Uuid;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

uuid_id!(
    /// Identifies an exhibition.
    ExhibitionId
);
uuid_id!(
    /// Identifies a merchant.
    MerchantId
);
uuid_id!(
    /// Identifies a service provider (exhibition organiser).
    ServiceProviderId
);
uuid_id!(
    /// Identifies the legal company behind a merchant or service provider.
    CompanyId
);

/// Compound identity of an exhibition application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationKey {
    pub exhibition_id: ExhibitionId,
    pub merchant_id: MerchantId,
}

impl ApplicationKey {
    pub fn new(exhibition_id: ExhibitionId, merchant_id: MerchantId) -> Self {
        Self {
            exhibition_id,
            merchant_id,
        }
    }
}

impl std::fmt::Display for ApplicationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.exhibition_id, self.merchant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_back_from_display() {
        let id = ExhibitionId::new();
        let parsed: ExhibitionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn application_key_shows_both_halves() {
        let key = ApplicationKey::new(ExhibitionId::new(), MerchantId::new());
        let shown = key.to_string();
        assert!(shown.starts_with(&key.exhibition_id.to_string()));
        assert!(shown.ends_with(&key.merchant_id.to_string()));
    }
}
