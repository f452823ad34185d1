//! Human-readable order codes.

use core::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters used in the random suffix. Excludes 0/O and 1/I/L so the code
/// survives being read over the phone.
const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of the random suffix.
const SUFFIX_LEN: usize = 6;

/// A human-readable order identifier, distinct from the numeric order ID.
///
/// Format: `BK-YYYYMMDD-XXXXXX`, where the suffix is drawn from an
/// unambiguous alphanumeric charset. Codes are unique across all orders;
/// uniqueness is enforced by the database, and callers regenerate on
/// collision rather than failing the checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct OrderCode(String);

impl OrderCode {
    /// Generate a fresh order code for the given creation instant.
    #[must_use]
    pub fn generate(at: DateTime<Utc>) -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| {
                let idx = rng.random_range(0..SUFFIX_CHARSET.len());
                char::from(SUFFIX_CHARSET[idx])
            })
            .collect();

        Self(format!("BK-{}-{suffix}", at.format("%Y%m%d")))
    }

    /// Wrap an existing code read back from storage.
    #[must_use]
    pub fn from_string(code: String) -> Self {
        Self(code)
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OrderCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OrderCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_shape() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let code = OrderCode::generate(at);
        let s = code.as_str();

        assert!(s.starts_with("BK-20250314-"), "{s}");
        assert_eq!(s.len(), "BK-20250314-".len() + SUFFIX_LEN);

        let suffix = s.rsplit('-').next().unwrap();
        assert!(suffix.bytes().all(|b| SUFFIX_CHARSET.contains(&b)), "{s}");
    }

    #[test]
    fn test_generate_varies() {
        let at = Utc::now();
        let codes: std::collections::HashSet<String> = (0..32)
            .map(|_| OrderCode::generate(at).as_str().to_owned())
            .collect();
        // 31^6 possibilities; 32 draws colliding would point at a broken RNG
        assert!(codes.len() > 1);
    }

    #[test]
    fn test_serde_transparent() {
        let code = OrderCode::from_string("BK-20250314-ABCDEF".to_owned());
        assert_eq!(
            serde_json::to_string(&code).unwrap(),
            "\"BK-20250314-ABCDEF\""
        );
    }
}
