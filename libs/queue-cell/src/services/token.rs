use chrono::NaiveDate;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use crate::error::QueueError;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "QUEUE";
const SIGNATURE_BYTES: usize = 8;

/// Decoded contents of a check-in token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedToken {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

/// Issues and verifies `QUEUE-<signature>-<doctor>-<YYYYMMDD>` tokens.
///
/// The signature is a truncated HMAC-SHA256 of `doctor:date`, hex encoded so
/// the token keeps exactly four dash-separated parts. Doctor ids use the
/// dash-free UUID form for the same reason.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    pub fn issue(&self, doctor_id: Uuid, date: NaiveDate) -> Result<String, QueueError> {
        let signature = self.mac(doctor_id, date)?.finalize().into_bytes();
        let opaque = hex::encode(&signature[..SIGNATURE_BYTES]);
        Ok(format!(
            "{}-{}-{}-{}",
            PREFIX,
            opaque,
            doctor_id.simple(),
            date.format("%Y%m%d")
        ))
    }

    /// Checks shape and signature. Date freshness is the caller's concern.
    pub fn parse(&self, token: &str) -> Result<ScannedToken, QueueError> {
        let parts: Vec<&str> = token.trim().split('-').collect();
        let [prefix, opaque, doctor, date] = parts.as_slice() else {
            debug!("Check-in token has {} parts", parts.len());
            return Err(QueueError::InvalidToken);
        };
        if *prefix != PREFIX {
            return Err(QueueError::InvalidToken);
        }

        let doctor_id = Uuid::try_parse(doctor).map_err(|_| QueueError::InvalidToken)?;
        let date =
            NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| QueueError::InvalidToken)?;
        let signature = hex::decode(opaque).map_err(|_| QueueError::InvalidToken)?;
        if signature.len() != SIGNATURE_BYTES {
            return Err(QueueError::InvalidToken);
        }

        self.mac(doctor_id, date)?
            .verify_truncated_left(&signature)
            .map_err(|_| {
                debug!("Check-in token signature mismatch for doctor {}", doctor_id);
                QueueError::InvalidToken
            })?;

        Ok(ScannedToken { doctor_id, date })
    }

    fn mac(&self, doctor_id: Uuid, date: NaiveDate) -> Result<HmacSha256, QueueError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| QueueError::SigningKey)?;
        mac.update(format!("{}:{}", doctor_id.simple(), date).as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    #[test]
    fn issued_token_has_four_parts_and_parses_back() {
        let issuer = TokenIssuer::new("secret");
        let doctor = Uuid::new_v4();
        let token = issuer.issue(doctor, day()).unwrap();

        assert!(token.starts_with("QUEUE-"));
        assert!(token.ends_with("-20250303"));
        assert_eq!(token.split('-').count(), 4);
        assert_eq!(
            issuer.parse(&token).unwrap(),
            ScannedToken { doctor_id: doctor, date: day() }
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let issuer = TokenIssuer::new("secret");
        for token in [
            "",
            "QUEUE",
            "QUEUE-abc-def",
            "TICKET-0011223344556677-00000000000000000000000000000000-20250303",
            "QUEUE-0011223344556677-not-a-uuid-20250303",
            "QUEUE-0011223344556677-00000000000000000000000000000000-2025033",
        ] {
            assert_matches!(issuer.parse(token), Err(QueueError::InvalidToken), "{}", token);
        }
    }

    #[test]
    fn signature_segment_must_be_hex_of_the_right_width() {
        let issuer = TokenIssuer::new("secret");
        let doctor = Uuid::new_v4();
        let token = issuer.issue(doctor, day()).unwrap();
        let opaque = token.split('-').nth(1).unwrap().to_string();
        assert_eq!(opaque.len(), SIGNATURE_BYTES * 2);

        for bad in ["zz".repeat(SIGNATURE_BYTES), opaque[..opaque.len() - 1].to_string(), opaque[..4].to_string()] {
            let forged = token.replacen(&opaque, &bad, 1);
            assert_matches!(issuer.parse(&forged), Err(QueueError::InvalidToken), "{}", forged);
        }
    }

    #[test]
    fn tampered_date_fails_signature() {
        let issuer = TokenIssuer::new("secret");
        let token = issuer.issue(Uuid::new_v4(), day()).unwrap();
        let forged = token.replace("20250303", "20250304");
        assert_matches!(issuer.parse(&forged), Err(QueueError::InvalidToken));
    }

    #[test]
    fn other_secret_cannot_forge() {
        let token = TokenIssuer::new("other").issue(Uuid::new_v4(), day()).unwrap();
        assert_matches!(TokenIssuer::new("secret").parse(&token), Err(QueueError::InvalidToken));
    }
}
