//! Caller identity and role checks.
//!
//! A request is made on behalf of a [`Caller`], resolved from a bearer token.
//! Record operations never take a raw caller: they take one of the access
//! capabilities below, which can only be obtained through the matching
//! `require_*` check.
//!
//! Tokens are JWT-shaped (`header.claims.signature`, base64url without
//! padding) and signed with HMAC-SHA256.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => f.write_str("patient"),
            Role::Doctor => f.write_str("doctor"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum AuthError {
    #[error("Not Authorized Login Again")]
    MissingToken,

    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("This action requires the {required} role")]
    Forbidden { required: Role, actual: Role },
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Patient, doctor or admin ID
    pub subject: String,
    pub role: Role,
}

/// Proof that the caller is a patient.
#[derive(Debug, Clone)]
pub struct PatientAccess {
    patient_id: String,
}

impl PatientAccess {
    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }
}

/// Proof that the caller is a doctor.
#[derive(Debug, Clone)]
pub struct DoctorAccess {
    doctor_id: String,
}

impl DoctorAccess {
    pub fn doctor_id(&self) -> &str {
        &self.doctor_id
    }
}

/// Proof that the caller is an admin.
#[derive(Debug, Clone)]
pub struct AdminAccess {
    _private: (),
}

impl Caller {
    pub fn new(subject: impl Into<String>, role: Role) -> Self {
        Self {
            subject: subject.into(),
            role,
        }
    }

    pub fn require_patient(&self) -> Result<PatientAccess, AuthError> {
        self.require(Role::Patient)?;
        Ok(PatientAccess {
            patient_id: self.subject.clone(),
        })
    }

    pub fn require_doctor(&self) -> Result<DoctorAccess, AuthError> {
        self.require(Role::Doctor)?;
        Ok(DoctorAccess {
            doctor_id: self.subject.clone(),
        })
    }

    pub fn require_admin(&self) -> Result<AdminAccess, AuthError> {
        self.require(Role::Admin)?;
        Ok(AdminAccess { _private: () })
    }

    fn require(&self, required: Role) -> Result<(), AuthError> {
        if self.role == required {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                required,
                actual: self.role,
            })
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: Role,
    /// Issued at, unix seconds
    pub iat: i64,
    /// Expires at, unix seconds
    pub exp: i64,
}

#[derive(Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Issues and verifies bearer tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Issue a token for `subject` valid for `ttl` from `issued_at`.
    pub fn issue(&self, subject: &str, role: Role, issued_at: DateTime<Utc>, ttl: Duration) -> String {
        let claims = TokenClaims {
            sub: subject.to_string(),
            role,
            iat: issued_at.timestamp(),
            exp: issued_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
                .timestamp(),
        };
        let header = TokenHeader {
            alg: "HS256".into(),
            typ: "JWT".into(),
        };

        // Serializing these plain structs cannot fail.
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap_or_default());
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap_or_default());
        let message = format!("{}.{}", header_b64, claims_b64);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(message.as_bytes()).finalize().into_bytes());

        format!("{}.{}", message, signature)
    }

    /// Check signature and expiry, and resolve the caller.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Caller, AuthError> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header_b64, claims_b64, signature_b64] = parts[..] else {
            return Err(AuthError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::Malformed)?;
        let message = format!("{}.{}", header_b64, claims_b64);
        self.mac(message.as_bytes())
            .verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| AuthError::Malformed)?;
        let claims: TokenClaims =
            serde_json::from_slice(&claims_json).map_err(|_| AuthError::Malformed)?;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(Caller::new(claims.sub, claims.role))
    }

    fn mac(&self, message: &[u8]) -> HmacSha256 {
        // HMAC accepts keys of any length.
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(message);
        mac
    }
}
