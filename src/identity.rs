//! Identity provider: sign-up, sign-in, sign-out and session resolution.
//!
//! Sign-up writes the identity, its profile and its role grant in a single
//! transaction, so an identity never exists without a profile. Session
//! tokens are kept in memory as SHA-256 digests only.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::{authorize, AuthorizationError, Operation};
use crate::crypto::{self, generate_token, hash_token, CryptoError, PasswordHash};
use crate::db::repository::{
    delete_identity, get_identity_by_email, get_profile, insert_identity, insert_profile,
    insert_role_grant, IdentityRecord,
};
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::{Identity, Profile, RoleGrant};
use crate::validation::{self, ValidationError};

/// Sign-up request.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
}

/// Issued on successful sign-in. The token is only ever shown here.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub identity_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    identity_id: Uuid,
    issued_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Identity has no profile")]
    ProfileMissing,
    #[error("Profile insert denied by policy")]
    PolicyDenied,
    #[error("Session store lock poisoned")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),
    #[error("Credential error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Sign-up that passed validation and already carries its password hash.
///
/// Built off the connection lock by [`IdentityProvider::prepare_sign_up`].
pub struct PendingSignUp {
    email: String,
    display_name: String,
    role: Role,
    password: PasswordHash,
}

/// Credentials read for a sign-in attempt, awaiting password verification.
///
/// An unknown email carries the provider's decoy hash, so verification
/// costs the same single derivation either way.
pub struct PendingSignIn {
    subject: Option<(Uuid, Option<Role>)>,
    stored: PasswordHash,
}

/// Local identity provider.
pub struct IdentityProvider {
    sessions: RwLock<HashMap<[u8; 32], SessionEntry>>,
    password_min_len: usize,
    pbkdf2_iterations: u32,
    decoy: PasswordHash,
}

impl IdentityProvider {
    pub fn new(password_min_len: usize, pbkdf2_iterations: u32) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            password_min_len,
            pbkdf2_iterations,
            decoy: crypto::hash_password(&generate_token(), pbkdf2_iterations),
        }
    }

    /// Create identity + profile + role grant atomically.
    pub fn sign_up(&self, conn: &mut Connection, req: &SignUp) -> Result<Identity, IdentityError> {
        let pending = self.prepare_sign_up(req)?;
        self.commit_sign_up(conn, pending)
    }

    /// Validate the request and derive the password hash. Needs no connection.
    pub fn prepare_sign_up(&self, req: &SignUp) -> Result<PendingSignUp, IdentityError> {
        validation::validate_email(&req.email)?;
        validation::validate_password(&req.password, self.password_min_len)?;
        validation::validate_display_name(&req.display_name)?;

        Ok(PendingSignUp {
            email: normalize_email(&req.email),
            display_name: req.display_name.trim().to_string(),
            role: req.role,
            password: crypto::hash_password(&req.password, self.pbkdf2_iterations),
        })
    }

    /// Write a prepared sign-up in one transaction.
    pub fn commit_sign_up(
        &self,
        conn: &mut Connection,
        pending: PendingSignUp,
    ) -> Result<Identity, IdentityError> {
        let tx = conn.transaction().map_err(DatabaseError::from)?;
        if get_identity_by_email(&tx, &pending.email)?.is_some() {
            return Err(IdentityError::EmailTaken);
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let record = IdentityRecord {
            id,
            email: pending.email,
            password_hash: pending.password.hash,
            password_salt: pending.password.salt,
            created_at: now,
        };
        insert_identity(&tx, &record).map_err(map_unique_email)?;

        let profile = Profile {
            id,
            display_name: pending.display_name,
            role: pending.role,
            created_at: now,
            updated_at: now,
        };
        if !authorize(&tx, &id, &profile, Operation::Insert)?.allowed {
            return Err(IdentityError::PolicyDenied);
        }
        insert_profile(&tx, &profile)?;

        // role_grants has no client insert policy; sign-up writes it directly.
        insert_role_grant(
            &tx,
            &RoleGrant {
                id: Uuid::new_v4(),
                identity_id: id,
                role: pending.role,
            },
        )?;

        tx.commit().map_err(DatabaseError::from)?;
        tracing::info!(identity_id = %id, role = %pending.role, "Identity created");
        Ok(record.to_identity())
    }

    /// Verify credentials and open a session.
    pub fn sign_in(
        &self,
        conn: &Connection,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let pending = self.begin_sign_in(conn, email)?;
        self.finish_sign_in(pending, password)
    }

    /// Read what a sign-in needs from the store. No key derivation happens here.
    pub fn begin_sign_in(&self, conn: &Connection, email: &str) -> Result<PendingSignIn, IdentityError> {
        let email = normalize_email(email);
        let Some(record) = get_identity_by_email(conn, &email)? else {
            return Ok(PendingSignIn {
                subject: None,
                stored: self.decoy.clone(),
            });
        };
        let role = get_profile(conn, &record.id)?.map(|p| p.role);
        Ok(PendingSignIn {
            subject: Some((record.id, role)),
            stored: PasswordHash {
                hash: record.password_hash,
                salt: record.password_salt,
            },
        })
    }

    /// Verify the password against the pending credentials. Needs no connection.
    pub fn finish_sign_in(&self, pending: PendingSignIn, password: &str) -> Result<Session, IdentityError> {
        let matches = crypto::verify_password(password, &pending.stored)?;
        let Some((identity_id, role)) = pending.subject else {
            return Err(IdentityError::InvalidCredentials);
        };
        if !matches {
            tracing::warn!(identity_id = %identity_id, "Sign-in rejected");
            return Err(IdentityError::InvalidCredentials);
        }
        let role = role.ok_or(IdentityError::ProfileMissing)?;

        let token = generate_token();
        {
            let mut sessions = self
                .sessions
                .write()
                .map_err(|_| IdentityError::LockPoisoned)?;
            sessions.insert(
                hash_token(&token),
                SessionEntry {
                    identity_id,
                    issued_at: Utc::now(),
                },
            );
        }

        tracing::info!(identity_id = %identity_id, "Session opened");
        Ok(Session {
            token,
            identity_id,
            role,
        })
    }

    /// Revoke a session. Returns `false` if the token was not active.
    pub fn sign_out(&self, token: &str) -> Result<bool, IdentityError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| IdentityError::LockPoisoned)?;
        let removed = sessions.remove(&hash_token(token));
        if let Some(entry) = &removed {
            tracing::info!(
                identity_id = %entry.identity_id,
                issued_at = %entry.issued_at,
                "Session closed"
            );
        }
        Ok(removed.is_some())
    }

    /// Identity behind an active token.
    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        let sessions = self.sessions.read().ok()?;
        sessions.get(&hash_token(token)).map(|e| e.identity_id)
    }

    /// Delete an identity and everything it controls; closes its sessions.
    pub fn remove_identity(&self, conn: &Connection, identity_id: &Uuid) -> Result<bool, IdentityError> {
        let removed = delete_identity(conn, identity_id)?;
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| IdentityError::LockPoisoned)?;
        sessions.retain(|_, entry| &entry.identity_id != identity_id);
        if removed {
            tracing::info!(identity_id = %identity_id, "Identity removed");
        }
        Ok(removed)
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn map_unique_email(err: DatabaseError) -> IdentityError {
    match err {
        DatabaseError::ConstraintViolation(_) => IdentityError::EmailTaken,
        other => IdentityError::Database(other),
    }
}
