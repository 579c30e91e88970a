//! Row-level access policies.
//!
//! Every table has four independent predicates (select, insert, update,
//! delete) evaluated per row against the requesting identity:
//!
//! | Table       | Select                          | Insert                                   | Update        | Delete     |
//! |-------------|---------------------------------|------------------------------------------|---------------|------------|
//! | profiles    | self                            | self                                     | self          | -          |
//! | role_grants | self                            | -                                        | -             | -          |
//! | symptoms    | owner, or assigned doctor       | owner                                    | owner         | owner      |
//! | doctor_notes| author, or symptom owner        | doctor role + self + assigned to owner   | -             | -          |
//! | messages    | sender or receiver              | sender                                   | receiver      | -          |
//! | assignments | patient or doctor               | patient                                  | -             | -          |
//!
//! Default-deny. A `-` means no policy exists, so the operation is always
//! denied. Role checks go through [`has_role`], which reads `role_grants`
//! directly and is not itself subject to the role_grants select policy.

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository::{assignment_exists, get_symptom, role_grant_exists};
use crate::models::enums::Role;
use crate::models::{Assignment, DoctorNote, Message, Profile, RoleGrant, Symptom};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Operation a policy is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

/// Why access was granted (or denied): for audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    /// Row belongs to the requester's own identity (profiles, role_grants).
    SelfAccess,
    /// Requester owns the symptom.
    Owner,
    /// Requester holds the doctor role and is assigned to the symptom's owner.
    AssignedDoctor,
    /// Requester wrote the note.
    AuthoringDoctor,
    /// Requester owns the symptom the note is attached to.
    SymptomOwner,
    Sender,
    Receiver,
    /// Requester is named as patient or doctor on the assignment.
    AssignmentParty,
    /// The table defines no policy for this operation.
    NoPolicy,
    /// A policy exists but no rule matched.
    Denied,
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow(reason: AccessReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            reason: AccessReason::Denied,
        }
    }

    fn no_policy() -> Self {
        Self {
            allowed: false,
            reason: AccessReason::NoPolicy,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════

/// Errors from authorization operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Role predicate
// ═══════════════════════════════════════════════════════════

/// True iff a role grant exists for exactly (`identity`, `role`).
///
/// Reads `role_grants` through the privileged repository on the caller's
/// connection, so it sees the latest committed grant (and any grant written
/// earlier in the caller's transaction). Nothing is cached.
pub fn has_role(conn: &Connection, identity: &Uuid, role: Role) -> Result<bool, AuthorizationError> {
    Ok(role_grant_exists(conn, identity, role)?)
}

// ═══════════════════════════════════════════════════════════
// Row policies
// ═══════════════════════════════════════════════════════════

/// A table row that carries its own access policy.
pub trait RowPolicy {
    /// Table name, for logs.
    const TABLE: &'static str;

    fn check(
        &self,
        conn: &Connection,
        requester: &Uuid,
        op: Operation,
    ) -> Result<AccessDecision, AuthorizationError>;
}

/// Evaluate the row's policy for `op` on behalf of `requester`.
pub fn authorize<T: RowPolicy>(
    conn: &Connection,
    requester: &Uuid,
    row: &T,
    op: Operation,
) -> Result<AccessDecision, AuthorizationError> {
    let decision = row.check(conn, requester, op)?;
    tracing::trace!(
        table = T::TABLE,
        operation = ?op,
        requester = %requester,
        allowed = decision.allowed,
        reason = ?decision.reason,
        "row policy evaluated"
    );
    Ok(decision)
}

impl RowPolicy for Profile {
    const TABLE: &'static str = "profiles";

    fn check(
        &self,
        _conn: &Connection,
        requester: &Uuid,
        op: Operation,
    ) -> Result<AccessDecision, AuthorizationError> {
        let own = &self.id == requester;
        Ok(match op {
            Operation::Select | Operation::Insert | Operation::Update if own => {
                AccessDecision::allow(AccessReason::SelfAccess)
            }
            Operation::Select | Operation::Insert | Operation::Update => AccessDecision::deny(),
            Operation::Delete => AccessDecision::no_policy(),
        })
    }
}

impl RowPolicy for RoleGrant {
    const TABLE: &'static str = "role_grants";

    fn check(
        &self,
        _conn: &Connection,
        requester: &Uuid,
        op: Operation,
    ) -> Result<AccessDecision, AuthorizationError> {
        Ok(match op {
            Operation::Select if &self.identity_id == requester => {
                AccessDecision::allow(AccessReason::SelfAccess)
            }
            Operation::Select => AccessDecision::deny(),
            _ => AccessDecision::no_policy(),
        })
    }
}

impl RowPolicy for Symptom {
    const TABLE: &'static str = "symptoms";

    fn check(
        &self,
        conn: &Connection,
        requester: &Uuid,
        op: Operation,
    ) -> Result<AccessDecision, AuthorizationError> {
        if &self.patient_id == requester {
            return Ok(AccessDecision::allow(AccessReason::Owner));
        }
        if op != Operation::Select {
            return Ok(AccessDecision::deny());
        }
        // Visibility needs both the assignment and the doctor role.
        if assignment_exists(conn, &self.patient_id, requester)?
            && has_role(conn, requester, Role::Doctor)?
        {
            return Ok(AccessDecision::allow(AccessReason::AssignedDoctor));
        }
        Ok(AccessDecision::deny())
    }
}

impl RowPolicy for DoctorNote {
    const TABLE: &'static str = "doctor_notes";

    fn check(
        &self,
        conn: &Connection,
        requester: &Uuid,
        op: Operation,
    ) -> Result<AccessDecision, AuthorizationError> {
        match op {
            Operation::Select => {
                if &self.doctor_id == requester {
                    return Ok(AccessDecision::allow(AccessReason::AuthoringDoctor));
                }
                let owns_symptom = get_symptom(conn, &self.symptom_id)?
                    .is_some_and(|s| &s.patient_id == requester);
                if owns_symptom {
                    return Ok(AccessDecision::allow(AccessReason::SymptomOwner));
                }
                Ok(AccessDecision::deny())
            }
            Operation::Insert => {
                if &self.doctor_id != requester || !has_role(conn, requester, Role::Doctor)? {
                    return Ok(AccessDecision::deny());
                }
                let Some(symptom) = get_symptom(conn, &self.symptom_id)? else {
                    return Ok(AccessDecision::deny());
                };
                if assignment_exists(conn, &symptom.patient_id, requester)? {
                    Ok(AccessDecision::allow(AccessReason::AssignedDoctor))
                } else {
                    Ok(AccessDecision::deny())
                }
            }
            Operation::Update | Operation::Delete => Ok(AccessDecision::no_policy()),
        }
    }
}

impl RowPolicy for Message {
    const TABLE: &'static str = "messages";

    fn check(
        &self,
        _conn: &Connection,
        requester: &Uuid,
        op: Operation,
    ) -> Result<AccessDecision, AuthorizationError> {
        let sender = &self.sender_id == requester;
        let receiver = &self.receiver_id == requester;
        Ok(match op {
            Operation::Select if sender => AccessDecision::allow(AccessReason::Sender),
            Operation::Select if receiver => AccessDecision::allow(AccessReason::Receiver),
            Operation::Insert if sender => AccessDecision::allow(AccessReason::Sender),
            Operation::Update if receiver => AccessDecision::allow(AccessReason::Receiver),
            Operation::Delete => AccessDecision::no_policy(),
            _ => AccessDecision::deny(),
        })
    }
}

impl RowPolicy for Assignment {
    const TABLE: &'static str = "assignments";

    fn check(
        &self,
        _conn: &Connection,
        requester: &Uuid,
        op: Operation,
    ) -> Result<AccessDecision, AuthorizationError> {
        Ok(match op {
            Operation::Select if &self.patient_id == requester || &self.doctor_id == requester => {
                AccessDecision::allow(AccessReason::AssignmentParty)
            }
            Operation::Insert if &self.patient_id == requester => {
                AccessDecision::allow(AccessReason::AssignmentParty)
            }
            Operation::Select | Operation::Insert => AccessDecision::deny(),
            Operation::Update | Operation::Delete => AccessDecision::no_policy(),
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
