use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::CloneError;
use crate::identity_map::IdentityMap;
use crate::stores::traits::{DestStore, NewPrincipal, Principal, SourceStore};

#[derive(Clone, Debug, Serialize)]
pub struct PrincipalFailure {
    pub source_id: Uuid,
    pub email: Option<String>,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PrincipalImportOutcome {
    pub listed: u64,
    pub created: u64,
    pub reused: u64,
    pub failures: Vec<PrincipalFailure>,
    /// Set when enumeration itself stopped early; per-principal problems go
    /// into `failures` instead.
    pub aborted: Option<String>,
}

impl PrincipalImportOutcome {
    pub fn resolved(&self) -> u64 {
        return self.created + self.reused;
    }

    pub fn is_clean(&self) -> bool {
        return self.failures.is_empty() && self.aborted.is_none();
    }
}

/// Ensures every source principal exists in the destination auth store and
/// records the `source id -> destination id` mapping. Re-running against a
/// destination that already holds some of the accounts resolves them by
/// email instead of failing.
pub fn import_principals(
    source: &mut dyn SourceStore,
    dest: &mut dyn DestStore,
    identity_map: &mut IdentityMap,
    page_size: u64,
) -> PrincipalImportOutcome {
    let mut outcome = PrincipalImportOutcome::default();
    if let Err(err) = enumerate(source, dest, identity_map, page_size, &mut outcome) {
        warn!("Principal import stopped early: {err:#}");
        outcome.aborted = Some(format!("{err:#}"));
    }
    info!(
        "Principal import finished: {} created, {} reused, {} failed",
        outcome.created,
        outcome.reused,
        outcome.failures.len()
    );
    return outcome;
}

fn enumerate(
    source: &mut dyn SourceStore,
    dest: &mut dyn DestStore,
    identity_map: &mut IdentityMap,
    page_size: u64,
    outcome: &mut PrincipalImportOutcome,
) -> anyhow::Result<()> {
    let page_size = page_size.max(1);
    let expected = loop {
        let page = source
            .list_principals(outcome.listed, page_size)
            .context("Failed to list source principals")?;
        let total = page.total;
        let retrieved = page.principals.len() as u64;
        for principal in page.principals {
            import_one(dest, identity_map, principal, outcome);
        }
        outcome.listed += retrieved;
        if retrieved < page_size {
            break total;
        }
    };
    if outcome.listed != expected {
        return Err(CloneError::IncompleteEnumeration {
            got: outcome.listed,
            expected,
        }
        .into());
    }
    return Ok(());
}

fn import_one(
    dest: &mut dyn DestStore,
    identity_map: &mut IdentityMap,
    principal: Principal,
    outcome: &mut PrincipalImportOutcome,
) {
    let Some(email) = principal.email.clone() else {
        outcome.failures.push(PrincipalFailure {
            source_id: principal.source_id,
            email: None,
            error: "Principal has no email to match on".to_string(),
        });
        return;
    };
    let new_principal = NewPrincipal {
        email: email.clone(),
        password: generate_temporary_password(),
        email_confirm: true,
        user_metadata: principal.user_metadata.clone(),
        app_metadata: principal.app_metadata.clone(),
    };
    match dest.create_principal(&new_principal) {
        Ok(dest_id) => {
            identity_map.record(principal.source_id, dest_id);
            outcome.created += 1;
        }
        // A failed create usually means the account already exists in the
        // destination; resolving it by email keeps re-runs idempotent.
        Err(create_err) => match dest.find_principal_by_email(&email) {
            Ok(Some(dest_id)) => {
                identity_map.record(principal.source_id, dest_id);
                outcome.reused += 1;
            }
            Ok(None) => {
                outcome.failures.push(PrincipalFailure {
                    source_id: principal.source_id,
                    email: Some(email),
                    error: format!("{create_err:#}"),
                });
            }
            Err(lookup_err) => {
                outcome.failures.push(PrincipalFailure {
                    source_id: principal.source_id,
                    email: Some(email),
                    error: format!("{create_err:#}; lookup also failed: {lookup_err:#}"),
                });
            }
        },
    }
}

fn generate_temporary_password() -> String {
    return format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_passwords_are_unique_and_long() {
        let first = generate_temporary_password();
        let second = generate_temporary_password();
        assert_ne!(first, second);
        assert_eq!(first.len(), 64);
    }
}
