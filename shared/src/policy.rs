//! Authorization policy for the harvest subsystem
//!
//! Every mutation is gated by the same three questions: is the actor an
//! administrator, do they hold the capability for the operation, and do
//! they belong to the farm that owns the target. Mutations against a
//! non-DRAFT record additionally require the override capability.
//!
//! The policy is pure: the backend builds an [`Actor`] from the verified
//! token claims and passes it into every service call, so no service
//! consults ambient auth state.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::models::HarvestStatus;

/// Capabilities recognized by the harvest subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    View,
    Create,
    Update,
    Submit,
    Approve,
    Delete,
    OverrideStatus,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::View => "harvest.view",
            Capability::Create => "harvest.create",
            Capability::Update => "harvest.update",
            Capability::Submit => "harvest.submit",
            Capability::Approve => "harvest.approve",
            Capability::Delete => "harvest.delete",
            Capability::OverrideStatus => "harvest.override_status",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated principal a request acts as
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub admin: bool,
    pub capabilities: HashSet<String>,
    pub farm_ids: HashSet<Uuid>,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability.as_str())
    }

    pub fn belongs_to_farm(&self, farm_id: Uuid) -> bool {
        self.farm_ids.contains(&farm_id)
    }
}

/// Why an access check failed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("missing capability {0}")]
    MissingCapability(Capability),

    #[error("actor does not belong to the owning farm")]
    NotFarmMember,

    #[error("record is {status}; {} is required to modify it", Capability::OverrideStatus)]
    OverrideRequired { status: HarvestStatus },
}

/// Capability + farm membership check. Administrators bypass both.
pub fn authorize(actor: &Actor, capability: Capability, farm_id: Uuid) -> Result<(), AccessDenied> {
    if actor.is_admin() {
        return Ok(());
    }
    if !actor.can(capability) {
        return Err(AccessDenied::MissingCapability(capability));
    }
    if !actor.belongs_to_farm(farm_id) {
        return Err(AccessDenied::NotFarmMember);
    }
    Ok(())
}

/// Capability check without a farm target (e.g. listing across farms)
pub fn authorize_any(actor: &Actor, capability: Capability) -> Result<(), AccessDenied> {
    if actor.is_admin() || actor.can(capability) {
        Ok(())
    } else {
        Err(AccessDenied::MissingCapability(capability))
    }
}

/// Resolve a list request's optional farm filter against the actor's
/// memberships. Admins see everything (optionally narrowed); other
/// actors are confined to their own farms, and asking for a foreign
/// farm is denied rather than silently ignored. `None` means no farm
/// restriction at all.
pub fn visible_farms(
    actor: &Actor,
    requested: Option<Uuid>,
) -> Result<Option<Vec<Uuid>>, AccessDenied> {
    if actor.is_admin() {
        return Ok(requested.map(|farm_id| vec![farm_id]));
    }
    match requested {
        Some(farm_id) if actor.belongs_to_farm(farm_id) => Ok(Some(vec![farm_id])),
        Some(_) => Err(AccessDenied::NotFarmMember),
        None => Ok(Some(actor.farm_ids.iter().copied().collect())),
    }
}

/// Gate for mutations of a record or its crates: outside DRAFT the
/// actor must also hold the override capability. Administrators bypass.
pub fn authorize_mutation(
    actor: &Actor,
    capability: Capability,
    farm_id: Uuid,
    status: HarvestStatus,
) -> Result<(), AccessDenied> {
    if actor.is_admin() {
        return Ok(());
    }
    authorize(actor, capability, farm_id)?;
    if !status.is_mutable() && !actor.can(Capability::OverrideStatus) {
        return Err(AccessDenied::OverrideRequired { status });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(admin: bool, caps: &[Capability], farms: &[Uuid]) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            admin,
            capabilities: caps.iter().map(|c| c.as_str().to_string()).collect(),
            farm_ids: farms.iter().copied().collect(),
        }
    }

    #[test]
    fn test_admin_bypasses_all_checks() {
        let farm = Uuid::new_v4();
        let admin = actor(true, &[], &[]);
        assert!(authorize(&admin, Capability::Delete, farm).is_ok());
        assert!(
            authorize_mutation(&admin, Capability::Update, farm, HarvestStatus::Approved).is_ok()
        );
    }

    #[test]
    fn test_missing_capability_rejected() {
        let farm = Uuid::new_v4();
        let user = actor(false, &[Capability::View], &[farm]);
        assert_eq!(
            authorize(&user, Capability::Create, farm),
            Err(AccessDenied::MissingCapability(Capability::Create))
        );
    }

    #[test]
    fn test_foreign_farm_rejected() {
        let farm = Uuid::new_v4();
        let other_farm = Uuid::new_v4();
        let user = actor(false, &[Capability::Update], &[other_farm]);
        assert_eq!(
            authorize(&user, Capability::Update, farm),
            Err(AccessDenied::NotFarmMember)
        );
    }

    #[test]
    fn test_farm_filter_intersects_memberships() {
        let farm = Uuid::new_v4();
        let other_farm = Uuid::new_v4();
        let user = actor(false, &[Capability::View], &[farm]);

        assert_eq!(visible_farms(&user, None), Ok(Some(vec![farm])));
        assert_eq!(visible_farms(&user, Some(farm)), Ok(Some(vec![farm])));
        assert_eq!(
            visible_farms(&user, Some(other_farm)),
            Err(AccessDenied::NotFarmMember)
        );

        let admin = actor(true, &[], &[]);
        assert_eq!(visible_farms(&admin, None), Ok(None));
        assert_eq!(visible_farms(&admin, Some(farm)), Ok(Some(vec![farm])));
    }

    #[test]
    fn test_mutation_on_draft_needs_no_override() {
        let farm = Uuid::new_v4();
        let user = actor(false, &[Capability::Update], &[farm]);
        assert!(authorize_mutation(&user, Capability::Update, farm, HarvestStatus::Draft).is_ok());
    }

    #[test]
    fn test_mutation_on_submitted_needs_override() {
        let farm = Uuid::new_v4();
        let user = actor(false, &[Capability::Delete], &[farm]);
        assert_eq!(
            authorize_mutation(&user, Capability::Delete, farm, HarvestStatus::Submitted),
            Err(AccessDenied::OverrideRequired {
                status: HarvestStatus::Submitted
            })
        );

        let privileged = actor(
            false,
            &[Capability::Delete, Capability::OverrideStatus],
            &[farm],
        );
        assert!(authorize_mutation(
            &privileged,
            Capability::Delete,
            farm,
            HarvestStatus::Submitted
        )
        .is_ok());
    }
}
