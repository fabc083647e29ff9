//! Authorization rules for every protected operation.
//!
//! Each [`Action`] maps to a static [`Rule`]: the roles allowed to attempt it and
//! how resource ownership constrains it. Handlers call [`authorize`] instead of
//! comparing roles inline.

use uuid::Uuid;

use crate::{
    entity::enums::Role,
    error::{AppError, AppResult},
};

const ADMINS: &[Role] = &[Role::Admin, Role::SuperAdmin];
const CUSTOMERS: &[Role] = &[Role::User];
const EVERYONE: &[Role] = &[Role::User, Role::Admin, Role::SuperAdmin];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateCatalog,
    ModifyCatalog,
    ManageCoupons,
    UseCart,
    PlaceOrder,
    PayOrder,
    CancelOrder,
    DeliverOrder,
    ViewOwnOrders,
    WriteReview,
    UpdateReview,
    UpdateProfile,
    DeleteUser,
    ListUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    None,
    OwnerOrSuperAdmin,
    OwnerOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub roles: &'static [Role],
    pub ownership: Ownership,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    DenyRole,
    DenyOwnership,
}

pub fn rule(action: Action) -> Rule {
    use Action::*;
    let (roles, ownership) = match action {
        CreateCatalog => (ADMINS, Ownership::None),
        ModifyCatalog => (ADMINS, Ownership::OwnerOrSuperAdmin),
        ManageCoupons => (ADMINS, Ownership::None),
        UseCart | PlaceOrder | WriteReview => (CUSTOMERS, Ownership::None),
        PayOrder | CancelOrder | UpdateReview => (CUSTOMERS, Ownership::OwnerOnly),
        DeliverOrder => (ADMINS, Ownership::None),
        ViewOwnOrders => (EVERYONE, Ownership::None),
        UpdateProfile => (EVERYONE, Ownership::OwnerOnly),
        DeleteUser => (EVERYONE, Ownership::OwnerOrSuperAdmin),
        ListUsers => (ADMINS, Ownership::None),
    };
    Rule { roles, ownership }
}

/// Decide whether `actor` may perform `action` on a resource owned by `owner`.
/// A missing owner fails any ownership rule.
pub fn evaluate(actor: &Actor, owner: Option<Uuid>, action: Action) -> Decision {
    let rule = rule(action);
    if !rule.roles.contains(&actor.role) {
        return Decision::DenyRole;
    }
    let is_owner = owner == Some(actor.id);
    let allowed = match rule.ownership {
        Ownership::None => true,
        Ownership::OwnerOnly => is_owner,
        Ownership::OwnerOrSuperAdmin => is_owner || actor.role == Role::SuperAdmin,
    };
    if allowed {
        Decision::Allow
    } else {
        Decision::DenyOwnership
    }
}

pub fn authorize(actor: &Actor, owner: Option<Uuid>, action: Action) -> AppResult<()> {
    match evaluate(actor, owner, action) {
        Decision::Allow => Ok(()),
        Decision::DenyRole => {
            tracing::debug!(actor = %actor.id, ?action, "role denied");
            Err(AppError::Forbidden("You are not authorized".into()))
        }
        Decision::DenyOwnership => {
            tracing::debug!(actor = %actor.id, ?action, "ownership denied");
            Err(AppError::Forbidden(
                "You are not allowed to modify this resource".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn customers_cannot_create_catalog() {
        let user = actor(Role::User);
        assert_eq!(
            evaluate(&user, None, Action::CreateCatalog),
            Decision::DenyRole
        );
        assert_eq!(
            evaluate(&actor(Role::Admin), None, Action::CreateCatalog),
            Decision::Allow
        );
    }

    #[test]
    fn catalog_owner_or_super_admin_may_modify() {
        let owner = actor(Role::Admin);
        let other_admin = actor(Role::Admin);
        let super_admin = actor(Role::SuperAdmin);

        assert_eq!(
            evaluate(&owner, Some(owner.id), Action::ModifyCatalog),
            Decision::Allow
        );
        assert_eq!(
            evaluate(&other_admin, Some(owner.id), Action::ModifyCatalog),
            Decision::DenyOwnership
        );
        assert_eq!(
            evaluate(&super_admin, Some(owner.id), Action::ModifyCatalog),
            Decision::Allow
        );
    }

    #[test]
    fn owner_only_excludes_super_admin() {
        let user = actor(Role::User);
        let super_admin = actor(Role::SuperAdmin);
        assert_eq!(
            evaluate(&user, Some(user.id), Action::UpdateProfile),
            Decision::Allow
        );
        assert_eq!(
            evaluate(&super_admin, Some(user.id), Action::UpdateProfile),
            Decision::DenyOwnership
        );
    }

    #[test]
    fn missing_owner_fails_ownership_rules() {
        let user = actor(Role::User);
        assert_eq!(
            evaluate(&user, None, Action::CancelOrder),
            Decision::DenyOwnership
        );
    }

    #[test]
    fn admins_cannot_place_orders() {
        assert_eq!(
            evaluate(&actor(Role::Admin), None, Action::PlaceOrder),
            Decision::DenyRole
        );
    }

    #[test]
    fn users_delete_themselves_and_super_admin_deletes_anyone() {
        let user = actor(Role::User);
        let stranger = actor(Role::User);
        let super_admin = actor(Role::SuperAdmin);
        assert!(authorize(&user, Some(user.id), Action::DeleteUser).is_ok());
        assert!(authorize(&stranger, Some(user.id), Action::DeleteUser).is_err());
        assert!(authorize(&super_admin, Some(user.id), Action::DeleteUser).is_ok());
    }

    #[test]
    fn denial_maps_to_forbidden() {
        let err = authorize(&actor(Role::User), None, Action::ListUsers).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
