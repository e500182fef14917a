use crate::models::{Hoarding, User};

/// The protected operations the policy knows how to judge. Edit carries its
/// target because ownership matters there; the rest depend only on the actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action<'a> {
    /// Modify an existing hoarding record.
    Edit(&'a Hoarding),
    /// Permanently remove a hoarding record.
    Delete,
    /// Provision a new login.
    CreateUser,
    /// Enumerate existing logins.
    ListUsers,
}

/// The policy's verdict. Denial is a decision value, never a fault; the
/// caller owns the user-facing messaging and redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// authorize
///
/// Stateless rule evaluation over `(actor, action)`; first matching rule wins:
/// - `Edit`: allowed for the record's creator or any admin.
/// - `Delete`: admins only. Ownership does NOT grant deletion, an intentional
///   asymmetry with `Edit`.
/// - `CreateUser` / `ListUsers`: admins only.
pub fn authorize(actor: &User, action: Action<'_>) -> Decision {
    let allowed = match action {
        Action::Edit(target) => actor.id == target.created_by || actor.is_admin,
        Action::Delete => actor.is_admin,
        Action::CreateUser | Action::ListUsers => actor.is_admin,
    };

    if allowed { Decision::Allow } else { Decision::Deny }
}
