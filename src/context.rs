//! Per-request context and permission evaluation
//!
//! The caller identity is threaded through the pipeline as an explicit
//! value rather than ambient state, and capability checks are a closed
//! set of (action, resource) variants evaluated by a pure function of
//! the caller's role. Transport-layer gating happens before the
//! pipeline is invoked; the pipeline only carries the context for
//! structured logging.

use crate::db::models::User;

/// Caller role, in decreasing order of capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Member,
    Anonymous,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Anonymous => "anonymous",
        }
    }

    /// Parse a stored role name; unknown names degrade to Anonymous.
    pub fn parse(value: &str) -> Role {
        match value {
            "admin" => Role::Admin,
            "member" => Role::Member,
            _ => Role::Anonymous,
        }
    }
}

/// Operations a caller may attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Refresh,
}

/// Resource kinds the permission function knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Search,
    Postcode,
    Authority,
    Stop,
    Crime,
    User,
}

/// Pure permission check: no lookup tables, no dynamic rule strings.
pub fn permitted(role: Role, action: Action, resource: ResourceKind) -> bool {
    match role {
        Role::Admin => true,
        Role::Member => !matches!(
            (action, resource),
            (Action::Create, ResourceKind::User) | (Action::Refresh, ResourceKind::User)
        ),
        Role::Anonymous => action == Action::Read,
    }
}

/// Identity of the caller for one pipeline invocation
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: Option<i64>,
    pub username: String,
    pub role: Role,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            username: "anonymous".to_string(),
            role: Role::Anonymous,
        }
    }

    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: Some(user.id),
            username: user.username.clone(),
            role: Role::parse(&user.role),
        }
    }
}
