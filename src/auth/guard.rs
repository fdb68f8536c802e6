use super::{DecodedClaim, Role};

/// Outcome of a role check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The token was genuine but carried no usable identity (HTTP 400)
    InvalidTokenStructure,
    /// The identity holds a different role (HTTP 403)
    RoleMismatch,
}

impl DenyReason {
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::InvalidTokenStructure => "Invalid token structure",
            DenyReason::RoleMismatch => "Access forbidden: Role mismatch",
        }
    }
}

/// Decide whether `claim` may perform an operation restricted to `required`
pub fn authorize(claim: &DecodedClaim, required: Role) -> Decision {
    match claim {
        Err(_) => Decision::Deny(DenyReason::InvalidTokenStructure),
        Ok(identity) if identity.role != required => Decision::Deny(DenyReason::RoleMismatch),
        Ok(_) => Decision::Allow,
    }
}
