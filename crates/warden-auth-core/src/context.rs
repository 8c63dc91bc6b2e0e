//! Per-request context establishment
//!
//! `Unauthenticated -> TokenValidated -> MembershipResolved -> ContextPublished`,
//! with `Rejected` reachable from every non-terminal stage. The role in the
//! published context comes from the membership resolution, not from the
//! token, so a demotion takes effect on the next request.

use std::sync::Arc;
use std::time::Duration;

use warden_types::{AuditEvent, RequestSecurityContext, Role, SharedAuditSink};

use crate::{with_deadline, AccessClaims, AuthError, MembershipResolver, Resolution, TokenCodec};

/// Stage of the per-request state machine
#[derive(Debug)]
pub enum ContextStage {
    Unauthenticated,
    TokenValidated(AccessClaims),
    MembershipResolved { claims: AccessClaims, role: Role },
    ContextPublished(RequestSecurityContext),
    Rejected(AuthError),
}

impl ContextStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::TokenValidated(_) => "token_validated",
            Self::MembershipResolved { .. } => "membership_resolved",
            Self::ContextPublished(_) => "context_published",
            Self::Rejected(_) => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ContextPublished(_) | Self::Rejected(_))
    }
}

/// Turns a bearer token into a [`RequestSecurityContext`]
#[derive(Clone)]
pub struct ContextResolver {
    codec: Arc<TokenCodec>,
    memberships: MembershipResolver,
    audit: SharedAuditSink,
    io_timeout: Duration,
}

impl ContextResolver {
    pub fn new(
        codec: Arc<TokenCodec>,
        memberships: MembershipResolver,
        audit: SharedAuditSink,
        io_timeout: Duration,
    ) -> Self {
        Self {
            codec,
            memberships,
            audit,
            io_timeout,
        }
    }

    /// Run the state machine to a terminal stage
    pub async fn establish(&self, bearer: Option<&str>) -> Result<RequestSecurityContext, AuthError> {
        let mut stage = ContextStage::Unauthenticated;
        loop {
            stage = match stage {
                ContextStage::ContextPublished(ctx) => return Ok(ctx),
                ContextStage::Rejected(err) => return Err(err),
                other => self.advance(other, bearer).await,
            };
        }
    }

    /// Move one stage forward
    pub async fn advance(&self, stage: ContextStage, bearer: Option<&str>) -> ContextStage {
        match stage {
            ContextStage::Unauthenticated => {
                let Some(token) = bearer else {
                    return ContextStage::Rejected(AuthError::TenantContextMissing);
                };
                match self.codec.validate_access(token) {
                    Ok(claims) => ContextStage::TokenValidated(claims),
                    Err(err) => {
                        self.audit.record(AuditEvent::TokenRejected {
                            reason: err.error_code().to_string(),
                        });
                        ContextStage::Rejected(err)
                    }
                }
            }
            ContextStage::TokenValidated(claims) => {
                let resolved = with_deadline(
                    self.io_timeout,
                    "membership resolution",
                    self.memberships.resolve(claims.sub, claims.tenant_id),
                )
                .await;
                match resolved {
                    Ok(Resolution::Granted(role)) => {
                        if role != claims.role {
                            tracing::debug!(
                                user_id = %claims.sub,
                                tenant_id = %claims.tenant_id,
                                token_role = %claims.role,
                                %role,
                                "role changed since token issue"
                            );
                        }
                        ContextStage::MembershipResolved { claims, role }
                    }
                    Ok(Resolution::Denied(reason)) => {
                        self.memberships
                            .audit_denied(claims.sub, claims.tenant_id, reason);
                        ContextStage::Rejected(AuthError::TenantIneligible { reason })
                    }
                    Err(err) => ContextStage::Rejected(err),
                }
            }
            ContextStage::MembershipResolved { claims, role } => ContextStage::ContextPublished(
                RequestSecurityContext::new(claims.sub, claims.tenant_id, role)
                    .with_token_id(claims.jti),
            ),
            terminal => terminal,
        }
    }
}

impl std::fmt::Debug for ContextResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextResolver")
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}
