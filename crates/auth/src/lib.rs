//! `printshop-auth`: session resolution and route authorization for the
//! print-shop dashboards.
//!
//! This crate has no HTTP or storage dependencies; directories are traits
//! with in-memory implementations.

pub mod accounts;
pub mod claims;
pub mod credential;
pub mod error;
pub mod gate;
pub mod jwt;
pub mod navigation;
pub mod password;
pub mod permissions;
pub mod policy;
pub mod resolver;
pub mod roles;
pub mod session;
pub mod tenant;

pub use accounts::{
    Account, AccountDirectory, AccountStatus, ActivationRequest, ActivationToken, AuthError,
    Authenticator, InMemoryAccountDirectory, LoginOutcome, LoginRequest,
};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use credential::{CredentialError, CredentialStore, InMemoryCredentialStore};
pub use error::AccessErrorCode;
pub use gate::{
    AuthorizationGate, DenyReason, GateDecision, GateRequest, RequestKind, SessionState,
    canonical_path, encode_return_path, sanitize_return_path,
};
pub use jwt::{Hs256Jwt, JwtCodec, JwtIssueError, JwtIssuer, JwtValidator};
pub use navigation::{NavigationItem, views_for, views_for_name};
pub use permissions::Permission;
pub use policy::{PathMatch, PolicyError, RouteAccessPolicy, RouteRule};
pub use resolver::{SessionIntrospector, SessionLifetime, SessionResolver};
pub use roles::{ROLE_TABLE, RoleName, RoleProfile, UnknownRole};
pub use session::{Identity, NewSession, Session, SessionError};
pub use tenant::{
    InMemoryTenantDirectory, Tenant, TenantAccessError, TenantDirectory, TenantScope,
};
