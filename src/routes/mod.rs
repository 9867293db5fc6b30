//! Router Module Index
//!
//! Splits the routing table by access level. Authentication is applied as a layer on the
//! whole `authenticated` router, so a protected endpoint cannot be exposed by accident.

/// Routes accessible to anonymous clients (read-only listings, registration, login).
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a valid Bearer token.
pub mod authenticated;
