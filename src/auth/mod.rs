// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Supabase session verification and the admin gate.
//!
//! ## Auth Flow
//!
//! 1. The browser signs in with Supabase Auth (magic link / OTP)
//! 2. Requests carry `Authorization: Bearer <access token>` or the
//!    `sb-access-token` cookie
//! 3. The server:
//!    - Verifies the JWT (HS256 project secret, or JWKS for asymmetric keys)
//!    - Checks expiry, issuer (`<project url>/auth/v1`) and audience
//!      (`authenticated`)
//!    - Builds a [`Session`] from `sub` and `email`
//! 4. Admin pages query `admin_users` through the [`AdminGate`] on every load
//!
//! ## Security
//!
//! - Admin store failures never grant access
//! - JWKS is cached with TTL
//! - Clock skew tolerance is 60 seconds

pub mod admin;
pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod supabase;

pub use admin::{AdminGate, AdminStore, AdminStoreError, InMemoryAdminStore, SupabaseAdminStore};
pub use claims::{Session, SessionUser, SupabaseClaims};
pub use error::AuthError;
pub use extractor::{AdminGuard, OptionalSession, RequireSession};
pub use jwks::JwksManager;
pub use supabase::{AuthProviderError, OtpVerifier, SupabaseAuthClient, VerifiedOtp};
