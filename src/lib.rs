// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Portfolio Server - Crypto Balance Aggregation Service
//!
//! A thin HTTP layer that maps Coinbase, Infura (Ethereum) and CoinGecko
//! responses into one normalized balance shape, behind a Supabase session
//! and admin gate.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Supabase sessions, admin gate, OTP verification
//! - `blockchain` - Ethereum JSON-RPC balances
//! - `providers` - Coinbase and CoinGecko clients
//! - `verification` - Short-lived email verification codes

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod providers;
pub mod state;
pub mod verification;
