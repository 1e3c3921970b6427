// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ethereum integration.
//!
//! This module provides functionality for:
//! - Querying native ETH balances through an Infura JSON-RPC endpoint
//! - Converting wei quantities to decimal ETH

pub mod client;
pub mod types;

pub use client::EthereumClient;
pub use types::*;
