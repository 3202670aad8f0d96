// reqdebug - Request-scoped debugging toolkit
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! reqdebug Common - Shared functionality for reqdebug components
//!
//! This crate provides the infrastructure shared by the dump engine and the
//! `reqdebug` binary: logging setup, environment variable names, the
//! configuration model and the rules that decide whether debugging is active
//! for a given request.

/// Rules that decide whether debug output is enabled for a request
pub mod activation;
/// Debug configuration loaded from TOML files and environment variables
pub mod config;
/// Environment variable name constants for reqdebug configuration
pub mod env;
/// Logging setup and utilities for consistent logging across reqdebug components
pub mod logging;

pub use activation::*;
pub use config::*;
pub use logging::*;
