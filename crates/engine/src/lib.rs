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

//! reqdebug Engine - dump rendering and the request-scoped output session
//!
//! Values handed to the engine are [`DumpValue`] trees. The [`TreeRenderer`] walks
//! them with cycle detection and depth-based collapse, producing HTML rows with
//! toggle links or the same rows as plain text. The [`TraceFormatter`] turns call
//! stacks from the host into short and full traces, and the [`OutputSession`]
//! collects everything for one request and flushes it once.

pub mod assets;
pub use assets::*;

pub mod classify;
pub use classify::*;

pub mod collapse;
pub use collapse::*;

pub mod error;
pub use error::*;

pub mod hooks;
pub use hooks::*;

pub mod html;

pub mod marker;
pub use marker::*;

pub mod notify;
pub use notify::*;

pub mod render;
pub use render::*;

pub mod request;
pub use request::*;

pub mod session;
pub use session::*;

pub mod sink;
pub use sink::*;

pub mod trace;
pub use trace::*;

pub mod value;
pub use value::*;
