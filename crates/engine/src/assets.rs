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

//! Stylesheet and script of the HTML output
//!
//! The session asks for each asset once per request. An [`AssetInjector`] decides
//! how the asset reaches the page: inline, as a link, or not at all when the host
//! page already carries it.

use std::fmt;

use crate::html;

/// Stylesheet of dump blocks and traces
pub const DEBUG_CSS: &str = include_str!("../assets/debug.css");

/// Toggle and mark handlers of dump blocks and traces
pub const DEBUG_JS: &str = include_str!("../assets/debug.js");

/// Browser console helper, `globalSearch(scope, needle, field, limit)`
pub const CONSOLE_JS: &str = include_str!("../assets/console.js");

/// Name under which the bundled assets are requested
pub const DEBUG_ASSET: &str = "debug";

/// Name of the console helper script
pub const CONSOLE_ASSET: &str = "console";

/// Kind of asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// CSS
    Stylesheet,
    /// JavaScript
    Script,
}

impl AssetKind {
    /// File extension of the asset kind
    pub fn extension(self) -> &'static str {
        match self {
            Self::Stylesheet => "css",
            Self::Script => "js",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Makes a named asset available to the current HTML response
pub trait AssetInjector {
    /// Markup to place in front of the first HTML block, if any
    fn inject(&mut self, name: &str, kind: AssetKind) -> Option<String>;
}

/// Embeds the bundled assets as `<style>` and `<script>` elements
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineAssets;

impl AssetInjector for InlineAssets {
    fn inject(&mut self, name: &str, kind: AssetKind) -> Option<String> {
        match (name, kind) {
            (DEBUG_ASSET, AssetKind::Stylesheet) => Some(format!("<style>{DEBUG_CSS}</style>")),
            (DEBUG_ASSET, AssetKind::Script) => Some(format!("<script>{DEBUG_JS}</script>")),
            (CONSOLE_ASSET, AssetKind::Script) => Some(format!("<script>{CONSOLE_JS}</script>")),
            _ => None,
        }
    }
}

/// References assets served by the host under a base URL
#[derive(Debug, Clone)]
pub struct LinkedAssets {
    base_url: String,
}

impl LinkedAssets {
    /// Serve `{base_url}/{name}.{ext}`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string() }
    }
}

impl AssetInjector for LinkedAssets {
    fn inject(&mut self, name: &str, kind: AssetKind) -> Option<String> {
        let url = html::escape(&format!("{}/{name}.{kind}", self.base_url));
        Some(match kind {
            AssetKind::Stylesheet => format!("<link rel=\"stylesheet\" href=\"{url}\">"),
            AssetKind::Script => format!("<script src=\"{url}\"></script>"),
        })
    }
}

/// Injects nothing; the host page ships the assets itself
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetInjector for NoAssets {
    fn inject(&mut self, _name: &str, _kind: AssetKind) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_assets() {
        let mut assets = InlineAssets;
        let css = assets.inject(DEBUG_ASSET, AssetKind::Stylesheet).unwrap();
        assert!(css.starts_with("<style>") && css.contains(".dev-plus::after"));
        let js = assets.inject(DEBUG_ASSET, AssetKind::Script).unwrap();
        assert!(js.contains("_debToggleVar"));
        assert!(assets.inject("other", AssetKind::Script).is_none());

        let console = assets.inject(CONSOLE_ASSET, AssetKind::Script).unwrap();
        assert!(console.contains("window.globalSearch"));
        assert!(assets.inject(CONSOLE_ASSET, AssetKind::Stylesheet).is_none());
    }

    #[test]
    fn test_linked_assets() {
        let mut assets = LinkedAssets::new("/static/reqdebug/");
        assert_eq!(
            assets.inject(DEBUG_ASSET, AssetKind::Script).unwrap(),
            "<script src=\"/static/reqdebug/debug.js\"></script>"
        );
        assert_eq!(
            assets.inject(DEBUG_ASSET, AssetKind::Stylesheet).unwrap(),
            "<link rel=\"stylesheet\" href=\"/static/reqdebug/debug.css\">"
        );
    }
}
