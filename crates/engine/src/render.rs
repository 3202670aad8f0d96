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

//! Tree renderer
//!
//! A dump is produced in two passes. The traversal walks the value once and emits a
//! flat list of [`DumpNode`] rows, one per leaf and one per composite header. Each row
//! is then turned into a line of HTML; plain text is that same line with the markup
//! stripped, so both formats always carry the same content.
//!
//! The traversal state that has to flow down the recursion (key, visibility,
//! branch flags, enclosing collapse ids) lives in an immutable context that every
//! child derives from its parent. The only mutable state is per traversal: the
//! collapse id allocator, the list of visited objects and the emitted rows.

use reqdebug_common::OutputFormat;
use rpds::Vector;

use crate::{
    classify::{classify, Classification, TypeTag},
    collapse::{CollapseChain, CollapseId, CollapseIds},
    html, DumpValue, Field, FieldKey, Visibility,
};

/// Rendered in place of an object that is already being dumped
pub const RECURSION_MARKER: &str = "*RECURSION*";

/// Options of one render call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Output format
    pub format: OutputFormat,
    /// Sort keys of composites
    pub sort_keys: bool,
    /// Keys rendered as primary keys
    pub mark_fields: Vec<String>,
    /// Composites whose chain of enclosing composites (themselves included) reaches
    /// this length start collapsed
    pub depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Html,
            sort_keys: true,
            mark_fields: vec!["ID".to_string(), "id".to_string()],
            depth: reqdebug_common::DEFAULT_DEPTH,
        }
    }
}

/// One row of a dump
#[derive(Debug, Clone, PartialEq)]
pub struct DumpNode {
    /// Type of the value
    pub tag: TypeTag,
    /// Type label, e.g. `Array(3)`
    pub type_label: String,
    /// Key of the value in its parent
    pub key: Option<FieldKey>,
    /// Visibility of the key
    pub visibility: Visibility,
    /// Whether the key is a marked field
    pub marked: bool,
    /// Per nesting level below the root: whether a sibling follows at that level.
    /// The last entry belongs to the row itself.
    pub depth: Vec<bool>,
    /// Collapse ids of all enclosing composites, outermost first
    pub containers: Vec<CollapseId>,
    /// Whether an enclosing composite starts collapsed
    pub hidden: bool,
    /// Own collapse id of a non-empty composite header
    pub collapse_id: Option<CollapseId>,
    /// Whether this composite starts collapsed
    pub is_collapsed_initially: bool,
    /// HTML preview of leaf values
    pub rendered_value: Option<String>,
    /// Whether this row stands for an object that is already being dumped
    pub recursion: bool,
}

/// Context handed down the recursion; children derive their own copy
#[derive(Debug, Clone, Default)]
struct RenderContext {
    key: Option<FieldKey>,
    visibility: Visibility,
    depth: Vector<bool>,
    chain: CollapseChain,
}

impl RenderContext {
    fn child(&self, field: &Field, has_more: bool, chain: &CollapseChain) -> Self {
        Self {
            key: Some(field.key.clone()),
            visibility: field.visibility,
            depth: self.depth.push_back(has_more),
            chain: chain.clone(),
        }
    }
}

/// State of one top-level traversal
struct Traversal<'o> {
    options: &'o RenderOptions,
    ids: CollapseIds,
    visited: Vec<usize>,
    rows: Vec<DumpNode>,
}

impl Traversal<'_> {
    fn visit(&mut self, value: &DumpValue, ctx: RenderContext) {
        let class = classify(value);
        match value {
            DumpValue::Object(object) => {
                let identity = object.identity();
                if self.visited.contains(&identity) {
                    self.recursion_row(&class, ctx);
                    return;
                }
                self.visited.push(identity);
                let object = object.borrow();
                self.composite(class, &object.fields, ctx);
            }
            DumpValue::Collection(fields) => self.composite(class, fields, ctx),
            _ => {
                let row = self.row(&class, &ctx);
                self.rows.push(row);
            }
        }
    }

    fn composite(&mut self, class: Classification, fields: &[Field], ctx: RenderContext) {
        if fields.is_empty() {
            let row = self.row(&class, &ctx);
            self.rows.push(row);
            return;
        }

        let id = self.ids.allocate();
        let chain = ctx.chain.enter(id.clone(), self.options.depth);
        let mut header = self.row(&class, &ctx);
        header.collapse_id = Some(id);
        header.is_collapsed_initially = chain.is_last_collapsed();
        self.rows.push(header);

        let mut order: Vec<&Field> = fields.iter().collect();
        if self.options.sort_keys {
            order.sort_by(|a, b| a.key.cmp(&b.key));
        }

        let last = order.len() - 1;
        for (index, field) in order.into_iter().enumerate() {
            self.visit(&field.value, ctx.child(field, index < last, &chain));
        }
    }

    fn recursion_row(&mut self, class: &Classification, ctx: RenderContext) {
        let mut row = self.row(class, &ctx);
        row.type_label = match &class.class_name {
            Some(name) => format!("{} [{name}]", class.tag.name()),
            None => class.tag.name().to_string(),
        };
        row.rendered_value = Some(RECURSION_MARKER.to_string());
        row.recursion = true;
        self.rows.push(row);
    }

    fn row(&self, class: &Classification, ctx: &RenderContext) -> DumpNode {
        let marked = ctx
            .key
            .as_ref()
            .is_some_and(|key| self.options.mark_fields.iter().any(|f| *f == key.to_string()));
        DumpNode {
            tag: class.tag,
            type_label: class.type_label(),
            key: ctx.key.clone(),
            visibility: ctx.visibility,
            marked,
            depth: ctx.depth.iter().copied().collect(),
            containers: ctx.chain.to_vec(),
            hidden: ctx.chain.any_collapsed(),
            collapse_id: None,
            is_collapsed_initially: false,
            rendered_value: class.preview.clone(),
            recursion: false,
        }
    }
}

/// Renders values as collapsible trees
#[derive(Debug, Clone, Copy)]
pub struct TreeRenderer<'o> {
    options: &'o RenderOptions,
}

impl<'o> TreeRenderer<'o> {
    /// Create a renderer
    pub fn new(options: &'o RenderOptions) -> Self {
        Self { options }
    }

    /// Rows of a value with freshly salted collapse ids
    pub fn nodes(&self, value: &DumpValue, key: Option<FieldKey>) -> Vec<DumpNode> {
        self.nodes_with(value, key, CollapseIds::new())
    }

    /// Rows of a value, allocating collapse ids from `ids`
    ///
    /// Cycle detection starts from scratch on every call.
    pub fn nodes_with(
        &self,
        value: &DumpValue,
        key: Option<FieldKey>,
        ids: CollapseIds,
    ) -> Vec<DumpNode> {
        let mut traversal =
            Traversal { options: self.options, ids, visited: Vec::new(), rows: Vec::new() };
        traversal.visit(value, RenderContext { key, ..Default::default() });
        traversal.rows
    }

    /// Render a value
    pub fn render(&self, value: &DumpValue) -> String {
        self.render_nodes(&self.nodes(value, None))
    }

    /// Render a value under a key
    pub fn render_keyed(&self, value: &DumpValue, key: impl Into<FieldKey>) -> String {
        self.render_nodes(&self.nodes(value, Some(key.into())))
    }

    /// Format rows in the configured format
    pub fn render_nodes(&self, nodes: &[DumpNode]) -> String {
        nodes.iter().map(|node| format_row(node, self.options.format)).collect()
    }
}

/// Format one row
pub fn format_row(node: &DumpNode, format: OutputFormat) -> String {
    let row = html_row(node);
    match format {
        OutputFormat::Html => row,
        OutputFormat::Text => html::strip_markup(&row),
    }
}

fn html_row(node: &DumpNode) -> String {
    let containers: Vec<&str> = node.containers.iter().map(CollapseId::as_str).collect();
    let containers = containers.join(" ");
    let display = if node.hidden { " style=\"display:none;\"" } else { "" };
    let mut row = format!("<tr class=\"{containers}\"{display}><td>");

    if let Some((own, ancestors)) = node.depth.split_last() {
        row.push_str("<span class=\"dev-tree\">");
        for more in ancestors {
            row.push_str(if *more { "&nbsp;│&nbsp;" } else { "&nbsp;&nbsp;&nbsp;" });
        }
        row.push_str(if *own { "&nbsp;├─" } else { "&nbsp;└─" });
        row.push_str("</span>");
    }

    if let Some(key) = &node.key {
        let mut class = String::from("dev-item dev-key");
        match node.visibility {
            Visibility::Public => {}
            Visibility::Protected => class.push_str(" dev-key-protected"),
            Visibility::Private => class.push_str(" dev-key-private"),
        }
        if node.marked {
            class.push_str(" dev-key-marked");
        }
        let private = if node.visibility == Visibility::Private { "PRIVATE " } else { "" };
        row.push_str(&format!(
            "<span class=\"{class}\">[ {private}{} ]</span><span class=\"dev-item dev-arrow\"> =&gt; </span>",
            html::escape(&key.to_string())
        ));
    }

    let label = html::escape(&node.type_label);
    match &node.collapse_id {
        Some(id) => {
            let group =
                if containers.is_empty() { id.to_string() } else { format!("{containers} {id}") };
            let plus = if node.is_collapsed_initially { "inline" } else { "none" };
            row.push_str(&format!(
                "<a href=\"javascript:_debToggleVar('{id}','{group}');\" class=\"dev-item dev-toggle\">\
                 <span class=\"dev-type\">{label}</span></a>\
                 <span id=\"plus{id}\" class=\"dev-item dev-plus\" style=\"display:{plus};\"></span>\
                 <a href=\"javascript:_debToggleVar('{id}','{group}',1);\" class=\"dev-item dev-toggle-all\" title=\"Toggle all\"></a>"
            ));
        }
        None => row.push_str(&format!("<span class=\"dev-item dev-type\">{label}</span>")),
    }

    if let Some(value) = &node.rendered_value {
        let css = if node.recursion { "recursion" } else { node.tag.css_class() };
        row.push_str(&format!(
            "&nbsp;&nbsp;<span class=\"dev-item dev-val dev-val-{css}\">{value}</span>"
        ));
    }

    row.push_str("</td></tr>\n");
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectRef;

    fn text_options() -> RenderOptions {
        RenderOptions { format: OutputFormat::Text, ..Default::default() }
    }

    #[test]
    fn test_text_tree_shape() {
        let options = text_options();
        let value = DumpValue::map([
            ("b", DumpValue::list(vec![1, 2])),
            ("a", DumpValue::from("x")),
            ("c", DumpValue::Null),
        ]);
        let text = TreeRenderer::new(&options).render(&value);
        let expected: String = [
            "Array(3)",
            " ├─[ a ] => String(1)  \"x\"",
            " ├─[ b ] => Array(2)",
            " │  ├─[ 0 ] => Integer(1)  1",
            " │  └─[ 1 ] => Integer(1)  2",
            " └─[ c ] => NULL(0)",
        ]
        .iter()
        .map(|line| format!("{line}\n"))
        .collect();
        assert_eq!(text, expected);
    }

    #[test]
    fn test_unsorted_keeps_insertion_order() {
        let options = RenderOptions { sort_keys: false, ..text_options() };
        let value = DumpValue::map([("b", 1), ("a", 2), ("c", 3)]);
        let nodes = TreeRenderer::new(&options).nodes(&value, None);
        let keys: Vec<String> =
            nodes.iter().filter_map(|n| n.key.as_ref().map(ToString::to_string)).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_last_sibling_uses_rendered_order() {
        let options = RenderOptions { sort_keys: true, ..text_options() };
        let value = DumpValue::map([("z", 1), ("a", 2)]);
        let nodes = TreeRenderer::new(&options).nodes(&value, None);
        assert_eq!(nodes[1].key, Some(FieldKey::from("a")));
        assert_eq!(nodes[1].depth, vec![true]);
        assert_eq!(nodes[2].key, Some(FieldKey::from("z")));
        assert_eq!(nodes[2].depth, vec![false]);
    }

    #[test]
    fn test_visibility_and_marks() {
        let options = text_options();
        let object = ObjectRef::new("Account");
        object.set_field(Field::new("id", 5));
        object.set_field(Field::protected("balance", 10));
        object.set_field(Field::private("secret", "s"));
        let nodes = TreeRenderer::new(&options).nodes(&object.into(), None);

        let html: String = nodes.iter().map(|n| format_row(n, OutputFormat::Html)).collect();
        assert!(html.contains("dev-key-protected"));
        assert!(html.contains("dev-key dev-key-marked\">[ id ]"));
        assert!(html.contains("[ PRIVATE secret ]"));
    }

    #[test]
    fn test_empty_composite_has_no_toggle() {
        let options = RenderOptions::default();
        let nodes = TreeRenderer::new(&options).nodes(&DumpValue::Collection(vec![]), None);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].type_label, "Array(0)");
        assert!(nodes[0].collapse_id.is_none());
    }

    #[test]
    fn test_hidden_rows_follow_collapsed_ancestors() {
        let options = RenderOptions { depth: 2, ..Default::default() };
        let inner = DumpValue::map([("inner", DumpValue::map([("leaf", 1)]))]);
        let value = DumpValue::map([("outer", inner)]);
        let nodes = TreeRenderer::new(&options).nodes(&value, None);

        // root, outer, inner, leaf
        assert_eq!(nodes.len(), 4);
        assert!(!nodes[0].is_collapsed_initially && !nodes[0].hidden);
        assert!(nodes[1].is_collapsed_initially && !nodes[1].hidden);
        assert!(nodes[2].is_collapsed_initially && nodes[2].hidden);
        assert!(nodes[3].hidden);
        assert_eq!(nodes[3].containers.len(), 3);
    }

    #[test]
    fn test_keyed_root_has_no_branch() {
        let options = text_options();
        let text = TreeRenderer::new(&options).render_keyed(&DumpValue::Int(7), "answer");
        assert_eq!(text, "[ answer ] => Integer(1)  7\n");
    }

    #[test]
    fn test_shared_object_is_reported_once_per_call() {
        let options = text_options();
        let shared = ObjectRef::new("Shared").with_field("v", 1);
        let value = DumpValue::list(vec![shared.clone(), shared]);
        let renderer = TreeRenderer::new(&options);

        let first = renderer.render(&value);
        assert_eq!(first.matches(RECURSION_MARKER).count(), 1);
        // visited objects never leak into the next call
        assert_eq!(renderer.render(&value), first);
    }
}
