#![forbid(unsafe_code)]

//! `[[display text|TARGET-KEY]]` links embedded in protocol relation notes.

use crate::model::Protocol;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::OnceLock;

// Stricter than the lenient `\[\[.*?\|(.*?)\]\]` on purpose: the display text
// must be non-empty and free of `|`, so `[[|KEY]]` is not a link. Targets
// are trimmed by the callers.
fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^|\]]+)\|([^\]]+)\]\]").expect("valid link regex"))
}

/// Distinct link targets, trimmed. Empty targets are ignored.
pub fn extract_link_targets(text: &str) -> BTreeSet<String> {
    link_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(2))
        .map(|m| m.as_str().trim())
        .filter(|target| !target.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LinkEdge {
    pub from: String,
    pub to: String,
    pub arrows: &'static str,
}

/// One edge per distinct target; a record never links to itself.
pub fn link_edges(source_key: &str, text: &str) -> Vec<LinkEdge> {
    let source_key = source_key.trim();
    extract_link_targets(text)
        .into_iter()
        .filter(|target| target != source_key)
        .map(|to| LinkEdge {
            from: source_key.to_string(),
            to,
            arrows: "to",
        })
        .collect()
}

/// Escaped `\n` sequences and real newlines become `<br>`.
pub fn nl2br(text: &str) -> String {
    text.replace("\\n", "<br>").replace("\r\n", "<br>").replace('\n', "<br>")
}

pub fn render_relations_html(text: &str) -> String {
    let text = nl2br(text);
    link_regex()
        .replace_all(&text, |caps: &Captures<'_>| {
            format!(
                "<a href=\"protokol.html?ownerId={}\">{}</a>",
                caps[2].trim(),
                &caps[1]
            )
        })
        .into_owned()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProtocolNode {
    pub id: String,
    pub label: String,
    pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolGraph {
    pub nodes: Vec<ProtocolNode>,
    pub edges: Vec<LinkEdge>,
}

impl ProtocolGraph {
    /// Edges to keys that are not in `protocols` are kept.
    pub fn build<'a>(protocols: impl IntoIterator<Item = &'a Protocol>) -> Self {
        let mut graph = Self::default();
        for protocol in protocols {
            let order = protocol.order_label();
            graph.nodes.push(ProtocolNode {
                id: protocol.key.to_string(),
                label: format!("{}\n(Lp. {order})", protocol.owner_name),
                title: format!("Protokół Lp. {order}"),
            });
            if let Some(relations) = protocol.relations.as_deref() {
                graph
                    .edges
                    .extend(link_edges(protocol.key.as_str(), relations));
            }
        }
        graph
    }
}
