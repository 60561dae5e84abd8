//! Keyword-triggered law citations injected into the opinion prompt.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::Graph;

/// A citation that applies when any of its keywords shows up in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LawRule {
    pub keywords: &'static [&'static str],
    pub citation: &'static str,
}

/// Evaluated in declaration order; the output keeps that order.
pub const LAW_RULES: &[LawRule] = &[
    // equity and membership holdings
    LawRule {
        keywords: &["주식", "회원권", "지분", "OWNS"],
        citation: "[공인회계사법 제21조] 감사인 또는 그 배우자가 피감사회사의 주식, 사채, 회원권 등을 보유한 경우 감사업무 금지.",
    },
    // non-audit services
    LawRule {
        keywords: &["계리", "자문", "Consulting"],
        citation: "[외부감사법 제9조] 비감사서비스(보험계리, 내부통제 구축 등) 제공 시 독립성 훼손으로 간주.",
    },
    // loans and borrowings
    LawRule {
        keywords: &["카드", "할부", "대출", "차입"],
        citation: "[공인회계사법 시행령 제14조] 5천만원 이상의 채권/채무는 금지되나, 금융기관의 통상적 약관에 따른 거래는 예외.",
    },
    // family ties
    LawRule {
        keywords: &["배우자", "FAMILY_OF"],
        citation: "[윤리기준] 감사팀 소속원의 직계 가족이 피감사인의 임원인 경우 수임 제한.",
    },
];

pub const DEFAULT_LAW_CONTEXT: &str = "일반적 독립성 준수 원칙 적용";

/// Text the rule keywords are matched against: every node label, every
/// scalar found in node properties and extra fields (nested lists and
/// objects included, in key order), and every relationship type and
/// attribute value, one per line. Ids and keys are not part of it.
pub fn graph_projection(graph: &Graph) -> String {
    let mut fields: Vec<String> = Vec::new();
    for node in &graph.nodes {
        if let Some(label) = &node.label {
            fields.push(label.clone());
        }
        for value in node.properties.values().chain(extra_values(&node.extra)) {
            push_scalars(value, &mut fields);
        }
    }
    for edge in &graph.relationships {
        if let Some(kind) = &edge.kind {
            fields.push(kind.clone());
        }
        for value in extra_values(&edge.extra) {
            push_scalars(value, &mut fields);
        }
    }
    fields.join("\n")
}

fn extra_values(extra: &BTreeMap<String, Value>) -> impl Iterator<Item = &Value> {
    extra
        .iter()
        .filter(|(key, _)| key.as_str() != "id")
        .map(|(_, value)| value)
}

fn push_scalars(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.is_empty() => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => items.iter().for_each(|v| push_scalars(v, out)),
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            entries.into_iter().for_each(|(_, v)| push_scalars(v, out));
        }
        _ => {}
    }
}

/// Rules with at least one keyword present (case-insensitive), in declaration order.
pub fn matching_rules(graph: &Graph) -> Vec<&'static LawRule> {
    let haystack = graph_projection(graph).to_lowercase();
    LAW_RULES
        .iter()
        .filter(|rule| {
            rule.keywords
                .iter()
                .any(|k| haystack.contains(&k.to_lowercase()))
        })
        .collect()
}

/// Newline-joined citations for the graph, or the general-principles sentence.
pub fn law_context(graph: &Graph) -> String {
    let rules = matching_rules(graph);
    if rules.is_empty() {
        return DEFAULT_LAW_CONTEXT.to_string();
    }
    rules
        .iter()
        .map(|r| r.citation)
        .collect::<Vec<_>>()
        .join("\n")
}
