use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use scanner_core::{Graph, Opinion, UpstreamError};

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid fence regex"));

/// Body of the first ```json fence, or the whole text when there is none.
fn extract_json_body(raw: &str) -> &str {
    JSON_FENCE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or(raw, |m| m.as_str())
}

/// Parse model output as JSON. Failures become the upstream error marker.
pub fn parse_json(raw: &str) -> Result<Value, UpstreamError> {
    serde_json::from_str(extract_json_body(raw)).map_err(|e| UpstreamError::parse(e.to_string()))
}

/// Stage 1 output. Unusable text yields an empty graph carrying the marker.
pub fn parse_graph(raw: &str) -> Graph {
    let value = match parse_json(raw) {
        Ok(v) => v,
        Err(marker) => return Graph::failed(marker),
    };
    serde_json::from_value(value).unwrap_or_else(|e| Graph::failed(UpstreamError::parse(e.to_string())))
}

/// Stage 3 output. Unusable text yields an empty opinion carrying the marker,
/// which later normalizes to "검토 중".
pub fn parse_opinion(raw: &str) -> Opinion {
    let value = match parse_json(raw) {
        Ok(v) => v,
        Err(marker) => return Opinion::failed(marker),
    };
    serde_json::from_value(value)
        .unwrap_or_else(|e| Opinion::failed(UpstreamError::parse(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_is_parsed() {
        let graph = parse_graph(
            r#"{"nodes":[{"id":"p1","label":"Person","properties":{"name":"김한국"}}],"relationships":[]}"#,
        );
        assert!(graph.error.is_none());
        assert_eq!(graph.nodes[0].id, "p1");
    }

    #[test]
    fn fenced_json_is_extracted() {
        let raw = "분석 결과입니다.\n```json\n{\"status\": \"수임 가능\", \"safeguards\": [\"없음\"]}\n```\n끝.";
        let opinion = parse_opinion(raw);
        assert!(opinion.error.is_none());
        assert_eq!(opinion.status, "수임 가능");
        assert_eq!(opinion.safeguards, vec!["없음"]);
    }

    #[test]
    fn garbage_yields_marker_not_panic() {
        let graph = parse_graph("I could not find any entities.");
        let marker = graph.error.expect("marker");
        assert_eq!(marker.error, UpstreamError::JSON_PARSE_ERROR);
        assert!(!marker.details.is_empty());
        assert!(graph.nodes.is_empty());

        let opinion = parse_opinion("");
        assert!(opinion.error.is_some());
        assert_eq!(opinion.status, "");
    }

    #[test]
    fn wrong_shape_yields_marker() {
        let graph = parse_graph(r#"{"nodes": "p1, p2"}"#);
        assert!(graph.error.is_some());
        assert!(graph.nodes.is_empty());

        let opinion = parse_opinion("\"수임 가능\"");
        assert!(opinion.error.is_some());
    }

    #[test]
    fn bad_optional_field_does_not_discard_graph() {
        let graph = parse_graph(
            r#"{"nodes":[{"id":"p1","label":["Person"]},{"id":"a1","properties":{"name":"대한그룹 주식"}}],
               "relationships":[{"source_id":"p1","target_id":"a1","type":"OWNS"}]}"#,
        );
        assert!(graph.error.is_none());
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.relationships.len(), 1);
    }

    #[test]
    fn unterminated_fence_falls_back_to_whole_text() {
        assert!(parse_json("```json\n{\"a\": 1}").is_err());
        assert_eq!(parse_json("{\"a\": 1}").unwrap()["a"], 1);
    }
}
