use scanner_core::{Graph, RiskStatus};

pub const EXTRACTION_TEMPERATURE: f32 = 0.0;
pub const OPINION_TEMPERATURE: f32 = 0.1;

pub fn extraction_system_prompt() -> String {
    "당신은 회계감사 관계 추출 전문가입니다. 입력된 시나리오에서 등장하는 인물, 회사, 자산과 \
그 사이의 관계를 추출하여 JSON 객체 하나로만 답하세요.\n\n\
형식:\n\
{\"nodes\": [{\"id\": \"p1\", \"label\": \"Person|Organization|Asset\", \
\"properties\": {\"name\": \"...\", \"firm_role\": \"...\", \"position\": \"...\", \"is_client\": true, \"value\": \"...\"}}],\n \
\"relationships\": [{\"source_id\": \"p1\", \"target_id\": \"o1\", \"type\": \"EMPLOYED_BY\"}]}\n\n\
- id는 인물 p1, p2…, 조직 o1, o2…, 자산 a1, a2… 처럼 영문자와 숫자만 사용하세요.\n\
- type은 EMPLOYED_BY, OWNS, ISSUED_BY, FAMILY_OF, PROVIDES_SERVICE_TO, BORROWED_FROM 처럼 \
대문자와 밑줄로 쓰세요.\n\
- JSON 외의 설명은 쓰지 마세요."
        .to_string()
}

pub fn opinion_system_prompt() -> String {
    let statuses = RiskStatus::CANONICAL
        .iter()
        .map(|s| format!("- \"{}\"", s.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "당신은 대형 회계법인 품질관리실 파트너(Senior Audit Quality Control Partner)입니다. \
한국 공인회계사 윤리기준, 외부감사법, 공인회계사법에 비추어 감사 독립성 위협을 평가하고 \
아래 세 가지 중 하나로 신중하게 분류합니다.\n\n\
{statuses}\n\n\
판단 기준:\n\
- 수임 불가: 법령상 절대적 금지이거나 어떤 안전장치로도 해소되지 않는 중대한 위반 \
(감사인·배우자의 피감사회사 지분 보유, 고액 직접 대출·보증, 경영진 겸직 등).\n\
- 안전장치 적용 시 수임 가능: 위협은 있으나 격리, 처분, 팀 교체, 자문부서 분리 등으로 \
수용 가능한 수준까지 낮출 수 있는 경우.\n\
- 수임 가능: 위협이 중요하지 않거나 식별되지 않는 경우 (통상적인 상거래 등).\n\n\
작성 지침:\n\
1. reason은 HTML(<b>, <li>, <br>)로 세 섹션을 작성합니다: \
<b style='color:#64b5f6'>[핵심 위반 사항]</b>, <b style='color:#64b5f6'>[법적/규정 판단]</b>, \
<b style='color:#64b5f6'>[실무적 시사점]</b>.\n\
2. safeguards는 상태에 맞게 씁니다. 수임 불가라면 왜 어떤 안전장치로도 해결할 수 없는지, \
안전장치 적용 시 수임 가능이라면 즉시 실행 가능한 조치를, 수임 가능이라면 위협이 경미한 이유와 \
필요한 경우의 주의사항만 적습니다.\n\
3. risky_node_ids에는 [데이터]의 노드 id를, risky_edge_indices에는 relationships 배열의 \
0부터 시작하는 위치(정수)를 넣습니다.\n\n\
JSON 객체 하나로만 답하세요:\n\
{{\"status\": \"<위 세 값 중 하나>\", \"reason\": \"<HTML 의견>\", \"safeguards\": [\"...\"], \
\"relevant_laws\": [\"공인회계사법 제21조\"], \"risky_node_ids\": [\"p1\"], \"risky_edge_indices\": [0]}}"
    )
}

/// Scenario, extracted graph and injected law context for stage 3.
pub fn opinion_user_message(scenario: &str, graph: &Graph, law_context: &str) -> String {
    let graph_json = serde_json::to_string(graph).unwrap_or_else(|_| "{}".to_string());
    format!("[시나리오] {scenario}\n[데이터] {graph_json}\n[법령 컨텍스트] {law_context}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanner_core::{Edge, Node};

    #[test]
    fn opinion_prompt_lists_every_canonical_status() {
        let prompt = opinion_system_prompt();
        for status in RiskStatus::CANONICAL {
            assert!(prompt.contains(&format!("\"{}\"", status.as_str())));
        }
        assert!(!prompt.contains(RiskStatus::UnderReview.as_str()));
    }

    #[test]
    fn user_message_embeds_graph_without_ascii_escaping() {
        let graph = Graph {
            nodes: vec![Node {
                id: "p1".to_string(),
                properties: [("name".to_string(), serde_json::json!("김한국"))].into(),
                ..Node::default()
            }],
            relationships: vec![Edge {
                source_id: "p1".to_string(),
                target_id: "o1".to_string(),
                kind: Some("EMPLOYED_BY".to_string()),
                ..Edge::default()
            }],
            error: None,
        };
        let msg = opinion_user_message("시나리오 본문", &graph, "일반적 독립성 준수 원칙 적용");
        assert!(msg.starts_with("[시나리오] 시나리오 본문\n"));
        assert!(msg.contains("\"name\":\"김한국\""));
        assert!(msg.contains("\"type\":\"EMPLOYED_BY\""));
        assert!(msg.ends_with("[법령 컨텍스트] 일반적 독립성 준수 원칙 적용"));
    }
}
