pub mod engine;
pub mod error;
pub mod parse;
mod prompt;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use scanner_core::{rules, AnalysisReport, Graph, Opinion, Settings};

pub use engine::{CompletionRequest, LlmClient, ModelClient};
pub use error::EngineError;

/// Runs the pipeline: extract graph, inject law context, ask for an opinion,
/// then normalize and render. Stages run strictly in sequence.
pub struct Analyzer<C> {
    client: C,
    graph_model: String,
    analysis_model: String,
}

impl<C: ModelClient> Analyzer<C> {
    pub fn new(client: C, settings: &Settings) -> Self {
        Self {
            client,
            graph_model: settings.graph_model.clone(),
            analysis_model: settings.analysis_model.clone(),
        }
    }

    pub async fn analyze(&self, scenario: &str) -> Result<AnalysisReport, EngineError> {
        if scenario.trim().is_empty() {
            return Err(EngineError::EmptyScenario);
        }

        tracing::info!(chars = scenario.chars().count(), "stage 1/3: structuring scenario");
        let graph = self.extract_graph(scenario).await?;
        if let Some(marker) = &graph.error {
            tracing::warn!(details = %marker.details, "graph extraction output unusable, continuing with empty graph");
        }

        tracing::info!(
            nodes = graph.nodes.len(),
            relationships = graph.relationships.len(),
            "stage 2/3: injecting law context"
        );
        let law_context = rules::law_context(&graph);

        tracing::info!("stage 3/3: generating expert opinion");
        let opinion = self.opine(scenario, &graph, &law_context).await?;
        if let Some(marker) = &opinion.error {
            tracing::warn!(details = %marker.details, "opinion output unusable, status falls back to review");
        }

        let report = AnalysisReport::assemble(graph, law_context, opinion);
        tracing::info!(status = %report.status, "analysis complete");
        Ok(report)
    }

    /// Stage 1: scenario to entity/relationship graph.
    pub async fn extract_graph(&self, scenario: &str) -> Result<Graph, EngineError> {
        let request = CompletionRequest {
            model: self.graph_model.clone(),
            system: prompt::extraction_system_prompt(),
            user: scenario.to_string(),
            temperature: prompt::EXTRACTION_TEMPERATURE,
        };
        let raw = self.client.complete(&request).await?;
        tracing::debug!(raw = %raw, "raw extraction output");
        Ok(parse::parse_graph(&raw))
    }

    /// Stage 3: scenario, graph and law context to a raw opinion.
    pub async fn opine(
        &self,
        scenario: &str,
        graph: &Graph,
        law_context: &str,
    ) -> Result<Opinion, EngineError> {
        let request = CompletionRequest {
            model: self.analysis_model.clone(),
            system: prompt::opinion_system_prompt(),
            user: prompt::opinion_user_message(scenario, graph, law_context),
            temperature: prompt::OPINION_TEMPERATURE,
        };
        let raw = self.client.complete(&request).await?;
        tracing::debug!(raw = %raw, "raw opinion output");
        Ok(parse::parse_opinion(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;
    use scanner_core::{render, RiskStatus};

    const GRAPH_JSON: &str = r#"{
        "nodes": [
            {"id": "p1", "label": "Person", "properties": {"name": "김한국", "firm_role": "감사인"}},
            {"id": "o1", "label": "Organization", "properties": {"name": "㈜대한그룹", "is_client": true}},
            {"id": "a1", "label": "Asset", "properties": {"name": "㈜대한그룹 주식"}}
        ],
        "relationships": [
            {"source_id": "p1", "target_id": "a1", "type": "OWNS"},
            {"source_id": "a1", "target_id": "o1", "type": "ISSUED_BY"}
        ]
    }"#;

    const OPINION_JSON: &str = r#"```json
    {
        "status": "결론: 수임 불가",
        "reason": "<b>지분 보유</b>",
        "safeguards": ["법령상 절대적 금지 사유로 인해 어떠한 안전장치로도 해결 불가능함"],
        "relevant_laws": ["공인회계사법 제21조"],
        "risky_node_ids": ["p1", "a1"],
        "risky_edge_indices": ["0"]
    }
    ```"#;

    fn settings() -> Settings {
        Settings {
            graph_model: "graph-model".to_string(),
            analysis_model: "analysis-model".to_string(),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn full_pipeline_produces_normalized_report() {
        let client = ScriptedClient::new([Ok(GRAPH_JSON.to_string()), Ok(OPINION_JSON.to_string())]);
        let analyzer = Analyzer::new(client, &settings());

        let report = analyzer.analyze("김한국 회계사는 ㈜대한그룹 주식을 보유하고 있다.").await.unwrap();

        assert_eq!(report.status, RiskStatus::Unacceptable);
        assert_eq!(report.reason_html, "<b>지분 보유</b>");
        assert_eq!(report.law_context, rules::LAW_RULES[0].citation);
        assert_eq!(report.risky_edge_indices, vec![0]);
        assert_eq!(report.law_links.len(), 1);

        let annotation = scanner_core::RiskAnnotation::new(
            ["p1".to_string(), "a1".to_string()],
            [0],
        );
        assert_eq!(report.graph_image_url, render::graph_image_url(&report.graph, &annotation));
    }

    #[tokio::test]
    async fn stages_use_their_own_model_and_temperature() {
        let client = ScriptedClient::new([Ok(GRAPH_JSON.to_string()), Ok(OPINION_JSON.to_string())]);
        let analyzer = Analyzer::new(client, &settings());
        analyzer.analyze("시나리오").await.unwrap();

        let requests = analyzer.client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].model, "graph-model");
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].user, "시나리오");
        assert_eq!(requests[1].model, "analysis-model");
        assert_eq!(requests[1].temperature, 0.1);
        assert!(requests[1].user.contains("[법령 컨텍스트] [공인회계사법 제21조]"));
    }

    #[tokio::test]
    async fn unparseable_outputs_degrade_instead_of_failing() {
        let client = ScriptedClient::new([
            Ok("no json here".to_string()),
            Ok("still nothing".to_string()),
        ]);
        let analyzer = Analyzer::new(client, &settings());

        let report = analyzer.analyze("시나리오").await.unwrap();

        assert!(report.graph.error.is_some());
        assert_eq!(report.status, RiskStatus::UnderReview);
        assert_eq!(report.law_context, rules::DEFAULT_LAW_CONTEXT);
        assert!(report.safeguards.is_empty());
        assert!(report.graph_image_url.starts_with(render::MERMAID_IMAGE_BASE));
    }

    #[tokio::test]
    async fn upstream_failure_propagates() {
        let client = ScriptedClient::new([Err(EngineError::Upstream("connection refused".to_string()))]);
        let analyzer = Analyzer::new(client, &settings());

        let err = analyzer.analyze("시나리오").await.unwrap_err();
        assert!(matches!(err, EngineError::Upstream(_)));
        assert_eq!(analyzer.client.requests().len(), 1);
    }

    #[tokio::test]
    async fn blank_scenario_is_rejected_before_any_call() {
        let analyzer = Analyzer::new(ScriptedClient::new([]), &settings());
        assert!(matches!(analyzer.analyze("  \n ").await, Err(EngineError::EmptyScenario)));
        assert!(analyzer.client.requests().is_empty());
    }
}
