use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use scanner_core::{law_link, render, rules, Graph, RiskAnnotation, RiskStatus, Settings};
use scanner_engine::{Analyzer, LlmClient, ModelClient};
use serde::Deserialize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AnalyzeScenarioRequest {
    /// Free-text audit scenario (Korean or English): who audits whom, which firm units are involved, and any holdings, loans, services or family ties with amounts.
    scenario: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RenderRiskMapRequest {
    /// Graph in the analyze_scenario `graph` shape: {nodes: [{id, label?, properties: {name?, type?, firm_role?, position?}}], relationships: [{source_id, target_id, type}]}
    graph: Graph,
    /// Node ids to highlight as risky
    #[serde(default)]
    risky_node_ids: Vec<String>,
    /// 0-based positions in `relationships` to highlight as risky
    #[serde(default)]
    risky_edge_indices: Vec<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct LawContextRequest {
    /// Graph to scan for statute keywords
    graph: Graph,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct NormalizeStatusRequest {
    /// Free-form verdict text, e.g. "결론: 수임 불가"
    status: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct LawLinkRequest {
    /// Citation such as "공인회계사법 제21조"
    citation: String,
}

const INSTRUCTIONS: &str = r#"Audit independence scanner.

Use `analyze_scenario` to classify a scenario as one of "수임 불가" (unacceptable), "안전장치 적용 시 수임 가능" (acceptable with safeguards) or "수임 가능" (acceptable). "검토 중" means the model output could not be classified and a person must review it.

The report contains the extracted graph, the injected law context, the HTML opinion, safeguards, cited laws with law.go.kr links, and a mermaid.ink risk-map URL.

The deterministic tools (`render_risk_map`, `law_context`, `normalize_status`, `law_link`) make no model calls. Use them to re-render an edited graph or to re-check a verdict string.

Results support an auditor's judgement; they are not a legal opinion."#;

// --- Server ---

#[derive(Clone)]
pub struct ScannerServer {
    analyzer: Arc<Analyzer<Box<dyn ModelClient>>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ScannerServer {
    pub fn new(analyzer: Analyzer<Box<dyn ModelClient>>) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Run the full independence analysis on a scenario: extract entities and relationships, inject statute context, obtain an expert opinion, and render a risk map. Returns the JSON report {status, status_color, reason_html, safeguards, relevant_laws, law_links, graph, law_context, risky_node_ids, risky_edge_indices, graph_image_url}. Calls the configured model provider twice."
    )]
    async fn analyze_scenario(
        &self,
        Parameters(req): Parameters<AnalyzeScenarioRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.analyzer.analyze(&req.scenario).await {
            Ok(report) => {
                let json = serde_json::to_string_pretty(&report)
                    .unwrap_or_else(|e| format!("Serialization error: {}", e));
                Ok(CallToolResult::success(vec![Content::text(json)]))
            }
            Err(e) => {
                tracing::error!(error = %e, "analyze_scenario failed");
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Analysis failed: {}",
                    e
                ))]))
            }
        }
    }

    #[tool(
        description = "Render a graph as a Mermaid risk map. Returns the mermaid.ink image URL on the first line, then the Mermaid source. Risky nodes get a warning glyph and red dashed border; risky relationships are drawn as dashed arrows. Unknown ids and out-of-range indices are ignored."
    )]
    fn render_risk_map(
        &self,
        Parameters(req): Parameters<RenderRiskMapRequest>,
    ) -> Result<CallToolResult, McpError> {
        let risk = RiskAnnotation::new(req.risky_node_ids, req.risky_edge_indices);
        let markup = render::render_mermaid(&req.graph, &risk);
        let text = format!(
            "{}\n\n```mermaid\n{}\n```",
            render::mermaid_image_url(&markup),
            markup
        );
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(
        description = "List the statute citations triggered by keywords in a graph (holdings, non-audit services, loans, family ties). Returns one citation per line, or the general-principles sentence when nothing matches."
    )]
    fn law_context(
        &self,
        Parameters(req): Parameters<LawContextRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            rules::law_context(&req.graph),
        )]))
    }

    #[tool(
        description = "Map free-form verdict text onto one of 수임 불가 / 안전장치 적용 시 수임 가능 / 수임 가능, or 검토 중 when it matches none. Returns the canonical phrase."
    )]
    fn normalize_status(
        &self,
        Parameters(req): Parameters<NormalizeStatusRequest>,
    ) -> Result<CallToolResult, McpError> {
        let status = RiskStatus::normalize(&req.status);
        Ok(CallToolResult::success(vec![Content::text(
            status.as_str().to_string(),
        )]))
    }

    #[tool(
        description = "Build a law.go.kr link for a citation. Citations naming a statute (\"...법\", optionally \"제N조\") link to the statute page; anything else links to a registry search."
    )]
    fn law_link(
        &self,
        Parameters(req): Parameters<LawLinkRequest>,
    ) -> Result<CallToolResult, McpError> {
        match law_link::law_url(&req.citation) {
            Ok(url) => Ok(CallToolResult::success(vec![Content::text(url.to_string())])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to build link for '{}': {}",
                req.citation, e
            ))])),
        }
    }
}

#[tool_handler]
impl ServerHandler for ScannerServer {
    fn get_info(&self) -> ServerInfo {
        let statutes = rules::LAW_RULES
            .iter()
            .map(|r| format!("- {}", r.citation))
            .collect::<Vec<_>>()
            .join("\n");
        let instructions = format!("{}\n\n## Keyword statutes\n{}", INSTRUCTIONS, statutes);
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let settings = Settings::load();
    if !settings.ai_configured() {
        tracing::warn!(provider = %settings.provider, "no API key configured; analyze_scenario will fail");
    }
    let client: Box<dyn ModelClient> = Box::new(LlmClient::new(&settings));
    let analyzer = Analyzer::new(client, &settings);

    let service = ScannerServer::new(analyzer)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!("MCP server error: {}", e))?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanner_engine::testing::ScriptedClient;
    use scanner_engine::EngineError;

    fn server(responses: Vec<Result<String, EngineError>>) -> ScannerServer {
        let client: Box<dyn ModelClient> = Box::new(ScriptedClient::new(responses));
        ScannerServer::new(Analyzer::new(client, &Settings::default()))
    }

    fn text_of(result: &CallToolResult) -> String {
        let value = serde_json::to_value(result).unwrap();
        value["content"][0]["text"].as_str().unwrap().to_string()
    }

    fn is_error(result: &CallToolResult) -> bool {
        result.is_error == Some(true)
    }

    fn sample_graph() -> Graph {
        serde_json::from_value(serde_json::json!({
            "nodes": [
                {"id": "p1", "properties": {"name": "김한국", "firm_role": "감사인"}},
                {"id": "o1", "properties": {"name": "㈜대한그룹"}}
            ],
            "relationships": [{"source_id": "p1", "target_id": "o1", "type": "OWNS"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn analyze_scenario_returns_report_json() {
        let graph = serde_json::to_string(&sample_graph()).unwrap();
        let opinion = r#"{"status": "수임 불가", "risky_node_ids": ["p1"], "risky_edge_indices": [0]}"#;
        let srv = server(vec![Ok(graph), Ok(opinion.to_string())]);

        let result = srv
            .analyze_scenario(Parameters(AnalyzeScenarioRequest {
                scenario: "김한국 회계사가 ㈜대한그룹 주식을 보유".to_string(),
            }))
            .await
            .unwrap();

        assert!(!is_error(&result));
        let report: serde_json::Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(report["status"], "수임 불가");
        assert_eq!(report["risky_edge_indices"], serde_json::json!([0]));
    }

    #[tokio::test]
    async fn analyze_scenario_reports_upstream_failure_as_tool_error() {
        let srv = server(vec![Err(EngineError::Upstream("401 Unauthorized".to_string()))]);
        let result = srv
            .analyze_scenario(Parameters(AnalyzeScenarioRequest {
                scenario: "시나리오".to_string(),
            }))
            .await
            .unwrap();
        assert!(is_error(&result));
        assert!(text_of(&result).contains("401 Unauthorized"));
    }

    #[test]
    fn render_risk_map_returns_url_then_markup() {
        let srv = server(vec![]);
        let result = srv
            .render_risk_map(Parameters(RenderRiskMapRequest {
                graph: sample_graph(),
                risky_node_ids: vec!["p1".to_string()],
                risky_edge_indices: vec![0, 5],
            }))
            .unwrap();
        let text = text_of(&result);
        let mut lines = text.lines();
        let url = lines.next().unwrap();
        assert!(url.starts_with(render::MERMAID_IMAGE_BASE));
        assert!(text.contains("```mermaid\ngraph TD\n"));
        assert!(text.contains("    p1 -. \"⚠️ OWNS\" .-> o1"));
    }

    #[test]
    fn law_context_and_status_tools() {
        let srv = server(vec![]);
        let ctx = srv
            .law_context(Parameters(LawContextRequest {
                graph: sample_graph(),
            }))
            .unwrap();
        assert_eq!(text_of(&ctx), rules::LAW_RULES[0].citation);

        let status = srv
            .normalize_status(Parameters(NormalizeStatusRequest {
                status: " 수임 불가 ".to_string(),
            }))
            .unwrap();
        assert_eq!(text_of(&status), "수임 불가");
    }

    #[test]
    fn law_link_tool_builds_statute_url() {
        let srv = server(vec![]);
        let result = srv
            .law_link(Parameters(LawLinkRequest {
                citation: "외부감사법 제9조".to_string(),
            }))
            .unwrap();
        assert!(text_of(&result).starts_with("https://www.law.go.kr/"));
    }
}
