use regex::Regex;
use std::fmt::Write;
use std::sync::LazyLock;

use scanner_core::AnalysisReport;

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</?(p|ul|ol|div)\b[^>]*>").expect("valid break regex"));
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("valid list regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank regex"));

/// Plain-text rendition of the HTML opinion for terminals.
pub fn html_to_text(html: &str) -> String {
    let text = LINE_BREAK.replace_all(html, "\n");
    let text = LIST_ITEM.replace_all(&text, "\n- ");
    let text = TAG.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    let text: String = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN.replace_all(text.trim(), "\n\n").into_owned()
}

/// Terminal report: verdict, risk map, opinion, safeguards, law links.
pub fn render_text(report: &AnalysisReport) -> String {
    let mut out = String::with_capacity(1024);

    let _ = writeln!(out, "판정: {}", report.status);
    let _ = writeln!(out, "리스크 맵: {}", report.graph_image_url);
    out.push('\n');

    out.push_str("[AI 리스크 진단 보고서]\n");
    let reason = html_to_text(&report.reason_html);
    if reason.is_empty() {
        out.push_str("(의견 없음)\n");
    } else {
        out.push_str(&reason);
        out.push('\n');
    }
    out.push('\n');

    out.push_str("[Safeguards / 조치 사항]\n");
    if report.safeguards.is_empty() {
        out.push_str("추가로 제안된 안전장치(safeguards)가 없습니다.\n");
    }
    for (i, s) in report.safeguards.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, s);
    }
    out.push('\n');

    out.push_str("[관련 법령]\n");
    if report.law_links.is_empty() {
        out.push_str("모델이 특정 법령 조항을 명시적으로 식별하지 않았습니다.\n");
    }
    for link in &report.law_links {
        let _ = writeln!(out, "- {} <{}>", link.citation, link.url);
    }
    out.push('\n');

    out.push_str("[적용된 법령 컨텍스트]\n");
    out.push_str(&report.law_context);
    out.push('\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scanner_core::{AnalysisReport, Graph, Opinion};

    #[test]
    fn html_is_flattened() {
        let html = "<b style='color:#64b5f6'>[핵심 위반 사항]</b><br><ul><li>지분 보유</li><li>대출 &amp; 보증</li></ul>";
        assert_eq!(html_to_text(html), "[핵심 위반 사항]\n\n- 지분 보유\n- 대출 & 보증");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(html_to_text("  위협 없음  "), "위협 없음");
    }

    #[test]
    fn text_report_lists_safeguards_and_links() {
        let opinion = Opinion {
            status: "안전장치 적용 시 수임 가능".to_string(),
            reason: "<b>경미한 위협</b>".to_string(),
            safeguards: vec!["지분 처분".to_string(), "팀 교체".to_string()],
            relevant_laws: vec!["공인회계사법 제21조".to_string()],
            ..Opinion::default()
        };
        let report = AnalysisReport::assemble(Graph::default(), "컨텍스트".to_string(), opinion);
        let text = render_text(&report);

        assert!(text.starts_with("판정: 안전장치 적용 시 수임 가능\n리스크 맵: https://mermaid.ink/img/"));
        assert!(text.contains("경미한 위협\n"));
        assert!(text.contains("1. 지분 처분\n2. 팀 교체\n"));
        assert!(text.contains("- 공인회계사법 제21조 <https://www.law.go.kr/"));
        assert!(text.ends_with("[적용된 법령 컨텍스트]\n컨텍스트\n"));
    }

    #[test]
    fn empty_sections_get_placeholders() {
        let report = AnalysisReport::assemble(Graph::default(), "ctx".to_string(), Opinion::default());
        let text = render_text(&report);
        assert!(text.starts_with("판정: 검토 중\n"));
        assert!(text.contains("(의견 없음)"));
        assert!(text.contains("추가로 제안된 안전장치(safeguards)가 없습니다."));
        assert!(text.contains("모델이 특정 법령 조항을 명시적으로 식별하지 않았습니다."));
    }
}
