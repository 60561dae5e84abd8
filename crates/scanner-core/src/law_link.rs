use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

const LAW_BASE: &str = "https://www.law.go.kr/법령/";
const LAW_SEARCH: &str = "https://www.law.go.kr/DRF/lawSearch.do";

/// A Korean statute name ("...법") with an optional article ("제21조").
static LAW_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([가-힣]+법)\s*(제?\d+조)?").expect("valid law token regex"));

/// A cited provision with its law.go.kr lookup link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LawLink {
    pub citation: String,
    pub url: String,
}

impl LawLink {
    pub fn new(citation: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            citation: citation.to_string(),
            url: law_url(citation)?.into(),
        })
    }
}

/// Direct statute page when the citation names a law, registry search otherwise.
pub fn law_url(citation: &str) -> Result<Url, url::ParseError> {
    let Some(caps) = LAW_TOKEN.captures(citation) else {
        return Url::parse_with_params(LAW_SEARCH, [("target", "law"), ("query", citation)]);
    };

    let mut url = Url::parse(LAW_BASE)?;
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(&caps[1]);
        if let Some(article) = caps.get(2) {
            segments.push(article.as_str());
        }
    }
    Ok(url)
}

pub fn law_links(citations: &[String]) -> Vec<LawLink> {
    citations
        .iter()
        .filter_map(|citation| match LawLink::new(citation) {
            Ok(link) => Some(link),
            Err(e) => {
                tracing::warn!(%citation, error = %e, "could not build law link");
                None
            }
        })
        .collect()
}
