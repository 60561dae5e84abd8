#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("scenario is empty")]
    EmptyScenario,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("build LLM: {0}")]
    Build(String),

    /// Network or provider failure. Never raised for unparseable output.
    #[error("model call failed: {0}")]
    Upstream(String),
}
