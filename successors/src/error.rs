use rzapi::api::RzError;

pub type Result<T> = std::result::Result<T, SuccError>;

#[derive(thiserror::Error, Debug)]
pub enum SuccError {
    #[error("rizin failed: {0}")]
    RzApi(#[from] RzError),

    #[error("Z3 Solver failed: {0}")]
    Z3(String),

    #[error("Unsat")]
    Unsat,

    #[error("Instruction '{kind}' at {addr:#x} is unsupported.")]
    Unsupported { addr: u64, kind: String },

    #[error("No entry point found in {0}.")]
    NoEntryPoint(String),

    #[error("Invalid path description: {0}")]
    Paths(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid json: {0}")]
    Json(#[from] serde_json::Error),
}
