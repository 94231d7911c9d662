//! Tool implementations shared by the CLI and the MCP server.

mod search;
mod status;

// search
pub use search::{
    execute_cancel, execute_results, execute_search, CancelInput, CancelOutput, ResultsInput,
    ResultsOutput, SearchInput, SearchOutput,
};

// status
pub use status::{execute_status, StatusOutput};
