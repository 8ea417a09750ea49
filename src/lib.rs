// Library root
// -----------
// The binary (`main.rs`) wires these modules into the interactive CLI.
//
// Module responsibilities:
// - `poller`: the job wait state machine. Refreshes a job until it is
//   terminal, tolerates one stalled wait, and can be abandoned without
//   cancelling the remote job.
// - `api`: blocking HTTP client for the Honulabs API; also the poller's
//   refresh source.
// - `schema`: wire types (jobs, businesses, job payloads).
// - `console`: terminal rendering of a wait and Ctrl+C handling.
// - `token`: cached API token on disk.
// - `settings` / `logging`: startup configuration and tracing setup.
// - `commands`, `ui`, `wizard`: the prompt loop, its commands and the
//   multi-step generation flows.
// - `mcp`: MCP client configuration snippets.
pub mod api;
pub mod commands;
pub mod console;
pub mod logging;
pub mod mcp;
pub mod poller;
pub mod schema;
pub mod settings;
pub mod token;
pub mod ui;
pub mod wizard;
