//! These models represent the objects passed around by the agent
//!
//! There are three related formats we need to interact with:
//! - chat UI messages, sent from the interface to the server as `{id, role, parts}`
//! - openai-compatible chat completion messages and tool calls, sent to the model
//! - search payloads, returned from the catalog to the model
//!
//! We always immediately convert those data models into the internal structs using
//! to/from helpers, so the agent loop only ever reasons about the types below.
pub mod company;
pub mod message;
pub mod role;
pub mod tool;
