//! Tool layer.
//!
//! - `catalog`: the operations every instance exposes and tool-name routing
//! - `validate`: structural and typed argument validation
//! - `guard`: SQL classification for `execute_query` and expression checks
//! - `policy`: read-only, schema scope and confirmation decisions
//! - `format`: text rendering of results
//! - `dispatcher`: the invocation pipeline tying these together

pub mod catalog;
pub mod dispatcher;
pub mod format;
pub mod guard;
pub mod policy;
pub mod validate;

pub use catalog::{OPERATIONS, OperationSpec, RouteTable};
pub use dispatcher::{Dispatcher, ToolDescriptor, take_confirm};
pub use policy::Decision;
