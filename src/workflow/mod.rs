pub mod application_ctx;
pub mod apply_flow;

pub use application_ctx::ApplicationCtx;
pub use apply_flow::{ApplyFlow, FlowResult};
