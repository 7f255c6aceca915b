// Ad lifecycle: status/stage state machine, ad operations and approval routing.

pub mod approvals;
pub mod handlers;
pub mod service;
pub mod state_machine;
