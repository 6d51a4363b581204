//! Authentication session and route authorization.
//!
//! Two layers:
//! - [`AuthSession`]: the one owner of session state. Explicitly constructed
//!   at app start, torn down on logout; publishes [`SessionSnapshot`]s on a
//!   watch channel.
//! - The gate: [`evaluate`] is a pure function of an [`AccessRequirement`]
//!   and a snapshot; [`RouteGuard`] wraps it with the edge-triggered
//!   navigation side effect.

mod gate;
mod guard;
mod session;

pub use gate::{
    evaluate, AccessRequirement, BlockingView, GateContext, GateDecision, Redirect, RoleDenial,
};
pub use guard::{Navigator, RouteGuard};
pub use session::AuthSession;
