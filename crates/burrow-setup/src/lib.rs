//! Burrow provisioning flow.
//!
//! Reconciles the remote tunnel and DNS routes against the desired
//! services, materialises the credential and routing-config artifacts,
//! launches cloudflared as a detached daemon, and verifies convergence
//! through the durable signals a later invocation can also see: the PID
//! file and the log file.

pub mod credentials;
pub mod ingress;
pub mod orchestrate;
pub mod supervise;

pub use orchestrate::{RouteStatus, ServiceReport, TunnelReport, provision};
pub use supervise::{
    DaemonStatus, ProcessError, ProcessHandle, VerificationOutcome, VerifyOptions,
};
