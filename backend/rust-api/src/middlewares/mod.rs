pub mod admin_gate;
pub mod csrf;
pub mod metrics;
pub mod rate_limit;
pub mod trace;
