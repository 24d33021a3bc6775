//! Custom resource types consumed by devsync
//!
//! - Route: OpenShift route (route.openshift.io/v1), the alternative to
//!   Ingress for exposing component URLs

pub mod route;

pub use route::*;
