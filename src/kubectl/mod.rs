// Kubectl module: cluster context/environment detection, kubectl
// subprocess execution, and the legacy string-based risk classifier
// still used by the confirmation modal's environment-sensitive prompt.
//
// This module provides:
// - context.rs: Kubeconfig parsing and environment detection
// - risk_classifier.rs: Risk level classification (LOW/MEDIUM/HIGH)
// - executor.rs: kubectl command execution

pub mod context;
pub mod executor;
pub mod risk_classifier;

pub use context::{EnvironmentType, KubectlContext};
pub use executor::{execute_kubectl, format_output, ExecutionResult};
pub use risk_classifier::RiskLevel;
