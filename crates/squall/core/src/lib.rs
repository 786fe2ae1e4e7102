pub mod attach;
pub mod config;
pub mod error;
pub mod instance;
pub mod plan;
pub mod role;
pub mod sink;
pub mod toolchain;
pub mod topology;

pub use attach::{attach, attach_strict, AttachOutcome};
pub use config::{CertificatePair, Credential, DeploymentConfiguration, ProviderConfig, Settings};
pub use error::SquallError;
pub use instance::{Instance, InstanceProvider, InstanceStatus};
pub use plan::{build_plan, build_plan_with, Plan, PlanInputs, ProvisioningStep, Statement, StepId};
pub use role::{classify, Role, RoleSet, ROLE_TAG_KEY};
pub use sink::{AttachRecord, FileSink, TopologySink};
pub use toolchain::{ShellToolchain, Toolchain};
pub use topology::{discover, discover_with_warnings, Discovery, DiscoveryWarning, RoleHostnames, Topology};
