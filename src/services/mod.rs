pub mod credentials;
pub mod decision_engine;
pub mod form_toolkit;

pub use credentials::{CredentialSource, Credentials, SharedCredentials};
pub use decision_engine::{evaluate, Decision, DecisionEngine, TierPolicy};
pub use form_toolkit::FormToolkit;
