pub mod application;
pub mod ids;
pub mod job;
pub mod loaders;
pub mod profile;
pub mod user;

pub use application::{Application, ApplicationStatus, ExecutionOutcome, NewApplication};
pub use ids::{ApplicationId, JobId, ResumeId, UserId};
pub use job::{domain_of, Job, Resume};
pub use loaders::{load_seed_file, DecisionRequest, SeedData};
pub use profile::{ApplicantProfile, ProfileField};
pub use user::{Tier, User};
