//! BotBrawl orchestration
//!
//! Everything that moves a battle through its life:
//!
//! - [`Arena`]: launches matched battles and settles or aborts them
//! - [`Orchestrator`]: the periodic tick (expiry sweep, queue drain, battle
//!   scan)
//! - [`GenerationOutbox`] / [`GenerationWorker`]: AI work queued by ticks and
//!   run out of band
//! - [`BrawlEngine`]: the facade callers use, with ownership checks
//!
//! Plus the request-side collaborators: bearer-token [`Authenticator`] and the
//! per-owner [`RateLimiter`].

pub mod arena;
pub mod auth;
pub mod engine;
pub mod orchestrator;
pub mod outbox;
pub mod rate_limit;
pub mod worker;

pub use arena::Arena;
pub use auth::{Authenticator, InMemoryAuthenticator, Principal};
pub use engine::{BrawlEngine, Collaborators};
pub use orchestrator::{Orchestrator, TickReport};
pub use outbox::{GenerationJob, GenerationOutbox, JobKind, JobStatus};
pub use rate_limit::{RateLimitConfig, RateLimitInfo, RateLimiter};
pub use worker::{GenerationWorker, WorkerReport};
