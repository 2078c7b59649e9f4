pub mod kernel;
pub mod types;

pub use kernel::{estimate_cost, estimate_tokens, RouterKernel};
pub use types::{
    Attempt, GenerationOptions, GenerationRequest, ProviderStatus, RequestContext, ResponseEntry,
    ResponseJournal, RouteOutcome, RoutingResult,
};
