// All service modules
pub mod game_info;
pub mod game_service;
pub mod step_resolver;

// Re-export for convenience
pub use game_info::GameInfoFetcher;
pub use game_service::GameService;
pub use step_resolver::StepResolver;
