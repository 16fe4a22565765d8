mod executor;
pub use executor::ExecutorSettings;

mod session;
pub use session::SessionConfig;
