pub mod context;
pub mod definition;
pub mod events;
pub mod executor;
pub mod registry;
pub mod result;

pub use context::HookContext;
pub use definition::{FnHook, HookCallable, HookDefinition, HookHandler};
pub use events::HookEvent;
pub use executor::HookExecutor;
pub use registry::HookRegistry;
pub use result::HookResult;
