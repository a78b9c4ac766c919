pub mod error;
pub mod resolver;
pub mod store;
pub mod tasks;

pub use error::StoreError;
pub use resolver::{
    AnimationLevel, AnimationParams, ComponentOptions, ConfigResolver, LayoutKind, ResolvedView,
    ThemeParams,
};
pub use store::{ConnectionView, SessionState, SessionStore, StoreSubscription};
pub use tasks::{TaskCounts, TaskFilter, TaskGroup, TaskGrouping};
