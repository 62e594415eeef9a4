pub mod debounce;
pub mod guard;
pub mod once;
pub mod readiness;
