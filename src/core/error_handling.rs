//! Error reporting helpers shared by the binary and the engine
//!
//! Errors distinguish between problems the operator can fix directly
//! (configuration, bad input) and system failures, which are reported with a
//! generic context line and full detail at debug level.

/// Errors that know whether their message is meant for the operator
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    fn is_user_actionable(&self) -> bool;

    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error with the detail level its kind calls for
///
/// Operator-actionable errors log their own message, system errors log the
/// supplied operation context. The full error is always available at debug
/// level.
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
