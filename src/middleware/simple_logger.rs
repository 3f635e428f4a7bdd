use super::{Middleware, Next};
use crate::ListenableStore;
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
}

impl LogLevel {
    /// Log `message` through the `log` macro for this level.
    pub fn log<S: AsRef<str>>(&self, message: S) {
        match self {
            LogLevel::Trace => log::trace!("{}", message.as_ref()),
            LogLevel::Debug => log::debug!("{}", message.as_ref()),
            LogLevel::Info => log::info!("{}", message.as_ref()),
            LogLevel::Warn => log::warn!("{}", message.as_ref()),
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Debug
    }
}

/// Logs every operation on a [ListenableStore] through the `log`
/// crate, including the state before and after each set.
#[derive(Debug, Default)]
pub struct SimpleLoggerMiddleware {
    log_level: LogLevel,
}

impl SimpleLoggerMiddleware {
    /// Create a logger which logs at [LogLevel::Debug].
    pub fn new() -> Self {
        SimpleLoggerMiddleware {
            log_level: LogLevel::default(),
        }
    }

    /// Set the level at which operations are logged.
    pub fn log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }
}

impl<T> Middleware<T> for SimpleLoggerMiddleware
where
    T: Clone + Debug + 'static,
{
    fn on_set(&self, store: &ListenableStore<T>, key: &str, value: T, next: Next<'_, T>) {
        self.log_level
            .log(format!("prev state: {:?} = {:?}", key, store.get(key)));
        self.log_level.log(format!("set: {:?} = {:?}", key, value));

        next.run(key, value);

        self.log_level
            .log(format!("next state: {:?} = {:?}", key, store.get(key)));
    }

    fn on_delete(&self, _store: &ListenableStore<T>, key: &str) {
        self.log_level.log(format!("delete: {:?}", key));
    }

    fn on_clear(&self, _store: &ListenableStore<T>) {
        self.log_level.log("clear");
    }

    fn on_subscribe(&self, store: &ListenableStore<T>, key: &str, attached: bool) {
        self.log_level.log(format!(
            "subscribe: {:?}, attached: {}, listeners: {}",
            key,
            attached,
            store.listener_count(key)
        ));
    }
}
