use std::{
    any::Any,
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use anyhow::anyhow;

pub type Handler<P> = Box<dyn FnMut(&P) -> anyhow::Result<()> + Send>;

pub struct EventBus<P> {
    handlers: HashMap<String, Vec<Handler<P>>>,
}

impl<P> Default for EventBus<P> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<P> fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(&str, usize)> = self
            .handlers
            .iter()
            .map(|(event, handlers)| (event.as_str(), handlers.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

impl<P> EventBus<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, event: impl Into<String>, handler: F)
    where
        F: FnMut(&P) -> anyhow::Result<()> + Send + 'static,
    {
        self.handlers
            .entry(event.into())
            .or_default()
            .push(Box::new(handler));
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.get(event).map_or(0, Vec::len)
    }

    /// Runs every handler registered for `event`, even when earlier ones fail
    /// or panic. Failures are collected and returned once all handlers ran.
    pub fn emit(&mut self, event: &str, payload: &P) -> Result<(), EmitError> {
        let Some(handlers) = self.handlers.get_mut(event) else {
            return Ok(());
        };

        let total = handlers.len();
        let mut failures = Vec::new();
        for (index, handler) in handlers.iter_mut().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(payload)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(panic_payload) => anyhow!("handler panicked: {}", panic_message(&panic_payload)),
            };
            failures.push(HandlerFailure { index, error });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(EmitError {
                event: event.to_string(),
                total,
                failures,
            })
        }
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[derive(Debug)]
pub struct HandlerFailure {
    pub index: usize,
    pub error: anyhow::Error,
}

#[derive(Debug)]
pub struct EmitError {
    pub event: String,
    pub total: usize,
    pub failures: Vec<HandlerFailure>,
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} `{}` handler(s) failed",
            self.failures.len(),
            self.total,
            self.event
        )?;
        for failure in &self.failures {
            write!(f, "; #{}: {}", failure.index, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for EmitError {}

#[cfg(test)]
#[path = "tests/event_bus_tests.rs"]
mod tests;
