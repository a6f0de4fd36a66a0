use std::{cell::RefCell, fmt::Display};

#[derive(Default)]
struct Operations {
    stack: Vec<String>,
    /// Set once the innermost failure has been logged, so outer operations stay quiet
    failure_logged: bool,
}

thread_local! {
    static OPERATIONS: RefCell<Operations> = RefCell::new(Operations::default());
}

/// Records what the current thread is doing, so failures can be attributed
///
/// When an operation fails, the full stack of in-flight operations is logged once, at the
/// innermost failing operation.
#[derive(Debug, Default)]
pub struct OperationTracker;

impl OperationTracker {
    pub fn new() -> Self {
        OperationTracker
    }

    pub fn invoke<T, E: Display>(
        &self,
        description: impl Into<String>,
        operation: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let description = description.into();
        tracing::trace!(operation = %description, "Starting operation");
        OPERATIONS.with(|ops| ops.borrow_mut().stack.push(description));

        let _pop = PopOnDrop;
        let result = operation();

        OPERATIONS.with(|ops| {
            let mut ops = ops.borrow_mut();
            match &result {
                Ok(_) => ops.failure_logged = false,
                Err(err) if !ops.failure_logged => {
                    ops.failure_logged = true;
                    let trace: Vec<String> = ops
                        .stack
                        .iter()
                        .enumerate()
                        .map(|(index, op)| format!("[{:>2}] {op}", index + 1))
                        .collect();
                    tracing::error!(
                        operations = %trace.join("\n"),
                        "Operation failed: {err}"
                    );
                }
                Err(_) => {}
            }
        });
        result
    }

    /// Like [OperationTracker::invoke], for operations which can not fail
    pub fn run<T>(&self, description: impl Into<String>, operation: impl FnOnce() -> T) -> T {
        match self.invoke(description, || Ok::<_, std::convert::Infallible>(operation())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Descriptions of the operations in flight on the current thread, outermost first
    pub fn current(&self) -> Vec<String> {
        OPERATIONS.with(|ops| ops.borrow().stack.clone())
    }
}

struct PopOnDrop;
impl Drop for PopOnDrop {
    fn drop(&mut self) {
        OPERATIONS.with(|ops| {
            let mut ops = ops.borrow_mut();
            ops.stack.pop();
            if ops.stack.is_empty() {
                ops.failure_logged = false;
            }
        });
    }
}
