use std::time::Duration;

use crate::errors::AppError;

/// How the poll loop reacts to a failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Any failure ends the process
    Exit,
    /// Retry transport failures, skip cycles that fail otherwise, stop only
    /// on errors that need operator action
    Resilient {
        max_retries: u32,
        retry_delay: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run the same cycle again after the delay
    Retry(Duration),
    /// Give up on this cycle and wait for the next one
    Skip,
    Terminate,
}

impl FailurePolicy {
    /// `retries_so_far` counts retries already spent on the current cycle
    pub fn decide(&self, error: &AppError, retries_so_far: u32) -> Decision {
        match *self {
            FailurePolicy::Exit => Decision::Terminate,
            FailurePolicy::Resilient {
                max_retries,
                retry_delay,
            } => {
                if error.is_permanent() {
                    Decision::Terminate
                } else if error.is_retryable() && retries_so_far < max_retries {
                    Decision::Retry(retry_delay)
                } else {
                    Decision::Skip
                }
            }
        }
    }
}
