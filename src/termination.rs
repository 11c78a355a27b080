//! Defines the [`Termination`] trait.

use std::{convert::Infallible, fmt::Debug, process};

/// Extends [`std::process::Termination`] with a way to inspect the result.
///
/// [`gui::run`](crate::gui::run) runs the application on a background thread and has to decide the
/// process exit status itself once the application returns.
pub trait Termination: process::Termination {
    fn is_success(&self) -> bool;

    /// Reports the result and returns the process exit code for it.
    ///
    /// On failure, this prints the error to stderr the same way returning it from `main` would.
    fn exit_code(self) -> i32
    where
        Self: Sized,
    {
        if self.is_success() {
            0
        } else {
            self.report();
            1
        }
    }
}

impl Termination for Infallible {
    fn is_success(&self) -> bool {
        match *self {}
    }
}

impl Termination for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn is_success(&self) -> bool {
        match self {
            Ok(term) => term.is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(().exit_code(), 0);
        assert_eq!(anyhow::Ok(()).exit_code(), 0);
        assert_eq!(Err::<(), _>(anyhow::anyhow!("no webcam")).exit_code(), 1);
        assert!(!Ok::<_, String>(Err::<(), _>("nested")).is_success());
    }
}
