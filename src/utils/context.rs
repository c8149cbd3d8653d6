/// Runs a cleanup closure when dropped, including during unwinding.
///
/// Used to put the terminal back into cooked mode after reading a password,
/// even if the read panics.
///
/// ```
/// use rusty_installer::utils::context::Context;
///
/// let _restore = Context::with(|| println!("restored"));
/// ```
pub struct Context<AtExit: FnOnce()> {
    exit_cb: Option<AtExit>,
}

impl<F: FnOnce()> Context<F> {
    pub fn with(f: F) -> Self {
        Self { exit_cb: Some(f) }
    }

    /// Drop the guard without running the cleanup.
    pub fn dismiss(mut self) {
        self.exit_cb = None;
    }
}

impl<F: FnOnce()> Drop for Context<F> {
    fn drop(&mut self) {
        if let Some(f) = self.exit_cb.take() {
            f()
        }
    }
}
