//! Deferred observer delivery
//!
//! Observers never run inside the call that settles a completion or
//! registers on it. Delivery goes to the ambient Tokio runtime when there is
//! one, otherwise to a short-lived helper thread.

use tokio::runtime::Handle;

pub(crate) fn schedule<F>(job: F)
where
    F: FnOnce() + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { job() });
        }
        Err(_) => {
            std::thread::spawn(job);
        }
    }
}
