//! Thread attachment guard
//!
//! Engine threads are not created by the host, so the host runtime may not
//! know them. The guard attaches the current thread when needed and detaches
//! it again on drop, on every exit path.

use crate::error::HostError;

use super::HostRuntime;

/// Scoped attachment of the current thread to the host runtime
pub struct AttachGuard<'a> {
    runtime: &'a dyn HostRuntime,
    detach_on_drop: bool,
}

impl<'a> AttachGuard<'a> {
    /// Make sure the current thread is attached for the guard's lifetime
    pub fn acquire(runtime: &'a dyn HostRuntime) -> Result<Self, HostError> {
        if runtime.is_current_thread_attached() {
            return Ok(Self {
                runtime,
                detach_on_drop: false,
            });
        }

        runtime.attach_current_thread()?;
        tracing::trace!("Attached engine thread to host runtime");

        Ok(Self {
            runtime,
            detach_on_drop: true,
        })
    }

    /// Whether this guard performed the attach and will undo it
    pub fn attached_here(&self) -> bool {
        self.detach_on_drop
    }
}

impl Drop for AttachGuard<'_> {
    fn drop(&mut self) {
        if self.detach_on_drop {
            self.runtime.detach_current_thread();
            tracing::trace!("Detached engine thread from host runtime");
        }
    }
}

impl std::fmt::Debug for AttachGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachGuard")
            .field("detach_on_drop", &self.detach_on_drop)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static ATTACHED: Cell<bool> = const { Cell::new(false) };
    }

    /// Runtime tracking attachment per thread
    #[derive(Default)]
    struct ThreadLocalRuntime {
        refuse: bool,
    }

    impl HostRuntime for ThreadLocalRuntime {
        fn is_current_thread_attached(&self) -> bool {
            ATTACHED.with(|a| a.get())
        }

        fn attach_current_thread(&self) -> Result<(), HostError> {
            if self.refuse {
                return Err(HostError::Unreachable("shutting down".into()));
            }
            ATTACHED.with(|a| a.set(true));
            Ok(())
        }

        fn detach_current_thread(&self) {
            ATTACHED.with(|a| a.set(false));
        }
    }

    #[test]
    fn test_attaches_and_detaches() {
        let runtime = ThreadLocalRuntime::default();
        {
            let guard = AttachGuard::acquire(&runtime).unwrap();
            assert!(guard.attached_here());
            assert!(runtime.is_current_thread_attached());
        }
        assert!(!runtime.is_current_thread_attached());
    }

    #[test]
    fn test_known_thread_stays_attached() {
        let runtime = ThreadLocalRuntime::default();
        runtime.attach_current_thread().unwrap();
        {
            let guard = AttachGuard::acquire(&runtime).unwrap();
            assert!(!guard.attached_here());
        }
        assert!(runtime.is_current_thread_attached());
        runtime.detach_current_thread();
    }

    #[test]
    fn test_unreachable_runtime() {
        let runtime = ThreadLocalRuntime { refuse: true };
        assert!(AttachGuard::acquire(&runtime).is_err());
        assert!(!runtime.is_current_thread_attached());
    }

    #[test]
    fn test_detaches_on_panic() {
        let runtime = ThreadLocalRuntime::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = AttachGuard::acquire(&runtime).unwrap();
            panic!("sink failed");
        }));

        assert!(result.is_err());
        assert!(!runtime.is_current_thread_attached());
    }
}
