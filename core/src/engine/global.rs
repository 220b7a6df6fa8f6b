//! Process-wide engine instance
//!
//! Every container in the host shares one engine so overlay state and
//! trigger registrations survive container re-creation. The host is
//! single-threaded, so the instance lives in a thread-local.

use std::cell::RefCell;

use super::Engine;

thread_local! {
    static ENGINE: RefCell<Option<Engine>> = const { RefCell::new(None) };
}

/// Install the shared engine, returning any previous one
pub fn install(engine: Engine) -> Option<Engine> {
    ENGINE.with(|slot| slot.borrow_mut().replace(engine))
}

pub fn uninstall() -> Option<Engine> {
    ENGINE.with(|slot| slot.borrow_mut().take())
}

pub fn is_installed() -> bool {
    ENGINE.with(|slot| slot.borrow().is_some())
}

/// Run `f` against the shared engine. Returns `None` if none is installed.
///
/// Must not be called re-entrantly from inside `f`.
pub fn with_engine<R>(f: impl FnOnce(&mut Engine) -> R) -> Option<R> {
    ENGINE.with(|slot| slot.borrow_mut().as_mut().map(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::HeadlessHost;

    #[test]
    fn test_install_and_uninstall() {
        uninstall();
        assert!(with_engine(|_| ()).is_none());

        assert!(install(Engine::with_host(Box::new(HeadlessHost::new()))).is_none());
        assert!(is_installed());
        assert_eq!(with_engine(|engine| engine.overlays().len()), Some(0));

        assert!(uninstall().is_some());
        assert!(!is_installed());
    }
}
