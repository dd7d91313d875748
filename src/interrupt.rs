use crate::DedupeError;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use tracing::{info, warn};

type Handler = Box<dyn Fn(i32) + Send + Sync>;

#[derive(Default)]
struct State {
    depth: usize,
    deferred: Option<i32>,
}

/// Routes termination signals to a handler, except while a
/// [`CriticalSection`] is open: then the first signal is held back and
/// replayed when the outermost section closes.
pub struct Interrupts {
    state: Mutex<State>,
    on_interrupt: Handler,
}

impl Interrupts {
    pub fn new<F>(on_interrupt: F) -> Arc<Self>
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            on_interrupt: Box::new(on_interrupt),
        })
    }

    /// Terminates the process with the conventional `128 + signal` status.
    pub fn exiting() -> Arc<Self> {
        Self::new(|signal| {
            warn!("Interrupted by signal {}, exiting", signal);
            std::process::exit(128 + signal);
        })
    }

    /// Deliver a signal. Runs the handler now, or defers it when inside a
    /// critical section.
    pub fn deliver(&self, signal: i32) {
        let mut state = self.lock_state();
        if state.depth == 0 {
            // The handler runs under the lock so no critical section can
            // start while the process is going down.
            (self.on_interrupt)(signal);
        } else if state.deferred.is_none() {
            warn!("Signal {} received during commit, deferring until it completes", signal);
            state.deferred = Some(signal);
        }
    }

    pub fn critical_section(&self) -> CriticalSection<'_> {
        self.lock_state().depth += 1;
        CriticalSection { interrupts: self }
    }

    pub fn deferred(&self) -> Option<i32> {
        self.lock_state().deferred
    }

    /// Install SIGINT/SIGTERM listeners that feed [`Interrupts::deliver`].
    pub fn register_signals(self: &Arc<Self>) -> Result<SignalListener, DedupeError> {
        SignalListener::spawn(Arc::clone(self))
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Scoped guard; interrupts arriving while it lives are deferred.
pub struct CriticalSection<'a> {
    interrupts: &'a Interrupts,
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        let mut state = self.interrupts.lock_state();
        state.depth -= 1;
        if state.depth == 0 {
            if let Some(signal) = state.deferred.take() {
                info!("Commit finished, replaying deferred signal {}", signal);
                (self.interrupts.on_interrupt)(signal);
            }
        }
    }
}

#[cfg(unix)]
pub struct SignalListener {
    handle: signal_hook::iterator::Handle,
    thread: Option<thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalListener {
    fn spawn(interrupts: Arc<Interrupts>) -> Result<Self, DedupeError> {
        use signal_hook::consts::signal::{SIGINT, SIGTERM};

        let mut signals = signal_hook::iterator::Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("dedupe-signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    interrupts.deliver(signal);
                }
            })?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalListener {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Signal listener thread panicked");
            }
        }
    }
}

#[cfg(not(unix))]
pub struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    fn spawn(_interrupts: Arc<Interrupts>) -> Result<Self, DedupeError> {
        warn!("Signal deferral is not supported on this platform");
        Ok(Self)
    }
}
