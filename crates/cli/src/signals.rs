//! Signal handling for `revmigrate run`.
//!
//! Listens for SIGTERM and SIGINT on Unix platforms and Ctrl+C elsewhere.
//! Workflow runs are synchronous, so the listener lives on its own thread
//! with a single-threaded runtime. The first signal raises the interrupt
//! flag that ends baseline retry waits; a second one exits immediately.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

/// Exit status after a second signal.
const EXIT_INTERRUPTED: i32 = 130;

/// Register the signal handlers and return the flag they raise.
///
/// Handlers are registered before this returns, so a signal arriving at any
/// point of the run is observed.
pub fn install_interrupt_flag() -> io::Result<Arc<AtomicBool>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut signals = {
        let _guard = runtime.enter();
        ShutdownSignals::register()?
    };

    let flag = Arc::new(AtomicBool::new(false));
    let raised = Arc::clone(&flag);
    std::thread::Builder::new()
        .name("revmigrate-signals".into())
        .spawn(move || {
            runtime.block_on(async move {
                signals.recv().await;
                raised.store(true, Ordering::SeqCst);
                warn!("interrupt received: the run stops at its next wait, press Ctrl+C again to exit now");

                signals.recv().await;
                std::process::exit(EXIT_INTERRUPTED);
            })
        })?;

    Ok(flag)
}

struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn register() -> io::Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => {
                info!("received SIGINT (Ctrl+C)");
            }
            _ = self.terminate.recv() => {
                info!("received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C"),
            Err(e) => {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    }
}
