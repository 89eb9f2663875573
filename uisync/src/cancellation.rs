use tokio_util::sync::CancellationToken;
use tracing::info;

/// Set-once cancellation flag shared between the engine and the external
/// trigger that stops a run.
///
/// Clones observe the same flag. Once set it stays set for the rest of the
/// run; there is no reset.
#[derive(Clone, Debug, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Check if cancellation has been requested
    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Request cancellation. Idempotent.
    pub fn set(&self) {
        if !self.token.is_cancelled() {
            info!("Cancellation requested");
        }
        self.token.cancel();
    }

    /// Resolves once the signal has been set
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Sleep for `duration` unless cancellation arrives first.
    ///
    /// Returns `false` if the sleep was cut short.
    pub async fn sleep(&self, duration: std::time::Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.token.cancelled() => false,
        }
    }
}

/// Starts a global keyboard listener on its own thread that sets `signal`
/// when `key` is pressed. The thread touches nothing else.
#[cfg(feature = "killswitch")]
pub fn spawn_killswitch(
    signal: CancellationSignal,
    key: rdev::Key,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        info!("Global kill switch armed ({:?} to stop)", key);
        let callback = move |event: rdev::Event| {
            if let rdev::EventType::KeyPress(pressed) = event.event_type {
                if pressed == key {
                    signal.set();
                }
            }
        };
        if let Err(e) = rdev::listen(callback) {
            tracing::error!("Kill switch listener stopped: {:?}", e);
        }
    })
}
