//! Trait definitions for the host ports.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::error::PortError;
use crate::signature::{Location, Offset, Signature};

/// Finds signatures on the current screen.
#[async_trait]
pub trait RecognitionPort: Send + Sync {
    /// Returns the name of this recognizer implementation.
    fn name(&self) -> &str;

    /// Single-shot, non-blocking probe.
    ///
    /// `Ok(None)` means "not visible right now"; errors are reserved for host faults.
    async fn recognize(&self, signature: &Signature) -> Result<Option<Location>, PortError>;

    /// Blocking probe with a bounded wait.
    ///
    /// The default implementation probes immediately and then once per
    /// `poll_interval` until `timeout` has elapsed. The final probe happens no
    /// later than the deadline.
    async fn wait_for(
        &self,
        signature: &Signature,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Option<Location>, PortError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(location) = self.recognize(signature).await? {
                return Ok(Some(location));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }
}

/// Injects input into the game window.
#[async_trait]
pub trait ActionPort: Send + Sync {
    /// Returns the name of this input backend.
    fn name(&self) -> &str;

    /// Clicks the center of `location`, shifted by `offset` when given.
    async fn click_at(&self, location: Location, offset: Option<Offset>) -> Result<(), PortError>;

    /// Presses `key`, holds it for `hold`, releases it.
    async fn press_and_release(&self, key: &str, hold: Duration) -> Result<(), PortError>;

    async fn hold_key(&self, key: &str) -> Result<(), PortError>;

    async fn release_key(&self, key: &str) -> Result<(), PortError>;

    /// Brings the game window forward. Returns whether it is now in front.
    async fn ensure_foreground(&self) -> bool;
}

/// Presses a key after making sure the window is in front.
///
/// Key events sent to a background window are silently dropped by most
/// games, so this refuses with [`PortError::NotForeground`] instead.
pub async fn press_key(
    actions: &dyn ActionPort,
    key: &str,
    hold: Duration,
) -> Result<(), PortError> {
    if !actions.ensure_foreground().await {
        return Err(PortError::NotForeground);
    }
    actions.press_and_release(key, hold).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Becomes visible on the n-th probe.
    struct CountingRecognizer {
        visible_on: u32,
        probes: AtomicU32,
    }

    #[async_trait]
    impl RecognitionPort for CountingRecognizer {
        fn name(&self) -> &str {
            "counting"
        }

        async fn recognize(&self, _signature: &Signature) -> Result<Option<Location>, PortError> {
            let n = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.visible_on {
                Ok(Some(Location::new(0, 0, 10, 10)))
            } else {
                Ok(None)
            }
        }
    }

    struct FlakyWindow {
        foreground: AtomicBool,
        pressed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ActionPort for FlakyWindow {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn click_at(
            &self,
            _location: Location,
            _offset: Option<Offset>,
        ) -> Result<(), PortError> {
            Ok(())
        }

        async fn press_and_release(&self, key: &str, _hold: Duration) -> Result<(), PortError> {
            self.pressed.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn hold_key(&self, _key: &str) -> Result<(), PortError> {
            Ok(())
        }

        async fn release_key(&self, _key: &str) -> Result<(), PortError> {
            Ok(())
        }

        async fn ensure_foreground(&self) -> bool {
            self.foreground.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_wait_for_polls_until_visible() {
        let recognizer = CountingRecognizer {
            visible_on: 3,
            probes: AtomicU32::new(0),
        };
        let sig = Signature::text("start", ["开始挑战"]);
        let started = Instant::now();

        let found = recognizer
            .wait_for(&sig, Duration::from_secs(10), Duration::from_secs(2))
            .await
            .unwrap();

        assert!(found.is_some());
        assert_eq!(recognizer.probes.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_wait_for_times_out() {
        let recognizer = CountingRecognizer {
            visible_on: u32::MAX,
            probes: AtomicU32::new(0),
        };
        let sig = Signature::text("start", ["开始挑战"]);
        let started = Instant::now();

        let found = recognizer
            .wait_for(&sig, Duration::from_secs(5), Duration::from_secs(2))
            .await
            .unwrap();

        assert!(found.is_none());
        // Probes at 0s, 2s, 4s and the deadline at 5s.
        assert_eq!(recognizer.probes.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_press_key_requires_foreground() {
        let window = FlakyWindow {
            foreground: AtomicBool::new(false),
            pressed: Mutex::new(Vec::new()),
        };

        let result = press_key(&window, "esc", Duration::from_millis(100)).await;
        assert_eq!(result, Err(PortError::NotForeground));
        assert!(window.pressed.lock().unwrap().is_empty());

        window.foreground.store(true, Ordering::SeqCst);
        press_key(&window, "esc", Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(*window.pressed.lock().unwrap(), vec!["esc".to_string()]);
    }
}
