//! Periodic background update while a document is bound.

use std::future::Future;
use std::time::Duration;

use n0_future::time;

use crate::readiness::ReadinessGate;

/// How often autosave fires unless configured otherwise.
pub const DEFAULT_AUTOSAVE_PERIOD: Duration = Duration::from_secs(30);

/// What the loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    Continue,
    Stop,
}

/// Drive `tick` every `period` once the gate is ready.
///
/// The first tick fires one full period after the loop starts. The period is
/// measured from the end of the previous tick, so a slow save never causes a
/// burst of catch-up ticks.
pub(crate) async fn run<F, Fut>(gate: ReadinessGate, period: Duration, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Tick>,
{
    gate.wait_ready().await;
    tracing::debug!(?period, "autosave started");
    loop {
        time::sleep(period).await;
        if tick().await == Tick::Stop {
            break;
        }
    }
    tracing::debug!("autosave stopped");
}

/// Suppresses repeats of the same autosave failure.
///
/// A persistent outage would otherwise raise the same error every period.
/// The first failure is reported, identical follow-ups are counted and
/// dropped, and a different failure or any successful save re-arms it.
#[derive(Debug, Default)]
pub struct AutosaveErrorFilter {
    last: Option<String>,
    suppressed: u32,
}

impl AutosaveErrorFilter {
    /// Whether this failure should reach the user.
    pub fn should_report(&mut self, message: &str) -> bool {
        if self.last.as_deref() == Some(message) {
            self.suppressed += 1;
            return false;
        }
        self.last = Some(message.to_owned());
        self.suppressed = 0;
        true
    }

    /// Forget the last failure. Returns how many repeats were suppressed.
    pub fn reset(&mut self) -> u32 {
        self.last = None;
        std::mem::take(&mut self.suppressed)
    }

    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }
}
