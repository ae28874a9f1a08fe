use crate::error::{CamflowError, Result};
use parking_lot::Mutex;
use tracing::debug;

/// Coordinator protocol phase. Forward-progressing; `Failed` and `Closed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Opening,
    Open,
    Configuring,
    Active,
    Failed,
    Closed,
}

/// Ordering enforcement between initialize, close, and teardown.
///
/// Exactly one `initialize` may run per coordinator; a second attempt while
/// one is pending or has completed is rejected. Close wins every race: once
/// the gate reports closed, late platform callbacks and frame deliveries are
/// treated as no-ops by their callers.
pub struct LifecycleGate {
    phase: Mutex<Phase>,
}

impl LifecycleGate {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    pub fn is_closed(&self) -> bool {
        *self.phase.lock() == Phase::Closed
    }

    pub fn is_active(&self) -> bool {
        *self.phase.lock() == Phase::Active
    }

    /// Claim the one allowed initialize, moving Idle to Opening.
    pub fn begin_initialize(&self) -> Result<()> {
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Idle => {
                *phase = Phase::Opening;
                Ok(())
            }
            _ => Err(CamflowError::AlreadyInitialized),
        }
    }

    /// Advance to the next protocol phase. A gate that already closed or
    /// failed stays terminal; the caller observes that through `phase()`.
    pub fn advance(&self, to: Phase) {
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Closed | Phase::Failed => {
                debug!("Ignoring phase advance to {:?} from terminal {:?}", to, *phase);
            }
            from => {
                debug!("Phase {:?} -> {:?}", from, to);
                *phase = to;
            }
        }
    }

    /// Mark the protocol failed unless already closed.
    pub fn fail(&self) {
        let mut phase = self.phase.lock();
        if *phase != Phase::Closed {
            debug!("Phase {:?} -> Failed", *phase);
            *phase = Phase::Failed;
        }
    }

    /// Claim the close transition. Returns the phase being left, or `None`
    /// when a previous close already happened (idempotence).
    pub fn close_once(&self) -> Option<Phase> {
        let mut phase = self.phase.lock();
        if *phase == Phase::Closed {
            return None;
        }
        let previous = *phase;
        *phase = Phase::Closed;
        debug!("Phase {:?} -> Closed", previous);
        Some(previous)
    }
}

impl Default for LifecycleGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_initialize() {
        let gate = LifecycleGate::new();
        assert_eq!(gate.phase(), Phase::Idle);

        gate.begin_initialize().unwrap();
        assert_eq!(gate.phase(), Phase::Opening);

        // A second initialize is rejected in every later phase
        assert!(matches!(
            gate.begin_initialize(),
            Err(CamflowError::AlreadyInitialized)
        ));
        gate.advance(Phase::Active);
        assert!(gate.begin_initialize().is_err());
    }

    #[test]
    fn test_close_is_claimed_once() {
        let gate = LifecycleGate::new();
        gate.begin_initialize().unwrap();
        gate.advance(Phase::Active);

        assert_eq!(gate.close_once(), Some(Phase::Active));
        assert_eq!(gate.close_once(), None);
        assert!(gate.is_closed());
    }

    #[test]
    fn test_close_wins_over_fail_and_advance() {
        let gate = LifecycleGate::new();
        gate.begin_initialize().unwrap();
        gate.close_once().unwrap();

        gate.fail();
        assert_eq!(gate.phase(), Phase::Closed);

        gate.advance(Phase::Active);
        assert_eq!(gate.phase(), Phase::Closed);
    }

    #[test]
    fn test_fail_is_terminal_for_advance() {
        let gate = LifecycleGate::new();
        gate.begin_initialize().unwrap();
        gate.fail();
        gate.advance(Phase::Open);
        assert_eq!(gate.phase(), Phase::Failed);

        // But close still claims the transition once
        assert_eq!(gate.close_once(), Some(Phase::Failed));
    }
}
