use crate::error::SourceError;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared flag handed to every in-flight source request of one session
/// generation. Closing the session flips it so pending requests stop before
/// their next expensive stage.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self, stage: &'static str) -> Result<(), SourceError> {
        if self.is_cancelled() {
            return Err(SourceError::Cancelled(stage));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationToken;
    use crate::error::SourceError;

    #[test]
    fn clones_observe_cancellation() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(observer.check_cancelled("rasterize").is_ok());

        token.cancel();

        assert!(observer.is_cancelled());
        assert!(matches!(
            observer.check_cancelled("rasterize"),
            Err(SourceError::Cancelled("rasterize"))
        ));
    }
}
