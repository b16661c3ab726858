use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nmfwav::interrupt::Interrupt;

pub type CtrlCRegistrationError = ctrlc::Error;

/// Observes Ctrl-C so that in-flight conversions can stop and discard their
/// partial output
#[derive(Clone, Debug)]
pub struct CtrlCChecker {
    requested: Arc<AtomicBool>,
}

impl CtrlCChecker {
    pub fn new() -> Result<CtrlCChecker, CtrlCRegistrationError> {
        let requested = Arc::new(AtomicBool::new(false));
        {
            let requested = requested.clone();
            ctrlc::set_handler(move || {
                requested.store(true, Ordering::Relaxed);
            })?;
        }
        Ok(CtrlCChecker { requested })
    }
}

impl Interrupt for CtrlCChecker {
    fn is_set(&self) -> bool { self.requested.is_set() }
}
