//! Ordered startup stages (§4.1).
//!
//! Four stages, always in this order: `bootstrap` (no heap, interrupts
//! off), `early` (heap and paging available, still no scheduler),
//! `normal` (interrupts enabled, scheduler running), `late` (userland
//! prerequisites). Ordering within a stage is link order — the order
//! initcalls are listed in the table the caller builds — deterministic
//! but not meaningful to anything outside this module.
//!
//! A failure in `bootstrap` or `early` is fatal: nothing later can be
//! trusted to behave once memory management or interrupts are in an
//! unknown state, so [`run_stage`] panics. A failure in `normal` or
//! `late` is logged and that one subsystem is simply left
//! uninitialised; everything else still gets a chance to start.

use crate::error::KResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Bootstrap,
    Early,
    Normal,
    Late,
}

/// One entry in an initcall table: a name (for logging), the stage it
/// belongs to, and the zero-argument function that runs it.
pub struct InitCall {
    pub name: &'static str,
    pub stage: Stage,
    pub func: fn() -> KResult<()>,
}

/// Runs every entry of `calls` whose stage is `stage`, in list order.
pub fn run_stage(calls: &[InitCall], stage: Stage) {
    for call in calls.iter().filter(|c| c.stage == stage) {
        log::debug!("initcall: {} ({:?})", call.name, stage);
        if let Err(e) = (call.func)() {
            match stage {
                Stage::Bootstrap | Stage::Early => {
                    panic!("fatal initcall failure in {:?} stage: {} ({})", stage, call.name, e);
                }
                Stage::Normal | Stage::Late => {
                    log::error!("initcall '{}' failed, subsystem left uninitialised: {}", call.name, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use core::sync::atomic::{AtomicU32, Ordering};

    static RAN: AtomicU32 = AtomicU32::new(0);

    fn ok_call() -> KResult<()> {
        RAN.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn failing_call() -> KResult<()> {
        Err(Error::Inval)
    }

    #[test_case]
    fn normal_stage_survives_a_failing_initcall() {
        RAN.store(0, Ordering::SeqCst);
        let calls = [
            InitCall { name: "a", stage: Stage::Normal, func: failing_call },
            InitCall { name: "b", stage: Stage::Normal, func: ok_call },
        ];
        run_stage(&calls, Stage::Normal);
        assert_eq!(RAN.load(Ordering::SeqCst), 1);
    }

    #[test_case]
    fn stage_filter_skips_entries_from_other_stages() {
        RAN.store(0, Ordering::SeqCst);
        let calls = [InitCall { name: "a", stage: Stage::Late, func: ok_call }];
        run_stage(&calls, Stage::Normal);
        assert_eq!(RAN.load(Ordering::SeqCst), 0);
        run_stage(&calls, Stage::Late);
        assert_eq!(RAN.load(Ordering::SeqCst), 1);
    }
}
