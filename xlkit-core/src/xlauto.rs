//! Functions that are exported from the xll and invoked by Excel over the add-in's lifetime.
//! Only xlAutoOpen and xlAutoFree are essential.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::entrypoint::Excel4;
use crate::error::ErrorCode;
use crate::logging;
use crate::operand::Operand;
use crate::registrator::{AttachReport, Registrator};
use crate::registry::{self, Registry};
use crate::result::ResultOperandPtr;
use crate::xlcall::{LPXLOPER, XLOPER};

/// Set by xlAutoRemove, so the following xlAutoClose knows the add-in is being removed rather
/// than Excel shutting down.
static REMOVED: AtomicBool = AtomicBool::new(false);

static ATTACHED: Mutex<Option<AttachReport>> = Mutex::new(None);

/// Excel entry point: build the registry from every statically declared function and register
/// it. Always reports success so that Excel keeps the add-in loaded; failures are only logged.
#[unsafe(no_mangle)]
pub extern "system" fn xlAutoOpen() -> i32 {
    logging::init();
    let registry = Registry::from_inventory();
    registry.dump();

    let host = Excel4;
    if let Err(err) = host.ensure_available() {
        log::error!("{}", err);
        return 1;
    }
    match Registrator::new(&host).attach(&registry) {
        Ok(report) => {
            if !report.failed.is_empty() {
                log::warn!("Not registered: {}", report.failed.join(", "));
            }
            log::info!("{}: {} functions registered", registry.label(), report.registered.len());
            if let Ok(mut attached) = ATTACHED.lock() {
                *attached = Some(report);
            }
            1
        }
        Err(err) => {
            log::error!("{}", err);
            1
        }
    }
}

/// Excel exit point. Functions are only unregistered when the add-in is being removed.
#[unsafe(no_mangle)]
pub extern "system" fn xlAutoClose() -> i32 {
    if REMOVED.swap(false, Ordering::SeqCst) {
        let report = ATTACHED.lock().ok().and_then(|mut attached| attached.take());
        if let Some(report) = report {
            Registrator::new(&Excel4).detach(&report);
        }
    }
    1
}

#[unsafe(no_mangle)]
pub extern "system" fn xlAutoRemove() -> i32 {
    REMOVED.store(true, Ordering::SeqCst);
    1
}

/// Called by Excel once it has copied a result we flagged with xlbitDLLFree
#[unsafe(no_mangle)]
pub extern "system" fn xlAutoFree(px_free: LPXLOPER) {
    if px_free.is_null() {
        return;
    }
    let op = unsafe { Operand::from_raw_mut(px_free) };
    if let Err(err) = op.reset() {
        log::error!("{}", err);
    }
}

/// Add-in manager query. Action 1 asks for the add-in's display name.
#[unsafe(no_mangle)]
pub extern "system" fn xlAddInManagerInfo(action: *const XLOPER) -> ResultOperandPtr {
    if action.is_null() {
        return ResultOperandPtr::from_error(ErrorCode::Value);
    }
    let action = unsafe { Operand::from_raw(action) };
    addin_manager_info(action)
}

fn addin_manager_info(action: &Operand) -> ResultOperandPtr {
    match action.get::<i32>() {
        Ok(1) => ResultOperandPtr::with_text(registry::addin_label()),
        _ => ResultOperandPtr::from_error(ErrorCode::Value),
    }
}
