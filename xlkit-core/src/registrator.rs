//! Registers the functions of a [`Registry`] with Excel through xlfRegister.

use crate::config;
use crate::entrypoint::Excel;
use crate::error::{ErrorCode, Result, XlKitError};
use crate::operand::{Kind, Operand};
use crate::registry::{FunctionDescriptor, Registry};
use crate::xlcall::{xlGetName, xlcMessage, xlfRegister, xlfUnregister};

/// Number of xlfRegister arguments before the per-argument help strings
const FIXED_REGISTER_ARGS: usize = 10;

/// Macro type 1: a worksheet function
const MACRO_TYPE_FUNCTION: i16 = 1;

/// Outcome of an attach. Functions that failed are logged and left out, the rest stay usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachReport {
    /// Formula name and the register id Excel assigned
    pub registered: Vec<(String, f64)>,
    pub failed: Vec<String>,
}

pub struct Registrator<'h, H: Excel> {
    host: &'h H,
}

impl<'h, H: Excel> Registrator<'h, H> {
    pub fn new(host: &'h H) -> Registrator<'h, H> {
        Registrator { host }
    }

    /// Register every function in `registry`. Only failing to get the add-in's own file name
    /// aborts the attach; a function Excel refuses is skipped.
    pub fn attach(&self, registry: &Registry) -> Result<AttachReport> {
        let dll_name = self.host.excel(xlGetName, &[])?;
        log::debug!("Registering {} functions from {}", registry.len(), *dll_name);

        self.message(&format!("Registering {}...", registry.label()));
        let mut report = AttachReport::default();
        for descriptor in registry.functions() {
            match self.register(&dll_name, registry.label(), descriptor) {
                Ok(id) => {
                    log::debug!("Registered {} as {}", descriptor.name, id);
                    report.registered.push((descriptor.name.clone(), id));
                }
                Err(err) => {
                    log::error!("{}", err);
                    report.failed.push(descriptor.name.clone());
                }
            }
        }
        self.clear_message();
        Ok(report)
    }

    /// Unregister what an earlier attach registered
    pub fn detach(&self, report: &AttachReport) {
        for (name, id) in report.registered.iter() {
            match self.host.excel(xlfUnregister, &[&Operand::number(*id)]) {
                Ok(_) => log::debug!("Unregistered {}", name),
                Err(err) => log::warn!("Failed to unregister {}: {}", name, err),
            }
        }
    }

    fn register(&self, dll_name: &Operand, label: &str, f: &FunctionDescriptor) -> Result<f64> {
        let mut help = f.registration_arg_help();
        let max_help = config::limits().max_call_args.saturating_sub(FIXED_REGISTER_ARGS);
        if help.len() > max_help {
            log::warn!("{}: only the first {} of {} argument help strings fit", f.name, max_help, help.len());
            help.truncate(max_help);
        }

        let mut args = vec![
            Operand::string(&f.procedure),
            Operand::string(&f.signature),
            Operand::string(&f.name),
            Operand::string(&f.arg_names),
            Operand::integer(MACRO_TYPE_FUNCTION),
            Operand::string(f.category.as_deref().unwrap_or(label)),
            Operand::string(""),
            Operand::string(""),
            Operand::string(&f.help),
        ];
        args.extend(help.iter().map(|h| Operand::string(h)));

        let refs = std::iter::once(dll_name).chain(args.iter()).collect::<Vec<_>>();
        let registration_error = |reason: String| XlKitError::Registration {
            function: f.name.clone(),
            signature: f.signature.clone(),
            reason,
        };

        let result = self
            .host
            .excel(xlfRegister, &refs)
            .map_err(|err| registration_error(err.to_string()))?;
        match result.kind() {
            Kind::Number | Kind::Integer => result.get::<f64>(),
            Kind::Error => {
                let reason = result
                    .get::<ErrorCode>()
                    .map_or_else(|err| err.to_string(), |code| code.to_string());
                Err(registration_error(reason))
            }
            _ => Err(registration_error(format!("unexpected result {:?}", *result))),
        }
    }

    fn message(&self, text: &str) {
        if let Err(err) = self.host.excel(xlcMessage, &[&Operand::boolean(true), &Operand::string(text)]) {
            log::debug!("Status bar message failed: {}", err);
        }
    }

    fn clear_message(&self) {
        if let Err(err) = self.host.excel(xlcMessage, &[&Operand::boolean(false)]) {
            log::debug!("Clearing the status bar failed: {}", err);
        }
    }
}
