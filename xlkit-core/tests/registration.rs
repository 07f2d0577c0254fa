//! Building a registry by hand and attaching it to a recording host.

use std::cell::RefCell;

use xlkit_core::types::HostStr;
use xlkit_core::xlcall::{xlGetName, xlfRegister};
use xlkit_core::{Excel, Operand, Parm, Registrator, Registry, ResultOperandPtr, XlRet, xlkit_descriptor, xlkit_parm};

xlkit_parm!(Radius, "Radius of the circle");

extern "system" fn area(_radius: Parm<f64, Radius>) -> ResultOperandPtr {
    ResultOperandPtr::null()
}

extern "system" fn label(_x: f64, _text: HostStr) -> ResultOperandPtr {
    ResultOperandPtr::null()
}

fn many(
    _a1: f64, _a2: f64, _a3: f64, _a4: f64, _a5: f64, _a6: f64, _a7: f64, _a8: f64,
    _a9: f64, _a10: f64, _a11: f64, _a12: f64, _a13: f64, _a14: f64, _a15: f64, _a16: f64,
) -> f64 {
    0.0
}

/// Keeps the argument count of every xlfRegister call
#[derive(Default)]
struct CountingHost {
    arg_counts: RefCell<Vec<usize>>,
}

impl Excel for CountingHost {
    fn call(&self, xlfn: i32, result: &mut Operand, args: &[&Operand]) -> XlRet {
        match xlfn {
            xlGetName => *result = Operand::string("addin.xll"),
            xlfRegister => {
                self.arg_counts.borrow_mut().push(args.len());
                *result = Operand::number(self.arg_counts.borrow().len() as f64);
            }
            _ => {}
        }
        XlRet::SUCCESS
    }
}

#[test]
fn extern_functions_derive_their_descriptors() {
    let mut registry = Registry::new("Integration");
    registry.add_descriptor(xlkit_descriptor!("xlArea", area(Parm<f64, Radius>) -> ResultOperandPtr, "Area of a circle"));
    registry.add_descriptor(xlkit_descriptor!("xlLabel", label(f64, HostStr) -> ResultOperandPtr, "Label a number"));

    let d = registry.get("xlArea").unwrap();
    assert_eq!(d.signature, "PB");
    assert_eq!(d.procedure, "area");
    assert_eq!(d.arg_names, "Radius");
    assert_eq!(d.registration_arg_help(), vec!["Radius of the circle. "]);

    let d = registry.get("xlLabel").unwrap();
    assert_eq!(d.signature, "PBC");
    assert_eq!(d.arg_names, "Number, String");
}

#[test]
fn reregistering_keeps_one_descriptor() {
    let mut registry = Registry::new("Integration");
    registry.add_descriptor(xlkit_descriptor!("xlArea", area(Parm<f64, Radius>) -> ResultOperandPtr, "first"));
    registry.add_descriptor(xlkit_descriptor!("xlArea", area(Parm<f64, Radius>) -> ResultOperandPtr, "second"));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("xlArea").unwrap().help, "second");
}

#[test]
fn every_argument_gets_a_help_string() {
    let mut registry = Registry::new("Integration");
    registry.add_function("xlMany", many, "Sixteen numbers");
    registry.add_descriptor(xlkit_descriptor!("xlArea", area(Parm<f64, Radius>) -> ResultOperandPtr, "Area of a circle"));

    let host = CountingHost::default();
    let report = Registrator::new(&host).attach(&registry).unwrap();
    assert_eq!(report.registered.len(), 2);
    assert!(report.failed.is_empty());

    // functions() is ordered by name: xlArea, then xlMany
    let counts = host.arg_counts.borrow();
    assert_eq!(counts[0], 11);
    assert_eq!(counts[1], 26);
}
