//! Descriptors of the functions an add-in exposes, keyed by the name Excel shows.
//!
//! Functions are declared statically, either by `#[xl_func]` or by [`xlkit_register!`], which
//! submit a [`Registration`] through `inventory`. `xlAutoOpen` builds a [`Registry`] from those
//! submissions and hands it to the registrator; nothing is initialized lazily.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::types::{self, TypeMetadata, XlFunction};

const DEFAULT_ADDIN_LABEL: &str = "Generic XLKit Addin";

/// Everything Excel needs to register one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    /// Name used in formulas
    pub name: String,
    /// Exported symbol Excel calls
    pub procedure: String,
    pub signature: String,
    pub help: String,
    pub arg_names: String,
    pub arg_help: Vec<String>,
    pub category: Option<String>,
}

impl FunctionDescriptor {
    pub fn derive<Args, F: XlFunction<Args>>(name: &str, procedure: &str, help: &str) -> FunctionDescriptor {
        FunctionDescriptor::from_metadata(name, procedure, help, F::return_type(), &F::parameter_types())
    }

    /// Descriptor for a function with return type `ret` and parameters `params`. Exported
    /// functions get here through [`xlkit_descriptor!`](crate::xlkit_descriptor).
    pub fn from_metadata(
        name: &str,
        procedure: &str,
        help: &str,
        ret: TypeMetadata,
        params: &[TypeMetadata],
    ) -> FunctionDescriptor {
        FunctionDescriptor {
            name: name.to_string(),
            procedure: procedure.to_string(),
            signature: types::signature(&ret, params),
            help: help.to_string(),
            arg_names: types::arg_names(params),
            arg_help: types::arg_help(params).into_iter().map(String::from).collect(),
            category: None,
        }
    }

    pub fn with_category(&mut self, category: &str) -> &mut FunctionDescriptor {
        self.category = Some(category.to_string());
        self
    }

    /// Replace the type-derived argument names with `names`, and the default help of every
    /// argument that has an entry in `help`.
    pub fn with_args(&mut self, names: &[&str], help: &[Option<&str>]) -> &mut FunctionDescriptor {
        if names.len() == self.arg_help.len() {
            self.arg_names = names.join(", ");
        } else {
            log::warn!(
                "{}: {} argument names for {} parameters, keeping type names",
                self.name,
                names.len(),
                self.arg_help.len()
            );
        }
        for (slot, text) in self.arg_help.iter_mut().zip(help) {
            if let Some(text) = text {
                *slot = text.to_string();
            }
        }
        self
    }

    /// The argument help as it is sent to Excel. The function wizard drops the last characters
    /// of the final argument's help, so that one entry gets ". " appended.
    pub fn registration_arg_help(&self) -> Vec<String> {
        let mut help = self.arg_help.clone();
        if let Some(last) = help.last_mut() {
            last.push_str(". ");
        }
        help
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    label: String,
    functions: HashMap<String, FunctionDescriptor>,
}

impl Registry {
    pub fn new(label: &str) -> Registry {
        Registry {
            label: label.to_string(),
            functions: HashMap::new(),
        }
    }

    /// Every function submitted with `#[xl_func]`, `xlkit_register!` or `xlkit_register_as!`
    pub fn from_inventory() -> Registry {
        let mut registry = Registry::new(addin_label());
        for registration in inventory::iter::<Registration> {
            (registration.register)(&mut registry);
        }
        log::debug!("{} functions collected for {}", registry.len(), registry.label);
        registry
    }

    /// Add `f` under its own name. Replaces any function already registered under `name`.
    pub fn add_function<Args, F: XlFunction<Args>>(&mut self, name: &str, f: F, help: &str) -> &mut FunctionDescriptor {
        self.add_function_as(name, name, f, help)
    }

    /// Add `f`, exported as `procedure`, under the formula name `name`
    pub fn add_function_as<Args, F: XlFunction<Args>>(
        &mut self,
        name: &str,
        procedure: &str,
        _f: F,
        help: &str,
    ) -> &mut FunctionDescriptor {
        self.add_descriptor(FunctionDescriptor::derive::<Args, F>(name, procedure, help))
    }

    /// Add a prepared descriptor. Replaces any function registered under the same name.
    pub fn add_descriptor(&mut self, descriptor: FunctionDescriptor) -> &mut FunctionDescriptor {
        match self.functions.entry(descriptor.name.clone()) {
            Entry::Occupied(mut entry) => {
                log::debug!("Replacing registration of {}", entry.key());
                entry.insert(descriptor);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(descriptor),
        }
    }

    /// Descriptors ordered by name
    pub fn functions(&self) -> Vec<&FunctionDescriptor> {
        let mut functions = self.functions.values().collect::<Vec<_>>();
        functions.sort_by(|a, b| a.name.cmp(&b.name));
        functions
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dump(&self) {
        log::debug!("Registry {}:", self.label);
        for f in self.functions() {
            log::debug!("'{}' -> '{}' [{}]", f.name, f.signature, f.arg_help.join(","));
        }
    }
}

/// A statically declared registration, run when the registry is built
pub struct Registration {
    pub register: fn(&mut Registry),
}

impl Registration {
    pub const fn new(register: fn(&mut Registry)) -> Registration {
        Registration { register }
    }
}

inventory::collect!(Registration);

/// Name shown in the add-in manager. Declared with [`xlkit_addin_label!`].
pub struct AddinLabel(pub &'static str);

inventory::collect!(AddinLabel);

pub fn addin_label() -> &'static str {
    inventory::iter::<AddinLabel>
        .into_iter()
        .next()
        .map_or(DEFAULT_ADDIN_LABEL, |label| label.0)
}

/// Descriptor of an exported `extern "system"` function, registered as `$name`. The parameter
/// and return types are spelled out and checked against the function:
///
/// ```ignore
/// let d = xlkit_descriptor!("xlCirc", xlCirc(Parm<f64, Diameter>) -> ResultOperandPtr, "Circumference");
/// ```
#[macro_export]
macro_rules! xlkit_descriptor {
    ($name:expr, $f:ident($($arg:ty),* $(,)?) -> $ret:ty, $help:expr) => {{
        let _: extern "system" fn($($arg),*) -> $ret = $f;
        $crate::registry::FunctionDescriptor::from_metadata(
            $name,
            stringify!($f),
            $help,
            <$ret as $crate::types::XlType>::METADATA,
            &[$(<$arg as $crate::types::XlType>::METADATA),*],
        )
    }};
}

/// Register an exported function under its own name:
/// `xlkit_register!(xlCirc(f64) -> ResultOperandPtr, "Circumference of a circle");`
#[macro_export]
macro_rules! xlkit_register {
    ($f:ident($($arg:ty),* $(,)?) -> $ret:ty, $help:expr) => {
        $crate::xlkit_register_as!(stringify!($f), $f($($arg),*) -> $ret, $help);
    };
}

/// Register an exported function under a different formula name:
/// `xlkit_register_as!("xlCirc2", xlCirc(f64) -> ResultOperandPtr, "...");`
#[macro_export]
macro_rules! xlkit_register_as {
    ($name:expr, $f:ident($($arg:ty),* $(,)?) -> $ret:ty, $help:expr) => {
        $crate::inventory::submit! {
            $crate::registry::Registration::new(|registry| {
                registry.add_descriptor($crate::xlkit_descriptor!($name, $f($($arg),*) -> $ret, $help));
            })
        }
    };
}

#[macro_export]
macro_rules! xlkit_addin_label {
    ($label:expr) => {
        $crate::inventory::submit! {
            $crate::registry::AddinLabel($label)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::Operand;
    use crate::result::ResultOperandPtr;
    use crate::types::HostStr;

    fn describe(_x: f64, _s: HostStr) -> ResultOperandPtr {
        ResultOperandPtr::null()
    }

    fn other(_x: f64) -> f64 {
        0.0
    }

    extern "system" fn registered_statically(_x: i16) -> i16 {
        0
    }

    crate::xlkit_register!(registered_statically(i16) -> i16, "Submitted through inventory");

    extern "system" fn exported(_x: f64, _s: HostStr) -> ResultOperandPtr {
        ResultOperandPtr::null()
    }

    extern "system" fn exported_range(_cells: &Operand) -> ResultOperandPtr {
        ResultOperandPtr::null()
    }

    #[test]
    fn descriptor_is_derived_from_types() {
        let mut registry = Registry::new("test");
        registry.add_function("xlDescribe", describe, "Describe a value");
        let d = registry.get("xlDescribe").unwrap();
        assert_eq!(d.signature, "PBC");
        assert_eq!(d.arg_names, "Number, String");
        assert_eq!(d.arg_help, vec!["Number", "String"]);
        assert_eq!(d.procedure, "xlDescribe");
        assert_eq!(d.category, None);
    }

    #[test]
    fn exported_functions_get_the_same_descriptor() {
        let mut registry = Registry::new("test");
        registry.add_descriptor(crate::xlkit_descriptor!(
            "xlExported",
            exported(f64, HostStr) -> ResultOperandPtr,
            "Describe a value"
        ));
        registry.add_descriptor(crate::xlkit_descriptor!("xlRange", exported_range(&Operand) -> ResultOperandPtr, ""));

        let d = registry.get("xlExported").unwrap();
        assert_eq!(d.signature, "PBC");
        assert_eq!(d.arg_names, "Number, String");
        assert_eq!(d.procedure, "exported");
        assert_eq!(d, &FunctionDescriptor::derive::<(f64, HostStr), fn(f64, HostStr) -> ResultOperandPtr>("xlExported", "exported", "Describe a value"));

        let d = registry.get("xlRange").unwrap();
        assert_eq!(d.signature, "PP");
        assert_eq!(d.arg_names, "Range");
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = Registry::new("test");
        registry.add_function("xlSame", describe, "first");
        registry.add_function_as("xlSame", "other", other, "second");
        assert_eq!(registry.len(), 1);
        let d = registry.get("xlSame").unwrap();
        assert_eq!(d.help, "second");
        assert_eq!(d.signature, "BB");
        assert_eq!(d.procedure, "other");
    }

    #[test]
    fn only_last_help_gets_the_wizard_suffix() {
        let mut registry = Registry::new("test");
        let d = registry.add_function("xlDescribe", describe, "");
        let help = d.registration_arg_help();
        assert_eq!(help, vec!["Number".to_string(), "String. ".to_string()]);
        assert_eq!(d.arg_help[1], "String");

        let d = registry.add_function("xlOther", other, "");
        d.arg_help.clear();
        assert!(d.registration_arg_help().is_empty());
    }

    #[test]
    fn explicit_args_override_type_defaults() {
        let mut registry = Registry::new("test");
        registry
            .add_function("xlDescribe", describe, "")
            .with_args(&["value", "label"], &[None, Some("Text shown next to the value")])
            .with_category("Text");
        let d = registry.get("xlDescribe").unwrap();
        assert_eq!(d.arg_names, "value, label");
        assert_eq!(d.arg_help, vec!["Number", "Text shown next to the value"]);
        assert_eq!(d.category.as_deref(), Some("Text"));
    }

    #[test]
    fn inventory_submissions_are_collected() {
        let registry = Registry::from_inventory();
        let d = registry.get("registered_statically").unwrap();
        assert_eq!(d.signature, "II");
        assert_eq!(d.procedure, "registered_statically");
        assert_eq!(registry.label(), DEFAULT_ADDIN_LABEL);
    }

    #[test]
    fn functions_are_sorted_by_name() {
        let mut registry = Registry::new("test");
        registry.add_function("b", other, "");
        registry.add_function("a", other, "");
        let names = registry.functions().iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b"]);
    }
}
