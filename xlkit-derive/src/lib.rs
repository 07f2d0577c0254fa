use std::collections::HashMap;

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{Attribute, Expr, ExprLit, FnArg, Ident, ItemFn, Lit, LitStr, Meta, Pat, ReturnType, Type, parse_macro_input};

/// Export a Rust function to Excel.
///
/// ```rust,ignore
/// /// Circumference of a circle
/// /// * radius: radius of the circle
/// #[xl_func(category = "Geometry")]
/// fn circ(radius: f64) -> Result<f64, XlKitError> {
///     Ok(2.0 * std::f64::consts::PI * radius)
/// }
/// ```
///
/// Generates an `extern "system"` function `xl_circ` taking the same parameters, which runs the
/// body through `xlkit_core::function::guard`, and submits its registration. Options:
/// * `name`: formula name, defaults to the exported symbol
/// * `rename`: exported symbol, defaults to `{prefix}_{function name}`
/// * `prefix`: symbol prefix, `xl` unless given
/// * `help`: function help, defaults to the doc comment
/// * `category`: function wizard category, defaults to the add-in label
/// * `params(arg = "help", ...)`: argument help, `* arg: help` doc lines take precedence
#[proc_macro_attribute]
pub fn xl_func(attr: TokenStream, input: TokenStream) -> TokenStream {
    let mut options = Options::default();
    let parser = syn::meta::parser(|meta| options.parse(meta));
    parse_macro_input!(attr with parser);

    let input_fn = parse_macro_input!(input as ItemFn);
    match expand(options, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct Options {
    name: Option<String>,
    rename: Option<String>,
    prefix: Option<String>,
    help: Option<String>,
    category: Option<String>,
    params: HashMap<String, String>,
}

impl Options {
    fn parse(&mut self, meta: syn::meta::ParseNestedMeta) -> syn::Result<()> {
        let ident = meta.path.get_ident().map(Ident::to_string).unwrap_or_default();
        match ident.as_str() {
            "name" => self.name = Some(meta.value()?.parse::<LitStr>()?.value()),
            "rename" => self.rename = Some(meta.value()?.parse::<LitStr>()?.value()),
            "prefix" => self.prefix = Some(meta.value()?.parse::<LitStr>()?.value()),
            "help" => self.help = Some(meta.value()?.parse::<LitStr>()?.value()),
            "category" => self.category = Some(meta.value()?.parse::<LitStr>()?.value()),
            "params" => {
                meta.parse_nested_meta(|param| {
                    let name = param
                        .path
                        .get_ident()
                        .ok_or_else(|| param.error("expected a parameter name"))?
                        .to_string();
                    let help = param.value()?.parse::<LitStr>()?.value();
                    self.params.insert(name, help);
                    Ok(())
                })?;
            }
            _ => return Err(meta.error("unsupported xl_func option")),
        }
        Ok(())
    }
}

/// What the doc comment says about the function
#[derive(Default)]
struct Docs {
    description: String,
    returns: String,
    params: HashMap<String, String>,
}

fn parse_docs(attrs: &[Attribute]) -> Docs {
    let mut docs = Docs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("doc")) {
        let Meta::NameValue(nv) = &attr.meta else { continue };
        let Expr::Lit(ExprLit { lit: Lit::Str(text), .. }) = &nv.value else { continue };
        let text = text.value();
        let line = text.trim();

        if let Some(ret) = line.strip_prefix("* ret:") {
            docs.returns = ret.trim().to_string();
        } else if let Some(item) = line.strip_prefix("* ") {
            if let Some((name, help)) = item.split_once(':').or_else(|| item.split_once(" - ")) {
                docs.params.insert(name.trim().replace('`', ""), help.trim().to_string());
            }
        } else if !line.is_empty() && !line.starts_with('#') && !line.starts_with('*') {
            if !docs.description.is_empty() {
                docs.description.push(' ');
            }
            docs.description.push_str(line);
        }
    }
    docs
}

impl Docs {
    fn help(&self) -> String {
        match (self.description.is_empty(), self.returns.is_empty()) {
            (true, true) => "No description available".to_string(),
            (false, true) => self.description.clone(),
            (true, false) => format!("Returns: {}", self.returns),
            (false, false) => format!("{} Returns: {}", self.description, self.returns),
        }
    }
}

fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Path(path) => path.path.segments.last().is_some_and(|seg| seg.ident == "Result"),
            _ => false,
        },
        ReturnType::Default => false,
    }
}

fn expand(options: Options, input_fn: ItemFn) -> syn::Result<TokenStream2> {
    let fn_name = &input_fn.sig.ident;
    let docs = parse_docs(&input_fn.attrs);

    let symbol = match &options.rename {
        Some(rename) => rename.clone(),
        None => format!("{}_{}", options.prefix.as_deref().unwrap_or("xl"), fn_name),
    };
    let symbol_ident = Ident::new(&symbol, Span::call_site());
    let host_name = options.name.clone().unwrap_or_else(|| symbol.clone());
    let help = options.help.clone().unwrap_or_else(|| docs.help());

    let mut wrapper_args = Vec::new();
    let mut call_args = Vec::new();
    let mut arg_types = Vec::new();
    let mut arg_names = Vec::new();
    let mut arg_help = Vec::new();
    for (i, input) in input_fn.sig.inputs.iter().enumerate() {
        let FnArg::Typed(pat_type) = input else {
            return Err(syn::Error::new_spanned(input, "xl_func cannot export methods"));
        };
        let display = match pat_type.pat.as_ref() {
            Pat::Ident(pat) => pat.ident.to_string().trim_start_matches('_').to_string(),
            _ => format!("arg{}", i + 1),
        };
        let ty = &pat_type.ty;
        let arg = format_ident!("arg{}", i);
        wrapper_args.push(quote! { #arg: #ty });
        call_args.push(arg);
        arg_types.push(ty);

        let explicit = docs.params.get(&display).or_else(|| options.params.get(&display));
        arg_help.push(match explicit {
            Some(text) => quote! { ::core::option::Option::Some(#text) },
            None => quote! { ::core::option::Option::None },
        });
        arg_names.push(display);
    }

    let body = if returns_result(&input_fn.sig.output) {
        quote! { #fn_name(#(#call_args),*) }
    } else {
        quote! { ::core::result::Result::Ok::<_, ::xlkit_core::XlKitError>(#fn_name(#(#call_args),*)) }
    };

    let category = options.category.as_ref().map(|c| quote! { .with_category(#c) });
    let register_ident = format_ident!("__xlkit_register_{}", fn_name);

    Ok(quote! {
        #input_fn

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "system" fn #symbol_ident(#(#wrapper_args),*) -> ::xlkit_core::ResultOperandPtr {
            ::xlkit_core::function::guard(move || #body)
        }

        const _: () = {
            #[allow(non_snake_case)]
            fn #register_ident(registry: &mut ::xlkit_core::Registry) {
                registry
                    .add_descriptor(::xlkit_core::xlkit_descriptor!(
                        #host_name,
                        #symbol_ident(#(#arg_types),*) -> ::xlkit_core::ResultOperandPtr,
                        #help
                    ))
                    .with_args(&[#(#arg_names),*], &[#(#arg_help),*])
                    #category;
            }

            ::xlkit_core::inventory::submit! {
                ::xlkit_core::Registration::new(#register_ident)
            }
        };
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn doc_comments_give_help_and_param_text() {
        let f: ItemFn = parse_quote! {
            /// Circumference of a circle
            /// # Parameters
            /// * radius: radius of the circle
            /// * `scale` - multiplier
            /// * ret: the circumference
            fn circ(radius: f64, scale: f64) -> f64 { radius * scale }
        };
        let docs = parse_docs(&f.attrs);
        assert_eq!(docs.description, "Circumference of a circle");
        assert_eq!(docs.params["radius"], "radius of the circle");
        assert_eq!(docs.params["scale"], "multiplier");
        assert_eq!(docs.help(), "Circumference of a circle Returns: the circumference");
    }

    #[test]
    fn result_return_types_are_detected() {
        let f: ItemFn = parse_quote! { fn a() -> std::result::Result<f64, E> { todo!() } };
        assert!(returns_result(&f.sig.output));
        let f: ItemFn = parse_quote! { fn a() -> f64 { 0.0 } };
        assert!(!returns_result(&f.sig.output));
    }

    #[test]
    fn expansion_names_the_symbol_and_registration() {
        let options = Options {
            name: Some("Circ".to_string()),
            category: Some("Geometry".to_string()),
            ..Default::default()
        };
        let f: ItemFn = parse_quote! { fn circ(_radius: f64) -> f64 { 0.0 } };
        let tokens = expand(options, f).unwrap().to_string();
        assert!(tokens.contains("extern \"system\" fn xl_circ"));
        assert!(tokens.contains("xlkit_descriptor ! (\"Circ\" , xl_circ (f64) ->"));
        assert!(tokens.contains("& [\"radius\"]"));
        assert!(tokens.contains("with_category (\"Geometry\")"));
    }

    #[test]
    fn methods_are_rejected() {
        let f: ItemFn = parse_quote! { fn m(&self) -> f64 { 0.0 } };
        assert!(expand(Options::default(), f).is_err());
    }
}
