use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{Ident, ItemFn, LitStr, Token, parse_macro_input};

/// Parsed `#[register_addon(kind, module = "...")]` arguments.
struct RegisterArgs {
    kind: Ident,
    module: Option<LitStr>,
}

impl Parse for RegisterArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let kind: Ident = input.parse()?;
        let mut module = None;

        while input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            if key == "module" {
                module = Some(input.parse::<LitStr>()?);
            } else {
                return Err(syn::Error::new(
                    key.span(),
                    format!("unknown argument `{key}`, expected `module = \"...\"`"),
                ));
            }
        }

        Ok(Self { kind, module })
    }
}

/// Implementation of `#[register_addon(kind)]`.
///
/// Leaves the decorated function unchanged and appends a
/// `#[::siding_framework::linkme::distributed_slice]` static that adds it to
/// `ADDON_FACTORIES`.
pub fn register_addon(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as RegisterArgs);
    let func = parse_macro_input!(item as ItemFn);

    if let Some(asyncness) = &func.sig.asyncness {
        return syn::Error::new_spanned(asyncness, "add-on factories must not be async")
            .into_compile_error()
            .into();
    }
    if func.sig.inputs.len() != 1 {
        return syn::Error::new_spanned(
            &func.sig.inputs,
            "add-on factories take exactly one `&AddonDescriptor` argument",
        )
        .into_compile_error()
        .into();
    }

    let fn_name = &func.sig.ident;
    let fn_name_upper = fn_name.to_string().to_uppercase();
    let static_name = Ident::new(
        &format!("_ADDON_FACTORY_{fn_name_upper}"),
        Span::call_site(),
    );

    let kind = args.kind.to_string();
    let module = args
        .module
        .map(|m| m.value())
        .unwrap_or_else(|| fn_name.to_string());

    quote! {
        #func

        #[::siding_framework::linkme::distributed_slice(::siding_framework::ADDON_FACTORIES)]
        #[linkme(crate = ::siding_framework::linkme)]
        static #static_name: ::siding_framework::AddonFactoryEntry =
            ::siding_framework::AddonFactoryEntry {
                addon_type: #kind,
                module: #module,
                factory: #fn_name,
            };
    }
    .into()
}
