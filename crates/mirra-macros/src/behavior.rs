use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Ident, ItemFn, LitStr, parse_macro_input};

/// Implementation of `#[register_behavior("Name")]`.
///
/// Leaves the decorated constructor unchanged and appends a
/// `#[::mirra_core::linkme::distributed_slice]` static that publishes it in
/// `mirra_core::BEHAVIOR_REGISTRY` under `Name`.
pub fn register_behavior(attr: TokenStream, item: TokenStream) -> TokenStream {
    let name = parse_macro_input!(attr as LitStr);
    let func = parse_macro_input!(item as ItemFn);

    if name.value().is_empty() {
        return syn::Error::new(name.span(), "behavior name must not be empty")
            .into_compile_error()
            .into();
    }

    if let Some(asyncness) = &func.sig.asyncness {
        return syn::Error::new_spanned(
            asyncness,
            "behavior constructors must be plain functions `fn(PluginConf) -> BoxedBehavior`",
        )
        .into_compile_error()
        .into();
    }

    let fn_name = &func.sig.ident;
    let fn_name_upper = fn_name.to_string().to_uppercase();
    let static_name = Ident::new(
        &format!("_BEHAVIOR_REGISTER_{fn_name_upper}"),
        Span::call_site(),
    );

    quote! {
        #func

        #[::mirra_core::linkme::distributed_slice(::mirra_core::BEHAVIOR_REGISTRY)]
        #[linkme(crate = ::mirra_core::linkme)]
        static #static_name: ::mirra_core::BehaviorEntry = ::mirra_core::BehaviorEntry {
            name: #name,
            factory: #fn_name,
        };
    }
    .into()
}
