use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Ident, ItemFn, parse_macro_input};

/// Implementation of `#[register_connector]`.
///
/// The decorated function must be
/// `async fn(ChannelConfig, Arc<dyn ChannelHandler>) -> TransportResult<ChannelHandle>`.
/// A non-capturing closure boxes its future and is published in
/// `mirra_core::CONNECT_REGISTRY`.
pub fn register_connector(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(Span::call_site(), "`register_connector` takes no arguments")
            .into_compile_error()
            .into();
    }

    let func = parse_macro_input!(item as ItemFn);

    if func.sig.asyncness.is_none() {
        return syn::Error::new_spanned(&func.sig.fn_token, "connector functions must be `async`")
            .into_compile_error()
            .into();
    }

    let fn_name = &func.sig.ident;
    let fn_name_upper = fn_name.to_string().to_uppercase();
    let static_name = Ident::new(
        &format!("_CONNECTOR_REGISTER_{fn_name_upper}"),
        Span::call_site(),
    );

    quote! {
        #func

        #[::mirra_core::linkme::distributed_slice(::mirra_core::CONNECT_REGISTRY)]
        #[linkme(crate = ::mirra_core::linkme)]
        static #static_name: ::mirra_core::ConnectFn = |
            config: ::mirra_core::ChannelConfig,
            handler: ::std::sync::Arc<dyn ::mirra_core::ChannelHandler>
        | ::futures::FutureExt::boxed(#fn_name(config, handler));
    }
    .into()
}
