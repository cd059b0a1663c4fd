//! Service macro implementation.
//!
//! Expands `#[service]` into the original `impl` block followed by an
//! `impl Service for T` whose method table records every public method.

use proc_macro2::TokenStream;
use proc_macro_crate::{crate_name, FoundCrate};
use quote::{format_ident, quote};
use syn::ItemImpl;

use crate::parse::{type_name, ReceiverKind, ServiceAttrs, ServiceImpl, ServiceMethod, Tag};

/// Expands the `#[service]` attribute macro.
pub fn expand_service(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let attrs: ServiceAttrs = syn::parse2(attr)?;
    let item: ItemImpl = syn::parse2(item)?;
    let service = ServiceImpl::parse(item, &attrs)?;

    Ok(generate_service_code(&service, &core_path()))
}

/// Path to `sextant_core` as seen from the crate invoking the macro.
fn core_path() -> TokenStream {
    match crate_name("sextant") {
        Ok(FoundCrate::Name(name)) => {
            let ident = format_ident!("{}", name);
            quote! { ::#ident::core }
        }
        Ok(FoundCrate::Itself) => quote! { ::sextant::core },
        Err(_) => match crate_name("sextant-core") {
            Ok(FoundCrate::Name(name)) => {
                let ident = format_ident!("{}", name);
                quote! { ::#ident }
            }
            Ok(FoundCrate::Itself) => quote! { crate },
            Err(_) => quote! { ::sextant::core },
        },
    }
}

fn generate_service_code(service: &ServiceImpl, krate: &TokenStream) -> TokenStream {
    let item = &service.item;
    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();
    let name = &service.name;
    let entries = service
        .methods
        .iter()
        .map(|method| generate_entry(method, krate));

    quote! {
        #item

        impl #impl_generics #krate::Service for #self_ty #where_clause {
            const NAME: &'static str = #name;

            fn methods() -> ::std::vec::Vec<#krate::MethodEntry<Self>> {
                ::std::vec![#(#entries),*]
            }
        }
    }
}

fn generate_entry(method: &ServiceMethod, krate: &TokenStream) -> TokenStream {
    let name = method.ident.to_string();
    let receiver = match method.receiver {
        ReceiverKind::Shared => quote! { #krate::Receiver::Shared },
        ReceiverKind::Exclusive => quote! { #krate::Receiver::Exclusive },
        ReceiverKind::Owned => quote! { #krate::Receiver::Owned },
    };
    let params = method.params.iter().map(|tag| type_tag(tag, krate));
    let returns = method.returns.iter().map(|tag| type_tag(tag, krate));
    let is_async = method.is_async;
    let invoker = match generate_invoker(method, krate) {
        Some(invoker) => quote! { ::std::option::Option::Some(#invoker) },
        None => quote! { ::std::option::Option::None },
    };

    quote! {
        #krate::MethodEntry::new(
            #krate::MethodSignature::new(
                #name,
                #receiver,
                ::std::vec![#(#params),*],
                ::std::vec![#(#returns),*],
                #is_async,
            ),
            #invoker,
        )
    }
}

fn type_tag(tag: &Tag, krate: &TokenStream) -> TokenStream {
    match tag {
        Tag::Context => quote! { #krate::TypeTag::Context },
        Tag::Payload(ty) => {
            let name = type_name(ty);
            quote! { #krate::TypeTag::Payload(#name) }
        }
        Tag::Error(ty) => {
            let name = type_name(ty);
            quote! { #krate::TypeTag::Error(#name) }
        }
        Tag::Reference(ty) => {
            let name = type_name(ty);
            quote! { #krate::TypeTag::Reference(#name) }
        }
        Tag::Other(ty) => {
            let name = type_name(ty);
            quote! { #krate::TypeTag::Other(#name) }
        }
    }
}

/// Builds the invoker for methods of one of the four callable shapes.
///
/// Anything else gets no invoker; the runtime validator then reports the
/// exact rule the method breaks.
fn generate_invoker(method: &ServiceMethod, krate: &TokenStream) -> Option<TokenStream> {
    if method.receiver != ReceiverKind::Shared || method.is_generic {
        return None;
    }

    let ident = &method.ident;
    let call_suffix = if method.is_async {
        quote! { .await }
    } else {
        quote! {}
    };

    let request = match method.params.as_slice() {
        [ctx] if ctx.is_context() => None,
        [ctx, request] if ctx.is_context() => Some(request.payload()?),
        _ => return None,
    };
    let replies = match method.returns.as_slice() {
        [error] if error.is_error() => false,
        [response, error] if error.is_error() && response.payload().is_some() => true,
        _ => return None,
    };

    let svc = quote! { svc: ::std::sync::Arc<Self> };
    let ctx = quote! { ctx: #krate::Context };

    let invoker = match (request, replies) {
        (None, false) => quote! {
            #krate::Invoker::unit(|#svc, #ctx| async move {
                svc.#ident(&ctx)#call_suffix
            })
        },
        (None, true) => quote! {
            #krate::Invoker::reply(|#svc, #ctx| async move {
                svc.#ident(&ctx)#call_suffix
            })
        },
        (Some(request), false) => quote! {
            #krate::Invoker::accept(|#svc, #ctx, request: #request| async move {
                svc.#ident(&ctx, request)#call_suffix
            })
        },
        (Some(request), true) => quote! {
            #krate::Invoker::exchange(|#svc, #ctx, request: #request| async move {
                svc.#ident(&ctx, request)#call_suffix
            })
        },
    };
    Some(invoker)
}
