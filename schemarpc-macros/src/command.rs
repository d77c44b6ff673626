//! `#[command]` expansion
//!
//! Input:
//! ```ignore
//! #[command]
//! async fn user_get(dto: GetUser) -> CommandResult<User> {
//!     load_user(dto.id).await
//! }
//! ```
//!
//! Generated output:
//! ```ignore
//! fn user_get() -> Box<dyn ::schemarpc_server::Command> {
//!     async fn __command(dto: GetUser) -> CommandResult<User> {
//!         load_user(dto.id).await
//!     }
//!     ::schemarpc_server::typed_command(__command)
//! }
//! ```
//!
//! With `factory = path` the DTO is built by `path` through
//! `command_with_factory`; without an argument the command ignores params.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse::Parser, FnArg, ItemFn, Path};

/// Arguments accepted inside `#[command(...)]`
#[derive(Default)]
struct CommandArgs {
    factory: Option<Path>,
}

impl CommandArgs {
    fn parse(attr: TokenStream) -> syn::Result<Self> {
        let mut args = CommandArgs::default();
        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("factory") {
                args.factory = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported command argument, expected `factory = path`"))
            }
        });
        parser.parse2(attr)?;
        Ok(args)
    }
}

pub fn command_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    match expand(attr, item) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error(),
    }
}

fn expand(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let args = CommandArgs::parse(attr)?;
    let input_fn: ItemFn = syn::parse2(item)?;
    let sig = &input_fn.sig;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[command] can only be used on async functions",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "#[command] functions cannot be generic",
        ));
    }
    if sig.inputs.len() > 1 {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "#[command] functions take at most one DTO argument",
        ));
    }

    let dto = match sig.inputs.first() {
        Some(FnArg::Typed(pat_type)) => Some(pat_type),
        Some(FnArg::Receiver(receiver)) => {
            return Err(syn::Error::new_spanned(
                receiver,
                "#[command] cannot be used on methods",
            ));
        }
        None => None,
    };

    let fn_name = &sig.ident;
    let fn_vis = &input_fn.vis;
    let fn_attrs = &input_fn.attrs;
    let fn_block = &input_fn.block;
    let output = &sig.output;

    let (inner_args, construct) = match (dto, args.factory) {
        (Some(dto), Some(factory)) => (
            quote! { #dto },
            quote! { ::schemarpc_server::command_with_factory(#factory, __command) },
        ),
        (Some(dto), None) => (
            quote! { #dto },
            quote! { ::schemarpc_server::typed_command(__command) },
        ),
        (None, None) => (
            quote! {},
            quote! { ::schemarpc_server::raw_command(|_| __command()) },
        ),
        (None, Some(factory)) => {
            return Err(syn::Error::new_spanned(
                factory,
                "`factory` needs a DTO argument to build",
            ));
        }
    };

    Ok(quote! {
        #(#fn_attrs)*
        #fn_vis fn #fn_name() -> ::std::boxed::Box<dyn ::schemarpc_server::Command> {
            async fn __command(#inner_args) #output #fn_block

            #construct
        }
    })
}
