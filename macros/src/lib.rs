//! `#[rxcore_macro::test]`: one test attribute for sync and async tests.
//!
//! - `#[rxcore_macro::test] fn ..` expands to `#[test]`.
//! - `#[rxcore_macro::test] async fn ..` expands to `#[tokio::test]`.
//! - `#[rxcore_macro::test(local)] async fn ..` runs on a current-thread runtime.
//! - `#[rxcore_macro::test(shared)] async fn ..` runs on a multi-thread runtime, which is what the
//!   lock and hub tests use to get real cross-thread interleavings.
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Ident, ItemFn, LitStr};

const USAGE: &str = "rxcore_macro::test only accepts: #[rxcore_macro::test], \
                     #[rxcore_macro::test(local)], #[rxcore_macro::test(shared)], or string \
                     equivalents";

enum Flavor {
  Default,
  Local,
  Shared,
}

fn parse_flavor(raw_args: proc_macro2::TokenStream) -> syn::Result<Flavor> {
  if raw_args.is_empty() {
    return Ok(Flavor::Default);
  }

  let (name, span) = if let Ok(ident) = syn::parse2::<Ident>(raw_args.clone()) {
    (ident.to_string(), ident.span())
  } else if let Ok(lit) = syn::parse2::<LitStr>(raw_args.clone()) {
    (lit.value(), lit.span())
  } else {
    return Err(syn::Error::new(raw_args.span(), USAGE));
  };

  match name.as_str() {
    "local" => Ok(Flavor::Local),
    "shared" => Ok(Flavor::Shared),
    _ => Err(syn::Error::new(span, USAGE)),
  }
}

#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);
  let is_async = input.sig.asyncness.is_some();
  let raw_args = proc_macro2::TokenStream::from(attr);

  if !is_async && !raw_args.is_empty() {
    return syn::Error::new(
      raw_args.span(),
      "rxcore_macro::test flavor args are only supported for async tests. Use \
       #[rxcore_macro::test] for sync tests, or make the function async.",
    )
    .to_compile_error()
    .into();
  }

  let flavor = match parse_flavor(raw_args) {
    Ok(flavor) => flavor,
    Err(err) => return err.to_compile_error().into(),
  };

  let attr = if !is_async {
    quote!(#[test])
  } else {
    match flavor {
      Flavor::Default => quote!(#[tokio::test]),
      Flavor::Local => quote!(#[tokio::test(flavor = "current_thread")]),
      Flavor::Shared => quote!(#[tokio::test(flavor = "multi_thread", worker_threads = 4)]),
    }
  };

  let expanded = quote! {
      #attr
      #input
  };

  TokenStream::from(expanded)
}
