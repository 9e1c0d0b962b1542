//! # Tessera Macros
//!
//! Procedural macros for Tessera action controllers.
//!
//! - `#[actions]` turns the `*_action` methods of an inherent `impl` block
//!   into a name table and a string-keyed dispatch function.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, FnArg, ImplItem, ImplItemFn, ItemImpl, LitStr, ReturnType, Type};

const ACTION_SUFFIX: &str = "_action";

/// Generate the action table of a controller
///
/// Every method whose name ends in `_action` becomes an action. Its formatted
/// name is the lower camel-case form of the method name (`list_all_action` ->
/// `listAllAction`), matching what the dispatcher produces from `list-all`.
///
/// All action methods must take `&mut self` plus exactly one context
/// argument, and share the same argument and return types. The macro adds:
///
/// - `pub const ACTIONS: &'static [&'static str]`
/// - `pub fn dispatch_action(&mut self, action: &str, ctx: Ctx) -> Option<Ret>`
///
/// ```ignore
/// #[actions]
/// impl BlogController {
///     fn list_all_action(&mut self, ctx: &mut ActionContext<'_>) -> Result<()> {
///         ctx.response.append_body("posts");
///         Ok(())
///     }
/// }
///
/// assert_eq!(BlogController::ACTIONS, &["listAllAction"]);
/// ```
#[proc_macro_attribute]
pub fn actions(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(Span::call_site(), "#[actions] takes no arguments")
            .to_compile_error()
            .into();
    }

    let item_impl = parse_macro_input!(item as ItemImpl);
    match expand(&item_impl) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(item_impl: &ItemImpl) -> syn::Result<proc_macro2::TokenStream> {
    if let Some((_, path, _)) = &item_impl.trait_ {
        return Err(syn::Error::new(
            path.span(),
            "#[actions] must be placed on an inherent impl block",
        ));
    }

    let methods: Vec<&ImplItemFn> = item_impl
        .items
        .iter()
        .filter_map(|item| match item {
            ImplItem::Fn(method) if method.sig.ident.to_string().ends_with(ACTION_SUFFIX) => {
                Some(method)
            }
            _ => None,
        })
        .collect();

    let Some(first) = methods.first() else {
        return Err(syn::Error::new(
            item_impl.self_ty.span(),
            "#[actions] found no methods ending in `_action`",
        ));
    };

    let ctx_ty = context_type(first)?;
    let ret_ty = match &first.sig.output {
        ReturnType::Type(_, ty) => ty.as_ref().clone(),
        ReturnType::Default => syn::parse_quote!(()),
    };

    let mut names = Vec::with_capacity(methods.len());
    let mut arms = Vec::with_capacity(methods.len());
    for method in &methods {
        context_type(method)?;
        let ident = &method.sig.ident;
        let name = LitStr::new(&camel_case(&ident.to_string()), ident.span());
        arms.push(quote! {
            #name => ::core::option::Option::Some(self.#ident(ctx)),
        });
        names.push(name);
    }

    let self_ty = &item_impl.self_ty;
    let (impl_generics, _, where_clause) = item_impl.generics.split_for_impl();

    Ok(quote! {
        #item_impl

        impl #impl_generics #self_ty #where_clause {
            /// Formatted names of the actions this controller declares
            pub const ACTIONS: &'static [&'static str] = &[#(#names),*];

            /// Invoke an action by formatted name; `None` if it is not declared
            #[allow(dead_code, clippy::missing_const_for_fn)]
            pub fn dispatch_action(
                &mut self,
                action: &str,
                ctx: #ctx_ty,
            ) -> ::core::option::Option<#ret_ty> {
                match action {
                    #(#arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

/// The single non-receiver argument of an action method
fn context_type(method: &ImplItemFn) -> syn::Result<Type> {
    let mut inputs = method.sig.inputs.iter();

    match inputs.next() {
        Some(FnArg::Receiver(receiver)) if receiver.mutability.is_some() && receiver.reference.is_some() => {}
        _ => {
            return Err(syn::Error::new(
                method.sig.span(),
                "action methods must take `&mut self`",
            ))
        }
    }

    let ctx = match (inputs.next(), inputs.next()) {
        (Some(FnArg::Typed(arg)), None) => arg.ty.as_ref().clone(),
        _ => {
            return Err(syn::Error::new(
                method.sig.span(),
                "action methods must take exactly one context argument",
            ))
        }
    };
    Ok(ctx)
}

/// `list_all_action` -> `listAllAction`
fn camel_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let mut upper_next = false;

    for c in ident.trim_start_matches('_').chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else if out.is_empty() {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
