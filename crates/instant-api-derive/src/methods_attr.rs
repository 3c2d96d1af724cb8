//! Implementation of #[methods] attribute macro

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Expr, FnArg, ImplItem, ImplItemFn, ItemImpl, Lit, Meta, Pat, Result, ReturnType, Token, Type,
    Visibility, punctuated::Punctuated,
};

use crate::utils::{
    extract_doc, extract_param_meta, extract_result_ok_type, extract_rpc_meta, is_option_type,
    unraw,
};

pub fn methods_impl(args: Punctuated<Meta, Token![,]>, mut input: ItemImpl) -> Result<TokenStream> {
    let tags = parse_tags(args)?;

    if let Some((_, path, _)) = &input.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[methods] must be placed on an inherent impl block",
        ));
    }
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[methods] does not support generic impl blocks",
        ));
    }

    let mut registrations = Vec::new();
    for item in &input.items {
        if let ImplItem::Fn(method) = item
            && let Some(registration) = method_registration(method, &tags)?
        {
            registrations.push(registration);
        }
    }

    // Helper attributes are ours; the compiler must not see them
    for item in &mut input.items {
        if let ImplItem::Fn(method) = item {
            method.attrs.retain(|attr| !attr.path().is_ident("rpc"));
            for arg in &mut method.sig.inputs {
                if let FnArg::Typed(pat_type) = arg {
                    pat_type.attrs.retain(|attr| !attr.path().is_ident("param"));
                }
            }
        }
    }

    let self_ty = &input.self_ty;

    Ok(quote! {
        #input

        #[automatically_derived]
        impl ::instant_api::RpcService for #self_ty {
            fn methods(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::vec::Vec<::instant_api::RpcMethod> {
                ::std::vec![#(#registrations),*]
            }
        }
    })
}

/// `tags = ["a", "b"]` or `tag = "a"`
fn parse_tags(args: Punctuated<Meta, Token![,]>) -> Result<Vec<String>> {
    let mut tags = Vec::new();
    for arg in args {
        match arg {
            Meta::NameValue(nv) if nv.path.is_ident("tags") => match &nv.value {
                Expr::Array(array) => {
                    for elem in &array.elems {
                        tags.push(string_literal(elem)?);
                    }
                }
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "expected `tags = [\"...\", ...]`",
                    ));
                }
            },
            Meta::NameValue(nv) if nv.path.is_ident("tag") => {
                tags.push(string_literal(&nv.value)?);
            }
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "unsupported argument, expected `tags = [...]`",
                ));
            }
        }
    }
    Ok(tags)
}

fn string_literal(expr: &Expr) -> Result<String> {
    if let Expr::Lit(expr_lit) = expr
        && let Lit::Str(s) = &expr_lit.lit
    {
        Ok(s.value())
    } else {
        Err(syn::Error::new_spanned(expr, "expected a string literal"))
    }
}

/// Builder expression for one exposed method, `None` when not exposed
fn method_registration(method: &ImplItemFn, tags: &[String]) -> Result<Option<TokenStream>> {
    if !matches!(method.vis, Visibility::Public(_)) {
        return Ok(None);
    }
    let rpc = extract_rpc_meta(&method.attrs)?;
    if rpc.skip {
        return Ok(None);
    }

    let sig = &method.sig;
    let Some(receiver) = sig.receiver() else {
        return Ok(None);
    };
    if receiver.reference.is_none() || receiver.mutability.is_some() {
        return Err(syn::Error::new_spanned(
            receiver,
            "exposed methods must take `&self`",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "exposed methods cannot be generic",
        ));
    }

    let fn_ident = &sig.ident;
    let rpc_name = rpc.name.unwrap_or_else(|| unraw(fn_ident));

    let mut param_decls = Vec::new();
    let mut extractions = Vec::new();
    let mut call_args = Vec::new();

    for arg in sig.inputs.iter().skip(1) {
        let FnArg::Typed(pat_type) = arg else {
            continue;
        };
        let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            return Err(syn::Error::new_spanned(
                &pat_type.pat,
                "exposed method parameters must be plain identifiers",
            ));
        };
        let ty = pat_type.ty.as_ref();
        if let Type::Reference(_) = ty {
            return Err(syn::Error::new_spanned(
                ty,
                "exposed method parameters must be owned types",
            ));
        }

        let param_name = unraw(&pat_ident.ident);
        let local = format_ident!("__{}", param_name);
        let meta = extract_param_meta(&pat_type.attrs)?;

        param_decls.push(match meta.default {
            Some(default) => quote! { .param_with_default::<#ty>(#param_name, #default) },
            None if is_option_type(ty) => {
                quote! { .param_with_default::<#ty>(#param_name, ::core::option::Option::None) }
            }
            None => quote! { .param::<#ty>(#param_name) },
        });
        extractions.push(quote! { let #local: #ty = __args.take(#param_name)?; });
        call_args.push(local);
    }

    let await_call = sig.asyncness.map(|_| quote! { .await });
    let call = quote! { __service.#fn_ident(#(#call_args),*) #await_call };

    let body = match &sig.output {
        ReturnType::Type(_, ty) if extract_result_ok_type(ty).is_some() => quote! {
            #call.map_err(|e| -> ::instant_api::MethodError { ::core::convert::Into::into(e) })
        },
        ReturnType::Type(..) => quote! {
            ::core::result::Result::Ok::<_, ::instant_api::MethodError>(#call)
        },
        ReturnType::Default => quote! {
            #call;
            ::core::result::Result::Ok::<(), ::instant_api::MethodError>(())
        },
    };

    let description = extract_doc(&method.attrs).map(|doc| quote! { .description(#doc) });
    let tag_decls = tags.iter().map(|tag| quote! { .tag(#tag) });
    let args_binding = if extractions.is_empty() {
        quote! { _ }
    } else {
        quote! { mut __args }
    };

    Ok(Some(quote! {
        {
            let __service = ::std::sync::Arc::clone(&self);
            ::instant_api::MethodBuilder::new(#rpc_name)
                #description
                #(#tag_decls)*
                #(#param_decls)*
                .handler(move |#args_binding: ::instant_api::BoundArgs| {
                    let __service = ::std::sync::Arc::clone(&__service);
                    async move {
                        #(#extractions)*
                        #body
                    }
                })
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand(args: Punctuated<Meta, Token![,]>, input: ItemImpl) -> String {
        methods_impl(args, input).unwrap().to_string()
    }

    #[test]
    fn test_exposes_public_self_methods() {
        let out = expand(
            parse_quote!(tags = ["Point methods"]),
            parse_quote! {
                impl Methods {
                    /// Move a point.
                    pub fn translate(&self, p: Point, dx: i64, #[param(default = 0)] dy: i64) -> Point {
                        Point { x: p.x + dx, y: p.y + dy }
                    }

                    fn private_helper(&self) {}

                    pub fn constructor() -> Self { Methods }
                }
            },
        );

        assert!(out.contains("impl :: instant_api :: RpcService for Methods"));
        assert!(out.contains("MethodBuilder :: new (\"translate\")"));
        assert!(out.contains(". description (\"Move a point.\")"));
        assert!(out.contains(". tag (\"Point methods\")"));
        assert!(out.contains(". param :: < Point > (\"p\")"));
        assert!(out.contains(". param_with_default :: < i64 > (\"dy\" , 0)"));
        assert!(!out.contains("\"private_helper\""));
        assert!(!out.contains("\"constructor\""));
        // Helper attributes are stripped from the emitted impl
        assert!(!out.contains("# [param"));
    }

    #[test]
    fn test_async_result_and_unit_returns() {
        let out = expand(
            Punctuated::new(),
            parse_quote! {
                impl Store {
                    pub async fn load(&self, key: String) -> MethodResult<Option<String>> {
                        Ok(None)
                    }

                    pub fn reset(&self) {}
                }
            },
        );
        assert!(out.contains("__service . load (__key) . await . map_err"));
        assert!(out.contains("Ok :: < () , :: instant_api :: MethodError > (())"));
    }

    #[test]
    fn test_option_params_default_to_none_and_rename() {
        let out = expand(
            Punctuated::new(),
            parse_quote! {
                impl Store {
                    #[rpc(name = "find")]
                    pub fn search(&self, limit: Option<u32>) -> Vec<String> { vec![] }

                    #[rpc(skip)]
                    pub fn internal(&self) {}
                }
            },
        );
        assert!(out.contains("MethodBuilder :: new (\"find\")"));
        assert!(out.contains(
            ". param_with_default :: < Option < u32 > > (\"limit\" , :: core :: option :: Option :: None)"
        ));
        assert!(!out.contains("\"internal\""));
        assert!(!out.contains("# [rpc"));
    }

    #[test]
    fn test_rejections() {
        let mut_self: ItemImpl = parse_quote! {
            impl Counter {
                pub fn bump(&mut self) {}
            }
        };
        assert!(methods_impl(Punctuated::new(), mut_self).is_err());

        let borrowed: ItemImpl = parse_quote! {
            impl Counter {
                pub fn name(&self, prefix: &str) -> String { prefix.to_string() }
            }
        };
        assert!(methods_impl(Punctuated::new(), borrowed).is_err());

        let trait_impl: ItemImpl = parse_quote! {
            impl Default for Counter {
                fn default() -> Self { Counter }
            }
        };
        assert!(methods_impl(Punctuated::new(), trait_impl).is_err());

        let bad_tags: Punctuated<Meta, Token![,]> = parse_quote!(tags = "single");
        let plain: ItemImpl = parse_quote! { impl Counter {} };
        assert!(methods_impl(bad_tags, plain).is_err());
    }
}
