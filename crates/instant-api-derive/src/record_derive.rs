//! Implementation of #[derive(Record)]

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result, parse_quote};

use crate::utils::{
    apply_rename_rule, extract_doc, extract_record_meta, extract_serde_meta, is_option_type,
    type_mentions, unraw,
};

pub fn derive_record_impl(input: DeriveInput) -> Result<TokenStream> {
    let ident = &input.ident;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            ident,
            "Record can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            ident,
            "Record requires a struct with named fields",
        ));
    };

    let record_meta = extract_record_meta(&input.attrs)?;
    let container_serde = extract_serde_meta(&input.attrs)?;
    let record_name = record_meta.name.unwrap_or_else(|| unraw(ident));
    let container_default = record_meta.default || container_serde.default;

    let description = extract_doc(&input.attrs).map(|doc| quote! { .with_description(#doc) });

    let mut field_decls = Vec::new();
    for field in &fields.named {
        let serde = extract_serde_meta(&field.attrs)?;
        if serde.skip {
            continue;
        }
        let field_meta = extract_record_meta(&field.attrs)?;

        let Some(field_ident) = &field.ident else {
            continue;
        };
        let rust_name = unraw(field_ident);
        let wire_name = match (&serde.rename, &container_serde.rename_all) {
            (Some(rename), _) => rename.clone(),
            (None, Some(rule)) => apply_rename_rule(rule, &rust_name).ok_or_else(|| {
                syn::Error::new_spanned(ident, format!("unsupported rename_all rule '{}'", rule))
            })?,
            (None, None) => rust_name,
        };

        let ty = &field.ty;
        if type_mentions(ty, ident) {
            return Err(syn::Error::new_spanned(
                ty,
                "recursive records are not supported",
            ));
        }
        let has_default =
            container_default || serde.default || field_meta.default || is_option_type(ty);
        let describe = quote! { <#ty as ::instant_api::Describe>::describe() };
        field_decls.push(if has_default {
            quote! { .defaulted_field(#wire_name, #describe) }
        } else {
            quote! { .field(#wire_name, #describe) }
        });
    }

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(::instant_api::Describe));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::instant_api::Describe for #ident #ty_generics #where_clause {
            fn describe() -> ::instant_api::TypeDescriptor {
                ::instant_api::TypeDescriptor::Record(
                    ::instant_api::RecordDescriptor::new(#record_name)
                        #description
                        #(#field_decls)*
                )
            }
        }
    })
}
