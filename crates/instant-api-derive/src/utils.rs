//! Attribute and type helpers shared by the macros

use proc_macro2::{TokenStream, TokenTree};
use quote::ToTokens;
use syn::{Attribute, Expr, Lit, Result, Type};

/// Join `///` doc comment lines, or `None` when there are none
pub fn extract_doc(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta.require_name_value().ok()?.value {
            Expr::Lit(syn::ExprLit {
                lit: Lit::Str(s), ..
            }) => Some(s.value()),
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').unwrap_or(line.as_str()).trim_end().to_string())
        .collect();

    let doc = lines.join("\n").trim().to_string();
    if doc.is_empty() { None } else { Some(doc) }
}

/// `#[record(...)]` options
#[derive(Debug, Default)]
pub struct RecordMeta {
    pub name: Option<String>,
    pub default: bool,
}

pub fn extract_record_meta(attrs: &[Attribute]) -> Result<RecordMeta> {
    let mut meta = RecordMeta::default();

    for attr in attrs {
        if attr.path().is_ident("record") {
            attr.parse_nested_meta(|nested| {
                if nested.path.is_ident("name") {
                    let s: syn::LitStr = nested.value()?.parse()?;
                    meta.name = Some(s.value());
                } else if nested.path.is_ident("default") {
                    meta.default = true;
                } else {
                    return Err(nested.error("unsupported record attribute"));
                }
                Ok(())
            })?;
        }
    }

    Ok(meta)
}

/// The parts of `#[serde(...)]` that change the wire shape
#[derive(Debug, Default)]
pub struct SerdeMeta {
    pub rename: Option<String>,
    pub rename_all: Option<String>,
    pub default: bool,
    pub skip: bool,
}

pub fn extract_serde_meta(attrs: &[Attribute]) -> Result<SerdeMeta> {
    let mut meta = SerdeMeta::default();

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }
        attr.parse_nested_meta(|nested| {
            if nested.path.is_ident("rename") && nested.input.peek(syn::Token![=]) {
                let s: syn::LitStr = nested.value()?.parse()?;
                meta.rename = Some(s.value());
            } else if nested.path.is_ident("rename_all") && nested.input.peek(syn::Token![=]) {
                let s: syn::LitStr = nested.value()?.parse()?;
                meta.rename_all = Some(s.value());
            } else if nested.path.is_ident("default") {
                meta.default = true;
                skip_value(&nested)?;
            } else if nested.path.is_ident("skip") || nested.path.is_ident("skip_deserializing") {
                meta.skip = true;
            } else {
                skip_value(&nested)?;
            }
            Ok(())
        })?;
    }

    Ok(meta)
}

/// Consume `= value` or `(...)` of a nested meta we do not interpret
fn skip_value(nested: &syn::meta::ParseNestedMeta) -> Result<()> {
    if nested.input.peek(syn::Token![=]) {
        nested.value()?.parse::<Expr>()?;
    } else if nested.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in nested.input);
        content.parse::<proc_macro2::TokenStream>()?;
    }
    Ok(())
}

/// Apply a serde `rename_all` rule to a snake_case field name
pub fn apply_rename_rule(rule: &str, field: &str) -> Option<String> {
    let words: Vec<&str> = field.split('_').filter(|w| !w.is_empty()).collect();
    let capitalized = |w: &str| {
        let mut chars = w.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    };

    let renamed = match rule {
        "lowercase" => field.to_lowercase(),
        "UPPERCASE" => field.to_uppercase(),
        "snake_case" => field.to_string(),
        "SCREAMING_SNAKE_CASE" => field.to_uppercase(),
        "kebab-case" => field.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => field.replace('_', "-").to_uppercase(),
        "PascalCase" => words.iter().map(|w| capitalized(w)).collect(),
        "camelCase" => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.to_string() } else { capitalized(w) })
            .collect(),
        _ => return None,
    };
    Some(renamed)
}

/// `#[param(...)]` options on a method argument
#[derive(Debug, Default)]
pub struct ParamMeta {
    pub default: Option<Expr>,
}

pub fn extract_param_meta(attrs: &[Attribute]) -> Result<ParamMeta> {
    let mut meta = ParamMeta::default();

    for attr in attrs {
        if attr.path().is_ident("param") {
            attr.parse_nested_meta(|nested| {
                if nested.path.is_ident("default") {
                    meta.default = Some(nested.value()?.parse()?);
                    Ok(())
                } else {
                    Err(nested.error("unsupported param attribute, expected `default = ...`"))
                }
            })?;
        }
    }

    Ok(meta)
}

/// `#[rpc(...)]` options on a method
#[derive(Debug, Default)]
pub struct RpcMeta {
    pub name: Option<String>,
    pub skip: bool,
}

pub fn extract_rpc_meta(attrs: &[Attribute]) -> Result<RpcMeta> {
    let mut meta = RpcMeta::default();

    for attr in attrs {
        if attr.path().is_ident("rpc") {
            attr.parse_nested_meta(|nested| {
                if nested.path.is_ident("name") {
                    let s: syn::LitStr = nested.value()?.parse()?;
                    meta.name = Some(s.value());
                } else if nested.path.is_ident("skip") {
                    meta.skip = true;
                } else {
                    return Err(nested.error("unsupported rpc attribute"));
                }
                Ok(())
            })?;
        }
    }

    Ok(meta)
}

/// Check if a type is Option<T>
pub fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
    {
        segment.ident == "Option"
    } else {
        false
    }
}

/// Extract the Ok type from Result<T, E> or MethodResult<T>
pub fn extract_result_ok_type(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && (segment.ident == "Result" || segment.ident == "MethodResult")
        && let syn::PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(syn::GenericArgument::Type(inner_type)) = args.args.first()
    {
        return Some(inner_type);
    }
    None
}

/// Whether `ty` names `ident` or `Self` anywhere, including inside generic
/// arguments such as `Vec<Node>` or `Option<Box<Self>>`
pub fn type_mentions(ty: &Type, ident: &syn::Ident) -> bool {
    fn walk(tokens: TokenStream, ident: &syn::Ident) -> bool {
        tokens.into_iter().any(|token| match token {
            TokenTree::Ident(found) => found == *ident || found == "Self",
            TokenTree::Group(group) => walk(group.stream(), ident),
            _ => false,
        })
    }
    walk(ty.to_token_stream(), ident)
}

/// Identifier text without a raw `r#` prefix
pub fn unraw(ident: &syn::Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
}
