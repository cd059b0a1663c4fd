//! Parsing utilities for the service macro.
//!
//! Turns an `impl` block into a list of [`ServiceMethod`]s: the receiver
//! kind plus a [`Tag`] for every parameter and return value.

use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    Expr, ExprLit, FnArg, GenericArgument, Ident, ImplItem, ImplItemFn, ItemImpl, Lit, Meta,
    PathArguments, ReturnType, Token, Type, TypePath, Visibility,
};

/// Parsed `#[service(...)]` arguments.
#[derive(Debug, Default)]
pub struct ServiceAttrs {
    /// Overrides the service name derived from the self type.
    pub name: Option<String>,
}

impl Parse for ServiceAttrs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut attrs = Self::default();
        let meta_list: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in meta_list {
            let Meta::NameValue(nv) = &meta else {
                return Err(syn::Error::new(meta.span(), "expected name = value"));
            };
            let ident = nv
                .path
                .get_ident()
                .ok_or_else(|| syn::Error::new(nv.path.span(), "expected identifier"))?
                .to_string();
            let value = match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => s.value(),
                _ => {
                    return Err(syn::Error::new(
                        nv.value.span(),
                        "expected string literal",
                    ))
                }
            };

            match ident.as_str() {
                "name" => attrs.name = Some(value),
                _ => {
                    return Err(syn::Error::new(
                        nv.path.span(),
                        format!("unknown attribute: {ident}"),
                    ))
                }
            }
        }

        Ok(attrs)
    }
}

/// Classification of one declared type.
#[derive(Debug, Clone)]
pub enum Tag {
    /// `&Context`
    Context,
    /// Owned value.
    Payload(Type),
    /// Error half of a `Result`.
    Error(Type),
    /// Any other reference.
    Reference(Type),
    /// Unclassifiable.
    Other(Type),
}

impl Tag {
    /// The owned payload type, if this is one.
    pub fn payload(&self) -> Option<&Type> {
        match self {
            Self::Payload(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn is_context(&self) -> bool {
        matches!(self, Self::Context)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// How the method takes `self`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverKind {
    Shared,
    Exclusive,
    Owned,
}

/// One public method of the service.
#[derive(Debug)]
pub struct ServiceMethod {
    pub ident: Ident,
    pub receiver: ReceiverKind,
    pub params: Vec<Tag>,
    pub returns: Vec<Tag>,
    pub is_async: bool,
    /// Declares its own type or const parameters, so no closure can call it
    /// without turbofish.
    pub is_generic: bool,
}

impl ServiceMethod {
    /// Parses a method. Returns `None` for associated functions without a
    /// receiver.
    pub fn parse(item: &ImplItemFn) -> Option<Self> {
        let sig = &item.sig;
        let receiver = receiver_kind(sig.receiver()?);

        let params = sig
            .inputs
            .iter()
            .filter_map(|arg| match arg {
                FnArg::Typed(pat_type) => Some(classify(&pat_type.ty)),
                FnArg::Receiver(_) => None,
            })
            .collect();

        let is_generic = sig
            .generics
            .params
            .iter()
            .any(|param| !matches!(param, syn::GenericParam::Lifetime(_)));

        Some(Self {
            ident: sig.ident.clone(),
            receiver,
            params,
            returns: classify_returns(&sig.output),
            is_async: sig.asyncness.is_some(),
            is_generic,
        })
    }
}

/// Parsed `impl` block.
#[derive(Debug)]
pub struct ServiceImpl {
    pub item: ItemImpl,
    pub name: String,
    pub methods: Vec<ServiceMethod>,
}

impl ServiceImpl {
    /// Parses an inherent `impl` block.
    pub fn parse(item: ItemImpl, attrs: &ServiceAttrs) -> syn::Result<Self> {
        if let Some((_, path, _)) = &item.trait_ {
            return Err(syn::Error::new(
                path.span(),
                "#[service] must be placed on an inherent impl block",
            ));
        }

        let name = match &attrs.name {
            Some(name) => name.clone(),
            None => self_type_name(&item.self_ty)?,
        };

        let methods = item
            .items
            .iter()
            .filter_map(|item| match item {
                ImplItem::Fn(method) if matches!(method.vis, Visibility::Public(_)) => {
                    ServiceMethod::parse(method)
                }
                _ => None,
            })
            .collect();

        Ok(Self {
            item,
            name,
            methods,
        })
    }
}

fn self_type_name(ty: &Type) -> syn::Result<String> {
    match ty {
        Type::Path(TypePath { path, .. }) => path
            .segments
            .last()
            .map(|segment| segment.ident.to_string())
            .ok_or_else(|| syn::Error::new(ty.span(), "empty type path")),
        _ => Err(syn::Error::new(
            ty.span(),
            "#[service] needs a named self type; use #[service(name = \"...\")]",
        )),
    }
}

fn receiver_kind(receiver: &syn::Receiver) -> ReceiverKind {
    if receiver.reference.is_some() {
        return if receiver.mutability.is_some() {
            ReceiverKind::Exclusive
        } else {
            ReceiverKind::Shared
        };
    }
    // `self: &Self` style
    if receiver.colon_token.is_some() {
        if let Type::Reference(reference) = &*receiver.ty {
            return if reference.mutability.is_some() {
                ReceiverKind::Exclusive
            } else {
                ReceiverKind::Shared
            };
        }
    }
    ReceiverKind::Owned
}

/// Classifies a parameter or a non-`Result` return type.
pub fn classify(ty: &Type) -> Tag {
    match ty {
        Type::Paren(inner) => classify(&inner.elem),
        Type::Group(inner) => classify(&inner.elem),
        Type::Reference(reference) => {
            if reference.mutability.is_none() && is_context(&reference.elem) {
                Tag::Context
            } else {
                Tag::Reference(ty.clone())
            }
        }
        Type::Path(_) | Type::Tuple(_) | Type::Array(_) => Tag::Payload(ty.clone()),
        _ => Tag::Other(ty.clone()),
    }
}

/// Paths accepted as the context type. Matching is by name: an unqualified
/// `Context` is assumed to be the imported `sextant_core::Context`, and any
/// other crate's `Context` becomes a plain reference.
const CONTEXT_PATHS: &[&[&str]] = &[
    &["Context"],
    &["sextant", "Context"],
    &["sextant", "core", "Context"],
    &["sextant", "prelude", "Context"],
    &["sextant_core", "Context"],
];

/// Result names whose last generic argument (or the alias itself) is the
/// error half. Other `*Result` types are ordinary payloads.
const RESULT_NAMES: &[&str] = &["Result", "ServiceResult"];

fn is_context(ty: &Type) -> bool {
    let Type::Path(TypePath { qself: None, path }) = ty else {
        return false;
    };
    if path.segments.iter().any(|segment| !segment.arguments.is_none()) {
        return false;
    }
    let segments: Vec<String> = path
        .segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .collect();
    CONTEXT_PATHS
        .iter()
        .any(|candidate| candidate.iter().copied().eq(segments.iter().map(String::as_str)))
}

fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(tuple) if tuple.elems.is_empty())
}

/// Maps a return type to its return list.
pub fn classify_returns(output: &ReturnType) -> Vec<Tag> {
    let ReturnType::Type(_, ty) = output else {
        return Vec::new();
    };

    match &**ty {
        Type::Tuple(tuple) => tuple.elems.iter().map(classify).collect(),
        Type::Path(path) => match result_args(path) {
            Some(args) => result_tags(ty, &args),
            None => vec![classify(ty)],
        },
        other => vec![classify(other)],
    }
}

/// Generic type arguments of a `Result` path, e.g. `Result<T, E>`,
/// `io::Result<T>` or `ServiceResult<T>`.
fn result_args(path: &TypePath) -> Option<Vec<Type>> {
    let segment = path.path.segments.last()?;
    if !RESULT_NAMES.iter().any(|name| segment.ident == *name) {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    let types: Vec<Type> = args
        .args
        .iter()
        .filter_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty.clone()),
            _ => None,
        })
        .collect();
    (1..=2).contains(&types.len()).then_some(types)
}

fn result_tags(result: &Type, args: &[Type]) -> Vec<Tag> {
    let error = match args {
        [_, error] => Tag::Error(error.clone()),
        // Single-argument alias: the error type is fixed by the alias.
        _ => Tag::Error(result.clone()),
    };
    let value = &args[0];
    if is_unit(value) {
        vec![error]
    } else {
        vec![classify(value), error]
    }
}

/// Human-readable type name for diagnostics, e.g. `&mut Context` or
/// `Vec<Job>`.
pub fn type_name(ty: &Type) -> String {
    tidy(&quote!(#ty).to_string())
}

fn tidy(raw: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());

    for (i, &c) in chars.iter().enumerate() {
        match c {
            ' ' => {
                let prev = out.chars().last().is_some_and(is_word);
                let next = chars.get(i + 1).is_some_and(|&n| is_word(n) || n == '\'');
                if prev && next {
                    out.push(' ');
                }
            }
            ',' => out.push_str(", "),
            _ => out.push(c),
        }
    }
    out.trim_end().to_string()
}
