//! Parsing of `#[persist(..)]` attributes.

use proc_macro2::Span;
use syn::{Attribute, Field, LitInt, LitStr, spanned::Spanned};

/// Type-level attributes: `#[persist(version = N, name = "..", export)]`.
#[derive(Default)]
pub struct TypeAttributes {
    pub version: Option<(u32, Span)>,
    pub name: Option<LitStr>,
    pub export: bool,
}

impl TypeAttributes {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        let attrs = attrs.iter().filter(|attr| attr.path().is_ident("persist"));

        for attr in attrs {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("version") {
                    let lit: LitInt = meta.value()?.parse()?;
                    result.version = Some((lit.base10_parse()?, lit.span()));
                    Ok(())
                } else if meta.path.is_ident("name") {
                    let lit: LitStr = meta.value()?.parse()?;
                    if lit.value().is_empty() {
                        return Err(syn::Error::new(
                            lit.span(),
                            "the stable type name must not be empty",
                        ));
                    }
                    result.name = Some(lit);
                    Ok(())
                } else if meta.path.is_ident("export") {
                    result.export = true;
                    Ok(())
                } else {
                    Err(meta.error("unknown persist attribute"))
                }
            })?;
        }

        Ok(result)
    }
}

/// Field-level attributes: `#[persist(base)]`, `#[persist(skip)]`,
/// `#[persist(since = V)]`.
#[derive(Default)]
pub struct FieldAttributes {
    pub base: bool,
    pub skip: bool,
    pub since: Option<(u32, Span)>,
}

impl FieldAttributes {
    pub fn parse(field: &Field) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in
            field.attrs.iter().filter(|attr| attr.path().is_ident("persist"))
        {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("base") {
                    result.base = true;
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    result.skip = true;
                    Ok(())
                } else if meta.path.is_ident("since") {
                    let lit: LitInt = meta.value()?.parse()?;
                    result.since = Some((lit.base10_parse()?, lit.span()));
                    Ok(())
                } else {
                    Err(meta.error("unknown persist field attribute"))
                }
            })?;
        }

        if result.base && (result.skip || result.since.is_some()) {
            return Err(syn::Error::new(
                field.span(),
                "the base field cannot be skipped or versioned",
            ));
        }

        if result.skip && result.since.is_some() {
            return Err(syn::Error::new(
                field.span(),
                "a skipped field cannot carry `since`",
            ));
        }

        Ok(result)
    }
}

/// Only `#[persist(skip)]` is meaningful on plain `Encode`/`Decode` types.
pub fn should_skip(field: &Field) -> syn::Result<bool> {
    let attributes = FieldAttributes::parse(field)?;

    if attributes.base || attributes.since.is_some() {
        return Err(syn::Error::new(
            field.span(),
            "`base` and `since` only apply to `#[derive(Persist)]` types",
        ));
    }

    Ok(attributes.skip)
}
