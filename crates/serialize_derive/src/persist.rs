//! `#[derive(Persist)]`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Member, Type, spanned::Spanned};

use crate::attributes::{FieldAttributes, TypeAttributes};

/// One field with its resolved role.
struct PersistField<'a> {
    member: Member,
    ty: &'a Type,
    attributes: FieldAttributes,
}

fn members(fields: &Fields) -> Vec<(Member, &syn::Field)> {
    fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let member = field.ident.clone().map_or_else(
                || Member::Unnamed(syn::Index::from(index)),
                Member::Named,
            );
            (member, field)
        })
        .collect()
}

pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "Persist cannot be derived for generic types; a stable type name \
             must identify exactly one type",
        ));
    }

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "Persist can only be derived for structs; use PersistEnum for \
             fieldless enums",
        ));
    };

    let attributes = TypeAttributes::parse(&input.attrs)?;
    let Some((version, _)) = attributes.version else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "missing `#[persist(version = N)]`: a self-describing type must \
             declare its version",
        ));
    };

    let mut fields = Vec::new();
    for (member, field) in members(&data.fields) {
        let attributes = FieldAttributes::parse(field)?;

        if let Some((since, span)) = attributes.since {
            if since > version {
                return Err(syn::Error::new(
                    span,
                    format!(
                        "`since = {since}` is newer than the type's version \
                         {version}"
                    ),
                ));
            }
        }

        fields.push(PersistField { member, ty: &field.ty, attributes });
    }

    let mut bases = fields.iter().filter(|field| field.attributes.base);
    let base = bases.next();
    if let Some(second) = bases.next() {
        return Err(syn::Error::new(
            second.ty.span(),
            "a type can embed at most one `#[persist(base)]` ancestor",
        ));
    }

    let name = &input.ident;
    let type_name = attributes
        .name
        .as_ref()
        .map_or_else(|| default_name(name), |name| quote!(#name));
    let exports = attributes.export;

    let (base_ty, base_fn) = match base {
        Some(field) => {
            let ty = field.ty;
            let member = &field.member;
            (quote!(#ty), quote!(&self.#member))
        }
        None => {
            (quote!(::skein_serialize::Root), quote!(&::skein_serialize::Root))
        }
    };

    let stored = fields
        .iter()
        .filter(|field| !field.attributes.base && !field.attributes.skip)
        .collect::<Vec<_>>();

    let writes = stored.iter().map(|field| {
        let member = &field.member;
        quote! {
            ::skein_serialize::Encode::encode(&self.#member, writer)?;
        }
    });

    let locals = fields
        .iter()
        .enumerate()
        .map(|(index, _)| format_ident!("__field_{}", index))
        .collect::<Vec<_>>();

    let reads = fields.iter().zip(&locals).map(|(field, local)| {
        let ty = field.ty;

        if field.attributes.base {
            quote! { let #local = base; }
        } else if field.attributes.skip {
            quote! {
                let #local = <#ty as ::core::default::Default>::default();
            }
        } else if let Some((since, _)) = field.attributes.since {
            quote! {
                let #local = if version >= #since {
                    <#ty as ::skein_serialize::Decode>::decode(reader)?
                } else {
                    <#ty as ::core::default::Default>::default()
                };
            }
        } else {
            quote! {
                let #local = <#ty as ::skein_serialize::Decode>::decode(reader)?;
            }
        }
    });

    let inits = fields.iter().zip(&locals).map(|(field, local)| {
        let member = &field.member;
        quote!(#member: #local)
    });

    let export_fn = exports.then(|| {
        let inserts = stored.iter().map(|field| {
            let member = &field.member;
            let label = match member {
                Member::Named(ident) => ident.to_string(),
                Member::Unnamed(index) => index.index.to_string(),
            };

            quote! {
                properties.insert(
                    #label,
                    ::skein_serialize::Export::to_value(&self.#member),
                );
            }
        });

        quote! {
            fn export(
                &self,
                properties: &mut ::skein_serialize::Properties,
            ) -> ::skein_serialize::Result<()> {
                #(#inserts)*
                ::core::result::Result::Ok(())
            }
        }
    });

    Ok(quote! {
        impl ::skein_serialize::Persist for #name {
            const TYPE_NAME: &'static str = #type_name;
            const VERSION: u32 = #version;
            const EXPORTS: bool = #exports;

            type Base = #base_ty;

            fn base(&self) -> &Self::Base { #base_fn }

            #[allow(unused_variables)]
            fn write(
                &self,
                writer: &mut ::skein_serialize::GraphWriter<'_>,
            ) -> ::skein_serialize::Result<()> {
                #(#writes)*
                ::core::result::Result::Ok(())
            }

            #[allow(unused_variables)]
            fn read(
                base: Self::Base,
                reader: &mut ::skein_serialize::GraphReader<'_>,
                version: u32,
            ) -> ::skein_serialize::Result<Self> {
                #(#reads)*
                ::core::result::Result::Ok(Self { #(#inits),* })
            }

            #export_fn
        }
    })
}

/// The stable name of a type that does not declare one: its module path
/// and identifier.
pub fn default_name(name: &syn::Ident) -> TokenStream {
    quote! {
        ::core::concat!(::core::module_path!(), "::", ::core::stringify!(#name))
    }
}
