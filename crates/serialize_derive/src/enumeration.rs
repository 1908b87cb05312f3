//! `#[derive(PersistEnum)]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident};

use crate::{attributes::TypeAttributes, persist::default_name};

const INTEGRAL_REPRS: &[&str] =
    &["i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64"];

fn repr_of(input: &DeriveInput) -> syn::Result<Ident> {
    let mut repr = None;

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("repr")) {
        attr.parse_nested_meta(|meta| {
            if let Some(ident) = meta.path.get_ident() {
                if INTEGRAL_REPRS.contains(&ident.to_string().as_str()) {
                    repr = Some(ident.clone());
                }
            }
            Ok(())
        })?;
    }

    repr.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            "PersistEnum requires an integral `#[repr(..)]`, such as \
             `#[repr(u8)]`",
        )
    })
}

pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "PersistEnum cannot be derived for generic types",
        ));
    }

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "PersistEnum can only be derived for enums",
        ));
    };

    let fielded = data
        .variants
        .iter()
        .find(|variant| !matches!(variant.fields, Fields::Unit));

    if let Some(variant) = fielded {
        return Err(syn::Error::new_spanned(
            variant,
            "PersistEnum requires fieldless variants",
        ));
    }

    let attributes = TypeAttributes::parse(&input.attrs)?;
    if attributes.version.is_some() || attributes.export {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "PersistEnum only accepts `#[persist(name = \"..\")]`",
        ));
    }

    let name = &input.ident;
    let repr = repr_of(input)?;
    let type_name = attributes
        .name
        .as_ref()
        .map_or_else(|| default_name(name), |name| quote!(#name));

    let variants =
        data.variants.iter().map(|variant| &variant.ident).collect::<Vec<_>>();
    let labels = variants.iter().map(ToString::to_string);

    Ok(quote! {
        impl ::skein_serialize::PersistEnum for #name {
            const TYPE_NAME: &'static str = #type_name;

            type Repr = #repr;

            fn to_repr(&self) -> #repr {
                match self {
                    #(Self::#variants => Self::#variants as #repr,)*
                }
            }

            fn from_repr(repr: #repr) -> ::core::option::Option<Self> {
                #(
                    if repr == Self::#variants as #repr {
                        return ::core::option::Option::Some(Self::#variants);
                    }
                )*
                ::core::option::Option::None
            }

            fn variant_name(&self) -> &'static str {
                match self {
                    #(Self::#variants => #labels,)*
                }
            }
        }

        impl ::skein_serialize::Encode for #name {
            fn encode(
                &self,
                writer: &mut ::skein_serialize::GraphWriter<'_>,
            ) -> ::skein_serialize::Result<()> {
                ::skein_serialize::enumeration::write_enum(self, writer)
            }
        }

        impl ::skein_serialize::Decode for #name {
            fn decode(
                reader: &mut ::skein_serialize::GraphReader<'_>,
            ) -> ::skein_serialize::Result<Self> {
                ::skein_serialize::enumeration::read_enum::<Self>(reader)
            }
        }

        impl ::skein_serialize::Element for #name {
            fn element_driver(
                registry: &::skein_serialize::Registry,
            ) -> ::skein_serialize::Result<
                ::std::sync::Arc<::skein_serialize::Driver>,
            > {
                ::skein_serialize::enumeration::enum_driver::<Self>(registry)
            }

            fn write_element(
                &self,
                writer: &mut ::skein_serialize::GraphWriter<'_>,
            ) -> ::skein_serialize::Result<()> {
                ::skein_serialize::enumeration::write_enum(self, writer)
            }

            fn read_element(
                reader: &mut ::skein_serialize::GraphReader<'_>,
                _: ::core::option::Option<
                    &::std::sync::Arc<::skein_serialize::TypeDescriptor>,
                >,
            ) -> ::skein_serialize::Result<::skein_serialize::Fetched<Self>> {
                ::skein_serialize::enumeration::read_enum::<Self>(reader)
                    .map(::skein_serialize::Fetched::Ready)
            }

            fn from_value(
                value: ::skein_serialize::Value,
            ) -> ::skein_serialize::Result<Self> {
                ::skein_serialize::enumeration::enum_from_value::<Self>(value)
            }
        }

        impl ::skein_serialize::Export for #name {
            fn to_value(&self) -> ::skein_serialize::Value {
                ::skein_serialize::enumeration::enum_to_value(self)
            }
        }
    })
}
