//! Derive macros for `skein_serialize`.
//!
//! - `Persist` implements the self-describing type trait for structs.
//! - `PersistEnum` implements the enum driver traits for fieldless enums.
//! - `Encode` / `Decode` implement inline value codecs for structs and enums.
//!
//! # Self-Describing Types
//!
//! ```ignore
//! use skein_serialize::{Link, Persist};
//!
//! #[derive(Persist)]
//! #[persist(version = 2, name = "zoo.Animal", export)]
//! struct Animal {
//!     name: String,
//!     #[persist(since = 1)]
//!     legs: u8,
//!     #[persist(since = 2)]
//!     weight: f64,
//! }
//!
//! #[derive(Persist)]
//! #[persist(version = 0, name = "zoo.Dog")]
//! struct Dog {
//!     #[persist(base)]
//!     animal: Animal,
//!     friend: Link<Dog>,
//!     #[persist(skip)]
//!     visits: u32,
//! }
//! ```
//!
//! ## Type Attributes
//!
//! - `version = N` (required): the current layout version of this level.
//! - `name = ".."`: the stable name recorded in streams. Defaults to the
//!   module path and type name, which changes when the type moves.
//! - `export`: supply the export capability from the stored fields.
//!
//! ## Field Attributes
//!
//! - `base`: the embedded ancestor. At most one per type; its level is
//!   written and read before this type's fields.
//! - `skip`: never written; `Default::default()` when read.
//! - `since = V`: read only when the stream recorded version `V` or newer
//!   for this level; `Default::default()` otherwise.
//!
//! # Enums
//!
//! ```ignore
//! use skein_serialize::PersistEnum;
//!
//! #[derive(PersistEnum)]
//! #[persist(name = "paint.Color")]
//! #[repr(u8)]
//! enum Color {
//!     Red = 1,
//!     Green = 2,
//! }
//! ```
//!
//! # Value Types
//!
//! ```ignore
//! use skein_serialize::{Decode, Encode};
//!
//! #[derive(Encode, Decode)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//!     #[persist(skip)]
//!     cached_norm: f64, // Uses Default::default() when decoding
//! }
//! ```

mod attributes;
mod enumeration;
mod persist;

use proc_macro::TokenStream;
use proc_macro2::Literal;
use quote::quote;
use syn::{
    Data, DataEnum, DataStruct, DeriveInput, Field, Fields, Index,
    parse_macro_input,
};

use crate::attributes::should_skip;

/// Derive macro for `Persist`.
///
/// See the crate documentation for the accepted attributes. Partial or
/// contradictory declarations are compile errors: a missing version, more
/// than one base, a `since` newer than the version, generic parameters, and
/// enums or unions.
#[proc_macro_derive(Persist, attributes(persist))]
pub fn derive_persist(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    persist::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive macro for `PersistEnum`.
///
/// Also implements `Encode`, `Decode`, `Element` and `Export`, so the enum
/// can be a field, a container element or a standalone object.
#[proc_macro_derive(PersistEnum, attributes(persist))]
pub fn derive_persist_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    enumeration::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Collects the skip flag of every field, failing on misplaced attributes.
fn skip_flags<'a>(
    fields: impl IntoIterator<Item = &'a Field>,
) -> syn::Result<Vec<bool>> {
    fields.into_iter().map(should_skip).collect()
}

/// Derive macro for `Encode`.
///
/// This macro automatically implements the `Encode` trait for structs and
/// enums. The implementation ensures that:
///
/// - For structs: all non-skipped fields are encoded in declaration order
/// - For enums: the variant index is encoded first (as a varint), followed by
///   any variant data
///
/// # Enum Example
///
/// ```ignore
/// use skein_serialize::Encode;
///
/// #[derive(Encode)]
/// enum Shape {
///     Empty,
///     Rect(u32, u32),
///     Named { name: String },
/// }
/// ```
#[proc_macro_derive(Encode, attributes(persist))]
pub fn derive_encode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) =
        input.generics.split_for_impl();

    // Build where clause for Encode bounds
    let mut where_clause =
        where_clause.cloned().unwrap_or_else(|| syn::parse_quote!(where));

    // Add Encode bounds for all generic type parameters
    for param in &input.generics.params {
        if let syn::GenericParam::Type(type_param) = param {
            let ident = &type_param.ident;
            where_clause
                .predicates
                .push(syn::parse_quote!(#ident: ::skein_serialize::Encode));
        }
    }

    let encode_impl = match &input.data {
        Data::Struct(data_struct) => impl_encode_struct(data_struct),
        Data::Enum(data_enum) => impl_encode_enum(data_enum),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &input,
            "Encode cannot be derived for unions due to memory safety \
             concerns",
        )),
    };

    let encode_impl = match encode_impl {
        Ok(tokens) => tokens,
        Err(error) => return error.into_compile_error().into(),
    };

    let expanded = quote! {
        #[allow(clippy::trait_duplication_in_bounds)]
        impl #impl_generics ::skein_serialize::Encode for #name #ty_generics #where_clause {
            fn encode(
                &self,
                writer: &mut ::skein_serialize::GraphWriter<'_>,
            ) -> ::skein_serialize::Result<()> {
                #encode_impl
            }
        }
    };

    TokenStream::from(expanded)
}

fn impl_encode_struct(
    data_struct: &DataStruct,
) -> syn::Result<proc_macro2::TokenStream> {
    let skips = skip_flags(&data_struct.fields)?;

    match &data_struct.fields {
        Fields::Named(fields) => {
            let field_encodes = fields
                .named
                .iter()
                .zip(&skips)
                .filter(|(_, skip)| !**skip)
                .map(|(field, _)| {
                    let field_name = &field.ident;
                    quote! {
                        ::skein_serialize::Encode::encode(&self.#field_name, writer)?;
                    }
                });

            Ok(quote! {
                #(#field_encodes)*
                Ok(())
            })
        }
        Fields::Unnamed(_) => {
            let field_encodes = skips
                .iter()
                .enumerate()
                .filter(|(_, skip)| !**skip)
                .map(|(i, _)| {
                    let index = Index::from(i);
                    quote! {
                        ::skein_serialize::Encode::encode(&self.#index, writer)?;
                    }
                });

            Ok(quote! {
                #(#field_encodes)*
                Ok(())
            })
        }
        Fields::Unit => Ok(quote! {
            let _ = writer;
            Ok(())
        }),
    }
}

fn variant_index(idx: usize) -> Literal { Literal::u64_unsuffixed(idx as u64) }

fn impl_encode_enum(
    data_enum: &DataEnum,
) -> syn::Result<proc_macro2::TokenStream> {
    let mut variant_matches = Vec::new();

    for (idx, variant) in data_enum.variants.iter().enumerate() {
        let variant_name = &variant.ident;
        let idx = variant_index(idx);
        let skips = skip_flags(&variant.fields)?;

        variant_matches.push(match &variant.fields {
            Fields::Named(fields) => {
                let field_names: Vec<_> = fields
                    .named
                    .iter()
                    .zip(&skips)
                    .map(|(f, skip)| (&f.ident, *skip))
                    .collect();

                let pattern_bindings =
                    field_names.iter().map(|(name, skip)| {
                        if *skip {
                            quote! { #name: _ }
                        } else {
                            quote! { #name }
                        }
                    });

                let field_encodes =
                    field_names.iter().filter(|(_, skip)| !skip).map(
                        |(field_name, _)| {
                            quote! {
                                ::skein_serialize::Encode::encode(#field_name, writer)?;
                            }
                        },
                    );

                quote! {
                    Self::#variant_name { #(#pattern_bindings),* } => {
                        ::skein_serialize::Encoder::emit_varint(writer, #idx)?;
                        #(#field_encodes)*
                    }
                }
            }
            Fields::Unnamed(_) => {
                let field_data: Vec<_> = skips
                    .iter()
                    .enumerate()
                    .map(|(i, skip)| {
                        let binding = syn::Ident::new(
                            &format!("field_{i}"),
                            proc_macro2::Span::call_site(),
                        );
                        (binding, *skip)
                    })
                    .collect();

                let pattern_bindings =
                    field_data.iter().map(|(binding, skip)| {
                        if *skip {
                            quote! { _ }
                        } else {
                            quote! { #binding }
                        }
                    });

                let field_encodes =
                    field_data.iter().filter(|(_, skip)| !skip).map(
                        |(binding, _)| {
                            quote! {
                                ::skein_serialize::Encode::encode(#binding, writer)?;
                            }
                        },
                    );

                quote! {
                    Self::#variant_name(#(#pattern_bindings),*) => {
                        ::skein_serialize::Encoder::emit_varint(writer, #idx)?;
                        #(#field_encodes)*
                    }
                }
            }
            Fields::Unit => {
                quote! {
                    Self::#variant_name => {
                        ::skein_serialize::Encoder::emit_varint(writer, #idx)?;
                    }
                }
            }
        });
    }

    Ok(quote! {
        match self {
            #(#variant_matches)*
        }
        Ok(())
    })
}

/// Derive macro for `Decode`.
///
/// This macro automatically implements the `Decode` trait for structs and
/// enums. The implementation ensures that:
///
/// - For structs: all fields are decoded in declaration order (skipped fields
///   use `Default::default()`)
/// - For enums: the variant index is decoded first (as a varint), then the
///   variant data is decoded
#[proc_macro_derive(Decode, attributes(persist))]
pub fn derive_decode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) =
        input.generics.split_for_impl();

    // Build where clause for Decode bounds
    let mut where_clause =
        where_clause.cloned().unwrap_or_else(|| syn::parse_quote!(where));

    // Add Decode bounds for all generic type parameters
    for param in &input.generics.params {
        if let syn::GenericParam::Type(type_param) = param {
            let ident = &type_param.ident;
            where_clause
                .predicates
                .push(syn::parse_quote!(#ident: ::skein_serialize::Decode));
        }
    }

    let decode_impl = match &input.data {
        Data::Struct(data_struct) => impl_decode_struct(data_struct),
        Data::Enum(data_enum) => impl_decode_enum(name, data_enum),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &input,
            "Decode cannot be derived for unions due to memory safety \
             concerns",
        )),
    };

    let decode_impl = match decode_impl {
        Ok(tokens) => tokens,
        Err(error) => return error.into_compile_error().into(),
    };

    let expanded = quote! {
        #[allow(clippy::trait_duplication_in_bounds)]
        impl #impl_generics ::skein_serialize::Decode for #name #ty_generics #where_clause {
            fn decode(
                reader: &mut ::skein_serialize::GraphReader<'_>,
            ) -> ::skein_serialize::Result<Self> {
                #decode_impl
            }
        }
    };

    TokenStream::from(expanded)
}

fn field_decode(field: &Field, skip: bool) -> proc_macro2::TokenStream {
    let field_type = &field.ty;

    if skip {
        quote! { <#field_type as ::std::default::Default>::default() }
    } else {
        quote! { <#field_type as ::skein_serialize::Decode>::decode(reader)? }
    }
}

fn impl_decode_fields(
    fields: &Fields,
) -> syn::Result<proc_macro2::TokenStream> {
    let skips = skip_flags(fields)?;

    Ok(match fields {
        Fields::Named(named) => {
            let field_decodes =
                named.named.iter().zip(&skips).map(|(field, skip)| {
                    let field_name = &field.ident;
                    let decode = field_decode(field, *skip);
                    quote! { #field_name: #decode, }
                });

            quote! { { #(#field_decodes)* } }
        }
        Fields::Unnamed(unnamed) => {
            let field_decodes =
                unnamed.unnamed.iter().zip(&skips).map(|(field, skip)| {
                    let decode = field_decode(field, *skip);
                    quote! { #decode, }
                });

            quote! { ( #(#field_decodes)* ) }
        }
        Fields::Unit => quote! {},
    })
}

fn impl_decode_struct(
    data_struct: &DataStruct,
) -> syn::Result<proc_macro2::TokenStream> {
    let fields = impl_decode_fields(&data_struct.fields)?;
    let unused = matches!(data_struct.fields, Fields::Unit)
        .then(|| quote! { let _ = reader; });

    Ok(quote! {
        #unused
        Ok(Self #fields)
    })
}

fn impl_decode_enum(
    name: &syn::Ident,
    data_enum: &DataEnum,
) -> syn::Result<proc_macro2::TokenStream> {
    let variant_count = data_enum.variants.len();
    let mut variant_matches = Vec::new();

    for (idx, variant) in data_enum.variants.iter().enumerate() {
        let variant_name = &variant.ident;
        let idx = variant_index(idx);
        let fields = impl_decode_fields(&variant.fields)?;

        variant_matches.push(quote! {
            #idx => Ok(Self::#variant_name #fields),
        });
    }

    let name_str = name.to_string();

    Ok(quote! {
        let variant_idx = ::skein_serialize::Decoder::read_varint(reader)?;
        match variant_idx {
            #(#variant_matches)*
            _ => Err(::skein_serialize::Error::InvalidData(::std::format!(
                "invalid variant index {} for enum {} (expected 0..{})",
                variant_idx,
                #name_str,
                #variant_count
            ))),
        }
    })
}
