//! Procedural macros for Horizon Collections record types.
//!
//! This crate provides the `#[derive(Record)]` macro, which lets a plain
//! struct with named fields be used as a collection item: its fields become
//! readable and writable by name through the `Record` trait, so bindings,
//! sort descriptions and group descriptions can address them.
//!
//! # Attributes
//!
//! ## `#[record(...)]`
//!
//! ```ignore
//! #[derive(Record, Default)]
//! struct Order {
//!     id: i64,
//!
//!     #[record(rename = "customerName")]
//!     customer: String,
//!
//!     #[record(read_only)]
//!     created: DateTime<Utc>,
//!
//!     #[record(skip)]
//!     cache: Vec<u8>,
//! }
//! ```
//!
//! Field attributes:
//! - `rename = "name"`: Exposes the field under a different name
//! - `read_only`: The field can be read but `set_field` refuses to write it
//! - `skip`: Excludes the field entirely
//!
//! Field types must implement `Clone`, `Into<Value>` and `FromValue`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Expr, ExprLit, Field, Fields, Ident, Lit};

/// Derive the `Record` trait for a struct with named fields.
///
/// This macro generates:
/// - `field`, returning a clone of the named field converted to a `Value`
/// - `set_field`, converting a `Value` back into the field type
/// - `field_names`, listing every exposed field in declaration order
///
/// # Example
///
/// ```ignore
/// use horizon_collections::Record;
///
/// #[derive(Record, Default)]
/// struct Product {
///     name: String,
///     price: f64,
/// }
/// ```
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_derive_record(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Parsed field information.
struct FieldInfo {
    ident: Ident,
    name: String,
    read_only: bool,
}

fn impl_derive_record(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Record derive only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Record derive only supports structs",
            ))
        }
    };

    let mut infos = Vec::new();
    for field in fields.iter() {
        if let Some(info) = parse_record_field(field)? {
            infos.push(info);
        }
    }

    let getter_arms = infos.iter().map(|info| {
        let ident = &info.ident;
        let name = &info.name;
        quote! {
            #name => ::std::option::Option::Some(
                ::horizon_collections::Value::from(::std::clone::Clone::clone(&self.#ident))
            ),
        }
    });

    let setter_arms = infos.iter().map(|info| {
        let ident = &info.ident;
        let name = &info.name;
        if info.read_only {
            quote! { #name => false, }
        } else {
            quote! {
                #name => match ::horizon_collections::FromValue::from_value(value) {
                    ::std::option::Option::Some(converted) => {
                        self.#ident = converted;
                        true
                    }
                    ::std::option::Option::None => false,
                },
            }
        }
    });

    let names = infos.iter().map(|info| &info.name);

    Ok(quote! {
        impl #impl_generics ::horizon_collections::Record for #struct_name #ty_generics #where_clause {
            fn field(&self, name: &str) -> ::std::option::Option<::horizon_collections::Value> {
                match name {
                    #(#getter_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn set_field(&mut self, name: &str, value: ::horizon_collections::Value) -> bool {
                match name {
                    #(#setter_arms)*
                    _ => false,
                }
            }

            fn field_names(&self) -> ::std::vec::Vec<::std::string::String> {
                ::std::vec![#(::std::string::String::from(#names)),*]
            }
        }
    })
}

/// Parse the `#[record(...)]` attributes of a field.
///
/// Returns `None` for skipped fields.
fn parse_record_field(field: &Field) -> syn::Result<Option<FieldInfo>> {
    let ident = match &field.ident {
        Some(ident) => ident.clone(),
        None => return Ok(None),
    };

    let mut name = ident.to_string();
    let mut read_only = false;
    let mut skip = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: Expr = meta.value()?.parse()?;
                match value {
                    Expr::Lit(ExprLit {
                        lit: Lit::Str(lit_str),
                        ..
                    }) => name = lit_str.value(),
                    other => {
                        return Err(syn::Error::new_spanned(
                            other,
                            "expected a string literal for `rename`",
                        ))
                    }
                }
            } else if meta.path.is_ident("read_only") {
                read_only = true;
            } else if meta.path.is_ident("skip") {
                skip = true;
            } else {
                return Err(meta.error("unknown record attribute"));
            }
            Ok(())
        })?;
    }

    if skip {
        return Ok(None);
    }

    Ok(Some(FieldInfo {
        ident,
        name,
        read_only,
    }))
}
