//! Proc macros for GlyphKeeper world tools.
//!
//! Provides `#[derive(Tool)]`, which turns a plain argument struct into a
//! dispatchable tool: name, description, JSON input schema and the list of
//! fields that name world records (used to serialize conflicting calls).
//!
//! # Example
//!
//! ```ignore
//! /// Move an entity through one exit of its current location.
//! #[derive(Tool, Deserialize)]
//! #[tool(name = "move_entity")]
//! struct MoveEntity {
//!     /// Key of the entity to move
//!     #[tool(key)]
//!     entity: String,
//!     /// Exit label, e.g. "north" or "cellar stairs"
//!     direction: String,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Field, Lit, Meta, Type};

/// Derive macro for world tool argument structs.
///
/// # Attributes
///
/// - `#[tool(name = "...")]` - Override the tool name (defaults to snake_case struct name)
/// - `#[tool(exclusive)]` - The tool mutates session-wide state and never shares a batch
/// - `#[tool(key)]` on fields - The field holds a record key (string or list of strings)
/// - `#[tool(optional)]` on fields - Mark field as optional in JSON schema
/// - `#[tool(rename = "...")]` on fields - Override field name in schema
#[proc_macro_derive(Tool, attributes(tool))]
pub fn derive_tool(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_tool(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

#[derive(Default)]
struct StructAttrs {
    name: Option<String>,
    exclusive: bool,
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    optional: bool,
    key: bool,
}

fn expand_tool(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let attrs = parse_struct_attrs(&input)?;

    let tool_name = attrs
        .name
        .unwrap_or_else(|| to_snake_case(&input.ident.to_string()));
    let description = get_doc_comment(&input.attrs);
    let exclusive = attrs.exclusive;

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Tool derive only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(&input, "Tool derive only supports structs")),
    };

    let mut property_tokens = Vec::new();
    let mut required_fields = Vec::new();
    let mut key_fields = Vec::new();

    for field in fields {
        let field_attrs = parse_field_attrs(field)?;
        let field_name_str = match field_attrs.rename {
            Some(ref renamed) => renamed.clone(),
            None => field_ident_string(field)?,
        };
        let field_desc = get_doc_comment(&field.attrs);
        let type_schema = type_to_schema(&field.ty)?;

        let desc_token = if field_desc.is_empty() {
            quote! {}
        } else {
            quote! { property["description"] = serde_json::json!(#field_desc); }
        };

        property_tokens.push(quote! {
            {
                let mut property = #type_schema;
                #desc_token
                properties.insert(#field_name_str.to_string(), property);
            }
        });

        if !field_attrs.optional && !is_option_type(&field.ty) {
            required_fields.push(field_name_str.clone());
        }
        if field_attrs.key {
            key_fields.push(field_name_str);
        }
    }

    let required_array: Vec<_> = required_fields.iter().map(|s| quote! { #s }).collect();
    let key_array: Vec<_> = key_fields.iter().map(|s| quote! { #s }).collect();

    Ok(quote! {
        impl ::glyph_core::tools::ToolArgs for #struct_name {
            fn tool_name() -> &'static str {
                #tool_name
            }

            fn tool_description() -> &'static str {
                #description
            }

            fn input_schema() -> serde_json::Value {
                let mut properties = serde_json::Map::new();
                #(#property_tokens)*

                let required: Vec<&str> = vec![#(#required_array),*];

                serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false
                })
            }

            fn key_fields() -> &'static [&'static str] {
                &[#(#key_array),*]
            }

            fn exclusive() -> bool {
                #exclusive
            }
        }
    })
}

fn parse_struct_attrs(input: &DeriveInput) -> syn::Result<StructAttrs> {
    let mut attrs = StructAttrs::default();
    for attr in &input.attrs {
        if !attr.path().is_ident("tool") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: syn::LitStr = meta.value()?.parse()?;
                attrs.name = Some(lit.value());
                Ok(())
            } else if meta.path.is_ident("exclusive") {
                attrs.exclusive = true;
                Ok(())
            } else {
                Err(meta.error("unsupported tool attribute"))
            }
        })?;
    }
    Ok(attrs)
}

fn parse_field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("tool") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: syn::LitStr = meta.value()?.parse()?;
                attrs.rename = Some(lit.value());
                Ok(())
            } else if meta.path.is_ident("optional") {
                attrs.optional = true;
                Ok(())
            } else if meta.path.is_ident("key") {
                attrs.key = true;
                Ok(())
            } else {
                Err(meta.error("unsupported tool field attribute"))
            }
        })?;
    }
    Ok(attrs)
}

fn field_ident_string(field: &Field) -> syn::Result<String> {
    field
        .ident
        .as_ref()
        .map(|ident| ident.to_string())
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))
}

fn get_doc_comment(attrs: &[syn::Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &nv.value {
                    if let Lit::Str(s) = &expr_lit.lit {
                        docs.push(s.value().trim().to_string());
                    }
                }
            }
        }
    }
    docs.join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

fn type_to_schema(ty: &Type) -> syn::Result<TokenStream2> {
    Ok(match ty {
        Type::Path(type_path) => {
            if let Some(segment) = type_path.path.segments.last() {
                let ident_str = segment.ident.to_string();

                match ident_str.as_str() {
                    "String" | "str" => quote! { serde_json::json!({"type": "string"}) },
                    "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64"
                    | "usize" => {
                        quote! { serde_json::json!({"type": "integer"}) }
                    }
                    "f32" | "f64" => quote! { serde_json::json!({"type": "number"}) },
                    "bool" => quote! { serde_json::json!({"type": "boolean"}) },
                    "Option" => {
                        if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                            if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                                return type_to_schema(inner);
                            }
                        }
                        quote! { serde_json::json!({}) }
                    }
                    "Vec" => {
                        if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                            if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                                let inner_schema = type_to_schema(inner)?;
                                return Ok(quote! {
                                    serde_json::json!({
                                        "type": "array",
                                        "items": #inner_schema
                                    })
                                });
                            }
                        }
                        quote! { serde_json::json!({"type": "array"}) }
                    }
                    "Value" => quote! { serde_json::json!({}) },
                    _ => quote! { serde_json::json!({"type": "object"}) },
                }
            } else {
                quote! { serde_json::json!({}) }
            }
        }
        _ => quote! { serde_json::json!({}) },
    })
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
