use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Lit, LitStr, parse_macro_input};

/// Convert snake_case to camelCase
fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Storage type name inferred from the Rust field type.
fn rust_type_to_storage(ty: &syn::Type) -> &'static str {
    let type_str = quote!(#ty).to_string();
    // Remove spaces for easier matching
    let type_str = type_str.replace(' ', "");

    // Check for Option<T> - extract inner type
    let inner_type = if type_str.starts_with("Option<") && type_str.ends_with('>') {
        &type_str[7..type_str.len() - 1]
    } else {
        type_str.as_str()
    };

    match inner_type {
        // Temporal types, most specific first
        s if s.contains("NaiveDateTime") || s.contains("DateTime") => "timestamp",
        s if s.contains("NaiveDate") => "date",
        s if s.contains("NaiveTime") => "time",
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            "integer"
        }
        "f32" | "f64" => "float",
        "bool" => "boolean",
        "String" => "text",
        "Vec<u8>" => "bytes",
        s if s.ends_with("JsonValue") || s == "serde_json::Value" => "json",
        _ => "any",
    }
}

fn storage_tokens(storage: &str) -> TokenStream2 {
    match storage {
        "text" => quote! { ::lite_dao::StorageType::Text },
        "integer" => quote! { ::lite_dao::StorageType::Integer },
        "float" => quote! { ::lite_dao::StorageType::Float },
        "boolean" => quote! { ::lite_dao::StorageType::Boolean },
        "date" => quote! { ::lite_dao::StorageType::Date },
        "time" => quote! { ::lite_dao::StorageType::Time },
        "timestamp" => quote! { ::lite_dao::StorageType::Timestamp },
        "bytes" => quote! { ::lite_dao::StorageType::Bytes },
        "json" => quote! { ::lite_dao::StorageType::Json },
        _ => quote! { ::lite_dao::StorageType::Any },
    }
}

const STORAGE_NAMES: &[&str] = &[
    "any",
    "text",
    "integer",
    "float",
    "boolean",
    "date",
    "time",
    "timestamp",
    "bytes",
    "json",
];

const ID_STRATEGIES: &[&str] = &["uuid", "auto_increment", "assigned"];

/// Parsed `#[column(...)]` attributes of one field.
#[derive(Default)]
struct ColumnAttrs {
    name: Option<String>,
    primary_key: bool,
    id: Option<String>,
    uuid_length: Option<usize>,
    storage: Option<String>,
    /// `Some(empty)` means every operation.
    ignore: Option<Vec<String>>,
    default: Option<String>,
    skip: bool,
    flatten: bool,
}

fn parse_string(meta: &syn::meta::ParseNestedMeta) -> syn::Result<LitStr> {
    meta.input.parse::<syn::Token![=]>()?;
    match meta.input.parse::<Lit>()? {
        Lit::Str(s) => Ok(s),
        other => Err(syn::Error::new(other.span(), "expected a string literal")),
    }
}

fn parse_column_attrs(field: &syn::Field) -> syn::Result<ColumnAttrs> {
    let mut attrs = ColumnAttrs::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("column") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                attrs.name = Some(parse_string(&meta)?.value());
            } else if meta.path.is_ident("primary_key") {
                attrs.primary_key = true;
            } else if meta.path.is_ident("id") {
                let lit = parse_string(&meta)?;
                if !ID_STRATEGIES.contains(&lit.value().as_str()) {
                    return Err(syn::Error::new(
                        lit.span(),
                        "expected one of \"uuid\", \"auto_increment\", \"assigned\"",
                    ));
                }
                attrs.id = Some(lit.value());
            } else if meta.path.is_ident("uuid_length") {
                meta.input.parse::<syn::Token![=]>()?;
                let lit: syn::LitInt = meta.input.parse()?;
                attrs.uuid_length = Some(lit.base10_parse()?);
            } else if meta.path.is_ident("storage") {
                let lit = parse_string(&meta)?;
                if !STORAGE_NAMES.contains(&lit.value().as_str()) {
                    return Err(syn::Error::new(lit.span(), "unknown storage type"));
                }
                attrs.storage = Some(lit.value());
            } else if meta.path.is_ident("ignore") {
                let mut operations = Vec::new();
                if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|inner| {
                        for op in ["insert", "update", "query"] {
                            if inner.path.is_ident(op) {
                                operations.push(op.to_string());
                                return Ok(());
                            }
                        }
                        Err(inner.error("expected insert, update or query"))
                    })?;
                }
                attrs.ignore = Some(operations);
            } else if meta.path.is_ident("default") {
                attrs.default = Some(parse_string(&meta)?.value());
            } else if meta.path.is_ident("skip") {
                attrs.skip = true;
            } else if meta.path.is_ident("flatten") {
                attrs.flatten = true;
            } else {
                return Err(meta.error("unknown column attribute"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

/// Parse #[entity(table = "...")] attribute and return table name
fn parse_entity_attr(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut table_name = None;
    for attr in &input.attrs {
        if attr.path().is_ident("entity") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    table_name = Some(parse_string(&meta)?.value());
                    Ok(())
                } else {
                    Err(meta.error("unknown entity attribute"))
                }
            })?;
        }
    }
    Ok(table_name)
}

fn field_descriptor(field: &syn::Field, attrs: &ColumnAttrs) -> syn::Result<TokenStream2> {
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "Entity fields must be named"))?;
    let property = to_camel_case(ident.to_string().trim_start_matches("r#"));
    let storage = storage_tokens(
        attrs
            .storage
            .as_deref()
            .unwrap_or_else(|| rust_type_to_storage(&field.ty)),
    );

    let mut calls = Vec::new();
    if let Some(name) = &attrs.name {
        calls.push(quote! { .column(#name) });
    }
    if attrs.primary_key || attrs.id.is_some() || attrs.uuid_length.is_some() {
        let strategy = match &attrs.id {
            Some(id) => quote! { Some(#id) },
            None => quote! { None },
        };
        calls.push(quote! { .primary_key(#strategy) });
    }
    if let Some(length) = attrs.uuid_length {
        calls.push(quote! { .uuid_length(#length) });
    }
    if let Some(operations) = &attrs.ignore {
        let ignore = if operations.is_empty() {
            quote! { ::lite_dao::IgnoreSet::ALL }
        } else {
            let ops = operations.iter().map(|op| match op.as_str() {
                "insert" => quote! { ::lite_dao::Operation::Insert },
                "update" => quote! { ::lite_dao::Operation::Update },
                _ => quote! { ::lite_dao::Operation::Query },
            });
            quote! { ::lite_dao::IgnoreSet::of(&[#(#ops),*]) }
        };
        calls.push(quote! { .ignore(#ignore) });
    }
    if let Some(default) = &attrs.default {
        calls.push(quote! { .default_value(#default) });
    }

    Ok(quote! {
        .field(
            ::lite_dao::FieldDescriptor::new(#property, #storage)
                #(#calls)*
                .getter(|entity: &Self| ::lite_dao::ToValue::to_value(&entity.#ident))
                .setter(|entity: &mut Self, value: ::lite_dao::Value| {
                    entity.#ident = ::lite_dao::FromValue::from_value(value)?;
                    Ok(())
                })
        )
    })
}

fn expand_entity(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Entity only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Entity only supports structs",
            ));
        }
    };

    let table_call = match parse_entity_attr(input)? {
        Some(table) => quote! { .table(#table) },
        None => quote! {},
    };

    let mut own = Vec::new();
    let mut inherited = Vec::new();
    for field in fields {
        let attrs = parse_column_attrs(field)?;
        if attrs.skip {
            continue;
        }
        if attrs.flatten {
            let ident = &field.ident;
            let ty = &field.ty;
            inherited.push(quote! {
                .inherit::<#ty>(|entity| &entity.#ident, |entity| &mut entity.#ident)
            });
            continue;
        }
        own.push(field_descriptor(field, &attrs)?);
    }

    Ok(quote! {
        impl ::lite_dao::Entity for #name {
            fn describe() -> ::lite_dao::EntityDescriptor<Self> {
                ::lite_dao::EntityDescriptor::new()
                    #table_call
                    #(#own)*
                    #(#inherited)*
            }
        }
    })
}

/// Derive macro for the `Entity` trait.
///
/// ## Type attributes
///
/// - `#[entity(table = "...")]` - table the type maps to. Types without it can still be
///   embedded in other entities with `#[column(flatten)]`, but using them directly
///   fails with a configuration error.
///
/// ## Field attributes
///
/// - `#[column(name = "...")]` - column name (default: snake case of the property)
/// - `#[column(primary_key)]` - marks the primary key
/// - `#[column(id = "uuid" | "auto_increment" | "assigned")]` - id strategy, implies
///   `primary_key` (default: `uuid`)
/// - `#[column(uuid_length = N)]` - length of generated uuid keys, 1 to 32
/// - `#[column(storage = "...")]` - storage type when inference from the Rust type is
///   not what the column holds
/// - `#[column(ignore)]` / `#[column(ignore(insert, update, query))]` - leave the field
///   out of every or the listed operations
/// - `#[column(default = "...")]` - value applied by `EntityModel::apply_defaults`
/// - `#[column(skip)]` - not persisted
/// - `#[column(flatten)]` - include the fields of an embedded `Entity`
///
/// Property names are the camelCase of the field names; field types must convert to
/// and from `lite_dao::Value`.
///
/// ## Example
///
/// ```text
/// #[derive(Entity, Default)]
/// #[entity(table = "t_user")]
/// pub struct User {
///     #[column(primary_key, id = "uuid", uuid_length = 8)]
///     pub id: Option<String>,
///     #[column(ignore(insert))]
///     pub username: Option<String>,
///     #[column(ignore(update))]
///     pub age: Option<i32>,
///     #[column(flatten)]
///     pub audit: Audit,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity, column))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(&input) {
        Ok(expanded) => expanded.into(),
        Err(e) => e.to_compile_error().into(),
    }
}
