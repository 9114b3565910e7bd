use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Lit, parse_macro_input};

/// Options collected from `#[column(...)]` on one field.
#[derive(Default)]
struct ColumnAttr {
    name: Option<String>,
    read_only: bool,
    skip: bool,
}

fn parse_column_attr(field: &syn::Field) -> syn::Result<ColumnAttr> {
    let mut out = ColumnAttr::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("column") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                meta.input.parse::<syn::Token![=]>()?;
                let lit: Lit = meta.input.parse()?;
                match lit {
                    Lit::Str(s) => out.name = Some(s.value()),
                    other => return Err(syn::Error::new_spanned(other, "expected a string")),
                }
            } else if meta.path.is_ident("read_only") {
                out.read_only = true;
            } else if meta.path.is_ident("skip") {
                out.skip = true;
            } else {
                return Err(meta.error("expected `name`, `read_only` or `skip`"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

/// Parse `#[table_row(table = "...")]` and return the table name.
fn parse_table_attr(input: &DeriveInput) -> syn::Result<String> {
    let mut table_name = None;
    for attr in &input.attrs {
        if attr.path().is_ident("table_row") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    meta.input.parse::<syn::Token![=]>()?;
                    let lit: Lit = meta.input.parse()?;
                    if let Lit::Str(s) = lit {
                        table_name = Some(s.value());
                        return Ok(());
                    }
                }
                Err(meta.error("expected `table = \"...\"`"))
            })?;
        }
    }
    table_name.ok_or_else(|| {
        syn::Error::new_spanned(&input.ident, "missing #[table_row(table = \"...\")]")
    })
}

/// Derive macro for the `TableRow` trait.
///
/// ## Attributes
///
/// - `#[table_row(table = "...")]` (required, on the struct): the table name
/// - `#[column(name = "...")]`: column name when it differs from the field
/// - `#[column(read_only)]`: present in `to_row()`/`from_row()` but left out of
///   `insertable_row()` (keys, versions, timestamps the engine fills in)
/// - `#[column(skip)]`: not a column; filled with `Default::default()` on read
///
/// Every column field's type must convert into `tablecraft::Value` and
/// implement `tablecraft::FromValue`.
///
/// ## Example
///
/// ```text
/// #[derive(TableRow)]
/// #[table_row(table = "person")]
/// struct Person {
///     #[column(read_only)]
///     id: i64,
///     first_name: String,
///     supervisor_id: Option<i64>,
/// }
/// ```
#[proc_macro_derive(TableRow, attributes(table_row, column))]
pub fn derive_table_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "TableRow only supports structs with named fields",
                ));
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "TableRow only supports structs")),
    };
    let table = parse_table_attr(input)?;

    let mut columns = Vec::new();
    let mut to_row = Vec::new();
    let mut insertable = Vec::new();
    let mut from_row = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let attr = parse_column_attr(field)?;

        if attr.skip {
            from_row.push(quote! { #field_name: ::std::default::Default::default() });
            continue;
        }

        let column = attr.name.unwrap_or_else(|| field_name.to_string());
        columns.push(column.clone());

        let set = quote! {
            row.set(#column, ::tablecraft::Value::from(::std::clone::Clone::clone(&self.#field_name)));
        };
        if !attr.read_only {
            insertable.push(set.clone());
        }
        to_row.push(set);

        from_row.push(quote! {
            #field_name: <#ty as ::tablecraft::FromValue>::from_value(
                row.take(#column).unwrap_or(::tablecraft::Value::Null),
            )
            .map_err(|issue| {
                ::tablecraft::ConversionError::new(
                    #table,
                    #column,
                    ::std::any::type_name::<#ty>(),
                    issue,
                )
            })?
        });
    }

    Ok(quote! {
        impl ::tablecraft::TableRow for #name {
            fn table_name() -> &'static str {
                #table
            }

            fn columns() -> &'static [&'static str] {
                &[#(#columns),*]
            }

            fn to_row(&self) -> ::tablecraft::Row {
                let mut row = ::tablecraft::Row::new();
                #(#to_row)*
                row
            }

            fn insertable_row(&self) -> ::tablecraft::Row {
                let mut row = ::tablecraft::Row::new();
                #(#insertable)*
                row
            }

            fn from_row(
                mut row: ::tablecraft::Row,
            ) -> ::std::result::Result<Self, ::tablecraft::ConversionError> {
                ::std::result::Result::Ok(Self {
                    #(#from_row),*
                })
            }
        }
    })
}
