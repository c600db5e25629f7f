//! Procedural macros for todo-dispatch

use darling::{FromDeriveInput, FromMeta, FromVariant};
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// How variant names become event names
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum RenameRule {
    /// `AddTodo` -> `addtodo`
    #[default]
    Lowercase,
    /// `AddTodo` -> `add-todo`
    KebabCase,
    /// `AddTodo` -> `add_todo`
    SnakeCase,
    /// `AddTodo` -> `AddTodo`
    Verbatim,
}

impl FromMeta for RenameRule {
    fn from_string(value: &str) -> darling::Result<Self> {
        match value {
            "lowercase" => Ok(RenameRule::Lowercase),
            "kebab-case" => Ok(RenameRule::KebabCase),
            "snake_case" => Ok(RenameRule::SnakeCase),
            "PascalCase" => Ok(RenameRule::Verbatim),
            other => Err(darling::Error::unknown_value(other)),
        }
    }
}

impl RenameRule {
    fn apply(self, variant: &str) -> String {
        match self {
            RenameRule::Lowercase => variant.to_lowercase(),
            RenameRule::KebabCase => join_lower(variant, "-"),
            RenameRule::SnakeCase => join_lower(variant, "_"),
            RenameRule::Verbatim => variant.to_string(),
        }
    }
}

/// Container-level attributes for #[derive(Action)]
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(action), supports(enum_any))]
struct ActionOpts {
    ident: syn::Ident,
    generics: syn::Generics,
    data: darling::ast::Data<ActionVariant, ()>,

    /// Naming rule for variants without an explicit name
    #[darling(default)]
    rename_all: RenameRule,
}

/// Variant-level attributes
#[derive(Debug, FromVariant)]
#[darling(attributes(action))]
struct ActionVariant {
    ident: syn::Ident,
    fields: darling::ast::Fields<()>,

    /// Explicit event name
    #[darling(default)]
    name: Option<String>,
}

/// Split a PascalCase string into parts
fn split_pascal_case(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for ch in s.chars() {
        if ch.is_uppercase() && !current.is_empty() {
            parts.push(current);
            current = String::new();
        }
        current.push(ch);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn join_lower(s: &str, separator: &str) -> String {
    split_pascal_case(s)
        .iter()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Derive macro for the Action trait
///
/// Generates a `name()` method returning the event name each handler
/// subscribes to, and an `EVENT_NAMES` constant listing every name in
/// declaration order.
///
/// Names default to the lowercased variant name. Use
/// `#[action(rename_all = "kebab-case")]` (or `"snake_case"`, `"PascalCase"`)
/// on the enum to change the rule, and `#[action(name = "...")]` on a variant
/// to name it explicitly.
///
/// # Example
/// ```ignore
/// #[derive(Action, Clone, Debug)]
/// enum TodoEvent {
///     AddTodo(String),
///     AllClear,
///     #[action(name = "todo-done-state-changed")]
///     DoneStateChanged { key: String, done: bool },
/// }
///
/// assert_eq!(TodoEvent::AllClear.name(), "allclear");
/// assert_eq!(TodoEvent::EVENT_NAMES.len(), 3);
/// ```
#[proc_macro_derive(Action, attributes(action))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let opts = match ActionOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(e) => return e.write_errors().into(),
    };

    let name = &opts.ident;
    let (impl_generics, ty_generics, where_clause) = opts.generics.split_for_impl();

    let variants = match &opts.data {
        darling::ast::Data::Enum(variants) => variants,
        _ => {
            return syn::Error::new_spanned(&input, "Action can only be derived for enums")
                .to_compile_error()
                .into();
        }
    };

    let mut event_names: Vec<String> = Vec::with_capacity(variants.len());
    let mut errors = darling::Error::accumulator();
    for v in variants.iter() {
        let event_name = v
            .name
            .clone()
            .unwrap_or_else(|| opts.rename_all.apply(&v.ident.to_string()));
        if event_name.is_empty() {
            errors.push(darling::Error::custom("event name must not be empty").with_span(&v.ident));
        }
        event_names.push(event_name);
    }
    if let Err(e) = errors.finish() {
        return e.write_errors().into();
    }

    let name_arms = variants.iter().zip(&event_names).map(|(v, event_name)| {
        let variant_name = &v.ident;

        match &v.fields.style {
            darling::ast::Style::Unit => quote! {
                #name::#variant_name => #event_name
            },
            darling::ast::Style::Tuple => quote! {
                #name::#variant_name(..) => #event_name
            },
            darling::ast::Style::Struct => quote! {
                #name::#variant_name { .. } => #event_name
            },
        }
    });

    let doc = format!("Every event name of [`{name}`], in declaration order.");
    let expanded = quote! {
        impl #impl_generics ::todo_dispatch::Action for #name #ty_generics #where_clause {
            fn name(&self) -> &'static str {
                match self {
                    #(#name_arms),*
                }
            }
        }

        impl #impl_generics #name #ty_generics #where_clause {
            #[doc = #doc]
            pub const EVENT_NAMES: &'static [&'static str] = &[#(#event_names),*];
        }
    };

    TokenStream::from(expanded)
}
