//! Derive macros for the boxoffice reducer architecture
//!
//! # Available Macros
//!
//! - `#[derive(Action)]` - Classifies action variants and names them for logs
//!
//! # Example
//!
//! ```ignore
//! use boxoffice_macros::Action;
//!
//! #[derive(Action, Clone, Debug)]
//! enum QueueAction {
//!     #[command]
//!     Join { schedule_id: u64 },
//!
//!     #[tick]
//!     PollTick(Generation),
//!
//!     #[event]
//!     Polled { rank: u32 },
//! }
//!
//! assert!(QueueAction::Join { schedule_id: 7 }.is_command());
//! assert_eq!(QueueAction::Polled { rank: 3 }.name(), "Polled");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Variant};

/// Derive macro for Action enums
///
/// Generates helper methods for action enums:
/// - `is_command()` - Returns true if this variant is a command
/// - `is_event()` - Returns true if this variant is an event
/// - `is_tick()` - Returns true if this variant is a timer tick
/// - `name()` - Returns the variant name, used as a tracing field
///
/// # Attributes
///
/// - `#[command]` - User intent entering the reducer
/// - `#[event]` - Outcome of an effect fed back into the reducer
/// - `#[tick]` - Action scheduled by a recurring timer
///
/// A variant may carry at most one of these attributes; unmarked variants
/// answer `false` to all three predicates.
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to a non-enum type
/// - A variant carries more than one kind attribute
#[proc_macro_derive(Action, attributes(command, event, tick))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(input, "#[derive(Action)] can only be used on enums")
            .to_compile_error()
            .into();
    };

    let mut command_arms = Vec::new();
    let mut event_arms = Vec::new();
    let mut tick_arms = Vec::new();
    let mut name_arms = Vec::new();

    for variant in &data_enum.variants {
        let is_command = has_attribute(&variant.attrs, "command");
        let is_event = has_attribute(&variant.attrs, "event");
        let is_tick = has_attribute(&variant.attrs, "tick");

        if [is_command, is_event, is_tick].iter().filter(|marked| **marked).count() > 1 {
            return syn::Error::new_spanned(
                variant,
                "Variant can carry only one of #[command], #[event] and #[tick]",
            )
            .to_compile_error()
            .into();
        }

        let pattern = variant_pattern(variant);
        if is_command {
            command_arms.push(quote! { #pattern => true, });
        }
        if is_event {
            event_arms.push(quote! { #pattern => true, });
        }
        if is_tick {
            tick_arms.push(quote! { #pattern => true, });
        }

        let label = variant.ident.to_string();
        name_arms.push(quote! { #pattern => #label, });
    }

    let expanded = quote! {
        impl #name {
            /// Returns true if this action is a command
            #[must_use]
            pub const fn is_command(&self) -> bool {
                match self {
                    #(#command_arms)*
                    _ => false,
                }
            }

            /// Returns true if this action is an event
            #[must_use]
            pub const fn is_event(&self) -> bool {
                match self {
                    #(#event_arms)*
                    _ => false,
                }
            }

            /// Returns true if this action is a timer tick
            #[must_use]
            pub const fn is_tick(&self) -> bool {
                match self {
                    #(#tick_arms)*
                    _ => false,
                }
            }

            /// Variant name, for logs and metrics labels
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    #(#name_arms)*
                }
            }
        }
    };

    TokenStream::from(expanded)
}

/// Pattern matching `variant` regardless of its fields
fn variant_pattern(variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    match &variant.fields {
        Fields::Named(_) => quote! { Self::#ident { .. } },
        Fields::Unnamed(_) => quote! { Self::#ident(..) },
        Fields::Unit => quote! { Self::#ident },
    }
}

/// Helper function to check if an attribute list contains a specific attribute
fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}
