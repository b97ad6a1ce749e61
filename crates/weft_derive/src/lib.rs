use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod frontend;

/// Derives `IntoCommon` and `FromCommon` for a frontend tensor type by forwarding
/// to the one field marked `#[frontend]`. Other fields are filled with their defaults
/// when converting back.
#[proc_macro_derive(Frontend, attributes(frontend))]
pub fn derive_frontend(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let expanded = frontend::derive_frontend(input);
    expanded.into()
}
