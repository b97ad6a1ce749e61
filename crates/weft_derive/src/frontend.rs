use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    DeriveInput, Fields, LitStr, Member, Path, Token, WherePredicate, parse_quote,
    punctuated::Punctuated, spanned::Spanned,
};

pub fn derive_frontend(input: DeriveInput) -> TokenStream {
    // retrieve struct field information
    let fields = match &input.data {
        syn::Data::Struct(data_struct) => &data_struct.fields,
        _ => {
            return syn::Error::new(input.span(), "`Frontend` can only be derived for structs")
                .to_compile_error();
        }
    };

    // the field holding the common array, its type, and the fields to default
    let (member, ty, others) = match fields {
        // tuple struct: must have exactly one field
        Fields::Unnamed(fields_unnamed) => {
            if fields_unnamed.unnamed.len() != 1 {
                return syn::Error::new(
                    fields_unnamed.span(),
                    "tuple structs must have exactly one field",
                )
                .to_compile_error();
            }
            let ty = fields_unnamed.unnamed[0].ty.clone();
            (Member::from(0), ty, vec![])
        }
        // named struct: require exactly one #[frontend] attribute
        Fields::Named(fields_named) => {
            let marked_fields: Vec<_> = fields_named
                .named
                .iter()
                .filter(|f| f.attrs.iter().any(|a| a.path().is_ident("frontend")))
                .collect();

            if marked_fields.len() != 1 {
                let msg = match marked_fields.len() {
                    0 => "no field marked with #[frontend] attribute",
                    _ => "multiple fields marked with #[frontend] attribute",
                };
                return syn::Error::new(fields_named.span(), msg).to_compile_error();
            }

            let field = marked_fields[0];
            let Some(ident) = field.ident.clone() else {
                return syn::Error::new(field.span(), "marked field must be named")
                    .to_compile_error();
            };
            let others: Vec<Member> = fields_named
                .named
                .iter()
                .filter_map(|f| f.ident.clone())
                .filter(|other| other != &ident)
                .map(Member::Named)
                .collect();
            (Member::Named(ident), field.ty.clone(), others)
        }
        // unit structs carry no array
        Fields::Unit => {
            return syn::Error::new(
                input.span(),
                "unit structs are not supported by `Frontend` derive",
            )
            .to_compile_error();
        }
    };

    // parse frontend attributes
    let mut crate_name = None;
    let mut user_bounds = Punctuated::<WherePredicate, Token![,]>::new();
    for attr in &input.attrs {
        if !attr.path().is_ident("frontend") {
            continue;
        }

        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                let value = meta.value()?;
                let s: LitStr = value.parse()?;
                crate_name = Some(s.parse::<Path>()?);
                Ok(())
            } else if meta.path.is_ident("bound") {
                let value = meta.value()?;
                let s: LitStr = value.parse()?;
                let predicates =
                    s.parse_with(Punctuated::<WherePredicate, Token![,]>::parse_terminated)?;
                user_bounds.extend(predicates);
                Ok(())
            } else {
                Err(meta.error("unexpected attribute; supported are `crate` and `bound`"))
            }
        });

        if let Err(err) = result {
            return err.to_compile_error();
        }
    }
    let crate_path = match crate_name {
        Some(path) => quote!(#path),
        None => quote!(::weft),
    };
    let base_path = quote!(#crate_path::frontend);

    let name = input.ident;
    let (_, ty_generics, _) = input.generics.split_for_impl();

    // both impls are generic over the element type `__Elem`
    let mut into_generics = input.generics.clone();
    into_generics
        .params
        .push(parse_quote!(__Elem: #crate_path::num::Scalar));
    let mut from_generics = into_generics.clone();

    let where_clause = into_generics.make_where_clause();
    where_clause.predicates.extend(user_bounds.clone());
    where_clause
        .predicates
        .push(parse_quote!(#ty: #base_path::IntoCommon<__Elem>));

    let where_clause = from_generics.make_where_clause();
    where_clause.predicates.extend(user_bounds);
    where_clause
        .predicates
        .push(parse_quote!(#ty: #base_path::FromCommon<__Elem>));

    let (into_impl_generics, _, into_where_clause) = into_generics.split_for_impl();
    let (from_impl_generics, _, from_where_clause) = from_generics.split_for_impl();

    quote! {
        impl #into_impl_generics #base_path::IntoCommon<__Elem> for #name #ty_generics #into_where_clause {
            #[inline]
            fn into_common(
                self,
            ) -> ::core::result::Result<
                #crate_path::array::Array<__Elem>,
                #crate_path::array::ArrayError,
            > {
                #base_path::IntoCommon::<__Elem>::into_common(self.#member)
            }
        }

        impl #from_impl_generics #base_path::FromCommon<__Elem> for #name #ty_generics #from_where_clause {
            #[inline]
            fn from_common(array: #crate_path::array::Array<__Elem>) -> Self {
                Self {
                    #member: #base_path::FromCommon::<__Elem>::from_common(array),
                    #(#others: ::core::default::Default::default(),)*
                }
            }
        }
    }
}
