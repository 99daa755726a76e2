use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, DeriveInput, LitStr};

pub fn derive_consumer(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match consumer_impl(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

pub fn derive_producer(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match producer_impl(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

#[derive(Default)]
struct ConsumerArgs {
    consumer_group: Option<LitStr>,
    topic: Option<LitStr>,
    tags: Vec<LitStr>,
    message_model: Option<LitStr>,
    consume_mode: Option<LitStr>,
}

fn consumer_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let mut args = ConsumerArgs::default();
    for attr in role_attrs(&input.attrs, "mq_consumer") {
        attr.parse_nested_meta(|meta| {
            let value = || -> syn::Result<LitStr> { meta.value()?.parse() };
            if meta.path.is_ident("consumer_group") {
                args.consumer_group = Some(value()?);
            } else if meta.path.is_ident("topic") {
                args.topic = Some(value()?);
            } else if meta.path.is_ident("tag") {
                args.tags.push(value()?);
            } else if meta.path.is_ident("message_model") {
                args.message_model = Some(value()?);
            } else if meta.path.is_ident("consume_mode") {
                args.consume_mode = Some(value()?);
            } else {
                return Err(meta.error(
                    "expected one of `consumer_group`, `topic`, `tag`, `message_model`, `consume_mode`",
                ));
            }
            Ok(())
        })?;
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let consumer_group = string_or_empty(args.consumer_group.as_ref());
    let topic = string_or_empty(args.topic.as_ref());
    let tags = &args.tags;
    let message_model = args.message_model.as_ref().map(|m| {
        quote! { attributes.message_model = ::std::string::String::from(#m); }
    });
    let consume_mode = args.consume_mode.as_ref().map(|m| {
        quote! { attributes.consume_mode = ::std::string::String::from(#m); }
    });

    Ok(quote! {
        impl #impl_generics ::mq_starter::ConsumerRole for #name #ty_generics #where_clause {
            fn consumer_attributes() -> ::mq_starter::ConsumerAttributes {
                #[allow(unused_mut)]
                let mut attributes = ::mq_starter::ConsumerAttributes::new(#consumer_group, #topic);
                #( attributes = attributes.tag(#tags); )*
                #message_model
                #consume_mode
                attributes
            }
        }
    })
}

fn producer_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let mut topic = None;
    let mut tag = None;
    for attr in role_attrs(&input.attrs, "mq_producer") {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("topic") {
                let value: LitStr = meta.value()?.parse()?;
                topic = Some(value);
            } else if meta.path.is_ident("tag") {
                let value: LitStr = meta.value()?.parse()?;
                tag = Some(value);
            } else {
                return Err(meta.error("expected `topic` or `tag`"));
            }
            Ok(())
        })?;
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let topic = topic.map(|t| quote! { .topic(#t) });
    let tag = tag.map(|t| quote! { .tag(#t) });

    Ok(quote! {
        impl #impl_generics ::mq_starter::ProducerRole for #name #ty_generics #where_clause {
            fn producer_metadata() -> ::mq_starter::ProducerMetadata {
                ::mq_starter::ProducerMetadata::new() #topic #tag
            }
        }
    })
}

fn role_attrs<'a>(attrs: &'a [Attribute], name: &'a str) -> impl Iterator<Item = &'a Attribute> {
    attrs.iter().filter(move |attr| attr.path().is_ident(name))
}

fn string_or_empty(value: Option<&LitStr>) -> TokenStream2 {
    match value {
        Some(lit) => quote! { #lit },
        None => quote! { "" },
    }
}
