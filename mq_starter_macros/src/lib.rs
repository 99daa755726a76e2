mod role;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(MqConsumer)] derive macro
// ============================================================================

/// Derive macro for the `ConsumerRole` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(MqConsumer)]
/// #[mq_consumer(
///     consumer_group = "order-group",
///     topic = "orders",
///     tag = "created",
///     tag = "paid",
///     consume_mode = "ORDERLY",
/// )]
/// struct OrderListener;
/// ```
///
/// - `consumer_group` and `topic` are nominal values, overridable per environment.
/// - `tag` may be repeated; the tags are OR-ed. Omitted means every tag.
/// - `message_model` defaults to `"CLUSTERING"`, `consume_mode` to `"CONCURRENTLY"`.
///   Both are validated when the component is registered.
#[proc_macro_derive(MqConsumer, attributes(mq_consumer))]
pub fn derive_mq_consumer(input: TokenStream) -> TokenStream {
    role::derive_consumer(input)
}

// ============================================================================
// #[derive(MqProducer)] derive macro
// ============================================================================

/// Derive macro for the `ProducerRole` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(MqProducer)]
/// #[mq_producer(topic = "orders", tag = "created")]
/// struct OrderService {
///     producer: ProducerSlot,
/// }
/// ```
///
/// Both keys are optional: a producer without a topic names one per send.
#[proc_macro_derive(MqProducer, attributes(mq_producer))]
pub fn derive_mq_producer(input: TokenStream) -> TokenStream {
    role::derive_producer(input)
}
