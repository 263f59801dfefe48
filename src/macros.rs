//! Accessor macros for zerocopy header structs.

/// Generates getter/setter pairs for byte-order-aware zerocopy fields
/// (`zerocopy::big_endian::U16`/`U32`/`U64`).
///
/// ```ignore
/// be_accessors! {
///     record_count: u64,
/// }
/// ```
///
/// expands to `record_count(&self) -> u64` and
/// `set_record_count(&mut self, u64)` converting through the wire type.
macro_rules! be_accessors {
    ($($(#[$meta:meta])* $field:ident: $ty:ty),* $(,)?) => {
        ::paste::paste! {
            $(
                $(#[$meta])*
                #[inline]
                pub fn $field(&self) -> $ty {
                    self.$field.get()
                }

                #[inline]
                pub fn [<set_ $field>](&mut self, value: $ty) {
                    self.$field.set(value);
                }
            )*
        }
    };
}

pub(crate) use be_accessors;
