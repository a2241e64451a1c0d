pub mod expiration;
pub mod id_allocator;
pub mod key_codec;
pub mod lifecycle;
pub mod object_store;
