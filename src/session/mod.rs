pub mod claim;
pub mod events;
pub mod service;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
