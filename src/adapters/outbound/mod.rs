mod dashmap_address_store;

pub use dashmap_address_store::DashMapAddressStore;
