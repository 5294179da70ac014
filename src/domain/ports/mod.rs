mod address_store;
mod clock;
mod reverse_geocoder;

pub use address_store::AddressStore;
pub use clock::Clock;
pub use reverse_geocoder::ReverseGeocoder;
