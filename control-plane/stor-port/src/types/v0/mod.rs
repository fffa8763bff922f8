/// Types which are saved to persistent storage.
pub mod store;
/// Types which are sent between the driver service and its collaborators.
pub mod transport;
