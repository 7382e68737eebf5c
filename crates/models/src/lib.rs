//! Domain records of the store catalog: WMS stores, their dependent layers,
//! and the presence-tracked patch used for partial updates.

pub mod errors;
pub mod patch;
pub mod store;

pub use errors::ModelError;
pub use patch::StorePatch;
pub use store::{Layer, Store, StoreKey, WMS_STORE_TYPE};

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use configs::StoreDefaults;

    use crate::{Store, StorePatch};

    #[test]
    fn store_persists_as_json() {
        let store = StorePatch {
            name: Some("demo".into()),
            capabilities_url: Some("http://demo.opengeo.org/geoserver/wms?".into()),
            user: Some(Some("admin".into())),
            ..Default::default()
        }
        .into_new_store("sf", &StoreDefaults::default(), Utc::now())
        .unwrap();
        let bytes = serde_json::to_vec(&store).unwrap();
        let back: Store = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, store);
        assert_eq!(back.store_type(), "WMS");
    }
}
