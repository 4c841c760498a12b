//! Per-request loader wiring.
//!
//! Loaders are NOT schema data: a fresh set is attached to every incoming
//! request, so batch state and the memoization cache live and die with that
//! request. Two requests never share cached rows, and nothing read during one
//! request can leak stale into the next.

use async_graphql::dataloader::{DataLoader, HashMapCache};
use async_graphql::Request;

use confhub_store::DynStore;

use super::loaders::{
    AttendanceLoader, CachedLoader, CategoryByIdLoader, CityByIdLoader, ConferenceByIdLoader,
    CountryByIdLoader, CountyByIdLoader, LocationByIdLoader, SpeakersByConferenceLoader,
    TypeByIdLoader,
};

/// Attach one fresh loader set to the request.
pub fn request_scope(request: Request, store: &DynStore) -> Request {
    request
        .data(cached(ConferenceByIdLoader {
            store: store.clone(),
        }))
        .data(cached(LocationByIdLoader {
            store: store.clone(),
        }))
        .data(cached(SpeakersByConferenceLoader {
            store: store.clone(),
        }))
        .data(cached(AttendanceLoader {
            store: store.clone(),
        }))
        .data(cached(CategoryByIdLoader {
            store: store.clone(),
        }))
        .data(cached(TypeByIdLoader {
            store: store.clone(),
        }))
        .data(cached(CountryByIdLoader {
            store: store.clone(),
        }))
        .data(cached(CountyByIdLoader {
            store: store.clone(),
        }))
        .data(cached(CityByIdLoader {
            store: store.clone(),
        }))
}

/// Wrap a loader with a request-lifetime memo cache: a key fetched once is
/// served from memory for every later use inside the same request.
pub fn cached<T: Send + Sync + 'static>(loader: T) -> CachedLoader<T> {
    let loader = DataLoader::with_cache(loader, tokio::spawn, HashMapCache::default());
    loader.enable_all_cache(true);
    loader
}
