// Catalog module
// Resolves which FMA tracks exist in the metadata table and on disk

pub mod load;

pub use load::{
    load_tracks, read_catalog, track_audio_path, CatalogError, CatalogSource, ItemDescriptor,
    AUDIO_EXTENSION, SUBSET_DIR,
};
