//! EVS volumes lookup

mod api;
mod data_source;
mod state;

pub use data_source::EvsVolumesDataSource;
