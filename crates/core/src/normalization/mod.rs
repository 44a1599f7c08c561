pub mod histogram;
pub mod region_normalizer;
