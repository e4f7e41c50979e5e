pub mod classification;
pub mod conversion;
pub mod detection;
pub mod pipeline;
pub mod shared;
