pub mod constants;
pub mod encoder;
pub mod filters;
pub mod resample;
pub mod resource;

pub use encoder::{FrameEncoder, OpusFrameEncoder, RawFrameEncoder};
pub use filters::{FilterChange, FilterSettings, FilterUpdate, FiltersChain, StageSwitches};
pub use resource::{AudioResource, CreateStreamOptions, PcmStream};
