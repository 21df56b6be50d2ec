pub mod audio;
pub mod engines;
