pub mod health;
pub mod synthesize;
pub mod transcribe;
pub mod voices;
