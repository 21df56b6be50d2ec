pub mod fixtures;

#[cfg(test)]
mod voices_tests;
#[cfg(test)]
mod transcribe_tests;
#[cfg(test)]
mod synthesize_tests;
