//! Connection layer: owns the broker connection and exposes its state

pub mod live;

#[cfg(test)]
mod tests;

pub use live::LiveConnection;
